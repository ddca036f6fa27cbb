//! Contracts between the runtime, its backends, its gateways, and the
//! external tool collaborators.

mod backend;
mod collaborators;
mod gateway;
mod runtime;

pub use backend::Backend;
pub use collaborators::{ToolDocs, ToolIndex, ToolRunner};
pub use gateway::{ToolCallTracer, ToolGateway};
pub use runtime::Runtime;
