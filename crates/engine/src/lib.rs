#![deny(unused)]
//! Adapter presenting the sandcell runtime to an outer code orchestrator.
//!
//! The orchestrator hands the [`Engine`] execution parameters and a
//! tool-capability handle ([`Tools`]); the adapter wraps the handle as a
//! gateway, builds an execution request with the profile fixed at
//! construction, delegates to the runtime, and translates results and error
//! kinds into the orchestrator's taxonomy.

pub mod adapter;
pub mod contract;
pub mod wrapper;

pub use adapter::Engine;
pub use contract::{EngineError, EngineOutput, EngineToolCall, ExecuteParams, Tools};
pub use wrapper::wrap_tools;
