#![deny(unused)]
//! Core types, traits, and error definitions for the sandcell execution runtime.
//!
//! This crate is the shared vocabulary of the runtime: the request/result data
//! model, the closed error taxonomy, the tool gateway contract that forms the
//! trust boundary, and the backend contract that every isolation mechanism
//! implements. Concrete gateways and backends live in the `sandcell-gateway`
//! and `sandcell-runtime` crates.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Orchestrator (sandcell-engine adapter) │
//! │    ↓ ExecuteRequest                     │
//! ├─────────────────────────────────────────┤
//! │  Runtime router (profile → backend)     │
//! │    ↓ Backend::execute                   │
//! ├─────────────────────────────────────────┤
//! │  Isolation backend (subprocess, Docker) │
//! │    snippet ──▶ ToolGateway (only exit)  │
//! └─────────────────────────────────────────┘
//! ```

pub mod contract;
pub mod error;
pub mod mocks;
pub mod sentinel;
pub mod traits;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use traits::*;
pub use types::*;
