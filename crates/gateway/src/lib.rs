#![deny(unused)]
//! Tool gateways for the sandcell execution runtime.
//!
//! A gateway is the only permitted traversal of the trust boundary between
//! host-trusted code and sandbox-untrusted code. Two implementations:
//!
//! - [`DirectGateway`] runs in-process and delegates to the tool index, docs
//!   store, and runner collaborators, enforcing call and chain quotas and
//!   recording every invocation.
//! - [`proxy::ProxyGateway`] serializes each operation as a framed message
//!   over a bidirectional connection, for snippets running across a process
//!   or container boundary. [`proxy::GatewayServer`] is the host side of that
//!   boundary, dispatching to an inner gateway.

pub mod direct;
pub mod proxy;

pub use direct::{DirectGateway, DirectGatewayConfig};
pub use proxy::{Connection, GatewayServer, JsonCodec, Message, MessageType, ProxyGateway};
