//! Cross-boundary gateway over a framed request/response connection.
//!
//! When a snippet runs in another process or container, its tool gateway is a
//! [`ProxyGateway`] that serializes each operation as a [`Message`] on a
//! [`Connection`] and awaits the matching reply. The host side runs a
//! [`GatewayServer`] that dispatches each request to an inner gateway (such
//! as the direct gateway) and answers with `response` or `error` messages.
//!
//! Framing is the codec's responsibility; the default [`JsonCodec`] is a
//! self-describing textual format.

mod client;
mod pipe;
mod protocol;
mod server;

pub use client::ProxyGateway;
pub use pipe::PipeConnection;
pub use protocol::{Codec, Connection, JsonCodec, Message, MessageType};
pub use server::GatewayServer;
