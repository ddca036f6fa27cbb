//! Wire protocol envelope for proxy gateway operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use sandcell_core::{Error, Result};

// =============================================================================
// Messages
// =============================================================================

/// The type of a protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Request: search for tools.
    SearchTools,
    /// Request: list tool namespaces.
    ListNamespaces,
    /// Request: describe one tool.
    DescribeTool,
    /// Request: list usage examples for one tool.
    ListToolExamples,
    /// Request: run one tool.
    RunTool,
    /// Request: run a tool chain.
    RunChain,
    /// Reply carrying a serialized result.
    Response,
    /// Reply carrying an error.
    Error,
}

/// The protocol envelope: a message type, a request identifier, and a
/// self-describing payload.
///
/// Requests carry operation arguments in `payload`; responses carry the
/// serialized result; error replies carry a human-readable string under
/// `payload.error` and optionally the error kind under `payload.kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// The message type.
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Request identifier; replies mirror the request's id.
    pub id: u64,
    /// Operation arguments or serialized result.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl Message {
    /// A request or response message.
    pub fn new(kind: MessageType, id: u64, payload: Value) -> Self {
        Self { kind, id, payload }
    }

    /// An error reply for the given request id.
    pub fn error_reply(id: u64, err: &Error) -> Self {
        Self {
            kind: MessageType::Error,
            id,
            payload: serde_json::json!({
                "error": err.to_string(),
                "kind": err.kind().as_str(),
            }),
        }
    }
}

// =============================================================================
// Connection and Codec
// =============================================================================

/// A bidirectional message transport.
///
/// Contract:
/// - Safe for concurrent use.
/// - `send` and `receive` honor the cancellation handle.
/// - After `close`, both fail with `connection-closed`. Close is idempotent.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Send a message.
    async fn send(&self, cancel: &CancellationToken, msg: Message) -> Result<()>;

    /// Wait for and return the next message.
    async fn receive(&self, cancel: &CancellationToken) -> Result<Message>;

    /// Close the connection. Idempotent.
    fn close(&self);
}

/// Message serialization. Frame boundaries are the codec's responsibility.
pub trait Codec: Send + Sync {
    /// Encode a message to bytes.
    fn encode(&self, msg: &Message) -> Result<Vec<u8>>;

    /// Decode bytes to a message.
    fn decode(&self, data: &[u8]) -> Result<Message>;
}

/// The default codec: one self-describing JSON document per frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, msg: &Message) -> Result<Vec<u8>> {
        serde_json::to_vec(msg)
            .map_err(|e| Error::protocol("failed to encode message").with_source(e))
    }

    fn decode(&self, data: &[u8]) -> Result<Message> {
        serde_json::from_slice(data)
            .map_err(|e| Error::protocol("failed to decode message").with_source(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_round_trips_through_json_codec() {
        let codec = JsonCodec;
        let msg = Message::new(MessageType::RunTool, 7, json!({"id": "mock:tool0"}));

        let bytes = codec.encode(&msg).unwrap();
        let decoded = codec.decode(&bytes).unwrap();

        assert_eq!(decoded.kind, MessageType::RunTool);
        assert_eq!(decoded.id, 7);
        assert_eq!(decoded.payload["id"], "mock:tool0");
    }

    #[test]
    fn message_types_use_snake_case_on_the_wire() {
        let msg = Message::new(MessageType::ListToolExamples, 1, Value::Null);
        let text = serde_json::to_string(&msg).unwrap();
        assert!(text.contains("\"list_tool_examples\""));
        assert!(!text.contains("payload"), "null payload is omitted");
    }

    #[test]
    fn garbage_frames_are_protocol_errors() {
        let err = JsonCodec.decode(b"not json").unwrap_err();
        assert_eq!(err.kind(), sandcell_core::ErrorKind::Protocol);
    }
}
