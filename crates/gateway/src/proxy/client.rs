//! The sandbox-side proxy gateway client.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use sandcell_core::{
    ChainStep, DetailLevel, Error, ErrorKind, Result, RunOutcome, StepOutcome, ToolDoc,
    ToolExample, ToolGateway, ToolSummary,
};

use super::protocol::{Connection, Message, MessageType};

// =============================================================================
// Proxy Gateway
// =============================================================================

/// [`ToolGateway`] that forwards every operation over a [`Connection`].
///
/// Each request carries a monotonically increasing id; responses are
/// demultiplexed by id through [`ProxyGateway::deliver_response`], normally
/// driven by a small pump task reading the connection. Any number of requests
/// may be in flight at once.
pub struct ProxyGateway {
    conn: Arc<dyn Connection>,
    next_id: AtomicU64,
    pending: DashMap<u64, oneshot::Sender<Message>>,
    closed: AtomicBool,
}

impl ProxyGateway {
    /// Create a proxy gateway over the given connection.
    pub fn new(conn: Arc<dyn Connection>) -> Self {
        Self {
            conn,
            next_id: AtomicU64::new(0),
            pending: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Deliver a reply to the pending request with the matching id.
    ///
    /// Called by the connection pump for every `response`/`error` message.
    /// Slots are single-shot: delivering to an unknown or already-consumed id
    /// is a `protocol` error.
    pub fn deliver_response(&self, msg: Message) -> Result<()> {
        match self.pending.remove(&msg.id) {
            Some((id, tx)) => tx
                .send(msg)
                .map_err(|_| Error::protocol(format!("response slot abandoned for id {id}"))),
            None => Err(Error::protocol(format!(
                "no pending request for id {}",
                msg.id
            ))),
        }
    }

    /// Close the gateway and its connection. Idempotent.
    ///
    /// All in-flight requests fail with `connection-closed`.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.conn.close();
        // Dropping the senders wakes every pending request.
        self.pending.clear();
    }

    /// Run a receive loop that feeds replies into the pending map.
    ///
    /// Returns when the connection closes or the handle is cancelled.
    /// Protocol violations (replies for unknown ids) terminate the pump.
    pub async fn pump(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            let msg = match self.conn.receive(cancel).await {
                Ok(msg) => msg,
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::ConnectionClosed | ErrorKind::Cancelled
                    ) =>
                {
                    return Ok(())
                }
                Err(err) => return Err(err),
            };
            self.deliver_response(msg)?;
        }
    }

    async fn request(
        &self,
        cancel: &CancellationToken,
        kind: MessageType,
        payload: Value,
    ) -> Result<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::connection_closed());
        }
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        if let Err(err) = self.conn.send(cancel, Message::new(kind, id, payload)).await {
            self.pending.remove(&id);
            return Err(err);
        }

        let reply = tokio::select! {
            _ = cancel.cancelled() => {
                self.pending.remove(&id);
                return Err(Error::cancelled());
            }
            reply = rx => reply.map_err(|_| Error::connection_closed())?,
        };

        match reply.kind {
            MessageType::Error => Err(decode_error(reply.payload)),
            _ => Ok(reply.payload),
        }
    }
}

#[async_trait]
impl ToolGateway for ProxyGateway {
    async fn search_tools(
        &self,
        cancel: &CancellationToken,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ToolSummary>> {
        let payload = self
            .request(
                cancel,
                MessageType::SearchTools,
                json!({ "query": query, "limit": limit }),
            )
            .await?;
        Ok(decode::<SearchReply>(payload).results)
    }

    async fn list_namespaces(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let payload = self
            .request(cancel, MessageType::ListNamespaces, Value::Null)
            .await?;
        Ok(decode::<NamespacesReply>(payload).namespaces)
    }

    async fn describe_tool(
        &self,
        cancel: &CancellationToken,
        id: &str,
        level: DetailLevel,
    ) -> Result<ToolDoc> {
        let payload = self
            .request(
                cancel,
                MessageType::DescribeTool,
                json!({ "id": id, "level": level }),
            )
            .await?;
        Ok(decode::<ToolDoc>(payload))
    }

    async fn list_tool_examples(
        &self,
        cancel: &CancellationToken,
        id: &str,
        max: usize,
    ) -> Result<Vec<ToolExample>> {
        let payload = self
            .request(
                cancel,
                MessageType::ListToolExamples,
                json!({ "id": id, "max": max }),
            )
            .await?;
        Ok(decode::<ExamplesReply>(payload).examples)
    }

    async fn run_tool(
        &self,
        cancel: &CancellationToken,
        id: &str,
        args: Value,
    ) -> Result<RunOutcome> {
        let payload = self
            .request(
                cancel,
                MessageType::RunTool,
                json!({ "id": id, "args": args }),
            )
            .await?;
        Ok(decode::<RunOutcome>(payload))
    }

    async fn run_chain(
        &self,
        cancel: &CancellationToken,
        steps: &[ChainStep],
    ) -> Result<(RunOutcome, Vec<StepOutcome>)> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::connection_closed());
        }
        if steps.is_empty() {
            return Ok((RunOutcome::default(), Vec::new()));
        }
        let payload = self
            .request(cancel, MessageType::RunChain, json!({ "steps": steps }))
            .await?;
        let reply = decode::<ChainReply>(payload);
        Ok((reply.result, reply.step_results))
    }
}

// =============================================================================
// Payload decoding
// =============================================================================
//
// Replies are decoded leniently: missing or mismatched fields fall back to
// defaults, mirroring the self-describing payload contract.

fn decode<T: DeserializeOwned + Default>(payload: Value) -> T {
    serde_json::from_value(payload).unwrap_or_default()
}

fn decode_error(payload: Value) -> Error {
    let reply: ErrorReply = decode(payload);
    let kind = ErrorKind::parse(&reply.kind).unwrap_or(ErrorKind::InvalidRequest);
    let message = if reply.error.is_empty() {
        "unknown error".to_string()
    } else {
        reply.error
    };
    Error::new(kind, message)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchReply {
    results: Vec<ToolSummary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NamespacesReply {
    namespaces: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExamplesReply {
    examples: Vec<ToolExample>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChainReply {
    result: RunOutcome,
    step_results: Vec<StepOutcome>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorReply {
    error: String,
    kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_payloads_preserve_the_kind() {
        let err = decode_error(json!({ "error": "max 3 calls exceeded", "kind": "tool-call-limit" }));
        assert_eq!(err.kind(), ErrorKind::ToolCallLimit);
        assert!(err.to_string().contains("max 3 calls exceeded"));
    }

    #[test]
    fn unknown_error_kinds_fall_back() {
        let err = decode_error(json!({ "error": "boom" }));
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let err = decode_error(json!({}));
        assert!(err.to_string().contains("unknown error"));
    }

    #[test]
    fn lenient_decode_tolerates_shape_mismatches() {
        let reply: SearchReply = decode(json!({ "results": "not an array" }));
        assert!(reply.results.is_empty());
    }
}
