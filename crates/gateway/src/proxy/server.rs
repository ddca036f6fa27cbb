//! The host side of the proxy boundary.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use sandcell_core::{ChainStep, DetailLevel, Error, ErrorKind, Result, ToolGateway};

use super::protocol::{Connection, Message, MessageType};

// =============================================================================
// Gateway Server
// =============================================================================

/// Dispatches framed gateway requests from a [`Connection`] to an inner
/// [`ToolGateway`] and replies with `response`/`error` messages.
///
/// The inner gateway is typically a
/// [`DirectGateway`](crate::direct::DirectGateway), which keeps quota
/// enforcement and call recording on the host side of the trust boundary.
pub struct GatewayServer {
    conn: Arc<dyn Connection>,
    inner: Arc<dyn ToolGateway>,
}

impl GatewayServer {
    /// Create a server over the given connection and inner gateway.
    pub fn new(conn: Arc<dyn Connection>, inner: Arc<dyn ToolGateway>) -> Self {
        Self { conn, inner }
    }

    /// Serve requests until the connection closes or the handle fires.
    pub async fn serve(&self, cancel: &CancellationToken) -> Result<()> {
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

            let reply = self.dispatch(cancel, msg).await;
            match self.conn.send(cancel, reply).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::ConnectionClosed => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    }

    async fn dispatch(&self, cancel: &CancellationToken, msg: Message) -> Message {
        let id = msg.id;
        let result = self.handle(cancel, msg).await;
        match result {
            Ok(payload) => Message::new(MessageType::Response, id, payload),
            Err(err) => {
                tracing::warn!(id, error = %err, "gateway request failed");
                Message::error_reply(id, &err)
            }
        }
    }

    async fn handle(&self, cancel: &CancellationToken, msg: Message) -> Result<Value> {
        match msg.kind {
            MessageType::SearchTools => {
                let args: SearchArgs = parse_args(msg.payload)?;
                let results = self
                    .inner
                    .search_tools(cancel, &args.query, args.limit)
                    .await?;
                Ok(json!({ "results": results }))
            }
            MessageType::ListNamespaces => {
                let namespaces = self.inner.list_namespaces(cancel).await?;
                Ok(json!({ "namespaces": namespaces }))
            }
            MessageType::DescribeTool => {
                let args: DescribeArgs = parse_args(msg.payload)?;
                let doc = self.inner.describe_tool(cancel, &args.id, args.level).await?;
                serde_json::to_value(doc)
                    .map_err(|e| Error::protocol("failed to encode tool doc").with_source(e))
            }
            MessageType::ListToolExamples => {
                let args: ExamplesArgs = parse_args(msg.payload)?;
                let examples = self
                    .inner
                    .list_tool_examples(cancel, &args.id, args.max)
                    .await?;
                Ok(json!({ "examples": examples }))
            }
            MessageType::RunTool => {
                let args: RunArgs = parse_args(msg.payload)?;
                let outcome = self.inner.run_tool(cancel, &args.id, args.args).await?;
                serde_json::to_value(outcome)
                    .map_err(|e| Error::protocol("failed to encode run outcome").with_source(e))
            }
            MessageType::RunChain => {
                let args: ChainArgs = parse_args(msg.payload)?;
                let (result, step_results) = self.inner.run_chain(cancel, &args.steps).await?;
                Ok(json!({ "result": result, "step_results": step_results }))
            }
            MessageType::Response | MessageType::Error => Err(Error::protocol(format!(
                "unexpected reply message for id {}",
                msg.id
            ))),
        }
    }
}

// =============================================================================
// Request argument shapes
// =============================================================================

fn parse_args<T: for<'de> Deserialize<'de> + Default>(payload: Value) -> Result<T> {
    if payload.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(payload)
        .map_err(|e| Error::protocol("malformed request payload").with_source(e))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchArgs {
    query: String,
    limit: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DescribeArgs {
    id: String,
    level: DetailLevel,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExamplesArgs {
    id: String,
    max: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunArgs {
    id: String,
    args: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChainArgs {
    steps: Vec<ChainStep>,
}
