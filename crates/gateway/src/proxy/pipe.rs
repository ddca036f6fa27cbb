//! In-memory duplex connection for tests and same-process wiring.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

use sandcell_core::{Error, Result};

use super::protocol::{Codec, Connection, Message};

/// One end of an in-memory duplex connection.
///
/// Frames are byte vectors produced and consumed by the configured codec, so
/// the wire format is exercised even in-process. Closing either end makes
/// both ends fail with `connection-closed`.
pub struct PipeConnection {
    codec: Arc<dyn Codec>,
    tx: Mutex<Option<UnboundedSender<Vec<u8>>>>,
    rx: tokio::sync::Mutex<UnboundedReceiver<Vec<u8>>>,
    closed: AtomicBool,
}

impl PipeConnection {
    /// Create a connected pair of pipe endpoints sharing a codec.
    pub fn pair(codec: Arc<dyn Codec>) -> (Self, Self) {
        let (a_tx, b_rx) = unbounded_channel();
        let (b_tx, a_rx) = unbounded_channel();
        (
            Self {
                codec: codec.clone(),
                tx: Mutex::new(Some(a_tx)),
                rx: tokio::sync::Mutex::new(a_rx),
                closed: AtomicBool::new(false),
            },
            Self {
                codec,
                tx: Mutex::new(Some(b_tx)),
                rx: tokio::sync::Mutex::new(b_rx),
                closed: AtomicBool::new(false),
            },
        )
    }

    fn sender(&self) -> Result<UnboundedSender<Vec<u8>>> {
        self.tx
            .lock()
            .expect("pipe sender mutex poisoned")
            .clone()
            .ok_or_else(Error::connection_closed)
    }
}

#[async_trait]
impl Connection for PipeConnection {
    async fn send(&self, cancel: &CancellationToken, msg: Message) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::connection_closed());
        }
        let frame = self.codec.encode(&msg)?;
        self.sender()?
            .send(frame)
            .map_err(|_| Error::connection_closed())
    }

    async fn receive(&self, cancel: &CancellationToken) -> Result<Message> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::connection_closed());
        }
        let mut rx = self.rx.lock().await;
        let frame = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::cancelled()),
            frame = rx.recv() => frame.ok_or_else(Error::connection_closed)?,
        };
        self.codec.decode(&frame)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping the sender wakes the peer's receive with a closed error.
        self.tx.lock().expect("pipe sender mutex poisoned").take();
    }
}
