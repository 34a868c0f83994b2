//! The seam between the call and the remote model.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::audio::EncodedChunk;
use crate::live::LiveConfig;
use crate::live::call::CallEvent;
use crate::live::error::CallError;

/// What the remote session reports back, in transport order.
///
/// `Closed` and `Error` are terminal: nothing follows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Open,
    Audio(EncodedChunk),
    Interrupted,
    Closed,
    Error(String),
}

/// Delivers session events to the call driver, tagged with the generation
/// of the call that opened the session.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<CallEvent>,
    generation: u64,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<CallEvent>, generation: u64) -> Self {
        Self { tx, generation }
    }

    /// Waits for queue space so events are never dropped or reordered.
    /// Returns `false` once the driver is gone.
    pub async fn emit(&self, event: SessionEvent) -> bool {
        let sent = self
            .tx
            .send(CallEvent::Session {
                generation: self.generation,
                event,
            })
            .await
            .is_ok();
        if !sent {
            debug!("Call driver gone, dropping session event");
        }
        sent
    }
}

/// Opens sessions with a remote audio model.
#[async_trait]
pub trait LiveTransport: Send + Sync {
    /// Resolves once the remote side accepted the session. Never retries.
    async fn connect(
        &self,
        config: &LiveConfig,
        events: EventSink,
    ) -> Result<Box<dyn LiveSession>, CallError>;
}

/// The only capability the call needs from an open session.
///
/// `send` is fire-and-forget and keeps order; it is a no-op after `close`
/// or a terminal event. `close` is idempotent.
pub trait LiveSession: Send {
    fn send(&mut self, chunk: EncodedChunk);
    fn close(&mut self);
}
