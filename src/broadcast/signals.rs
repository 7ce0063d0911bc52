//! Asynchronous notifications flowing into the session controller.
//!
//! Native callbacks never touch session state. They only enqueue a
//! [`SessionSignal`] through a [`SignalSink`], and the controller task
//! consumes the channel.

use tokio::sync::mpsc;

use super::types::PublisherBinding;

/// Callbacks raised by the media engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    JoinSucceeded { channel: String, uid: u32 },
    JoinFailed { channel: String, uid: u32, reason: String },
    Left { channel: String, uid: u32 },
}

/// A recorder entered an error state or stopped without being asked to.
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderFailure {
    pub binding: PublisherBinding,
    pub reason: String,
    /// Recording session the recorder belonged to.
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionSignal {
    Engine(EngineEvent),
    RecorderFailed(RecorderFailure),
}

/// Non-blocking sender usable from any thread, including native callback threads.
#[derive(Debug, Clone)]
pub struct SignalSink {
    tx: mpsc::Sender<SessionSignal>,
}

impl SignalSink {
    pub fn new(tx: mpsc::Sender<SessionSignal>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, signal: SessionSignal) {
        if let Err(e) = self.tx.try_send(signal) {
            tracing::warn!(target: "broadcast", "[SIGNAL] Dropped session signal: {}", e);
        }
    }
}
