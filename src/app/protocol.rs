//! Events emitted by the engine's background operations.
//!
//! Every operation gets a [`RequestId`]; its events carry that id. Per
//! operation the sink sees zero or more `LoadProgress` events (loads only,
//! non-decreasing) followed by exactly one terminal event.

use crate::error::LogsiftError;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Identifier attached to each operation so its events can be correlated.
pub type RequestId = u64;

/// Progress and completion notifications delivered to the caller's sink.
#[derive(Debug)]
pub enum EngineEvent {
    /// Percent of the file's bytes indexed so far (0..=100)
    LoadProgress { request_id: RequestId, percent: u8 },
    /// The file is bound; a cancelled load binds the lines indexed so far
    LoadComplete {
        request_id: RequestId,
        duration: Duration,
        cancelled: bool,
        line_count: u64,
    },
    /// A search pass finished or was cancelled; its annotations are published
    SearchComplete {
        request_id: RequestId,
        duration: Duration,
        matches: u64,
        num_terms: usize,
        cancelled: bool,
    },
    ExportComplete {
        request_id: RequestId,
        duration: Duration,
        success: bool,
        cancelled: bool,
        lines_written: u64,
        error: Option<LogsiftError>,
    },
    /// The operation failed on I/O; for loads the engine is left unbound
    Error {
        request_id: RequestId,
        error: LogsiftError,
    },
}

impl EngineEvent {
    pub fn request_id(&self) -> RequestId {
        match self {
            EngineEvent::LoadProgress { request_id, .. }
            | EngineEvent::LoadComplete { request_id, .. }
            | EngineEvent::SearchComplete { request_id, .. }
            | EngineEvent::ExportComplete { request_id, .. }
            | EngineEvent::Error { request_id, .. } => *request_id,
        }
    }

    /// Whether this is the last event of its operation
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EngineEvent::LoadProgress { .. })
    }
}

/// Receiver of engine events
///
/// Called from the operation's worker thread; implementations must not block.
/// The caller decides how events are marshalled to its own execution context.
pub trait EventSink: Send + Sync + 'static {
    fn deliver(&self, event: EngineEvent);
}

impl EventSink for UnboundedSender<EngineEvent> {
    fn deliver(&self, event: EngineEvent) {
        // A dropped receiver means nobody is listening any more
        let _ = self.send(event);
    }
}

/// Adapts a closure into an [`EventSink`]
pub struct FnSink<F>(pub F);

impl<F> EventSink for FnSink<F>
where
    F: Fn(EngineEvent) + Send + Sync + 'static,
{
    fn deliver(&self, event: EngineEvent) {
        (self.0)(event)
    }
}
