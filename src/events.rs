//! Event system for voxsplit
//!
//! Lifecycle events emitted by the job scheduler, broadcast to optional
//! observers. Delivery is advisory: no invariant depends on a consumer
//! being subscribed, and emission never blocks the scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Scheduler lifecycle events
///
/// Serializable so an observer can forward them over SSE or log them as
/// structured records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JobEvent {
    /// Task accepted into the queue
    Queued {
        id: String,
        /// Zero-based position at admission time
        position: usize,
        timestamp: DateTime<Utc>,
    },

    /// Task began running
    Started {
        id: String,
        active: usize,
        pending: usize,
        timestamp: DateTime<Utc>,
    },

    /// Task finished successfully
    Completed { id: String, timestamp: DateTime<Utc> },

    /// Task finished with an error
    Failed {
        id: String,
        /// Error kind tag (see `Error::kind`)
        error_kind: String,
        timestamp: DateTime<Utc>,
    },

    /// Task was removed from the queue before running (cancellation)
    Removed { id: String, timestamp: DateTime<Utc> },

    /// Task went stale in the queue and was reaped
    Expired { id: String, timestamp: DateTime<Utc> },
}

impl JobEvent {
    /// Task id this event refers to
    pub fn task_id(&self) -> &str {
        match self {
            JobEvent::Queued { id, .. }
            | JobEvent::Started { id, .. }
            | JobEvent::Completed { id, .. }
            | JobEvent::Failed { id, .. }
            | JobEvent::Removed { id, .. }
            | JobEvent::Expired { id, .. } => id,
        }
    }
}

/// One-to-many event broadcaster
///
/// Thin wrapper over `tokio::sync::broadcast`; lossy by design, slow
/// subscribers miss events rather than apply backpressure.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<JobEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
