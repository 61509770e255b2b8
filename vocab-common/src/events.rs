//! Import event types and event bus
//!
//! The import job broadcasts progress through an [`EventBus`]. Subscribers are
//! optional; a run with nobody listening behaves exactly like one without a bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Why an element of the feed was not imported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// Identifier path missing, null, blank or non-scalar
    MissingIdentifier,
    /// Identifier matched more than one existing record
    AmbiguousMatch,
    /// Record store query or save failed
    StoreFailure,
}

/// Events emitted during an import run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ImportEvent {
    /// Run started on a decoded document
    RunStarted {
        run_id: Uuid,
        vocabulary: String,
        element_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// One element was persisted
    RecordSaved {
        run_id: Uuid,
        element: usize,
        identifier: Option<String>,
        record_id: i64,
        created: bool,
    },

    /// One element was skipped
    ElementSkipped {
        run_id: Uuid,
        element: usize,
        identifier: Option<String>,
        reason: SkipReason,
        message: String,
    },

    /// Run finished scanning the document
    RunCompleted {
        run_id: Uuid,
        created: usize,
        updated: usize,
        skipped: usize,
        failed: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast channel for [`ImportEvent`]s
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ImportEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Lagging subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ImportEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ImportEvent) {
        let _ = self.tx.send(event);
    }
}
