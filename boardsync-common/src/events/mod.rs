//! Sync notifications and the EventBus
//!
//! Every notification carries full post-write snapshots, so consumers can
//! treat each event as "set these records to this state". Delivery is
//! at-least-once; duplicates and reordering are harmless.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Board, Card};

/// Notification emitted after a write to a board or its cards
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEvent {
    /// Board property templates were rewritten
    SchemaUpdated {
        space_id: Uuid,
        board: Board,
        timestamp: DateTime<Utc>,
    },

    /// Cards were materialized for new proposals
    RecordsCreated {
        space_id: Uuid,
        cards: Vec<Card>,
        timestamp: DateTime<Utc>,
    },

    /// Existing cards changed (mirror fields or property values)
    RecordsUpdated {
        space_id: Uuid,
        cards: Vec<Card>,
        timestamp: DateTime<Utc>,
    },

    /// Cards were hard-deleted
    RecordsDeleted {
        space_id: Uuid,
        board_id: Uuid,
        card_ids: Vec<Uuid>,
        timestamp: DateTime<Utc>,
    },
}

impl SyncEvent {
    pub fn schema_updated(board: Board) -> Self {
        SyncEvent::SchemaUpdated {
            space_id: board.space_id,
            board,
            timestamp: Utc::now(),
        }
    }

    pub fn records_created(space_id: Uuid, cards: Vec<Card>) -> Self {
        SyncEvent::RecordsCreated {
            space_id,
            cards,
            timestamp: Utc::now(),
        }
    }

    pub fn records_updated(space_id: Uuid, cards: Vec<Card>) -> Self {
        SyncEvent::RecordsUpdated {
            space_id,
            cards,
            timestamp: Utc::now(),
        }
    }

    pub fn records_deleted(space_id: Uuid, board_id: Uuid, card_ids: Vec<Uuid>) -> Self {
        SyncEvent::RecordsDeleted {
            space_id,
            board_id,
            card_ids,
            timestamp: Utc::now(),
        }
    }

    /// Wire name of the event kind, used as the SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            SyncEvent::SchemaUpdated { .. } => "schema_updated",
            SyncEvent::RecordsCreated { .. } => "records_created",
            SyncEvent::RecordsUpdated { .. } => "records_updated",
            SyncEvent::RecordsDeleted { .. } => "records_deleted",
        }
    }

    pub fn space_id(&self) -> Uuid {
        match self {
            SyncEvent::SchemaUpdated { space_id, .. }
            | SyncEvent::RecordsCreated { space_id, .. }
            | SyncEvent::RecordsUpdated { space_id, .. }
            | SyncEvent::RecordsDeleted { space_id, .. } => *space_id,
        }
    }
}

/// Broadcast channel for sync notifications
///
/// Slow subscribers lose the oldest events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: SyncEvent) -> Result<usize, broadcast::error::SendError<SyncEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SyncEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
