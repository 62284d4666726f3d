//! Collaborator interfaces consumed by the sync engine
//!
//! The engine only talks to storage, permissions and downstream consumers
//! through these traits. `sqlite` holds the implementations backed by the
//! shared SQLite database.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use boardsync_common::events::{EventBus, SyncEvent};
use boardsync_common::models::{
    Board, BoardView, Card, CardUpdate, EvaluationSummary, FormField, PermissionEntry,
    PropertyMap, PropertyTemplate, Proposal,
};
use boardsync_common::Result;
use uuid::Uuid;

pub mod sqlite;

pub use sqlite::{SqliteCardStore, SqlitePermissionService, SqliteProposalStore};

/// Keyset position after the last proposal of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl PageCursor {
    pub fn after(proposal: &Proposal) -> Self {
        Self {
            created_at: proposal.created_at,
            id: proposal.id,
        }
    }
}

/// Read access to upstream proposals
#[async_trait]
pub trait ProposalStore: Send + Sync {
    /// One page of non-draft proposals ordered by (created_at, id), starting
    /// after `cursor`. Archived and soft-deleted proposals are included.
    async fn list_page(
        &self,
        space_id: Uuid,
        cursor: Option<PageCursor>,
        page_size: u32,
    ) -> Result<Vec<Proposal>>;

    /// Ids of every proposal that may back a card (all non-draft proposals)
    async fn syncable_ids(&self, space_id: Uuid) -> Result<HashSet<Uuid>>;

    async fn get_proposal(&self, proposal_id: Uuid) -> Result<Option<Proposal>>;

    /// Evaluation pipelines of every non-draft proposal in the space
    async fn evaluation_summaries(&self, space_id: Uuid) -> Result<Vec<EvaluationSummary>>;

    async fn form_fields(&self, space_id: Uuid) -> Result<Vec<FormField>>;

    /// Custom properties defined on the space's proposal template board.
    ///
    /// `config_id` names that board explicitly; when None the space's
    /// registered template board is used, and no board means no properties.
    async fn custom_properties(
        &self,
        space_id: Uuid,
        config_id: Option<Uuid>,
    ) -> Result<Vec<PropertyTemplate>>;
}

/// A set of writes applied in one transaction
#[derive(Debug, Default, Clone)]
pub struct StoreBatch {
    /// Full replacement of a board's property templates
    pub board_properties: Vec<(Uuid, Vec<PropertyTemplate>)>,
    /// Full replacement of view rows
    pub views: Vec<BoardView>,
    /// Full replacement of card property maps
    pub card_properties: Vec<(Uuid, PropertyMap)>,
    /// Cards hard-deleted with their permission rows, after the rewrites above
    pub deleted_cards: Vec<Uuid>,
}

impl StoreBatch {
    pub fn is_empty(&self) -> bool {
        self.board_properties.is_empty()
            && self.views.is_empty()
            && self.card_properties.is_empty()
            && self.deleted_cards.is_empty()
    }
}

/// Storage of boards, views and cards
#[async_trait]
pub trait CardStore: Send + Sync {
    async fn get_board(&self, board_id: Uuid) -> Result<Option<Board>>;

    /// Every board of a space
    async fn list_boards(&self, space_id: Uuid) -> Result<Vec<Board>>;

    async fn list_views(&self, board_id: Uuid) -> Result<Vec<BoardView>>;

    /// Every card of a board, deleted ones included
    async fn list_cards(&self, board_id: Uuid) -> Result<Vec<Card>>;

    /// Cards backed by a proposal, keyed by the proposal id
    async fn list_synced_cards(&self, board_id: Uuid) -> Result<HashMap<Uuid, Card>>;

    async fn get_card(&self, card_id: Uuid) -> Result<Option<Card>>;

    /// Insert a card together with its permission entries
    async fn create_card(&self, card: &Card) -> Result<()>;

    /// Write mirror fields and property map in one statement
    async fn update_card(&self, update: &CardUpdate) -> Result<Card>;

    async fn apply_batch(&self, batch: StoreBatch) -> Result<()>;
}

/// What a user may see of a proposal-backed card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Permissions {
    pub can_read: bool,
    pub can_view_private_fields: bool,
}

#[async_trait]
pub trait PermissionService: Send + Sync {
    async fn compute_permissions(
        &self,
        space_id: Uuid,
        proposal_id: Uuid,
        user_id: Uuid,
    ) -> Result<Permissions>;

    /// Entries new cards inherit from their board
    async fn permission_entries_of(&self, board_id: Uuid) -> Result<Vec<PermissionEntry>>;
}

/// Downstream consumer of post-write snapshots
pub trait NotificationSink: Send + Sync {
    fn publish(&self, event: SyncEvent);
}

impl NotificationSink for EventBus {
    fn publish(&self, event: SyncEvent) {
        self.emit_lossy(event);
    }
}
