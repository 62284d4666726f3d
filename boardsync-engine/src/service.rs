//! Sync service facade
//!
//! Owns the engine components and serializes work per board. This is the
//! entry point used by the HTTP handlers and the `sync` subcommand.

use std::sync::Arc;

use boardsync_common::config::SyncConfig;
use boardsync_common::events::EventBus;
use boardsync_common::models::{Board, Card, PropertyTemplate, Proposal};
use boardsync_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::lock::{BoardGuard, BoardLocks};
use crate::materializer::{omit_private_fields, MaterializeOutcome, Materializer};
use crate::relation::RelationSync;
use crate::schema::SchemaReconciler;
use crate::store::{
    CardStore, NotificationSink, PermissionService, ProposalStore, SqliteCardStore,
    SqlitePermissionService, SqliteProposalStore,
};

/// Result of a full board sync
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub board_id: Uuid,
    pub properties: usize,
    #[serde(flatten)]
    pub outcome: MaterializeOutcome,
}

pub struct SyncService {
    proposals: Arc<dyn ProposalStore>,
    cards: Arc<dyn CardStore>,
    permissions: Arc<dyn PermissionService>,
    locks: BoardLocks,
    schema: SchemaReconciler,
    materializer: Materializer,
    relations: RelationSync,
}

impl SyncService {
    pub fn new(
        proposals: Arc<dyn ProposalStore>,
        cards: Arc<dyn CardStore>,
        permissions: Arc<dyn PermissionService>,
        notifier: Arc<dyn NotificationSink>,
        config: SyncConfig,
    ) -> Self {
        Self {
            schema: SchemaReconciler::new(proposals.clone(), cards.clone(), notifier.clone()),
            materializer: Materializer::new(
                proposals.clone(),
                cards.clone(),
                permissions.clone(),
                notifier.clone(),
                config,
            ),
            relations: RelationSync::new(cards.clone(), notifier),
            proposals,
            cards,
            permissions,
            locks: BoardLocks::new(),
        }
    }

    /// Service backed by the SQLite stores, publishing to `bus`
    pub fn sqlite(pool: SqlitePool, config: SyncConfig, bus: EventBus) -> Self {
        Self::new(
            Arc::new(SqliteProposalStore::new(pool.clone())),
            Arc::new(SqliteCardStore::new(pool.clone())),
            Arc::new(SqlitePermissionService::new(pool)),
            Arc::new(bus),
            config,
        )
    }

    async fn board(&self, board_id: Uuid) -> Result<Board> {
        self.cards
            .get_board(board_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Board {}", board_id)))
    }

    pub async fn reconcile_schema(&self, board_id: Uuid) -> Result<Vec<PropertyTemplate>> {
        let _guard = self.locks.lock(board_id).await;
        let board = self.schema.reconcile_board(board_id).await?;
        Ok(board.fields.card_properties)
    }

    pub async fn materialize_cards(&self, board_id: Uuid) -> Result<MaterializeOutcome> {
        let _guard = self.locks.lock(board_id).await;
        let board = self.board(board_id).await?;
        self.materializer.materialize(&board).await
    }

    /// Reconcile the schema, then materialize cards against it, under one lock
    pub async fn sync_board(&self, board_id: Uuid) -> Result<SyncReport> {
        let _guard = self.locks.lock(board_id).await;
        let board = self.schema.reconcile_board(board_id).await?;
        let outcome = self.materializer.materialize(&board).await?;

        info!(
            board_id = %board_id,
            properties = board.fields.card_properties.len(),
            created = outcome.created,
            updated = outcome.updated,
            deleted = outcome.deleted,
            "Board synced"
        );

        Ok(SyncReport {
            board_id,
            properties: board.fields.card_properties.len(),
            outcome,
        })
    }

    /// Board on the other side of a relation property, or the board itself
    /// when the property is unknown (the operation reports that error)
    async fn relation_target(&self, board_id: Uuid, property_id: &str) -> Result<Uuid> {
        let board = self.board(board_id).await?;
        Ok(board
            .property(property_id)
            .and_then(|p| p.relation_data.as_ref())
            .map(|r| r.board_id)
            .unwrap_or(board_id))
    }

    /// Lock a relation's board and its target board.
    ///
    /// The target is resolved again once both locks are held; if the property
    /// was pointed elsewhere in between, the locks are released and taken on
    /// the new pair.
    async fn lock_relation(&self, board_id: Uuid, property_id: &str) -> Result<BoardGuard> {
        let mut target = self.relation_target(board_id, property_id).await?;
        loop {
            let guard = self.locks.lock_pair(board_id, target).await;
            let current = self.relation_target(board_id, property_id).await?;
            if current == target {
                return Ok(guard);
            }
            debug!(board_id = %board_id, property_id, "Relation target moved, relocking");
            drop(guard);
            target = current;
        }
    }

    pub async fn sync_relation_property(
        &self,
        board_id: Uuid,
        property_id: &str,
        label: Option<String>,
    ) -> Result<Board> {
        let _guard = self.lock_relation(board_id, property_id).await?;
        self.relations
            .sync_relation_property(board_id, property_id, label)
            .await
    }

    pub async fn sync_related_cards_values(
        &self,
        board_id: Uuid,
        property_id: &str,
        card_id: Uuid,
        target_ids: Vec<Uuid>,
    ) -> Result<Card> {
        let _guard = self.lock_relation(board_id, property_id).await?;
        self.relations
            .sync_related_cards_values(board_id, property_id, card_id, target_ids)
            .await
    }

    pub async fn remove_relation_property(
        &self,
        board_id: Uuid,
        property_id: &str,
        remove_both: bool,
    ) -> Result<Board> {
        let _guard = self.lock_relation(board_id, property_id).await?;
        self.relations
            .remove_relation_property(board_id, property_id, remove_both)
            .await
    }

    /// A card as `viewer` may see it.
    ///
    /// Proposal-backed cards are hidden (NotFound) from viewers who cannot
    /// read the proposal. Private columns are dropped unless the viewer may
    /// see private fields.
    pub async fn card_for_viewer(&self, card_id: Uuid, viewer: Uuid) -> Result<Card> {
        let mut card = self
            .cards
            .get_card(card_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Card {}", card_id)))?;
        let board = self.board(card.board_id).await?;

        let can_view_private = match card.sync_with_page_id {
            Some(proposal_id) => {
                let permissions = self
                    .permissions
                    .compute_permissions(card.space_id, proposal_id, viewer)
                    .await?;
                if !permissions.can_read {
                    return Err(Error::NotFound(format!("Card {}", card_id)));
                }
                permissions.can_view_private_fields
            }
            None => false,
        };

        if !can_view_private {
            omit_private_fields(&mut card, &board.fields.card_properties);
        }
        Ok(card)
    }

    /// The proposal a card mirrors.
    ///
    /// Strict lookup: NotFound when the card or its proposal no longer exists,
    /// InvalidState when the card is not backed by a proposal.
    pub async fn source_of(&self, card_id: Uuid) -> Result<Proposal> {
        let card = self
            .cards
            .get_card(card_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Card {}", card_id)))?;
        let proposal_id = card.sync_with_page_id.ok_or_else(|| {
            Error::InvalidState(format!("Card {} is not backed by a proposal", card_id))
        })?;

        self.proposals
            .get_proposal(proposal_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Proposal {} behind card {}", proposal_id, card_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::sqlite::seed;
    use crate::store::StoreBatch;
    use boardsync_common::db::init_database;
    use boardsync_common::models::{BoardFields, PropertyType, RelationData, RelationLimit, SourceType};
    use chrono::Utc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn relation(target: Uuid) -> PropertyTemplate {
        let mut property = PropertyTemplate::new("Related", PropertyType::Relation);
        property.id = "rel".to_string();
        property.relation_data = Some(RelationData {
            board_id: target,
            related_property_id: None,
            limit: RelationLimit::MultiplePage,
            show_on_related_board: false,
        });
        property
    }

    async fn board(pool: &SqlitePool, space_id: Uuid, card_properties: Vec<PropertyTemplate>) -> Board {
        let board = Board {
            id: Uuid::new_v4(),
            space_id,
            title: "Board".to_string(),
            created_by: Uuid::new_v4(),
            fields: BoardFields {
                source_type: Some(SourceType::BoardPage),
                card_properties,
                ..BoardFields::default()
            },
            updated_at: Utc::now(),
        };
        seed::insert_board(pool, &board).await.unwrap();
        board
    }

    #[tokio::test]
    async fn test_relation_lock_follows_retargeted_property() {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("boardsync.db")).await.unwrap();
        let service = Arc::new(SyncService::sqlite(
            pool.clone(),
            SyncConfig::default(),
            EventBus::new(16),
        ));
        let space_id = Uuid::new_v4();
        let y = board(&pool, space_id, Vec::new()).await;
        let z = board(&pool, space_id, Vec::new()).await;
        let x = board(&pool, space_id, vec![relation(y.id)]).await.id;

        let y_guard = service.locks.lock(y.id).await;
        let task = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.sync_relation_property(x, "rel", None).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        // Point the relation at Z while the operation waits, then hold Z
        service
            .cards
            .apply_batch(StoreBatch {
                board_properties: vec![(x, vec![relation(z.id)])],
                ..StoreBatch::default()
            })
            .await
            .unwrap();
        let z_guard = service.locks.lock(z.id).await;
        drop(y_guard);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished(), "operation must wait for the new target's lock");

        drop(z_guard);
        let linked = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let target = linked.property("rel").unwrap().relation_data.clone().unwrap();
        assert_eq!(target.board_id, z.id);

        let z = service.cards.get_board(z.id).await.unwrap().unwrap();
        assert_eq!(z.fields.card_properties.len(), 1);
    }
}
