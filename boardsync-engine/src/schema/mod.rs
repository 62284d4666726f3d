//! Board schema reconciliation
//!
//! `descriptors` turns the proposal source into candidate templates,
//! `reconciler` merges them into the stored list. `SchemaReconciler` ties both
//! to the stores: it validates the board, persists a changed schema together
//! with view growth in one batch and notifies consumers.

use std::sync::Arc;

use boardsync_common::events::SyncEvent;
use boardsync_common::models::{Board, BoardView, PropertyTemplate, PropertyType};
use boardsync_common::{Error, Result};
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::{CardStore, NotificationSink, ProposalStore, StoreBatch};

pub mod descriptors;
pub mod reconciler;

pub use descriptors::{build_descriptors, MatchKey, PropertyDescriptor, SchemaInputs};
pub use reconciler::{reconcile, ReconcileOutcome};

/// Fail unless the board is backed by proposals
pub fn ensure_proposal_source(board: &Board) -> Result<()> {
    if board.is_proposal_source() {
        Ok(())
    } else {
        Err(Error::InvalidState(format!(
            "Board {} is not a proposals source (source type: {})",
            board.id,
            board
                .fields
                .source_type
                .map(|t| t.as_str())
                .unwrap_or("none")
        )))
    }
}

/// Append newly minted property ids to each view, never the evaluation-type id.
///
/// Returns only the views that changed.
pub fn grow_views(
    views: &[BoardView],
    properties: &[PropertyTemplate],
    added: &[String],
) -> Vec<BoardView> {
    let visible: Vec<&String> = added
        .iter()
        .filter(|id| {
            properties
                .iter()
                .find(|p| &p.id == *id)
                .is_some_and(|p| p.property_type != PropertyType::ProposalEvaluationType)
        })
        .collect();

    views
        .iter()
        .filter_map(|view| {
            let mut grown = view.clone();
            for id in visible.iter().copied() {
                if !grown.visible_property_ids.contains(id) {
                    grown.visible_property_ids.push(id.clone());
                }
            }
            (grown != *view).then_some(grown)
        })
        .collect()
}

pub struct SchemaReconciler {
    proposals: Arc<dyn ProposalStore>,
    cards: Arc<dyn CardStore>,
    notifier: Arc<dyn NotificationSink>,
}

impl SchemaReconciler {
    pub fn new(
        proposals: Arc<dyn ProposalStore>,
        cards: Arc<dyn CardStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            proposals,
            cards,
            notifier,
        }
    }

    /// Merge the proposal source into the board's schema and persist it if it changed
    pub async fn reconcile_board(&self, board_id: Uuid) -> Result<Board> {
        let board = self
            .cards
            .get_board(board_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Board {}", board_id)))?;
        ensure_proposal_source(&board)?;

        let summaries = self.proposals.evaluation_summaries(board.space_id).await?;
        let form_fields = self.proposals.form_fields(board.space_id).await?;
        let custom_properties = self
            .proposals
            .custom_properties(board.space_id, board.fields.source_config_id)
            .await?;

        let descriptors = build_descriptors(SchemaInputs {
            summaries: &summaries,
            form_fields: &form_fields,
            custom_properties: &custom_properties,
            reviewer_breakdown: board.fields.rubric_reviewer_breakdown,
        });
        let outcome = reconcile(&board.fields.card_properties, &descriptors);

        if !outcome.changed {
            debug!(board_id = %board.id, "Board schema unchanged");
            return Ok(board);
        }

        let views = self.cards.list_views(board.id).await?;
        let grown_views = grow_views(&views, &outcome.properties, &outcome.added);

        self.cards
            .apply_batch(StoreBatch {
                board_properties: vec![(board.id, outcome.properties.clone())],
                views: grown_views,
                ..StoreBatch::default()
            })
            .await?;

        info!(
            board_id = %board.id,
            added = outcome.added.len(),
            removed = outcome.removed.len(),
            properties = outcome.properties.len(),
            "Board schema updated"
        );

        let updated = self
            .cards
            .get_board(board.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Board {}", board.id)))?;
        self.notifier.publish(SyncEvent::schema_updated(updated.clone()));
        Ok(updated)
    }
}
