//! Card materialization
//!
//! Walks the proposal source page by page (keyset cursor, pages strictly in
//! order) and creates, updates or skips the card of every proposal. Records
//! within a page are written concurrently by a bounded pool of workers since
//! each write only touches its own card. A failing record is reported in the
//! outcome and does not abort the pass. After the last page every card whose
//! proposal no longer exists is hard-deleted, together with the relation
//! values that pointed at it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use boardsync_common::config::SyncConfig;
use boardsync_common::events::SyncEvent;
use boardsync_common::models::{
    Board, Card, CardUpdate, PermissionEntry, PropertyMap, PropertyTemplate, PropertyType,
    PropertyValue, Proposal,
};
use boardsync_common::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::relation::{properties_targeting, strip_references};
use crate::rubric::{
    reviewer_breakdown, scores_by_criteria_title, scores_by_step_title, CriteriaScores,
    ReviewerEntry, StepScores,
};
use crate::schema::descriptors::{
    PROJECT_DESCRIPTION_ID, PROJECT_EXCERPT_ID, PROJECT_GITHUB_ID, PROJECT_MEMBER_NAMES_ID,
    PROJECT_NAME_ID, PROJECT_TWITTER_ID, PROJECT_WEBSITE_ID,
};
use crate::schema::ensure_proposal_source;
use crate::store::{
    CardStore, NotificationSink, PageCursor, PermissionService, ProposalStore, StoreBatch,
};

/// A proposal whose card could not be written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    pub proposal_id: Uuid,
    pub message: String,
}

/// Counts of one materialization pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaterializeOutcome {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub failures: Vec<RecordFailure>,
    /// The pass stopped at the per-pass record cap before the last page
    pub truncated: bool,
}

#[derive(Debug)]
enum RecordAction {
    Created(Card),
    Updated(Card),
    Unchanged,
    /// No card and not eligible for one
    Skipped,
}

/// Per-proposal aggregates shared by every column of one card
struct DerivedScores {
    steps: std::collections::BTreeMap<String, StepScores>,
    criteria: std::collections::BTreeMap<String, CriteriaScores>,
    reviewers: std::collections::BTreeMap<(String, Uuid), ReviewerEntry>,
}

impl DerivedScores {
    fn of(proposal: &Proposal) -> Self {
        Self {
            steps: scores_by_step_title(&proposal.evaluations),
            criteria: scores_by_criteria_title(&proposal.evaluations),
            reviewers: reviewer_breakdown(&proposal.evaluations),
        }
    }
}

fn option_id_or_value(template: &PropertyTemplate, value: &str) -> PropertyValue {
    PropertyValue::Text(
        template
            .option_by_value(value)
            .map(|o| o.id.clone())
            .unwrap_or_else(|| value.to_string()),
    )
}

fn non_empty_text(value: &Option<String>) -> Option<PropertyValue> {
    value
        .as_ref()
        .filter(|v| !v.is_empty())
        .map(|v| PropertyValue::Text(v.clone()))
}

fn project_value(proposal: &Proposal, property_id: &str) -> Option<Option<PropertyValue>> {
    let project = proposal.project.as_ref();
    let value = match property_id {
        PROJECT_NAME_ID => project.and_then(|p| non_empty_text(&p.name)),
        PROJECT_EXCERPT_ID => project.and_then(|p| non_empty_text(&p.excerpt)),
        PROJECT_DESCRIPTION_ID => project.and_then(|p| non_empty_text(&p.description)),
        PROJECT_WEBSITE_ID => project.and_then(|p| non_empty_text(&p.website)),
        PROJECT_TWITTER_ID => project.and_then(|p| non_empty_text(&p.twitter)),
        PROJECT_GITHUB_ID => project.and_then(|p| non_empty_text(&p.github)),
        PROJECT_MEMBER_NAMES_ID => project
            .filter(|p| !p.member_names.is_empty())
            .map(|p| PropertyValue::List(p.member_names.clone())),
        _ => return None,
    };
    Some(value)
}

/// Value of one column for a proposal.
///
/// Outer None: the column is not fed by the proposal and keeps whatever the
/// card holds. Inner None: the column is fed by the proposal but has no value.
fn derived_value(
    template: &PropertyTemplate,
    proposal: &Proposal,
    scores: &DerivedScores,
) -> Option<Option<PropertyValue>> {
    let step_scores = || {
        template
            .evaluation_title
            .as_ref()
            .and_then(|title| scores.steps.get(title))
    };
    let criteria_scores = || {
        template
            .criteria_title
            .as_ref()
            .and_then(|title| scores.criteria.get(title))
    };
    let reviewer_entry = || {
        let title = template.criteria_title.clone()?;
        let reviewer = Uuid::parse_str(template.reviewer_id.as_deref()?).ok()?;
        scores.reviewers.get(&(title, reviewer))
    };

    let value = match template.property_type {
        PropertyType::ProposalStatus => Some(option_id_or_value(template, &proposal.status_value())),
        PropertyType::ProposalUrl => Some(PropertyValue::Text(proposal.path.clone())),
        PropertyType::ProposalAuthor => Some(PropertyValue::List(
            proposal.authors.iter().map(Uuid::to_string).collect(),
        )),
        PropertyType::ProposalStep => {
            Some(option_id_or_value(template, &proposal.current_step().title))
        }
        PropertyType::ProposalEvaluationType => Some(option_id_or_value(
            template,
            proposal.current_step().step_type.as_str(),
        )),
        PropertyType::ProposalReviewerNotes => return None,
        PropertyType::ProposalEvaluatedBy => step_scores().map(|s| {
            PropertyValue::List(s.evaluated_by.iter().map(Uuid::to_string).collect())
        }),
        PropertyType::ProposalEvaluationTotal => {
            step_scores().and_then(|s| s.total).map(PropertyValue::Number)
        }
        PropertyType::ProposalEvaluationAverage => {
            step_scores().and_then(|s| s.average).map(PropertyValue::Number)
        }
        PropertyType::ProposalRubricCriteriaTotal => {
            criteria_scores().and_then(|s| s.total).map(PropertyValue::Number)
        }
        PropertyType::ProposalRubricCriteriaAverage => {
            criteria_scores().and_then(|s| s.average).map(PropertyValue::Number)
        }
        PropertyType::ProposalRubricCriteriaReviewerScore => {
            reviewer_entry().and_then(|e| e.score).map(PropertyValue::Number)
        }
        PropertyType::ProposalRubricCriteriaReviewerComment => reviewer_entry()
            .and_then(|e| e.comment.clone())
            .map(PropertyValue::Text),
        _ => {
            if let Some(field_id) = &template.form_field_id {
                proposal.form_answers.get(field_id).cloned()
            } else if let Some(custom_id) = &template.proposal_field_id {
                proposal.custom_field_values.get(custom_id).cloned()
            } else {
                return project_value(proposal, &template.id);
            }
        }
    };

    Some(value)
}

/// Full property map of a proposal's card.
///
/// Starts from the card's current values (dropping keys no longer in the
/// schema) so that user-edited columns survive, then overwrites every column
/// fed by the proposal.
pub fn compute_properties(
    proposal: &Proposal,
    schema: &[PropertyTemplate],
    previous: Option<&PropertyMap>,
) -> PropertyMap {
    let schema_ids: HashSet<&str> = schema.iter().map(|p| p.id.as_str()).collect();
    let mut properties: PropertyMap = previous
        .map(|map| {
            map.iter()
                .filter(|(key, _)| schema_ids.contains(key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default();

    let scores = DerivedScores::of(proposal);
    for template in schema {
        match derived_value(template, proposal, &scores) {
            Some(Some(value)) => {
                properties.insert(template.id.clone(), value);
            }
            Some(None) => {
                properties.remove(&template.id);
            }
            None => {}
        }
    }

    properties
}

/// Drop the values of private columns
pub fn omit_private_fields(card: &mut Card, schema: &[PropertyTemplate]) {
    for template in schema.iter().filter(|p| p.private) {
        card.properties.remove(&template.id);
    }
}

pub struct Materializer {
    proposals: Arc<dyn ProposalStore>,
    cards: Arc<dyn CardStore>,
    permissions: Arc<dyn PermissionService>,
    notifier: Arc<dyn NotificationSink>,
    config: SyncConfig,
}

impl Materializer {
    pub fn new(
        proposals: Arc<dyn ProposalStore>,
        cards: Arc<dyn CardStore>,
        permissions: Arc<dyn PermissionService>,
        notifier: Arc<dyn NotificationSink>,
        config: SyncConfig,
    ) -> Self {
        Self {
            proposals,
            cards,
            permissions,
            notifier,
            config,
        }
    }

    /// Bring the board's cards in line with the proposal source.
    ///
    /// `board` must carry the already reconciled schema.
    pub async fn materialize(&self, board: &Board) -> Result<MaterializeOutcome> {
        ensure_proposal_source(board)?;

        let existing = self.cards.list_synced_cards(board.id).await?;
        let inherited = self.permissions.permission_entries_of(board.id).await?;
        let mut outcome = MaterializeOutcome::default();

        info!(
            board_id = %board.id,
            space_id = %board.space_id,
            existing_cards = existing.len(),
            "Materializing cards"
        );

        let mut cursor: Option<PageCursor> = None;
        let mut visited: u32 = 0;
        loop {
            let page = self
                .proposals
                .list_page(board.space_id, cursor, self.config.page_size)
                .await?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = Some(PageCursor::after(last));
            visited = visited.saturating_add(page.len() as u32);

            self.process_page(board, &page, &existing, &inherited, &mut outcome)
                .await;

            if page.len() < self.config.page_size as usize {
                break;
            }
            if visited >= self.config.max_records_per_pass {
                warn!(
                    board_id = %board.id,
                    visited,
                    cap = self.config.max_records_per_pass,
                    "Record cap reached, remaining proposals wait for the next pass"
                );
                outcome.truncated = true;
                break;
            }
        }

        self.sweep_orphans(board, &existing, &mut outcome).await?;

        info!(
            board_id = %board.id,
            created = outcome.created,
            updated = outcome.updated,
            deleted = outcome.deleted,
            unchanged = outcome.unchanged,
            failed = outcome.failures.len(),
            "Materialization complete"
        );

        Ok(outcome)
    }

    async fn process_page(
        &self,
        board: &Board,
        page: &[Proposal],
        existing: &HashMap<Uuid, Card>,
        inherited: &[PermissionEntry],
        outcome: &mut MaterializeOutcome,
    ) {
        let writes: Vec<_> = page
            .iter()
            .map(|proposal| async move {
                let action = self
                    .sync_record(board, existing.get(&proposal.id), proposal, inherited)
                    .await;
                (proposal.id, action)
            })
            .collect();
        let results: Vec<(Uuid, Result<RecordAction>)> = stream::iter(writes)
            .buffer_unordered(self.config.worker_count)
            .collect()
            .await;

        let mut created = Vec::new();
        let mut updated = Vec::new();
        for (proposal_id, result) in results {
            match result {
                Ok(RecordAction::Created(card)) => created.push(card),
                Ok(RecordAction::Updated(card)) => updated.push(card),
                Ok(RecordAction::Unchanged) => outcome.unchanged += 1,
                Ok(RecordAction::Skipped) => {}
                Err(e) => {
                    warn!(
                        board_id = %board.id,
                        proposal_id = %proposal_id,
                        error = %e,
                        "Failed to materialize card"
                    );
                    outcome.failures.push(RecordFailure {
                        proposal_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        outcome.created += created.len();
        outcome.updated += updated.len();
        if !created.is_empty() {
            self.notifier
                .publish(SyncEvent::records_created(board.space_id, created));
        }
        if !updated.is_empty() {
            self.notifier
                .publish(SyncEvent::records_updated(board.space_id, updated));
        }
    }

    async fn sync_record(
        &self,
        board: &Board,
        existing: Option<&Card>,
        proposal: &Proposal,
        inherited: &[PermissionEntry],
    ) -> Result<RecordAction> {
        let schema = &board.fields.card_properties;

        if let Some(card) = existing {
            let properties = compute_properties(proposal, schema, Some(&card.properties));
            let unchanged = card.title == proposal.title
                && card.content == proposal.content
                && card.content_text == proposal.content_text
                && card.deleted_at == proposal.deleted_at
                && card.properties == properties;
            if unchanged {
                return Ok(RecordAction::Unchanged);
            }

            let updated = self
                .cards
                .update_card(&CardUpdate {
                    id: card.id,
                    title: proposal.title.clone(),
                    content: proposal.content.clone(),
                    content_text: proposal.content_text.clone(),
                    properties,
                    deleted_at: proposal.deleted_at,
                    updated_by: board.created_by,
                })
                .await?;
            debug!(card_id = %card.id, proposal_id = %proposal.id, "Card updated");
            return Ok(RecordAction::Updated(updated));
        }

        if !proposal.is_eligible() {
            return Ok(RecordAction::Skipped);
        }

        let now = Utc::now();
        let card_id = Uuid::new_v4();
        let card = Card {
            id: card_id,
            board_id: board.id,
            space_id: board.space_id,
            sync_with_page_id: Some(proposal.id),
            title: proposal.title.clone(),
            content: proposal.content.clone(),
            content_text: proposal.content_text.clone(),
            properties: compute_properties(proposal, schema, None),
            created_by: board.created_by,
            created_at: now,
            updated_by: board.created_by,
            updated_at: now,
            deleted_at: None,
            permissions: inherited.iter().map(|e| e.inherited_by(card_id)).collect(),
        };
        self.cards.create_card(&card).await?;
        debug!(card_id = %card.id, proposal_id = %proposal.id, "Card created");
        Ok(RecordAction::Created(card))
    }

    /// Hard-delete cards whose proposal is gone.
    ///
    /// Relation values on any board of the space that point at a deleted card
    /// are rewritten in the same batch, so no card is left referencing one.
    async fn sweep_orphans(
        &self,
        board: &Board,
        existing: &HashMap<Uuid, Card>,
        outcome: &mut MaterializeOutcome,
    ) -> Result<()> {
        let syncable = self.proposals.syncable_ids(board.space_id).await?;
        let mut orphans: Vec<Uuid> = existing
            .iter()
            .filter(|(proposal_id, _)| !syncable.contains(proposal_id))
            .map(|(_, card)| card.id)
            .collect();

        if orphans.is_empty() {
            return Ok(());
        }
        orphans.sort();

        let removed: HashSet<Uuid> = orphans.iter().copied().collect();
        let boards = self.cards.list_boards(board.space_id).await?;
        let mut card_properties = Vec::new();
        for (board_id, property_ids) in properties_targeting(&boards, board.id) {
            let cards: Vec<Card> = self
                .cards
                .list_cards(board_id)
                .await?
                .into_iter()
                .filter(|card| !removed.contains(&card.id))
                .collect();
            card_properties.extend(strip_references(&cards, &property_ids, &removed));
        }
        let stripped: Vec<Uuid> = card_properties.iter().map(|(id, _)| *id).collect();

        self.cards
            .apply_batch(StoreBatch {
                card_properties,
                deleted_cards: orphans.clone(),
                ..StoreBatch::default()
            })
            .await?;
        outcome.deleted = orphans.len();
        info!(
            board_id = %board.id,
            deleted = orphans.len(),
            unlinked = stripped.len(),
            "Orphaned cards deleted"
        );

        self.notifier.publish(SyncEvent::records_deleted(
            board.space_id,
            board.id,
            orphans,
        ));
        if !stripped.is_empty() {
            let mut updated = Vec::with_capacity(stripped.len());
            for card_id in stripped {
                if let Some(card) = self.cards.get_card(card_id).await? {
                    updated.push(card);
                }
            }
            self.notifier
                .publish(SyncEvent::records_updated(board.space_id, updated));
        }
        Ok(())
    }
}
