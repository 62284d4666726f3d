//! Relation link synchronization
//!
//! A relation property on board X pointing at board Y is mirrored by an
//! inverse property on Y whose `related_property_id` points back. Whenever
//! card A on X lists card B, B's inverse property lists A. Every operation
//! gathers its schema and card rewrites into one `StoreBatch` so the store
//! applies them in a single transaction.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use boardsync_common::events::SyncEvent;
use boardsync_common::models::{
    Board, Card, PropertyMap, PropertyTemplate, PropertyType, PropertyValue, RelationData,
    RelationLimit,
};
use boardsync_common::{Error, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::store::{CardStore, NotificationSink, StoreBatch};

/// Split a relation edit into (added, removed) target ids, both in input order
pub fn diff_targets(previous: &[Uuid], next: &[Uuid]) -> (Vec<Uuid>, Vec<Uuid>) {
    let added = next.iter().filter(|id| !previous.contains(id)).copied().collect();
    let removed = previous.iter().filter(|id| !next.contains(id)).copied().collect();
    (added, removed)
}

fn dedupe(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}

/// Append `card_id` to a relation value; true if it was not there yet
fn link(properties: &mut PropertyMap, property_id: &str, card_id: Uuid) -> bool {
    let mut ids = properties.get(property_id).map(PropertyValue::as_list).unwrap_or_default();
    let id = card_id.to_string();
    if ids.contains(&id) {
        return false;
    }
    ids.push(id);
    properties.insert(property_id.to_string(), PropertyValue::List(ids));
    true
}

/// Drop `card_id` from a relation value, removing the key once empty
fn unlink(properties: &mut PropertyMap, property_id: &str, card_id: Uuid) -> bool {
    let Some(value) = properties.get(property_id) else {
        return false;
    };
    let id = card_id.to_string();
    let mut ids = value.as_list();
    let before = ids.len();
    ids.retain(|existing| existing != &id);
    if ids.len() == before {
        return false;
    }
    if ids.is_empty() {
        properties.remove(property_id);
    } else {
        properties.insert(property_id.to_string(), PropertyValue::List(ids));
    }
    true
}

fn related_uuids(card: &Card, property_id: &str) -> Vec<Uuid> {
    card.related_ids(property_id)
        .iter()
        .filter_map(|id| Uuid::parse_str(id).ok())
        .collect()
}

/// Relation properties, grouped by board, whose values hold cards of `target_board_id`
pub fn properties_targeting(boards: &[Board], target_board_id: Uuid) -> Vec<(Uuid, Vec<String>)> {
    boards
        .iter()
        .filter_map(|board| {
            let property_ids: Vec<String> = board
                .fields
                .card_properties
                .iter()
                .filter(|p| p.relation_data.as_ref().is_some_and(|r| r.board_id == target_board_id))
                .map(|p| p.id.clone())
                .collect();
            (!property_ids.is_empty()).then_some((board.id, property_ids))
        })
        .collect()
}

/// Property maps of the cards that referenced any of `removed`, with those references dropped
pub fn strip_references(
    cards: &[Card],
    property_ids: &[String],
    removed: &HashSet<Uuid>,
) -> Vec<(Uuid, PropertyMap)> {
    let mut stripped = Vec::new();
    for card in cards {
        let mut properties = card.properties.clone();
        let mut changed = false;
        for property_id in property_ids {
            for target_id in related_uuids(card, property_id) {
                if removed.contains(&target_id) {
                    changed |= unlink(&mut properties, property_id, target_id);
                }
            }
        }
        if changed {
            stripped.push((card.id, properties));
        }
    }
    stripped
}

/// Schema and card rewrites collected before one batch write
#[derive(Default)]
struct PendingWrites {
    schemas: BTreeMap<Uuid, Vec<PropertyTemplate>>,
    original: HashMap<Uuid, PropertyMap>,
    working: HashMap<Uuid, PropertyMap>,
}

impl PendingWrites {
    fn schema_mut(&mut self, board: &Board) -> &mut Vec<PropertyTemplate> {
        self.schemas
            .entry(board.id)
            .or_insert_with(|| board.fields.card_properties.clone())
    }

    fn track(&mut self, card: &Card) {
        self.original
            .entry(card.id)
            .or_insert_with(|| card.properties.clone());
        self.working
            .entry(card.id)
            .or_insert_with(|| card.properties.clone());
    }

    fn card_mut(&mut self, card_id: Uuid) -> Option<&mut PropertyMap> {
        self.working.get_mut(&card_id)
    }

    /// Batch of every changed card plus the collected schemas
    fn into_batch(self) -> StoreBatch {
        let original = self.original;
        let mut card_properties: Vec<(Uuid, PropertyMap)> = self
            .working
            .into_iter()
            .filter(|(id, properties)| original.get(id) != Some(properties))
            .collect();
        card_properties.sort_by_key(|(id, _)| *id);

        StoreBatch {
            board_properties: self.schemas.into_iter().collect(),
            card_properties,
            ..StoreBatch::default()
        }
    }
}

fn property_mut<'a>(schema: &'a mut [PropertyTemplate], property_id: &str) -> Option<&'a mut PropertyTemplate> {
    schema.iter_mut().find(|p| p.id == property_id)
}

pub struct RelationSync {
    cards: Arc<dyn CardStore>,
    notifier: Arc<dyn NotificationSink>,
}

impl RelationSync {
    pub fn new(cards: Arc<dyn CardStore>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { cards, notifier }
    }

    async fn board(&self, board_id: Uuid) -> Result<Board> {
        self.cards
            .get_board(board_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Board {}", board_id)))
    }

    /// Board, relation template and its link metadata, or the matching error
    async fn relation_of(&self, board_id: Uuid, property_id: &str) -> Result<(Board, PropertyTemplate, RelationData)> {
        let board = self.board(board_id).await?;
        let property = board
            .property(property_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Property {} on board {}", property_id, board_id)))?;
        let relation = property.relation_data.clone().ok_or_else(|| {
            Error::InvalidState(format!("Property {} has no relation link metadata", property_id))
        })?;
        Ok((board, property, relation))
    }

    /// Apply the batch, then publish the post-write state of every touched board and card
    async fn commit(&self, pending: PendingWrites) -> Result<()> {
        let batch = pending.into_batch();
        if batch.is_empty() {
            return Ok(());
        }

        let board_ids: Vec<Uuid> = batch.board_properties.iter().map(|(id, _)| *id).collect();
        let card_ids: Vec<Uuid> = batch.card_properties.iter().map(|(id, _)| *id).collect();
        self.cards.apply_batch(batch).await?;

        for board_id in board_ids {
            if let Some(board) = self.cards.get_board(board_id).await? {
                self.notifier.publish(SyncEvent::schema_updated(board));
            }
        }

        let mut by_space: BTreeMap<Uuid, Vec<Card>> = BTreeMap::new();
        for card_id in card_ids {
            if let Some(card) = self.cards.get_card(card_id).await? {
                by_space.entry(card.space_id).or_default().push(card);
            }
        }
        for (space_id, cards) in by_space {
            self.notifier.publish(SyncEvent::records_updated(space_id, cards));
        }
        Ok(())
    }

    /// Link a relation property to an inverse property on its target board.
    ///
    /// Creates the inverse when missing and backfills it from every source
    /// card holding values.
    pub async fn sync_relation_property(
        &self,
        board_id: Uuid,
        property_id: &str,
        label: Option<String>,
    ) -> Result<Board> {
        let (board, _, relation) = self.relation_of(board_id, property_id).await?;
        let same_board = relation.board_id == board.id;
        let target = if same_board {
            board.clone()
        } else {
            self.board(relation.board_id).await?
        };

        let mut pending = PendingWrites::default();

        let existing_inverse = relation
            .related_property_id
            .as_deref()
            .and_then(|id| target.property(id))
            .or_else(|| {
                target.fields.card_properties.iter().find(|p| {
                    p.relation_data.as_ref().is_some_and(|r| {
                        r.board_id == board.id && r.related_property_id.as_deref() == Some(property_id)
                    })
                })
            })
            .map(|p| p.id.clone());

        let inverse_id = match existing_inverse {
            Some(id) => {
                if let Some(inverse) = property_mut(pending.schema_mut(&target), &id) {
                    let data = inverse.relation_data.get_or_insert(RelationData {
                        board_id: board.id,
                        related_property_id: None,
                        limit: RelationLimit::MultiplePage,
                        show_on_related_board: true,
                    });
                    data.board_id = board.id;
                    data.related_property_id = Some(property_id.to_string());
                    data.show_on_related_board = true;
                }
                id
            }
            None => {
                let mut inverse = PropertyTemplate::new(
                    label.unwrap_or_else(|| format!("Related to {}", board.title)),
                    PropertyType::Relation,
                );
                inverse.relation_data = Some(RelationData {
                    board_id: board.id,
                    related_property_id: Some(property_id.to_string()),
                    limit: RelationLimit::MultiplePage,
                    show_on_related_board: true,
                });
                let id = inverse.id.clone();
                pending.schema_mut(&target).push(inverse);
                info!(board_id = %target.id, property_id = %id, "Created inverse relation property");
                id
            }
        };

        if let Some(source) = property_mut(pending.schema_mut(&board), property_id) {
            if let Some(data) = source.relation_data.as_mut() {
                data.related_property_id = Some(inverse_id.clone());
                data.show_on_related_board = true;
            }
        }

        let source_cards = self.cards.list_cards(board.id).await?;
        let target_cards = if same_board {
            Vec::new()
        } else {
            self.cards.list_cards(target.id).await?
        };
        for card in source_cards.iter().chain(target_cards.iter()) {
            pending.track(card);
        }

        let mut backfilled = 0usize;
        for card in source_cards.iter().filter(|c| c.deleted_at.is_none()) {
            for target_id in related_uuids(card, property_id) {
                match pending.card_mut(target_id) {
                    Some(properties) => {
                        if link(properties, &inverse_id, card.id) {
                            backfilled += 1;
                        }
                    }
                    None => debug!(
                        card_id = %card.id,
                        target_id = %target_id,
                        "Relation target not on the related board, skipping backfill"
                    ),
                }
            }
        }

        self.commit(pending).await?;
        info!(
            board_id = %board.id,
            property_id,
            related_board_id = %target.id,
            backfilled,
            "Relation property linked"
        );
        self.board(board.id).await
    }

    /// Replace one card's relation targets and mirror the difference onto the
    /// inverse property of the added and removed targets
    pub async fn sync_related_cards_values(
        &self,
        board_id: Uuid,
        property_id: &str,
        card_id: Uuid,
        target_ids: Vec<Uuid>,
    ) -> Result<Card> {
        let (_, _, relation) = self.relation_of(board_id, property_id).await?;
        let target_ids = dedupe(target_ids);
        if relation.limit == RelationLimit::SinglePage && target_ids.len() > 1 {
            return Err(Error::InvalidInput(format!(
                "Property {} holds a single related card, got {}",
                property_id,
                target_ids.len()
            )));
        }

        let card = self
            .cards
            .get_card(card_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Card {}", card_id)))?;
        if card.board_id != board_id {
            return Err(Error::InvalidInput(format!(
                "Card {} does not belong to board {}",
                card_id, board_id
            )));
        }

        let previous = related_uuids(&card, property_id);
        let (added, removed) = diff_targets(&previous, &target_ids);

        let mut pending = PendingWrites::default();
        pending.track(&card);

        if let Some(properties) = pending.card_mut(card.id) {
            if target_ids.is_empty() {
                properties.remove(property_id);
            } else {
                properties.insert(
                    property_id.to_string(),
                    PropertyValue::List(target_ids.iter().map(Uuid::to_string).collect()),
                );
            }
        }

        if let Some(inverse_id) = relation.related_property_id.as_deref() {
            for target_id in &added {
                let target = self
                    .cards
                    .get_card(*target_id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("Related card {}", target_id)))?;
                if target.board_id != relation.board_id {
                    return Err(Error::InvalidInput(format!(
                        "Card {} is not on related board {}",
                        target_id, relation.board_id
                    )));
                }
                pending.track(&target);
                if let Some(properties) = pending.card_mut(target.id) {
                    link(properties, inverse_id, card.id);
                }
            }

            for target_id in &removed {
                let Some(target) = self.cards.get_card(*target_id).await? else {
                    warn!(card_id = %card.id, target_id = %target_id, "Removed relation target no longer exists");
                    continue;
                };
                pending.track(&target);
                if let Some(properties) = pending.card_mut(target.id) {
                    unlink(properties, inverse_id, card.id);
                }
            }
        }

        self.commit(pending).await?;
        debug!(
            card_id = %card.id,
            property_id,
            added = added.len(),
            removed = removed.len(),
            "Relation values synced"
        );

        self.cards
            .get_card(card.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Card {}", card.id)))
    }

    /// Delete a relation property and its values.
    ///
    /// Without `remove_both` the inverse property stays with its values and
    /// only loses its link back; with it the inverse is deleted as well.
    pub async fn remove_relation_property(
        &self,
        board_id: Uuid,
        property_id: &str,
        remove_both: bool,
    ) -> Result<Board> {
        let (board, _, relation) = self.relation_of(board_id, property_id).await?;
        let mut pending = PendingWrites::default();

        pending.schema_mut(&board).retain(|p| p.id != property_id);
        for card in self.cards.list_cards(board.id).await? {
            if card.properties.contains_key(property_id) {
                pending.track(&card);
                if let Some(properties) = pending.card_mut(card.id) {
                    properties.remove(property_id);
                }
            }
        }

        if let Some(inverse_id) = relation.related_property_id.as_deref() {
            let target = if relation.board_id == board.id {
                Some(board.clone())
            } else {
                self.cards.get_board(relation.board_id).await?
            };

            match target {
                Some(target) if target.property(inverse_id).is_some() => {
                    if remove_both {
                        pending.schema_mut(&target).retain(|p| p.id != inverse_id);
                        for card in self.cards.list_cards(target.id).await? {
                            if card.properties.contains_key(inverse_id) {
                                pending.track(&card);
                                if let Some(properties) = pending.card_mut(card.id) {
                                    properties.remove(inverse_id);
                                }
                            }
                        }
                    } else if let Some(inverse) = property_mut(pending.schema_mut(&target), inverse_id) {
                        if let Some(data) = inverse.relation_data.as_mut() {
                            data.related_property_id = None;
                            data.show_on_related_board = false;
                        }
                    }
                }
                _ => warn!(
                    board_id = %board.id,
                    property_id,
                    inverse_id,
                    "Inverse relation property not found, removing source side only"
                ),
            }
        }

        self.commit(pending).await?;
        info!(board_id = %board.id, property_id, remove_both, "Relation property removed");
        self.board(board.id).await
    }
}
