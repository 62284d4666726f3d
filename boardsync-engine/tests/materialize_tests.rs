//! Materialization passes under caps, failing writes and concurrent callers

mod helpers;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use boardsync_common::config::SyncConfig;
use boardsync_common::events::SyncEvent;
use boardsync_common::models::{Board, BoardView, Card, CardUpdate, PropertyMap, RelationLimit};
use boardsync_common::{Error, Result};
use boardsync_engine::store::sqlite::seed;
use boardsync_engine::store::{
    CardStore, SqliteCardStore, SqlitePermissionService, SqliteProposalStore, StoreBatch,
};
use boardsync_engine::SyncService;
use helpers::{card_with, plain_board, proposal, proposal_board, relation_property, rubric_step, test_env, TestEnv};
use uuid::Uuid;

/// Card store refusing to create cards with a given title
struct RefusingCardStore {
    inner: SqliteCardStore,
    refused_title: String,
}

#[async_trait]
impl CardStore for RefusingCardStore {
    async fn get_board(&self, board_id: Uuid) -> Result<Option<Board>> {
        self.inner.get_board(board_id).await
    }

    async fn list_boards(&self, space_id: Uuid) -> Result<Vec<Board>> {
        self.inner.list_boards(space_id).await
    }

    async fn list_views(&self, board_id: Uuid) -> Result<Vec<BoardView>> {
        self.inner.list_views(board_id).await
    }

    async fn list_cards(&self, board_id: Uuid) -> Result<Vec<Card>> {
        self.inner.list_cards(board_id).await
    }

    async fn list_synced_cards(&self, board_id: Uuid) -> Result<HashMap<Uuid, Card>> {
        self.inner.list_synced_cards(board_id).await
    }

    async fn get_card(&self, card_id: Uuid) -> Result<Option<Card>> {
        self.inner.get_card(card_id).await
    }

    async fn create_card(&self, card: &Card) -> Result<()> {
        if card.title == self.refused_title {
            return Err(Error::Internal(format!("refusing to write {}", card.title)));
        }
        self.inner.create_card(card).await
    }

    async fn update_card(&self, update: &CardUpdate) -> Result<Card> {
        self.inner.update_card(update).await
    }

    async fn apply_batch(&self, batch: StoreBatch) -> Result<()> {
        self.inner.apply_batch(batch).await
    }
}

fn service_with(env: &TestEnv, cards: Arc<dyn CardStore>, config: SyncConfig) -> SyncService {
    SyncService::new(
        Arc::new(SqliteProposalStore::new(env.pool.clone())),
        cards,
        Arc::new(SqlitePermissionService::new(env.pool.clone())),
        Arc::new(env.bus.clone()),
        config,
    )
}

fn capped(max_records_per_pass: u32) -> SyncConfig {
    SyncConfig {
        page_size: 2,
        max_records_per_pass,
        ..SyncConfig::default()
    }
}

#[tokio::test]
async fn test_record_cap_truncates_pass() {
    let env = test_env().await;
    let board = proposal_board(&env, false).await;
    for i in 0..5 {
        seed::upsert_proposal(&env.pool, &proposal(&env, &format!("P{}", i), i)).await.unwrap();
    }

    let service = service_with(&env, Arc::new(env.cards.clone()), capped(2));
    let report = service.sync_board(board.id).await.unwrap();
    assert!(report.outcome.truncated);
    assert_eq!(report.outcome.created, 2);
    assert_eq!(env.cards.list_synced_cards(board.id).await.unwrap().len(), 2);

    // Uncapped pass picks up the rest
    let report = env.service.sync_board(board.id).await.unwrap();
    assert!(!report.outcome.truncated);
    assert_eq!(report.outcome.created, 3);
}

#[tokio::test]
async fn test_capped_pass_keeps_cards_it_never_visited() {
    let env = test_env().await;
    let board = proposal_board(&env, false).await;
    for i in 0..4 {
        seed::upsert_proposal(&env.pool, &proposal(&env, &format!("P{}", i), i)).await.unwrap();
    }
    env.service.sync_board(board.id).await.unwrap();

    let service = service_with(&env, Arc::new(env.cards.clone()), capped(2));
    let report = service.sync_board(board.id).await.unwrap();

    assert!(report.outcome.truncated);
    assert_eq!(report.outcome.deleted, 0);
    assert_eq!(env.cards.list_synced_cards(board.id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_failed_record_reported_and_page_still_written() {
    let env = test_env().await;
    let board = proposal_board(&env, false).await;
    let broken = proposal(&env, "Broken", 1);
    for p in [proposal(&env, "First", 0), broken.clone(), proposal(&env, "Third", 2)] {
        seed::upsert_proposal(&env.pool, &p).await.unwrap();
    }

    let refusing = RefusingCardStore {
        inner: env.cards.clone(),
        refused_title: "Broken".to_string(),
    };
    let service = service_with(&env, Arc::new(refusing), SyncConfig { page_size: 2, ..SyncConfig::default() });
    let report = service.sync_board(board.id).await.unwrap();

    assert_eq!(report.outcome.created, 2);
    assert_eq!(report.outcome.failures.len(), 1);
    assert_eq!(report.outcome.failures[0].proposal_id, broken.id);
    let synced = env.cards.list_synced_cards(board.id).await.unwrap();
    assert_eq!(synced.len(), 2);
    assert!(!synced.contains_key(&broken.id));

    // The next pass retries the failed record
    let report = env.service.sync_board(board.id).await.unwrap();
    assert_eq!(report.outcome.created, 1);
    assert!(report.outcome.failures.is_empty());
}

#[tokio::test]
async fn test_concurrent_syncs_do_not_duplicate_templates() {
    let env = test_env().await;
    let board = proposal_board(&env, false).await;
    let reviewer = Uuid::new_v4();
    for i in 0..3 {
        let mut p = proposal(&env, &format!("P{}", i), i);
        p.evaluations.push(rubric_step("Review", 0, None, &[("Impact", vec![(reviewer, 3.0)])]));
        seed::upsert_proposal(&env.pool, &p).await.unwrap();
    }

    let (first, second) = tokio::join!(env.service.sync_board(board.id), env.service.sync_board(board.id));
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_eq!(first.outcome.created + second.outcome.created, 3);

    let board = env.cards.get_board(board.id).await.unwrap().unwrap();
    let mut keys = HashSet::new();
    for template in &board.fields.card_properties {
        let key = (
            template.property_type,
            template.evaluation_title.clone(),
            template.criteria_title.clone(),
            template.reviewer_id.clone(),
            template.form_field_id.clone(),
        );
        assert!(keys.insert(key), "duplicate template {}", template.name);
    }
    assert_eq!(env.cards.list_synced_cards(board.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_orphan_deletion_unlinks_related_cards() {
    let env = test_env().await;
    let board = proposal_board(&env, false).await;
    let p = proposal(&env, "Grant", 0);
    seed::upsert_proposal(&env.pool, &p).await.unwrap();
    env.service.sync_board(board.id).await.unwrap();
    let card_id = env.cards.list_synced_cards(board.id).await.unwrap()[&p.id].id;

    let milestones = plain_board(&env, "Milestones", vec![relation_property("rel", board.id, RelationLimit::MultiplePage)]).await;
    let b1 = card_with(&env, &milestones, "B1", PropertyMap::new()).await;
    env.service.sync_relation_property(milestones.id, "rel", None).await.unwrap();
    env.service
        .sync_related_cards_values(milestones.id, "rel", b1.id, vec![card_id])
        .await
        .unwrap();

    let mut events = env.bus.subscribe();
    seed::delete_proposal(&env.pool, p.id).await.unwrap();
    let report = env.service.sync_board(board.id).await.unwrap();

    assert_eq!(report.outcome.deleted, 1);
    assert!(env.cards.get_card(card_id).await.unwrap().is_none());
    let b1 = env.cards.get_card(b1.id).await.unwrap().unwrap();
    assert!(!b1.properties.contains_key("rel"));

    let mut unlinked = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SyncEvent::RecordsUpdated { cards, .. } = event {
            unlinked.extend(cards.into_iter().map(|c| c.id));
        }
    }
    assert_eq!(unlinked, vec![b1.id]);
}

#[tokio::test]
async fn test_source_lookup_is_strict() {
    let env = test_env().await;
    let board = proposal_board(&env, false).await;
    let p = proposal(&env, "Grant", 0);
    seed::upsert_proposal(&env.pool, &p).await.unwrap();
    env.service.sync_board(board.id).await.unwrap();
    let card_id = env.cards.list_synced_cards(board.id).await.unwrap()[&p.id].id;

    let source = env.service.source_of(card_id).await.unwrap();
    assert_eq!(source.id, p.id);
    assert_eq!(source.title, "Grant");

    seed::delete_proposal(&env.pool, p.id).await.unwrap();
    assert!(matches!(env.service.source_of(card_id).await, Err(Error::NotFound(_))));
    assert!(matches!(env.service.source_of(Uuid::new_v4()).await, Err(Error::NotFound(_))));

    let tasks = plain_board(&env, "Tasks", Vec::new()).await;
    let plain = card_with(&env, &tasks, "Plain", PropertyMap::new()).await;
    assert!(matches!(env.service.source_of(plain.id).await, Err(Error::InvalidState(_))));
}
