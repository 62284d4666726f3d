//! Database-backed fixtures
//!
//! Every `TestEnv` owns a fresh SQLite file in a temporary directory. The
//! page size is kept small so that a handful of proposals spans several pages.

use std::collections::BTreeMap;
use std::sync::Arc;

use boardsync_common::config::SyncConfig;
use boardsync_common::db::init_database;
use boardsync_common::events::EventBus;
use boardsync_common::models::{
    Board, BoardFields, BoardView, Card, EvaluationResult, EvaluationStep, PropertyMap,
    PropertyTemplate, PropertyType, Proposal, ProposalStatus, RelationData, RelationLimit,
    RubricAnswer, RubricCriteria, SourceType, StepType,
};
use boardsync_engine::store::sqlite::seed;
use boardsync_engine::store::{CardStore, SqliteCardStore};
use boardsync_engine::SyncService;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

pub struct TestEnv {
    /// Keeps the database directory alive for the duration of the test
    pub _dir: TempDir,
    pub pool: SqlitePool,
    pub bus: EventBus,
    pub service: Arc<SyncService>,
    pub cards: SqliteCardStore,
    pub space_id: Uuid,
    pub owner: Uuid,
}

pub async fn test_env() -> TestEnv {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("boardsync.db")).await.unwrap();
    let bus = EventBus::new(256);
    let config = SyncConfig {
        page_size: 2,
        worker_count: 3,
        ..SyncConfig::default()
    };
    let service = Arc::new(SyncService::sqlite(pool.clone(), config, bus.clone()));

    TestEnv {
        _dir: dir,
        cards: SqliteCardStore::new(pool.clone()),
        pool,
        bus,
        service,
        space_id: Uuid::new_v4(),
        owner: Uuid::new_v4(),
    }
}

async fn insert_board_with_view(env: &TestEnv, title: &str, fields: BoardFields) -> Board {
    let board = Board {
        id: Uuid::new_v4(),
        space_id: env.space_id,
        title: title.to_string(),
        created_by: env.owner,
        fields,
        updated_at: Utc::now(),
    };
    seed::insert_board(&env.pool, &board).await.unwrap();

    let view = BoardView {
        id: Uuid::new_v4(),
        board_id: board.id,
        title: "Table".to_string(),
        visible_property_ids: Vec::new(),
    };
    seed::insert_view(&env.pool, &view, 0).await.unwrap();
    board
}

/// Board sourcing its cards from the space's proposals
pub async fn proposal_board(env: &TestEnv, reviewer_breakdown: bool) -> Board {
    insert_board_with_view(
        env,
        "Proposals",
        BoardFields {
            source_type: Some(SourceType::Proposals),
            rubric_reviewer_breakdown: reviewer_breakdown,
            ..BoardFields::default()
        },
    )
    .await
}

/// Board without a proposal source
pub async fn plain_board(env: &TestEnv, title: &str, card_properties: Vec<PropertyTemplate>) -> Board {
    insert_board_with_view(
        env,
        title,
        BoardFields {
            source_type: Some(SourceType::BoardPage),
            card_properties,
            ..BoardFields::default()
        },
    )
    .await
}

/// Relation column pointing at `target_board`, not yet linked back
pub fn relation_property(id: &str, target_board: Uuid, limit: RelationLimit) -> PropertyTemplate {
    let mut property = PropertyTemplate::new("Related", PropertyType::Relation);
    property.id = id.to_string();
    property.relation_data = Some(RelationData {
        board_id: target_board,
        related_property_id: None,
        limit,
        show_on_related_board: false,
    });
    property
}

pub async fn card_with(env: &TestEnv, board: &Board, title: &str, properties: PropertyMap) -> Card {
    let now = Utc::now();
    let card = Card {
        id: Uuid::new_v4(),
        board_id: board.id,
        space_id: board.space_id,
        sync_with_page_id: None,
        title: title.to_string(),
        content: serde_json::Value::Null,
        content_text: String::new(),
        properties,
        created_by: env.owner,
        created_at: now,
        updated_by: env.owner,
        updated_at: now,
        deleted_at: None,
        permissions: Vec::new(),
    };
    env.cards.create_card(&card).await.unwrap();
    card
}

/// Published proposal with one author; `offset` orders proposals by creation time
pub fn proposal(env: &TestEnv, title: &str, offset: i64) -> Proposal {
    Proposal {
        id: Uuid::new_v4(),
        space_id: env.space_id,
        title: title.to_string(),
        content: serde_json::json!({"type": "doc", "content": []}),
        content_text: format!("{} body", title),
        path: format!("{}-{}", title.to_lowercase().replace(' ', "-"), offset),
        status: ProposalStatus::Published,
        archived: false,
        authors: vec![Uuid::new_v4()],
        evaluations: Vec::new(),
        form_id: None,
        form_answers: BTreeMap::new(),
        custom_field_values: BTreeMap::new(),
        project: None,
        has_published_rewards: false,
        created_at: Utc::now() - Duration::hours(1) + Duration::seconds(offset),
        deleted_at: None,
    }
}

/// Rubric step whose criteria receive the given (reviewer, score) answers
pub fn rubric_step(
    title: &str,
    index: i64,
    result: Option<EvaluationResult>,
    criteria: &[(&str, Vec<(Uuid, f64)>)],
) -> EvaluationStep {
    let mut rubric_criteria = Vec::new();
    let mut rubric_answers = Vec::new();
    for (criteria_title, answers) in criteria {
        let c = RubricCriteria {
            id: Uuid::new_v4(),
            title: criteria_title.to_string(),
            description: None,
        };
        for (reviewer, score) in answers {
            rubric_answers.push(RubricAnswer {
                criteria_id: c.id,
                reviewer_id: *reviewer,
                reviewer_name: None,
                score: Some(*score),
                comment: None,
            });
        }
        rubric_criteria.push(c);
    }

    EvaluationStep {
        id: Uuid::new_v4(),
        index,
        title: title.to_string(),
        evaluation_type: StepType::Rubric,
        result,
        rubric_criteria,
        rubric_answers,
    }
}

pub fn property_of(board: &Board, property_type: PropertyType) -> PropertyTemplate {
    board
        .fields
        .card_properties
        .iter()
        .find(|p| p.property_type == property_type)
        .cloned()
        .unwrap_or_else(|| panic!("board has no {} property", property_type.as_str()))
}

pub fn step_property(board: &Board, property_type: PropertyType, evaluation_title: &str) -> PropertyTemplate {
    board
        .fields
        .card_properties
        .iter()
        .find(|p| p.property_type == property_type && p.evaluation_title.as_deref() == Some(evaluation_title))
        .cloned()
        .unwrap_or_else(|| panic!("board has no {} property for {}", property_type.as_str(), evaluation_title))
}
