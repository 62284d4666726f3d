//! Database initialization
//!
//! Opens (or creates) the SQLite file and creates every table idempotently.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_tables(&pool).await?;

    Ok(pool)
}

/// Create every table and index if missing, then record the schema version
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_boards_table(pool).await?;
    create_board_views_table(pool).await?;
    create_cards_table(pool).await?;
    create_page_permissions_table(pool).await?;
    create_proposals_table(pool).await?;
    create_proposal_evaluations_table(pool).await?;
    create_rubric_criteria_table(pool).await?;
    create_rubric_answers_table(pool).await?;
    create_form_fields_table(pool).await?;
    create_proposal_template_boards_table(pool).await?;
    create_space_members_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Boards; `fields` holds the JSON-encoded BoardFields (source config and
/// property templates)
async fn create_boards_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS boards (
            id TEXT PRIMARY KEY,
            space_id TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            created_by TEXT NOT NULL,
            fields TEXT NOT NULL DEFAULT '{}',
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_boards_space ON boards(space_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_board_views_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS board_views (
            id TEXT PRIMARY KEY,
            board_id TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
            title TEXT NOT NULL DEFAULT '',
            visible_property_ids TEXT NOT NULL DEFAULT '[]',
            position INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_board_views_board ON board_views(board_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Cards; at most one live card per (board, proposal)
async fn create_cards_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cards (
            id TEXT PRIMARY KEY,
            board_id TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
            space_id TEXT NOT NULL,
            sync_with_page_id TEXT,
            title TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL DEFAULT 'null',
            content_text TEXT NOT NULL DEFAULT '',
            properties TEXT NOT NULL DEFAULT '{}',
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_by TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_cards_board_sync
        ON cards(board_id, sync_with_page_id)
        WHERE sync_with_page_id IS NOT NULL
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Permission rows for boards and cards (`page_id` is either)
async fn create_page_permissions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS page_permissions (
            id TEXT PRIMARY KEY,
            page_id TEXT NOT NULL,
            permission_level TEXT NOT NULL,
            user_id TEXT,
            role_id TEXT,
            space_id TEXT,
            public INTEGER NOT NULL DEFAULT 0,
            allow_discovery INTEGER NOT NULL DEFAULT 0,
            inherited_from TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_page_permissions_page ON page_permissions(page_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_proposals_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS proposals (
            id TEXT PRIMARY KEY,
            space_id TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL DEFAULT 'null',
            content_text TEXT NOT NULL DEFAULT '',
            path TEXT NOT NULL,
            status TEXT NOT NULL,
            archived INTEGER NOT NULL DEFAULT 0,
            authors TEXT NOT NULL DEFAULT '[]',
            form_id TEXT,
            form_answers TEXT NOT NULL DEFAULT '{}',
            custom_field_values TEXT NOT NULL DEFAULT '{}',
            project TEXT,
            has_published_rewards INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            deleted_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_proposals_space_created ON proposals(space_id, created_at, id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_proposal_evaluations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS proposal_evaluations (
            id TEXT PRIMARY KEY,
            proposal_id TEXT NOT NULL REFERENCES proposals(id) ON DELETE CASCADE,
            step_index INTEGER NOT NULL,
            title TEXT NOT NULL,
            evaluation_type TEXT NOT NULL,
            result TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_proposal_evaluations_proposal ON proposal_evaluations(proposal_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_rubric_criteria_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rubric_criteria (
            id TEXT PRIMARY KEY,
            evaluation_id TEXT NOT NULL REFERENCES proposal_evaluations(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            description TEXT,
            position INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_rubric_answers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rubric_answers (
            criteria_id TEXT NOT NULL REFERENCES rubric_criteria(id) ON DELETE CASCADE,
            evaluation_id TEXT NOT NULL REFERENCES proposal_evaluations(id) ON DELETE CASCADE,
            reviewer_id TEXT NOT NULL,
            reviewer_name TEXT,
            score REAL,
            comment TEXT,
            PRIMARY KEY (criteria_id, reviewer_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_form_fields_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS form_fields (
            id TEXT PRIMARY KEY,
            form_id TEXT NOT NULL,
            space_id TEXT NOT NULL,
            name TEXT NOT NULL,
            field_type TEXT NOT NULL,
            options TEXT NOT NULL DEFAULT '[]',
            private INTEGER NOT NULL DEFAULT 0,
            description TEXT,
            position INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_form_fields_space ON form_fields(space_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Per-space reference to the board holding imported custom proposal properties
async fn create_proposal_template_boards_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS proposal_template_boards (
            space_id TEXT PRIMARY KEY,
            board_id TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_space_members_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS space_members (
            space_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (space_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
