//! SQLite implementations of the collaborator traits
//!
//! Ids are stored as UUID strings, timestamps as fixed-width RFC 3339 strings
//! (so that text ordering matches time ordering) and structured columns as
//! JSON text.

use boardsync_common::models::{PermissionEntry, PermissionLevel};
use boardsync_common::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

mod cards;
mod permissions;
mod proposals;
pub mod seed;

pub use cards::SqliteCardStore;
pub use permissions::SqlitePermissionService;
pub use proposals::SqliteProposalStore;

pub(crate) fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp '{}': {}", value, e)))
}

pub(crate) fn parse_opt_time(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_time).transpose()
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid UUID '{}': {}", value, e)))
}

pub(crate) fn parse_opt_uuid(value: Option<String>) -> Result<Option<Uuid>> {
    value.as_deref().map(parse_uuid).transpose()
}

pub(crate) fn row_to_permission(row: &SqliteRow) -> Result<PermissionEntry> {
    let level: String = row.get("permission_level");
    let permission_level = PermissionLevel::parse(&level)
        .ok_or_else(|| Error::Internal(format!("Unknown permission level '{}'", level)))?;

    Ok(PermissionEntry {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        page_id: parse_uuid(&row.get::<String, _>("page_id"))?,
        permission_level,
        user_id: parse_opt_uuid(row.get("user_id"))?,
        role_id: parse_opt_uuid(row.get("role_id"))?,
        space_id: parse_opt_uuid(row.get("space_id"))?,
        public: row.get::<i64, _>("public") != 0,
        allow_discovery: row.get::<i64, _>("allow_discovery") != 0,
        inherited_from: parse_opt_uuid(row.get("inherited_from"))?,
    })
}

pub(crate) async fn insert_permission<'e, E>(executor: E, entry: &PermissionEntry) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO page_permissions
            (id, page_id, permission_level, user_id, role_id, space_id, public, allow_discovery, inherited_from)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.page_id.to_string())
    .bind(entry.permission_level.as_str())
    .bind(entry.user_id.map(|id| id.to_string()))
    .bind(entry.role_id.map(|id| id.to_string()))
    .bind(entry.space_id.map(|id| id.to_string()))
    .bind(entry.public as i64)
    .bind(entry.allow_discovery as i64)
    .bind(entry.inherited_from.map(|id| id.to_string()))
    .execute(executor)
    .await?;

    Ok(())
}
