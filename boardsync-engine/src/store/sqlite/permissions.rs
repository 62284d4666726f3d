//! Space membership based permissions

use async_trait::async_trait;
use boardsync_common::models::PermissionEntry;
use boardsync_common::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::row_to_permission;
use crate::store::{PermissionService, Permissions};

/// Members of a space can read its proposals. Proposal authors and space
/// admins can also see private fields.
#[derive(Clone)]
pub struct SqlitePermissionService {
    pool: SqlitePool,
}

impl SqlitePermissionService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionService for SqlitePermissionService {
    async fn compute_permissions(
        &self,
        space_id: Uuid,
        proposal_id: Uuid,
        user_id: Uuid,
    ) -> Result<Permissions> {
        let authors: Option<String> =
            sqlx::query_scalar("SELECT authors FROM proposals WHERE id = ? AND space_id = ?")
                .bind(proposal_id.to_string())
                .bind(space_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        let authors = authors.ok_or_else(|| Error::NotFound(format!("Proposal {}", proposal_id)))?;
        let authors: Vec<Uuid> = serde_json::from_str(&authors)?;
        let is_author = authors.contains(&user_id);

        let is_admin: Option<i64> =
            sqlx::query_scalar("SELECT is_admin FROM space_members WHERE space_id = ? AND user_id = ?")
                .bind(space_id.to_string())
                .bind(user_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        let is_member = is_admin.is_some();
        let is_admin = is_admin.unwrap_or(0) != 0;

        Ok(Permissions {
            can_read: is_member || is_author,
            can_view_private_fields: is_admin || is_author,
        })
    }

    async fn permission_entries_of(&self, board_id: Uuid) -> Result<Vec<PermissionEntry>> {
        let rows = sqlx::query("SELECT * FROM page_permissions WHERE page_id = ?")
            .bind(board_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_permission).collect()
    }
}
