//! Board, view and card storage

use std::collections::HashMap;

use async_trait::async_trait;
use boardsync_common::models::{
    Board, BoardFields, BoardView, Card, CardUpdate, PermissionEntry,
};
use boardsync_common::{Error, Result};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::{
    format_time, insert_permission, parse_opt_time, parse_opt_uuid, parse_time, parse_uuid,
    row_to_permission,
};
use crate::store::{CardStore, StoreBatch};

const CARD_COLUMNS: &str = "id, board_id, space_id, sync_with_page_id, title, content, content_text, \
     properties, created_by, created_at, updated_by, updated_at, deleted_at";

#[derive(Clone)]
pub struct SqliteCardStore {
    pool: SqlitePool,
}

impl SqliteCardStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Permission rows of every card on a board, grouped by card id
    async fn board_card_permissions(&self, board_id: Uuid) -> Result<HashMap<Uuid, Vec<PermissionEntry>>> {
        let rows = sqlx::query(
            r#"
            SELECT p.* FROM page_permissions p
            JOIN cards c ON p.page_id = c.id
            WHERE c.board_id = ?
            "#,
        )
        .bind(board_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<PermissionEntry>> = HashMap::new();
        for row in &rows {
            let entry = row_to_permission(row)?;
            grouped.entry(entry.page_id).or_default().push(entry);
        }
        Ok(grouped)
    }

    async fn cards_of_board(&self, board_id: Uuid) -> Result<Vec<Card>> {
        let rows = sqlx::query(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE board_id = ? ORDER BY created_at, id"
        ))
        .bind(board_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut permissions = self.board_card_permissions(board_id).await?;
        rows.iter()
            .map(|row| {
                let mut card = row_to_card(row)?;
                card.permissions = permissions.remove(&card.id).unwrap_or_default();
                Ok(card)
            })
            .collect()
    }
}

fn row_to_card(row: &SqliteRow) -> Result<Card> {
    Ok(Card {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        board_id: parse_uuid(&row.get::<String, _>("board_id"))?,
        space_id: parse_uuid(&row.get::<String, _>("space_id"))?,
        sync_with_page_id: parse_opt_uuid(row.get("sync_with_page_id"))?,
        title: row.get("title"),
        content: serde_json::from_str(&row.get::<String, _>("content"))?,
        content_text: row.get("content_text"),
        properties: serde_json::from_str(&row.get::<String, _>("properties"))?,
        created_by: parse_uuid(&row.get::<String, _>("created_by"))?,
        created_at: parse_time(&row.get::<String, _>("created_at"))?,
        updated_by: parse_uuid(&row.get::<String, _>("updated_by"))?,
        updated_at: parse_time(&row.get::<String, _>("updated_at"))?,
        deleted_at: parse_opt_time(row.get("deleted_at"))?,
        permissions: Vec::new(),
    })
}

pub(crate) fn row_to_board(row: &SqliteRow) -> Result<Board> {
    let fields: BoardFields = serde_json::from_str(&row.get::<String, _>("fields"))?;
    Ok(Board {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        space_id: parse_uuid(&row.get::<String, _>("space_id"))?,
        title: row.get("title"),
        created_by: parse_uuid(&row.get::<String, _>("created_by"))?,
        fields,
        updated_at: parse_time(&row.get::<String, _>("updated_at"))?,
    })
}

fn row_to_view(row: &SqliteRow) -> Result<BoardView> {
    Ok(BoardView {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        board_id: parse_uuid(&row.get::<String, _>("board_id"))?,
        title: row.get("title"),
        visible_property_ids: serde_json::from_str(&row.get::<String, _>("visible_property_ids"))?,
    })
}

#[async_trait]
impl CardStore for SqliteCardStore {
    async fn get_board(&self, board_id: Uuid) -> Result<Option<Board>> {
        let row = sqlx::query(
            "SELECT id, space_id, title, created_by, fields, updated_at FROM boards WHERE id = ?",
        )
        .bind(board_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_board).transpose()
    }

    async fn list_boards(&self, space_id: Uuid) -> Result<Vec<Board>> {
        let rows = sqlx::query(
            "SELECT id, space_id, title, created_by, fields, updated_at FROM boards WHERE space_id = ? ORDER BY id",
        )
        .bind(space_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_board).collect()
    }

    async fn list_views(&self, board_id: Uuid) -> Result<Vec<BoardView>> {
        let rows = sqlx::query(
            r#"
            SELECT id, board_id, title, visible_property_ids
            FROM board_views
            WHERE board_id = ?
            ORDER BY position, id
            "#,
        )
        .bind(board_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_view).collect()
    }

    async fn list_cards(&self, board_id: Uuid) -> Result<Vec<Card>> {
        self.cards_of_board(board_id).await
    }

    async fn list_synced_cards(&self, board_id: Uuid) -> Result<HashMap<Uuid, Card>> {
        Ok(self
            .cards_of_board(board_id)
            .await?
            .into_iter()
            .filter_map(|card| card.sync_with_page_id.map(|page_id| (page_id, card)))
            .collect())
    }

    async fn get_card(&self, card_id: Uuid) -> Result<Option<Card>> {
        let row = sqlx::query(&format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?"))
            .bind(card_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut card = row_to_card(&row)?;
        let permission_rows = sqlx::query("SELECT * FROM page_permissions WHERE page_id = ?")
            .bind(card_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        card.permissions = permission_rows
            .iter()
            .map(row_to_permission)
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(card))
    }

    async fn create_card(&self, card: &Card) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO cards ({CARD_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(card.id.to_string())
        .bind(card.board_id.to_string())
        .bind(card.space_id.to_string())
        .bind(card.sync_with_page_id.map(|id| id.to_string()))
        .bind(&card.title)
        .bind(serde_json::to_string(&card.content)?)
        .bind(&card.content_text)
        .bind(serde_json::to_string(&card.properties)?)
        .bind(card.created_by.to_string())
        .bind(format_time(&card.created_at))
        .bind(card.updated_by.to_string())
        .bind(format_time(&card.updated_at))
        .bind(card.deleted_at.as_ref().map(format_time))
        .execute(&mut *tx)
        .await?;

        for entry in &card.permissions {
            insert_permission(&mut *tx, entry).await?;
        }

        tx.commit().await?;
        debug!(card_id = %card.id, permissions = card.permissions.len(), "Card created");
        Ok(())
    }

    async fn update_card(&self, update: &CardUpdate) -> Result<Card> {
        let result = sqlx::query(
            r#"
            UPDATE cards
            SET title = ?, content = ?, content_text = ?, properties = ?,
                deleted_at = ?, updated_by = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.title)
        .bind(serde_json::to_string(&update.content)?)
        .bind(&update.content_text)
        .bind(serde_json::to_string(&update.properties)?)
        .bind(update.deleted_at.as_ref().map(format_time))
        .bind(update.updated_by.to_string())
        .bind(format_time(&Utc::now()))
        .bind(update.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Card {}", update.id)));
        }

        self.get_card(update.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Card {}", update.id)))
    }

    async fn apply_batch(&self, batch: StoreBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let now = format_time(&Utc::now());
        let mut tx = self.pool.begin().await?;

        for (board_id, properties) in &batch.board_properties {
            let fields: Option<String> = sqlx::query_scalar("SELECT fields FROM boards WHERE id = ?")
                .bind(board_id.to_string())
                .fetch_optional(&mut *tx)
                .await?;
            let fields = fields.ok_or_else(|| Error::NotFound(format!("Board {}", board_id)))?;

            let mut fields: BoardFields = serde_json::from_str(&fields)?;
            fields.card_properties = properties.clone();

            sqlx::query("UPDATE boards SET fields = ?, updated_at = ? WHERE id = ?")
                .bind(serde_json::to_string(&fields)?)
                .bind(&now)
                .bind(board_id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        for view in &batch.views {
            sqlx::query(
                r#"
                INSERT INTO board_views (id, board_id, title, visible_property_ids)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    visible_property_ids = excluded.visible_property_ids
                "#,
            )
            .bind(view.id.to_string())
            .bind(view.board_id.to_string())
            .bind(&view.title)
            .bind(serde_json::to_string(&view.visible_property_ids)?)
            .execute(&mut *tx)
            .await?;
        }

        for (card_id, properties) in &batch.card_properties {
            let result = sqlx::query("UPDATE cards SET properties = ?, updated_at = ? WHERE id = ?")
                .bind(serde_json::to_string(properties)?)
                .bind(&now)
                .bind(card_id.to_string())
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                return Err(Error::NotFound(format!("Card {}", card_id)));
            }
        }

        for card_id in &batch.deleted_cards {
            sqlx::query("DELETE FROM page_permissions WHERE page_id = ?")
                .bind(card_id.to_string())
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM cards WHERE id = ?")
                .bind(card_id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(
            boards = batch.board_properties.len(),
            views = batch.views.len(),
            cards = batch.card_properties.len(),
            deleted = batch.deleted_cards.len(),
            "Batch applied"
        );
        Ok(())
    }
}
