//! Write helpers for the upstream side of the database
//!
//! The engine never writes proposals, forms or memberships itself; these
//! helpers exist for seeding a database and for tests.

use boardsync_common::models::{Board, BoardView, FormField, PermissionEntry, Proposal};
use boardsync_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_time, insert_permission};

/// Insert or replace a proposal with its whole evaluation pipeline
pub async fn upsert_proposal(pool: &SqlitePool, proposal: &Proposal) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO proposals
            (id, space_id, title, content, content_text, path, status, archived, authors, form_id,
             form_answers, custom_field_values, project, has_published_rewards, created_at, deleted_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            content = excluded.content,
            content_text = excluded.content_text,
            path = excluded.path,
            status = excluded.status,
            archived = excluded.archived,
            authors = excluded.authors,
            form_id = excluded.form_id,
            form_answers = excluded.form_answers,
            custom_field_values = excluded.custom_field_values,
            project = excluded.project,
            has_published_rewards = excluded.has_published_rewards,
            deleted_at = excluded.deleted_at
        "#,
    )
    .bind(proposal.id.to_string())
    .bind(proposal.space_id.to_string())
    .bind(&proposal.title)
    .bind(serde_json::to_string(&proposal.content)?)
    .bind(&proposal.content_text)
    .bind(&proposal.path)
    .bind(proposal.status.as_str())
    .bind(proposal.archived as i64)
    .bind(serde_json::to_string(&proposal.authors)?)
    .bind(proposal.form_id.map(|id| id.to_string()))
    .bind(serde_json::to_string(&proposal.form_answers)?)
    .bind(serde_json::to_string(&proposal.custom_field_values)?)
    .bind(proposal.project.as_ref().map(serde_json::to_string).transpose()?)
    .bind(proposal.has_published_rewards as i64)
    .bind(format_time(&proposal.created_at))
    .bind(proposal.deleted_at.as_ref().map(format_time))
    .execute(&mut *tx)
    .await?;

    // Criteria and answers cascade
    sqlx::query("DELETE FROM proposal_evaluations WHERE proposal_id = ?")
        .bind(proposal.id.to_string())
        .execute(&mut *tx)
        .await?;

    for step in &proposal.evaluations {
        sqlx::query(
            r#"
            INSERT INTO proposal_evaluations (id, proposal_id, step_index, title, evaluation_type, result)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(step.id.to_string())
        .bind(proposal.id.to_string())
        .bind(step.index)
        .bind(&step.title)
        .bind(step.evaluation_type.as_str())
        .bind(step.result.map(|r| r.as_str()))
        .execute(&mut *tx)
        .await?;

        for (position, criteria) in step.rubric_criteria.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO rubric_criteria (id, evaluation_id, title, description, position)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(criteria.id.to_string())
            .bind(step.id.to_string())
            .bind(&criteria.title)
            .bind(&criteria.description)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        for answer in &step.rubric_answers {
            sqlx::query(
                r#"
                INSERT INTO rubric_answers
                    (criteria_id, evaluation_id, reviewer_id, reviewer_name, score, comment)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(answer.criteria_id.to_string())
            .bind(step.id.to_string())
            .bind(answer.reviewer_id.to_string())
            .bind(&answer.reviewer_name)
            .bind(answer.score)
            .bind(&answer.comment)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(())
}

/// Permanently remove a proposal
pub async fn delete_proposal(pool: &SqlitePool, proposal_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM proposals WHERE id = ?")
        .bind(proposal_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn insert_board(pool: &SqlitePool, board: &Board) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO boards (id, space_id, title, created_by, fields, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(board.id.to_string())
    .bind(board.space_id.to_string())
    .bind(&board.title)
    .bind(board.created_by.to_string())
    .bind(serde_json::to_string(&board.fields)?)
    .bind(format_time(&board.updated_at))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert_view(pool: &SqlitePool, view: &BoardView, position: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO board_views (id, board_id, title, visible_property_ids, position)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(view.id.to_string())
    .bind(view.board_id.to_string())
    .bind(&view.title)
    .bind(serde_json::to_string(&view.visible_property_ids)?)
    .bind(position)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert_form_field(
    pool: &SqlitePool,
    space_id: Uuid,
    position: i64,
    field: &FormField,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO form_fields (id, form_id, space_id, name, field_type, options, private, description, position)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&field.id)
    .bind(field.form_id.to_string())
    .bind(space_id.to_string())
    .bind(&field.name)
    .bind(field.field_type.as_str())
    .bind(serde_json::to_string(&field.options)?)
    .bind(field.private as i64)
    .bind(&field.description)
    .bind(position)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert_page_permission(pool: &SqlitePool, entry: &PermissionEntry) -> Result<()> {
    insert_permission(pool, entry).await
}

pub async fn add_space_member(pool: &SqlitePool, space_id: Uuid, user_id: Uuid, is_admin: bool) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO space_members (space_id, user_id, is_admin) VALUES (?, ?, ?)
        ON CONFLICT(space_id, user_id) DO UPDATE SET is_admin = excluded.is_admin
        "#,
    )
    .bind(space_id.to_string())
    .bind(user_id.to_string())
    .bind(is_admin as i64)
    .execute(pool)
    .await?;
    Ok(())
}

/// Register the board holding a space's imported custom proposal properties
pub async fn set_proposal_template_board(pool: &SqlitePool, space_id: Uuid, board_id: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO proposal_template_boards (space_id, board_id) VALUES (?, ?)
        ON CONFLICT(space_id) DO UPDATE SET board_id = excluded.board_id
        "#,
    )
    .bind(space_id.to_string())
    .bind(board_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}
