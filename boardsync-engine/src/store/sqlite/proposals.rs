//! Proposal reads

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use boardsync_common::models::{
    BoardFields, EvaluationResult, EvaluationStep, EvaluationSummary, FormField, FormFieldType,
    PropertyTemplate, Proposal, ProposalStatus, RubricAnswer, RubricCriteria, StepType,
};
use boardsync_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{format_time, parse_opt_time, parse_opt_uuid, parse_time, parse_uuid};
use crate::store::{PageCursor, ProposalStore};

const PROPOSAL_COLUMNS: &str = "id, space_id, title, content, content_text, path, status, archived, \
     authors, form_id, form_answers, custom_field_values, project, has_published_rewards, \
     created_at, deleted_at";

#[derive(Clone)]
pub struct SqliteProposalStore {
    pool: SqlitePool,
}

impl SqliteProposalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_proposal(&self, row: &SqliteRow) -> Result<Proposal> {
        let id = parse_uuid(&row.get::<String, _>("id"))?;
        let evaluations = load_evaluations(&self.pool, id).await?;

        let status_str: String = row.get("status");
        let status = ProposalStatus::parse(&status_str)
            .ok_or_else(|| Error::Internal(format!("Unknown proposal status '{}'", status_str)))?;
        let authors: Vec<Uuid> = serde_json::from_str(&row.get::<String, _>("authors"))?;
        let form_answers: BTreeMap<_, _> = serde_json::from_str(&row.get::<String, _>("form_answers"))?;
        let custom_field_values: BTreeMap<_, _> =
            serde_json::from_str(&row.get::<String, _>("custom_field_values"))?;
        let project = row
            .get::<Option<String>, _>("project")
            .map(|json| serde_json::from_str(&json))
            .transpose()?;

        Ok(Proposal {
            id,
            space_id: parse_uuid(&row.get::<String, _>("space_id"))?,
            title: row.get("title"),
            content: serde_json::from_str(&row.get::<String, _>("content"))?,
            content_text: row.get("content_text"),
            path: row.get("path"),
            status,
            archived: row.get::<i64, _>("archived") != 0,
            authors,
            evaluations,
            form_id: parse_opt_uuid(row.get("form_id"))?,
            form_answers,
            custom_field_values,
            project,
            has_published_rewards: row.get::<i64, _>("has_published_rewards") != 0,
            created_at: parse_time(&row.get::<String, _>("created_at"))?,
            deleted_at: parse_opt_time(row.get("deleted_at"))?,
        })
    }
}

/// Evaluation steps of a proposal with criteria and answers, ordered by step index
pub(crate) async fn load_evaluations(pool: &SqlitePool, proposal_id: Uuid) -> Result<Vec<EvaluationStep>> {
    let step_rows = sqlx::query(
        r#"
        SELECT id, step_index, title, evaluation_type, result
        FROM proposal_evaluations
        WHERE proposal_id = ?
        ORDER BY step_index
        "#,
    )
    .bind(proposal_id.to_string())
    .fetch_all(pool)
    .await?;

    if step_rows.is_empty() {
        return Ok(Vec::new());
    }

    let criteria_rows = sqlx::query(
        r#"
        SELECT c.id, c.evaluation_id, c.title, c.description
        FROM rubric_criteria c
        JOIN proposal_evaluations e ON c.evaluation_id = e.id
        WHERE e.proposal_id = ?
        ORDER BY c.position
        "#,
    )
    .bind(proposal_id.to_string())
    .fetch_all(pool)
    .await?;

    let answer_rows = sqlx::query(
        r#"
        SELECT a.criteria_id, a.evaluation_id, a.reviewer_id, a.reviewer_name, a.score, a.comment
        FROM rubric_answers a
        JOIN proposal_evaluations e ON a.evaluation_id = e.id
        WHERE e.proposal_id = ?
        ORDER BY a.rowid
        "#,
    )
    .bind(proposal_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut criteria: HashMap<String, Vec<RubricCriteria>> = HashMap::new();
    for row in criteria_rows {
        criteria
            .entry(row.get("evaluation_id"))
            .or_default()
            .push(RubricCriteria {
                id: parse_uuid(&row.get::<String, _>("id"))?,
                title: row.get("title"),
                description: row.get("description"),
            });
    }

    let mut answers: HashMap<String, Vec<RubricAnswer>> = HashMap::new();
    for row in answer_rows {
        answers
            .entry(row.get("evaluation_id"))
            .or_default()
            .push(RubricAnswer {
                criteria_id: parse_uuid(&row.get::<String, _>("criteria_id"))?,
                reviewer_id: parse_uuid(&row.get::<String, _>("reviewer_id"))?,
                reviewer_name: row.get("reviewer_name"),
                score: row.get("score"),
                comment: row.get("comment"),
            });
    }

    step_rows
        .into_iter()
        .map(|row| {
            let id: String = row.get("id");
            let type_str: String = row.get("evaluation_type");
            let evaluation_type = StepType::parse(&type_str)
                .ok_or_else(|| Error::Internal(format!("Unknown evaluation type '{}'", type_str)))?;
            let result = row
                .get::<Option<String>, _>("result")
                .map(|r| {
                    EvaluationResult::parse(&r)
                        .ok_or_else(|| Error::Internal(format!("Unknown evaluation result '{}'", r)))
                })
                .transpose()?;

            Ok(EvaluationStep {
                id: parse_uuid(&id)?,
                index: row.get("step_index"),
                title: row.get("title"),
                evaluation_type,
                result,
                rubric_criteria: criteria.remove(&id).unwrap_or_default(),
                rubric_answers: answers.remove(&id).unwrap_or_default(),
            })
        })
        .collect()
}

#[async_trait]
impl ProposalStore for SqliteProposalStore {
    async fn list_page(
        &self,
        space_id: Uuid,
        cursor: Option<PageCursor>,
        page_size: u32,
    ) -> Result<Vec<Proposal>> {
        let rows = match cursor {
            Some(cursor) => {
                let created_at = format_time(&cursor.created_at);
                sqlx::query(&format!(
                    r#"
                    SELECT {PROPOSAL_COLUMNS} FROM proposals
                    WHERE space_id = ? AND status != 'draft'
                      AND (created_at > ? OR (created_at = ? AND id > ?))
                    ORDER BY created_at, id
                    LIMIT ?
                    "#
                ))
                .bind(space_id.to_string())
                .bind(&created_at)
                .bind(&created_at)
                .bind(cursor.id.to_string())
                .bind(page_size as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    r#"
                    SELECT {PROPOSAL_COLUMNS} FROM proposals
                    WHERE space_id = ? AND status != 'draft'
                    ORDER BY created_at, id
                    LIMIT ?
                    "#
                ))
                .bind(space_id.to_string())
                .bind(page_size as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut page = Vec::with_capacity(rows.len());
        for row in &rows {
            page.push(self.load_proposal(row).await?);
        }
        Ok(page)
    }

    async fn syncable_ids(&self, space_id: Uuid) -> Result<HashSet<Uuid>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM proposals WHERE space_id = ? AND status != 'draft'")
                .bind(space_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        ids.iter().map(|id| parse_uuid(id)).collect()
    }

    async fn get_proposal(&self, proposal_id: Uuid) -> Result<Option<Proposal>> {
        let row = sqlx::query(&format!("SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE id = ?"))
            .bind(proposal_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.load_proposal(&row).await?)),
            None => Ok(None),
        }
    }

    async fn evaluation_summaries(&self, space_id: Uuid) -> Result<Vec<EvaluationSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, status, archived, has_published_rewards
            FROM proposals
            WHERE space_id = ? AND status != 'draft'
            ORDER BY created_at, id
            "#,
        )
        .bind(space_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let proposal_id = parse_uuid(&row.get::<String, _>("id"))?;
            let status_str: String = row.get("status");
            summaries.push(EvaluationSummary {
                proposal_id,
                status: ProposalStatus::parse(&status_str).ok_or_else(|| {
                    Error::Internal(format!("Unknown proposal status '{}'", status_str))
                })?,
                archived: row.get::<i64, _>("archived") != 0,
                has_published_rewards: row.get::<i64, _>("has_published_rewards") != 0,
                evaluations: load_evaluations(&self.pool, proposal_id).await?,
            });
        }
        Ok(summaries)
    }

    async fn form_fields(&self, space_id: Uuid) -> Result<Vec<FormField>> {
        let rows = sqlx::query(
            r#"
            SELECT id, form_id, name, field_type, options, private, description
            FROM form_fields
            WHERE space_id = ?
            ORDER BY form_id, position
            "#,
        )
        .bind(space_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let type_str: String = row.get("field_type");
                Ok(FormField {
                    id: row.get("id"),
                    form_id: parse_uuid(&row.get::<String, _>("form_id"))?,
                    name: row.get("name"),
                    field_type: FormFieldType::parse(&type_str).ok_or_else(|| {
                        Error::Internal(format!("Unknown form field type '{}'", type_str))
                    })?,
                    options: serde_json::from_str(&row.get::<String, _>("options"))?,
                    private: row.get::<i64, _>("private") != 0,
                    description: row.get("description"),
                })
            })
            .collect()
    }

    async fn custom_properties(
        &self,
        space_id: Uuid,
        config_id: Option<Uuid>,
    ) -> Result<Vec<PropertyTemplate>> {
        let board_id = match config_id {
            Some(id) => id,
            None => {
                let registered: Option<String> = sqlx::query_scalar(
                    "SELECT board_id FROM proposal_template_boards WHERE space_id = ?",
                )
                .bind(space_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

                match registered {
                    Some(id) => parse_uuid(&id)?,
                    None => return Ok(Vec::new()),
                }
            }
        };

        let fields: Option<String> = sqlx::query_scalar("SELECT fields FROM boards WHERE id = ?")
            .bind(board_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        let fields = fields
            .ok_or_else(|| Error::NotFound(format!("Proposal template board {}", board_id)))?;
        let fields: BoardFields = serde_json::from_str(&fields)?;
        Ok(fields.card_properties)
    }
}
