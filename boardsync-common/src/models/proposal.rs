//! Upstream proposal records and their evaluation pipeline

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::property::PropertyValue;

/// Publication state of a proposal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Draft,
    Published,
}

impl ProposalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            _ => None,
        }
    }
}

/// Kind of a pipeline step
///
/// `Draft` and `Rewards` never appear as stored evaluations; they are the
/// synthetic steps a proposal sits in before its first and after its last
/// evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Draft,
    Feedback,
    PassFail,
    Rubric,
    Vote,
    Rewards,
}

impl StepType {
    pub const EVALUATION_TYPES: [StepType; 4] = [
        StepType::Feedback,
        StepType::PassFail,
        StepType::Rubric,
        StepType::Vote,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Feedback => "feedback",
            Self::PassFail => "pass_fail",
            Self::Rubric => "rubric",
            Self::Vote => "vote",
            Self::Rewards => "rewards",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "feedback" => Some(Self::Feedback),
            "pass_fail" => Some(Self::PassFail),
            "rubric" => Some(Self::Rubric),
            "vote" => Some(Self::Vote),
            "rewards" => Some(Self::Rewards),
            _ => None,
        }
    }
}

/// Outcome of a finished evaluation step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationResult {
    Pass,
    Fail,
}

impl EvaluationResult {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pass" => Some(Self::Pass),
            "fail" => Some(Self::Fail),
            _ => None,
        }
    }
}

/// One scored dimension of a rubric step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RubricCriteria {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One reviewer's answer to one criterion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RubricAnswer {
    pub criteria_id: Uuid,
    pub reviewer_id: Uuid,
    #[serde(default)]
    pub reviewer_name: Option<String>,
    pub score: Option<f64>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// One stage of a proposal's review pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationStep {
    pub id: Uuid,
    pub index: i64,
    pub title: String,
    pub evaluation_type: StepType,
    pub result: Option<EvaluationResult>,
    #[serde(default)]
    pub rubric_criteria: Vec<RubricCriteria>,
    #[serde(default)]
    pub rubric_answers: Vec<RubricAnswer>,
}

/// Project profile answered in a `project_profile` form field
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectProfile {
    pub name: Option<String>,
    pub excerpt: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub github: Option<String>,
    #[serde(default)]
    pub member_names: Vec<String>,
}

/// Step a proposal currently sits in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentStep {
    pub title: String,
    pub step_type: StepType,
    pub result: Option<EvaluationResult>,
}

/// Title used for the synthetic draft step
pub const DRAFT_STEP_TITLE: &str = "Draft";
/// Title used for the synthetic rewards step
pub const REWARDS_STEP_TITLE: &str = "Rewards";
/// Terminal status value for archived proposals
pub const ARCHIVED_STATUS: &str = "archived";
/// Status value of a step without a result yet
pub const IN_PROGRESS_STATUS: &str = "in_progress";

/// Upstream authoritative record
///
/// `id` is the proposal page id and is what cards store as their sync key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Proposal {
    pub id: Uuid,
    pub space_id: Uuid,
    pub title: String,
    pub content: serde_json::Value,
    pub content_text: String,
    pub path: String,
    pub status: ProposalStatus,
    pub archived: bool,
    pub authors: Vec<Uuid>,
    pub evaluations: Vec<EvaluationStep>,
    pub form_id: Option<Uuid>,
    /// Answers keyed by form field id
    pub form_answers: BTreeMap<String, PropertyValue>,
    /// Values keyed by imported custom property id
    pub custom_field_values: BTreeMap<String, PropertyValue>,
    pub project: Option<ProjectProfile>,
    pub has_published_rewards: bool,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Proposal {
    pub fn current_step(&self) -> CurrentStep {
        current_step(self.status, self.has_published_rewards, &self.evaluations)
    }

    /// Value stored in the board's status column
    pub fn status_value(&self) -> String {
        status_value(self.archived, &self.current_step())
    }

    /// Proposal that should be mirrored onto a live card
    pub fn is_eligible(&self) -> bool {
        self.status != ProposalStatus::Draft && !self.archived && self.deleted_at.is_none()
    }
}

/// Slim per-proposal view used to compute board-wide option sets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationSummary {
    pub proposal_id: Uuid,
    pub status: ProposalStatus,
    pub archived: bool,
    pub has_published_rewards: bool,
    pub evaluations: Vec<EvaluationStep>,
}

impl EvaluationSummary {
    pub fn current_step(&self) -> CurrentStep {
        current_step(self.status, self.has_published_rewards, &self.evaluations)
    }

    pub fn status_value(&self) -> String {
        status_value(self.archived, &self.current_step())
    }
}

/// Locate the step a proposal sits in from its ordered evaluations
pub fn current_step(
    status: ProposalStatus,
    has_published_rewards: bool,
    evaluations: &[EvaluationStep],
) -> CurrentStep {
    let draft = CurrentStep {
        title: DRAFT_STEP_TITLE.to_string(),
        step_type: StepType::Draft,
        result: None,
    };

    if status == ProposalStatus::Draft {
        return draft;
    }

    let mut ordered: Vec<&EvaluationStep> = evaluations.iter().collect();
    ordered.sort_by_key(|e| e.index);

    let Some(last) = ordered.last() else {
        return draft;
    };

    let open = ordered
        .iter()
        .find(|e| e.result != Some(EvaluationResult::Pass));

    match open {
        Some(step) => CurrentStep {
            title: step.title.clone(),
            step_type: step.evaluation_type,
            result: step.result,
        },
        None if has_published_rewards => CurrentStep {
            title: REWARDS_STEP_TITLE.to_string(),
            step_type: StepType::Rewards,
            result: Some(EvaluationResult::Pass),
        },
        None => CurrentStep {
            title: last.title.clone(),
            step_type: last.evaluation_type,
            result: last.result,
        },
    }
}

pub fn status_value(archived: bool, step: &CurrentStep) -> String {
    if archived {
        return ARCHIVED_STATUS.to_string();
    }
    step.result
        .map(|r| r.as_str().to_string())
        .unwrap_or_else(|| IN_PROGRESS_STATUS.to_string())
}
