//! Property templates (board columns) and stored property values

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Column type of a board property
///
/// Plain types are edited by users. The `Proposal*` types are derived from the
/// proposal source and are always read-only on the board.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PropertyType {
    Text,
    Number,
    Select,
    MultiSelect,
    Date,
    Person,
    File,
    Checkbox,
    Url,
    Email,
    Phone,
    Relation,
    CreatedTime,
    CreatedBy,
    UpdatedTime,
    UpdatedBy,
    ProposalStatus,
    ProposalUrl,
    ProposalAuthor,
    ProposalStep,
    ProposalEvaluationType,
    ProposalEvaluatedBy,
    ProposalEvaluationTotal,
    ProposalEvaluationAverage,
    ProposalRubricCriteriaTotal,
    ProposalRubricCriteriaAverage,
    ProposalRubricCriteriaReviewerScore,
    ProposalRubricCriteriaReviewerComment,
    ProposalReviewerNotes,
}

impl PropertyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Select => "select",
            Self::MultiSelect => "multiSelect",
            Self::Date => "date",
            Self::Person => "person",
            Self::File => "file",
            Self::Checkbox => "checkbox",
            Self::Url => "url",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Relation => "relation",
            Self::CreatedTime => "createdTime",
            Self::CreatedBy => "createdBy",
            Self::UpdatedTime => "updatedTime",
            Self::UpdatedBy => "updatedBy",
            Self::ProposalStatus => "proposalStatus",
            Self::ProposalUrl => "proposalUrl",
            Self::ProposalAuthor => "proposalAuthor",
            Self::ProposalStep => "proposalStep",
            Self::ProposalEvaluationType => "proposalEvaluationType",
            Self::ProposalEvaluatedBy => "proposalEvaluatedBy",
            Self::ProposalEvaluationTotal => "proposalEvaluationTotal",
            Self::ProposalEvaluationAverage => "proposalEvaluationAverage",
            Self::ProposalRubricCriteriaTotal => "proposalRubricCriteriaTotal",
            Self::ProposalRubricCriteriaAverage => "proposalRubricCriteriaAverage",
            Self::ProposalRubricCriteriaReviewerScore => "proposalRubricCriteriaReviewerScore",
            Self::ProposalRubricCriteriaReviewerComment => "proposalRubricCriteriaReviewerComment",
            Self::ProposalReviewerNotes => "proposalReviewerNotes",
        }
    }

    /// Types whose values are computed from the proposal source
    pub fn is_proposal_derived(self) -> bool {
        matches!(
            self,
            Self::ProposalStatus
                | Self::ProposalUrl
                | Self::ProposalAuthor
                | Self::ProposalStep
                | Self::ProposalEvaluationType
                | Self::ProposalEvaluatedBy
                | Self::ProposalEvaluationTotal
                | Self::ProposalEvaluationAverage
                | Self::ProposalRubricCriteriaTotal
                | Self::ProposalRubricCriteriaAverage
                | Self::ProposalRubricCriteriaReviewerScore
                | Self::ProposalRubricCriteriaReviewerComment
                | Self::ProposalReviewerNotes
        )
    }

    /// Fixed per-board system properties, one of each per board
    pub fn is_system(self) -> bool {
        matches!(
            self,
            Self::ProposalStatus
                | Self::ProposalUrl
                | Self::ProposalAuthor
                | Self::ProposalStep
                | Self::ProposalEvaluationType
                | Self::ProposalReviewerNotes
        )
    }

    /// Per evaluation step aggregates, matched by evaluation title
    pub fn is_step_aggregate(self) -> bool {
        matches!(
            self,
            Self::ProposalEvaluatedBy | Self::ProposalEvaluationTotal | Self::ProposalEvaluationAverage
        )
    }

    /// Per rubric criteria aggregates, matched by criteria title
    pub fn is_criteria_aggregate(self) -> bool {
        matches!(
            self,
            Self::ProposalRubricCriteriaTotal | Self::ProposalRubricCriteriaAverage
        )
    }

    /// Per (criteria, reviewer) breakdown columns
    pub fn is_reviewer_breakdown(self) -> bool {
        matches!(
            self,
            Self::ProposalRubricCriteriaReviewerScore | Self::ProposalRubricCriteriaReviewerComment
        )
    }

    /// Types whose stored values reference option ids
    pub fn has_options(self) -> bool {
        matches!(
            self,
            Self::Select
                | Self::MultiSelect
                | Self::ProposalStatus
                | Self::ProposalStep
                | Self::ProposalEvaluationType
        )
    }
}

/// One selectable option of an enumerable property
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PropertyOption {
    pub id: String,
    pub value: String,
    pub color: String,
}

impl PropertyOption {
    pub fn new(id: impl Into<String>, value: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            color: color.into(),
        }
    }
}

/// How many related cards a relation property may hold
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelationLimit {
    SinglePage,
    MultiplePage,
}

/// Link metadata of a relation property
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelationData {
    /// Board the related cards live in
    pub board_id: Uuid,
    /// Inverse property on the related board, None when the link is one-sided
    pub related_property_id: Option<String>,
    pub limit: RelationLimit,
    pub show_on_related_board: bool,
}

/// A board column definition
///
/// `id` is immutable once minted. The linkage fields (`form_field_id`,
/// `proposal_field_id`, `evaluation_title`, `criteria_title`, `reviewer_id`)
/// only serve to match the column against its descriptor on later runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTemplate {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default)]
    pub options: Vec<PropertyOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub read_only_values: bool,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub dynamic_options: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_field_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_field_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_data: Option<RelationData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<String>,
}

impl PropertyTemplate {
    /// New user-editable column with a freshly minted id
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            property_type,
            options: Vec::new(),
            description: None,
            read_only: false,
            read_only_values: false,
            private: false,
            dynamic_options: false,
            form_field_id: None,
            proposal_field_id: None,
            relation_data: None,
            evaluation_title: None,
            criteria_title: None,
            reviewer_id: None,
        }
    }

    /// New source-derived column: read-only with dynamic options
    pub fn derived(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            read_only: true,
            read_only_values: true,
            dynamic_options: true,
            ..Self::new(name, property_type)
        }
    }

    pub fn option_by_value(&self, value: &str) -> Option<&PropertyOption> {
        self.options.iter().find(|o| o.value == value)
    }

    pub fn option_by_id(&self, id: &str) -> Option<&PropertyOption> {
        self.options.iter().find(|o| o.id == id)
    }

    /// Append every incoming option whose value is not present yet.
    ///
    /// Existing options keep their id and position; returns true if anything
    /// was appended.
    pub fn union_options(&mut self, incoming: &[PropertyOption]) -> bool {
        let mut changed = false;
        for option in incoming {
            if self.option_by_value(&option.value).is_none() {
                self.options.push(option.clone());
                changed = true;
            }
        }
        changed
    }
}

/// A stored card property value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl PropertyValue {
    /// Values of a list-valued property; a single text value counts as one entry
    pub fn as_list(&self) -> Vec<String> {
        match self {
            PropertyValue::List(items) => items.clone(),
            PropertyValue::Text(text) if !text.is_empty() => vec![text.clone()],
            _ => Vec::new(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            PropertyValue::Text(text) => text.is_empty(),
            PropertyValue::List(items) => items.is_empty(),
            _ => false,
        }
    }
}
