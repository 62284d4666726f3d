//! Data model shared across the boardsync crates

pub mod board;
pub mod card;
pub mod form;
pub mod property;
pub mod proposal;

pub use board::{Board, BoardFields, BoardView, PermissionEntry, PermissionLevel, SourceType};
pub use card::{Card, CardUpdate, PropertyMap};
pub use form::{FormField, FormFieldOption, FormFieldType};
pub use property::{
    PropertyOption, PropertyTemplate, PropertyType, PropertyValue, RelationData, RelationLimit,
};
pub use proposal::{
    CurrentStep, EvaluationResult, EvaluationStep, EvaluationSummary, ProjectProfile, Proposal,
    ProposalStatus, RubricAnswer, RubricCriteria, StepType, ARCHIVED_STATUS, DRAFT_STEP_TITLE,
    IN_PROGRESS_STATUS, REWARDS_STEP_TITLE,
};
