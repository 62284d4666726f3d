//! Boards, views and permission entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::property::PropertyTemplate;

/// Where a board's cards come from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Proposals,
    BoardPage,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Proposals => "proposals",
            Self::BoardPage => "board_page",
        }
    }
}

/// Schema and source configuration of a board
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoardFields {
    #[serde(default)]
    pub source_type: Option<SourceType>,
    /// Board holding the tenant's imported custom proposal properties
    #[serde(default)]
    pub source_config_id: Option<Uuid>,
    #[serde(default)]
    pub card_properties: Vec<PropertyTemplate>,
    #[serde(default)]
    pub rubric_reviewer_breakdown: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub id: Uuid,
    pub space_id: Uuid,
    pub title: String,
    pub created_by: Uuid,
    pub fields: BoardFields,
    pub updated_at: DateTime<Utc>,
}

impl Board {
    pub fn property(&self, id: &str) -> Option<&PropertyTemplate> {
        self.fields.card_properties.iter().find(|p| p.id == id)
    }

    pub fn is_proposal_source(&self) -> bool {
        self.fields.source_type == Some(SourceType::Proposals)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardView {
    pub id: Uuid,
    pub board_id: Uuid,
    pub title: String,
    pub visible_property_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    FullAccess,
    Editor,
    Commenter,
    View,
}

impl PermissionLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullAccess => "full_access",
            Self::Editor => "editor",
            Self::Commenter => "commenter",
            Self::View => "view",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "full_access" => Some(Self::FullAccess),
            "editor" => Some(Self::Editor),
            "commenter" => Some(Self::Commenter),
            "view" => Some(Self::View),
            _ => None,
        }
    }
}

/// One permission row on a page (board or card)
///
/// Exactly one of `user_id`, `role_id`, `space_id` or `public` names the
/// grantee.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PermissionEntry {
    pub id: Uuid,
    pub page_id: Uuid,
    pub permission_level: PermissionLevel,
    pub user_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub space_id: Option<Uuid>,
    pub public: bool,
    pub allow_discovery: bool,
    /// Permission row on the parent page this entry was copied from
    pub inherited_from: Option<Uuid>,
}

impl PermissionEntry {
    /// Copy of this entry for a child page, pointing back at the source row
    pub fn inherited_by(&self, page_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            page_id,
            inherited_from: Some(self.inherited_from.unwrap_or(self.id)),
            ..self.clone()
        }
    }
}
