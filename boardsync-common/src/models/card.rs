//! Cards materialized on a board

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::board::PermissionEntry;
use super::property::PropertyValue;

/// Property values keyed by property template id
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// One board row, optionally backed by a proposal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: Uuid,
    pub board_id: Uuid,
    pub space_id: Uuid,
    /// Proposal id this card mirrors
    pub sync_with_page_id: Option<Uuid>,
    pub title: String,
    pub content: serde_json::Value,
    pub content_text: String,
    pub properties: PropertyMap,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_by: Uuid,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub permissions: Vec<PermissionEntry>,
}

impl Card {
    /// Ids held by a relation property on this card
    pub fn related_ids(&self, property_id: &str) -> Vec<String> {
        self.properties
            .get(property_id)
            .map(PropertyValue::as_list)
            .unwrap_or_default()
    }
}

/// Mirror fields plus property map written by a card update
#[derive(Debug, Clone, PartialEq)]
pub struct CardUpdate {
    pub id: Uuid,
    pub title: String,
    pub content: serde_json::Value,
    pub content_text: String,
    pub properties: PropertyMap,
    pub deleted_at: Option<DateTime<Utc>>,
    pub updated_by: Uuid,
}
