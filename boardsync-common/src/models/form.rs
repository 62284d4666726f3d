//! Proposal form fields

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::property::PropertyType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormFieldType {
    ShortText,
    LongText,
    Wallet,
    Select,
    Multiselect,
    Number,
    Date,
    Email,
    Phone,
    Url,
    Person,
    File,
    Checkbox,
    Label,
    ProjectProfile,
}

impl FormFieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShortText => "short_text",
            Self::LongText => "long_text",
            Self::Wallet => "wallet",
            Self::Select => "select",
            Self::Multiselect => "multiselect",
            Self::Number => "number",
            Self::Date => "date",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Url => "url",
            Self::Person => "person",
            Self::File => "file",
            Self::Checkbox => "checkbox",
            Self::Label => "label",
            Self::ProjectProfile => "project_profile",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let parsed = match value {
            "short_text" => Self::ShortText,
            "long_text" => Self::LongText,
            "wallet" => Self::Wallet,
            "select" => Self::Select,
            "multiselect" => Self::Multiselect,
            "number" => Self::Number,
            "date" => Self::Date,
            "email" => Self::Email,
            "phone" => Self::Phone,
            "url" => Self::Url,
            "person" => Self::Person,
            "file" => Self::File,
            "checkbox" => Self::Checkbox,
            "label" => Self::Label,
            "project_profile" => Self::ProjectProfile,
            _ => return None,
        };
        Some(parsed)
    }

    /// Board column type for this field.
    ///
    /// None for fields that do not become a single column (`label` is
    /// dropped, `project_profile` expands into several).
    pub fn property_type(self) -> Option<PropertyType> {
        match self {
            Self::ShortText | Self::LongText | Self::Wallet => Some(PropertyType::Text),
            Self::Select => Some(PropertyType::Select),
            Self::Multiselect => Some(PropertyType::MultiSelect),
            Self::Number => Some(PropertyType::Number),
            Self::Date => Some(PropertyType::Date),
            Self::Email => Some(PropertyType::Email),
            Self::Phone => Some(PropertyType::Phone),
            Self::Url => Some(PropertyType::Url),
            Self::Person => Some(PropertyType::Person),
            Self::File => Some(PropertyType::File),
            Self::Checkbox => Some(PropertyType::Checkbox),
            Self::Label | Self::ProjectProfile => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormFieldOption {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormField {
    pub id: String,
    pub form_id: Uuid,
    pub name: String,
    pub field_type: FormFieldType,
    #[serde(default)]
    pub options: Vec<FormFieldOption>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub description: Option<String>,
}
