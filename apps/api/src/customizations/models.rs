use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;
use crate::templates::design::{Borders, ColorPalette, Spacing, Typography};

/// Layout-level overrides a user can apply without touching the template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutChanges {
    /// Section ids in the desired display order. Listed sections come first;
    /// unlisted sections keep their relative order after them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_order: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<String>,
}

/// Per-section override within a customization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A user's sparse override patch. Every dimension is optional and applied
/// independently as a merge patch over the resolved template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomizationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_changes: Option<ColorPalette>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typography_changes: Option<Typography>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_changes: Option<LayoutChanges>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_changes: Option<HashMap<String, SectionOverride>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing_changes: Option<Spacing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_changes: Option<Borders>,
    /// Section id -> replacement content document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_changes: Option<HashMap<String, Value>>,
}

/// A `customizations` row. Patch dimensions are stored as nullable JSONB
/// columns; [`CustomizationRow::patch`] reassembles the typed patch.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomizationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub template_id: Uuid,
    pub name: Option<String>,
    pub color_changes: Option<Value>,
    pub typography_changes: Option<Value>,
    pub layout_changes: Option<Value>,
    pub section_changes: Option<Value>,
    pub spacing_changes: Option<Value>,
    pub border_changes: Option<Value>,
    pub content_changes: Option<Value>,
    pub share_token: Option<String>,
    pub times_used: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn decode<T: serde::de::DeserializeOwned>(
    field: &str,
    value: &Option<Value>,
) -> Result<Option<T>, AppError> {
    match value {
        None => Ok(None),
        Some(v) => serde_json::from_value(v.clone()).map(Some).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("corrupt {field} column: {e}"))
        }),
    }
}

impl CustomizationRow {
    pub fn patch(&self) -> Result<CustomizationPatch, AppError> {
        Ok(CustomizationPatch {
            color_changes: decode("color_changes", &self.color_changes)?,
            typography_changes: decode("typography_changes", &self.typography_changes)?,
            layout_changes: decode("layout_changes", &self.layout_changes)?,
            section_changes: decode("section_changes", &self.section_changes)?,
            spacing_changes: decode("spacing_changes", &self.spacing_changes)?,
            border_changes: decode("border_changes", &self.border_changes)?,
            content_changes: decode("content_changes", &self.content_changes)?,
        })
    }
}

/// A per-user grant on a shared customization.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GrantRow {
    pub customization_id: Uuid,
    pub grantee_user_id: Uuid,
    pub permission: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantPermission {
    View,
    Edit,
    Clone,
}

impl GrantPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantPermission::View => "view",
            GrantPermission::Edit => "edit",
            GrantPermission::Clone => "clone",
        }
    }
}
