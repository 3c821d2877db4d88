use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;
use crate::templates::design::DesignConfig;
use crate::templates::models::TemplateStructure;

/// A `template_versions` row: an immutable point-in-time snapshot of a
/// template's content and design. Append-only; never updated after creation
/// except for the publish flags.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VersionRow {
    pub id: Uuid,
    pub template_id: Uuid,
    pub version_number: String,
    pub version_type: String,
    pub changelog: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub structure: Value,
    pub design: Value,
    pub tags: Vec<String>,
    pub is_breaking: bool,
    pub backward_compatible: bool,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl VersionRow {
    pub fn structure(&self) -> Result<TemplateStructure, AppError> {
        serde_json::from_value(self.structure.clone())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt version structure: {e}")))
    }

    pub fn design(&self) -> Result<DesignConfig, AppError> {
        serde_json::from_value(self.design.clone())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt version design: {e}")))
    }
}
