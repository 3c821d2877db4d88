use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageAction {
    Preview,
    Select,
    Customize,
    Export,
    Duplicate,
}

impl UsageAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageAction::Preview => "preview",
            UsageAction::Select => "select",
            UsageAction::Customize => "customize",
            UsageAction::Export => "export",
            UsageAction::Duplicate => "duplicate",
        }
    }
}

/// A `template_usage` row. Append-only: rows are never updated or deleted;
/// every analytics figure is derived by aggregation over this log.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageEventRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub template_id: Uuid,
    pub customization_id: Option<Uuid>,
    pub document_id: Option<Uuid>,
    pub action: String,
    pub device_type: Option<String>,
    pub session_id: Option<String>,
    pub country_code: Option<String>,
    pub duration_ms: Option<i64>,
    pub render_ms: Option<i64>,
    pub rating: Option<i16>,
    pub feedback: Option<String>,
    pub converted_to_document: bool,
    pub created_at: DateTime<Utc>,
}

/// Body for `POST /api/v1/usage`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordUsage {
    pub template_id: Uuid,
    pub action: UsageAction,
    #[serde(default)]
    pub customization_id: Option<Uuid>,
    #[serde(default)]
    pub document_id: Option<Uuid>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub render_ms: Option<i64>,
    /// 1–5 when present.
    #[serde(default)]
    pub rating: Option<i16>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub converted_to_document: bool,
}
