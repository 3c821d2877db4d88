use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;
use crate::templates::design::DesignConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    Professional,
    Modern,
    Creative,
    Academic,
    Minimal,
}

impl TemplateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateCategory::Professional => "professional",
            TemplateCategory::Modern => "modern",
            TemplateCategory::Creative => "creative",
            TemplateCategory::Academic => "academic",
            TemplateCategory::Minimal => "minimal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Resume,
    Cv,
    CoverLetter,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Resume => "resume",
            DocumentKind::Cv => "cv",
            DocumentKind::CoverLetter => "cover_letter",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    PersonalInfo,
    Summary,
    Experience,
    Education,
    Skills,
    Projects,
    Certifications,
    Publications,
    Custom,
}

fn default_visible() -> bool {
    true
}

/// One typed section slot within a template's structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionDef {
    pub id: String,
    pub kind: SectionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub order: i32,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<i32>,
}

/// Ordered section layout of a template document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateStructure {
    pub sections: Vec<SectionDef>,
}

/// A `templates` row. Structure and design are JSONB; parse them with
/// [`TemplateRow::structure`] / [`TemplateRow::design`] when typed access
/// is needed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TemplateRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: String,
    pub document_kind: String,
    pub structure: Value,
    pub design: Value,
    pub parent_template_id: Option<Uuid>,
    pub base_template_id: Option<Uuid>,
    pub is_base_template: bool,
    pub is_variant: bool,
    pub is_active: bool,
    pub is_draft: bool,
    pub is_public: bool,
    pub is_premium: bool,
    pub is_featured: bool,
    pub review_status: String,
    pub usage_count: i64,
    pub avg_rating: Option<f64>,
    pub total_ratings: i64,
    pub conversion_rate: Option<f64>,
    pub completion_rate: Option<f64>,
    pub export_rate: Option<f64>,
    pub current_version: String,
    pub tags: Vec<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TemplateRow {
    pub fn structure(&self) -> Result<TemplateStructure, AppError> {
        serde_json::from_value(self.structure.clone())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt structure column: {e}")))
    }

    pub fn design(&self) -> Result<DesignConfig, AppError> {
        serde_json::from_value(self.design.clone())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt design column: {e}")))
    }
}

/// Request body for creating a template (admin).
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: TemplateCategory,
    pub document_kind: DocumentKind,
    pub structure: TemplateStructure,
    #[serde(default)]
    pub design: DesignConfig,
    #[serde(default)]
    pub parent_template_id: Option<Uuid>,
    #[serde(default)]
    pub base_template_id: Option<Uuid>,
    #[serde(default)]
    pub is_base_template: bool,
    #[serde(default)]
    pub is_variant: bool,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Initial version string; defaults to "1.0.0".
    #[serde(default)]
    pub version: Option<String>,
}

/// Distinguishes "field absent" (outer `None`, leave unchanged) from
/// "field present as null" (`Some(None)`, clear it).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}

/// Sparse patch for updating a template (admin). Versioning is caller-driven:
/// a snapshot is appended only when the patch touches structure/design/tags
/// AND carries a `version` different from the current one.
///
/// Nullable columns (`description`, `parent_template_id`, `base_template_id`)
/// are double-optional: omitting them leaves the column unchanged, sending
/// `null` clears it (e.g. detaching a child from its parent).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub category: Option<TemplateCategory>,
    pub structure: Option<TemplateStructure>,
    pub design: Option<DesignConfig>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_template_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub base_template_id: Option<Option<Uuid>>,
    pub is_base_template: Option<bool>,
    pub is_variant: Option<bool>,
    pub is_active: Option<bool>,
    pub is_draft: Option<bool>,
    pub is_public: Option<bool>,
    pub is_premium: Option<bool>,
    pub is_featured: Option<bool>,
    pub review_status: Option<ReviewStatus>,
    pub tags: Option<Vec<String>>,
    pub version: Option<String>,
    pub changelog: Option<String>,
}

impl TemplateUpdate {
    /// True when the patch touches version-significant fields.
    pub fn touches_versioned_fields(&self) -> bool {
        self.structure.is_some() || self.design.is_some() || self.tags.is_some()
    }

    /// Caller-driven versioning policy: snapshot only when significant fields
    /// change and the supplied version string differs from the current one.
    pub fn should_snapshot(&self, current_version: &str) -> bool {
        self.touches_versioned_fields()
            && self
                .version
                .as_deref()
                .map(|v| v != current_version)
                .unwrap_or(false)
    }
}

/// Discovery filters for `GET /api/v1/templates`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateFilters {
    pub category: Option<TemplateCategory>,
    pub document_kind: Option<DocumentKind>,
    pub is_active: Option<bool>,
    pub is_draft: Option<bool>,
    pub is_public: Option<bool>,
    pub is_premium: Option<bool>,
    pub is_featured: Option<bool>,
    pub review_status: Option<ReviewStatus>,
    pub min_rating: Option<f64>,
    pub min_usage: Option<i64>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    /// ILIKE search over name, description and tags.
    pub search: Option<String>,
    /// "recent" (default) | "usage" | "rating"
    pub sort: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update_with(
        structure: bool,
        version: Option<&str>,
    ) -> TemplateUpdate {
        TemplateUpdate {
            structure: structure.then(TemplateStructure::default),
            version: version.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_snapshot_when_structure_and_new_version() {
        assert!(update_with(true, Some("1.1.0")).should_snapshot("1.0.0"));
    }

    #[test]
    fn test_no_snapshot_without_version_bump() {
        assert!(!update_with(true, Some("1.0.0")).should_snapshot("1.0.0"));
        assert!(!update_with(true, None).should_snapshot("1.0.0"));
    }

    #[test]
    fn test_no_snapshot_for_insignificant_patch() {
        let patch = TemplateUpdate {
            name: Some("Renamed".to_string()),
            version: Some("2.0.0".to_string()),
            ..Default::default()
        };
        assert!(!patch.should_snapshot("1.0.0"));
    }

    #[test]
    fn test_update_patch_distinguishes_null_from_absent() {
        let patch: TemplateUpdate =
            serde_json::from_str(r#"{"parent_template_id": null, "description": null}"#).unwrap();
        // Present-as-null means clear the column.
        assert_eq!(patch.parent_template_id, Some(None));
        assert_eq!(patch.description, Some(None));

        let patch: TemplateUpdate = serde_json::from_str("{}").unwrap();
        // Absent means leave unchanged.
        assert!(patch.parent_template_id.is_none());
        assert!(patch.description.is_none());

        let id = Uuid::new_v4();
        let patch: TemplateUpdate =
            serde_json::from_str(&format!(r#"{{"parent_template_id": "{id}"}}"#)).unwrap();
        assert_eq!(patch.parent_template_id, Some(Some(id)));
    }

    #[test]
    fn test_section_defaults() {
        let raw = r#"{"id": "exp", "kind": "experience", "order": 2}"#;
        let section: SectionDef = serde_json::from_str(raw).unwrap();
        assert!(section.visible);
        assert!(!section.required);
        assert!(section.max_items.is_none());
    }
}
