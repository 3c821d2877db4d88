//! Customization overlay: applies a user's sparse patch on top of a resolved
//! template. Pure — the shared template is never mutated.
//!
//! Overrides referencing sections the resolved template does not have are
//! rejected rather than silently dropped.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::customizations::models::CustomizationPatch;
use crate::errors::AppError;
use crate::templates::design::DesignConfig;
use crate::templates::models::TemplateStructure;
use crate::templates::resolver::ResolvedTemplate;

/// Page-level layout after overrides. Unset fields mean the renderer's
/// defaults apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<String>,
}

/// The final reference-free document: inheritance walked, customization
/// applied, ready for the caller to render or export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveDocument {
    pub template_id: Uuid,
    pub customization_id: Option<Uuid>,
    pub name: String,
    pub document_kind: String,
    pub structure: TemplateStructure,
    pub design: DesignConfig,
    pub layout: PageLayout,
    /// Section id -> user-supplied content, from `content_changes`.
    pub content: BTreeMap<String, Value>,
    pub current_version: String,
}

/// Applies `patch` over `resolved`. Each dimension is overridden independently
/// if present; everything unset inherits from the resolved template.
pub fn apply(
    resolved: &ResolvedTemplate,
    customization_id: Option<Uuid>,
    patch: &CustomizationPatch,
) -> Result<EffectiveDocument, AppError> {
    let known_ids: HashSet<&str> = resolved
        .structure
        .sections
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    check_section_refs(patch, &known_ids)?;

    let mut design = resolved.design.clone();
    if let Some(colors) = &patch.color_changes {
        design.colors = Some(match &design.colors {
            Some(base) => colors.merged_over(base),
            None => colors.clone(),
        });
    }
    if let Some(typography) = &patch.typography_changes {
        design.typography = Some(match &design.typography {
            Some(base) => typography.merged_over(base),
            None => typography.clone(),
        });
    }
    if let Some(spacing) = &patch.spacing_changes {
        design.spacing = Some(match &design.spacing {
            Some(base) => spacing.merged_over(base),
            None => spacing.clone(),
        });
    }
    if let Some(borders) = &patch.border_changes {
        design.borders = Some(match &design.borders {
            Some(base) => borders.merged_over(base),
            None => borders.clone(),
        });
    }

    let mut structure = resolved.structure.clone();
    if let Some(section_changes) = &patch.section_changes {
        for section in &mut structure.sections {
            if let Some(over) = section_changes.get(&section.id) {
                if let Some(visible) = over.visible {
                    section.visible = visible;
                }
                if let Some(title) = &over.title {
                    section.title = Some(title.clone());
                }
            }
        }
    }
    let mut layout = PageLayout::default();
    if let Some(changes) = &patch.layout_changes {
        layout.columns = changes.columns;
        layout.page_size = changes.page_size.clone();
        if let Some(order) = &changes.section_order {
            reorder_sections(&mut structure, order);
        }
    }

    let content = patch
        .content_changes
        .as_ref()
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();

    Ok(EffectiveDocument {
        template_id: resolved.template_id,
        customization_id,
        name: resolved.name.clone(),
        document_kind: resolved.document_kind.clone(),
        structure,
        design,
        layout,
        content,
        current_version: resolved.current_version.clone(),
    })
}

fn check_section_refs(
    patch: &CustomizationPatch,
    known_ids: &HashSet<&str>,
) -> Result<(), AppError> {
    let mut referenced: Vec<&str> = Vec::new();
    if let Some(changes) = &patch.section_changes {
        referenced.extend(changes.keys().map(String::as_str));
    }
    if let Some(changes) = &patch.content_changes {
        referenced.extend(changes.keys().map(String::as_str));
    }
    if let Some(layout) = &patch.layout_changes {
        if let Some(order) = &layout.section_order {
            referenced.extend(order.iter().map(String::as_str));
        }
    }
    for id in referenced {
        if !known_ids.contains(id) {
            return Err(AppError::Validation(format!(
                "Customization references unknown section '{id}'"
            )));
        }
    }
    Ok(())
}

/// Listed sections come first in list order; unlisted sections keep their
/// relative order after them. `order` values are rewritten sequentially.
fn reorder_sections(structure: &mut TemplateStructure, order: &[String]) {
    let ranks: HashMap<String, (usize, i32)> = structure
        .sections
        .iter()
        .map(|s| {
            let rank = match order.iter().position(|o| o == &s.id) {
                Some(pos) => (0, pos as i32),
                None => (1, s.order),
            };
            (s.id.clone(), rank)
        })
        .collect();
    structure.sections.sort_by_key(|s| ranks[&s.id]);
    for (i, section) in structure.sections.iter_mut().enumerate() {
        section.order = i as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customizations::models::{LayoutChanges, SectionOverride};
    use crate::templates::design::{ColorPalette, Spacing, Typography};
    use crate::templates::models::{SectionDef, SectionKind};
    use serde_json::json;

    fn section(id: &str, kind: SectionKind, order: i32) -> SectionDef {
        SectionDef {
            id: id.to_string(),
            kind,
            title: None,
            order,
            visible: true,
            required: false,
            max_items: None,
        }
    }

    fn resolved() -> ResolvedTemplate {
        ResolvedTemplate {
            template_id: Uuid::new_v4(),
            name: "Base Resume".to_string(),
            description: None,
            category: "professional".to_string(),
            document_kind: "resume".to_string(),
            structure: TemplateStructure {
                sections: vec![
                    section("personal", SectionKind::PersonalInfo, 0),
                    section("summary", SectionKind::Summary, 1),
                    section("experience", SectionKind::Experience, 2),
                ],
            },
            design: DesignConfig {
                colors: Some(ColorPalette {
                    primary: Some("#1A1A2E".to_string()),
                    text: Some("#222222".to_string()),
                    ..Default::default()
                }),
                typography: Some(Typography {
                    font_family: Some("Inter".to_string()),
                    base_size_pt: Some(11.0),
                    ..Default::default()
                }),
                spacing: Some(Spacing {
                    density: Some("comfortable".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            current_version: "1.0.0".to_string(),
            tags: vec![],
            ancestors: vec![],
        }
    }

    #[test]
    fn test_primary_color_patch_changes_exactly_one_field() {
        let base = resolved();
        let patch = CustomizationPatch {
            color_changes: Some(ColorPalette {
                primary: Some("#112233".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let doc = apply(&base, None, &patch).unwrap();

        let colors = doc.design.colors.as_ref().unwrap();
        assert_eq!(colors.primary.as_deref(), Some("#112233"));
        assert_eq!(colors.text.as_deref(), Some("#222222"));
        // Every other dimension is untouched.
        assert_eq!(doc.design.typography, base.design.typography);
        assert_eq!(doc.design.spacing, base.design.spacing);
        assert_eq!(doc.structure, base.structure);
        assert!(doc.content.is_empty());
    }

    #[test]
    fn test_empty_patch_is_identity() {
        let base = resolved();
        let doc = apply(&base, None, &CustomizationPatch::default()).unwrap();
        assert_eq!(doc.design, base.design);
        assert_eq!(doc.structure, base.structure);
        assert_eq!(doc.layout, PageLayout::default());
    }

    #[test]
    fn test_page_layout_overrides_carried_through() {
        let patch = CustomizationPatch {
            layout_changes: Some(LayoutChanges {
                section_order: None,
                columns: Some(2),
                page_size: Some("a4".to_string()),
            }),
            ..Default::default()
        };
        let doc = apply(&resolved(), None, &patch).unwrap();
        assert_eq!(doc.layout.columns, Some(2));
        assert_eq!(doc.layout.page_size.as_deref(), Some("a4"));
        // The serialized document must expose them to the renderer.
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["layout"]["columns"], json!(2));
        assert_eq!(json["layout"]["page_size"], json!("a4"));
    }

    #[test]
    fn test_unknown_section_reference_rejected() {
        let patch = CustomizationPatch {
            section_changes: Some(
                [("publications".to_string(), SectionOverride::default())]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        };
        let err = apply(&resolved(), None, &patch).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_unknown_content_section_rejected() {
        let patch = CustomizationPatch {
            content_changes: Some(
                [("awards".to_string(), json!({"items": []}))]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        };
        assert!(apply(&resolved(), None, &patch).is_err());
    }

    #[test]
    fn test_section_visibility_and_title_override() {
        let patch = CustomizationPatch {
            section_changes: Some(
                [(
                    "summary".to_string(),
                    SectionOverride {
                        visible: Some(false),
                        title: Some("Profile".to_string()),
                    },
                )]
                .into_iter()
                .collect(),
            ),
            ..Default::default()
        };
        let doc = apply(&resolved(), None, &patch).unwrap();
        let summary = doc
            .structure
            .sections
            .iter()
            .find(|s| s.id == "summary")
            .unwrap();
        assert!(!summary.visible);
        assert_eq!(summary.title.as_deref(), Some("Profile"));
    }

    #[test]
    fn test_section_reorder() {
        let patch = CustomizationPatch {
            layout_changes: Some(LayoutChanges {
                section_order: Some(vec!["experience".to_string(), "personal".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let doc = apply(&resolved(), None, &patch).unwrap();
        let ids: Vec<&str> = doc.structure.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["experience", "personal", "summary"]);
        let orders: Vec<i32> = doc.structure.sections.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn test_content_changes_carried_through() {
        let patch = CustomizationPatch {
            content_changes: Some(
                [("summary".to_string(), json!({"text": "Data engineer."}))]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        };
        let doc = apply(&resolved(), None, &patch).unwrap();
        assert_eq!(doc.content["summary"], json!({"text": "Data engineer."}));
    }
}
