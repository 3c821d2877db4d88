//! Inheritance resolver.
//!
//! Computes the effective template document by walking the
//! `parent_template_id` chain root-first and shallow-merging each child's
//! design/structure over its parent's. `base_template_id` is lineage metadata
//! only and never participates in the merge.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::templates::design::DesignConfig;
use crate::templates::models::{TemplateRow, TemplateStructure};

/// Hard cap on inheritance chain depth. Chains come from the admin UI and
/// legitimately stay shallow; anything deeper is a data bug.
pub const MAX_CHAIN_DEPTH: usize = 16;

/// A fully merged, self-contained template document. No unresolved references
/// remain; `ancestors` lists the walked chain (nearest parent first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedTemplate {
    pub template_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub document_kind: String,
    pub structure: TemplateStructure,
    pub design: DesignConfig,
    pub current_version: String,
    pub tags: Vec<String>,
    pub ancestors: Vec<Uuid>,
}

/// Visited/depth bookkeeping shared by every chain walk. Pure, so the cycle
/// and depth-cap branches are unit-testable without a database.
struct ChainGuard {
    visited: HashSet<Uuid>,
}

impl ChainGuard {
    fn new() -> Self {
        ChainGuard {
            visited: HashSet::new(),
        }
    }

    /// Admits the next id in the walk, failing on a revisit or on a chain
    /// deeper than [`MAX_CHAIN_DEPTH`].
    fn admit(&mut self, id: Uuid, origin: Uuid) -> Result<(), AppError> {
        if !self.visited.insert(id) {
            return Err(AppError::Cycle(format!(
                "Template {id} appears twice in the ancestor chain of {origin}"
            )));
        }
        if self.visited.len() > MAX_CHAIN_DEPTH {
            return Err(AppError::Cycle(format!(
                "Inheritance chain for {origin} exceeds {MAX_CHAIN_DEPTH} levels"
            )));
        }
        Ok(())
    }
}

/// Resolves the effective template for `template_id`.
///
/// Fails with `Cycle` if the parent chain revisits a template or exceeds
/// [`MAX_CHAIN_DEPTH`], and `NotFound` on a dangling parent reference.
pub async fn resolve(pool: &PgPool, template_id: Uuid) -> Result<ResolvedTemplate, AppError> {
    let chain = load_chain(pool, template_id).await?;
    merge_chain(&chain)
}

/// Loads the template and its ancestors, child first.
async fn load_chain(pool: &PgPool, template_id: Uuid) -> Result<Vec<TemplateRow>, AppError> {
    let mut chain: Vec<TemplateRow> = Vec::new();
    let mut guard = ChainGuard::new();
    let mut next = Some(template_id);

    while let Some(id) = next {
        guard.admit(id, template_id)?;

        let row: Option<TemplateRow> = sqlx::query_as("SELECT * FROM templates WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        let row = row.ok_or_else(|| AppError::NotFound(format!("Template {id} not found")))?;

        next = row.parent_template_id;
        chain.push(row);
    }

    Ok(chain)
}

/// Merges a child-first ancestor chain into one effective document.
///
/// Walks root-first: each descendant's design merges field-by-field over the
/// accumulated design, and a descendant with a non-empty section list replaces
/// the structure wholesale (shallow merge).
pub fn merge_chain(chain: &[TemplateRow]) -> Result<ResolvedTemplate, AppError> {
    let child = chain
        .first()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("empty ancestor chain")))?;

    let mut design = DesignConfig::default();
    let mut structure = TemplateStructure::default();
    for row in chain.iter().rev() {
        design = row.design()?.merged_over(&design);
        let own = row.structure()?;
        if !own.sections.is_empty() {
            structure = own;
        }
    }

    Ok(ResolvedTemplate {
        template_id: child.id,
        name: child.name.clone(),
        description: child.description.clone(),
        category: child.category.clone(),
        document_kind: child.document_kind.clone(),
        structure,
        design,
        current_version: child.current_version.clone(),
        tags: child.tags.clone(),
        ancestors: chain.iter().skip(1).map(|r| r.id).collect(),
    })
}

/// Write-time guard: checks whether assigning `new_parent_id` as the parent of
/// `template_id` would close a cycle. Walks the prospective parent's chain and
/// fails if `template_id` is encountered.
pub async fn ensure_no_cycle(
    pool: &PgPool,
    template_id: Uuid,
    new_parent_id: Uuid,
) -> Result<(), AppError> {
    if template_id == new_parent_id {
        return Err(AppError::Cycle(
            "A template cannot be its own parent".to_string(),
        ));
    }

    let mut guard = ChainGuard::new();
    let mut next = Some(new_parent_id);
    while let Some(id) = next {
        if id == template_id {
            return Err(AppError::Cycle(format!(
                "Setting parent {new_parent_id} would make {template_id} its own ancestor"
            )));
        }
        // Also refuses to graft onto a chain that is already cyclic or too deep.
        guard.admit(id, new_parent_id)?;
        next = sqlx::query_scalar("SELECT parent_template_id FROM templates WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .flatten();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::design::ColorPalette;
    use crate::templates::models::{SectionDef, SectionKind};
    use chrono::Utc;
    use serde_json::json;

    fn row(id: Uuid, parent: Option<Uuid>, design: serde_json::Value, sections: Vec<SectionDef>) -> TemplateRow {
        TemplateRow {
            id,
            name: format!("t-{id}"),
            slug: format!("t-{id}"),
            description: None,
            category: "professional".to_string(),
            document_kind: "resume".to_string(),
            structure: serde_json::to_value(TemplateStructure { sections }).unwrap(),
            design,
            parent_template_id: parent,
            base_template_id: None,
            is_base_template: parent.is_none(),
            is_variant: parent.is_some(),
            is_active: true,
            is_draft: false,
            is_public: true,
            is_premium: false,
            is_featured: false,
            review_status: "approved".to_string(),
            usage_count: 0,
            avg_rating: None,
            total_ratings: 0,
            conversion_rate: None,
            completion_rate: None,
            export_rate: None,
            current_version: "1.0.0".to_string(),
            tags: vec![],
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

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

    #[test]
    fn test_resolve_without_ancestors_is_identity() {
        let base = row(
            Uuid::new_v4(),
            None,
            json!({"colors": {"primary": "#111111"}}),
            vec![
                section("personal", SectionKind::PersonalInfo, 0),
                section("experience", SectionKind::Experience, 1),
            ],
        );
        let resolved = merge_chain(&[base.clone()]).unwrap();
        assert_eq!(resolved.template_id, base.id);
        assert!(resolved.ancestors.is_empty());
        assert_eq!(resolved.design, base.design().unwrap());
        assert_eq!(resolved.structure, base.structure().unwrap());
    }

    #[test]
    fn test_child_design_field_overrides_parent() {
        let parent_id = Uuid::new_v4();
        let parent = row(
            parent_id,
            None,
            json!({"colors": {"primary": "#111111", "text": "#222222"},
                   "typography": {"font_family": "Inter"}}),
            vec![
                section("personal", SectionKind::PersonalInfo, 0),
                section("experience", SectionKind::Experience, 1),
            ],
        );
        let child = row(
            Uuid::new_v4(),
            Some(parent_id),
            json!({"colors": {"primary": "#0000FF"}}),
            vec![], // inherits parent structure
        );

        let resolved = merge_chain(&[child.clone(), parent.clone()]).unwrap();
        assert_eq!(resolved.ancestors, vec![parent_id]);
        // Child wins where set.
        assert_eq!(
            resolved.design.colors.as_ref().unwrap().primary.as_deref(),
            Some("#0000FF")
        );
        // Everything unset inherits from the parent.
        assert_eq!(
            resolved.design.colors.as_ref().unwrap().text.as_deref(),
            Some("#222222")
        );
        assert_eq!(
            resolved
                .design
                .typography
                .as_ref()
                .unwrap()
                .font_family
                .as_deref(),
            Some("Inter")
        );
        assert_eq!(resolved.structure, parent.structure().unwrap());
    }

    #[test]
    fn test_child_structure_replaces_wholesale() {
        let parent_id = Uuid::new_v4();
        let parent = row(
            parent_id,
            None,
            json!({}),
            vec![
                section("personal", SectionKind::PersonalInfo, 0),
                section("experience", SectionKind::Experience, 1),
                section("education", SectionKind::Education, 2),
            ],
        );
        let child = row(
            Uuid::new_v4(),
            Some(parent_id),
            json!({}),
            vec![
                section("personal", SectionKind::PersonalInfo, 0),
                section("skills", SectionKind::Skills, 1),
            ],
        );

        let resolved = merge_chain(&[child.clone(), parent]).unwrap();
        assert_eq!(resolved.structure, child.structure().unwrap());
        assert_eq!(resolved.structure.sections.len(), 2);
    }

    #[test]
    fn test_three_level_chain_merges_root_first() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let root = row(a, None, json!({"colors": {"primary": "#111111", "accent": "#AAAAAA"}}),
            vec![section("personal", SectionKind::PersonalInfo, 0)]);
        let mid = row(b, Some(a), json!({"colors": {"primary": "#222222"}}), vec![]);
        let leaf = row(Uuid::new_v4(), Some(b), json!({"colors": {"accent": "#BBBBBB"}}), vec![]);

        let resolved = merge_chain(&[leaf, mid, root]).unwrap();
        let colors = resolved.design.colors.unwrap();
        // Mid overrides root's primary; leaf overrides root's accent.
        assert_eq!(colors.primary.as_deref(), Some("#222222"));
        assert_eq!(colors.accent.as_deref(), Some("#BBBBBB"));
    }

    #[test]
    fn test_base_and_blue_resume_scenario() {
        let base_id = Uuid::new_v4();
        let base = row(
            base_id,
            None,
            json!({"colors": {"primary": "#1A1A2E", "text": "#222222"},
                   "spacing": {"density": "comfortable"}}),
            vec![
                section("personal", SectionKind::PersonalInfo, 0),
                section("summary", SectionKind::Summary, 1),
                section("experience", SectionKind::Experience, 2),
            ],
        );
        let mut blue = row(
            Uuid::new_v4(),
            Some(base_id),
            json!({"colors": {"primary": "#0000FF"}}),
            vec![],
        );
        blue.name = "Blue Resume".to_string();

        let resolved = merge_chain(&[blue, base.clone()]).unwrap();
        assert_eq!(resolved.name, "Blue Resume");
        assert_eq!(resolved.structure, base.structure().unwrap());
        let colors = resolved.design.colors.unwrap();
        assert_eq!(colors.primary.as_deref(), Some("#0000FF"));
        assert_eq!(colors.text.as_deref(), Some("#222222"));
        assert_eq!(
            resolved.design.spacing.unwrap().density.as_deref(),
            Some("comfortable")
        );
    }

    #[test]
    fn test_empty_chain_is_internal_error() {
        assert!(merge_chain(&[]).is_err());
    }

    /// Drives a guarded walk over an in-memory parent map, exactly as
    /// `load_chain`/`ensure_no_cycle` drive it over the database.
    fn walk(parents: &std::collections::HashMap<Uuid, Uuid>, start: Uuid) -> Result<Vec<Uuid>, AppError> {
        let mut guard = ChainGuard::new();
        let mut chain = Vec::new();
        let mut next = Some(start);
        while let Some(id) = next {
            guard.admit(id, start)?;
            chain.push(id);
            next = parents.get(&id).copied();
        }
        Ok(chain)
    }

    #[test]
    fn test_cyclic_chain_fails_fast() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let parents = [(a, b), (b, a)].into_iter().collect();
        let err = walk(&parents, a).unwrap_err();
        assert!(matches!(err, AppError::Cycle(_)));
    }

    #[test]
    fn test_self_parent_fails_fast() {
        let a = Uuid::new_v4();
        let parents = [(a, a)].into_iter().collect();
        assert!(matches!(walk(&parents, a).unwrap_err(), AppError::Cycle(_)));
    }

    #[test]
    fn test_chain_deeper_than_cap_rejected() {
        let ids: Vec<Uuid> = (0..MAX_CHAIN_DEPTH + 2).map(|_| Uuid::new_v4()).collect();
        let parents = ids.windows(2).map(|w| (w[0], w[1])).collect();
        let err = walk(&parents, ids[0]).unwrap_err();
        assert!(matches!(err, AppError::Cycle(_)));
    }

    #[test]
    fn test_walk_within_cap_succeeds() {
        let ids: Vec<Uuid> = (0..MAX_CHAIN_DEPTH).map(|_| Uuid::new_v4()).collect();
        let parents = ids.windows(2).map(|w| (w[0], w[1])).collect();
        assert_eq!(walk(&parents, ids[0]).unwrap().len(), MAX_CHAIN_DEPTH);
    }

    // Default palette test row carries a design that also decodes through
    // ColorPalette directly.
    #[test]
    fn test_row_design_decodes_typed() {
        let r = row(
            Uuid::new_v4(),
            None,
            json!({"colors": {"primary": "#123456"}}),
            vec![section("personal", SectionKind::PersonalInfo, 0)],
        );
        let design = r.design().unwrap();
        assert_eq!(
            design.colors,
            Some(ColorPalette {
                primary: Some("#123456".to_string()),
                ..Default::default()
            })
        );
    }
}
