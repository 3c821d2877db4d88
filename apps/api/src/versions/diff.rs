//! Structural comparison between two version snapshots: which sections were
//! added/removed/reordered and which design dimensions changed.

use std::collections::HashMap;

use serde::Serialize;

use crate::errors::AppError;
use crate::templates::design::DesignConfig;
use crate::templates::models::TemplateStructure;
use crate::versions::models::VersionRow;

#[derive(Debug, Clone, Serialize)]
pub struct VersionDiff {
    pub from_version: String,
    pub to_version: String,
    pub added_sections: Vec<String>,
    pub removed_sections: Vec<String>,
    pub reordered_sections: Vec<String>,
    pub changed_design_dimensions: Vec<&'static str>,
}

impl VersionDiff {
    pub fn is_empty(&self) -> bool {
        self.added_sections.is_empty()
            && self.removed_sections.is_empty()
            && self.reordered_sections.is_empty()
            && self.changed_design_dimensions.is_empty()
    }
}

pub fn compare(from: &VersionRow, to: &VersionRow) -> Result<VersionDiff, AppError> {
    let (added, removed, reordered) = diff_structures(&from.structure()?, &to.structure()?);
    Ok(VersionDiff {
        from_version: from.version_number.clone(),
        to_version: to.version_number.clone(),
        added_sections: added,
        removed_sections: removed,
        reordered_sections: reordered,
        changed_design_dimensions: diff_designs(&from.design()?, &to.design()?),
    })
}

fn diff_structures(
    from: &TemplateStructure,
    to: &TemplateStructure,
) -> (Vec<String>, Vec<String>, Vec<String>) {
    let from_orders: HashMap<&str, i32> = from
        .sections
        .iter()
        .map(|s| (s.id.as_str(), s.order))
        .collect();
    let to_orders: HashMap<&str, i32> = to
        .sections
        .iter()
        .map(|s| (s.id.as_str(), s.order))
        .collect();

    let added = to
        .sections
        .iter()
        .filter(|s| !from_orders.contains_key(s.id.as_str()))
        .map(|s| s.id.clone())
        .collect();
    let removed = from
        .sections
        .iter()
        .filter(|s| !to_orders.contains_key(s.id.as_str()))
        .map(|s| s.id.clone())
        .collect();
    let reordered = to
        .sections
        .iter()
        .filter(|s| {
            from_orders
                .get(s.id.as_str())
                .map(|&o| o != s.order)
                .unwrap_or(false)
        })
        .map(|s| s.id.clone())
        .collect();

    (added, removed, reordered)
}

fn diff_designs(from: &DesignConfig, to: &DesignConfig) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if from.colors != to.colors {
        changed.push("colors");
    }
    if from.typography != to.typography {
        changed.push("typography");
    }
    if from.spacing != to.spacing {
        changed.push("spacing");
    }
    if from.borders != to.borders {
        changed.push("borders");
    }
    if from.effects != to.effects {
        changed.push("effects");
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::design::ColorPalette;
    use crate::templates::models::{SectionDef, SectionKind};

    fn section(id: &str, order: i32) -> SectionDef {
        SectionDef {
            id: id.to_string(),
            kind: SectionKind::Custom,
            title: None,
            order,
            visible: true,
            required: false,
            max_items: None,
        }
    }

    #[test]
    fn test_added_and_removed_sections() {
        let from = TemplateStructure {
            sections: vec![section("personal", 0), section("summary", 1)],
        };
        let to = TemplateStructure {
            sections: vec![section("personal", 0), section("skills", 1)],
        };
        let (added, removed, reordered) = diff_structures(&from, &to);
        assert_eq!(added, vec!["skills"]);
        assert_eq!(removed, vec!["summary"]);
        assert!(reordered.is_empty());
    }

    #[test]
    fn test_reordered_sections() {
        let from = TemplateStructure {
            sections: vec![section("personal", 0), section("summary", 1)],
        };
        let to = TemplateStructure {
            sections: vec![section("personal", 1), section("summary", 0)],
        };
        let (added, removed, reordered) = diff_structures(&from, &to);
        assert!(added.is_empty());
        assert!(removed.is_empty());
        assert_eq!(reordered, vec!["personal", "summary"]);
    }

    #[test]
    fn test_changed_design_dimensions() {
        let from = DesignConfig {
            colors: Some(ColorPalette {
                primary: Some("#111111".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let to = DesignConfig {
            colors: Some(ColorPalette {
                primary: Some("#222222".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(diff_designs(&from, &to), vec!["colors"]);
        assert!(diff_designs(&from, &from).is_empty());
    }
}
