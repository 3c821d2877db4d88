use std::collections::HashSet;

use crate::errors::AppError;
use crate::templates::models::{SectionKind, TemplateStructure};

/// Validates a template structure before insert/update.
///
/// Rejects:
/// - empty section list
/// - missing `personal_info` section
/// - duplicate section ids
/// - duplicate or negative `order` values
pub fn validate_structure(structure: &TemplateStructure) -> Result<(), AppError> {
    if structure.sections.is_empty() {
        return Err(AppError::Validation(
            "Template structure must define at least one section".to_string(),
        ));
    }

    if !structure
        .sections
        .iter()
        .any(|s| s.kind == SectionKind::PersonalInfo)
    {
        return Err(AppError::Validation(
            "Template structure must include a personal_info section".to_string(),
        ));
    }

    let mut seen_ids = HashSet::new();
    let mut seen_orders = HashSet::new();
    for section in &structure.sections {
        if section.id.trim().is_empty() {
            return Err(AppError::Validation(
                "Section id must be non-empty".to_string(),
            ));
        }
        if !seen_ids.insert(section.id.as_str()) {
            return Err(AppError::Validation(format!(
                "Duplicate section id '{}'",
                section.id
            )));
        }
        if section.order < 0 {
            return Err(AppError::Validation(format!(
                "Section '{}' has negative order {}",
                section.id, section.order
            )));
        }
        if !seen_orders.insert(section.order) {
            return Err(AppError::Validation(format!(
                "Duplicate section order {} on '{}'",
                section.order, section.id
            )));
        }
    }

    Ok(())
}

/// Derives a URL slug from a template name: lowercase ASCII alphanumeric runs
/// joined by single hyphens. Non-ASCII letters and digits are dropped rather
/// than treated as separators, so "Résumé" slugs to "rsum", not "r-sum".
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_hyphen = true; // suppress leading hyphen
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_hyphen = false;
        } else if c.is_alphanumeric() {
            // dropped, not a word boundary
        } else if !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::models::SectionDef;

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

    fn valid_structure() -> TemplateStructure {
        TemplateStructure {
            sections: vec![
                section("personal", SectionKind::PersonalInfo, 0),
                section("summary", SectionKind::Summary, 1),
                section("experience", SectionKind::Experience, 2),
            ],
        }
    }

    #[test]
    fn test_valid_structure_passes() {
        assert!(validate_structure(&valid_structure()).is_ok());
    }

    #[test]
    fn test_empty_structure_rejected() {
        let err = validate_structure(&TemplateStructure::default()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_missing_personal_info_rejected() {
        let structure = TemplateStructure {
            sections: vec![section("summary", SectionKind::Summary, 0)],
        };
        assert!(validate_structure(&structure).is_err());
    }

    #[test]
    fn test_duplicate_section_id_rejected() {
        let mut structure = valid_structure();
        structure.sections.push(section("summary", SectionKind::Custom, 5));
        let err = validate_structure(&structure).unwrap_err();
        match err {
            AppError::Validation(msg) => assert!(msg.contains("Duplicate section id")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_order_rejected() {
        let mut structure = valid_structure();
        structure.sections.push(section("skills", SectionKind::Skills, 1));
        assert!(validate_structure(&structure).is_err());
    }

    #[test]
    fn test_negative_order_rejected() {
        let mut structure = valid_structure();
        structure.sections[0].order = -1;
        assert!(validate_structure(&structure).is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Blue Resume"), "blue-resume");
        assert_eq!(slugify("  Data Scientist -- CV!  "), "data-scientist-cv");
        assert_eq!(slugify("Résumé 2024"), "rsum-2024");
    }

    #[test]
    fn test_slugify_drops_non_ascii_without_splitting() {
        assert_eq!(slugify("Résumé"), "rsum");
        assert_eq!(slugify("日本語 CV"), "cv");
    }
}
