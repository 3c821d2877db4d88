//! Typed design configuration.
//!
//! Every styling dimension is a record of optional fields rather than a
//! free-form JSON blob: unknown keys are rejected at the boundary, and the
//! all-optional shape is what makes inheritance a per-field merge — a child
//! (or a customization) overrides exactly the fields it sets.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColorPalette {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Typography {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_font: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_size_pt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_height: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Spacing {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_gap_pt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_gap_pt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin_pt: Option<f64>,
    /// "compact" | "comfortable" | "spacious"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Borders {
    /// "none" | "solid" | "dashed" | "dotted"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width_pt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius_pt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub divider_color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Effects {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_set: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent_bar: Option<bool>,
}

/// The full nested design document stored on a template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesignConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<ColorPalette>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typography: Option<Typography>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spacing: Option<Spacing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borders: Option<Borders>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effects: Option<Effects>,
}

macro_rules! take_set {
    ($out:expr, $over:expr, $($field:ident),+ $(,)?) => {
        $(
            if $over.$field.is_some() {
                $out.$field = $over.$field.clone();
            }
        )+
    };
}

impl ColorPalette {
    pub fn merged_over(&self, base: &Self) -> Self {
        let mut out = base.clone();
        take_set!(out, self, primary, secondary, accent, background, text, muted);
        out
    }
}

impl Typography {
    pub fn merged_over(&self, base: &Self) -> Self {
        let mut out = base.clone();
        take_set!(
            out,
            self,
            font_family,
            heading_font,
            base_size_pt,
            heading_scale,
            line_height
        );
        out
    }
}

impl Spacing {
    pub fn merged_over(&self, base: &Self) -> Self {
        let mut out = base.clone();
        take_set!(out, self, section_gap_pt, item_gap_pt, margin_pt, density);
        out
    }
}

impl Borders {
    pub fn merged_over(&self, base: &Self) -> Self {
        let mut out = base.clone();
        take_set!(out, self, style, width_pt, radius_pt, divider_color);
        out
    }
}

impl Effects {
    pub fn merged_over(&self, base: &Self) -> Self {
        let mut out = base.clone();
        take_set!(out, self, shadow, icon_set, accent_bar);
        out
    }
}

impl DesignConfig {
    /// Merges `self` (the override) on top of `base`: any field the override
    /// explicitly sets wins, everything unset inherits from `base`.
    pub fn merged_over(&self, base: &Self) -> Self {
        DesignConfig {
            colors: merge_dimension(&self.colors, &base.colors, ColorPalette::merged_over),
            typography: merge_dimension(&self.typography, &base.typography, Typography::merged_over),
            spacing: merge_dimension(&self.spacing, &base.spacing, Spacing::merged_over),
            borders: merge_dimension(&self.borders, &base.borders, Borders::merged_over),
            effects: merge_dimension(&self.effects, &base.effects, Effects::merged_over),
        }
    }
}

fn merge_dimension<T: Clone>(
    over: &Option<T>,
    base: &Option<T>,
    merge: impl Fn(&T, &T) -> T,
) -> Option<T> {
    match (over, base) {
        (Some(o), Some(b)) => Some(merge(o, b)),
        (Some(o), None) => Some(o.clone()),
        (None, Some(b)) => Some(b.clone()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_design() -> DesignConfig {
        DesignConfig {
            colors: Some(ColorPalette {
                primary: Some("#1A1A2E".to_string()),
                secondary: Some("#16213E".to_string()),
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
        }
    }

    #[test]
    fn test_merge_child_field_wins() {
        let child = DesignConfig {
            colors: Some(ColorPalette {
                primary: Some("#0000FF".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = child.merged_over(&base_design());
        let colors = merged.colors.unwrap();
        assert_eq!(colors.primary.as_deref(), Some("#0000FF"));
        // Unset fields inherit.
        assert_eq!(colors.secondary.as_deref(), Some("#16213E"));
        assert_eq!(colors.text.as_deref(), Some("#222222"));
    }

    #[test]
    fn test_merge_unset_dimension_inherits_whole() {
        let child = DesignConfig::default();
        let merged = child.merged_over(&base_design());
        assert_eq!(merged, base_design());
    }

    #[test]
    fn test_merge_dimension_only_on_child() {
        let child = DesignConfig {
            borders: Some(Borders {
                style: Some("solid".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = child.merged_over(&base_design());
        assert_eq!(merged.borders.unwrap().style.as_deref(), Some("solid"));
        assert!(merged.colors.is_some());
    }

    #[test]
    fn test_merge_typography_partial() {
        let child = DesignConfig {
            typography: Some(Typography {
                base_size_pt: Some(10.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = child.merged_over(&base_design());
        let typo = merged.typography.unwrap();
        assert_eq!(typo.base_size_pt, Some(10.0));
        assert_eq!(typo.font_family.as_deref(), Some("Inter"));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let raw = r##"{"colors": {"primary": "#fff", "tertiary": "#000"}}"##;
        assert!(serde_json::from_str::<DesignConfig>(raw).is_err());
    }
}
