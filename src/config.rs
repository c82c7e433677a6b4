//! Graph configuration.
//!
//! Defaults live in [`MergeConfig`] and [`LayoutConfig`]; deployments
//! override them through `SNOWBALL_*` environment variables:
//!
//! | Variable                              | Field                          |
//! |---------------------------------------|--------------------------------|
//! | `SNOWBALL_AUTHOR_KEY`                 | `merge.author_key`             |
//! | `SNOWBALL_NEAR_DUPLICATE_DISTANCE`    | `merge.near_duplicate_distance`|
//! | `SNOWBALL_LAYOUT_IDEAL_LENGTH`        | `layout.ideal_length`          |
//! | `SNOWBALL_LAYOUT_K_ATTRACT`           | `layout.k_attract`             |
//! | `SNOWBALL_LAYOUT_K_REPEL`             | `layout.k_repel`               |
//! | `SNOWBALL_LAYOUT_GRAVITY`             | `layout.gravity`               |
//! | `SNOWBALL_LAYOUT_MAX_STEP`            | `layout.max_step`              |
//! | `SNOWBALL_LAYOUT_EPSILON`             | `layout.epsilon`               |
//! | `SNOWBALL_LAYOUT_MAX_ITERATIONS`      | `layout.max_iterations`        |
//!
//! Unparseable values are logged and ignored.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

use crate::layout::LayoutConfig;
use crate::merge::{AuthorKeyPolicy, MergeConfig};

/// Complete graph configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Merge engine settings.
    pub merge: MergeConfig,
    /// Default layout parameters.
    pub layout: LayoutConfig,
}

impl GraphConfig {
    /// Defaults overridden by `SNOWBALL_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("SNOWBALL_AUTHOR_KEY") {
            match raw.trim().to_lowercase().as_str() {
                "name" => config.merge.author_key = AuthorKeyPolicy::Name,
                "name_and_affiliation" | "name+affiliation" => {
                    config.merge.author_key = AuthorKeyPolicy::NameAndAffiliation
                }
                other => warn!(value = other, "SNOWBALL_AUTHOR_KEY not recognized, using default"),
            }
        }

        override_with(&lookup, "SNOWBALL_NEAR_DUPLICATE_DISTANCE", &mut config.merge.near_duplicate_distance);

        let layout = &mut config.layout;
        override_with(&lookup, "SNOWBALL_LAYOUT_IDEAL_LENGTH", &mut layout.ideal_length);
        override_with(&lookup, "SNOWBALL_LAYOUT_K_ATTRACT", &mut layout.k_attract);
        override_with(&lookup, "SNOWBALL_LAYOUT_K_REPEL", &mut layout.k_repel);
        override_with(&lookup, "SNOWBALL_LAYOUT_GRAVITY", &mut layout.gravity);
        override_with(&lookup, "SNOWBALL_LAYOUT_MAX_STEP", &mut layout.max_step);
        override_with(&lookup, "SNOWBALL_LAYOUT_EPSILON", &mut layout.epsilon);
        override_with(&lookup, "SNOWBALL_LAYOUT_MAX_ITERATIONS", &mut layout.max_iterations);

        if let Err(reason) = config.layout.validate() {
            warn!(reason = %reason, "Layout overrides rejected, using default layout parameters");
            config.layout = LayoutConfig::default();
        }
        config
    }
}

fn override_with<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, field: &mut T) {
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *field = value,
        Err(_) => warn!(variable = name, value = %raw, "Unparseable override ignored"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_overrides() {
        assert_eq!(GraphConfig::from_lookup(|_| None), GraphConfig::default());
    }

    #[test]
    fn test_overrides_apply() {
        let config = GraphConfig::from_lookup(lookup(&[
            ("SNOWBALL_AUTHOR_KEY", "name_and_affiliation"),
            ("SNOWBALL_NEAR_DUPLICATE_DISTANCE", "4"),
            ("SNOWBALL_LAYOUT_MAX_ITERATIONS", " 50 "),
            ("SNOWBALL_LAYOUT_EPSILON", "0.5"),
        ]));

        assert_eq!(config.merge.author_key, AuthorKeyPolicy::NameAndAffiliation);
        assert_eq!(config.merge.near_duplicate_distance, 4);
        assert_eq!(config.layout.max_iterations, 50);
        assert_eq!(config.layout.epsilon, 0.5);
    }

    #[test]
    fn test_bad_values_are_ignored() {
        let config = GraphConfig::from_lookup(lookup(&[
            ("SNOWBALL_AUTHOR_KEY", "orcid"),
            ("SNOWBALL_LAYOUT_MAX_ITERATIONS", "many"),
        ]));
        assert_eq!(config, GraphConfig::default());
    }

    #[test]
    fn test_invalid_layout_falls_back() {
        let config = GraphConfig::from_lookup(lookup(&[("SNOWBALL_LAYOUT_MAX_STEP", "-1")]));
        assert_eq!(config.layout, LayoutConfig::default());
    }

    #[test]
    fn test_serde_fills_missing_sections() {
        let config: GraphConfig =
            serde_json::from_str(r#"{"merge":{"author_key":"name_and_affiliation"}}"#).unwrap();
        assert_eq!(config.merge.author_key, AuthorKeyPolicy::NameAndAffiliation);
        assert_eq!(config.merge.near_duplicate_distance, 2);
        assert_eq!(config.layout, LayoutConfig::default());
    }
}
