// SPDX-License-Identifier: MIT

//! Filter configuration types and loader
//!
//! A configuration is an ordered list of conditions plus the operator that
//! combines them. YAML and JSON are both accepted:
//!
//! ```yaml
//! operator: ANY
//! conditions:
//!   - expr: "{{ $val % 2 == 0 }}"
//!   - "val > 100"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::policy::CombinationPolicy;
use crate::error::FilterError;

/// Complete configuration for one filter
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FilterConfig {
    /// Conditions in evaluation order
    #[serde(default)]
    pub conditions: Vec<ConditionDef>,
    /// How condition results combine (default ALL)
    #[serde(default)]
    pub operator: CombinationPolicy,
}

/// A single condition definition: bare string or `{ expr: ... }`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ConditionDef {
    Inline(String),
    Property { expr: String },
}

impl ConditionDef {
    pub fn expr(&self) -> &str {
        match self {
            ConditionDef::Inline(expr) => expr,
            ConditionDef::Property { expr } => expr,
        }
    }
}

impl From<&str> for ConditionDef {
    fn from(expr: &str) -> Self {
        ConditionDef::Inline(expr.to_string())
    }
}

impl FilterConfig {
    pub fn new<I, C>(conditions: I, operator: CombinationPolicy) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ConditionDef>,
    {
        Self {
            conditions: conditions.into_iter().map(Into::into).collect(),
            operator,
        }
    }
}

/// Loads filter configurations from YAML or JSON files
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<FilterConfig, FilterError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a configuration from a YAML (or JSON) string
    pub fn parse(content: &str) -> Result<FilterConfig, FilterError> {
        let raw: RawConfig = serde_yaml::from_str(content)?;
        let operator = match raw.operator {
            Some(name) => name.parse::<CombinationPolicy>()?,
            None => CombinationPolicy::default(),
        };
        Ok(FilterConfig {
            conditions: raw.conditions,
            operator,
        })
    }
}

/// File layout before the operator is validated
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    conditions: Vec<ConditionDef>,
    #[serde(default)]
    operator: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn test_parse_property_conditions() {
        let yaml = r#"
conditions:
  - expr: "{{$val == 23}}"
  - expr: "{{$val == 52}}"
operator: ANY
"#;
        let config = ConfigLoader::parse(yaml).unwrap();
        assert_eq!(config.conditions.len(), 2);
        assert_eq!(config.conditions[0].expr(), "{{$val == 23}}");
        assert_eq!(config.operator, CombinationPolicy::Any);
    }

    #[test]
    fn test_parse_inline_conditions() {
        let yaml = r#"
conditions:
  - "val % 2 == 0"
  - expr: "val > 1"
"#;
        let config = ConfigLoader::parse(yaml).unwrap();
        assert_eq!(config.conditions[0], ConditionDef::Inline("val % 2 == 0".to_string()));
        assert_eq!(config.conditions[1].expr(), "val > 1");
    }

    #[test]
    fn test_defaults() {
        let config = ConfigLoader::parse("{}").unwrap();
        assert!(config.conditions.is_empty());
        assert_eq!(config.operator, CombinationPolicy::All);
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{"conditions": [{"expr": "val == 1"}], "operator": "all"}"#;
        let config = ConfigLoader::parse(json).unwrap();
        assert_eq!(config.conditions.len(), 1);
        assert_eq!(config.operator, CombinationPolicy::All);
    }

    #[test]
    fn test_unknown_operator_is_config_error() {
        let result = ConfigLoader::parse("operator: SOME");
        match result {
            Err(FilterError::Config(ConfigError::UnknownPolicy(name))) => assert_eq!(name, "SOME"),
            other => panic!("Expected UnknownPolicy, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_document_is_yaml_error() {
        let result = ConfigLoader::parse("conditions: [unclosed");
        assert!(matches!(result, Err(FilterError::Yaml(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ConfigLoader::load("/nonexistent/filter.yaml");
        assert!(matches!(result, Err(FilterError::Io(_))));
    }

    #[test]
    fn test_new_from_strings() {
        let config = FilterConfig::new(["val == 1", "val == 2"], CombinationPolicy::Any);
        assert_eq!(config.conditions.len(), 2);
        assert_eq!(config.conditions[1].expr(), "val == 2");
    }
}
