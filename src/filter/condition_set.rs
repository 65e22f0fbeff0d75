// SPDX-License-Identifier: MIT

//! Ordered set of compiled conditions

use std::sync::Arc;

use super::condition::{self, Expression};
use super::config::ConditionDef;
use super::signal::AttributeLookup;
use crate::error::{ConfigError, EvalError};

/// One condition, parsed once and evaluated many times
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    index: usize,
    source: String,
    expr: Expression,
}

impl CompiledCondition {
    /// Position in the declared condition list
    pub fn index(&self) -> usize {
        self.index
    }

    /// The definition this condition was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against one record; the caller decides what a failure means
    pub fn evaluate<R>(&self, record: &R) -> Result<bool, EvalError>
    where
        R: AttributeLookup + ?Sized,
    {
        condition::is_satisfied(&self.expr, record)
    }
}

/// Immutable, ordered sequence of compiled conditions.
///
/// Cloning is cheap and shares the compiled expressions.
#[derive(Debug, Clone, Default)]
pub struct ConditionSet {
    conditions: Arc<[CompiledCondition]>,
}

impl ConditionSet {
    /// Compile every definition, preserving order.
    ///
    /// The first definition that fails to compile aborts the whole set.
    pub fn compile<I, S>(definitions: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let conditions = definitions
            .into_iter()
            .enumerate()
            .map(|(index, def)| compile_one(index, def.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!("Compiled {} filter conditions", conditions.len());
        Ok(Self {
            conditions: conditions.into(),
        })
    }

    /// Compile the conditions of a configuration
    pub fn from_defs(definitions: &[ConditionDef]) -> Result<Self, ConfigError> {
        Self::compile(definitions.iter().map(ConditionDef::expr))
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledCondition> {
        self.conditions.iter()
    }
}

fn compile_one(index: usize, definition: &str) -> Result<CompiledCondition, ConfigError> {
    let body = definition.trim();
    let inner = body
        .strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
        .unwrap_or(body);
    if inner.trim().is_empty() {
        return Err(ConfigError::EmptyCondition { index });
    }

    let expr = condition::parse(definition).map_err(|source| ConfigError::InvalidCondition {
        index,
        expr: definition.to_string(),
        source,
    })?;
    log::debug!("Compiled condition #{}: {}", index, definition);

    Ok(CompiledCondition {
        index,
        source: definition.to_string(),
        expr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::signal::Signal;

    #[test]
    fn test_compile_preserves_order() {
        let set = ConditionSet::compile(["val == 1", "val == 2", "val == 3"]).unwrap();
        let sources: Vec<_> = set.iter().map(|c| c.source()).collect();
        assert_eq!(sources, vec!["val == 1", "val == 2", "val == 3"]);
        let indices: Vec<_> = set.iter().map(|c| c.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_compile_empty_list() {
        let set = ConditionSet::compile(Vec::<String>::new()).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_malformed_condition_is_config_error() {
        let err = ConditionSet::compile(["val == 1", "val ==", "val == 3"]).unwrap_err();
        match err {
            ConfigError::InvalidCondition { index, expr, .. } => {
                assert_eq!(index, 1);
                assert_eq!(expr, "val ==");
            }
            other => panic!("Expected InvalidCondition, got {:?}", other),
        }
    }

    #[test]
    fn test_overlong_chain_is_config_error() {
        let chain = format!("val{} > 0", " + 1".repeat(200_000));
        assert!(matches!(
            ConditionSet::compile([chain.as_str()]),
            Err(ConfigError::InvalidCondition { index: 0, .. })
        ));

        let chain = format!("val{} > 0", " + 1".repeat(500));
        assert!(matches!(
            ConditionSet::compile(["val > 0", chain.as_str()]),
            Err(ConfigError::InvalidCondition { index: 1, .. })
        ));
    }

    #[test]
    fn test_deep_nesting_is_config_error() {
        let nested = format!("{}val{} > 0", "(".repeat(100_000), ")".repeat(100_000));
        assert!(matches!(
            ConditionSet::compile([nested.as_str()]),
            Err(ConfigError::InvalidCondition { index: 0, .. })
        ));

        let nested = format!("{}val == 1", "not ".repeat(1_000));
        let err = ConditionSet::compile([nested.as_str()]).unwrap_err();
        assert!(err.to_string().contains("nested too deeply"), "{}", err);
    }

    #[test]
    fn test_accepted_chain_evaluates() {
        let chain = format!("val{} == 60", " + 1".repeat(50));
        let set = ConditionSet::compile([chain.as_str()]).unwrap();
        let condition = set.iter().next().unwrap();
        assert_eq!(condition.evaluate(&Signal::empty().with("val", 10)), Ok(true));
    }

    #[test]
    fn test_blank_condition_is_config_error() {
        assert!(matches!(
            ConditionSet::compile(["val == 1", "  "]),
            Err(ConfigError::EmptyCondition { index: 1 })
        ));
        assert!(matches!(
            ConditionSet::compile(["{{ }}"]),
            Err(ConfigError::EmptyCondition { index: 0 })
        ));
    }

    #[test]
    fn test_undefined_attribute_compiles() {
        // Only syntax is checked when compiling; attributes are resolved per record
        let set = ConditionSet::compile(["$vals != 23"]).unwrap();
        let signal = Signal::empty().with("val", 23);
        let condition = set.iter().next().unwrap();
        assert_eq!(
            condition.evaluate(&signal),
            Err(EvalError::MissingAttribute("vals".to_string()))
        );
    }

    #[test]
    fn test_from_defs() {
        let defs = vec![
            ConditionDef::Property {
                expr: "{{$val % 2 == 0}}".to_string(),
            },
            ConditionDef::Inline("val > 0".to_string()),
        ];
        let set = ConditionSet::from_defs(&defs).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.iter().all(|c| c.evaluate(&Signal::empty().with("val", 2)).unwrap()));
    }

    #[test]
    fn test_clone_shares_conditions() {
        let set = ConditionSet::compile(["val == 1"]).unwrap();
        let cloned = set.clone();
        assert!(Arc::ptr_eq(&set.conditions, &cloned.conditions));
    }
}
