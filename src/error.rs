// SPDX-License-Identifier: MIT

//! Typed error handling for signal-filter
//!
//! Two classes of failure exist: configuration errors, which are fatal when a
//! filter is built, and evaluation errors, which are absorbed as `false` for a
//! single condition on a single signal.

use thiserror::Error;

/// Top-level error type for signal-filter
#[derive(Debug, Error)]
pub enum FilterError {
    /// Configuration errors (uncompilable conditions, unknown policy)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors raised while turning a configuration into a serving filter
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A condition expression did not compile
    #[error("Condition #{index} `{expr}` failed to compile: {source}")]
    InvalidCondition {
        index: usize,
        expr: String,
        #[source]
        source: ParseError,
    },

    /// A condition expression was blank
    #[error("Condition #{index} is empty")]
    EmptyCondition { index: usize },

    /// Operator selector other than ANY / ALL
    #[error("Unknown condition operator: {0}")]
    UnknownPolicy(String),
}

/// Syntax error in a condition expression
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message} at position {position}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// Failure while evaluating a compiled condition against one signal
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    /// Attribute is not present on the signal
    #[error("Attribute '{0}' not found")]
    MissingAttribute(String),

    /// Operator or helper applied to values of the wrong kind
    #[error("Type error: {0}")]
    TypeMismatch(String),

    /// Call to a helper outside the whitelist
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    /// Helper called with wrong arity or argument values
    #[error("Invalid argument to '{function}': {message}")]
    InvalidArgument { function: String, message: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Integer overflow")]
    Overflow,

    /// Pattern passed to a `re.*` helper did not compile
    #[error("Invalid pattern: {0}")]
    Regex(String),

    #[error("Index {0} out of range")]
    IndexOutOfRange(i64),
}

impl EvalError {
    pub(crate) fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch(message.into())
    }

    pub(crate) fn invalid_argument(function: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            function: function.to_string(),
            message: message.into(),
        }
    }
}
