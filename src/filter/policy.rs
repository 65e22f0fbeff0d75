// SPDX-License-Identifier: MIT

//! Combination policy for multiple conditions

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// How per-condition results combine into one pass/fail decision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CombinationPolicy {
    /// Pass when at least one condition holds
    Any,
    /// Pass only when every condition holds (default)
    #[default]
    All,
}

impl CombinationPolicy {
    /// Fold condition results, stopping as soon as the outcome is decided.
    ///
    /// `results` is consumed lazily, so conditions after the deciding one are
    /// never evaluated.
    pub fn combine<I>(self, results: I) -> bool
    where
        I: IntoIterator<Item = bool>,
    {
        let mut results = results.into_iter();
        match self {
            CombinationPolicy::Any => results.any(|holds| holds),
            CombinationPolicy::All => results.all(|holds| holds),
        }
    }
}

impl FromStr for CombinationPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ANY" => Ok(CombinationPolicy::Any),
            "ALL" => Ok(CombinationPolicy::All),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for CombinationPolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for CombinationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombinationPolicy::Any => write!(f, "ANY"),
            CombinationPolicy::All => write!(f, "ALL"),
        }
    }
}
