// SPDX-License-Identifier: MIT

//! Signals: the records flowing through a filter
//!
//! A signal wraps an arbitrary JSON value. Only JSON objects expose named
//! attributes; any other value is still a valid signal, it simply has none.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use super::condition::Value;

/// Read-only access to a record's named attributes.
///
/// `None` means the attribute is not present on the record.
pub trait AttributeLookup {
    fn attribute(&self, key: &str) -> Option<Value>;
}

/// A structured record flowing through the pipeline
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signal {
    data: Json,
}

impl Signal {
    pub fn new(data: Json) -> Self {
        Self { data }
    }

    /// An object signal with no attributes
    pub fn empty() -> Self {
        Self {
            data: Json::Object(Map::new()),
        }
    }

    /// Builder-style attribute setter.
    ///
    /// A non-object signal is replaced by an object holding just this attribute.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Json>) -> Self {
        if !self.data.is_object() {
            self.data = Json::Object(Map::new());
        }
        if let Json::Object(map) = &mut self.data {
            map.insert(key.into(), value.into());
        }
        self
    }

    /// Get a top-level attribute
    pub fn get(&self, key: &str) -> Option<&Json> {
        self.data.as_object()?.get(key)
    }
}

impl From<Json> for Signal {
    fn from(data: Json) -> Self {
        Self::new(data)
    }
}

impl AttributeLookup for Signal {
    fn attribute(&self, key: &str) -> Option<Value> {
        self.get(key).map(Value::from_json)
    }
}

impl AttributeLookup for Json {
    fn attribute(&self, key: &str) -> Option<Value> {
        self.as_object()?.get(key).map(Value::from_json)
    }
}
