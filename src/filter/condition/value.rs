// SPDX-License-Identifier: MIT

//! Runtime values produced while evaluating a condition

use chrono::{DateTime, Datelike, TimeDelta, Timelike, Utc};
use serde_json::Value as Json;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::EvalError;

/// A dynamically typed value inside the expression sandbox
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    DateTime(DateTime<Utc>),
    Duration(TimeDelta),
}

impl Value {
    /// Convert a JSON attribute into a sandbox value
    pub fn from_json(json: &Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Str(s.clone()),
            Json::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Truthiness rule shared by every boolean context.
    ///
    /// `false`, `null`, zero, NaN, empty strings, empty lists, empty maps and
    /// zero durations are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::DateTime(_) => true,
            Value::Duration(d) => !d.is_zero(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "object",
            Value::DateTime(_) => "datetime",
            Value::Duration(_) => "duration",
        }
    }

    /// Numeric view of ints and floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Equality used by `==`, `!=`, `in` and `contains`.
    ///
    /// Never fails: values of different kinds are unequal, except ints and
    /// floats which compare numerically.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.loose_eq(other)))
            }
            _ => self == other,
        }
    }

    /// Ordering used by `<`, `<=`, `>`, `>=`, `min` and `max`.
    ///
    /// `Ok(None)` means the values are of a comparable kind but unordered (NaN).
    pub fn compare(&self, other: &Value) -> Result<Option<Ordering>, EvalError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Some(a.cmp(b))),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                Ok(self.as_f64().partial_cmp(&other.as_f64()))
            }
            (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
            (Value::DateTime(a), Value::DateTime(b)) => Ok(Some(a.cmp(b))),
            (Value::Duration(a), Value::Duration(b)) => Ok(Some(a.cmp(b))),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    match x.compare(y)? {
                        Some(Ordering::Equal) => continue,
                        other => return Ok(other),
                    }
                }
                Ok(Some(a.len().cmp(&b.len())))
            }
            _ => Err(EvalError::type_mismatch(format!(
                "cannot order {} and {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Member access: object keys, datetime fields and duration fields
    pub fn member(&self, name: &str) -> Result<Value, EvalError> {
        match self {
            Value::Map(map) => map
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::MissingAttribute(name.to_string())),
            Value::DateTime(dt) => match name {
                "year" => Ok(Value::Int(dt.year() as i64)),
                "month" => Ok(Value::Int(dt.month() as i64)),
                "day" => Ok(Value::Int(dt.day() as i64)),
                "hour" => Ok(Value::Int(dt.hour() as i64)),
                "minute" => Ok(Value::Int(dt.minute() as i64)),
                "second" => Ok(Value::Int(dt.second() as i64)),
                // Monday is 0
                "weekday" => Ok(Value::Int(dt.weekday().num_days_from_monday() as i64)),
                "timestamp" => Ok(Value::Float(dt.timestamp_millis() as f64 / 1000.0)),
                _ => Err(EvalError::MissingAttribute(name.to_string())),
            },
            Value::Duration(d) => match name {
                "total_seconds" => Ok(Value::Float(d.num_milliseconds() as f64 / 1000.0)),
                "days" => Ok(Value::Int(d.num_days())),
                _ => Err(EvalError::MissingAttribute(name.to_string())),
            },
            other => Err(EvalError::type_mismatch(format!(
                "{} has no member '{}'",
                other.type_name(),
                name
            ))),
        }
    }

    /// Subscript: list and string positions (negative counts from the end), object keys
    pub fn index(&self, index: &Value) -> Result<Value, EvalError> {
        match (self, index) {
            (Value::List(items), Value::Int(i)) => resolve_index(*i, items.len())
                .map(|idx| items[idx].clone())
                .ok_or(EvalError::IndexOutOfRange(*i)),
            (Value::Str(s), Value::Int(i)) => {
                let chars: Vec<char> = s.chars().collect();
                resolve_index(*i, chars.len())
                    .map(|idx| Value::Str(chars[idx].to_string()))
                    .ok_or(EvalError::IndexOutOfRange(*i))
            }
            (Value::Map(map), Value::Str(key)) => map
                .get(key)
                .cloned()
                .ok_or_else(|| EvalError::MissingAttribute(key.clone())),
            (container, idx) => Err(EvalError::type_mismatch(format!(
                "cannot index {} with {}",
                container.type_name(),
                idx.type_name()
            ))),
        }
    }

    /// Membership test behind `in` / `contains`
    pub fn contains(&self, needle: &Value) -> Result<bool, EvalError> {
        match (self, needle) {
            (Value::Str(haystack), Value::Str(n)) => Ok(haystack.contains(n.as_str())),
            (Value::List(items), n) => Ok(items.iter().any(|item| item.loose_eq(n))),
            (Value::Map(map), Value::Str(key)) => Ok(map.contains_key(key)),
            (container, n) => Err(EvalError::type_mismatch(format!(
                "cannot look for {} in {}",
                n.type_name(),
                container.type_name()
            ))),
        }
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if index < 0 { len + index } else { index };
    (0..len).contains(&idx).then_some(idx as usize)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        Value::Str(s) => write!(f, "{:?}", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match v {
                        Value::Str(s) => write!(f, "{:?}: {:?}", k, s)?,
                        other => write!(f, "{:?}: {}", k, other)?,
                    }
                }
                write!(f, "}}")
            }
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Duration(d) => write!(f, "{}s", d.num_milliseconds() as f64 / 1000.0),
        }
    }
}
