// SPDX-License-Identifier: MIT

//! Whitelisted helper functions callable from conditions
//!
//! Nothing outside this table can be reached from an expression. Helpers are
//! grouped as bare builtins (`len`, `abs`, ...) and three namespaces:
//! `math.*`, `re.*` (pattern matching) and `datetime.*` (date/time arithmetic).

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;

use super::value::Value;
use crate::error::EvalError;

type Helper = fn(&str, &[Value]) -> Result<Value, EvalError>;

/// Namespaces whose members are helpers rather than signal attributes
const NAMESPACES: &[&str] = &["math", "re", "datetime"];

static HELPERS: Lazy<HashMap<&'static str, Helper>> = Lazy::new(|| {
    let entries: [(&'static str, Helper); 34] = [
        ("len", builtin_len),
        ("abs", builtin_abs),
        ("min", builtin_min),
        ("max", builtin_max),
        ("round", builtin_round),
        ("int", builtin_int),
        ("float", builtin_float),
        ("str", builtin_str),
        ("bool", builtin_bool),
        ("lower", builtin_lower),
        ("upper", builtin_upper),
        ("math.sqrt", math_sqrt),
        ("math.log", math_log),
        ("math.log10", math_log10),
        ("math.log2", math_log2),
        ("math.exp", math_exp),
        ("math.pow", math_pow),
        ("math.floor", math_floor),
        ("math.ceil", math_ceil),
        ("math.fabs", math_fabs),
        ("math.isclose", math_isclose),
        ("re.match", re_match),
        ("re.search", re_search),
        ("re.fullmatch", re_fullmatch),
        ("re.findall", re_findall),
        ("re.sub", re_sub),
        ("datetime.now", datetime_now),
        ("datetime.parse", datetime_parse),
        ("datetime.fromtimestamp", datetime_fromtimestamp),
        ("datetime.days", datetime_days),
        ("datetime.hours", datetime_hours),
        ("datetime.minutes", datetime_minutes),
        ("datetime.seconds", datetime_seconds),
        ("datetime.timedelta", datetime_timedelta),
    ];
    entries.into_iter().collect()
});

/// Compiled patterns keyed by their final (anchored) source
static REGEX_CACHE: Lazy<Mutex<HashMap<String, Regex>>> = Lazy::new(|| Mutex::new(HashMap::new()));

const REGEX_CACHE_LIMIT: usize = 256;

/// Whether `name` is a helper namespace such as `math`
pub fn is_namespace(name: &str) -> bool {
    NAMESPACES.contains(&name)
}

/// Invoke a whitelisted helper by its qualified name
pub fn call(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    let helper = HELPERS
        .get(name)
        .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
    helper(name, args)
}

/// Resolve a helper constant such as `math.pi`
pub fn constant(name: &str) -> Result<Value, EvalError> {
    match name {
        "math.pi" => Ok(Value::Float(std::f64::consts::PI)),
        "math.e" => Ok(Value::Float(std::f64::consts::E)),
        "math.inf" => Ok(Value::Float(f64::INFINITY)),
        _ => Err(EvalError::UnknownFunction(name.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), EvalError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(EvalError::invalid_argument(
            name,
            format!("expected {} arguments, got {}", expected, args.len()),
        ));
    }
    Ok(())
}

fn number(name: &str, value: &Value) -> Result<f64, EvalError> {
    value
        .as_f64()
        .ok_or_else(|| EvalError::invalid_argument(name, format!("expected a number, got {}", value.type_name())))
}

fn text<'a>(name: &str, value: &'a Value) -> Result<&'a str, EvalError> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(EvalError::invalid_argument(
            name,
            format!("expected a string, got {}", other.type_name()),
        )),
    }
}

fn float_to_int(name: &str, f: f64) -> Result<Value, EvalError> {
    if !f.is_finite() || f < i64::MIN as f64 || f >= i64::MAX as f64 {
        return Err(EvalError::invalid_argument(name, format!("cannot convert {} to int", f)));
    }
    Ok(Value::Int(f as i64))
}

fn finite(name: &str, f: f64) -> Result<Value, EvalError> {
    if f.is_nan() {
        return Err(EvalError::invalid_argument(name, "math domain error"));
    }
    Ok(Value::Float(f))
}

// ---------------------------------------------------------------------------
// Builtins
// ---------------------------------------------------------------------------

fn builtin_len(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 1)?;
    let len = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        other => {
            return Err(EvalError::invalid_argument(
                name,
                format!("{} has no length", other.type_name()),
            ))
        }
    };
    Ok(Value::Int(len as i64))
}

fn builtin_abs(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 1)?;
    match &args[0] {
        Value::Int(i) => i.checked_abs().map(Value::Int).ok_or(EvalError::Overflow),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Duration(d) => Ok(Value::Duration(d.abs())),
        other => Err(EvalError::invalid_argument(
            name,
            format!("expected a number, got {}", other.type_name()),
        )),
    }
}

fn extremum(name: &str, args: &[Value], want: std::cmp::Ordering) -> Result<Value, EvalError> {
    let candidates: &[Value] = match args {
        [Value::List(items)] => items,
        [_] | [] => {
            return Err(EvalError::invalid_argument(
                name,
                "expected a list or at least two arguments",
            ))
        }
        many => many,
    };
    let mut best = candidates
        .first()
        .ok_or_else(|| EvalError::invalid_argument(name, "empty sequence"))?;
    for candidate in &candidates[1..] {
        if candidate.compare(best)? == Some(want) {
            best = candidate;
        }
    }
    Ok(best.clone())
}

fn builtin_min(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    extremum(name, args, std::cmp::Ordering::Less)
}

fn builtin_max(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    extremum(name, args, std::cmp::Ordering::Greater)
}

/// Round half to even; without `ndigits` the result is an int
fn builtin_round(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 2)?;
    let ndigits = match args.get(1) {
        None | Some(Value::Null) => None,
        Some(Value::Int(n)) => Some(*n),
        Some(other) => {
            return Err(EvalError::invalid_argument(
                name,
                format!("ndigits must be an int, got {}", other.type_name()),
            ))
        }
    };
    match (&args[0], ndigits) {
        (Value::Int(i), _) => Ok(Value::Int(*i)),
        (Value::Float(f), None) => float_to_int(name, f.round_ties_even()),
        (Value::Float(f), Some(n)) => {
            let n = i32::try_from(n).map_err(|_| EvalError::invalid_argument(name, "ndigits out of range"))?;
            let scale = 10f64.powi(n);
            Ok(Value::Float((f * scale).round_ties_even() / scale))
        }
        (other, _) => Err(EvalError::invalid_argument(
            name,
            format!("expected a number, got {}", other.type_name()),
        )),
    }
}

fn builtin_int(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 1)?;
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => float_to_int(name, f.trunc()),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| EvalError::invalid_argument(name, format!("invalid literal '{}'", s))),
        other => Err(EvalError::invalid_argument(
            name,
            format!("cannot convert {} to int", other.type_name()),
        )),
    }
}

fn builtin_float(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 1)?;
    match &args[0] {
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| EvalError::invalid_argument(name, format!("invalid literal '{}'", s))),
        other => Err(EvalError::invalid_argument(
            name,
            format!("cannot convert {} to float", other.type_name()),
        )),
    }
}

fn builtin_str(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 1)?;
    Ok(Value::Str(args[0].to_string()))
}

fn builtin_bool(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 1)?;
    Ok(Value::Bool(args[0].is_truthy()))
}

fn builtin_lower(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 1)?;
    Ok(Value::Str(text(name, &args[0])?.to_lowercase()))
}

fn builtin_upper(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 1)?;
    Ok(Value::Str(text(name, &args[0])?.to_uppercase()))
}

// ---------------------------------------------------------------------------
// math.*
// ---------------------------------------------------------------------------

fn math_sqrt(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 1)?;
    let x = number(name, &args[0])?;
    if x < 0.0 {
        return Err(EvalError::invalid_argument(name, "math domain error"));
    }
    Ok(Value::Float(x.sqrt()))
}

fn positive(name: &str, value: &Value) -> Result<f64, EvalError> {
    let x = number(name, value)?;
    if x <= 0.0 {
        return Err(EvalError::invalid_argument(name, "math domain error"));
    }
    Ok(x)
}

fn math_log(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 2)?;
    let x = positive(name, &args[0])?;
    match args.get(1) {
        None => Ok(Value::Float(x.ln())),
        Some(base) => {
            let base = positive(name, base)?;
            if base == 1.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Float(x.ln() / base.ln()))
        }
    }
}

fn math_log10(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 1)?;
    Ok(Value::Float(positive(name, &args[0])?.log10()))
}

fn math_log2(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 1)?;
    Ok(Value::Float(positive(name, &args[0])?.log2()))
}

fn math_exp(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 1)?;
    Ok(Value::Float(number(name, &args[0])?.exp()))
}

fn math_pow(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 2, 2)?;
    let x = number(name, &args[0])?;
    let y = number(name, &args[1])?;
    finite(name, x.powf(y))
}

fn math_floor(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 1)?;
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(*i)),
        other => float_to_int(name, number(name, other)?.floor()),
    }
}

fn math_ceil(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 1)?;
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(*i)),
        other => float_to_int(name, number(name, other)?.ceil()),
    }
}

fn math_fabs(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 1)?;
    Ok(Value::Float(number(name, &args[0])?.abs()))
}

/// Relative tolerance 1e-9, optional absolute tolerance as third argument
fn math_isclose(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 2, 3)?;
    let a = number(name, &args[0])?;
    let b = number(name, &args[1])?;
    let abs_tol = match args.get(2) {
        Some(v) => number(name, v)?,
        None => 0.0,
    };
    if a == b {
        return Ok(Value::Bool(true));
    }
    let diff = (a - b).abs();
    let rel = 1e-9 * a.abs().max(b.abs());
    Ok(Value::Bool(diff <= rel.max(abs_tol)))
}

// ---------------------------------------------------------------------------
// re.*
// ---------------------------------------------------------------------------

fn compiled(pattern: String) -> Result<Regex, EvalError> {
    let mut cache = REGEX_CACHE
        .lock()
        .map_err(|_| EvalError::Regex("pattern cache poisoned".to_string()))?;
    if let Some(re) = cache.get(&pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(&pattern).map_err(|e| EvalError::Regex(e.to_string()))?;
    if cache.len() >= REGEX_CACHE_LIMIT {
        cache.clear();
    }
    cache.insert(pattern, re.clone());
    Ok(re)
}

fn matched(re: &Regex, subject: &str) -> Value {
    re.find(subject)
        .map(|m| Value::Str(m.as_str().to_string()))
        .unwrap_or(Value::Null)
}

/// Compile `pattern` wrapped in anchors.
///
/// The bare pattern is compiled first so an unbalanced group cannot escape the wrapper.
fn anchored(pattern: &str, prefix: &str, suffix: &str) -> Result<Regex, EvalError> {
    compiled(pattern.to_string())?;
    compiled(format!("{}(?:{}){}", prefix, pattern, suffix))
}

/// Match anchored at the start of the string; returns the matched text or null
fn re_match(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 2, 2)?;
    let re = anchored(text(name, &args[0])?, "^", "")?;
    Ok(matched(&re, text(name, &args[1])?))
}

fn re_search(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 2, 2)?;
    let re = compiled(text(name, &args[0])?.to_string())?;
    Ok(matched(&re, text(name, &args[1])?))
}

fn re_fullmatch(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 2, 2)?;
    let re = anchored(text(name, &args[0])?, "^", "$")?;
    Ok(matched(&re, text(name, &args[1])?))
}

/// All non-overlapping matches; with exactly one capture group, the group text
fn re_findall(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 2, 2)?;
    let re = compiled(text(name, &args[0])?.to_string())?;
    let subject = text(name, &args[1])?;
    let found = if re.captures_len() == 2 {
        re.captures_iter(subject)
            .map(|c| Value::Str(c.get(1).map(|m| m.as_str()).unwrap_or("").to_string()))
            .collect()
    } else {
        re.find_iter(subject)
            .map(|m| Value::Str(m.as_str().to_string()))
            .collect()
    };
    Ok(Value::List(found))
}

fn re_sub(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 3, 3)?;
    let re = compiled(text(name, &args[0])?.to_string())?;
    let replacement = text(name, &args[1])?;
    let subject = text(name, &args[2])?;
    Ok(Value::Str(re.replace_all(subject, replacement).into_owned()))
}

// ---------------------------------------------------------------------------
// datetime.*
// ---------------------------------------------------------------------------

fn datetime_now(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 0, 0)?;
    Ok(Value::DateTime(Utc::now()))
}

/// RFC 3339, or `YYYY-MM-DD[ HH:MM:SS]` read as UTC
fn datetime_parse(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 1)?;
    let s = text(name, &args[0])?.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(Value::DateTime(dt.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Value::DateTime(naive.and_utc()));
        }
    }
    if let Some(naive) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(Value::DateTime(naive.and_utc()));
    }

    Err(EvalError::invalid_argument(
        name,
        format!("unrecognised datetime '{}'", s),
    ))
}

fn datetime_fromtimestamp(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 1)?;
    let dt = match &args[0] {
        Value::Int(secs) => DateTime::from_timestamp(*secs, 0),
        other => {
            let secs = number(name, other)?;
            if !secs.is_finite() {
                None
            } else {
                DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
            }
        }
    };
    dt.map(Value::DateTime)
        .ok_or_else(|| EvalError::invalid_argument(name, "timestamp out of range"))
}

fn duration(name: &str, args: &[Value], unit_millis: i64) -> Result<Value, EvalError> {
    arity(name, args, 1, 1)?;
    let millis = match &args[0] {
        Value::Int(n) => n.checked_mul(unit_millis).ok_or(EvalError::Overflow)?,
        other => {
            let f = number(name, other)? * unit_millis as f64;
            if !f.is_finite() || f.abs() >= i64::MAX as f64 {
                return Err(EvalError::Overflow);
            }
            f.round() as i64
        }
    };
    TimeDelta::try_milliseconds(millis)
        .map(Value::Duration)
        .ok_or(EvalError::Overflow)
}

fn datetime_days(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    duration(name, args, 86_400_000)
}

fn datetime_hours(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    duration(name, args, 3_600_000)
}

fn datetime_minutes(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    duration(name, args, 60_000)
}

fn datetime_seconds(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    duration(name, args, 1_000)
}

/// `timedelta(days[, seconds])`
fn datetime_timedelta(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    arity(name, args, 1, 2)?;
    let mut total = TimeDelta::zero();
    let units = [86_400_000, 1_000];
    for (arg, unit_millis) in args.iter().zip(units) {
        if let Value::Duration(part) = duration(name, std::slice::from_ref(arg), unit_millis)? {
            total = total.checked_add(&part).ok_or(EvalError::Overflow)?;
        }
    }
    Ok(Value::Duration(total))
}
