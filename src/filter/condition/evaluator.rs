// SPDX-License-Identifier: MIT

//! Condition expression evaluator
//!
//! Walks the AST against one record. Evaluation is a pure function of the
//! expression and the record; any fault is returned as an `EvalError`.

use chrono::TimeDelta;

use super::ast::{BinaryOp, CompareOp, Expression, Literal, UnaryOp};
use super::functions;
use super::value::Value;
use crate::error::EvalError;
use crate::filter::signal::AttributeLookup;

/// Evaluate an expression against a record, producing a value
pub fn evaluate<R>(expr: &Expression, record: &R) -> Result<Value, EvalError>
where
    R: AttributeLookup + ?Sized,
{
    match expr {
        Expression::Literal(literal) => Ok(literal_value(literal)),
        Expression::List(items) => items
            .iter()
            .map(|item| evaluate(item, record))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Expression::Attribute(name) => record
            .attribute(name)
            .ok_or_else(|| EvalError::MissingAttribute(name.clone())),
        Expression::Constant(name) => functions::constant(name),
        Expression::Member { object, name } => evaluate(object, record)?.member(name),
        Expression::Index { object, index } => {
            let container = evaluate(object, record)?;
            let index = evaluate(index, record)?;
            container.index(&index)
        }
        Expression::Call { function, args } => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, record))
                .collect::<Result<Vec<_>, _>>()?;
            functions::call(function, &args)
        }
        Expression::Unary { op, operand } => unary(*op, evaluate(operand, record)?),
        Expression::Binary { left, op, right } => {
            let left = evaluate(left, record)?;
            let right = evaluate(right, record)?;
            binary(*op, left, right)
        }
        Expression::Compare { first, rest } => {
            let mut left = evaluate(first, record)?;
            for (op, next) in rest {
                let right = evaluate(next, record)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        Expression::And(left, right) => {
            let left = evaluate(left, record)?;
            if !left.is_truthy() {
                return Ok(left);
            }
            evaluate(right, record)
        }
        Expression::Or(left, right) => {
            let left = evaluate(left, record)?;
            if left.is_truthy() {
                return Ok(left);
            }
            evaluate(right, record)
        }
        Expression::Not(inner) => Ok(Value::Bool(!evaluate(inner, record)?.is_truthy())),
    }
}

/// Evaluate an expression and reduce the result to its truthiness
pub fn is_satisfied<R>(expr: &Expression, record: &R) -> Result<bool, EvalError>
where
    R: AttributeLookup + ?Sized,
{
    evaluate(expr, record).map(|value| value.is_truthy())
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::String(s) => Value::Str(s.clone()),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    use std::cmp::Ordering::{Equal, Greater, Less};

    Ok(match op {
        CompareOp::Eq => left.loose_eq(right),
        CompareOp::NotEq => !left.loose_eq(right),
        CompareOp::Lt => left.compare(right)? == Some(Less),
        CompareOp::Lte => matches!(left.compare(right)?, Some(Less | Equal)),
        CompareOp::Gt => left.compare(right)? == Some(Greater),
        CompareOp::Gte => matches!(left.compare(right)?, Some(Greater | Equal)),
        CompareOp::In => right.contains(left)?,
        CompareOp::NotIn => !right.contains(left)?,
        CompareOp::Contains => left.contains(right)?,
        // Identity: same kind and same value, no numeric coercion
        CompareOp::Is => left == right,
        CompareOp::IsNot => left != right,
    })
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    match (op, value) {
        (UnaryOp::Neg, Value::Int(i)) => i.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, Value::Duration(d)) => Ok(Value::Duration(-d)),
        (UnaryOp::Pos, v @ (Value::Int(_) | Value::Float(_) | Value::Duration(_))) => Ok(v),
        (op, other) => Err(EvalError::type_mismatch(format!(
            "bad operand type for unary {}: {}",
            if op == UnaryOp::Neg { "-" } else { "+" },
            other.type_name()
        ))),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => int_arithmetic(op, *a, *b),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            // Both sides are numeric here
            let a = left.as_f64().unwrap_or_default();
            let b = right.as_f64().unwrap_or_default();
            float_arithmetic(op, a, b)
        }
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => Ok(Value::Str(format!("{}{}", a, b))),
        (Value::List(a), Value::List(b)) if op == BinaryOp::Add => {
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        (Value::DateTime(_) | Value::Duration(_), _) | (_, Value::DateTime(_) | Value::Duration(_)) => {
            temporal_arithmetic(op, &left, &right)
        }
        _ => Err(unsupported(op, &left, &right)),
    }
}

fn unsupported(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    EvalError::type_mismatch(format!(
        "unsupported operand types for {}: {} and {}",
        op,
        left.type_name(),
        right.type_name()
    ))
}

/// Integer arithmetic with floor semantics for `//` and `%`
fn int_arithmetic(op: BinaryOp, a: i64, b: i64) -> Result<Value, EvalError> {
    let checked = |result: Option<i64>| result.map(Value::Int).ok_or(EvalError::Overflow);

    match op {
        BinaryOp::Add => checked(a.checked_add(b)),
        BinaryOp::Sub => checked(a.checked_sub(b)),
        BinaryOp::Mul => checked(a.checked_mul(b)),
        BinaryOp::Div => float_arithmetic(op, a as f64, b as f64),
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            let q = a.checked_div(b).ok_or(EvalError::Overflow)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                checked(q.checked_sub(1))
            } else {
                Ok(Value::Int(q))
            }
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            let r = a.wrapping_rem(b);
            if r != 0 && ((r < 0) != (b < 0)) {
                Ok(Value::Int(r + b))
            } else {
                Ok(Value::Int(r))
            }
        }
        BinaryOp::Pow => match u32::try_from(b) {
            Ok(exp) => checked(a.checked_pow(exp)),
            Err(_) if b < 0 => float_arithmetic(op, a as f64, b as f64),
            Err(_) => Err(EvalError::Overflow),
        },
    }
}

fn float_arithmetic(op: BinaryOp, a: f64, b: f64) -> Result<Value, EvalError> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            a / b
        }
        BinaryOp::FloorDiv => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            (a / b).floor()
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }
        }
        BinaryOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            let p = a.powf(b);
            if p.is_nan() && !a.is_nan() && !b.is_nan() {
                return Err(EvalError::type_mismatch("power result is not a real number"));
            }
            p
        }
    };
    Ok(Value::Float(result))
}

fn duration_factor(n: i64) -> Result<i32, EvalError> {
    i32::try_from(n).map_err(|_| EvalError::Overflow)
}

/// Datetime and duration arithmetic
fn temporal_arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let overflow = |d: Option<TimeDelta>| d.map(Value::Duration).ok_or(EvalError::Overflow);

    match (op, left, right) {
        (BinaryOp::Sub, Value::DateTime(a), Value::DateTime(b)) => {
            Ok(Value::Duration(a.signed_duration_since(*b)))
        }
        (BinaryOp::Add, Value::DateTime(dt), Value::Duration(d))
        | (BinaryOp::Add, Value::Duration(d), Value::DateTime(dt)) => dt
            .checked_add_signed(*d)
            .map(Value::DateTime)
            .ok_or(EvalError::Overflow),
        (BinaryOp::Sub, Value::DateTime(dt), Value::Duration(d)) => dt
            .checked_sub_signed(*d)
            .map(Value::DateTime)
            .ok_or(EvalError::Overflow),
        (BinaryOp::Add, Value::Duration(a), Value::Duration(b)) => overflow(a.checked_add(b)),
        (BinaryOp::Sub, Value::Duration(a), Value::Duration(b)) => overflow(a.checked_sub(b)),
        (BinaryOp::Mul, Value::Duration(d), Value::Int(n))
        | (BinaryOp::Mul, Value::Int(n), Value::Duration(d)) => {
            overflow(d.checked_mul(duration_factor(*n)?))
        }
        (BinaryOp::Div | BinaryOp::FloorDiv, Value::Duration(d), Value::Int(n)) => {
            if *n == 0 {
                return Err(EvalError::DivisionByZero);
            }
            overflow(d.checked_div(duration_factor(*n)?))
        }
        (BinaryOp::Div, Value::Duration(a), Value::Duration(b)) => {
            if b.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Float(
                a.num_milliseconds() as f64 / b.num_milliseconds() as f64,
            ))
        }
        _ => Err(unsupported(op, left, right)),
    }
}
