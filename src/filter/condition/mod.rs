// SPDX-License-Identifier: MIT

//! Condition expressions for the signal filter
//!
//! A small sandboxed expression language: conditions are tokenized and parsed
//! once into an AST, then walked against each signal. Only signal attributes
//! and the whitelisted helpers in [`functions`] are reachable. Examples:
//! - `val % 2 == 0`
//! - `$score > 0.8 and tags contains 'urgent'`
//! - `re.match('foo', name) is not None`
//! - `datetime.now() - datetime.parse(created) < datetime.days(7)`

mod ast;
mod evaluator;
pub mod functions;
mod lexer;
mod parser;
mod value;

pub use ast::{BinaryOp, CompareOp, Expression, Literal, UnaryOp};
pub use evaluator::{evaluate, is_satisfied};
pub use parser::parse;
pub use value::Value;
