// SPDX-License-Identifier: MIT

//! Recursive-descent parser for condition expressions
//!
//! Parses expressions like:
//! - `val % 2 == 0`
//! - `$score >= 0.8 and tags contains 'urgent'`
//! - `re.match('foo', name) is not None`
//! - `{{ $val == math.log(1) }}`

use super::ast::{BinaryOp, CompareOp, Expression, Literal, UnaryOp};
use super::functions;
use super::lexer::{tokenize, Spanned, Token};
use crate::error::ParseError;

/// Parse a condition expression string into an AST
pub fn parse(input: &str) -> Result<Expression, ParseError> {
    let source = strip_template(input);
    if source.trim().is_empty() {
        return Err(ParseError::new("Empty expression", 0));
    }

    let tokens = tokenize(source)?;
    if tokens.len() > MAX_TOKENS {
        return Err(ParseError::new(
            format!("Expression too long (more than {} tokens)", MAX_TOKENS),
            tokens[MAX_TOKENS].position,
        ));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_or()?;

    if *parser.peek() != Token::End {
        return Err(parser.error(format!("Unexpected token {:?}", parser.peek())));
    }
    // Operator chains are built iteratively, so their depth is only known here
    if exceeds_depth(&expr, MAX_DEPTH) {
        return Err(ParseError::new("Expression nested too deeply", 0));
    }
    Ok(expr)
}

/// Upper bound on tokens in one expression; also bounds the AST size
const MAX_TOKENS: usize = 2048;

/// Upper bound on expression nesting, checked while parsing and on the final AST.
///
/// Evaluation recurses once per level, so this bounds its stack use.
const MAX_DEPTH: usize = 100;

/// Whether `expr` is deeper than `budget` levels; never recurses past `budget`
fn exceeds_depth(expr: &Expression, budget: usize) -> bool {
    let Some(budget) = budget.checked_sub(1) else {
        return true;
    };
    match expr {
        Expression::Literal(_) | Expression::Attribute(_) | Expression::Constant(_) => false,
        Expression::List(items) | Expression::Call { args: items, .. } => {
            items.iter().any(|item| exceeds_depth(item, budget))
        }
        Expression::Member { object, .. } => exceeds_depth(object, budget),
        Expression::Index { object, index } => {
            exceeds_depth(object, budget) || exceeds_depth(index, budget)
        }
        Expression::Unary { operand, .. } | Expression::Not(operand) => {
            exceeds_depth(operand, budget)
        }
        Expression::Binary { left, right, .. }
        | Expression::And(left, right)
        | Expression::Or(left, right) => exceeds_depth(left, budget) || exceeds_depth(right, budget),
        Expression::Compare { first, rest } => {
            exceeds_depth(first, budget) || rest.iter().any(|(_, e)| exceeds_depth(e, budget))
        }
    }
}

/// Remove a surrounding `{{ ... }}` template wrapper, if present
fn strip_template(input: &str) -> &str {
    let trimmed = input.trim();
    trimmed
        .strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
        .unwrap_or(trimmed)
}

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "contains", "true", "false", "null", "True", "False", "None",
];

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Current recursion depth of the descent
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].token.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.tokens[self.pos].position)
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("Expression nested too deeply"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s == word)
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ParseError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else if *self.peek() == Token::End {
            Err(self.error(format!("Unexpected end of expression, expected {}", what)))
        } else {
            Err(self.error(format!("Expected {}, found {:?}", what, self.peek())))
        }
    }

    fn parse_or(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_and()?;
        while self.is_keyword("or") {
            self.advance();
            let right = self.parse_and()?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_not()?;
        while self.is_keyword("and") {
            self.advance();
            let right = self.parse_not()?;
            left = Expression::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expression, ParseError> {
        self.enter()?;
        let expr = if self.is_keyword("not") {
            self.advance();
            self.parse_not().map(|inner| Expression::Not(Box::new(inner)))
        } else {
            self.parse_comparison()
        };
        self.leave();
        expr
    }

    fn parse_comparison(&mut self) -> Result<Expression, ParseError> {
        let first = self.parse_sum()?;
        let mut rest = Vec::new();

        while let Some(op) = self.compare_op() {
            let right = self.parse_sum()?;
            rest.push((op, right));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expression::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    /// Consume a comparison operator if one is next
    fn compare_op(&mut self) -> Option<CompareOp> {
        let op = match self.peek().clone() {
            Token::EqEq => CompareOp::Eq,
            Token::NotEq => CompareOp::NotEq,
            Token::Lt => CompareOp::Lt,
            Token::Lte => CompareOp::Lte,
            Token::Gt => CompareOp::Gt,
            Token::Gte => CompareOp::Gte,
            Token::Ident(word) => match word.as_str() {
                "in" => CompareOp::In,
                "contains" => CompareOp::Contains,
                "is" => {
                    self.advance();
                    if self.is_keyword("not") {
                        self.advance();
                        return Some(CompareOp::IsNot);
                    }
                    return Some(CompareOp::Is);
                }
                "not" if matches!(self.peek_at(1), Token::Ident(w) if w == "in") => {
                    self.advance();
                    self.advance();
                    return Some(CompareOp::NotIn);
                }
                _ => return None,
            },
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn parse_sum(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
    }

    fn parse_term(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::SlashSlash => BinaryOp::FloorDiv,
                Token::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        self.enter()?;
        let expr = match self.peek() {
            Token::Minus | Token::Plus => {
                let op = if *self.peek() == Token::Minus {
                    UnaryOp::Neg
                } else {
                    UnaryOp::Pos
                };
                self.advance();
                self.parse_unary().map(|operand| Expression::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            _ => self.parse_power(),
        };
        self.leave();
        expr
    }

    fn parse_power(&mut self) -> Result<Expression, ParseError> {
        let base = self.parse_postfix()?;
        if *self.peek() == Token::StarStar {
            self.advance();
            // Right-associative, and binds tighter than a unary minus on its left
            let exponent = self.parse_unary()?;
            return Ok(Expression::Binary {
                left: Box::new(base),
                op: BinaryOp::Pow,
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let name = self.identifier("member name after '.'")?;
                    expr = Expression::Member {
                        object: Box::new(expr),
                        name,
                    };
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_or()?;
                    self.expect(Token::RBracket, "']'")?;
                    expr = Expression::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Token::LParen => return Err(self.error("Only helper functions can be called")),
                _ => return Ok(expr),
            }
        }
    }

    fn identifier(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            Token::End => Err(self.error(format!("Unexpected end of expression, expected {}", what))),
            other => Err(self.error(format!("Expected {}, found {:?}", what, other))),
        }
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        match self.advance() {
            Token::Int(n) => Ok(Expression::Literal(Literal::Int(n))),
            Token::Float(f) => Ok(Expression::Literal(Literal::Float(f))),
            Token::Str(s) => Ok(Expression::Literal(Literal::String(s))),
            Token::Attr(name) => Ok(Expression::Attribute(name)),
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::LBracket => {
                let items = self.parse_sequence(Token::RBracket, "']'")?;
                Ok(Expression::List(items))
            }
            Token::Ident(name) => self.parse_name(name),
            Token::End => Err(self.error("Unexpected end of expression")),
            other => {
                // Point at the offending token rather than the one after it
                self.pos = self.pos.saturating_sub(1);
                Err(self.error(format!("Unexpected token {:?}", other)))
            }
        }
    }

    /// Bare identifier: literal keyword, helper call, helper constant or attribute
    fn parse_name(&mut self, name: String) -> Result<Expression, ParseError> {
        match name.as_str() {
            "true" | "True" => return Ok(Expression::Literal(Literal::Boolean(true))),
            "false" | "False" => return Ok(Expression::Literal(Literal::Boolean(false))),
            "null" | "None" => return Ok(Expression::Literal(Literal::Null)),
            _ => {}
        }
        if KEYWORDS.contains(&name.as_str()) {
            self.pos = self.pos.saturating_sub(1);
            return Err(self.error(format!("Unexpected keyword '{}'", name)));
        }

        if functions::is_namespace(&name) {
            self.expect(Token::Dot, &format!("'.' after helper namespace '{}'", name))?;
            let member = self.identifier("helper name")?;
            let qualified = format!("{}.{}", name, member);
            if *self.peek() == Token::LParen {
                self.advance();
                let args = self.parse_sequence(Token::RParen, "')'")?;
                return Ok(Expression::Call {
                    function: qualified,
                    args,
                });
            }
            return Ok(Expression::Constant(qualified));
        }

        if *self.peek() == Token::LParen {
            self.advance();
            let args = self.parse_sequence(Token::RParen, "')'")?;
            return Ok(Expression::Call {
                function: name,
                args,
            });
        }

        Ok(Expression::Attribute(name))
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed
    fn parse_sequence(&mut self, close: Token, what: &str) -> Result<Vec<Expression>, ParseError> {
        let mut items = Vec::new();
        if *self.peek() == close {
            self.advance();
            return Ok(items);
        }
        loop {
            items.push(self.parse_or()?);
            if *self.peek() == Token::Comma {
                self.advance();
                if *self.peek() == close {
                    self.advance();
                    return Ok(items);
                }
                continue;
            }
            self.expect(close, what)?;
            return Ok(items);
        }
    }
}
