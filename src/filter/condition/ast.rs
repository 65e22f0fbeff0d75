// SPDX-License-Identifier: MIT

//! Abstract Syntax Tree for condition expressions

/// A condition expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value
    Literal(Literal),
    /// List display: `[a, b, c]`
    List(Vec<Expression>),
    /// Signal attribute reference: `val` or `$val`
    Attribute(String),
    /// Whitelisted helper constant such as `math.pi`
    Constant(String),
    /// Member access on a value: `obj.field`
    Member {
        object: Box<Expression>,
        name: String,
    },
    /// Subscript: `obj[index]`
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    /// Call to a whitelisted helper, e.g. `len(x)` or `re.match(p, s)`
    Call {
        function: String,
        args: Vec<Expression>,
    },
    /// Unary arithmetic: `-x`, `+x`
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    /// Binary arithmetic: left op right
    Binary {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
    },
    /// Comparison chain: `first op1 e1 op2 e2 ...`
    ///
    /// A single comparison has one entry in `rest`.
    Compare {
        first: Box<Expression>,
        rest: Vec<(CompareOp, Expression)>,
    },
    /// Logical AND
    And(Box<Expression>, Box<Expression>),
    /// Logical OR
    Or(Box<Expression>, Box<Expression>),
    /// Logical NOT
    Not(Box<Expression>),
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// ==
    Eq,
    /// !=
    NotEq,
    /// >
    Gt,
    /// >=
    Gte,
    /// <
    Lt,
    /// <=
    Lte,
    /// in
    In,
    /// not in
    NotIn,
    /// is
    Is,
    /// is not
    IsNot,
    /// contains (for strings, arrays and object keys)
    Contains,
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
}

/// Literal values in expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Int(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

impl Expression {
    /// Convenience constructor for a single comparison
    pub fn compare(left: Expression, op: CompareOp, right: Expression) -> Self {
        Expression::Compare {
            first: Box::new(left),
            rest: vec![(op, right)],
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::NotEq => write!(f, "!="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
            CompareOp::In => write!(f, "in"),
            CompareOp::NotIn => write!(f, "not in"),
            CompareOp::Is => write!(f, "is"),
            CompareOp::IsNot => write!(f, "is not"),
            CompareOp::Contains => write!(f, "contains"),
        }
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::Div => write!(f, "/"),
            BinaryOp::FloorDiv => write!(f, "//"),
            BinaryOp::Mod => write!(f, "%"),
            BinaryOp::Pow => write!(f, "**"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_op_display() {
        assert_eq!(format!("{}", CompareOp::Eq), "==");
        assert_eq!(format!("{}", CompareOp::NotEq), "!=");
        assert_eq!(format!("{}", CompareOp::Gt), ">");
        assert_eq!(format!("{}", CompareOp::Gte), ">=");
        assert_eq!(format!("{}", CompareOp::Lt), "<");
        assert_eq!(format!("{}", CompareOp::Lte), "<=");
        assert_eq!(format!("{}", CompareOp::NotIn), "not in");
        assert_eq!(format!("{}", CompareOp::IsNot), "is not");
        assert_eq!(format!("{}", CompareOp::Contains), "contains");
    }

    #[test]
    fn test_binary_op_display() {
        assert_eq!(format!("{}", BinaryOp::FloorDiv), "//");
        assert_eq!(format!("{}", BinaryOp::Pow), "**");
    }

    #[test]
    fn test_expression_equality() {
        let expr1 = Expression::compare(
            Expression::Attribute("a".to_string()),
            CompareOp::Eq,
            Expression::Literal(Literal::String("b".to_string())),
        );
        let expr2 = Expression::Compare {
            first: Box::new(Expression::Attribute("a".to_string())),
            rest: vec![(
                CompareOp::Eq,
                Expression::Literal(Literal::String("b".to_string())),
            )],
        };
        assert_eq!(expr1, expr2);
    }
}
