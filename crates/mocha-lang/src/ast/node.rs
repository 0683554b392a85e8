use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;

use crate::{
    number::{self, Number},
    range::Range,
};

pub type Args = Vec<Node>;
pub type Program = Vec<Node>;

/// A parsed expression together with the source range it was read from.
///
/// Equality only looks at the expression, so two trees printed and re-parsed
/// from different layouts still compare equal.
#[derive(Debug, Clone)]
pub struct Node {
    pub range: Range,
    pub expr: Expr,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

impl Node {
    pub fn new(expr: Expr, range: Range) -> Self {
        Node { range, expr }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.expr, Expr::Literal(_))
    }
}

/// A possibly namespaced name, e.g. `variable.speed` or a bare `foo`.
#[derive(PartialEq, Debug, Eq, Clone, Hash)]
pub struct Ident {
    pub namespace: Option<SmolStr>,
    pub name: SmolStr,
}

impl Ident {
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        Ident {
            namespace: namespace.map(SmolStr::new),
            name: SmolStr::new(name),
        }
    }
}

impl Display for Ident {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}.{}", namespace, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum Literal {
    Number(Number),
    Bool(bool),
    String(SmolStr),
}

impl Literal {
    /// The numeric value of the literal. Strings have no numeric value.
    pub fn value(&self) -> f64 {
        match self {
            Literal::Number(n) => n.value(),
            Literal::Bool(b) => number::from_bool(*b),
            Literal::String(_) => 0.0,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Copy, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
}

impl BinaryOp {
    /// Applies the operator to two evaluated operands.
    ///
    /// `And` and `Or` are included for constant folding; compiled code
    /// short-circuits them instead of evaluating both sides.
    #[inline(always)]
    pub fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            BinaryOp::Add => left + right,
            BinaryOp::Sub => left - right,
            BinaryOp::Mul => left * right,
            BinaryOp::Div => number::div(left, right),
            BinaryOp::Rem => number::rem(left, right),
            BinaryOp::Eq => number::from_bool(left == right),
            BinaryOp::Ne => number::from_bool(left != right),
            BinaryOp::Lt => number::from_bool(left < right),
            BinaryOp::Lte => number::from_bool(left <= right),
            BinaryOp::Gt => number::from_bool(left > right),
            BinaryOp::Gte => number::from_bool(left >= right),
            BinaryOp::And => number::from_bool(number::truthy(left) && number::truthy(right)),
            BinaryOp::Or => number::from_bool(number::truthy(left) || number::truthy(right)),
        }
    }

    /// Equality between two string literals compares their text.
    pub fn apply_strings(self, left: &str, right: &str) -> Option<f64> {
        match self {
            BinaryOp::Eq => Some(number::from_bool(left == right)),
            BinaryOp::Ne => Some(number::from_bool(left != right)),
            _ => None,
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::Ne => 3,
            BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 6,
        }
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        write!(f, "{}", op)
    }
}

#[derive(PartialEq, Debug, Clone, Copy, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    #[inline(always)]
    pub fn apply(self, operand: f64) -> f64 {
        match self {
            UnaryOp::Neg => -operand,
            UnaryOp::Not => number::from_bool(!number::truthy(operand)),
        }
    }
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "!"),
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum Expr {
    Literal(Literal),
    Ident(Ident),
    This,
    Index(Box<Node>, Box<Node>),
    Call(Ident, Args),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Unary(UnaryOp, Box<Node>),
    Ternary(Box<Node>, Box<Node>, Option<Box<Node>>),
    NullCoalesce(Box<Node>, Box<Node>),
    Assign(Box<Node>, Box<Node>),
    Block(Program),
    Loop(Box<Node>, Box<Node>),
    ForEach(Box<Node>, Box<Node>, Box<Node>),
    Break,
    Continue,
    Return(Option<Box<Node>>),
    Arrow(Box<Node>, Box<Node>),
}
