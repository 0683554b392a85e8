use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use smol_str::SmolStr;

use crate::ast::{BinaryOp, UnaryOp};
use crate::range::Range;
use crate::runtime::{HostFunction, Namespace};

/// Storage location of a variable, resolved at bind time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slot {
    pub namespace: Namespace,
    pub key: SmolStr,
}

impl Slot {
    pub fn new(namespace: Namespace, key: impl Into<SmolStr>) -> Self {
        Slot {
            namespace,
            key: key.into(),
        }
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.key)
    }
}

/// A resolved call target. Two references are equal when they point at the
/// same registered function.
#[derive(Debug, Clone)]
pub struct FunctionRef(pub Arc<HostFunction>);

impl PartialEq for FunctionRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl FunctionRef {
    pub fn name(&self) -> &str {
        &self.0.name
    }
}

#[derive(Debug, Clone)]
pub struct BoundNode {
    pub range: Range,
    pub expr: BoundExpr,
}

impl PartialEq for BoundNode {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

impl BoundNode {
    pub fn new(expr: BoundExpr, range: Range) -> Self {
        BoundNode { range, expr }
    }

    pub fn number(value: f64, range: Range) -> Self {
        BoundNode::new(BoundExpr::Number(value), range)
    }

    /// The value of a literal node, if this is one. Strings count as `0.0`.
    pub fn literal_value(&self) -> Option<f64> {
        match &self.expr {
            BoundExpr::Number(n) => Some(*n),
            BoundExpr::String(_) => Some(0.0),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        self.literal_value().is_some()
    }

    /// `break`, `continue` and `return` never complete normally.
    pub fn is_unconditional_jump(&self) -> bool {
        matches!(
            self.expr,
            BoundExpr::Break | BoundExpr::Continue | BoundExpr::Return(_)
        )
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        1 + self.children().map(BoundNode::size).sum::<usize>()
    }

    pub fn children(&self) -> Box<dyn Iterator<Item = &BoundNode> + '_> {
        match &self.expr {
            BoundExpr::Number(_)
            | BoundExpr::String(_)
            | BoundExpr::Read(_)
            | BoundExpr::This
            | BoundExpr::Break
            | BoundExpr::Continue
            | BoundExpr::Return(None) => Box::new(std::iter::empty()),
            BoundExpr::Index(_, node)
            | BoundExpr::Unary(_, node)
            | BoundExpr::Assign(_, node)
            | BoundExpr::ForEach(_, _, node)
            | BoundExpr::Return(Some(node)) => Box::new(std::iter::once(&**node)),
            BoundExpr::Call(_, args) | BoundExpr::Block(args) => Box::new(args.iter()),
            BoundExpr::Binary(_, left, right)
            | BoundExpr::NullCoalesce(left, right)
            | BoundExpr::Loop(left, right)
            | BoundExpr::Arrow(left, right) => Box::new([&**left, &**right].into_iter()),
            BoundExpr::Ternary(cond, then_branch, else_branch) => Box::new(
                [&**cond, &**then_branch]
                    .into_iter()
                    .chain(else_branch.as_deref()),
            ),
        }
    }
}

/// Expression tree after name resolution. Every variable access carries a
/// [`Slot`] and every call a [`FunctionRef`].
#[derive(Debug, Clone, PartialEq)]
pub enum BoundExpr {
    /// Number and boolean literals.
    Number(f64),
    String(SmolStr),
    Read(Slot),
    This,
    Index(Slot, Box<BoundNode>),
    Call(FunctionRef, Vec<BoundNode>),
    Binary(BinaryOp, Box<BoundNode>, Box<BoundNode>),
    Unary(UnaryOp, Box<BoundNode>),
    Ternary(Box<BoundNode>, Box<BoundNode>, Option<Box<BoundNode>>),
    NullCoalesce(Box<BoundNode>, Box<BoundNode>),
    Assign(Slot, Box<BoundNode>),
    Block(Vec<BoundNode>),
    Loop(Box<BoundNode>, Box<BoundNode>),
    ForEach(Slot, Slot, Box<BoundNode>),
    Break,
    Continue,
    Return(Option<Box<BoundNode>>),
    Arrow(Box<BoundNode>, Box<BoundNode>),
}
