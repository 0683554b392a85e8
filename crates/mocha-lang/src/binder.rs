//! Name resolution.
//!
//! Turns a parsed [`Node`] into a [`BoundNode`]: namespace tags are resolved,
//! calls are checked against the [`FunctionRegistry`], and `break`,
//! `continue` and `return` are checked for legal placement.

pub mod bound;
pub mod error;

use smol_str::SmolStr;

use crate::ast::{Expr, Ident, Literal, Node};
use crate::range::Range;
use crate::runtime::{Arity, FunctionRegistry, Namespace};

use bound::{BoundExpr, BoundNode, FunctionRef, Slot};
use error::BindError;

pub struct Binder<'a> {
    registry: &'a FunctionRegistry,
    loop_depth: usize,
}

impl<'a> Binder<'a> {
    pub fn new(registry: &'a FunctionRegistry) -> Self {
        Self {
            registry,
            loop_depth: 0,
        }
    }

    /// Binds a whole program. The root is in statement position.
    pub fn bind(&mut self, node: &Node) -> Result<BoundNode, BindError> {
        self.bind_node(node, true)
    }

    /// `statement` is true when the node's value is discarded or flows
    /// directly into a block, loop body or branch result, which is where
    /// control statements may appear.
    fn bind_node(&mut self, node: &Node, statement: bool) -> Result<BoundNode, BindError> {
        let range = node.range;

        let expr = match &node.expr {
            Expr::Literal(Literal::Number(n)) => BoundExpr::Number(n.value()),
            Expr::Literal(Literal::Bool(b)) => BoundExpr::Number(if *b { 1.0 } else { 0.0 }),
            Expr::Literal(Literal::String(s)) => BoundExpr::String(s.clone()),
            Expr::This => BoundExpr::This,
            Expr::Ident(ident) => self.bind_ident(ident, range)?,
            Expr::Index(target, index) => {
                let slot = self.bind_array(target)?;
                BoundExpr::Index(slot, Box::new(self.bind_node(index, false)?))
            }
            Expr::Call(ident, args) => {
                let function = self.resolve_function(ident, args.len(), range)?;
                let args = args
                    .iter()
                    .map(|arg| self.bind_node(arg, false))
                    .collect::<Result<Vec<_>, _>>()?;
                BoundExpr::Call(function, args)
            }
            Expr::Binary(op, left, right) => BoundExpr::Binary(
                *op,
                Box::new(self.bind_node(left, false)?),
                Box::new(self.bind_node(right, false)?),
            ),
            Expr::Unary(op, operand) => BoundExpr::Unary(*op, Box::new(self.bind_node(operand, false)?)),
            Expr::Ternary(cond, then_branch, else_branch) => BoundExpr::Ternary(
                Box::new(self.bind_node(cond, false)?),
                Box::new(self.bind_node(then_branch, statement)?),
                else_branch
                    .as_ref()
                    .map(|branch| self.bind_node(branch, statement).map(Box::new))
                    .transpose()?,
            ),
            Expr::NullCoalesce(left, right) => BoundExpr::NullCoalesce(
                Box::new(self.bind_node(left, false)?),
                Box::new(self.bind_node(right, statement)?),
            ),
            Expr::Assign(target, value) => {
                let slot = self.bind_assign_target(target)?;
                BoundExpr::Assign(slot, Box::new(self.bind_node(value, false)?))
            }
            Expr::Block(program) => BoundExpr::Block(
                program
                    .iter()
                    .map(|node| self.bind_node(node, statement))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Expr::Loop(count, body) => {
                let count = self.bind_node(count, false)?;
                let body = self.bind_loop_body(body)?;
                BoundExpr::Loop(Box::new(count), Box::new(body))
            }
            Expr::ForEach(variable, collection, body) => {
                let variable = self.bind_assign_target(variable)?;
                let collection = self.bind_array(collection)?;
                let body = self.bind_loop_body(body)?;
                BoundExpr::ForEach(variable, collection, Box::new(body))
            }
            Expr::Break | Expr::Continue => {
                let keyword = if matches!(node.expr, Expr::Break) {
                    "break"
                } else {
                    "continue"
                };

                if !statement || self.loop_depth == 0 {
                    return Err(BindError::IllegalControlFlow(keyword, range));
                }

                if keyword == "break" {
                    BoundExpr::Break
                } else {
                    BoundExpr::Continue
                }
            }
            Expr::Return(value) => {
                if !statement {
                    return Err(BindError::IllegalControlFlow("return", range));
                }

                BoundExpr::Return(
                    value
                        .as_ref()
                        .map(|value| self.bind_node(value, false).map(Box::new))
                        .transpose()?,
                )
            }
            Expr::Arrow(context, body) => BoundExpr::Arrow(
                Box::new(self.bind_node(context, false)?),
                Box::new(self.bind_node(body, statement)?),
            ),
        };

        Ok(BoundNode::new(expr, range))
    }

    fn bind_loop_body(&mut self, body: &Node) -> Result<BoundNode, BindError> {
        self.loop_depth += 1;
        let result = self.bind_node(body, true);
        self.loop_depth -= 1;
        result
    }

    fn bind_ident(&self, ident: &Ident, range: Range) -> Result<BoundExpr, BindError> {
        let namespace = self.resolve_namespace(ident, range)?;

        // Zero-argument functions can be read without parentheses.
        if let Some(function) = self
            .registry
            .lookup(Some(namespace), &ident.name)
            .filter(|function| function.arity.accepts_no_args())
        {
            return Ok(BoundExpr::Call(FunctionRef(function.clone()), Vec::new()));
        }

        if namespace == Namespace::Math {
            return Err(BindError::UnknownFunction(ident.to_string(), range));
        }

        Ok(BoundExpr::Read(Slot::new(namespace, ident.name.clone())))
    }

    fn bind_assign_target(&self, target: &Node) -> Result<Slot, BindError> {
        let Expr::Ident(ident) = &target.expr else {
            return Err(BindError::InvalidAssignment(target.to_code(), target.range));
        };

        let namespace = self.resolve_namespace(ident, target.range)?;
        let is_function = self
            .registry
            .lookup(Some(namespace), &ident.name)
            .is_some_and(|function| function.arity.accepts_no_args());

        if !namespace.is_writable() || is_function {
            return Err(BindError::InvalidAssignment(ident.to_string(), target.range));
        }

        Ok(Slot::new(namespace, ident.name.clone()))
    }

    fn bind_array(&self, target: &Node) -> Result<Slot, BindError> {
        let Expr::Ident(ident) = &target.expr else {
            return Err(BindError::ExpectedArray(target.range));
        };

        let namespace = self.resolve_namespace(ident, target.range)?;
        if namespace == Namespace::Math {
            return Err(BindError::ExpectedArray(target.range));
        }

        Ok(Slot::new(namespace, ident.name.clone()))
    }

    fn resolve_namespace(&self, ident: &Ident, range: Range) -> Result<Namespace, BindError> {
        let Some(tag) = &ident.namespace else {
            return Err(BindError::UnresolvedIdentifier(ident.name.clone(), range));
        };

        self.registry
            .namespace(tag)
            .ok_or_else(|| BindError::UnknownNamespace(SmolStr::clone(tag), range))
    }

    fn resolve_function(&self, ident: &Ident, argc: usize, range: Range) -> Result<FunctionRef, BindError> {
        let namespace = match &ident.namespace {
            Some(_) => Some(self.resolve_namespace(ident, range)?),
            None => None,
        };

        let function = self
            .registry
            .lookup(namespace, &ident.name)
            .ok_or_else(|| BindError::UnknownFunction(ident.to_string(), range))?;

        match function.arity {
            Arity::Fixed(expected) if expected != argc => Err(BindError::ArityMismatch {
                name: ident.to_string(),
                expected,
                got: argc,
                range,
            }),
            _ => Ok(FunctionRef(function.clone())),
        }
    }
}
