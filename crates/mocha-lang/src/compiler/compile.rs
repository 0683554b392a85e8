//! Lowering of bound trees into closures.

use smallvec::SmallVec;

use super::compiled::{CompiledExpr, CompiledLookup, Unwind};
use super::error::CompileError;
use crate::ast::{BinaryOp, UnaryOp};
use crate::binder::bound::{BoundExpr, BoundNode, Slot};
use crate::number;
use crate::optimizer::compare_static_strings;
use crate::runtime::Lookup;

macro_rules! binary {
    ($left:ident, $right:ident, |$l:ident, $r:ident| $body:expr) => {
        Box::new(move |scope| {
            let $l = $left(scope)?;
            let $r = $right(scope)?;
            Ok($body)
        })
    };
}

/// Turns an optimized [`BoundNode`] into a [`CompiledExpr`].
///
/// Every node becomes one boxed closure that owns the closures of its
/// children, so evaluation never looks at the tree again.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    max_loop_iterations: Option<u64>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps every `loop` and `for_each` at `limit` iterations.
    pub fn with_max_loop_iterations(limit: Option<u64>) -> Self {
        Self {
            max_loop_iterations: limit,
        }
    }

    pub fn generate(&self, node: &BoundNode) -> Result<CompiledExpr, CompileError> {
        if let Err(err) = check_jumps(node, 0) {
            tracing::error!(error = %err, "rejected bound tree during code generation");
            return Err(err);
        }

        Ok(self.compile_node(node))
    }

    fn compile_node(&self, node: &BoundNode) -> CompiledExpr {
        match &node.expr {
            BoundExpr::Number(value) => {
                let value = *value;
                Box::new(move |_| Ok(value))
            }
            // Strings only have a meaning as operands of `==` and `!=`.
            BoundExpr::String(_) => Box::new(|_| Ok(0.0)),
            BoundExpr::Read(Slot { namespace, key }) => {
                let (namespace, key) = (*namespace, key.clone());
                Box::new(move |scope| Ok(scope.get(namespace, &key).value))
            }
            BoundExpr::This => Box::new(|scope| Ok(scope.this())),
            BoundExpr::Index(Slot { namespace, key }, index) => {
                let (namespace, key) = (*namespace, key.clone());
                let index = self.compile_node(index);
                Box::new(move |scope| {
                    let index = index(scope)?;
                    Ok(scope.get_index(namespace, &key, index).value)
                })
            }
            BoundExpr::Call(function, args) => {
                let function = function.0.clone();
                let args = args.iter().map(|arg| self.compile_node(arg)).collect::<Vec<_>>();

                Box::new(move |scope| {
                    let mut values: SmallVec<[f64; 4]> = SmallVec::with_capacity(args.len());
                    for arg in &args {
                        values.push(arg(scope)?);
                    }
                    function.call(&values, scope).map_err(Unwind::Error)
                })
            }
            BoundExpr::Binary(op, left, right) => self.compile_binary(*op, left, right),
            BoundExpr::Unary(op, operand) => {
                let operand = self.compile_node(operand);
                match op {
                    UnaryOp::Neg => Box::new(move |scope| Ok(-operand(scope)?)),
                    UnaryOp::Not => Box::new(move |scope| Ok(number::from_bool(!number::truthy(operand(scope)?)))),
                }
            }
            BoundExpr::Ternary(cond, then_branch, else_branch) => {
                let cond = self.compile_node(cond);
                let then_branch = self.compile_node(then_branch);

                match else_branch {
                    Some(else_branch) => {
                        let else_branch = self.compile_node(else_branch);
                        Box::new(move |scope| {
                            if number::truthy(cond(scope)?) {
                                then_branch(scope)
                            } else {
                                else_branch(scope)
                            }
                        })
                    }
                    None => Box::new(move |scope| {
                        if number::truthy(cond(scope)?) {
                            then_branch(scope)
                        } else {
                            Ok(0.0)
                        }
                    }),
                }
            }
            BoundExpr::NullCoalesce(left, right) => {
                let left = self.compile_lookup(left);
                let right = self.compile_node(right);

                Box::new(move |scope| match left(scope)? {
                    Lookup { was_default: true, .. } => right(scope),
                    Lookup { value, .. } => Ok(value),
                })
            }
            BoundExpr::Assign(Slot { namespace, key }, value) => {
                let (namespace, key) = (*namespace, key.clone());
                let value = self.compile_node(value);
                Box::new(move |scope| {
                    let value = value(scope)?;
                    scope.set(namespace, key.clone(), value);
                    Ok(value)
                })
            }
            BoundExpr::Block(program) => {
                let program = program.iter().map(|node| self.compile_node(node)).collect::<Vec<_>>();
                Box::new(move |scope| {
                    let mut value = 0.0;
                    for statement in &program {
                        value = statement(scope)?;
                    }
                    Ok(value)
                })
            }
            BoundExpr::Loop(count, body) => {
                let count = self.compile_node(count);
                let body = self.compile_node(body);
                let limit = self.max_loop_iterations;

                Box::new(move |scope| {
                    let iterations = number::iteration_count(count(scope)?, limit);
                    let mut value = 0.0;

                    for _ in 0..iterations {
                        match body(scope) {
                            Ok(v) => value = v,
                            Err(Unwind::Break) => break,
                            Err(Unwind::Continue) => continue,
                            Err(unwind) => return Err(unwind),
                        }
                    }

                    Ok(value)
                })
            }
            BoundExpr::ForEach(variable, Slot { namespace, key }, body) => {
                let variable = variable.clone();
                let (namespace, key) = (*namespace, key.clone());
                let body = self.compile_node(body);
                let limit = self
                    .max_loop_iterations
                    .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));

                Box::new(move |scope| {
                    // The body may write to the scope, so iterate over a snapshot.
                    let values = scope
                        .get_array(namespace, &key)
                        .map(<[f64]>::to_vec)
                        .unwrap_or_default();
                    let mut value = 0.0;

                    for element in values.into_iter().take(limit) {
                        scope.set(variable.namespace, variable.key.clone(), element);
                        match body(scope) {
                            Ok(v) => value = v,
                            Err(Unwind::Break) => break,
                            Err(Unwind::Continue) => continue,
                            Err(unwind) => return Err(unwind),
                        }
                    }

                    Ok(value)
                })
            }
            BoundExpr::Break => Box::new(|_| Err(Unwind::Break)),
            BoundExpr::Continue => Box::new(|_| Err(Unwind::Continue)),
            BoundExpr::Return(value) => match value {
                Some(value) => {
                    let value = self.compile_node(value);
                    Box::new(move |scope| Err(Unwind::Return(value(scope)?)))
                }
                None => Box::new(|_| Err(Unwind::Return(0.0))),
            },
            BoundExpr::Arrow(context, body) => {
                let context = self.compile_node(context);
                let body = self.compile_node(body);

                Box::new(move |scope| {
                    let handle = context(scope)?.trunc() as i64;
                    match scope.child_mut(handle) {
                        Some(child) => body(child),
                        None => Ok(0.0),
                    }
                })
            }
        }
    }

    fn compile_binary(&self, op: BinaryOp, left: &BoundNode, right: &BoundNode) -> CompiledExpr {
        if let Some(value) = compare_static_strings(op, left, right) {
            return Box::new(move |_| Ok(value));
        }

        let left = self.compile_node(left);
        let right = self.compile_node(right);

        match op {
            BinaryOp::And => Box::new(move |scope| {
                if !number::truthy(left(scope)?) {
                    return Ok(0.0);
                }
                Ok(number::from_bool(number::truthy(right(scope)?)))
            }),
            BinaryOp::Or => Box::new(move |scope| {
                if number::truthy(left(scope)?) {
                    return Ok(1.0);
                }
                Ok(number::from_bool(number::truthy(right(scope)?)))
            }),
            BinaryOp::Add => binary!(left, right, |l, r| l + r),
            BinaryOp::Sub => binary!(left, right, |l, r| l - r),
            BinaryOp::Mul => binary!(left, right, |l, r| l * r),
            BinaryOp::Div => binary!(left, right, |l, r| number::div(l, r)),
            BinaryOp::Rem => binary!(left, right, |l, r| number::rem(l, r)),
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Lte
            | BinaryOp::Gt
            | BinaryOp::Gte => binary!(left, right, |l, r| op.apply(l, r)),
        }
    }

    /// Compiles the left operand of `??`. Variable reads and array accesses
    /// report whether they defaulted, and a failing host call counts as
    /// defaulted. Ternaries and blocks pass on the lookup of the branch or
    /// final statement that produced their value, matching what remains once
    /// the optimizer has folded them away. Anything else is a plain value.
    fn compile_lookup(&self, node: &BoundNode) -> CompiledLookup {
        match &node.expr {
            BoundExpr::Ternary(cond, then_branch, else_branch) => {
                let cond = self.compile_node(cond);
                let then_branch = self.compile_lookup(then_branch);
                let else_branch = else_branch.as_deref().map(|branch| self.compile_lookup(branch));

                Box::new(move |scope| {
                    if number::truthy(cond(scope)?) {
                        then_branch(scope)
                    } else {
                        match &else_branch {
                            Some(else_branch) => else_branch(scope),
                            None => Ok(Lookup::found(0.0)),
                        }
                    }
                })
            }
            BoundExpr::Block(program) => match program.split_last() {
                Some((last, init)) => {
                    let init = init.iter().map(|node| self.compile_node(node)).collect::<Vec<_>>();
                    let last = self.compile_lookup(last);

                    Box::new(move |scope| {
                        for statement in &init {
                            statement(scope)?;
                        }
                        last(scope)
                    })
                }
                None => Box::new(|_| Ok(Lookup::found(0.0))),
            },
            BoundExpr::Read(Slot { namespace, key }) => {
                let (namespace, key) = (*namespace, key.clone());
                Box::new(move |scope| Ok(scope.get(namespace, &key)))
            }
            BoundExpr::Index(Slot { namespace, key }, index) => {
                let (namespace, key) = (*namespace, key.clone());
                let index = self.compile_node(index);
                Box::new(move |scope| {
                    let index = index(scope)?;
                    Ok(scope.get_index(namespace, &key, index))
                })
            }
            BoundExpr::Call(function, _) => {
                let name = function.name().to_string();
                let call = self.compile_node(node);
                Box::new(move |scope| match call(scope) {
                    Ok(value) => Ok(Lookup::found(value)),
                    Err(Unwind::Error(err)) => {
                        tracing::trace!(function = %name, error = %err, "host call failed, using fallback");
                        Ok(Lookup::DEFAULT)
                    }
                    Err(unwind) => Err(unwind),
                })
            }
            _ => {
                let expr = self.compile_node(node);
                Box::new(move |scope| expr(scope).map(Lookup::found))
            }
        }
    }
}

/// Rejects `break`/`continue` that no enclosing loop would catch.
fn check_jumps(node: &BoundNode, loop_depth: usize) -> Result<(), CompileError> {
    match &node.expr {
        BoundExpr::Break | BoundExpr::Continue if loop_depth == 0 => Err(CompileError::Internal(
            "loop control statement outside of a loop".to_string(),
            node.range,
        )),
        BoundExpr::Loop(count, body) => {
            check_jumps(count, loop_depth)?;
            check_jumps(body, loop_depth + 1)
        }
        BoundExpr::ForEach(_, _, body) => check_jumps(body, loop_depth + 1),
        _ => node.children().try_for_each(|child| check_jumps(child, loop_depth)),
    }
}
