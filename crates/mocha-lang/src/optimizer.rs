use smol_str::SmolStr;

use crate::ast::{BinaryOp, UnaryOp};
use crate::binder::bound::{BoundExpr, BoundNode};
use crate::number;
use crate::range::Range;

/// Constant folding and dead-branch elimination over bound trees.
///
/// Passes repeat until nothing changes. No rule makes the tree larger, and
/// host functions are never called at compile time.
#[derive(Debug, Default)]
pub struct Optimizer {
    changed: bool,
    passes: usize,
}

impl Optimizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn optimize(&mut self, node: BoundNode) -> BoundNode {
        let mut node = node;
        self.passes = 0;

        loop {
            self.changed = false;
            self.passes += 1;
            node = self.optimize_node(node);

            if !self.changed {
                return node;
            }
        }
    }

    /// Number of passes the last `optimize` call ran, including the final
    /// pass that found nothing to change.
    pub fn passes(&self) -> usize {
        self.passes
    }

    #[inline(always)]
    fn folded(&mut self, node: BoundNode) -> BoundNode {
        self.changed = true;
        node
    }

    fn optimize_boxed(&mut self, node: Box<BoundNode>) -> Box<BoundNode> {
        Box::new(self.optimize_node(*node))
    }

    fn optimize_node(&mut self, node: BoundNode) -> BoundNode {
        let BoundNode { range, expr } = node;

        match expr {
            BoundExpr::Unary(op, operand) => {
                let operand = self.optimize_node(*operand);

                match operand.literal_value() {
                    Some(value) => self.folded(BoundNode::number(op.apply(value), range)),
                    None => BoundNode::new(BoundExpr::Unary(op, Box::new(operand)), range),
                }
            }
            BoundExpr::Binary(op, left, right) => {
                let left = self.optimize_node(*left);
                let right = self.optimize_node(*right);
                self.fold_binary(op, left, right, range)
            }
            BoundExpr::Ternary(cond, then_branch, else_branch) => {
                let cond = self.optimize_node(*cond);
                let then_branch = self.optimize_node(*then_branch);
                let else_branch = else_branch.map(|branch| self.optimize_node(*branch));

                match cond.literal_value() {
                    Some(value) if number::truthy(value) => self.folded(then_branch),
                    Some(_) => {
                        let branch = else_branch.unwrap_or_else(|| BoundNode::number(0.0, range));
                        self.folded(branch)
                    }
                    None => BoundNode::new(
                        BoundExpr::Ternary(Box::new(cond), Box::new(then_branch), else_branch.map(Box::new)),
                        range,
                    ),
                }
            }
            BoundExpr::NullCoalesce(left, right) => {
                let left = self.optimize_node(*left);

                if left.is_literal() {
                    return self.folded(left);
                }

                let right = self.optimize_boxed(right);
                BoundNode::new(BoundExpr::NullCoalesce(Box::new(left), right), range)
            }
            BoundExpr::Block(program) => self.optimize_block(program, range),
            BoundExpr::Loop(count, body) => {
                let count = self.optimize_node(*count);

                if count
                    .literal_value()
                    .is_some_and(|value| number::iteration_count(value, None) == 0)
                {
                    return self.folded(BoundNode::number(0.0, range));
                }

                let body = self.optimize_boxed(body);
                BoundNode::new(BoundExpr::Loop(Box::new(count), body), range)
            }
            BoundExpr::ForEach(variable, collection, body) => BoundNode::new(
                BoundExpr::ForEach(variable, collection, self.optimize_boxed(body)),
                range,
            ),
            BoundExpr::Index(slot, index) => BoundNode::new(BoundExpr::Index(slot, self.optimize_boxed(index)), range),
            BoundExpr::Call(function, args) => BoundNode::new(
                BoundExpr::Call(
                    function,
                    args.into_iter().map(|arg| self.optimize_node(arg)).collect(),
                ),
                range,
            ),
            BoundExpr::Assign(slot, value) => BoundNode::new(BoundExpr::Assign(slot, self.optimize_boxed(value)), range),
            BoundExpr::Return(value) => BoundNode::new(
                BoundExpr::Return(value.map(|value| self.optimize_boxed(value))),
                range,
            ),
            BoundExpr::Arrow(context, body) => BoundNode::new(
                BoundExpr::Arrow(self.optimize_boxed(context), self.optimize_boxed(body)),
                range,
            ),
            expr @ (BoundExpr::Number(_)
            | BoundExpr::String(_)
            | BoundExpr::Read(_)
            | BoundExpr::This
            | BoundExpr::Break
            | BoundExpr::Continue) => BoundNode::new(expr, range),
        }
    }

    fn fold_binary(&mut self, op: BinaryOp, left: BoundNode, right: BoundNode, range: Range) -> BoundNode {
        if let Some(value) = compare_static_strings(op, &left, &right) {
            return self.folded(BoundNode::number(value, range));
        }

        match (op, left.literal_value(), right.literal_value()) {
            (_, Some(l), Some(r)) => self.folded(BoundNode::number(op.apply(l, r), range)),
            (BinaryOp::And, Some(l), None) if !number::truthy(l) => self.folded(BoundNode::number(0.0, range)),
            (BinaryOp::Or, Some(l), None) if number::truthy(l) => self.folded(BoundNode::number(1.0, range)),
            (BinaryOp::And | BinaryOp::Or, Some(_), None) => {
                let folded = to_bool(right, range);
                self.folded(folded)
            }
            _ => BoundNode::new(BoundExpr::Binary(op, Box::new(left), Box::new(right)), range),
        }
    }

    fn optimize_block(&mut self, program: Vec<BoundNode>, range: Range) -> BoundNode {
        let len = program.len();
        let mut statements = Vec::with_capacity(len);

        for (i, statement) in program.into_iter().enumerate() {
            let statement = self.optimize_node(statement);
            let is_last = i + 1 == len;

            if !is_last && statement.is_literal() {
                self.changed = true;
                continue;
            }

            let jumps = statement.is_unconditional_jump();
            statements.push(statement);

            if jumps && !is_last {
                // Everything after an unconditional jump is unreachable.
                self.changed = true;
                break;
            }
        }

        if statements.is_empty() {
            return self.folded(BoundNode::number(0.0, range));
        }

        // A lone control statement keeps its block.
        if statements.len() == 1 && !statements[0].is_unconditional_jump() {
            let statement = statements.swap_remove(0);
            return self.folded(statement);
        }

        BoundNode::new(BoundExpr::Block(statements), range)
    }
}

/// The string `node` is once folded, if it folds to a string literal.
///
/// Blocks, constant-condition ternaries and `??` with a literal left side can
/// all reduce to a string, so they are folded on a copy before checking.
pub(crate) fn static_string(node: &BoundNode) -> Option<SmolStr> {
    match &node.expr {
        BoundExpr::String(s) => Some(s.clone()),
        BoundExpr::Block(_) | BoundExpr::Ternary(..) | BoundExpr::NullCoalesce(..) => {
            match Optimizer::new().optimize(node.clone()).expr {
                BoundExpr::String(s) => Some(s),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Result of `==`/`!=` when both operands are static strings.
pub(crate) fn compare_static_strings(op: BinaryOp, left: &BoundNode, right: &BoundNode) -> Option<f64> {
    if !matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
        return None;
    }

    let left = static_string(left)?;
    let right = static_string(right)?;
    op.apply_strings(&left, &right)
}

/// `!!node`: `1.0` when `node` is truthy, `0.0` otherwise.
fn to_bool(node: BoundNode, range: Range) -> BoundNode {
    let inner_range = node.range;
    BoundNode::new(
        BoundExpr::Unary(
            UnaryOp::Not,
            Box::new(BoundNode::new(BoundExpr::Unary(UnaryOp::Not, Box::new(node)), inner_range)),
        ),
        range,
    )
}
