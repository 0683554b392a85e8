use std::fmt::Write;

use super::node::{Args, Expr, Literal, Node, Program};

impl Node {
    /// Converts the AST node back to source code.
    ///
    /// Compound operands are always parenthesized, so parsing the output yields
    /// a tree equal to `self`. A root `Block` is printed as bare statements.
    ///
    /// # Examples
    ///
    /// ```
    /// let node = mocha_lang::parse("v.x = 1 + 2 * 3").unwrap();
    /// assert_eq!(node.to_code(), "v.x = 1 + (2 * 3)");
    /// ```
    pub fn to_code(&self) -> String {
        let mut output = String::new();

        match &self.expr {
            Expr::Block(program) => format_statements(program, &mut output),
            _ => self.format_to_code(&mut output),
        }

        output
    }

    fn is_atomic(&self) -> bool {
        matches!(
            self.expr,
            Expr::Literal(_)
                | Expr::Ident(_)
                | Expr::This
                | Expr::Index(_, _)
                | Expr::Call(_, _)
                | Expr::Block(_)
                | Expr::Loop(_, _)
                | Expr::ForEach(_, _, _)
                | Expr::Break
                | Expr::Continue
        )
    }

    fn format_operand(&self, buf: &mut String) {
        if self.is_atomic() {
            self.format_to_code(buf);
        } else {
            buf.push('(');
            self.format_to_code(buf);
            buf.push(')');
        }
    }

    fn format_to_code(&self, buf: &mut String) {
        match &self.expr {
            Expr::Literal(literal) => format_literal(literal, buf),
            Expr::Ident(ident) => {
                write!(buf, "{}", ident).unwrap();
            }
            Expr::This => buf.push_str("this"),
            Expr::Break => buf.push_str("break"),
            Expr::Continue => buf.push_str("continue"),
            Expr::Index(target, index) => {
                target.format_operand(buf);
                buf.push('[');
                index.format_to_code(buf);
                buf.push(']');
            }
            Expr::Call(ident, args) => {
                write!(buf, "{}", ident).unwrap();
                format_args(args, buf);
            }
            Expr::Binary(op, left, right) => {
                left.format_operand(buf);
                write!(buf, " {} ", op).unwrap();
                right.format_operand(buf);
            }
            Expr::Unary(op, operand) => {
                write!(buf, "{}", op).unwrap();
                operand.format_operand(buf);
            }
            Expr::Ternary(cond, then_branch, else_branch) => {
                cond.format_operand(buf);
                buf.push_str(" ? ");
                then_branch.format_operand(buf);

                if let Some(else_branch) = else_branch {
                    buf.push_str(" : ");
                    else_branch.format_operand(buf);
                }
            }
            Expr::NullCoalesce(left, right) => {
                left.format_operand(buf);
                buf.push_str(" ?? ");
                right.format_operand(buf);
            }
            Expr::Assign(target, value) => {
                target.format_operand(buf);
                buf.push_str(" = ");
                value.format_to_code(buf);
            }
            Expr::Block(program) => {
                buf.push('{');
                format_statements(program, buf);
                buf.push('}');
            }
            Expr::Loop(count, body) => {
                buf.push_str("loop(");
                count.format_to_code(buf);
                buf.push_str(", ");
                body.format_to_code(buf);
                buf.push(')');
            }
            Expr::ForEach(variable, collection, body) => {
                buf.push_str("for_each(");
                variable.format_to_code(buf);
                buf.push_str(", ");
                collection.format_to_code(buf);
                buf.push_str(", ");
                body.format_to_code(buf);
                buf.push(')');
            }
            Expr::Return(value) => {
                buf.push_str("return");

                if let Some(value) = value {
                    buf.push(' ');
                    value.format_to_code(buf);
                }
            }
            Expr::Arrow(context, body) => {
                // The left side of `->` chains without parentheses.
                if matches!(context.expr, Expr::Arrow(_, _)) {
                    context.format_to_code(buf);
                } else {
                    context.format_operand(buf);
                }
                buf.push_str(" -> ");
                body.format_operand(buf);
            }
        }
    }
}

fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            _ => result.push(ch),
        }
    }
    result
}

fn format_literal(literal: &Literal, buf: &mut String) {
    match literal {
        Literal::String(s) => {
            buf.push('\'');
            buf.push_str(&escape_string(s));
            buf.push('\'');
        }
        Literal::Number(n) => {
            write!(buf, "{}", n).unwrap();
        }
        Literal::Bool(b) => {
            buf.push_str(if *b { "true" } else { "false" });
        }
    }
}

fn format_args(args: &Args, buf: &mut String) {
    buf.push('(');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            buf.push_str(", ");
        }
        arg.format_to_code(buf);
    }
    buf.push(')');
}

fn format_statements(program: &Program, buf: &mut String) {
    for (i, node) in program.iter().enumerate() {
        if i > 0 {
            buf.push_str("; ");
        }
        node.format_to_code(buf);
    }
}
