//! Closure-based code generation.
//!
//! Each bound node is lowered into a boxed closure that takes the caller's
//! [`Scope`](crate::Scope) and returns an `f64`. Children are compiled first
//! and moved into their parent's closure, so the whole expression becomes a
//! single closure tree with no interpretation step left at run time.
//!
//! `break`, `continue` and `return` travel as the error side of the closure's
//! result ([`Unwind`]) until a loop or the entry point catches them.

mod compile;
pub(crate) mod compiled;
pub mod error;

pub use compile::Compiler;
pub use compiled::{CompiledExpr, CompiledExpression, Unwind};
pub use error::CompileError;
