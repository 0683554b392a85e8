//! Compiled expression types.

use std::fmt::{self, Debug, Formatter};

use crate::runtime::{Lookup, RuntimeError, Scope};

/// Non-local exit out of a compiled closure.
///
/// `Break` and `Continue` are caught by the innermost loop, `Return` by the
/// entry point of the expression. `Error` carries a host function failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Unwind {
    Break,
    Continue,
    Return(f64),
    Error(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(err: RuntimeError) -> Self {
        Unwind::Error(err)
    }
}

/// A bound node lowered into a closure over the caller's [`Scope`].
pub type CompiledExpr = Box<dyn Fn(&mut Scope) -> Result<f64, Unwind> + Send + Sync>;

/// Like [`CompiledExpr`] but reports whether a read fell back to `0.0`.
/// Only produced for the left operand of `??`.
pub(crate) type CompiledLookup = Box<dyn Fn(&mut Scope) -> Result<Lookup, Unwind> + Send + Sync>;

/// An immutable, executable form of one source expression.
///
/// Holds no reference to the syntax tree it was generated from and never
/// stores a [`Scope`], so one instance can be shared across threads and
/// evaluated concurrently as long as each call brings its own scope.
pub struct CompiledExpression {
    source: String,
    root: CompiledExpr,
    reset_temp: bool,
}

impl CompiledExpression {
    pub(crate) fn new(source: &str, root: CompiledExpr, reset_temp: bool) -> Self {
        Self {
            source: source.to_string(),
            root,
            reset_temp,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Runs the expression against `scope`.
    ///
    /// `temp` is cleared first unless the engine was configured otherwise.
    /// A `return` ends evaluation with its value; otherwise the value of the
    /// last statement is the result. Errors come only from host functions.
    pub fn evaluate(&self, scope: &mut Scope) -> Result<f64, RuntimeError> {
        if self.reset_temp {
            scope.clear_temp();
        }

        match (self.root)(scope) {
            Ok(value) | Err(Unwind::Return(value)) => Ok(value),
            Err(Unwind::Error(err)) => Err(err),
            // Rejected during generation, so a loop always catches these.
            Err(Unwind::Break) => Err(RuntimeError::new("`break` outside of a loop")),
            Err(Unwind::Continue) => Err(RuntimeError::new("`continue` outside of a loop")),
        }
    }
}

impl Debug for CompiledExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpression")
            .field("source", &self.source)
            .field("reset_temp", &self.reset_temp)
            .finish_non_exhaustive()
    }
}
