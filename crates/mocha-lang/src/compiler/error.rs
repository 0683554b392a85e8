use thiserror::Error;

use crate::range::Range;

/// A bound tree that code generation cannot lower. Input that reaches the
/// generator has already passed binding, so this always indicates an engine bug.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Internal compiler error: {0}")]
    Internal(String, Range),
}

impl CompileError {
    pub fn range(&self) -> Range {
        match self {
            CompileError::Internal(_, range) => *range,
        }
    }
}
