use smol_str::SmolStr;
use thiserror::Error;

use crate::range::Range;

#[derive(Error, Debug, PartialEq)]
pub enum BindError {
    #[error("Unknown namespace `{0}`")]
    UnknownNamespace(SmolStr, Range),
    #[error("Identifier `{0}` must be qualified with a namespace")]
    UnresolvedIdentifier(SmolStr, Range),
    #[error("Unknown function `{0}`")]
    UnknownFunction(String, Range),
    #[error("Function `{name}` expects {expected} argument(s) but got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
        range: Range,
    },
    #[error("Cannot assign to `{0}`")]
    InvalidAssignment(String, Range),
    #[error("`{0}` is not allowed here")]
    IllegalControlFlow(&'static str, Range),
    #[error("Expected an array variable")]
    ExpectedArray(Range),
}

impl BindError {
    pub fn range(&self) -> Range {
        match self {
            BindError::UnknownNamespace(_, range)
            | BindError::UnresolvedIdentifier(_, range)
            | BindError::UnknownFunction(_, range)
            | BindError::ArityMismatch { range, .. }
            | BindError::InvalidAssignment(_, range)
            | BindError::IllegalControlFlow(_, range)
            | BindError::ExpectedArray(range) => *range,
        }
    }
}
