use smol_str::SmolStr;
use thiserror::Error;

/// An error raised by a host function while an expression is evaluated.
///
/// Compiled code itself never fails; these errors only originate in
/// registered functions and are returned from evaluation unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("{0}")]
    Message(String),
    #[error("Invalid argument for `{name}`: {message}")]
    InvalidArgument { name: SmolStr, message: String },
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        RuntimeError::Message(message.into())
    }

    pub fn invalid_argument(name: &str, message: impl Into<String>) -> Self {
        RuntimeError::InvalidArgument {
            name: SmolStr::new(name),
            message: message.into(),
        }
    }
}
