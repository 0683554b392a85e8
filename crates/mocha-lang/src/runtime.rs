//! Runtime model shared by compiled expressions and the host.

pub mod error;
pub mod function;
pub mod math;
pub mod namespace;
pub mod scope;

pub use error::RuntimeError;
pub use function::{Arity, FunctionRegistry, HostFunction};
pub use namespace::{Namespace, NamespaceId};
pub use scope::{Binding, Lookup, Scope};
