//! `mocha-lang` compiles small numeric expressions in the MoLang style into
//! closures that run against a host-owned [`Scope`].
//!
//! Source text goes through the lexer, the parser, the binder (namespace and
//! function resolution), an optional optimizer and finally a closure-based
//! code generator. Compiled expressions are immutable and can be shared
//! between threads; the [`Engine`] keeps a cache so the same source is only
//! compiled once.
//!
//! ## Examples
//!
//! ```rust
//! use mocha_lang::{Arity, Engine, Namespace, Scope};
//!
//! let mut engine = Engine::standard();
//! engine.register_function(Some("query"), "health", Arity::Fixed(0), |_, _| Ok(20.0));
//!
//! let mut scope = Scope::new();
//! scope.set(Namespace::Variable, "speed", 1.5);
//!
//! let value = engine
//!     .eval("v.speed * 2 + math.min(query.health, 10)", &mut scope)
//!     .unwrap();
//! assert_eq!(value, 13.0);
//! ```
//!
//! Reads of unset variables and division by zero never fail; both produce
//! `0`:
//!
//! ```rust
//! let engine = mocha_lang::Engine::new();
//! let mut scope = mocha_lang::Scope::new();
//!
//! assert_eq!(engine.eval("variable.missing + 1 / 0", &mut scope).unwrap(), 0.0);
//! ```
mod ast;
mod binder;
mod cache;
mod compiler;
mod engine;
mod error;
mod lexer;
mod number;
mod optimizer;
mod range;
mod runtime;

use ast::parser::Parser;

pub use ast::error::ParseError;
pub use ast::{
    Args as AstArgs, BinaryOp, Expr as AstExpr, Ident as AstIdent, Literal as AstLiteral, Node as AstNode,
    Program as AstProgram, UnaryOp,
};
pub use binder::Binder;
pub use binder::bound::{BoundExpr, BoundNode, FunctionRef, Slot};
pub use binder::error::BindError;
pub use cache::ExpressionCache;
pub use compiler::{CompileError, CompiledExpr, CompiledExpression, Compiler, Unwind};
pub use engine::{Engine, Options};
pub use error::{Error, InnerError};
pub use lexer::error::LexerError;
pub use lexer::token::{Token, TokenKind};
pub use number::Number;
pub use optimizer::Optimizer;
pub use range::{Position, Range};
pub use runtime::math::register as register_math;
pub use runtime::{Arity, Binding, FunctionRegistry, HostFunction, Lookup, Namespace, NamespaceId, RuntimeError, Scope};

pub type MochaResult = Result<f64, Error>;

#[allow(clippy::result_large_err)]
pub fn tokenize(code: &str) -> Result<Vec<Token>, Error> {
    lexer::tokenize(code).map_err(|e| Error::from_error(code, InnerError::Lexer(e)))
}

/// Parses `code` into its syntax tree. The root is always a block holding
/// the top-level statements.
#[allow(clippy::result_large_err)]
pub fn parse(code: &str) -> Result<AstNode, Error> {
    let tokens = tokenize(code)?;

    Parser::new(&tokens)
        .parse()
        .map_err(|e| Error::from_error(code, InnerError::Parse(e)))
}
