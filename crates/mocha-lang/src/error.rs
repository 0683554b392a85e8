use miette::{Diagnostic, SourceOffset, SourceSpan};

use crate::{
    ast::error::ParseError, binder::error::BindError, compiler::CompileError, lexer::error::LexerError, range::Range,
    runtime::RuntimeError,
};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InnerError {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl InnerError {
    /// Where in the source the error points. Runtime errors come from host
    /// functions and carry no location.
    pub fn range(&self) -> Option<Range> {
        match self {
            InnerError::Lexer(err) => Some(err.range()),
            InnerError::Parse(err) => Some(err.token().range),
            InnerError::Bind(err) => Some(err.range()),
            InnerError::Compile(err) => Some(err.range()),
            InnerError::Runtime(_) => None,
        }
    }
}

/// Represents a high-level error with diagnostic information for the user.
#[derive(PartialEq, Debug, thiserror::Error)]
#[error("{cause}")]
pub struct Error {
    /// The underlying cause of the error.
    pub cause: InnerError,
    /// The expression source the error refers to.
    pub source_code: String,
    /// The location in the source code for diagnostics.
    pub location: SourceSpan,
}

impl Error {
    pub fn from_error(source_code: impl Into<String>, cause: impl Into<InnerError>) -> Self {
        let source_code = source_code.into();
        let cause = cause.into();

        let location = match cause.range() {
            Some(range) => {
                let start = SourceOffset::from_location(&source_code, range.start.line as usize, range.start.column);
                let end = SourceOffset::from_location(&source_code, range.end.line as usize, range.end.column);
                SourceSpan::new(start, std::cmp::max(end.offset().saturating_sub(start.offset()), 1))
            }
            None => SourceSpan::new(SourceOffset::from(0), std::cmp::max(source_code.len(), 1)),
        };

        Self {
            cause,
            source_code,
            location,
        }
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let c = match &self.cause {
            InnerError::Lexer(LexerError::UnexpectedCharacter(_, _)) => "LexerError::UnexpectedCharacter",
            InnerError::Lexer(LexerError::UnterminatedString(_)) => "LexerError::UnterminatedString",
            InnerError::Parse(ParseError::UnexpectedToken(_)) => "ParseError::UnexpectedToken",
            InnerError::Parse(ParseError::UnexpectedEOFDetected(_)) => "ParseError::UnexpectedEOFDetected",
            InnerError::Parse(ParseError::ExpectedClosingParen(_)) => "ParseError::ExpectedClosingParen",
            InnerError::Parse(ParseError::ExpectedClosingBracket(_)) => "ParseError::ExpectedClosingBracket",
            InnerError::Parse(ParseError::ExpectedClosingBrace(_)) => "ParseError::ExpectedClosingBrace",
            InnerError::Parse(ParseError::InvalidAssignmentTarget(_)) => "ParseError::InvalidAssignmentTarget",
            InnerError::Bind(BindError::UnknownNamespace(_, _)) => "BindError::UnknownNamespace",
            InnerError::Bind(BindError::UnresolvedIdentifier(_, _)) => "BindError::UnresolvedIdentifier",
            InnerError::Bind(BindError::UnknownFunction(_, _)) => "BindError::UnknownFunction",
            InnerError::Bind(BindError::ArityMismatch { .. }) => "BindError::ArityMismatch",
            InnerError::Bind(BindError::InvalidAssignment(_, _)) => "BindError::InvalidAssignment",
            InnerError::Bind(BindError::IllegalControlFlow(_, _)) => "BindError::IllegalControlFlow",
            InnerError::Bind(BindError::ExpectedArray(_)) => "BindError::ExpectedArray",
            InnerError::Compile(CompileError::Internal(_, _)) => "CompileError::Internal",
            InnerError::Runtime(RuntimeError::Message(_)) => "RuntimeError::Message",
            InnerError::Runtime(RuntimeError::InvalidArgument { .. }) => "RuntimeError::InvalidArgument",
        };
        Some(Box::new(c))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let msg = match &self.cause {
            InnerError::Lexer(LexerError::UnexpectedCharacter(_, _)) => {
                Some("Remove or replace the character; only numbers, names, strings and operators are allowed.".to_string())
            }
            InnerError::Lexer(LexerError::UnterminatedString(_)) => {
                Some("Close the string with the same quote it was opened with.".to_string())
            }
            InnerError::Parse(ParseError::UnexpectedToken(_)) => {
                Some("Check for syntax errors or misplaced tokens.".to_string())
            }
            InnerError::Parse(ParseError::UnexpectedEOFDetected(_)) => Some(
                "Input ended unexpectedly. Check for missing closing brackets or incomplete expressions.".to_string(),
            ),
            InnerError::Parse(ParseError::ExpectedClosingParen(_)) => Some("Add a closing `)`.".to_string()),
            InnerError::Parse(ParseError::ExpectedClosingBracket(_)) => Some("Add a closing `]`.".to_string()),
            InnerError::Parse(ParseError::ExpectedClosingBrace(_)) => Some("Add a closing `}`.".to_string()),
            InnerError::Parse(ParseError::InvalidAssignmentTarget(_)) => {
                Some("Only variables such as `variable.x` can be assigned to.".to_string())
            }
            InnerError::Bind(BindError::UnknownNamespace(tag, _)) => Some(format!(
                "`{tag}` is not a known namespace. Use `variable`, `temp`, `context`, `query`, `math`, `geometry` or a namespace registered by the host."
            )),
            InnerError::Bind(BindError::UnresolvedIdentifier(name, _)) => {
                Some(format!("Qualify the name with a namespace, e.g. `variable.{name}`."))
            }
            InnerError::Bind(BindError::UnknownFunction(_, _)) => {
                Some("Check the spelling, or register the function with the engine before compiling.".to_string())
            }
            InnerError::Bind(BindError::ArityMismatch { expected, got, .. }) => Some(format!(
                "Invalid number of arguments: expected {expected}, got {got}."
            )),
            InnerError::Bind(BindError::InvalidAssignment(_, _)) => {
                Some("Functions, `math` and array elements are read-only.".to_string())
            }
            InnerError::Bind(BindError::IllegalControlFlow(_, _)) => Some(
                "`break` and `continue` must appear as statements inside `loop` or `for_each`; `return` must appear as a statement.".to_string(),
            ),
            InnerError::Bind(BindError::ExpectedArray(_)) => {
                Some("Indexing and `for_each` need a namespaced variable holding an array.".to_string())
            }
            InnerError::Compile(CompileError::Internal(_, _)) => {
                Some("An internal error occurred. Please report this if it persists.".to_string())
            }
            InnerError::Runtime(_) => Some("A host function failed during evaluation.".to_string()),
        };

        msg.map(|m| Box::new(m) as Box<dyn std::fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(miette::LabeledSpan::new_with_span(
            Some(format!("{}", self.cause)),
            self.location,
        ))))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::lexer::token::{Token, TokenKind};
    use crate::range::Position;

    fn range(line: u32, start: usize, end: usize) -> Range {
        Range::new(Position::new(line, start), Position::new(line, end))
    }

    #[rstest]
    #[case::lexer(InnerError::Lexer(LexerError::UnexpectedCharacter('@', range(1, 5, 6))), 4, 1)]
    #[case::parse(
        InnerError::Parse(ParseError::UnexpectedToken(Token::new(TokenKind::EqEq, range(1, 3, 5)))),
        2,
        2
    )]
    #[case::bind(InnerError::Bind(BindError::ExpectedArray(range(2, 1, 4))), 13, 3)]
    #[case::empty_range(InnerError::Bind(BindError::ExpectedArray(range(1, 1, 1))), 0, 1)]
    #[case::runtime(InnerError::Runtime(RuntimeError::new("boom")), 0, 16)]
    fn test_location(#[case] cause: InnerError, #[case] offset: usize, #[case] len: usize) {
        let error = Error::from_error("v.a = 1 @ 2;\nv.b", cause);

        assert_eq!(error.location.offset(), offset);
        assert_eq!(error.location.len(), len);
        assert_eq!(error.source_code, "v.a = 1 @ 2;\nv.b");
    }

    #[test]
    fn test_diagnostic() {
        let error = Error::from_error(
            "foo(1, 2, 3)",
            BindError::ArityMismatch {
                name: "foo".to_string(),
                expected: 2,
                got: 3,
                range: range(1, 1, 13),
            },
        );

        assert_eq!(error.code().map(|c| c.to_string()).as_deref(), Some("BindError::ArityMismatch"));
        assert_eq!(
            error.help().map(|h| h.to_string()).as_deref(),
            Some("Invalid number of arguments: expected 2, got 3.")
        );
        assert_eq!(error.labels().map(|labels| labels.count()), Some(1));
        assert!(error.source_code().is_some());
        assert_eq!(error.to_string(), "Function `foo` expects 2 argument(s) but got 3");
    }
}
