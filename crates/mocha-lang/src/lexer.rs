pub mod error;
pub mod token;

use error::LexerError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag},
    character::complete::{alpha1, alphanumeric1, char, digit0, digit1, multispace1, none_of, one_of},
    combinator::{map, map_res, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded},
};
use smol_str::SmolStr;
use token::{Token, TokenKind};

use crate::number::Number;
use crate::range::{Position, Range, Span};

macro_rules! define_token_parser {
    ($name:ident, $tag:expr, $kind:expr) => {
        fn $name(input: Span) -> IResult<Span, Token> {
            map(tag($tag), |span: Span| Token::new($kind, span.into())).parse(input)
        }
    };
}

/// Splits `input` into tokens. The returned vector always ends with an `Eof` token.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexerError> {
    let span = Span::new(input);

    let (rest, mut tokens) = match tokens(span) {
        Ok(result) => result,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => return Err(invalid_input(e.input)),
        Err(nom::Err::Incomplete(_)) => return Err(invalid_input(span)),
    };

    if !rest.fragment().is_empty() {
        return Err(invalid_input(rest));
    }

    tokens.push(Token::new(TokenKind::Eof, rest.into()));
    Ok(tokens)
}

fn invalid_input(span: Span) -> LexerError {
    let start = Position::from(span);

    match span.fragment().chars().next() {
        Some('"') | Some('\'') => LexerError::UnterminatedString(span.into()),
        Some(c) => LexerError::UnexpectedCharacter(c, Range::new(start, Position::new(start.line, start.column + 1))),
        None => LexerError::UnexpectedCharacter(' ', Range::new(start, start)),
    }
}

fn comment(input: Span) -> IResult<Span, Span> {
    recognize(pair(alt((tag("#"), tag("//"))), opt(is_not("\n\r")))).parse(input)
}

fn trivia(input: Span) -> IResult<Span, ()> {
    value((), many0(alt((multispace1, comment)))).parse(input)
}

define_token_parser!(arrow, "->", TokenKind::Arrow);
define_token_parser!(null_coalesce, "??", TokenKind::NullCoalesce);
define_token_parser!(eq_eq, "==", TokenKind::EqEq);
define_token_parser!(ne_eq, "!=", TokenKind::NeEq);
define_token_parser!(lte, "<=", TokenKind::Lte);
define_token_parser!(gte, ">=", TokenKind::Gte);
define_token_parser!(and, "&&", TokenKind::And);
define_token_parser!(or, "||", TokenKind::Or);
define_token_parser!(plus, "+", TokenKind::Plus);
define_token_parser!(minus, "-", TokenKind::Minus);
define_token_parser!(asterisk, "*", TokenKind::Asterisk);
define_token_parser!(slash, "/", TokenKind::Slash);
define_token_parser!(percent, "%", TokenKind::Percent);
define_token_parser!(equal, "=", TokenKind::Equal);
define_token_parser!(lt, "<", TokenKind::Lt);
define_token_parser!(gt, ">", TokenKind::Gt);
define_token_parser!(not, "!", TokenKind::Not);
define_token_parser!(question, "?", TokenKind::Question);
define_token_parser!(colon, ":", TokenKind::Colon);
define_token_parser!(l_paren, "(", TokenKind::LParen);
define_token_parser!(r_paren, ")", TokenKind::RParen);
define_token_parser!(l_bracket, "[", TokenKind::LBracket);
define_token_parser!(r_bracket, "]", TokenKind::RBracket);
define_token_parser!(l_brace, "{", TokenKind::LBrace);
define_token_parser!(r_brace, "}", TokenKind::RBrace);
define_token_parser!(comma, ",", TokenKind::Comma);
define_token_parser!(dot, ".", TokenKind::Dot);
define_token_parser!(semi_colon, ";", TokenKind::SemiColon);

fn operators(input: Span) -> IResult<Span, Token> {
    // Two-character operators must be tried before their one-character prefixes.
    alt((
        arrow,
        null_coalesce,
        eq_eq,
        ne_eq,
        lte,
        gte,
        and,
        or,
        plus,
        minus,
        asterisk,
        slash,
        percent,
        equal,
        lt,
        gt,
        not,
        question,
        colon,
    ))
    .parse(input)
}

fn punctuations(input: Span) -> IResult<Span, Token> {
    alt((
        l_paren, r_paren, l_bracket, r_bracket, l_brace, r_brace, comma, dot, semi_colon,
    ))
    .parse(input)
}

fn number_literal(input: Span) -> IResult<Span, Token> {
    map_res(
        recognize((
            alt((
                recognize((digit1, opt((char('.'), digit0)))),
                recognize((char('.'), digit1)),
            )),
            opt((one_of("eE"), opt(one_of("+-")), digit1)),
        )),
        |span: Span| {
            span.fragment()
                .parse::<f64>()
                .map(|n| Token::new(TokenKind::NumberLiteral(Number::new(n)), span.into()))
        },
    )
    .parse(input)
}

fn string_body<'a>(stop: &'static str) -> impl FnMut(Span<'a>) -> IResult<Span<'a>, String> {
    move |input: Span<'a>| {
        map(
            opt(escaped_transform(
                none_of(stop),
                '\\',
                alt((
                    value('\\', char('\\')),
                    value('"', char('"')),
                    value('\'', char('\'')),
                )),
            )),
            Option::unwrap_or_default,
        )
        .parse(input)
    }
}

fn string_literal(input: Span) -> IResult<Span, Token> {
    let start = Position::from(input);
    let (span, s) = alt((
        delimited(char('"'), string_body("\"\\"), char('"')),
        delimited(char('\''), string_body("'\\"), char('\'')),
    ))
    .parse(input)?;

    Ok((
        span,
        Token::new(
            TokenKind::StringLiteral(SmolStr::new(s)),
            Range::new(start, Position::from(span)),
        ),
    ))
}

fn literals(input: Span) -> IResult<Span, Token> {
    alt((number_literal, string_literal)).parse(input)
}

fn ident(input: Span) -> IResult<Span, Token> {
    map(
        recognize(pair(alt((alpha1, tag("_"))), many0(alt((alphanumeric1, tag("_")))))),
        |span: Span| {
            let kind = match *span.fragment() {
                "true" => TokenKind::BoolLiteral(true),
                "false" => TokenKind::BoolLiteral(false),
                "loop" => TokenKind::Loop,
                "for_each" => TokenKind::ForEach,
                "break" => TokenKind::Break,
                "continue" => TokenKind::Continue,
                "return" => TokenKind::Return,
                "this" => TokenKind::This,
                name => TokenKind::Ident(SmolStr::new(name)),
            };

            Token::new(kind, span.into())
        },
    )
    .parse(input)
}

fn token(input: Span) -> IResult<Span, Token> {
    alt((literals, operators, punctuations, ident)).parse(input)
}

fn tokens(input: Span) -> IResult<Span, Vec<Token>> {
    let (input, tokens) = many0(preceded(trivia, token)).parse(input)?;
    let (input, _) = trivia(input)?;
    Ok((input, tokens))
}
