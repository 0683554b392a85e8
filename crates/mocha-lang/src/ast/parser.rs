use std::iter::Peekable;

use smol_str::SmolStr;

use crate::lexer::token::{Token, TokenKind};
use crate::range::Range;

use super::error::ParseError;
use super::node::{Args, BinaryOp, Expr, Ident, Literal, Node, Program, UnaryOp};

/// Recursive descent parser with precedence climbing for binary operators.
///
/// Each `parse_*` method receives the token it starts from, already consumed.
pub struct Parser<'a> {
    tokens: Peekable<core::slice::Iter<'a, Token>>,
    eof_range: Range,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            eof_range: tokens.last().map(|token| token.range).unwrap_or_default(),
            tokens: tokens.iter().peekable(),
        }
    }

    /// Parses a whole program into a root `Block` node.
    pub fn parse(&mut self) -> Result<Node, ParseError> {
        let start = self.tokens.peek().map(|token| token.range).unwrap_or_default();
        let (program, end) = self.parse_statements(false)?;
        Ok(Node::new(Expr::Block(program), start.to(&end)))
    }

    fn parse_statements(&mut self, in_block: bool) -> Result<(Program, Range), ParseError> {
        let mut program = Vec::new();

        loop {
            let token = self.next_token()?;

            match &token.kind {
                TokenKind::SemiColon => continue,
                TokenKind::RBrace if in_block => return Ok((program, token.range)),
                TokenKind::Eof if in_block => return Err(ParseError::ExpectedClosingBrace(token.clone())),
                TokenKind::Eof => return Ok((program, token.range)),
                _ => {
                    program.push(self.parse_expr(token)?);

                    // A statement must be followed by a separator or the end of its block.
                    match self.tokens.peek().map(|token| &token.kind) {
                        Some(TokenKind::SemiColon) | Some(TokenKind::Eof) | None => {}
                        Some(TokenKind::RBrace) if in_block => {}
                        Some(_) => {
                            let token = self.next_token()?;
                            return Err(ParseError::UnexpectedToken(token.clone()));
                        }
                    }
                }
            }
        }
    }

    #[inline(always)]
    fn parse_expr(&mut self, token: &'a Token) -> Result<Node, ParseError> {
        self.parse_assignment(token)
    }

    fn parse_assignment(&mut self, token: &'a Token) -> Result<Node, ParseError> {
        let target = self.parse_null_coalesce(token)?;
        self.parse_assignment_value(target)
    }

    fn parse_assignment_value(&mut self, target: Node) -> Result<Node, ParseError> {
        let Some(equal) = self.next_if(&TokenKind::Equal) else {
            return Ok(target);
        };

        if !matches!(target.expr, Expr::Ident(_) | Expr::Index(_, _)) {
            return Err(ParseError::InvalidAssignmentTarget(equal.clone()));
        }

        let token = self.next_token()?;
        let value = self.parse_assignment(token)?;
        let range = target.range.to(&value.range);

        Ok(Node::new(Expr::Assign(Box::new(target), Box::new(value)), range))
    }

    fn parse_null_coalesce(&mut self, token: &'a Token) -> Result<Node, ParseError> {
        let mut lhs = self.parse_ternary(token)?;

        while self.next_if(&TokenKind::NullCoalesce).is_some() {
            let token = self.next_token()?;
            let rhs = self.parse_ternary(token)?;
            let range = lhs.range.to(&rhs.range);
            lhs = Node::new(Expr::NullCoalesce(Box::new(lhs), Box::new(rhs)), range);
        }

        Ok(lhs)
    }

    fn parse_ternary(&mut self, token: &'a Token) -> Result<Node, ParseError> {
        let cond = self.parse_binary(token, 1)?;

        if self.next_if(&TokenKind::Question).is_none() {
            return Ok(cond);
        }

        let token = self.next_token()?;
        let then_branch = self.parse_expr(token)?;

        let else_branch = if self.next_if(&TokenKind::Colon).is_some() {
            let token = self.next_token()?;
            let branch = self.parse_ternary(token)?;
            // `c ? a : v.x = 1` assigns inside the else branch.
            let branch = if matches!(branch.expr, Expr::Ident(_) | Expr::Index(_, _)) {
                self.parse_assignment_value(branch)?
            } else {
                branch
            };
            Some(Box::new(branch))
        } else {
            None
        };

        let end = else_branch
            .as_ref()
            .map(|branch| branch.range)
            .unwrap_or(then_branch.range);
        let range = cond.range.to(&end);

        Ok(Node::new(
            Expr::Ternary(Box::new(cond), Box::new(then_branch), else_branch),
            range,
        ))
    }

    #[inline(always)]
    fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
        match kind {
            TokenKind::Or => Some(BinaryOp::Or),
            TokenKind::And => Some(BinaryOp::And),
            TokenKind::EqEq => Some(BinaryOp::Eq),
            TokenKind::NeEq => Some(BinaryOp::Ne),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::Lte => Some(BinaryOp::Lte),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::Gte => Some(BinaryOp::Gte),
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            TokenKind::Asterisk => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Rem),
            _ => None,
        }
    }

    fn parse_binary(&mut self, token: &'a Token, min_precedence: u8) -> Result<Node, ParseError> {
        let mut lhs = self.parse_unary(token)?;

        while let Some(op) = self
            .tokens
            .peek()
            .and_then(|token| Self::binary_op(&token.kind))
        {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }

            self.tokens.next();
            let token = self.next_token()?;
            let rhs = self.parse_binary(token, precedence + 1)?;
            let range = lhs.range.to(&rhs.range);
            lhs = Node::new(Expr::Binary(op, Box::new(lhs), Box::new(rhs)), range);
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self, token: &'a Token) -> Result<Node, ParseError> {
        let op = match token.kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.parse_postfix(token),
        };

        let next = self.next_token()?;
        let operand = self.parse_unary(next)?;
        let range = token.range.to(&operand.range);

        Ok(Node::new(Expr::Unary(op, Box::new(operand)), range))
    }

    fn parse_postfix(&mut self, token: &'a Token) -> Result<Node, ParseError> {
        let mut node = self.parse_indexed(token)?;

        while self.next_if(&TokenKind::Arrow).is_some() {
            let token = self.next_token()?;
            let body = self.parse_indexed(token)?;
            let range = node.range.to(&body.range);
            node = Node::new(Expr::Arrow(Box::new(node), Box::new(body)), range);
        }

        Ok(node)
    }

    fn parse_indexed(&mut self, token: &'a Token) -> Result<Node, ParseError> {
        let mut node = self.parse_primary(token)?;

        while self.next_if(&TokenKind::LBracket).is_some() {
            let token = self.next_token()?;
            let index = self.parse_expr(token)?;
            let close = self.next_token()?;

            if close.kind != TokenKind::RBracket {
                return Err(ParseError::ExpectedClosingBracket(close.clone()));
            }

            let range = node.range.to(&close.range);
            node = Node::new(Expr::Index(Box::new(node), Box::new(index)), range);
        }

        Ok(node)
    }

    fn parse_primary(&mut self, token: &'a Token) -> Result<Node, ParseError> {
        match &token.kind {
            TokenKind::NumberLiteral(n) => Ok(Node::new(Expr::Literal(Literal::Number(*n)), token.range)),
            TokenKind::StringLiteral(s) => Ok(Node::new(Expr::Literal(Literal::String(s.clone())), token.range)),
            TokenKind::BoolLiteral(b) => Ok(Node::new(Expr::Literal(Literal::Bool(*b)), token.range)),
            TokenKind::This => Ok(Node::new(Expr::This, token.range)),
            TokenKind::Break => Ok(Node::new(Expr::Break, token.range)),
            TokenKind::Continue => Ok(Node::new(Expr::Continue, token.range)),
            TokenKind::Ident(name) => self.parse_ident(token, name),
            TokenKind::LParen => {
                let next = self.next_token()?;
                let mut node = self.parse_expr(next)?;
                let close = self.next_token()?;

                if close.kind != TokenKind::RParen {
                    return Err(ParseError::ExpectedClosingParen(close.clone()));
                }

                node.range = token.range.to(&close.range);
                Ok(node)
            }
            TokenKind::LBrace => {
                let (program, end) = self.parse_statements(true)?;
                Ok(Node::new(Expr::Block(program), token.range.to(&end)))
            }
            TokenKind::Loop => self.parse_loop(token),
            TokenKind::ForEach => self.parse_for_each(token),
            TokenKind::Return => self.parse_return(token),
            TokenKind::Eof => Err(ParseError::UnexpectedEOFDetected(token.clone())),
            _ => Err(ParseError::UnexpectedToken(token.clone())),
        }
    }

    fn parse_ident(&mut self, token: &'a Token, head: &SmolStr) -> Result<Node, ParseError> {
        let mut path: Vec<SmolStr> = Vec::new();
        let mut range = token.range;

        while self.next_if(&TokenKind::Dot).is_some() {
            let segment = self.next_token()?;

            match &segment.kind {
                TokenKind::Ident(name) => {
                    path.push(name.clone());
                    range = token.range.to(&segment.range);
                }
                TokenKind::Eof => return Err(ParseError::UnexpectedEOFDetected(segment.clone())),
                _ => return Err(ParseError::UnexpectedToken(segment.clone())),
            }
        }

        let ident = if path.is_empty() {
            Ident {
                namespace: None,
                name: head.clone(),
            }
        } else {
            Ident {
                namespace: Some(head.clone()),
                name: SmolStr::new(path.join(".")),
            }
        };

        if self.next_if(&TokenKind::LParen).is_some() {
            let (args, end) = self.parse_args()?;
            return Ok(Node::new(Expr::Call(ident, args), range.to(&end)));
        }

        Ok(Node::new(Expr::Ident(ident), range))
    }

    fn parse_args(&mut self) -> Result<(Args, Range), ParseError> {
        let mut args = Vec::new();

        if let Some(close) = self.next_if(&TokenKind::RParen) {
            return Ok((args, close.range));
        }

        loop {
            let token = self.next_token()?;
            args.push(self.parse_expr(token)?);

            let token = self.next_token()?;
            match token.kind {
                TokenKind::Comma => continue,
                TokenKind::RParen => return Ok((args, token.range)),
                _ => return Err(ParseError::ExpectedClosingParen(token.clone())),
            }
        }
    }

    fn parse_loop(&mut self, token: &'a Token) -> Result<Node, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let next = self.next_token()?;
        let count = self.parse_expr(next)?;
        self.expect(&TokenKind::Comma)?;
        let next = self.next_token()?;
        let body = self.parse_expr(next)?;
        let close = self.expect_closing_paren()?;

        Ok(Node::new(
            Expr::Loop(Box::new(count), Box::new(body)),
            token.range.to(&close.range),
        ))
    }

    fn parse_for_each(&mut self, token: &'a Token) -> Result<Node, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let next = self.next_token()?;
        let variable = self.parse_expr(next)?;
        self.expect(&TokenKind::Comma)?;
        let next = self.next_token()?;
        let collection = self.parse_expr(next)?;
        self.expect(&TokenKind::Comma)?;
        let next = self.next_token()?;
        let body = self.parse_expr(next)?;
        let close = self.expect_closing_paren()?;

        Ok(Node::new(
            Expr::ForEach(Box::new(variable), Box::new(collection), Box::new(body)),
            token.range.to(&close.range),
        ))
    }

    fn parse_return(&mut self, token: &'a Token) -> Result<Node, ParseError> {
        let has_value = self
            .tokens
            .peek()
            .is_some_and(|next| Self::starts_expression(&next.kind));

        if !has_value {
            return Ok(Node::new(Expr::Return(None), token.range));
        }

        let next = self.next_token()?;
        let value = self.parse_expr(next)?;
        let range = token.range.to(&value.range);

        Ok(Node::new(Expr::Return(Some(Box::new(value))), range))
    }

    fn starts_expression(kind: &TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::NumberLiteral(_)
                | TokenKind::StringLiteral(_)
                | TokenKind::BoolLiteral(_)
                | TokenKind::Ident(_)
                | TokenKind::This
                | TokenKind::LParen
                | TokenKind::LBrace
                | TokenKind::Minus
                | TokenKind::Not
                | TokenKind::Loop
                | TokenKind::ForEach
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Return
        )
    }

    #[inline(always)]
    fn next_if(&mut self, kind: &TokenKind) -> Option<&'a Token> {
        self.tokens.next_if(|token| &token.kind == kind)
    }

    fn next_token(&mut self) -> Result<&'a Token, ParseError> {
        self.tokens
            .next()
            .ok_or_else(|| ParseError::UnexpectedEOFDetected(Token::new(TokenKind::Eof, self.eof_range)))
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<&'a Token, ParseError> {
        let token = self.next_token()?;

        match &token.kind {
            k if k == kind => Ok(token),
            TokenKind::Eof => Err(ParseError::UnexpectedEOFDetected(token.clone())),
            _ => Err(ParseError::UnexpectedToken(token.clone())),
        }
    }

    fn expect_closing_paren(&mut self) -> Result<&'a Token, ParseError> {
        let token = self.next_token()?;

        if token.kind == TokenKind::RParen {
            Ok(token)
        } else {
            Err(ParseError::ExpectedClosingParen(token.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::number::Number;
    use rstest::rstest;

    fn parse(code: &str) -> Result<Node, ParseError> {
        let tokens = tokenize(code).unwrap();
        Parser::new(&tokens).parse()
    }

    fn node(expr: Expr) -> Node {
        Node::new(expr, Range::default())
    }

    fn num(n: f64) -> Node {
        node(Expr::Literal(Literal::Number(Number::new(n))))
    }

    fn var(namespace: &str, name: &str) -> Node {
        node(Expr::Ident(Ident::new(Some(namespace), name)))
    }

    fn binary(op: BinaryOp, left: Node, right: Node) -> Node {
        node(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn program(nodes: Vec<Node>) -> Node {
        node(Expr::Block(nodes))
    }

    #[rstest]
    #[case::empty("", program(vec![]))]
    #[case::only_separators(";;", program(vec![]))]
    #[case::precedence(
        "1 + 2 * 3",
        program(vec![binary(BinaryOp::Add, num(1.0), binary(BinaryOp::Mul, num(2.0), num(3.0)))])
    )]
    #[case::left_associative(
        "8 - 4 - 2",
        program(vec![binary(BinaryOp::Sub, binary(BinaryOp::Sub, num(8.0), num(4.0)), num(2.0))])
    )]
    #[case::parentheses(
        "(1 + 2) * 3",
        program(vec![binary(BinaryOp::Mul, binary(BinaryOp::Add, num(1.0), num(2.0)), num(3.0))])
    )]
    #[case::logical_precedence(
        "1 || 0 && 0",
        program(vec![binary(BinaryOp::Or, num(1.0), binary(BinaryOp::And, num(0.0), num(0.0)))])
    )]
    #[case::comparison_over_equality(
        "1 < 2 == 1",
        program(vec![binary(BinaryOp::Eq, binary(BinaryOp::Lt, num(1.0), num(2.0)), num(1.0))])
    )]
    #[case::unary(
        "-v.x * !1",
        program(vec![binary(
            BinaryOp::Mul,
            node(Expr::Unary(UnaryOp::Neg, Box::new(var("v", "x")))),
            node(Expr::Unary(UnaryOp::Not, Box::new(num(1.0)))),
        )])
    )]
    #[case::dotted_name("variable.a.b", program(vec![var("variable", "a.b")]))]
    #[case::bare_name("foo", program(vec![node(Expr::Ident(Ident::new(None, "foo")))]))]
    #[case::call(
        "math.clamp(1, 2, 3)",
        program(vec![node(Expr::Call(Ident::new(Some("math"), "clamp"), vec![num(1.0), num(2.0), num(3.0)]))])
    )]
    #[case::call_without_args("q.time()", program(vec![node(Expr::Call(Ident::new(Some("q"), "time"), vec![]))]))]
    #[case::assignment_right_associative(
        "v.a = v.b = 1",
        program(vec![node(Expr::Assign(
            Box::new(var("v", "a")),
            Box::new(node(Expr::Assign(Box::new(var("v", "b")), Box::new(num(1.0))))),
        ))])
    )]
    #[case::ternary_right_associative(
        "1 ? 2 : 3 ? 4 : 5",
        program(vec![node(Expr::Ternary(
            Box::new(num(1.0)),
            Box::new(num(2.0)),
            Some(Box::new(node(Expr::Ternary(Box::new(num(3.0)), Box::new(num(4.0)), Some(Box::new(num(5.0))))))),
        ))])
    )]
    #[case::binary_conditional(
        "v.a > 1 ? 2",
        program(vec![node(Expr::Ternary(
            Box::new(binary(BinaryOp::Gt, var("v", "a"), num(1.0))),
            Box::new(num(2.0)),
            None,
        ))])
    )]
    #[case::ternary_assign_in_branches(
        "1 ? v.a = 1 : v.b = 2",
        program(vec![node(Expr::Ternary(
            Box::new(num(1.0)),
            Box::new(node(Expr::Assign(Box::new(var("v", "a")), Box::new(num(1.0))))),
            Some(Box::new(node(Expr::Assign(Box::new(var("v", "b")), Box::new(num(2.0)))))),
        ))])
    )]
    #[case::null_coalesce_below_ternary(
        "v.a ?? 1 ? 2 : 3",
        program(vec![node(Expr::NullCoalesce(
            Box::new(var("v", "a")),
            Box::new(node(Expr::Ternary(Box::new(num(1.0)), Box::new(num(2.0)), Some(Box::new(num(3.0)))))),
        ))])
    )]
    #[case::index("v.arr[1 + 1]", program(vec![node(Expr::Index(
        Box::new(var("v", "arr")),
        Box::new(binary(BinaryOp::Add, num(1.0), num(1.0))),
    ))]))]
    #[case::arrow("v.other -> v.x", program(vec![node(Expr::Arrow(Box::new(var("v", "other")), Box::new(var("v", "x"))))]))]
    #[case::arrow_binds_tighter_than_add(
        "v.other -> v.x + 1",
        program(vec![binary(
            BinaryOp::Add,
            node(Expr::Arrow(Box::new(var("v", "other")), Box::new(var("v", "x")))),
            num(1.0),
        )])
    )]
    #[case::statements(
        "t.x = 1; return t.x;",
        program(vec![
            node(Expr::Assign(Box::new(var("t", "x")), Box::new(num(1.0)))),
            node(Expr::Return(Some(Box::new(var("t", "x"))))),
        ])
    )]
    #[case::loop_with_block(
        "loop(3, { t.x = t.x + 1; break; })",
        program(vec![node(Expr::Loop(
            Box::new(num(3.0)),
            Box::new(node(Expr::Block(vec![
                node(Expr::Assign(Box::new(var("t", "x")), Box::new(binary(BinaryOp::Add, var("t", "x"), num(1.0))))),
                node(Expr::Break),
            ]))),
        ))])
    )]
    #[case::for_each(
        "for_each(t.item, v.list, { v.sum = v.sum + t.item; })",
        program(vec![node(Expr::ForEach(
            Box::new(var("t", "item")),
            Box::new(var("v", "list")),
            Box::new(node(Expr::Block(vec![node(Expr::Assign(
                Box::new(var("v", "sum")),
                Box::new(binary(BinaryOp::Add, var("v", "sum"), var("t", "item"))),
            ))]))),
        ))])
    )]
    #[case::return_without_value("return", program(vec![node(Expr::Return(None))]))]
    #[case::literals(
        "'text' == \"text\"; true; this",
        program(vec![
            binary(
                BinaryOp::Eq,
                node(Expr::Literal(Literal::String("text".into()))),
                node(Expr::Literal(Literal::String("text".into()))),
            ),
            node(Expr::Literal(Literal::Bool(true))),
            node(Expr::This),
        ])
    )]
    fn test_parse(#[case] code: &str, #[case] expected: Node) {
        assert_eq!(parse(code), Ok(expected));
    }

    #[rstest]
    #[case::missing_operand("1 +", "UnexpectedEOFDetected")]
    #[case::missing_paren("(1 + 2", "ExpectedClosingParen")]
    #[case::missing_bracket("v.a[1", "ExpectedClosingBracket")]
    #[case::missing_brace("{ 1; 2", "ExpectedClosingBrace")]
    #[case::invalid_target("1 = 2", "InvalidAssignmentTarget")]
    #[case::missing_separator("1 2", "UnexpectedToken")]
    #[case::stray_close("1)", "UnexpectedToken")]
    #[case::loop_missing_comma("loop(1 2)", "UnexpectedToken")]
    #[case::call_missing_paren("math.abs(1", "ExpectedClosingParen")]
    #[case::trailing_dot("v.", "UnexpectedEOFDetected")]
    fn test_parse_error(#[case] code: &str, #[case] expected: &str) {
        let err = parse(code).unwrap_err();
        let name = format!("{:?}", err);
        assert!(name.starts_with(expected), "{name}");
    }

    #[test]
    fn test_error_position() {
        let err = parse("v.a = 1;\nv.b = (2").unwrap_err();
        assert!(matches!(err, ParseError::ExpectedClosingParen(_)));
        assert_eq!(err.token().range.start.line, 2);
    }

    #[test]
    fn test_node_range() {
        let node = parse("  v.abc + 12").unwrap();
        let Expr::Block(program) = &node.expr else {
            panic!("expected block")
        };
        assert_eq!(program[0].range.start.column, 3);
        assert_eq!(program[0].range.end.column, 13);
    }
}
