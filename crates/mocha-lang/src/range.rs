use nom_locate::LocatedSpan;

pub type Span<'a> = LocatedSpan<&'a str>;

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash)]
pub struct Position {
    pub line: u32,
    pub column: usize,
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Position {
    pub fn new(line: u32, column: usize) -> Self {
        Position { line, column }
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Default, Hash)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Range { start, end }
    }

    /// Returns the range starting at `self` and ending where `other` ends.
    pub fn to(&self, other: &Range) -> Range {
        Range {
            start: self.start,
            end: other.end,
        }
    }
}

impl<'a> From<Span<'a>> for Range {
    fn from(span: Span<'a>) -> Self {
        let start = Position::from(span);
        let mut end = start;

        for c in span.fragment().chars() {
            if c == '\n' {
                end.line += 1;
                end.column = 1;
            } else {
                end.column += 1;
            }
        }

        Range { start, end }
    }
}

impl<'a> From<Span<'a>> for Position {
    fn from(span: Span<'a>) -> Self {
        Position {
            line: span.location_line(),
            column: span.get_utf8_column(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::single_line("abc", Position::new(1, 4))]
    #[case::multiline("a\nbc", Position::new(2, 3))]
    #[case::empty("", Position::new(1, 1))]
    fn test_from_span(#[case] input: &str, #[case] end: Position) {
        let range = Range::from(Span::new(input));
        assert_eq!(range.start, Position::new(1, 1));
        assert_eq!(range.end, end);
    }

    #[test]
    fn test_to() {
        let a = Range::new(Position::new(1, 1), Position::new(1, 2));
        let b = Range::new(Position::new(1, 5), Position::new(1, 9));
        assert_eq!(a.to(&b), Range::new(Position::new(1, 1), Position::new(1, 9)));
    }
}
