//! Numeric value semantics shared by the optimizer and the code generator.
//!
//! Every value in the language is an `f64`. Booleans are `1.0` and `0.0`,
//! and division or remainder by zero yields `0.0` instead of `inf`/`NaN`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Copy)]
pub struct Number(f64);

pub const ZERO: Number = Number(0.0);

impl Number {
    /// Creates a new `Number` from an `f64` value.
    pub fn new(value: f64) -> Self {
        Number(value)
    }

    /// Returns the underlying `f64` value.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Returns `true` if the number represents an integer value.
    pub fn is_int(&self) -> bool {
        self.0.is_finite() && self.0.fract() == 0.0
    }
}

/// Truthiness of a runtime value: anything but `0.0` (including `NaN`) is true.
#[inline(always)]
pub fn truthy(value: f64) -> bool {
    value != 0.0
}

#[inline(always)]
pub fn from_bool(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

#[inline(always)]
pub fn div(left: f64, right: f64) -> f64 {
    if right == 0.0 { 0.0 } else { left / right }
}

#[inline(always)]
pub fn rem(left: f64, right: f64) -> f64 {
    if right == 0.0 { 0.0 } else { left % right }
}

/// Converts a runtime value into an iteration count: truncated toward zero,
/// negative and `NaN` become `0`, and the result is capped by `limit`.
pub fn iteration_count(value: f64, limit: Option<u64>) -> u64 {
    let count = if value.is_nan() || value <= 0.0 {
        0
    } else if value >= u64::MAX as f64 {
        u64::MAX
    } else {
        value.trunc() as u64
    };

    limit.map_or(count, |limit| count.min(limit))
}

/// Resolves an array index: truncated, negative clamps to `0`, wraps by `len`.
pub fn wrap_index(index: f64, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }

    let index = if index.is_nan() || index <= 0.0 {
        0
    } else if index >= usize::MAX as f64 {
        usize::MAX
    } else {
        index.trunc() as usize
    };

    Some(index % len)
}

impl Default for Number {
    fn default() -> Self {
        ZERO
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number(value)
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number(value as f64)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_int() && self.0.abs() < 9_007_199_254_740_992.0 {
            write!(f, "{}", self.0 as i64)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(42.0, "42")]
    #[case(42.125, "42.125")]
    #[case(0.1, "0.1")]
    #[case(-3.0, "-3")]
    #[case(1e20, "100000000000000000000")]
    fn test_display_formatting(#[case] input: f64, #[case] expected: &str) {
        assert_eq!(Number::new(input).to_string(), expected);
    }

    #[rstest]
    #[case::div(div(6.0, 3.0), 2.0)]
    #[case::div_by_zero(div(1.0, 0.0), 0.0)]
    #[case::div_zero_by_zero(div(0.0, 0.0), 0.0)]
    #[case::rem(rem(7.0, 4.0), 3.0)]
    #[case::rem_negative_dividend(rem(-7.0, 4.0), -3.0)]
    #[case::rem_by_zero(rem(5.0, 0.0), 0.0)]
    fn test_lenient_division(#[case] result: f64, #[case] expected: f64) {
        assert_eq!(result, expected);
    }

    #[rstest]
    #[case(0.0, false)]
    #[case(-0.0, false)]
    #[case(1.0, true)]
    #[case(-0.5, true)]
    #[case(f64::NAN, true)]
    fn test_truthy(#[case] value: f64, #[case] expected: bool) {
        assert_eq!(truthy(value), expected);
    }

    #[rstest]
    #[case::truncates(3.9, None, 3)]
    #[case::negative(-3.0, None, 0)]
    #[case::nan(f64::NAN, None, 0)]
    #[case::capped(100.0, Some(10), 10)]
    #[case::under_cap(5.0, Some(10), 5)]
    fn test_iteration_count(#[case] value: f64, #[case] limit: Option<u64>, #[case] expected: u64) {
        assert_eq!(iteration_count(value, limit), expected);
    }

    #[rstest]
    #[case::in_bounds(1.0, 3, Some(1))]
    #[case::wraps(4.0, 3, Some(1))]
    #[case::negative_clamps(-2.0, 3, Some(0))]
    #[case::truncates(2.7, 3, Some(2))]
    #[case::empty(0.0, 0, None)]
    fn test_wrap_index(#[case] index: f64, #[case] len: usize, #[case] expected: Option<usize>) {
        assert_eq!(wrap_index(index, len), expected);
    }
}
