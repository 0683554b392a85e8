//! The `math` standard library.
//!
//! Angles are in degrees, as in MoLang.

use super::function::{Arity, FunctionRegistry};
use super::namespace::Namespace;

macro_rules! unary {
    ($registry:ident, $name:expr, $f:expr) => {
        $registry.register(Some(Namespace::Math), $name, Arity::Fixed(1), |args, _| {
            let f: fn(f64) -> f64 = $f;
            Ok(f(args[0]))
        });
    };
}

macro_rules! binary {
    ($registry:ident, $name:expr, $f:expr) => {
        $registry.register(Some(Namespace::Math), $name, Arity::Fixed(2), |args, _| {
            let f: fn(f64, f64) -> f64 = $f;
            Ok(f(args[0], args[1]))
        });
    };
}

macro_rules! ternary {
    ($registry:ident, $name:expr, $f:expr) => {
        $registry.register(Some(Namespace::Math), $name, Arity::Fixed(3), |args, _| {
            let f: fn(f64, f64, f64) -> f64 = $f;
            Ok(f(args[0], args[1], args[2]))
        });
    };
}

pub fn register(registry: &mut FunctionRegistry) {
    unary!(registry, "abs", f64::abs);
    unary!(registry, "sin", |x| x.to_radians().sin());
    unary!(registry, "cos", |x| x.to_radians().cos());
    unary!(registry, "asin", |x| x.asin().to_degrees());
    unary!(registry, "acos", |x| x.acos().to_degrees());
    unary!(registry, "atan", |x| x.atan().to_degrees());
    unary!(registry, "ceil", f64::ceil);
    unary!(registry, "floor", f64::floor);
    unary!(registry, "round", f64::round);
    unary!(registry, "trunc", f64::trunc);
    unary!(registry, "sqrt", f64::sqrt);
    unary!(registry, "exp", f64::exp);
    unary!(registry, "ln", f64::ln);
    unary!(registry, "sign", sign);
    unary!(registry, "hermite_blend", hermite_blend);
    unary!(registry, "min_angle", min_angle);

    binary!(registry, "atan2", |y, x| y.atan2(x).to_degrees());
    binary!(registry, "pow", f64::powf);
    binary!(registry, "mod", crate::number::rem);
    binary!(registry, "min", f64::min);
    binary!(registry, "max", f64::max);
    binary!(registry, "copy_sign", f64::copysign);

    ternary!(registry, "clamp", clamp);
    ternary!(registry, "lerp", |start, end, t| start + (end - start) * t);
    ternary!(registry, "lerprotate", lerprotate);

    registry.register(Some(Namespace::Math), "pi", Arity::Fixed(0), |_, _| Ok(std::f64::consts::PI));
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    // `f64::clamp` panics when `min > max`.
    value.max(min).min(max)
}

fn hermite_blend(t: f64) -> f64 {
    3.0 * t * t - 2.0 * t * t * t
}

/// Wraps an angle into `[-180, 180)`.
fn min_angle(angle: f64) -> f64 {
    (angle + 180.0).rem_euclid(360.0) - 180.0
}

/// Interpolates between two angles along the shortest arc.
fn lerprotate(start: f64, end: f64, t: f64) -> f64 {
    let start = min_angle(start);
    let end = min_angle(end);
    let diff = min_angle(end - start);
    start + diff * t
}
