use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use mocha_lang::{Arity, BindError, Engine, InnerError, MochaResult, Namespace, Options, RuntimeError, Scope};
use rstest::{fixture, rstest};

#[fixture]
fn engine() -> Engine {
    let mut engine = Engine::standard();
    engine.register_function(None, "foo", Arity::Fixed(2), |args, _| Ok(args[0] * args[1]));
    engine.register_function(Some("query"), "is_baby", Arity::Fixed(0), |_, scope| {
        Ok(if scope.get(Namespace::Context, "age").value < 2.0 { 1.0 } else { 0.0 })
    });
    engine.register_function(Some("query"), "fails", Arity::Variadic, |_, _| {
        Err(RuntimeError::new("query.fails always fails"))
    });
    engine.register_function(Some("query"), "bone_length", Arity::Fixed(1), |args, _| {
        if args[0] < 0.0 {
            Err(RuntimeError::invalid_argument("query.bone_length", "bone index must not be negative"))
        } else {
            Ok(args[0] * 2.0)
        }
    });
    engine
}

#[fixture]
fn scope() -> Scope {
    let mut scope = Scope::new();
    scope.set(Namespace::Variable, "speed", 2.0);
    scope.set(Namespace::Context, "age", 1.0);
    scope.set_array(Namespace::Context, "bones", vec![0.5, 1.5, 2.5]);
    scope
}

#[rstest]
#[case::division_by_zero("1 / 0", Ok(0.0))]
#[case::modulo_by_zero("5 % 0", Ok(0.0))]
#[case::undefined_variable("variable.undefined_name", Ok(0.0))]
#[case::short_circuit("false && (1/0)", Ok(0.0))]
#[case::loop_counter("temp.x = 0; loop(5, {temp.x = temp.x + 1}); return temp.x;", Ok(5.0))]
#[case::negative_loop("loop(-3, {1})", Ok(0.0))]
#[case::precedence("1 + 2 * 3 - 4 / 2", Ok(5.0))]
#[case::unary_chain("--2 + !0", Ok(3.0))]
#[case::comparison_chain("(1 < 2) == (3 >= 3)", Ok(1.0))]
#[case::right_assoc_assignment("v.a = v.b = 4; v.a + v.b", Ok(8.0))]
#[case::nested_ternary("v.speed > 3 ? 1 : v.speed > 1 ? 2 : 3", Ok(2.0))]
#[case::ternary_assignment("v.speed > 3 ? v.x = 1 : v.x = 2; v.x", Ok(2.0))]
#[case::call("foo(v.speed, 5)", Ok(10.0))]
#[case::zero_arity_without_parens("query.is_baby", Ok(1.0))]
#[case::zero_arity_with_parens("q.is_baby()", Ok(1.0))]
#[case::math_library("math.clamp(math.lerp(0, 10, 0.5), 0, 4) + math.round(math.sin(90))", Ok(5.0))]
#[case::array_index("c.bones[1]", Ok(1.5))]
#[case::array_wraps("c.bones[4]", Ok(1.5))]
#[case::coalesce_unset("v.missing ?? 7", Ok(7.0))]
#[case::coalesce_set("v.speed ?? 7", Ok(2.0))]
#[case::coalesce_zero_value("v.zero = 0; v.zero ?? 7", Ok(0.0))]
#[case::coalesce_through_arithmetic("(v.missing + 1) ?? 5", Ok(1.0))]
#[case::coalesce_failed_call("query.fails() ?? 3", Ok(3.0))]
#[case::coalesce_invalid_argument("q.bone_length(-1) ?? q.bone_length(2)", Ok(4.0))]
#[case::coalesce_nested("v.a ?? (v.b ?? 9)", Ok(9.0))]
#[case::coalesce_result_is_not_default("v.a ?? v.b ?? 9", Ok(0.0))]
#[case::for_each("t.total = 0; for_each(t.bone, c.bones, { t.total = t.total + t.bone }); t.total", Ok(4.5))]
#[case::for_each_continue("t.n = 0; for_each(t.b, c.bones, { t.b < 1 ? continue; t.n = t.n + 1 }); t.n", Ok(2.0))]
#[case::loop_value("t.i = 0; loop(3, { t.i = t.i + 2 })", Ok(6.0))]
#[case::return_in_loop("t.i = 0; loop(10, { t.i = t.i + 1; t.i == 3 ? return t.i * 10; }); -1", Ok(30.0))]
#[case::string_compare("'idle' == 'idle' && 'idle' != 'walk'", Ok(1.0))]
#[case::comments("# leading comment\n1 + // trailing\n 2", Ok(3.0))]
#[case::runtime_error("query.fails(1)", Err(InnerError::Runtime(RuntimeError::new("query.fails always fails"))))]
#[case::invalid_argument(
    "1 + q.bone_length(-1)",
    Err(InnerError::Runtime(RuntimeError::invalid_argument("query.bone_length", "bone index must not be negative")))
)]
fn test_eval(engine: Engine, scope: Scope, #[case] source: &str, #[case] expected: Result<f64, InnerError>) {
    let mut scope = scope;
    let result: MochaResult = engine.eval(source, &mut scope);
    assert_eq!(result.map_err(|err| err.cause), expected, "{source}");
}

#[rstest]
fn test_short_circuit_does_not_call_host(mut engine: Engine, mut scope: Scope) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    engine.register_function(None, "side_effect", Arity::Variadic, move |_, scope| {
        counter.fetch_add(1, Ordering::SeqCst);
        scope.set(Namespace::Variable, "touched", 1.0);
        Ok(1.0)
    });

    for source in [
        "false && (1/0 + side_effect())",
        "true || side_effect()",
        "v.speed ?? side_effect()",
        "0 ? side_effect() : 2",
        "loop(0, { side_effect() })",
    ] {
        engine.eval(source, &mut scope).unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(scope.get(Namespace::Variable, "touched").was_default);
}

#[rstest]
fn test_arity_mismatch(engine: Engine) {
    let err = engine.compile("foo(1,2,3)").unwrap_err();
    assert!(matches!(
        err.cause,
        InnerError::Bind(BindError::ArityMismatch { expected: 2, got: 3, .. })
    ));
}

#[rstest]
#[case::unknown_namespace("nope.x")]
#[case::bare_identifier("x")]
#[case::unknown_function("query.nope(1)")]
#[case::break_outside_loop("break")]
#[case::assign_to_math("math.pi = 3")]
fn test_bind_errors(engine: Engine, #[case] source: &str) {
    let err = engine.compile(source).unwrap_err();
    assert!(matches!(err.cause, InnerError::Bind(_)), "{source}: {err}");
    assert!(engine.cache().get(source).is_none());
}

#[rstest]
fn test_variables_persist_and_temp_resets(engine: Engine, mut scope: Scope) {
    let source = "t.calls = t.calls + 1; v.calls = v.calls + 1; t.calls";

    for _ in 0..3 {
        assert_eq!(engine.eval(source, &mut scope), Ok(1.0));
    }
    assert_eq!(scope.get(Namespace::Variable, "calls").value, 3.0);
}

#[rstest]
fn test_arrow_evaluates_against_child_scope(engine: Engine, mut scope: Scope) {
    let mut parent = Scope::new();
    parent.set(Namespace::Variable, "speed", 9.0);
    scope.insert_child(42, parent);
    scope.set(Namespace::Variable, "parent", 42.0);

    assert_eq!(engine.eval("v.parent -> v.speed", &mut scope), Ok(9.0));
    assert_eq!(engine.eval("v.parent -> (v.speed = 1)", &mut scope), Ok(1.0));
    assert_eq!(engine.eval("v.missing_parent -> v.speed", &mut scope), Ok(0.0));
    assert_eq!(scope.child(42).map(|c| c.get(Namespace::Variable, "speed").value), Some(1.0));
    assert_eq!(scope.get(Namespace::Variable, "speed").value, 2.0);
}

#[rstest]
#[case("v.speed * 2 + c.age")]
#[case("t.x = 0; loop(4, { t.x = t.x + v.speed; t.x > 5 ? break; }); t.x")]
#[case("1 ? (0 || v.speed) : 3")]
#[case("(2 + 3) * v.speed ?? 1")]
#[case("for_each(t.b, c.bones, { v.acc = v.acc + t.b * (1 + 1) }); v.acc")]
#[case("(1 ? v.missing : 2) ?? 5")]
#[case("{ v.missing } ?? 5")]
#[case("{ 1; v.missing } ?? c.bones[7]")]
#[case("(1 ? 'a' : 'b') == 'b'")]
#[case("{ 'a' } == 'b'")]
#[case("('idle' ?? v.speed) == 'idle'")]
fn test_optimization_is_transparent(#[case] source: &str, scope: Scope) {
    let optimized = Engine::with_options(Options::default());
    let plain = Engine::with_options(Options {
        optimize: false,
        ..Options::default()
    });

    let mut left = scope.clone();
    let mut right = scope;

    assert_eq!(optimized.eval(source, &mut left), plain.eval(source, &mut right));
    assert_eq!(left, right);
}

#[rstest]
fn test_compile_cached_single_flight(engine: Engine) {
    let source = "math.sqrt(v.speed * v.speed) + q.is_baby";
    let barrier = Barrier::new(16);

    let compiled = thread::scope(|s| {
        let handles = (0..16)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    engine.compile_cached(source).unwrap()
                })
            })
            .collect::<Vec<_>>();

        handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
    });

    assert_eq!(engine.cache().compilations(), 1);
    assert!(compiled.iter().all(|expr| Arc::ptr_eq(expr, &compiled[0])));
}

#[rstest]
fn test_compiled_expression_shared_across_threads(engine: Engine) {
    let expr = engine.compile_cached("v.speed * 2").unwrap();

    let results = thread::scope(|s| {
        (1..=4)
            .map(|i| {
                let expr = Arc::clone(&expr);
                s.spawn(move || {
                    let mut scope = Scope::new();
                    scope.set(Namespace::Variable, "speed", i as f64);
                    expr.evaluate(&mut scope).unwrap()
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Vec<_>>()
    });

    assert_eq!(results, vec![2.0, 4.0, 6.0, 8.0]);
}

#[test]
fn test_max_loop_iterations() {
    let engine = Engine::with_options(Options {
        max_loop_iterations: Some(100),
        ..Options::default()
    });
    let mut scope = Scope::new();

    assert_eq!(engine.eval("t.i = 0; loop(1e9, { t.i = t.i + 1 }); t.i", &mut scope), Ok(100.0));
}

#[test]
fn test_error_report() {
    let engine = Engine::standard();
    let err = engine.compile("v.a = 1;\nmath.nope(v.a)").unwrap_err();

    assert_eq!(err.source_code, "v.a = 1;\nmath.nope(v.a)");
    assert_eq!(err.location.offset(), 9);
    assert_eq!(err.to_string(), "Unknown function `math.nope`");
}
