// ABOUTME: End-to-end read/compile/run scenarios exercising the §8 testable properties

use eloquent_lisp::value::Value;
use eloquent_lisp::writer::write_to_string;
use eloquent_lisp::{compile, eval, init, read, run};

fn out(ctx: &eloquent_lisp::Context, source: &str) -> String {
    write_to_string(&eval(ctx, source))
}

#[test]
fn reader_writer_round_trip_for_simple_values() {
    let ctx = init();
    for src in ["42", "3.5", "foo", "\"hi\"", "(1 2 3)", "#t", "#f", "()"] {
        let v = read(&ctx, src);
        assert_eq!(write_to_string(&v), write_to_string(&read(&ctx, &write_to_string(&v))), "{src}");
    }
}

#[test]
fn reader_reads_dotted_pairs() {
    let ctx = init();
    let v = read(&ctx, "(a b . c)");
    assert_eq!(write_to_string(&v), "(a b . c)");
}

#[test]
fn fixnum_arithmetic_is_commutative_and_distributive() {
    let ctx = init();
    assert_eq!(out(&ctx, "(fx+ 2 3)"), out(&ctx, "(fx+ 3 2)"));
    assert_eq!(
        out(&ctx, "(fx* 2 (fx+ 3 4))"),
        out(&ctx, "(fx+ (fx* 2 3) (fx* 2 4))")
    );
}

#[test]
fn wrong_arity_call_raises_an_arity_exception() {
    let ctx = init();
    let result = eval(&ctx, "((lambda (x y) x) 1)");
    assert!(result.is_signalled_exception());
    assert_eq!(
        write_to_string(&eval(&ctx, "(exception-tag (catch 'ignored ((lambda (x y) x) 1)))")),
        "ARITY-ERROR"
    );
}

#[test]
fn rest_arg_function_requires_its_fixed_prefix() {
    let ctx = init();
    let result = eval(&ctx, "((lambda (x . y) (cons x y)))");
    assert!(result.is_signalled_exception());
}

#[test]
fn lambda_bodies_close_over_their_own_lexical_frame() {
    let ctx = init();
    assert_eq!(
        out(&ctx, "((lambda (x) ((lambda (y) x) 2)) 1)"),
        "1"
    );
}

#[test]
fn tail_recursive_loop_runs_without_growing_the_retaddr_stack() {
    let ctx = init();
    let source = "
        (set count-down (lambda (n) (if (fx= n 0) 0 (count-down (fx- n 1)))))
        (count-down 200000)
    ";
    assert_eq!(out(&ctx, source), "0");
}

#[test]
fn catch_turns_a_signal_into_an_ordinary_caught_value() {
    let ctx = init();
    let caught = eval(&ctx, "(catch 'tag (signal \"boom\"))");
    assert!(!caught.is_signalled_exception());
    assert_eq!(
        write_to_string(&eval(&ctx, "(exception-message (catch 'tag (signal \"boom\")))")),
        "\"boom\""
    );
}

#[test]
fn uncaught_signal_propagates_out_of_eval() {
    let ctx = init();
    let result = eval(&ctx, "(signal \"boom\")");
    assert!(result.is_signalled_exception());
}

#[test]
fn macro_expansion_terminates_with_a_non_macro_head() {
    let ctx = init();
    let double = ctx.lisp_package.find_or_create_symbol("double-it");
    let template = compile(
        &ctx,
        read(&ctx, "(lambda (form) (list 'fx+ (head (tail form)) (head (tail form))))"),
    )
    .unwrap();
    let macro_fn = run(&ctx, template, ctx.null_env.clone());
    assert!(matches!(macro_fn, Value::Function(_)));
    double.set_macro(macro_fn);

    let expanded = eval(&ctx, "(expand-macro '(double-it 21))");
    let Value::Pair(p) = &expanded else {
        panic!("expected a pair, got {expanded:?}");
    };
    assert!(matches!(p.head(), Value::Symbol(_)));
    assert_eq!(write_to_string(&eval(&ctx, "(double-it 21)")), "42");
}

#[test]
fn end_to_end_scenarios_from_the_spec() {
    let ctx = init();
    assert_eq!(out(&ctx, "((lambda (x . y) (cons x y)) 1)"), "(1)");
    assert_eq!(out(&ctx, "((lambda (x . y) (cons x y)) 1 2)"), "(1 2)");
    assert_eq!(out(&ctx, "(fx+ 1 2)"), "3");
    assert!(eval(&ctx, "(fx/ 1 0)").is_signalled_exception());
    assert_eq!(
        out(
            &ctx,
            "((lambda (n) (if (fx= n 0) 1 (fx* n ((lambda (m) (fx- m 1)) n)))) 5)"
        ),
        "20"
    );
    assert_eq!(out(&ctx, "`(1 ,(fx+ 1 1) 3)"), "(1 2 3)");
    let parsed = eval(&ctx, "(read-from-string \"(a b . c)\")");
    assert_eq!(write_to_string(&parsed), "(a b . c)");
}

#[test]
fn division_by_zero_is_tagged_arith() {
    let ctx = init();
    let exn = eval(&ctx, "(fx/ 1 0)");
    assert!(exn.is_signalled_exception());
    assert_eq!(
        write_to_string(&eval(&ctx, "(exception-tag (catch 'ignored (fx/ 1 0)))")),
        "ARITH"
    );
}
