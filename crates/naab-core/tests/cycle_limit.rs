//! `spec.md` §8 scenario 3: unbounded recursion is stopped by the call-depth
//! guard rather than overflowing the host stack, and the resulting error
//! carries a trace deep enough to show the recursive function repeated.

use naab_core::{parse, ErrorKind, Interpreter, InterpreterOptions};
use std::rc::Rc;

#[test]
fn infinite_recursion_raises_a_cycle_limit_error() {
    let program = parse("fn f() { f() } main { f() }", Rc::from("t.naab")).unwrap();
    let mut interp = Interpreter::new(InterpreterOptions::default());
    let err = interp.run(&program).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CycleLimit);
}

#[test]
fn the_cycle_limit_trace_contains_the_recursive_function_at_least_the_configured_depth() {
    let options = InterpreterOptions::default();
    let program = parse("fn f() { f() } main { f() }", Rc::from("t.naab")).unwrap();
    let mut interp = Interpreter::new(options);
    let err = interp.run(&program).unwrap_err();
    assert!(err.frames.len() >= options.max_call_depth);
    assert!(err.frames.iter().all(|frame| frame.function_name == "f"));
}

#[test]
fn a_lower_configured_depth_trips_the_guard_sooner() {
    let options = InterpreterOptions { max_call_depth: 50, ..InterpreterOptions::default() };
    let program = parse("fn f() { f() } main { f() }", Rc::from("t.naab")).unwrap();
    let mut interp = Interpreter::new(options);
    let err = interp.run(&program).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CycleLimit);
    assert!(err.frames.len() >= 50);
}

#[test]
fn mutual_recursion_also_trips_the_same_guard() {
    let program = parse(
        "fn ping() { pong() } fn pong() { ping() } main { ping() }",
        Rc::from("t.naab"),
    )
    .unwrap();
    let mut interp = Interpreter::new(InterpreterOptions::default());
    let err = interp.run(&program).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CycleLimit);
}
