//! `spec.md` §8 scenario 1: a `let` binding followed by `print` runs to
//! completion and produces the expected output on the interpreter's print
//! callback.

use naab_core::{parse, Analyzer, Interpreter, InterpreterOptions};
use std::cell::RefCell;
use std::rc::Rc;

fn run(src: &str) -> (Result<(), naab_core::Error>, Vec<String>) {
    let program = parse(src, Rc::from("t.naab")).unwrap_or_else(|e| panic!("{e:?}"));
    let analysis = Analyzer::analyze(&program);
    assert!(analysis.is_ok(), "unexpected analysis errors: {:?}", analysis.errors);

    let mut interp = Interpreter::new(InterpreterOptions::default());
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = lines.clone();
    interp.set_print_callback(Box::new(move |s| sink.borrow_mut().push(s.to_string())));
    let result = interp.run(&program);
    let captured = lines.borrow().clone();
    (result, captured)
}

#[test]
fn let_then_print_prints_the_bound_value() {
    let (result, lines) = run("main { let x = 42 print(x) }");
    assert!(result.is_ok());
    assert_eq!(lines, vec!["42".to_string()]);
}

#[test]
fn arithmetic_expression_prints_its_evaluated_result() {
    let (result, lines) = run("main { let x = 1 + 2 * 3 print(x) }");
    assert!(result.is_ok());
    assert_eq!(lines, vec!["7".to_string()]);
}

#[test]
fn multiple_prints_run_in_source_order() {
    let (result, lines) = run(r#"main { print("a") print("b") print("c") }"#);
    assert!(result.is_ok());
    assert_eq!(lines, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
}

#[test]
fn a_program_with_no_main_block_runs_without_error_and_prints_nothing() {
    let program = parse("fn unused() -> int { return 1 }", Rc::from("t.naab")).unwrap();
    let mut interp = Interpreter::new(InterpreterOptions::default());
    assert!(interp.run(&program).is_ok());
}
