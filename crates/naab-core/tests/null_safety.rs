//! `spec.md` §8 scenario 2: `let y: int = null` is rejected before a single
//! statement runs — static analysis catches it, not the interpreter.

use naab_core::{parse, Analyzer, ErrorKind, Interpreter, InterpreterOptions};
use std::rc::Rc;

#[test]
fn non_nullable_let_with_null_initializer_fails_analysis() {
    let program = parse("main { let y: int = null }", Rc::from("t.naab")).unwrap();
    let analysis = Analyzer::analyze(&program);
    assert!(!analysis.is_ok());
    assert!(analysis.errors.iter().any(|e| e.kind == ErrorKind::NullSafety));
}

#[test]
fn nullable_annotation_permits_a_null_initializer() {
    let program = parse("main { let y: int? = null }", Rc::from("t.naab")).unwrap();
    let analysis = Analyzer::analyze(&program);
    assert!(analysis.is_ok(), "unexpected analysis errors: {:?}", analysis.errors);
}

#[test]
fn null_safety_error_surfaces_at_the_lets_own_source_line() {
    let program = parse("main {\n    let y: int = null\n}", Rc::from("t.naab")).unwrap();
    let analysis = Analyzer::analyze(&program);
    let err = analysis.errors.iter().find(|e| e.kind == ErrorKind::NullSafety).expect("expected a null safety error");
    assert_eq!(err.location.line, 2);
}

#[test]
fn running_an_analysis_failing_program_still_fails_the_same_way_at_runtime() {
    let program = parse("main { let y: int = null }", Rc::from("t.naab")).unwrap();
    let mut interp = Interpreter::new(InterpreterOptions::default());
    let err = interp.run(&program).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NullSafety);
}
