//! `spec.md` §8 scenario 5: a `<<sh[...] ...>>` inline block shells out and
//! evaluates to a `{exit_code, stdout, stderr}` struct. Shell is the one
//! inline language with no satellite executor crate — it never touches the
//! `Executor` trait.

use naab_core::{parse, Interpreter, InterpreterOptions};
use std::rc::Rc;

#[test]
fn shell_inline_runs_and_reports_exit_code_and_stdout() {
    let program = parse(
        r#"main { let r = <<sh[] echo hello >> print(r.exit_code) print(r.stdout) }"#,
        Rc::from("t.naab"),
    )
    .unwrap();
    let mut interp = Interpreter::new(InterpreterOptions::default());
    let lines = Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = lines.clone();
    interp.set_print_callback(Box::new(move |s| sink.borrow_mut().push(s.to_string())));
    interp.run(&program).unwrap();
    let out = lines.borrow();
    assert_eq!(out[0], "0");
    assert_eq!(out[1], "hello\n");
}

#[test]
fn shell_inline_captures_a_nonzero_exit_code() {
    let program = parse(
        r#"main { let r = <<sh[] exit 3 >> print(r.exit_code) }"#,
        Rc::from("t.naab"),
    )
    .unwrap();
    let mut interp = Interpreter::new(InterpreterOptions::default());
    let lines = Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = lines.clone();
    interp.set_print_callback(Box::new(move |s| sink.borrow_mut().push(s.to_string())));
    interp.run(&program).unwrap();
    assert_eq!(lines.borrow()[0], "3");
}

#[test]
fn shell_inline_with_an_empty_binding_list_still_parses_and_runs() {
    let program = parse(r#"main { let r = <<sh[] printf ok >> print(r.stdout) }"#, Rc::from("t.naab")).unwrap();
    let mut interp = Interpreter::new(InterpreterOptions::default());
    let lines = Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = lines.clone();
    interp.set_print_callback(Box::new(move |s| sink.borrow_mut().push(s.to_string())));
    interp.run(&program).unwrap();
    assert_eq!(lines.borrow()[0], "ok");
}
