//! `spec.md` §8 scenario 6: a generic function is monomorphized once per
//! distinct set of inferred type arguments, not once per call site.

use naab_core::{parse, Interpreter, InterpreterOptions};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn identity_called_with_two_distinct_types_materializes_twice() {
    let program = parse(
        "fn identity<T>(x: T) -> T { return x } \
         main { let a = identity(42) let b = identity(\"hi\") print(a) print(b) }",
        Rc::from("t.naab"),
    )
    .unwrap();

    let mut interp = Interpreter::new(InterpreterOptions::default());
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = lines.clone();
    interp.set_print_callback(Box::new(move |s| sink.borrow_mut().push(s.to_string())));
    interp.run(&program).unwrap();

    assert_eq!(*lines.borrow(), vec!["42".to_string(), "hi".to_string()]);
    assert_eq!(interp.monomorphization_count("identity"), 2);
}

#[test]
fn repeated_calls_with_the_same_type_reuse_one_monomorphization() {
    let program = parse(
        "fn identity<T>(x: T) -> T { return x } \
         main { print(identity(1)) print(identity(2)) print(identity(3)) }",
        Rc::from("t.naab"),
    )
    .unwrap();

    let mut interp = Interpreter::new(InterpreterOptions::default());
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = lines.clone();
    interp.set_print_callback(Box::new(move |s| sink.borrow_mut().push(s.to_string())));
    interp.run(&program).unwrap();

    assert_eq!(*lines.borrow(), vec!["1".to_string(), "2".to_string(), "3".to_string()]);
    assert_eq!(interp.monomorphization_count("identity"), 1);
}

#[test]
fn explicit_type_argument_selects_the_same_monomorphization_as_inference() {
    let program = parse(
        "fn identity<T>(x: T) -> T { return x } \
         main { print(identity<int>(7)) print(identity(8)) }",
        Rc::from("t.naab"),
    )
    .unwrap();

    let mut interp = Interpreter::new(InterpreterOptions::default());
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = lines.clone();
    interp.set_print_callback(Box::new(move |s| sink.borrow_mut().push(s.to_string())));
    interp.run(&program).unwrap();

    assert_eq!(*lines.borrow(), vec!["7".to_string(), "8".to_string()]);
    assert_eq!(interp.monomorphization_count("identity"), 1);
}
