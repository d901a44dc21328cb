//! Black-box coverage of the default (non-`embedded`) JS backend through the
//! public `Executor` surface, the same seam `naab-core` drives blocks
//! through at runtime.

use naab_core::{BlockRecord, Executor, Language, Value};
use naab_exec_js::JsExecutor;

fn record(id: &str, source: &str) -> BlockRecord {
    BlockRecord {
        id: id.to_string(),
        name: "block".to_string(),
        language: Language::JavaScript,
        source: source.to_string(),
        category: "test".to_string(),
        validation_status: naab_core::ValidationStatus::Unvalidated,
    }
}

#[test]
fn loads_a_block_and_calls_its_function() {
    let mut exec = JsExecutor::new().unwrap();
    exec.load_block(&record("BLOCK-JS-MATH", "function square(x) { return x * x; }")).unwrap();
    let result = exec.call_function("BLOCK-JS-MATH", "square", vec![Value::Int(6)]).unwrap();
    assert_eq!(result, Value::Int(36));
}

#[test]
fn sibling_functions_in_the_same_block_can_call_each_other() {
    let mut exec = JsExecutor::new().unwrap();
    exec.load_block(&record(
        "BLOCK-JS-FIB",
        "function helper(x) { return x + 1; } function wrapper(x) { return helper(x) * 2; }",
    ))
    .unwrap();
    let result = exec.call_function("BLOCK-JS-FIB", "wrapper", vec![Value::Int(4)]).unwrap();
    assert_eq!(result, Value::Int(10));
}

#[test]
fn eval_inline_resolves_bindings_from_the_host_scope() {
    let mut exec = JsExecutor::new().unwrap();
    let result = exec.eval_inline("x + y", &[("x".to_string(), Value::Int(3)), ("y".to_string(), Value::Int(4))]).unwrap();
    assert_eq!(result, Value::Int(7));
}

#[test]
fn calling_a_function_in_an_unloaded_block_is_a_runtime_error() {
    let mut exec = JsExecutor::new().unwrap();
    assert!(exec.call_function("BLOCK-JS-MISSING", "f", vec![]).is_err());
}
