//! Black-box coverage of the default (non-`embedded`) Python backend
//! through the public `Executor` surface.

use naab_core::{BlockRecord, Executor, Language, Value};
use naab_exec_py::PyExecutor;

fn record(id: &str, source: &str) -> BlockRecord {
    BlockRecord {
        id: id.to_string().into(),
        name: "block".to_string().into(),
        language: Language::Python,
        source: source.to_string(),
        category: "test".to_string(),
        validation_status: naab_core::ValidationStatus::Unvalidated,
    }
}

#[test]
fn loads_a_block_and_calls_its_function() {
    let mut exec = PyExecutor::new().unwrap();
    exec.load_block(&record("BLOCK-PY-MATH", "def square(x):\n    return x * x\n")).unwrap();
    let result = exec.call_function("BLOCK-PY-MATH", "square", vec![Value::Int(6)]).unwrap();
    assert_eq!(result, Value::Int(36));
}

#[test]
fn sibling_functions_in_the_same_block_can_call_each_other() {
    let mut exec = PyExecutor::new().unwrap();
    exec.load_block(
        &record(
            "BLOCK-PY-FIB",
            "def helper(x):\n    return x + 1\ndef wrapper(x):\n    return helper(x) * 2\n",
        ),
    )
    .unwrap();
    let result = exec.call_function("BLOCK-PY-FIB", "wrapper", vec![Value::Int(4)]).unwrap();
    assert_eq!(result, Value::Int(10));
}

#[test]
fn eval_inline_resolves_bindings_from_the_host_scope() {
    let mut exec = PyExecutor::new().unwrap();
    let result = exec.eval_inline("x + y", &[("x".to_string(), Value::Int(3)), ("y".to_string(), Value::Int(4))]).unwrap();
    assert_eq!(result, Value::Int(7));
}

#[test]
fn calling_a_function_in_an_unloaded_block_is_a_runtime_error() {
    let mut exec = PyExecutor::new().unwrap();
    assert!(exec.call_function("BLOCK-PY-MISSING", "f", vec![]).is_err());
}
