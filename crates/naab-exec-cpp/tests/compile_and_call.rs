//! `spec.md` §8 scenario 4: a C++ block compiles to a shared object the
//! first time it is loaded, and a second load of the identical source hits
//! the on-disk cache instead of invoking the toolchain again.
//!
//! Degrades gracefully (returns early) when the host has no C/C++
//! toolchain — `CppExecutor::init` is the signal for that, exactly as
//! `naab-exec-cpp`'s own unit tests never require a toolchain either.

use naab_core::{BlockRecord, Executor, Language, Value};
use naab_exec_cpp::CppExecutor;
use std::time::SystemTime;

fn record() -> BlockRecord {
    BlockRecord {
        id: "BLOCK-CPP-ADD".into(),
        name: "add".into(),
        language: Language::Cpp,
        source: "extern \"C\" int add(int a, int b) { return a + b; }".to_string(),
        category: "math".to_string(),
        validation_status: naab_core::ValidationStatus::Unvalidated,
    }
}

#[test]
fn compiles_loads_and_calls_a_native_function() {
    let dir = std::env::temp_dir().join(format!("naab-cpp-test-{:?}", SystemTime::now()));
    let mut exec = CppExecutor::new(dir.clone());
    if exec.init().is_err() {
        eprintln!("skipping: no C++ toolchain available on this host");
        return;
    }

    exec.load_block(&record()).expect("first load should compile");
    let result = exec.call_function("BLOCK-CPP-ADD", "add", vec![Value::Int(2), Value::Int(3)]).unwrap();
    assert_eq!(result, Value::Int(5));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn a_second_load_of_identical_source_reuses_the_cached_object() {
    let dir = std::env::temp_dir().join(format!("naab-cpp-test-cache-{:?}", SystemTime::now()));
    let mut first = CppExecutor::new(dir.clone());
    if first.init().is_err() {
        eprintln!("skipping: no C++ toolchain available on this host");
        return;
    }
    first.load_block(&record()).expect("first load should compile");

    // A fresh executor pointed at the same cache directory must find the
    // object already on disk and skip recompilation entirely.
    let mut second = CppExecutor::new(dir.clone());
    second.init().unwrap();
    second.load_block(&record()).expect("second load should hit the cache");
    let result = second.call_function("BLOCK-CPP-ADD", "add", vec![Value::Int(10), Value::Int(20)]).unwrap();
    assert_eq!(result, Value::Int(30));

    let _ = std::fs::remove_dir_all(&dir);
}
