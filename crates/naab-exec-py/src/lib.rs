//! Python block executor (`spec.md` §4.7): "owns an embedded single-threaded
//! Python interpreter (CPython-equivalent); block source is evaluated once
//! as a module; function invocation looks up the named top-level function
//! and calls it."
//!
//! Structured exactly like `naab-exec-js`: a shared [`PyValue`] intermediate
//! type, a [`Backend`] trait, and two implementations selected by the
//! `embedded` Cargo feature — a real CPython embedding via `pyo3`
//! (`embedded.rs`) and a minimal regex-scanned stub (`stub.rs`) used when
//! that feature is off.

mod stub;

#[cfg(feature = "embedded")]
mod embedded;

use naab_core::{BlockRecord, Error, ErrorKind, Executor, SourceLocation, Value};
use naab_marshal::{ForeignCodec, MarshalLimits, Marshaller};
use std::rc::Rc;

pub(crate) fn py_error(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Runtime, message, SourceLocation::synthetic(Rc::from("<python>")))
}

/// The intermediate representation both backends convert to/from. Unlike
/// JS, Python keeps `int`/`float` distinct at the language level, so this
/// mirrors `Value`'s own split rather than collapsing to one numeric kind.
#[derive(Debug, Clone, PartialEq)]
pub enum PyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

struct PyCodec;

impl ForeignCodec for PyCodec {
    type Foreign = PyValue;

    fn encode(&mut self, value: &Value) -> Result<PyValue, Error> {
        match value {
            Value::Null => Ok(PyValue::Null),
            Value::Bool(b) => Ok(PyValue::Bool(*b)),
            Value::Int(i) => Ok(PyValue::Int(*i)),
            Value::Float(f) => Ok(PyValue::Float(*f)),
            Value::String(s) => Ok(PyValue::Str(s.as_str().to_string())),
            other => Err(py_error(format!("cannot pass a {} value into the Python runtime", other.type_name()))),
        }
    }

    fn decode(&mut self, foreign: PyValue) -> Result<Value, Error> {
        Ok(match foreign {
            PyValue::Null => Value::Null,
            PyValue::Bool(b) => Value::Bool(b),
            PyValue::Int(i) => Value::Int(i),
            PyValue::Float(f) => Value::Float(f),
            PyValue::Str(s) => Value::String(s.into()),
        })
    }
}

pub(crate) trait Backend {
    fn load_block(&mut self, block_id: &str, source: &str) -> Result<(), Error>;
    fn call_function(&mut self, block_id: &str, function_name: &str, args: Vec<PyValue>) -> Result<PyValue, Error>;
    fn eval_expr(&mut self, body: &str, bindings: &[(String, PyValue)]) -> Result<PyValue, Error>;
}

#[cfg(feature = "embedded")]
type BackendImpl = embedded::CPythonRuntime;
#[cfg(not(feature = "embedded"))]
type BackendImpl = stub::StubRuntime;

/// Executes `BLOCK-PY-...` blocks and `<<python[...] ...>>` inline code.
pub struct PyExecutor {
    backend: BackendImpl,
}

impl PyExecutor {
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            backend: BackendImpl::new()?,
        })
    }
}

impl Default for PyExecutor {
    fn default() -> Self {
        Self::new().expect("Python executor backend failed to initialize")
    }
}

impl Executor for PyExecutor {
    fn init(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn load_block(&mut self, record: &BlockRecord) -> Result<(), Error> {
        self.backend.load_block(record.id.as_str(), &record.source)
    }

    fn call_function(&mut self, block_id: &str, function_name: &str, args: Vec<Value>) -> Result<Value, Error> {
        let mut marshaller = Marshaller::new(PyCodec, MarshalLimits::default());
        let mut py_args = Vec::with_capacity(args.len());
        for arg in &args {
            py_args.push(marshaller.marshal_in(arg)?);
        }
        let result = self.backend.call_function(block_id, function_name, py_args)?;
        marshaller.marshal_out(result)
    }

    fn eval_inline(&mut self, body: &str, bindings: &[(String, Value)]) -> Result<Value, Error> {
        let mut marshaller = Marshaller::new(PyCodec, MarshalLimits::default());
        let mut py_bindings = Vec::with_capacity(bindings.len());
        for (name, value) in bindings {
            py_bindings.push((name.clone(), marshaller.marshal_in(value)?));
        }
        let result = self.backend.eval_expr(body, &py_bindings)?;
        marshaller.marshal_out(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use naab_core::Language;

    fn record(source: &str) -> BlockRecord {
        BlockRecord {
            id: "BLOCK-PY-MATH".into(),
            name: "math".into(),
            language: Language::Python,
            source: source.to_string(),
            category: "math".to_string(),
            validation_status: naab_core::ValidationStatus::Unvalidated,
        }
    }

    #[test]
    fn loads_a_block_and_calls_a_function() {
        let mut exec = PyExecutor::new().unwrap();
        exec.load_block(&record("def add(a, b):\n    return a + b\n")).unwrap();
        let result = exec.call_function("BLOCK-PY-MATH", "add", vec![Value::Int(2), Value::Int(3)]).unwrap();
        assert_eq!(result, Value::Int(5));
    }

    #[test]
    fn evaluates_an_inline_expression_with_bindings() {
        let mut exec = PyExecutor::new().unwrap();
        let result = exec.eval_inline("x * 2", &[("x".to_string(), Value::Int(21))]).unwrap();
        assert_eq!(result, Value::Int(42));
    }

    #[test]
    fn calling_an_unloaded_block_is_a_runtime_error() {
        let mut exec = PyExecutor::new().unwrap();
        let err = exec.call_function("BLOCK-PY-MISSING", "f", vec![]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Runtime);
    }
}
