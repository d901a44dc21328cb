//! JavaScript block executor (`spec.md` §4.7): "owns an embedded single-
//! threaded JS runtime (QuickJS-equivalent); block source is evaluated once
//! to populate the runtime's global object; function invocation reads the
//! named global, calls it, and collects the result."
//!
//! Two backends implement [`Backend`] against the same [`JsValue`]
//! intermediate type:
//! - `embedded` (feature `embedded`, off by default): real QuickJS via
//!   `rquickjs`, the grounding `SPEC_FULL.md` §4.7 calls for.
//! - `stub` (default): a minimal, regex-scanned expression evaluator, so
//!   this workspace has no build-time dependency on a C toolchain unless a
//!   driver explicitly opts into the `embedded` feature. See `stub.rs`'s
//!   module doc for exactly what subset of JS it accepts.

mod stub;

#[cfg(feature = "embedded")]
mod embedded;

use naab_core::{BlockRecord, Error, ErrorKind, Executor, SourceLocation, Value};
use naab_marshal::{ForeignCodec, MarshalLimits, Marshaller};
use std::rc::Rc;

pub(crate) fn js_error(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Runtime, message, SourceLocation::synthetic(Rc::from("<js>")))
}

/// The intermediate representation both backends convert to/from — JS has
/// no distinct int/float, so every number round-trips as `f64` the way
/// JS's own `Number` type does (`spec.md` §4.8's marshal table: NAAb `int`
/// and `float` both map to JS `number`).
#[derive(Debug, Clone, PartialEq)]
pub enum JsValue {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
}

struct JsCodec;

impl ForeignCodec for JsCodec {
    type Foreign = JsValue;

    fn encode(&mut self, value: &Value) -> Result<JsValue, Error> {
        match value {
            Value::Null => Ok(JsValue::Null),
            Value::Bool(b) => Ok(JsValue::Bool(*b)),
            Value::Int(i) => Ok(JsValue::Num(*i as f64)),
            Value::Float(f) => Ok(JsValue::Num(*f)),
            Value::String(s) => Ok(JsValue::Str(s.as_str().to_string())),
            other => Err(js_error(format!("cannot pass a {} value into the JS runtime", other.type_name()))),
        }
    }

    fn decode(&mut self, foreign: JsValue) -> Result<Value, Error> {
        Ok(match foreign {
            JsValue::Null => Value::Null,
            JsValue::Bool(b) => Value::Bool(b),
            // A whole-valued JS number becomes a NAAb `int`; anything with
            // a fractional part becomes a `float`. JS itself draws no such
            // line, so this is a deliberate, documented convention rather
            // than something the runtime tells us.
            JsValue::Num(n) if n.fract() == 0.0 && n.abs() < (i64::MAX as f64) => Value::Int(n as i64),
            JsValue::Num(n) => Value::Float(n),
            JsValue::Str(s) => Value::String(s.into()),
        })
    }
}

/// Capability set a JS backend must provide — the non-marshalling half of
/// `spec.md` §9's `{init, load_block, call_function, drop}`.
pub(crate) trait Backend {
    fn load_block(&mut self, block_id: &str, source: &str) -> Result<(), Error>;
    fn call_function(&mut self, block_id: &str, function_name: &str, args: Vec<JsValue>) -> Result<JsValue, Error>;
    fn eval_expr(&mut self, body: &str, bindings: &[(String, JsValue)]) -> Result<JsValue, Error>;
}

#[cfg(feature = "embedded")]
type BackendImpl = embedded::QuickJsRuntime;
#[cfg(not(feature = "embedded"))]
type BackendImpl = stub::StubRuntime;

/// Executes `BLOCK-JS-...` blocks and `<<js[...] ...>>` inline code.
pub struct JsExecutor {
    backend: BackendImpl,
}

impl JsExecutor {
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            backend: BackendImpl::new()?,
        })
    }
}

impl Default for JsExecutor {
    /// Matches most callers' expectation that an executor is cheap to
    /// stand up; panics only if QuickJS itself fails to initialize, which
    /// the stub backend never does.
    fn default() -> Self {
        Self::new().expect("JS executor backend failed to initialize")
    }
}

impl Executor for JsExecutor {
    fn init(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn load_block(&mut self, record: &BlockRecord) -> Result<(), Error> {
        self.backend.load_block(record.id.as_str(), &record.source)
    }

    fn call_function(&mut self, block_id: &str, function_name: &str, args: Vec<Value>) -> Result<Value, Error> {
        let mut marshaller = Marshaller::new(JsCodec, MarshalLimits::default());
        let mut js_args = Vec::with_capacity(args.len());
        for arg in &args {
            js_args.push(marshaller.marshal_in(arg)?);
        }
        let result = self.backend.call_function(block_id, function_name, js_args)?;
        marshaller.marshal_out(result)
    }

    fn eval_inline(&mut self, body: &str, bindings: &[(String, Value)]) -> Result<Value, Error> {
        let mut marshaller = Marshaller::new(JsCodec, MarshalLimits::default());
        let mut js_bindings = Vec::with_capacity(bindings.len());
        for (name, value) in bindings {
            js_bindings.push((name.clone(), marshaller.marshal_in(value)?));
        }
        let result = self.backend.eval_expr(body, &js_bindings)?;
        marshaller.marshal_out(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use naab_core::Language;

    fn record(source: &str) -> BlockRecord {
        BlockRecord {
            id: "BLOCK-JS-MATH".into(),
            name: "math".into(),
            language: Language::JavaScript,
            source: source.to_string(),
            category: "math".to_string(),
            validation_status: naab_core::ValidationStatus::Unvalidated,
        }
    }

    #[test]
    fn loads_a_block_and_calls_a_function() {
        let mut exec = JsExecutor::new().unwrap();
        exec.load_block(&record("function add(a, b) { return a + b; }")).unwrap();
        let result = exec.call_function("BLOCK-JS-MATH", "add", vec![Value::Int(2), Value::Int(3)]).unwrap();
        assert_eq!(result, Value::Int(5));
    }

    #[test]
    fn evaluates_an_inline_expression_with_bindings() {
        let mut exec = JsExecutor::new().unwrap();
        let result = exec.eval_inline("x * 2", &[("x".to_string(), Value::Int(21))]).unwrap();
        assert_eq!(result, Value::Int(42));
    }

    #[test]
    fn calling_an_unloaded_block_is_a_runtime_error() {
        let mut exec = JsExecutor::new().unwrap();
        let err = exec.call_function("BLOCK-JS-MISSING", "f", vec![]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Runtime);
    }
}
