//! The real QuickJS-backed implementation of [`crate::Backend`], compiled
//! only under the `embedded` feature (`SPEC_FULL.md` §4.7).
//!
//! One `rquickjs::Context` per loaded block, all sharing one
//! `rquickjs::Runtime` — matching `spec.md` §4.7's "single-threaded JS
//! runtime" wording while still giving each block its own global object, so
//! two blocks can each define a function named the same thing without
//! clobbering each other.

use crate::{js_error, Backend, JsValue};
use ahash::AHashMap;
use naab_core::Error;
use rquickjs::{Context, Ctx, Function, Runtime};

fn from_qj_error(err: rquickjs::Error) -> Error {
    js_error(err.to_string())
}

fn to_js_value(ctx: &Ctx<'_>, value: &JsValue) -> rquickjs::Result<rquickjs::Value<'_>> {
    use rquickjs::IntoJs;
    match value {
        JsValue::Null => Ok(rquickjs::Value::new_null(ctx.clone())),
        JsValue::Bool(b) => b.into_js(ctx),
        JsValue::Num(n) => n.into_js(ctx),
        JsValue::Str(s) => s.as_str().into_js(ctx),
    }
}

fn from_js_value(value: rquickjs::Value<'_>) -> rquickjs::Result<JsValue> {
    if value.is_null() || value.is_undefined() {
        Ok(JsValue::Null)
    } else if let Some(b) = value.as_bool() {
        Ok(JsValue::Bool(b))
    } else if let Some(n) = value.as_float() {
        Ok(JsValue::Num(n))
    } else if let Some(n) = value.as_int() {
        Ok(JsValue::Num(f64::from(n)))
    } else if let Some(s) = value.as_string() {
        Ok(JsValue::Str(s.to_string()?))
    } else {
        Err(rquickjs::Error::new_from_js("value", "a primitive NAAb can marshal"))
    }
}

fn call_with_arity(ctx: &Ctx<'_>, func: &Function<'_>, js_args: &[rquickjs::Value<'_>]) -> rquickjs::Result<rquickjs::Value<'static>> {
    let _ = ctx;
    match js_args {
        [] => func.call(()),
        [a] => func.call((a.clone(),)),
        [a, b] => func.call((a.clone(), b.clone())),
        [a, b, c] => func.call((a.clone(), b.clone(), c.clone())),
        [a, b, c, d] => func.call((a.clone(), b.clone(), c.clone(), d.clone())),
        _ => Err(rquickjs::Error::new_from_js("arguments", "at most four arguments")),
    }
}

pub struct QuickJsRuntime {
    runtime: Runtime,
    contexts: AHashMap<String, Context>,
}

impl QuickJsRuntime {
    pub fn new() -> Result<Self, Error> {
        let runtime = Runtime::new().map_err(from_qj_error)?;
        Ok(Self {
            runtime,
            contexts: AHashMap::default(),
        })
    }
}

impl Backend for QuickJsRuntime {
    fn load_block(&mut self, block_id: &str, source: &str) -> Result<(), Error> {
        let context = Context::full(&self.runtime).map_err(from_qj_error)?;
        context
            .with(|ctx| -> rquickjs::Result<()> {
                ctx.eval::<(), _>(source)?;
                Ok(())
            })
            .map_err(from_qj_error)?;
        self.contexts.insert(block_id.to_string(), context);
        Ok(())
    }

    fn call_function(&mut self, block_id: &str, function_name: &str, args: Vec<JsValue>) -> Result<JsValue, Error> {
        let context = self.contexts.get(block_id).ok_or_else(|| js_error(format!("block `{block_id}` has not been loaded")))?;
        context
            .with(|ctx| -> rquickjs::Result<JsValue> {
                let globals = ctx.globals();
                let func: Function = globals.get(function_name)?;
                let js_args: Vec<rquickjs::Value> = args.iter().map(|v| to_js_value(&ctx, v)).collect::<rquickjs::Result<_>>()?;
                let result = call_with_arity(&ctx, &func, &js_args)?;
                from_js_value(result)
            })
            .map_err(from_qj_error)
    }

    fn eval_expr(&mut self, body: &str, bindings: &[(String, JsValue)]) -> Result<JsValue, Error> {
        // Inline code runs in a fresh, throwaway context so bindings from
        // one `<<js[...] ...>>` expression never leak into another.
        let context = Context::full(&self.runtime).map_err(from_qj_error)?;
        context
            .with(|ctx| -> rquickjs::Result<JsValue> {
                let globals = ctx.globals();
                for (name, value) in bindings {
                    globals.set(name.as_str(), to_js_value(&ctx, value)?)?;
                }
                let result: rquickjs::Value = ctx.eval(body)?;
                from_js_value(result)
            })
            .map_err(from_qj_error)
    }
}
