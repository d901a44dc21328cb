//! The real CPython-backed implementation of [`crate::Backend`], compiled
//! only under the `embedded` feature (`SPEC_FULL.md` §4.7).
//!
//! Conversion style follows `ouros-python`'s `convert.rs`: one match arm per
//! [`PyValue`] variant, `bool` checked before `int` is irrelevant here since
//! [`PyValue`] already keeps them apart, but the explicit per-type
//! `into_pyobject`/`extract` calls are the same idiom.

use crate::{py_error, Backend, PyValue};
use ahash::AHashMap;
use naab_core::Error;
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyFloat, PyInt, PyString, PyTuple};
use std::ffi::CString;

fn from_py_err(err: PyErr) -> Error {
    py_error(err.to_string())
}

fn to_py_object<'py>(py: Python<'py>, value: &PyValue) -> PyResult<Py<PyAny>> {
    Ok(match value {
        PyValue::Null => py.None(),
        PyValue::Bool(b) => PyBool::new(py, *b).to_owned().into_any().unbind(),
        PyValue::Int(i) => i.into_pyobject(py)?.into_any().unbind(),
        PyValue::Float(f) => f.into_pyobject(py)?.into_any().unbind(),
        PyValue::Str(s) => PyString::new(py, s).into_any().unbind(),
    })
}

fn from_py_object(obj: &Bound<'_, PyAny>) -> PyResult<PyValue> {
    if obj.is_none() {
        Ok(PyValue::Null)
    } else if let Ok(b) = obj.cast::<PyBool>() {
        Ok(PyValue::Bool(b.is_true()))
    } else if let Ok(i) = obj.cast::<PyInt>() {
        Ok(PyValue::Int(i.extract()?))
    } else if let Ok(f) = obj.cast::<PyFloat>() {
        Ok(PyValue::Float(f.extract()?))
    } else if let Ok(s) = obj.cast::<PyString>() {
        Ok(PyValue::Str(s.extract()?))
    } else {
        Err(pyo3::exceptions::PyTypeError::new_err(format!("cannot marshal Python value of type {}", obj.get_type().name()?)))
    }
}

/// Sanitizes a block id into a valid-looking Python module name —
/// `from_code`'s `module_name` argument is metadata only (it never touches
/// `sys.modules`), so this only needs to avoid characters CPython would
/// choke on while compiling the traceback it's embedded in.
fn module_name_for(block_id: &str) -> CString {
    let sanitized: String = block_id.chars().map(|c| if c.is_alphanumeric() { c } else { '_' }).collect();
    CString::new(format!("naab_{sanitized}")).unwrap_or_else(|_| CString::new("naab_block").unwrap())
}

pub struct CPythonRuntime {
    modules: AHashMap<String, Py<PyModule>>,
}

impl CPythonRuntime {
    pub fn new() -> Result<Self, Error> {
        Ok(Self { modules: AHashMap::default() })
    }
}

impl Backend for CPythonRuntime {
    fn load_block(&mut self, block_id: &str, source: &str) -> Result<(), Error> {
        let module_name = module_name_for(block_id);
        let module = Python::attach(|py| -> PyResult<Py<PyModule>> {
            let code = CString::new(source).map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))?;
            let file_name = CString::new(format!("{block_id}.py")).unwrap_or_else(|_| CString::new("block.py").unwrap());
            let module = PyModule::from_code(py, &code, &file_name, &module_name)?;
            Ok(module.unbind())
        })
        .map_err(from_py_err)?;
        self.modules.insert(block_id.to_string(), module);
        Ok(())
    }

    fn call_function(&mut self, block_id: &str, function_name: &str, args: Vec<PyValue>) -> Result<PyValue, Error> {
        let module = self.modules.get(block_id).ok_or_else(|| py_error(format!("block `{block_id}` has not been loaded")))?;
        Python::attach(|py| -> PyResult<PyValue> {
            let module = module.bind(py);
            let func = module.getattr(function_name)?;
            let py_args: Vec<Py<PyAny>> = args.iter().map(|v| to_py_object(py, v)).collect::<PyResult<_>>()?;
            let tuple = PyTuple::new(py, py_args)?;
            let result = func.call1(tuple)?;
            from_py_object(&result)
        })
        .map_err(from_py_err)
    }

    fn eval_expr(&mut self, body: &str, bindings: &[(String, PyValue)]) -> Result<PyValue, Error> {
        Python::attach(|py| -> PyResult<PyValue> {
            let locals = pyo3::types::PyDict::new(py);
            for (name, value) in bindings {
                locals.set_item(name, to_py_object(py, value)?)?;
            }
            let code = CString::new(body).map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))?;
            let result = py.eval(&code, None, Some(&locals))?;
            from_py_object(&result)
        })
        .map_err(from_py_err)
    }
}
