//! C++ block executor (`spec.md` §4.7): compile-or-reuse a shared object per
//! block, dlopen it, and resolve `extern "C"` functions by name.
//!
//! The calling convention this executor actually supports is deliberately
//! narrow — see `signature.rs`'s module doc for why. A block whose function
//! uses anything beyond an all-`int` signature fails loudly at call time
//! with a `CompileError` rather than producing a miscast value.

mod signature;
mod toolchain;

pub use signature::{find_signature, PrimitiveKind, Signature};
pub use toolchain::{compile_shared_object, discover, Toolchain};

use ahash::AHashMap;
use libloading::Library;
use naab_core::{BlockRecord, Error, ErrorKind, Executor, SourceLocation, Value};
use naab_marshal::{ForeignCodec, MarshalLimits, Marshaller};
use naab_registry::{persist, CacheKey, LibraryDetectionTable, LoadLocks};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

fn cpp_error(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Compile, message, SourceLocation::synthetic(Rc::from("<cpp>")))
}

/// NAAb `int` <-> C `int` (32-bit). `naab-marshal`'s generic depth/size/NUL
/// guard still runs around this codec; there is simply nothing for a plain
/// `i32` to trip on beyond out-of-range values, which `encode` itself
/// rejects.
struct CppCodec;

impl ForeignCodec for CppCodec {
    type Foreign = i32;

    fn encode(&mut self, value: &Value) -> Result<i32, Error> {
        match value {
            Value::Int(i) => i32::try_from(*i).map_err(|_| cpp_error("integer argument out of range for a C `int`")),
            other => Err(cpp_error(format!("cannot pass a {} value to a C++ `int` parameter", other.type_name()))),
        }
    }

    fn decode(&mut self, foreign: i32) -> Result<Value, Error> {
        Ok(Value::Int(i64::from(foreign)))
    }
}

/// Executes `BLOCK-CPP-...` blocks. One instance is shared by every `use` of
/// a C++ block in an interpreter; `libraries`/`sources` accumulate one entry
/// per distinct block id loaded so far.
pub struct CppExecutor {
    cache_dir: PathBuf,
    table: LibraryDetectionTable,
    locks: Arc<LoadLocks>,
    toolchain: Option<Toolchain>,
    libraries: AHashMap<String, Library>,
    sources: AHashMap<String, String>,
}

impl CppExecutor {
    #[must_use]
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            table: LibraryDetectionTable::default(),
            locks: Arc::new(LoadLocks::new()),
            toolchain: None,
            libraries: AHashMap::default(),
            sources: AHashMap::default(),
        }
    }

    #[must_use]
    pub fn with_detection_table(mut self, table: LibraryDetectionTable) -> Self {
        self.table = table;
        self
    }

    fn toolchain(&self) -> Result<&Toolchain, Error> {
        self.toolchain.as_ref().ok_or_else(|| cpp_error("C++ executor used before init()"))
    }
}

impl Executor for CppExecutor {
    fn init(&mut self) -> Result<(), Error> {
        let toolchain = toolchain::discover().map_err(|e| cpp_error(e.to_string()))?;
        tracing::debug!(program = %toolchain.program, fingerprint = %toolchain.fingerprint, "discovered C++ toolchain");
        self.toolchain = Some(toolchain);
        Ok(())
    }

    fn load_block(&mut self, record: &BlockRecord) -> Result<(), Error> {
        let toolchain = self.toolchain()?.clone();
        let flags = self.table.detect_flags(&record.source);
        let key = CacheKey::compute(record.id.as_str(), &record.source, &flags, &toolchain.fingerprint);
        let object_path = persist::object_path(&self.cache_dir, &key);
        let cache_dir = self.cache_dir.clone();
        let source = record.source.clone();
        let block_id = record.id.as_str().to_string();

        // First-load compilation is serialized per block id (`spec.md` §5,
        // §8 "idempotent load") so two concurrent `use`s of the same block
        // never race to compile it twice.
        self.locks.with_lock(&block_id, || -> Result<(), Error> {
            if persist::is_cached(&cache_dir, &key) {
                tracing::debug!(block = %block_id, "reusing cached native object, skipping toolchain invocation");
                return Ok(());
            }
            let span = tracing::info_span!("cpp_compile", block = %block_id);
            let _enter = span.enter();
            let source_path = cache_dir.join(format!("{key}.cpp"));
            std::fs::create_dir_all(&cache_dir).map_err(|e| cpp_error(e.to_string()))?;
            std::fs::write(&source_path, &source).map_err(|e| cpp_error(e.to_string()))?;
            toolchain::compile_shared_object(&toolchain, &source_path, &object_path, &flags)
                .map_err(|e| cpp_error(e.to_string()))?;
            persist::write_sidecar(&cache_dir, &key, &source, &flags).map_err(|e| cpp_error(e.to_string()))?;
            Ok(())
        })?;

        // Safety: `object_path` was just compiled by us from NAAb-supplied
        // C++ source (or is a previous run's cache hit for that same
        // source) — never an externally supplied, untrusted binary.
        let library = unsafe { Library::new(&object_path) }.map_err(|e| cpp_error(e.to_string()))?;
        self.libraries.insert(block_id.clone(), library);
        self.sources.insert(block_id, record.source.clone());
        Ok(())
    }

    fn call_function(&mut self, block_id: &str, function_name: &str, args: Vec<Value>) -> Result<Value, Error> {
        let source = self
            .sources
            .get(block_id)
            .ok_or_else(|| cpp_error(format!("block `{block_id}` has not been loaded")))?;

        let signature = signature::find_signature(source, function_name).ok_or_else(|| {
            cpp_error(format!("no supported `int`-only signature found for `{function_name}` in block `{block_id}`"))
        })?;
        if signature.ret != PrimitiveKind::Int || signature.params.iter().any(|p| *p != PrimitiveKind::Int) {
            return Err(cpp_error(format!(
                "`{function_name}` has a non-`int` parameter or return type; this executor only calls all-`int` C++ functions"
            )));
        }
        if signature.params.len() != args.len() {
            return Err(cpp_error(format!(
                "`{function_name}` takes {} argument(s), got {}",
                signature.params.len(),
                args.len()
            )));
        }

        let library = self
            .libraries
            .get(block_id)
            .ok_or_else(|| cpp_error(format!("block `{block_id}` has not been loaded")))?;

        let mut marshaller = Marshaller::new(CppCodec, MarshalLimits::default());
        let mut native_args = Vec::with_capacity(args.len());
        for arg in &args {
            native_args.push(marshaller.marshal_in(arg)?);
        }

        let result = unsafe { call_native(library, function_name, &native_args) }?;
        marshaller.marshal_out(result)
    }
}

/// Resolve `function_name` in `library` and invoke it with `args`, both cast
/// through the one arity/type combination this executor supports: 0-4
/// `int` parameters returning `int`.
///
/// # Safety
/// The caller has already checked, via [`signature::find_signature`], that
/// the block's source declares `function_name` with exactly this arity and
/// these primitive kinds. If the compiled object's actual ABI disagrees
/// with what the text scan found — e.g. the block redeclares the function
/// under `extern "C"` with a different signature the scanner didn't see —
/// this cast is unsound. `naab-exec-cpp` accepts that risk as the cost of
/// not running a real C++ front end; see `signature.rs`'s module doc.
unsafe fn call_native(library: &Library, function_name: &str, args: &[i32]) -> Result<i32, Error> {
    let name = function_name.as_bytes();
    match args.len() {
        0 => {
            let func: libloading::Symbol<unsafe extern "C" fn() -> i32> =
                library.get(name).map_err(|e| cpp_error(e.to_string()))?;
            Ok(func())
        }
        1 => {
            let func: libloading::Symbol<unsafe extern "C" fn(i32) -> i32> =
                library.get(name).map_err(|e| cpp_error(e.to_string()))?;
            Ok(func(args[0]))
        }
        2 => {
            let func: libloading::Symbol<unsafe extern "C" fn(i32, i32) -> i32> =
                library.get(name).map_err(|e| cpp_error(e.to_string()))?;
            Ok(func(args[0], args[1]))
        }
        3 => {
            let func: libloading::Symbol<unsafe extern "C" fn(i32, i32, i32) -> i32> =
                library.get(name).map_err(|e| cpp_error(e.to_string()))?;
            Ok(func(args[0], args[1], args[2]))
        }
        4 => {
            let func: libloading::Symbol<unsafe extern "C" fn(i32, i32, i32, i32) -> i32> =
                library.get(name).map_err(|e| cpp_error(e.to_string()))?;
            Ok(func(args[0], args[1], args[2], args[3]))
        }
        n => Err(cpp_error(format!("C++ functions with {n} arguments are not supported"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, source: &str) -> BlockRecord {
        BlockRecord {
            id: id.into(),
            name: id.into(),
            language: naab_core::Language::Cpp,
            source: source.to_string(),
            category: "math".to_string(),
            validation_status: naab_core::ValidationStatus::Unvalidated,
        }
    }

    #[test]
    fn call_function_rejects_an_unloaded_block() {
        let mut exec = CppExecutor::new(std::env::temp_dir().join("naab-exec-cpp-test-unloaded"));
        let err = exec.call_function("BLOCK-CPP-MATH", "add", vec![Value::Int(1), Value::Int(2)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Compile);
    }

    #[test]
    fn call_function_rejects_a_non_int_signature_without_compiling() {
        // Exercises the signature gate directly, independent of a real
        // toolchain: seed `sources`/`libraries` by hand rather than going
        // through `load_block`, since the harness running these tests may
        // not have a C++ toolchain on PATH.
        let mut exec = CppExecutor::new(std::env::temp_dir().join("naab-exec-cpp-test-nonint"));
        exec.sources.insert("BLOCK-CPP-GREET".to_string(), "double pi() { return 3.14159; }".to_string());
        let err = exec.call_function("BLOCK-CPP-GREET", "pi", vec![]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Compile);
        assert!(err.message.contains("non-`int`"));
    }

    #[test]
    fn call_function_rejects_an_arity_mismatch() {
        let mut exec = CppExecutor::new(std::env::temp_dir().join("naab-exec-cpp-test-arity"));
        exec.sources.insert("BLOCK-CPP-MATH".to_string(), "int add(int a, int b) { return a + b; }".to_string());
        let err = exec.call_function("BLOCK-CPP-MATH", "add", vec![Value::Int(1)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Compile);
        assert!(err.message.contains("argument"));
    }

    #[test]
    fn record_builder_is_well_formed() {
        let r = record("BLOCK-CPP-MATH", "int add(int a, int b) { return a + b; }");
        assert_eq!(r.id.as_str(), "BLOCK-CPP-MATH");
    }
}
