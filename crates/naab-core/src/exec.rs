//! The seam between the interpreter and the per-language runtimes
//! (`spec.md` §4.6/§4.7, design note in §9 "Foreign runtime handles").
//!
//! `naab-core` never links against libclang, QuickJS, or CPython itself —
//! those live behind these two traits in `naab-registry`/`naab-exec-cpp`/
//! `naab-exec-js`/`naab-exec-py`. The interpreter holds only `Box<dyn
//! Executor>` per [`Language`] and a `Box<dyn BlockStore>`; it never
//! downcasts to a concrete executor type, matching the "opaque reference"
//! design note.

use crate::ast::SourceLocation;
use crate::error::{Error, ErrorKind};
use crate::immutable_string::ImmutableString;
use crate::value::{Language, Value};
use std::rc::Rc;

/// Whether a block's source has been checked against the registry's own
/// validation pipeline. The core never performs this validation itself —
/// it only reads the verdict a store already computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationStatus {
    Unvalidated,
    Valid,
    Invalid(String),
}

/// `spec.md` §3 "Block record", minus the store-specific storage details
/// (those live behind [`BlockStore`], not in this shape).
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRecord {
    pub id: ImmutableString,
    pub name: ImmutableString,
    pub language: Language,
    pub source: String,
    pub category: String,
    pub validation_status: ValidationStatus,
}

/// `lookup`/`iterate_all` from `spec.md` §6. The concrete store (database,
/// file tree, HTTP service) is an external collaborator; this core only
/// names the shape it consumes.
pub trait BlockStore {
    fn lookup(&self, id: &str) -> Option<BlockRecord>;

    /// Default returns nothing — most interpreter embeddings resolve blocks
    /// by id on demand and never need a full enumeration.
    fn iterate_all(&self) -> Vec<BlockRecord> {
        Vec::new()
    }
}

/// The capability set `spec.md` §9 licenses for a foreign runtime:
/// `{init, load_block, call_function, drop}`. `drop` is deliberately not a
/// trait method here — Rust's own `Drop` impl on the concrete executor type
/// covers it, the same way the teacher's `fn_native.rs` callables rely on
/// ordinary `Drop` rather than a manual teardown method.
pub trait Executor {
    fn init(&mut self) -> Result<(), Error>;

    /// Make `record`'s functions callable. For the C++ executor this is
    /// where first-call compilation happens (`spec.md` §4.7); for JS/Python
    /// it is where the block source is evaluated into a fresh global/module
    /// namespace.
    fn load_block(&mut self, record: &BlockRecord) -> Result<(), Error>;

    fn call_function(&mut self, block_id: &str, function_name: &str, args: Vec<Value>) -> Result<Value, Error>;

    /// Evaluate an `<<lang[...] body >>` inline-code expression (`spec.md`
    /// §6). Not every executor need support this — an executor that only
    /// ever backs `use`d blocks (no inline form registered for its
    /// language) can leave this at the default.
    fn eval_inline(&mut self, body: &str, bindings: &[(String, Value)]) -> Result<Value, Error> {
        let _ = bindings;
        let _ = body;
        Err(Error::new(
            ErrorKind::Runtime,
            "this executor does not support inline-code expressions",
            SourceLocation::synthetic(Rc::from("<inline-code>")),
        ))
    }
}
