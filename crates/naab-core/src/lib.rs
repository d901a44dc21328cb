//! # naab-core
//!
//! Host-language front end and tree-walking interpreter for **NAAb**, a
//! polyglot block-assembly language: a host script declares structs,
//! enums, and functions, `use`s content-addressed blocks of compiled C++
//! or embedded JS/Python, and weaves them together with ordinary control
//! flow, generics, and a pipeline operator.
//!
//! This crate owns everything that can be decided without ever running a
//! foreign-language compiler or interpreter: lexing, parsing, static
//! analysis, the value model, the cycle collector, and the tree-walking
//! evaluator. It never links against libclang, QuickJS, or CPython
//! itself — those live behind the [`exec::Executor`]/[`exec::BlockStore`]
//! seam, implemented by the sibling `naab-registry`/`naab-exec-cpp`/
//! `naab-exec-js`/`naab-exec-py` crates.
//!
//! ```ignore
//! use naab_core::{parse, Analyzer, Interpreter, InterpreterOptions};
//! use std::rc::Rc;
//!
//! let source = "main { print(\"hello\") }";
//! let program = parse(source, Rc::from("main.naab")).map_err(|errs| format!("{errs:?}"))?;
//! let analysis = Analyzer::analyze(&program);
//! assert!(analysis.errors.is_empty());
//!
//! let mut interp = Interpreter::new(InterpreterOptions::default());
//! interp.run(&program)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod analyzer;
mod ast;
mod env;
mod error;
mod exec;
mod gc;
mod immutable_string;
mod interp;
mod parse;
mod token;
mod value;

pub use analyzer::{AnalysisResult, Analyzer, Diagnostic, Severity};
pub use ast::{
    BinaryOp, Block, CatchClause, Decl, EnumDecl, EnumVariant, Expr, ExprKind, FunctionDecl,
    InlineCodeExpr, Literal, Param, Program, ShortVec, SourceLocation, Stmt, StmtKind,
    StructDecl, StructField, StructLiteralField, TypeExpr, UnaryOp, UseDecl, UseTarget,
};
pub use env::{Environment, ScopeId};
pub use error::{Error, ErrorKind, StackFrame};
pub use exec::{BlockRecord, BlockStore, Executor, ValidationStatus};
pub use gc::{Gc, GcStats};
pub use immutable_string::ImmutableString;
pub use interp::{Interpreter, InterpreterOptions};
pub use parse::{parse, ParseError};
pub use token::{is_block_id, tokenize, LexError, Position, Token, TokenKind};
pub use value::{
    BlockFunctionHandle, BlockHandle, EnumVariantValue, FieldMap, ForeignObject, FunctionValue,
    GcCell, GcHandle, GcPayload, Language, StructInstance, Value,
};
