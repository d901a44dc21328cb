//! The tree-walking interpreter (`spec.md` §4.4).
//!
//! One `eval_*`/`exec_*` function per AST node kind, mirroring the shape of
//! the teacher's `engine.rs` (a visit routine per node kind, a child
//! environment per call/compound statement, a recursion-depth guard). Where
//! the teacher threads `EvalAltResult::Return`/`Break`/`LoopBreak` out of
//! `eval_stmt` as a distinguished error variant rather than a side boolean,
//! this interpreter does the same with [`Flow`].

use crate::ast::*;
use crate::env::{Environment, ScopeId};
use crate::error::{Error, ErrorKind, StackFrame};
use crate::exec::{BlockStore, Executor};
use crate::gc::Gc;
use crate::value::{
    BlockFunctionHandle, BlockHandle, FieldMap, FunctionValue, GcPayload, Language,
    StructInstance, Value,
};
use ahash::AHashMap;
use std::process::Command;
use std::rc::Rc;

/// Tunables `spec.md` §9/§2.1 calls out as configuration, not code.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InterpreterOptions {
    pub max_call_depth: usize,
    pub gc_allocation_threshold: usize,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            max_call_depth: 10_000,
            gc_allocation_threshold: 10_000,
        }
    }
}

/// A non-local control transfer distinct from an ordinary `Result::Err`: a
/// `return`, `break`, or `continue` must pass through enclosing `try`/
/// `finally` and loop frames without being mistaken for a thrown exception,
/// the same separation the teacher's engine draws between
/// `EvalAltResult::Return`/`LoopBreak` and a real evaluation error.
enum Flow {
    Return(Value),
    Break,
    Continue,
    Throw(Error),
}

impl From<Error> for Flow {
    fn from(e: Error) -> Self {
        Self::Throw(e)
    }
}

type EvalResult<T> = Result<T, Flow>;

type PrintCallback = Box<dyn FnMut(&str)>;

/// Executes a fully analyzed [`Program`]. Owns the environment arena, the
/// cycle collector, the global declaration tables, and the registered
/// per-language executors.
pub struct Interpreter {
    env: Environment,
    globals: ScopeId,
    gc: Gc,
    options: InterpreterOptions,
    call_depth: usize,
    functions: AHashMap<String, Rc<FunctionDecl>>,
    structs: AHashMap<String, Rc<StructDecl>>,
    enums: AHashMap<String, Rc<EnumDecl>>,
    monomorphizations: std::collections::HashSet<(String, Vec<String>)>,
    block_store: Option<Box<dyn BlockStore>>,
    executors: AHashMap<Language, Box<dyn Executor>>,
    on_print: PrintCallback,
}

impl Interpreter {
    #[must_use]
    pub fn new(options: InterpreterOptions) -> Self {
        let env = Environment::new();
        let globals = env.root();
        Self {
            env,
            globals,
            gc: Gc::new(options.gc_allocation_threshold),
            options,
            call_depth: 0,
            functions: AHashMap::new(),
            structs: AHashMap::new(),
            enums: AHashMap::new(),
            monomorphizations: std::collections::HashSet::new(),
            block_store: None,
            executors: AHashMap::new(),
            on_print: Box::new(|s| println!("{s}")),
        }
    }

    pub fn set_block_store(&mut self, store: Box<dyn BlockStore>) {
        self.block_store = Some(store);
    }

    pub fn register_executor(&mut self, language: Language, executor: Box<dyn Executor>) {
        self.executors.insert(language, executor);
    }

    pub fn set_print_callback(&mut self, cb: PrintCallback) {
        self.on_print = cb;
    }

    #[must_use]
    pub fn monomorphization_count(&self, function_name: &str) -> usize {
        self.monomorphizations.iter().filter(|(name, _)| name.as_str() == function_name).count()
    }

    /// Run every declaration in `program`, then execute `main`. Mirrors
    /// `spec.md` §4.2's "program := (use | import | struct | enum |
    /// function | main)*": declarations are order-independent (collected in
    /// one pass before anything runs), only `main`'s body actually executes.
    pub fn run(&mut self, program: &Program) -> Result<(), Error> {
        let span = tracing::debug_span!("interp.run");
        let _enter = span.enter();

        let mut main_block: Option<&Block> = None;
        for decl in &program.decls {
            match decl {
                Decl::Function(f) => {
                    self.functions.insert(f.name.clone(), Rc::new(f.clone()));
                }
                Decl::Struct(s) => {
                    self.structs.insert(s.name.clone(), Rc::new(s.clone()));
                }
                Decl::Enum(e) => {
                    self.enums.insert(e.name.clone(), Rc::new(e.clone()));
                }
                Decl::Use(u) => self.exec_use(u)?,
                Decl::Main(block) => main_block = Some(block),
            }
        }

        let Some(block) = main_block else {
            return Ok(());
        };
        let scope = self.env.push_child(self.globals);
        match self.exec_block(block, scope) {
            Ok(()) | Err(Flow::Return(_)) => Ok(()),
            Err(Flow::Throw(e)) => Err(e),
            Err(Flow::Break) | Err(Flow::Continue) => Err(Error::new(
                ErrorKind::Runtime,
                "'break'/'continue' used outside of a loop",
                SourceLocation::synthetic(Rc::from("<main>")),
            )),
        }
    }

    fn exec_use(&mut self, decl: &UseDecl) -> Result<(), Error> {
        match &decl.target {
            UseTarget::Block { id, alias } => {
                tracing::debug!(block_id = %id, alias = %alias, "loading block");
                if !crate::token::is_block_id(id) {
                    return Err(Error::new(
                        ErrorKind::Syntax,
                        format!("'{id}' is not a well-formed block id"),
                        decl.location.clone(),
                    ));
                }
                let Some(store) = self.block_store.as_ref() else {
                    return Err(Error::new(
                        ErrorKind::BlockNotFound,
                        format!("no block store is configured; cannot resolve '{id}'"),
                        decl.location.clone(),
                    ));
                };
                let record = store.lookup(id).ok_or_else(|| {
                    Error::new(ErrorKind::BlockNotFound, format!("unknown block id '{id}'"), decl.location.clone())
                })?;
                let language = record.language;
                let executor = self.executors.get_mut(&language).ok_or_else(|| {
                    Error::new(
                        ErrorKind::Runtime,
                        format!("no executor registered for language '{}'", language.name()),
                        decl.location.clone(),
                    )
                })?;
                executor.load_block(&record)?;
                let handle = Value::Block(Rc::new(BlockHandle { id: id.as_str().into(), language }));
                self.env.declare(self.globals, alias.clone(), handle);
                Ok(())
            }
            UseTarget::Module { path, alias } => {
                // No module loader is wired into naab-core (multi-file
                // resolution is a driver concern — see DESIGN.md). The
                // alias is recognized syntactically; referencing it later
                // fails with NameError the same as any unbound identifier.
                tracing::warn!(path = %path.join("."), alias = %alias, "module import has no resolver configured");
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------ blocks --

    fn exec_block(&mut self, block: &Block, scope: ScopeId) -> EvalResult<()> {
        for stmt in &block.stmts {
            self.exec_stmt(stmt, scope)?;
        }
        Ok(())
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: ScopeId) -> EvalResult<()> {
        match &stmt.kind {
            StmtKind::Let { name, ty, value } => {
                let v = match value {
                    Some(e) => self.eval_expr(e, scope)?,
                    None => Value::Null,
                };
                if let Some(ty) = ty {
                    self.check_value_against_type(ty, &v, &AHashMap::new(), &stmt.location, &format!("'let {name}'"))?;
                }
                self.track_if_aggregate(&v);
                self.env.declare(scope, name.clone(), v);
                self.maybe_collect(scope);
                Ok(())
            }
            StmtKind::Expr(e) => {
                self.eval_expr(e, scope)?;
                Ok(())
            }
            StmtKind::Return(e) => {
                let v = match e {
                    Some(e) => self.eval_expr(e, scope)?,
                    None => Value::Null,
                };
                Err(Flow::Return(v))
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                if self.eval_expr(cond, scope)?.is_truthy() {
                    self.exec_in_child_scope(then_branch, scope)
                } else if let Some(else_branch) = else_branch {
                    self.exec_in_child_scope(else_branch, scope)
                } else {
                    Ok(())
                }
            }
            StmtKind::While { cond, body } => {
                while self.eval_expr(cond, scope)?.is_truthy() {
                    match self.exec_in_child_scope(body, scope) {
                        Ok(()) => {}
                        Err(Flow::Break) => break,
                        Err(Flow::Continue) => continue,
                        other => return other,
                    }
                    self.maybe_collect(scope);
                }
                Ok(())
            }
            StmtKind::For { binding, iterable, body } => {
                let iter_value = self.eval_expr(iterable, scope)?;
                let items = self.iterate(&iter_value, &stmt.location)?;
                for item in items {
                    let child = self.env.push_child(scope);
                    self.env.declare(child, binding.clone(), item);
                    let result = self.exec_block(body, child);
                    self.env.pop_scope(child);
                    match result {
                        Ok(()) => {}
                        Err(Flow::Break) => break,
                        Err(Flow::Continue) => continue,
                        other => return other,
                    }
                    self.maybe_collect(scope);
                }
                Ok(())
            }
            StmtKind::Try { body, catch, finally } => self.exec_try(body, catch.as_ref(), finally.as_ref(), scope),
            StmtKind::Throw(e) => {
                let v = self.eval_expr(e, scope)?;
                Err(Flow::Throw(self.wrap_thrown(v, &stmt.location)))
            }
            StmtKind::Break => Err(Flow::Break),
            StmtKind::Continue => Err(Flow::Continue),
            StmtKind::Compound(block) => self.exec_in_child_scope(block, scope),
        }
    }

    /// Implements the state machine in `spec.md` §4.4: `Entering -> InTry ->
    /// {InCatch?} -> InFinally -> Exiting-{Normal,Exceptional}`. A throw from
    /// `finally` supersedes whatever was pending from `try`/`catch`.
    fn exec_try(
        &mut self,
        body: &Block,
        catch: Option<&CatchClause>,
        finally: Option<&Block>,
        scope: ScopeId,
    ) -> EvalResult<()> {
        let try_scope = self.env.push_child(scope);
        let result = self.exec_block(body, try_scope);
        self.env.pop_scope(try_scope);

        let outcome = match result {
            Err(Flow::Throw(err)) => {
                if let Some(catch) = catch {
                    let catch_scope = self.env.push_child(scope);
                    self.env.declare(catch_scope, catch.binding.clone(), Value::Error(Rc::new(err)));
                    let result = self.exec_block(&catch.body, catch_scope);
                    self.env.pop_scope(catch_scope);
                    result
                } else {
                    Err(Flow::Throw(err))
                }
            }
            other => other,
        };

        if let Some(finally) = finally {
            let finally_scope = self.env.push_child(scope);
            let result = self.exec_block(finally, finally_scope);
            self.env.pop_scope(finally_scope);
            if let Err(flow) = result {
                return Err(flow);
            }
        }

        outcome
    }

    /// Run `block` in a fresh child of `parent`, freeing the child scope
    /// again before returning — whether `block` finished, broke, continued,
    /// returned, or threw. `spec.md` §5: "exit from that scope ... releases
    /// it."
    fn exec_in_child_scope(&mut self, block: &Block, parent: ScopeId) -> EvalResult<()> {
        let child = self.env.push_child(parent);
        let result = self.exec_block(block, child);
        self.env.pop_scope(child);
        result
    }

    fn wrap_thrown(&self, value: Value, location: &SourceLocation) -> Error {
        match value {
            Value::Error(e) => (*e).clone(),
            Value::String(s) => Error::new(ErrorKind::Runtime, s.as_str().to_string(), location.clone()).with_payload(Value::String(s)),
            other => {
                let message = other.display();
                Error::new(ErrorKind::Runtime, message, location.clone()).with_payload(other)
            }
        }
    }

    fn iterate(&mut self, value: &Value, location: &SourceLocation) -> EvalResult<Vec<Value>> {
        match value {
            Value::List(h) => match &*h.payload.borrow() {
                GcPayload::List(items) => Ok(items.clone()),
                _ => unreachable!(),
            },
            Value::Dict(h) => match &*h.payload.borrow() {
                GcPayload::Dict(entries) => {
                    Ok(entries.keys().map(|k| Value::String(k.clone())).collect())
                }
                _ => unreachable!(),
            },
            other => Err(Flow::Throw(Error::new(
                ErrorKind::Type,
                format!("'{}' is not iterable", other.type_name()),
                location.clone(),
            ))),
        }
    }

    // -------------------------------------------------------- expressions -

    fn eval_expr(&mut self, expr: &Expr, scope: ScopeId) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(self.eval_literal(lit)),
            ExprKind::Identifier(name) => self.resolve_identifier(name, scope, &expr.location),
            ExprKind::Member { target, field } => {
                let target_value = self.eval_expr(target, scope)?;
                self.eval_member(&target_value, field, &expr.location)
            }
            ExprKind::Index { target, index } => {
                let target_value = self.eval_expr(target, scope)?;
                let index_value = self.eval_expr(index, scope)?;
                self.eval_index(&target_value, &index_value, &expr.location)
            }
            ExprKind::Call { callee, type_args, args } => self.eval_call(callee, type_args, args, scope, &expr.location),
            ExprKind::Unary { op, operand } => {
                let v = self.eval_expr(operand, scope)?;
                self.eval_unary(*op, v, &expr.location)
            }
            // `&&`/`||` short-circuit using Rust's own lazy `&&`/`||`, the
            // same idiom the teacher's engine relies on for `Expr::And`/
            // `Expr::Or` — the right operand's `eval_expr` call is simply
            // never reached once the left side already decides the result.
            ExprKind::Binary { op: BinaryOp::And, left, right } => {
                Ok(Value::Bool(self.eval_expr(left, scope)?.is_truthy() && self.eval_expr(right, scope)?.is_truthy()))
            }
            ExprKind::Binary { op: BinaryOp::Or, left, right } => {
                Ok(Value::Bool(self.eval_expr(left, scope)?.is_truthy() || self.eval_expr(right, scope)?.is_truthy()))
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.eval_expr(left, scope)?;
                let r = self.eval_expr(right, scope)?;
                self.eval_binary(*op, l, r, &expr.location)
            }
            ExprKind::Pipeline { value, call } => self.eval_pipeline(value, call, scope, &expr.location),
            ExprKind::StructLiteral { module, name, fields } => {
                self.eval_struct_literal(module.as_deref(), name, fields, scope, &expr.location)
            }
            ExprKind::ListLiteral(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, scope)?);
                }
                let v = Value::new_list(values);
                self.track_if_aggregate(&v);
                Ok(v)
            }
            ExprKind::DictLiteral(entries) => {
                let mut map = FieldMap::default();
                for (key_expr, value_expr) in entries {
                    let key = self.eval_expr(key_expr, scope)?;
                    let key_str = match key {
                        Value::String(s) => s,
                        other => {
                            return Err(Flow::Throw(Error::new(
                                ErrorKind::Type,
                                format!("dict keys must be strings, found '{}'", other.type_name()),
                                expr.location.clone(),
                            )))
                        }
                    };
                    let v = self.eval_expr(value_expr, scope)?;
                    map.insert(key_str, v);
                }
                let v = Value::new_dict(map);
                self.track_if_aggregate(&v);
                Ok(v)
            }
            ExprKind::Assign { target, value } => {
                let v = self.eval_expr(value, scope)?;
                self.eval_assign(target, v, scope)
            }
            ExprKind::InlineCode(inline) => self.eval_inline_code(inline, scope, &expr.location),
        }
    }

    fn eval_literal(&self, lit: &Literal) -> Value {
        match lit {
            Literal::Null => Value::Null,
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::String(s) => Value::String(s.as_str().into()),
        }
    }

    fn resolve_identifier(&self, name: &str, scope: ScopeId, location: &SourceLocation) -> EvalResult<Value> {
        if let Some(v) = self.env.get(scope, name) {
            return Ok(v);
        }
        if let Some(decl) = self.functions.get(name) {
            return Ok(Value::Function(Rc::new(FunctionValue { decl: decl.clone(), closure_scope: self.globals })));
        }
        Err(Flow::Throw(Error::new(
            ErrorKind::Name,
            format!("undefined name '{name}'"),
            location.clone(),
        )))
    }

    fn eval_member(&self, target: &Value, field: &str, location: &SourceLocation) -> EvalResult<Value> {
        match target {
            Value::Struct(h) => match &*h.payload.borrow() {
                GcPayload::Struct(inst) => inst
                    .fields
                    .iter()
                    .find(|(k, _)| k.as_str() == field)
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| {
                        Flow::Throw(Error::new(ErrorKind::Name, format!("'{}' has no field '{field}'", inst.type_name), location.clone()))
                    }),
                _ => unreachable!(),
            },
            Value::EnumVariant(v) => {
                if field == "tag" {
                    Ok(Value::String(v.tag.clone()))
                } else if field == "payload" {
                    Ok(v.payload.clone().unwrap_or(Value::Null))
                } else {
                    Err(Flow::Throw(Error::new(
                        ErrorKind::Name,
                        format!("enum variant has no field '{field}'"),
                        location.clone(),
                    )))
                }
            }
            Value::Block(handle) => Ok(Value::BlockFunction(Rc::new(BlockFunctionHandle {
                block_id: handle.id.clone(),
                function_name: field.into(),
                language: handle.language,
            }))),
            Value::Dict(h) => match &*h.payload.borrow() {
                GcPayload::Dict(entries) => entries
                    .iter()
                    .find(|(k, _)| k.as_str() == field)
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| Flow::Throw(Error::new(ErrorKind::Name, format!("dict has no key '{field}'"), location.clone()))),
                _ => unreachable!(),
            },
            other => Err(Flow::Throw(Error::new(
                ErrorKind::Type,
                format!("cannot access field '{field}' on a value of type '{}'", other.type_name()),
                location.clone(),
            ))),
        }
    }

    fn eval_index(&self, target: &Value, index: &Value, location: &SourceLocation) -> EvalResult<Value> {
        match (target, index) {
            (Value::List(h), Value::Int(i)) => match &*h.payload.borrow() {
                GcPayload::List(items) => {
                    let idx = usize::try_from(*i).ok().filter(|i| *i < items.len());
                    idx.map(|i| items[i].clone()).ok_or_else(|| {
                        Flow::Throw(Error::new(ErrorKind::Runtime, format!("list index {i} out of bounds"), location.clone()))
                    })
                }
                _ => unreachable!(),
            },
            (Value::Dict(h), Value::String(key)) => match &*h.payload.borrow() {
                GcPayload::Dict(entries) => entries.get(key).cloned().ok_or_else(|| {
                    Flow::Throw(Error::new(ErrorKind::Name, format!("dict has no key '{key}'"), location.clone()))
                }),
                _ => unreachable!(),
            },
            (other, _) => Err(Flow::Throw(Error::new(
                ErrorKind::Type,
                format!("cannot index into a value of type '{}'", other.type_name()),
                location.clone(),
            ))),
        }
    }

    fn eval_assign(&mut self, target: &Expr, value: Value, scope: ScopeId) -> EvalResult<Value> {
        match &target.kind {
            ExprKind::Identifier(name) => {
                if !self.env.assign(scope, name, value.clone()) {
                    return Err(Flow::Throw(Error::new(
                        ErrorKind::Name,
                        format!("cannot assign to undeclared name '{name}'"),
                        target.location.clone(),
                    )));
                }
                Ok(value)
            }
            ExprKind::Member { target: base, field } => {
                let base_value = self.eval_expr(base, scope)?;
                match &base_value {
                    Value::Struct(h) => {
                        if let GcPayload::Struct(inst) = &mut *h.payload.borrow_mut() {
                            inst.fields.insert(field.as_str().into(), value.clone());
                            return Ok(value);
                        }
                        unreachable!()
                    }
                    Value::Dict(h) => {
                        if let GcPayload::Dict(entries) = &mut *h.payload.borrow_mut() {
                            entries.insert(field.as_str().into(), value.clone());
                            return Ok(value);
                        }
                        unreachable!()
                    }
                    other => Err(Flow::Throw(Error::new(
                        ErrorKind::Type,
                        format!("cannot assign a field on a value of type '{}'", other.type_name()),
                        target.location.clone(),
                    ))),
                }
            }
            ExprKind::Index { target: base, index } => {
                let base_value = self.eval_expr(base, scope)?;
                let index_value = self.eval_expr(index, scope)?;
                match (&base_value, &index_value) {
                    (Value::List(h), Value::Int(i)) => {
                        if let GcPayload::List(items) = &mut *h.payload.borrow_mut() {
                            let idx = usize::try_from(*i).ok().filter(|i| *i < items.len());
                            match idx {
                                Some(idx) => {
                                    items[idx] = value.clone();
                                    Ok(value)
                                }
                                None => Err(Flow::Throw(Error::new(
                                    ErrorKind::Runtime,
                                    format!("list index {i} out of bounds"),
                                    target.location.clone(),
                                ))),
                            }
                        } else {
                            unreachable!()
                        }
                    }
                    (Value::Dict(h), Value::String(key)) => {
                        if let GcPayload::Dict(entries) = &mut *h.payload.borrow_mut() {
                            entries.insert(key.clone(), value.clone());
                            Ok(value)
                        } else {
                            unreachable!()
                        }
                    }
                    (other, _) => Err(Flow::Throw(Error::new(
                        ErrorKind::Type,
                        format!("cannot index-assign into a value of type '{}'", other.type_name()),
                        target.location.clone(),
                    ))),
                }
            }
            _ => Err(Flow::Throw(Error::new(
                ErrorKind::Syntax,
                "invalid assignment target",
                target.location.clone(),
            ))),
        }
    }

    fn eval_unary(&self, op: UnaryOp, v: Value, location: &SourceLocation) -> EvalResult<Value> {
        match (op, &v) {
            (UnaryOp::Not, _) => Ok(Value::Bool(!v.is_truthy())),
            (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(-i)),
            (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
            (UnaryOp::Neg, other) => Err(Flow::Throw(Error::new(
                ErrorKind::Type,
                format!("cannot negate a value of type '{}'", other.type_name()),
                location.clone(),
            ))),
        }
    }

    /// `And`/`Or` never reach here — `eval_expr`'s `Binary` arm special-cases
    /// them to short-circuit before either operand is evaluated.
    fn eval_binary(&self, op: BinaryOp, l: Value, r: Value, location: &SourceLocation) -> EvalResult<Value> {
        use BinaryOp::*;
        match op {
            Eq => return Ok(Value::Bool(l.values_equal(&r))),
            NotEq => return Ok(Value::Bool(!l.values_equal(&r))),
            _ => {}
        }

        match (op, &l, &r) {
            (Add, Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}").into())),
            (Add, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            (Add, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
            (Add, Value::Int(a), Value::Float(b)) | (Add, Value::Float(b), Value::Int(a)) => Ok(Value::Float(*a as f64 + b)),
            (Sub, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
            (Sub, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a - b)),
            (Mul, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
            (Mul, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a * b)),
            (Div, Value::Int(_), Value::Int(0)) => Err(Flow::Throw(Error::new(ErrorKind::Runtime, "division by zero", location.clone()))),
            (Div, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a / b)),
            (Div, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a / b)),
            (Mod, Value::Int(_), Value::Int(0)) => Err(Flow::Throw(Error::new(ErrorKind::Runtime, "division by zero", location.clone()))),
            (Mod, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a % b)),
            (Lt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a < b)),
            (LtEq, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a <= b)),
            (Gt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a > b)),
            (GtEq, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a >= b)),
            (Lt, Value::Float(a), Value::Float(b)) => Ok(Value::Bool(a < b)),
            (LtEq, Value::Float(a), Value::Float(b)) => Ok(Value::Bool(a <= b)),
            (Gt, Value::Float(a), Value::Float(b)) => Ok(Value::Bool(a > b)),
            (GtEq, Value::Float(a), Value::Float(b)) => Ok(Value::Bool(a >= b)),
            (Lt, Value::String(a), Value::String(b)) => Ok(Value::Bool(a.as_str() < b.as_str())),
            (LtEq, Value::String(a), Value::String(b)) => Ok(Value::Bool(a.as_str() <= b.as_str())),
            (Gt, Value::String(a), Value::String(b)) => Ok(Value::Bool(a.as_str() > b.as_str())),
            (GtEq, Value::String(a), Value::String(b)) => Ok(Value::Bool(a.as_str() >= b.as_str())),
            _ => Err(Flow::Throw(Error::new(
                ErrorKind::Type,
                format!("operator not defined for '{}' and '{}'", l.type_name(), r.type_name()),
                location.clone(),
            ))),
        }
    }

    /// `x |> f` is sugar for `f(x)`; `x |> f(a, b)` for `f(x, a, b)`
    /// (`spec.md` §4.4).
    fn eval_pipeline(&mut self, value: &Expr, call: &Expr, scope: ScopeId, location: &SourceLocation) -> EvalResult<Value> {
        let piped = self.eval_expr(value, scope)?;
        match &call.kind {
            ExprKind::Call { callee, type_args, args } => {
                let callee_value = self.eval_expr(callee, scope)?;
                let mut arg_values = vec![piped];
                for arg in args {
                    arg_values.push(self.eval_expr(arg, scope)?);
                }
                self.invoke(callee_value, type_args, arg_values, location)
            }
            ExprKind::Identifier(_) => {
                let callee_value = self.eval_expr(call, scope)?;
                self.invoke(callee_value, &ShortVec::<TypeExpr>::new(), vec![piped], location)
            }
            _ => Err(Flow::Throw(Error::new(
                ErrorKind::Syntax,
                "the right-hand side of '|>' must be a call or a callable name",
                location.clone(),
            ))),
        }
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        type_args: &ShortVec<TypeExpr>,
        args: &[Expr],
        scope: ScopeId,
        location: &SourceLocation,
    ) -> EvalResult<Value> {
        if let ExprKind::Identifier(name) = &callee.kind {
            if let Some(v) = self.eval_intrinsic(name, args, scope, location)? {
                return Ok(v);
            }
        }
        let callee_value = self.eval_expr(callee, scope)?;
        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.eval_expr(arg, scope)?);
        }
        self.invoke(callee_value, type_args, arg_values, location)
    }

    /// `print`/`debug` are fixed interpreter intrinsics rather than package
    /// functions (`spec.md` §4.4 supplement — NAAb has no package
    /// registration surface in this core). Returns `None` when `name` is
    /// not an intrinsic so the caller falls through to ordinary resolution.
    fn eval_intrinsic(
        &mut self,
        name: &str,
        args: &[Expr],
        scope: ScopeId,
        _location: &SourceLocation,
    ) -> EvalResult<Option<Value>> {
        match name {
            "print" | "debug" if self.env.get(scope, name).is_none() && !self.functions.contains_key(name) => {
                let mut parts = Vec::with_capacity(args.len());
                for arg in args {
                    parts.push(self.eval_expr(arg, scope)?.display());
                }
                (self.on_print)(&parts.join(" "));
                Ok(Some(Value::Null))
            }
            "len" if self.env.get(scope, name).is_none() && !self.functions.contains_key(name) => {
                if args.len() != 1 {
                    return Ok(None);
                }
                let v = self.eval_expr(&args[0], scope)?;
                let n = match &v {
                    Value::String(s) => s.as_str().chars().count(),
                    Value::List(h) => match &*h.payload.borrow() {
                        GcPayload::List(items) => items.len(),
                        _ => unreachable!(),
                    },
                    Value::Dict(h) => match &*h.payload.borrow() {
                        GcPayload::Dict(entries) => entries.len(),
                        _ => unreachable!(),
                    },
                    other => {
                        return Err(Flow::Throw(Error::new(
                            ErrorKind::Type,
                            format!("'{}' has no length", other.type_name()),
                            args[0].location.clone(),
                        )))
                    }
                };
                Ok(Some(Value::Int(n as i64)))
            }
            _ => Ok(None),
        }
    }

    fn invoke(&mut self, callee: Value, type_args: &[TypeExpr], args: Vec<Value>, location: &SourceLocation) -> EvalResult<Value> {
        match callee {
            Value::Function(f) => self.call_user_function(&f.decl, f.closure_scope, type_args, args, location),
            Value::BlockFunction(handle) => {
                let executor = self.executors.get_mut(&handle.language).ok_or_else(|| {
                    Flow::Throw(Error::new(
                        ErrorKind::Runtime,
                        format!("no executor registered for language '{}'", handle.language.name()),
                        location.clone(),
                    ))
                })?;
                executor
                    .call_function(&handle.block_id, &handle.function_name, args)
                    .map_err(Flow::Throw)
            }
            other => Err(Flow::Throw(Error::new(
                ErrorKind::Type,
                format!("'{}' is not callable", other.type_name()),
                location.clone(),
            ))),
        }
    }

    /// Evaluate arguments left to right (already done by the caller), build
    /// a child of the function's *captured* environment (true closures),
    /// bind parameters (defaults fill omitted trailing arguments), validate
    /// types, push a frame, run the body, pop the frame on every exit path.
    fn call_user_function(
        &mut self,
        decl: &Rc<FunctionDecl>,
        closure_scope: ScopeId,
        type_args: &[TypeExpr],
        args: Vec<Value>,
        call_location: &SourceLocation,
    ) -> EvalResult<Value> {
        self.call_depth += 1;
        if self.call_depth > self.options.max_call_depth {
            self.call_depth -= 1;
            return Err(Flow::Throw(Error::new(
                ErrorKind::CycleLimit,
                format!("maximum call depth ({}) exceeded", self.options.max_call_depth),
                call_location.clone(),
            )));
        }

        let span = tracing::debug_span!("interp.call", function = %decl.name, depth = self.call_depth);
        let _enter = span.enter();

        let generics = self.bind_generics(decl, type_args, &args, call_location);
        let generics = match generics {
            Ok(g) => g,
            Err(e) => {
                self.call_depth -= 1;
                return Err(e);
            }
        };
        if !decl.generics.is_empty() {
            let key = decl.generics.iter().map(|g| format!("{:?}", generics.get(g))).collect();
            self.monomorphizations.insert((decl.name.clone(), key));
        }

        let scope = self.env.push_child(closure_scope);
        if let Err(e) = self.bind_params(decl, &generics, args, scope, call_location) {
            self.call_depth -= 1;
            self.env.pop_scope(scope);
            return Err(e);
        }

        let result = self.exec_block(&decl.body, scope);
        self.call_depth -= 1;
        self.env.pop_scope(scope);

        match result {
            Ok(()) => Ok(Value::Null),
            Err(Flow::Return(v)) => {
                if let Some(ret_ty) = &decl.return_ty {
                    self.check_value_against_type(
                        ret_ty,
                        &v,
                        &generics,
                        &decl.location,
                        &format!("return value of '{}'", decl.name),
                    )
                    .map_err(|e| match e {
                        Flow::Throw(err) => Flow::Throw(err),
                        other => other,
                    })?;
                }
                Ok(v)
            }
            Err(Flow::Throw(mut e)) => {
                e.push_frame(StackFrame { function_name: decl.name.clone(), location: decl.location.clone() });
                Err(Flow::Throw(e))
            }
            Err(Flow::Break) | Err(Flow::Continue) => Err(Flow::Throw(Error::new(
                ErrorKind::Runtime,
                "'break'/'continue' escaped the enclosing function",
                decl.location.clone(),
            ))),
        }
    }

    fn bind_params(
        &mut self,
        decl: &FunctionDecl,
        generics: &AHashMap<String, TypeExpr>,
        mut args: Vec<Value>,
        scope: ScopeId,
        call_location: &SourceLocation,
    ) -> EvalResult<()> {
        for (i, param) in decl.params.iter().enumerate() {
            let value = if i < args.len() {
                std::mem::replace(&mut args[i], Value::Null)
            } else if let Some(default) = &param.default {
                self.eval_expr(default, scope)?
            } else {
                return Err(Flow::Throw(Error::new(
                    ErrorKind::Runtime,
                    format!("missing required argument '{}' to '{}'", param.name, decl.name),
                    call_location.clone(),
                )));
            };
            if let Some(ty) = &param.ty {
                self.check_value_against_type(ty, &value, generics, call_location, &format!("parameter '{}'", param.name))?;
            }
            self.env.declare(scope, param.name.clone(), value);
        }
        Ok(())
    }

    /// Infers each generic parameter from the corresponding argument's
    /// runtime type when the call omits an explicit `<T, ...>` list
    /// (`spec.md` §4.4, scenario 6). Nested inference is limited to
    /// `list<T>`/`dict<_, T>` parameters — enough to materialize
    /// `identity<T>` without building a full unifier.
    fn bind_generics(
        &mut self,
        decl: &FunctionDecl,
        type_args: &[TypeExpr],
        args: &[Value],
        call_location: &SourceLocation,
    ) -> EvalResult<AHashMap<String, TypeExpr>> {
        let mut map = AHashMap::new();
        if decl.generics.is_empty() {
            return Ok(map);
        }
        if !type_args.is_empty() {
            for (name, ty) in decl.generics.iter().zip(type_args.iter()) {
                map.insert(name.clone(), ty.clone());
            }
            return Ok(map);
        }
        for (param, value) in decl.params.iter().zip(args.iter()) {
            if let Some(ty) = &param.ty {
                infer_generic(ty, value, &mut map);
            }
        }
        for name in &decl.generics {
            if !map.contains_key(name) {
                return Err(Flow::Throw(Error::new(
                    ErrorKind::Type,
                    format!("cannot infer generic parameter '{name}' for '{}'", decl.name),
                    call_location.clone(),
                )));
            }
        }
        Ok(map)
    }

    fn eval_struct_literal(
        &mut self,
        module: Option<&str>,
        name: &str,
        fields: &[StructLiteralField],
        scope: ScopeId,
        location: &SourceLocation,
    ) -> EvalResult<Value> {
        if module.is_some() {
            return Err(Flow::Throw(Error::new(
                ErrorKind::Name,
                format!("module-qualified type '{name}' cannot be resolved (no module loader configured)"),
                location.clone(),
            )));
        }
        let decl = self.structs.get(name).cloned().ok_or_else(|| {
            Flow::Throw(Error::new(ErrorKind::Name, format!("undefined struct '{name}'"), location.clone()))
        })?;

        let mut provided = AHashMap::new();
        for f in fields {
            if !decl.fields.iter().any(|df| df.name == f.name) {
                return Err(Flow::Throw(Error::new(
                    ErrorKind::Type,
                    format!("'{name}' has no field '{}'", f.name),
                    f.value.location.clone(),
                )));
            }
            let v = self.eval_expr(&f.value, scope)?;
            provided.insert(f.name.clone(), v);
        }

        let mut field_map = FieldMap::default();
        for field_decl in &decl.fields {
            let value = if let Some(v) = provided.remove(&field_decl.name) {
                v
            } else if let Some(default) = &field_decl.default {
                self.eval_expr(default, scope)?
            } else {
                return Err(Flow::Throw(Error::new(
                    ErrorKind::Runtime,
                    format!("missing required field '{}' for '{name}'", field_decl.name),
                    location.clone(),
                )));
            };
            self.check_value_against_type(&field_decl.ty, &value, &AHashMap::new(), location, &format!("field '{}'", field_decl.name))?;
            field_map.insert(field_decl.name.as_str().into(), value);
        }

        let v = Value::new_struct(StructInstance { type_name: name.into(), fields: field_map });
        self.track_if_aggregate(&v);
        Ok(v)
    }

    fn eval_inline_code(&mut self, inline: &InlineCodeExpr, scope: ScopeId, location: &SourceLocation) -> EvalResult<Value> {
        let mut bindings = Vec::with_capacity(inline.bindings.len());
        for name in &inline.bindings {
            let v = self.env.get(scope, name).ok_or_else(|| {
                Flow::Throw(Error::new(ErrorKind::Name, format!("undefined name '{name}' in inline-code bindings"), location.clone()))
            })?;
            bindings.push((name.clone(), v));
        }

        let Some(language) = Language::from_inline_tag(&inline.language) else {
            return Err(Flow::Throw(Error::new(
                ErrorKind::Syntax,
                format!("unknown inline-code language '{}'", inline.language),
                location.clone(),
            )));
        };

        if language == Language::Shell {
            return self.eval_shell_inline(&inline.body, location);
        }

        let executor = self.executors.get_mut(&language).ok_or_else(|| {
            Flow::Throw(Error::new(
                ErrorKind::Runtime,
                format!("no executor registered for language '{}'", language.name()),
                location.clone(),
            ))
        })?;
        executor.eval_inline(&inline.body, &bindings).map_err(|e| {
            Flow::Throw(Error::new(
                ErrorKind::Runtime,
                format!("inline {} code failed: {}", language.name(), e.message),
                location.clone(),
            ))
        })
    }

    /// `spec.md` §6: a shell inline block evaluates to `{exit_code, stdout,
    /// stderr}`. This is the one inline language with no satellite
    /// executor crate — shelling out is the entire "runtime".
    fn eval_shell_inline(&self, body: &str, location: &SourceLocation) -> EvalResult<Value> {
        let output = Command::new("sh").arg("-c").arg(body).output().map_err(|e| {
            Flow::Throw(Error::new(ErrorKind::Runtime, format!("failed to spawn shell: {e}"), location.clone()))
        })?;
        let mut fields = FieldMap::default();
        fields.insert("exit_code".into(), Value::Int(output.status.code().unwrap_or(-1) as i64));
        fields.insert("stdout".into(), Value::String(String::from_utf8_lossy(&output.stdout).into_owned().into()));
        fields.insert("stderr".into(), Value::String(String::from_utf8_lossy(&output.stderr).into_owned().into()));
        Ok(Value::new_struct(StructInstance { type_name: "ShellResult".into(), fields }))
    }

    // --------------------------------------------------------- type checks -

    fn check_value_against_type(
        &self,
        ty: &TypeExpr,
        value: &Value,
        generics: &AHashMap<String, TypeExpr>,
        location: &SourceLocation,
        what: &str,
    ) -> EvalResult<()> {
        let resolved = resolve_generic(ty, generics);
        if value.is_null() {
            if resolved.is_nullable() {
                return Ok(());
            }
            return Err(Flow::Throw(Error::new(
                ErrorKind::NullSafety,
                format!("null is not assignable to non-nullable type in {what}"),
                location.clone(),
            )));
        }
        if value_matches_type(value, &resolved, &self.structs, &self.enums) {
            Ok(())
        } else {
            Err(Flow::Throw(Error::new(
                ErrorKind::Type,
                format!("type mismatch in {what}: expected {}, found '{}'", describe_type(&resolved), value.type_name()),
                location.clone(),
            )))
        }
    }

    // ------------------------------------------------------------- misc ---

    fn track_if_aggregate(&self, value: &Value) {
        if matches!(value, Value::List(_) | Value::Dict(_) | Value::Struct(_)) {
            self.gc.track(value);
        }
    }

    fn maybe_collect(&mut self, active_scope: ScopeId) {
        if self.gc.should_collect() {
            let reclaimed = self.gc.collect(&self.env, &[active_scope, self.globals]);
            if reclaimed > 0 {
                tracing::debug!(reclaimed, "cycle collector reclaimed garbage");
            }
        }
    }
}

fn infer_generic(param_ty: &TypeExpr, value: &Value, map: &mut AHashMap<String, TypeExpr>) {
    match param_ty {
        TypeExpr::GenericParam(name) => {
            map.entry(name.clone()).or_insert_with(|| runtime_type_of(value));
        }
        TypeExpr::List(inner) => {
            if let Value::List(h) = value {
                if let GcPayload::List(items) = &*h.payload.borrow() {
                    if let Some(first) = items.first() {
                        infer_generic(inner, first, map);
                    }
                }
            }
        }
        TypeExpr::Dict(_, value_ty) => {
            if let Value::Dict(h) = value {
                if let GcPayload::Dict(entries) = &*h.payload.borrow() {
                    if let Some((_, first)) = entries.iter().next() {
                        infer_generic(value_ty, first, map);
                    }
                }
            }
        }
        TypeExpr::Nullable(inner) => infer_generic(inner, value, map),
        _ => {}
    }
}

fn runtime_type_of(value: &Value) -> TypeExpr {
    match value {
        Value::Null => TypeExpr::Any,
        Value::Int(_) => TypeExpr::Int,
        Value::Float(_) => TypeExpr::Float,
        Value::Bool(_) => TypeExpr::Bool,
        Value::String(_) => TypeExpr::String,
        Value::Struct(h) => match &*h.payload.borrow() {
            GcPayload::Struct(inst) => {
                TypeExpr::Named { module: None, name: inst.type_name.as_str().to_string(), type_args: Vec::new() }
            }
            _ => TypeExpr::Any,
        },
        Value::EnumVariant(v) => TypeExpr::Named { module: None, name: v.enum_name.as_str().to_string(), type_args: Vec::new() },
        _ => TypeExpr::Any,
    }
}

fn resolve_generic(ty: &TypeExpr, generics: &AHashMap<String, TypeExpr>) -> TypeExpr {
    match ty {
        TypeExpr::GenericParam(name) => generics.get(name).cloned().unwrap_or(TypeExpr::Any),
        TypeExpr::List(inner) => TypeExpr::List(Box::new(resolve_generic(inner, generics))),
        TypeExpr::Dict(k, v) => TypeExpr::Dict(Box::new(resolve_generic(k, generics)), Box::new(resolve_generic(v, generics))),
        TypeExpr::Union(a, b) => TypeExpr::Union(Box::new(resolve_generic(a, generics)), Box::new(resolve_generic(b, generics))),
        TypeExpr::Nullable(inner) => TypeExpr::Nullable(Box::new(resolve_generic(inner, generics))),
        other => other.clone(),
    }
}

fn value_matches_type(
    value: &Value,
    ty: &TypeExpr,
    structs: &AHashMap<String, Rc<StructDecl>>,
    enums: &AHashMap<String, Rc<EnumDecl>>,
) -> bool {
    let _ = (structs, enums);
    match ty {
        TypeExpr::Any => true,
        TypeExpr::Void => value.is_null(),
        TypeExpr::Int => matches!(value, Value::Int(_)),
        TypeExpr::Float => matches!(value, Value::Float(_) | Value::Int(_)),
        TypeExpr::Bool => matches!(value, Value::Bool(_)),
        TypeExpr::String => matches!(value, Value::String(_)),
        TypeExpr::List(_) => matches!(value, Value::List(_)),
        TypeExpr::Dict(_, _) => matches!(value, Value::Dict(_)),
        TypeExpr::Function { .. } => matches!(value, Value::Function(_) | Value::BlockFunction(_)),
        TypeExpr::Named { name, .. } => match value {
            Value::Struct(h) => matches!(&*h.payload.borrow(), GcPayload::Struct(inst) if inst.type_name.as_str() == name.as_str()),
            Value::EnumVariant(v) => v.enum_name.as_str() == name.as_str(),
            _ => false,
        },
        TypeExpr::Union(a, b) => value_matches_type(value, a, structs, enums) || value_matches_type(value, b, structs, enums),
        TypeExpr::Nullable(inner) => value.is_null() || value_matches_type(value, inner, structs, enums),
        TypeExpr::GenericParam(_) => true,
    }
}

fn describe_type(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Any => "any".into(),
        TypeExpr::Void => "void".into(),
        TypeExpr::Int => "int".into(),
        TypeExpr::Float => "float".into(),
        TypeExpr::Bool => "bool".into(),
        TypeExpr::String => "string".into(),
        TypeExpr::List(t) => format!("list<{}>", describe_type(t)),
        TypeExpr::Dict(k, v) => format!("dict<{}, {}>", describe_type(k), describe_type(v)),
        TypeExpr::Named { name, .. } => name.clone(),
        TypeExpr::Function { .. } => "function".into(),
        TypeExpr::Union(a, b) => format!("{} | {}", describe_type(a), describe_type(b)),
        TypeExpr::Nullable(inner) => format!("{}?", describe_type(inner)),
        TypeExpr::GenericParam(name) => name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;
    use std::cell::RefCell;
    use std::rc::Rc as StdRc;

    fn run_captured(src: &str) -> (Result<(), Error>, Vec<String>) {
        let program = parse(src, StdRc::from("t.naab")).unwrap_or_else(|e| panic!("{e:?}"));
        let mut interp = Interpreter::new(InterpreterOptions::default());
        let captured = StdRc::new(RefCell::new(Vec::new()));
        let sink = captured.clone();
        interp.set_print_callback(Box::new(move |s| sink.borrow_mut().push(s.to_string())));
        let result = interp.run(&program);
        let lines = captured.borrow().clone();
        (result, lines)
    }

    #[test]
    fn let_then_print_prints_the_value() {
        let (result, lines) = run_captured("main { let x = 42 print(x) }");
        assert!(result.is_ok());
        assert_eq!(lines, vec!["42".to_string()]);
    }

    #[test]
    fn null_into_non_nullable_let_raises_null_safety_error() {
        let (result, _) = run_captured("main { let y: int = null }");
        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NullSafety);
    }

    #[test]
    fn infinite_recursion_raises_cycle_limit_error() {
        let (result, _) = run_captured("fn f() { f() } main { f() }");
        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::CycleLimit);
        assert!(err.frames.len() >= InterpreterOptions::default().max_call_depth);
    }

    #[test]
    fn generic_identity_infers_type_and_materializes_once_per_type() {
        let program = parse(
            "fn identity<T>(x: T) -> T { return x } main { let a = identity(42) let b = identity(\"hi\") print(a) print(b) }",
            StdRc::from("t.naab"),
        )
        .unwrap();
        let mut interp = Interpreter::new(InterpreterOptions::default());
        let captured = StdRc::new(RefCell::new(Vec::new()));
        let sink = captured.clone();
        interp.set_print_callback(Box::new(move |s| sink.borrow_mut().push(s.to_string())));
        interp.run(&program).unwrap();
        assert_eq!(*captured.borrow(), vec!["42".to_string(), "hi".to_string()]);
        assert_eq!(interp.monomorphization_count("identity"), 2);
    }

    #[test]
    fn pipeline_desugars_to_nested_call() {
        let (result, lines) = run_captured("fn inc(x: int) -> int { return x + 1 } main { print(1 |> inc()) }");
        assert!(result.is_ok());
        assert_eq!(lines, vec!["2".to_string()]);
    }

    #[test]
    fn and_short_circuits_without_evaluating_the_right_operand() {
        let (result, lines) = run_captured("main { if false && (1 / 0 == 1) { print(\"unreachable\") } else { print(\"ok\") } }");
        assert!(result.is_ok());
        assert_eq!(lines, vec!["ok".to_string()]);
    }

    #[test]
    fn or_short_circuits_without_evaluating_the_right_operand() {
        let (result, lines) = run_captured("main { if true || (1 / 0 == 1) { print(\"ok\") } else { print(\"unreachable\") } }");
        assert!(result.is_ok());
        assert_eq!(lines, vec!["ok".to_string()]);
    }

    #[test]
    fn try_catch_finally_runs_in_documented_order() {
        let (result, lines) = run_captured(
            "main {\n\
                try {\n\
                    print(\"A\")\n\
                    throw \"boom\"\n\
                } catch (e) {\n\
                    print(\"B\")\n\
                } finally {\n\
                    print(\"C\")\n\
                }\n\
            }",
        );
        assert!(result.is_ok());
        assert_eq!(lines, vec!["A".to_string(), "B".to_string(), "C".to_string()]);
    }

    #[test]
    fn struct_literal_fills_defaults_and_preserves_field_order() {
        let (result, lines) = run_captured(
            "struct Point { x: int, y: int = 0 }\n\
             main { let p = new Point { x: 5 } print(p.x) print(p.y) }",
        );
        assert!(result.is_ok());
        assert_eq!(lines, vec!["5".to_string(), "0".to_string()]);
    }

    #[test]
    fn shell_inline_code_returns_exit_code_and_stdout() {
        let (result, lines) = run_captured("main { let r = <<sh[] echo hello >> print(r.exit_code) print(r.stdout) }");
        assert!(result.is_ok());
        assert_eq!(lines, vec!["0".to_string(), "hello\n".to_string()]);
    }
}
