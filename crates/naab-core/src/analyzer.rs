//! The semantic analyzer (`spec.md` §4.3): symbol tables, scope resolution,
//! duplicate-declaration/type-case/nullability checks, and fuzzy-match
//! "did you mean" suggestions for unresolved names.
//!
//! Grounded in the teacher pack's `rhai-hir` crate, which analyzes Rhai
//! source over an arena of scopes rather than walking raw tokens: its
//! `crates/rhai-hir/src/hir/query/scope_iter.rs` resolves an unresolved
//! reference by scanning every name visible from the reference's scope and
//! picking the closest one under `strsim::normalized_damerau_levenshtein`.
//! This analyzer borrows that shape but works directly over the `ast`
//! module (NAAb has no rowan-style lossless syntax tree to build a HIR on
//! top of).

use crate::ast::{
    Block, Decl, EnumDecl, Expr, ExprKind, FunctionDecl, Literal, Program, SourceLocation, Stmt,
    StmtKind, StructDecl, TypeExpr, UseDecl, UseTarget,
};
use crate::error::{Error, ErrorKind};
use ahash::{AHashMap, AHashSet};

const SUGGESTION_MAX_DISTANCE: usize = 2;

/// Every type name the parser recognizes by exact lowercase spelling
/// (`parse.rs::parse_type_primary`), not by a distinct token kind.
const BUILTIN_TYPE_NAMES: &[&str] = &["int", "float", "bool", "string", "void", "any", "list", "dict"];

fn is_pascal_case(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: SourceLocation,
}

/// Result of analyzing one program: hard errors block execution; warnings
/// are collected but never stop it. `spec.md` §4.3 leaves surfacing
/// warnings to the driver, so both lists are returned rather than one
/// being silently dropped.
#[derive(Debug, Default)]
pub struct AnalysisResult {
    pub errors: Vec<Error>,
    pub warnings: Vec<Diagnostic>,
}

impl AnalysisResult {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolKind {
    Struct,
    Enum,
    Function,
    BlockAlias,
    Variable,
    Param,
}

#[derive(Debug, Clone)]
struct Symbol {
    kind: SymbolKind,
    declared_at: SourceLocation,
    used: bool,
}

/// One lexical scope of the analyzer's own symbol table. This mirrors
/// `Environment` at the source level (names, not runtime values) but is a
/// separate structure: the analyzer runs once, statically, before any
/// `ScopeId` exists.
#[derive(Default)]
struct Scope {
    symbols: AHashMap<String, Symbol>,
}

pub struct Analyzer {
    /// Global names: top-level functions, structs, enums, block aliases.
    globals: AHashMap<String, Symbol>,
    scopes: Vec<Scope>,
    errors: Vec<Error>,
    warnings: Vec<Diagnostic>,
}

impl Analyzer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            globals: AHashMap::new(),
            scopes: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn analyze(program: &Program) -> AnalysisResult {
        let mut analyzer = Self::new();
        analyzer.collect_globals(program);
        for decl in &program.decls {
            analyzer.check_decl(decl);
        }
        AnalysisResult {
            errors: analyzer.errors,
            warnings: analyzer.warnings,
        }
    }

    // -------------------------------------------------------- globals ---

    fn collect_globals(&mut self, program: &Program) {
        for decl in &program.decls {
            let (name, kind, location) = match decl {
                Decl::Function(f) => (f.name.clone(), SymbolKind::Function, f.location.clone()),
                Decl::Struct(s) => (s.name.clone(), SymbolKind::Struct, s.location.clone()),
                Decl::Enum(e) => (e.name.clone(), SymbolKind::Enum, e.location.clone()),
                Decl::Use(u) => match &u.target {
                    UseTarget::Block { alias, .. } | UseTarget::Module { alias, .. } => {
                        (alias.clone(), SymbolKind::BlockAlias, u.location.clone())
                    }
                },
                Decl::Main(_) => continue,
            };
            self.declare_global(name, kind, location);
        }
    }

    fn declare_global(&mut self, name: String, kind: SymbolKind, location: SourceLocation) {
        if let Some(existing) = self.globals.get(&name) {
            self.errors.push(Error::new(
                ErrorKind::Name,
                format!(
                    "'{name}' is already declared at {}",
                    existing.declared_at
                ),
                location,
            ));
            return;
        }
        self.globals.insert(
            name,
            Symbol {
                kind,
                declared_at: location,
                used: false,
            },
        );
    }

    // ------------------------------------------------------------ decls --

    fn check_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Function(f) => self.check_function(f),
            Decl::Struct(s) => self.check_struct(s),
            Decl::Enum(e) => self.check_enum(e),
            Decl::Use(u) => self.check_use(u),
            Decl::Main(body) => {
                self.push_scope();
                self.check_block(body);
                self.pop_scope();
            }
        }
    }

    fn check_use(&mut self, use_decl: &UseDecl) {
        if let UseTarget::Block { id, .. } = &use_decl.target {
            if !crate::token::is_block_id(id) {
                self.errors.push(Error::new(
                    ErrorKind::Syntax,
                    format!("'{id}' is not a well-formed BLOCK-<LANG>-<ID> identifier"),
                    use_decl.location.clone(),
                ));
            }
        }
    }

    fn check_function(&mut self, decl: &FunctionDecl) {
        self.push_scope();
        for g in &decl.generics {
            self.declare_local(g.clone(), SymbolKind::Param, decl.location.clone());
        }
        let mut seen_params = AHashSet::default();
        for param in &decl.params {
            if !seen_params.insert(param.name.clone()) {
                self.errors.push(Error::new(
                    ErrorKind::Name,
                    format!("duplicate parameter '{}'", param.name),
                    decl.location.clone(),
                ));
            }
            if let Some(ty) = &param.ty {
                self.check_type(ty, &decl.location);
                if let Some(default) = &param.default {
                    self.check_nullability_of_initializer(ty, default, &decl.location, "parameter");
                }
            }
            self.declare_local(param.name.clone(), SymbolKind::Param, decl.location.clone());
        }
        if let Some(ret) = &decl.return_ty {
            self.check_type(ret, &decl.location);
        }
        self.check_block(&decl.body);
        self.pop_scope();
    }

    fn check_struct(&mut self, decl: &StructDecl) {
        let mut seen = AHashSet::default();
        for field in &decl.fields {
            if !seen.insert(field.name.clone()) {
                self.errors.push(Error::new(
                    ErrorKind::Name,
                    format!("duplicate field '{}' in struct '{}'", field.name, decl.name),
                    decl.location.clone(),
                ));
            }
            self.check_type(&field.ty, &decl.location);
            if let Some(default) = &field.default {
                self.check_nullability_of_initializer(&field.ty, default, &decl.location, "field");
            }
        }
    }

    fn check_enum(&mut self, decl: &EnumDecl) {
        let mut seen = AHashSet::default();
        for variant in &decl.variants {
            if !seen.insert(variant.tag.clone()) {
                self.errors.push(Error::new(
                    ErrorKind::Name,
                    format!("duplicate variant '{}' in enum '{}'", variant.tag, decl.name),
                    decl.location.clone(),
                ));
            }
            if let Some(ty) = &variant.payload_ty {
                self.check_type(ty, &decl.location);
            }
        }
    }

    // --------------------------------------------------------- statements -

    fn check_block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Let { name, ty, value } => {
                if let Some(value) = value {
                    self.check_expr(value);
                } else if ty.is_none() {
                    self.errors.push(Error::new(
                        ErrorKind::Type,
                        format!("'{name}' needs either a type annotation or an initializer"),
                        stmt.location.clone(),
                    ));
                }
                if let Some(ty) = ty {
                    self.check_type(ty, &stmt.location);
                    if let Some(value) = value {
                        self.check_nullability_of_initializer(ty, value, &stmt.location, "let");
                    }
                } else if matches!(value.as_ref().map(|v| &v.kind), Some(ExprKind::Literal(Literal::Null))) {
                    self.errors.push(Error::new(
                        ErrorKind::Type,
                        format!("'let {name} = null' needs an explicit nullable type annotation"),
                        stmt.location.clone(),
                    ));
                }
                self.declare_local(name.clone(), SymbolKind::Variable, stmt.location.clone());
            }
            StmtKind::Return(expr) => {
                if let Some(expr) = expr {
                    self.check_expr(expr);
                }
            }
            StmtKind::Expr(expr) => self.check_expr(expr),
            StmtKind::If { cond, then_branch, else_branch } => {
                self.check_expr(cond);
                self.push_scope();
                self.check_block(then_branch);
                self.pop_scope();
                if let Some(else_branch) = else_branch {
                    self.push_scope();
                    self.check_block(else_branch);
                    self.pop_scope();
                }
            }
            StmtKind::While { cond, body } => {
                self.check_expr(cond);
                self.push_scope();
                self.check_block(body);
                self.pop_scope();
            }
            StmtKind::For { binding, iterable, body } => {
                self.check_expr(iterable);
                self.push_scope();
                self.declare_local(binding.clone(), SymbolKind::Variable, stmt.location.clone());
                self.check_block(body);
                self.pop_scope();
            }
            StmtKind::Try { body, catch, finally } => {
                self.push_scope();
                self.check_block(body);
                self.pop_scope();
                if let Some(catch) = catch {
                    self.push_scope();
                    self.declare_local(catch.binding.clone(), SymbolKind::Variable, stmt.location.clone());
                    self.check_block(&catch.body);
                    self.pop_scope();
                }
                if let Some(finally) = finally {
                    self.push_scope();
                    self.check_block(finally);
                    self.pop_scope();
                }
            }
            StmtKind::Throw(expr) => self.check_expr(expr),
            StmtKind::Break | StmtKind::Continue => {}
            StmtKind::Compound(block) => {
                self.push_scope();
                self.check_block(block);
                self.pop_scope();
            }
        }
    }

    // -------------------------------------------------------- expressions -

    fn check_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal(_) => {}
            ExprKind::Identifier(name) => self.resolve(name, &expr.location),
            ExprKind::Member { target, .. } => self.check_expr(target),
            ExprKind::Index { target, index } => {
                self.check_expr(target);
                self.check_expr(index);
            }
            ExprKind::Call { callee, args, .. } => {
                self.check_expr(callee);
                for arg in args {
                    self.check_expr(arg);
                }
            }
            ExprKind::Unary { operand, .. } => self.check_expr(operand),
            ExprKind::Binary { left, right, .. } => {
                self.check_expr(left);
                self.check_expr(right);
            }
            ExprKind::Pipeline { value, call } => {
                self.check_expr(value);
                self.check_expr(call);
            }
            ExprKind::StructLiteral { name, fields, .. } => {
                self.resolve_type_name(name, &expr.location);
                for field in fields {
                    self.check_expr(&field.value);
                }
            }
            ExprKind::ListLiteral(items) => items.iter().for_each(|e| self.check_expr(e)),
            ExprKind::DictLiteral(entries) => {
                for (k, v) in entries {
                    self.check_expr(k);
                    self.check_expr(v);
                }
            }
            ExprKind::Assign { target, value } => {
                self.check_expr(target);
                self.check_expr(value);
            }
            ExprKind::InlineCode(inline) => {
                for binding in &inline.bindings {
                    self.resolve(binding, &expr.location);
                }
            }
        }
    }

    // ------------------------------------------------------------- types --

    fn check_type(&mut self, ty: &TypeExpr, location: &SourceLocation) {
        match ty {
            TypeExpr::Named { name, type_args, .. } => {
                self.resolve_type_name(name, location);
                for arg in type_args {
                    self.check_type(arg, location);
                }
            }
            TypeExpr::List(inner) => self.check_type(inner, location),
            TypeExpr::Dict(k, v) => {
                self.check_type(k, location);
                self.check_type(v, location);
            }
            TypeExpr::Function { params, ret } => {
                for p in params {
                    self.check_type(p, location);
                }
                self.check_type(ret, location);
            }
            TypeExpr::Union(a, b) => {
                self.check_type(a, location);
                self.check_type(b, location);
            }
            TypeExpr::Nullable(inner) => self.check_type(inner, location),
            TypeExpr::Int
            | TypeExpr::Float
            | TypeExpr::Bool
            | TypeExpr::String
            | TypeExpr::Void
            | TypeExpr::Any
            | TypeExpr::GenericParam(_) => {}
        }
    }

    /// `spec.md` §4.3: "type names are strictly lowercase for built-ins;
    /// PascalCase for user types." Built-ins (`int`/`float`/`bool`/`string`
    /// plus the `void`/`any`/`list`/`dict` keywords) only ever reach here
    /// mis-cased — the parser matches their lowercase spelling directly
    /// (`parse.rs::parse_type_primary`), so e.g. `Int` never becomes
    /// `TypeExpr::Int`, it becomes a `Named` reference to a nonexistent
    /// type `Int`, which is exactly the case this check exists to name.
    fn resolve_type_name(&mut self, name: &str, location: &SourceLocation) {
        if BUILTIN_TYPE_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
            self.errors.push(Error::new(
                ErrorKind::Type,
                format!("built-in type `{name}` must be written in lowercase, as `{}`", name.to_ascii_lowercase()),
                location.clone(),
            ));
            return;
        }
        match self.globals.get_mut(name) {
            Some(sym) if matches!(sym.kind, SymbolKind::Struct | SymbolKind::Enum) => {
                sym.used = true;
                if !is_pascal_case(name) {
                    self.errors.push(Error::new(
                        ErrorKind::Type,
                        format!("user type `{name}` must be PascalCase"),
                        location.clone(),
                    ));
                }
            }
            _ => self.unresolved(name, location, "type"),
        }
    }

    /// Hard check for `spec.md`'s scenario 2: `let y: int = null` must fail
    /// before execution. This only catches a *literal* `null` initializer —
    /// the full dynamic flow-sensitive check (a value of static type `any`
    /// observed to be null at runtime) is the interpreter's job at the
    /// assignment/argument/return boundary, per §193.
    fn check_nullability_of_initializer(
        &mut self,
        ty: &TypeExpr,
        value: &Expr,
        location: &SourceLocation,
        context: &str,
    ) {
        if ty.is_nullable() {
            return;
        }
        if matches!(value.kind, ExprKind::Literal(Literal::Null)) {
            self.errors.push(Error::new(
                ErrorKind::NullSafety,
                format!("null cannot be assigned to non-nullable {context}"),
                location.clone(),
            ));
        }
    }

    // ------------------------------------------------------------- scopes -

    fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    fn declare_local(&mut self, name: String, kind: SymbolKind, location: SourceLocation) {
        let scope = self.scopes.last_mut().expect("push_scope called before declare_local");
        if scope.symbols.contains_key(&name) {
            self.errors.push(Error::new(
                ErrorKind::Name,
                format!("'{name}' is already declared in this scope"),
                location,
            ));
            return;
        }
        scope.symbols.insert(
            name,
            Symbol {
                kind,
                declared_at: location,
                used: false,
            },
        );
    }

    /// Pop the innermost scope, emitting unused-binding warnings for every
    /// local or parameter that was never resolved against. A leading `_`
    /// opts a name out, the same convention Rust itself uses.
    fn pop_scope(&mut self) {
        let scope = self.scopes.pop().expect("pop_scope without matching push_scope");
        for (name, symbol) in scope.symbols {
            if symbol.used || name.starts_with('_') {
                continue;
            }
            let what = match symbol.kind {
                SymbolKind::Param => "parameter",
                SymbolKind::Variable => "local",
                _ => continue,
            };
            self.warnings.push(Diagnostic {
                severity: Severity::Warning,
                message: format!("unused {what} '{name}'"),
                location: symbol.declared_at,
            });
        }
    }

    fn resolve(&mut self, name: &str, location: &SourceLocation) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(sym) = scope.symbols.get_mut(name) {
                sym.used = true;
                return;
            }
        }
        if let Some(sym) = self.globals.get_mut(name) {
            sym.used = true;
            return;
        }
        self.unresolved(name, location, "name");
    }

    fn unresolved(&mut self, name: &str, location: &SourceLocation, what: &str) {
        let suggestion = self.suggest(name);
        let message = match suggestion {
            Some(s) => format!("unresolved {what} '{name}' (did you mean '{s}'?)"),
            None => format!("unresolved {what} '{name}'"),
        };
        self.errors.push(Error::new(ErrorKind::Name, message, location.clone()));
    }

    /// Closest visible name under Damerau-Levenshtein distance, same
    /// technique and threshold as `rhai-hir`'s scope-iterator suggestions.
    fn suggest(&self, name: &str) -> Option<String> {
        let mut best: Option<(String, usize)> = None;
        let mut consider = |candidate: &str| {
            let dist = strsim::damerau_levenshtein(name, candidate);
            if dist == 0 || dist > SUGGESTION_MAX_DISTANCE {
                return;
            }
            let better = match &best {
                Some((_, best_dist)) => dist < *best_dist,
                None => true,
            };
            if better {
                best = Some((candidate.to_string(), dist));
            }
        };
        for scope in &self.scopes {
            for candidate in scope.symbols.keys() {
                consider(candidate);
            }
        }
        for candidate in self.globals.keys() {
            consider(candidate);
        }
        best.map(|(name, _)| name)
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Position;
    use std::rc::Rc;

    fn loc() -> SourceLocation {
        SourceLocation::new(Rc::from("t.naab"), Position::START)
    }

    fn ident(name: &str) -> Expr {
        Expr { kind: ExprKind::Identifier(name.into()), location: loc() }
    }

    #[test]
    fn unresolved_name_suggests_close_match() {
        let program = Program {
            decls: vec![Decl::Main(Block {
                stmts: vec![
                    Stmt {
                        kind: StmtKind::Let {
                            name: "count".into(),
                            ty: None,
                            value: Some(Expr {
                                kind: ExprKind::Literal(Literal::Int(1)),
                                location: loc(),
                            }),
                        },
                        location: loc(),
                    },
                    Stmt {
                        kind: StmtKind::Let {
                            name: "total".into(),
                            ty: None,
                            value: Some(ident("coutn")),
                        },
                        location: loc(),
                    },
                ],
            })],
        };
        let analysis = Analyzer::analyze(&program);
        assert!(analysis.errors.iter().any(|e| e.message.contains("did you mean 'count'")));
    }

    #[test]
    fn let_null_without_nullable_annotation_is_null_safety_error() {
        let program = Program {
            decls: vec![Decl::Main(Block {
                stmts: vec![Stmt {
                    kind: StmtKind::Let {
                        name: "y".into(),
                        ty: Some(TypeExpr::Int),
                        value: Some(Expr { kind: ExprKind::Literal(Literal::Null), location: loc() }),
                    },
                    location: loc(),
                }],
            })],
        };
        let analysis = Analyzer::analyze(&program);
        assert!(analysis.errors.iter().any(|e| e.kind == ErrorKind::NullSafety));
    }

    #[test]
    fn nullable_annotation_allows_null_initializer() {
        let program = Program {
            decls: vec![Decl::Main(Block {
                stmts: vec![Stmt {
                    kind: StmtKind::Let {
                        name: "y".into(),
                        ty: Some(TypeExpr::Int.nullable()),
                        value: Some(Expr { kind: ExprKind::Literal(Literal::Null), location: loc() }),
                    },
                    location: loc(),
                }],
            })],
        };
        let analysis = Analyzer::analyze(&program);
        assert!(analysis.is_ok());
    }

    #[test]
    fn mis_cased_builtin_type_reference_is_a_type_error() {
        let program = Program {
            decls: vec![Decl::Main(Block {
                stmts: vec![Stmt {
                    kind: StmtKind::Let {
                        name: "y".into(),
                        ty: Some(TypeExpr::Named { module: None, name: "Int".into(), type_args: Default::default() }),
                        value: Some(Expr { kind: ExprKind::Literal(Literal::Int(1)), location: loc() }),
                    },
                    location: loc(),
                }],
            })],
        };
        let analysis = Analyzer::analyze(&program);
        assert!(analysis.errors.iter().any(|e| e.kind == ErrorKind::Type && e.message.contains("lowercase")));
    }

    #[test]
    fn lowercase_reference_to_a_user_struct_is_a_type_error() {
        // The global table is keyed by spelling, not identity, so a struct
        // declared (and therefore referenced) under a lowercase name is the
        // case this check exists to catch — see the note on `resolve_type_name`.
        let s = StructDecl { name: "point".into(), generics: vec![], fields: vec![], location: loc() };
        let program = Program {
            decls: vec![
                Decl::Struct(s),
                Decl::Main(Block {
                    stmts: vec![Stmt {
                        kind: StmtKind::Let {
                            name: "p".into(),
                            ty: Some(TypeExpr::Named { module: None, name: "point".into(), type_args: Default::default() }),
                            value: Some(ident("p")),
                        },
                        location: loc(),
                    }],
                }),
            ],
        };
        let analysis = Analyzer::analyze(&program);
        assert!(analysis.errors.iter().any(|e| e.kind == ErrorKind::Type && e.message.contains("PascalCase")));
    }

    #[test]
    fn duplicate_global_declaration_is_an_error() {
        let f = FunctionDecl {
            name: "go".into(),
            generics: vec![],
            params: Default::default(),
            return_ty: None,
            body: Block::default(),
            location: loc(),
        };
        let program = Program {
            decls: vec![Decl::Function(f.clone()), Decl::Function(f)],
        };
        let analysis = Analyzer::analyze(&program);
        assert!(!analysis.is_ok());
    }

    #[test]
    fn unused_local_produces_warning_not_error() {
        let program = Program {
            decls: vec![Decl::Main(Block {
                stmts: vec![Stmt {
                    kind: StmtKind::Let {
                        name: "unread".into(),
                        ty: None,
                        value: Some(Expr { kind: ExprKind::Literal(Literal::Int(1)), location: loc() }),
                    },
                    location: loc(),
                }],
            })],
        };
        let analysis = Analyzer::analyze(&program);
        assert!(analysis.is_ok());
        assert!(analysis.warnings.iter().any(|w| w.message.contains("unused local 'unread'")));
    }
}
