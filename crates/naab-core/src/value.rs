//! The dynamic value universe (`spec.md` §3) as a tagged sum type.
//!
//! Per the design note in `spec.md` §9, `Value` is a plain `enum` — never a
//! heap base class with virtual dispatch — so the compiler can inline
//! dispatch at every boundary crossing, especially in the marshaller's hot
//! path. Mutable aggregates (list, dict, struct) share one reference-
//! counted cell type, [`GcCell`], so the cycle collector in [`crate::gc`]
//! has a single shape to walk instead of three.

use crate::ast::SourceLocation;
use crate::immutable_string::ImmutableString;
use crate::token::Position;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Which foreign runtime a block or foreign-object handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Cpp,
    JavaScript,
    Python,
    /// Not a block language (no `BLOCK-SH-...` form exists) — only reachable
    /// through `<<sh[...] ... >>` inline code, per `spec.md` §6.
    Shell,
}

impl Language {
    #[must_use]
    pub fn from_block_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "CPP" => Some(Self::Cpp),
            "JS" => Some(Self::JavaScript),
            "PY" => Some(Self::Python),
            _ => None,
        }
    }

    #[must_use]
    pub fn from_inline_tag(tag: &str) -> Option<Self> {
        match tag {
            "cpp" => Some(Self::Cpp),
            "javascript" | "js" => Some(Self::JavaScript),
            "python" | "py" => Some(Self::Python),
            "sh" | "shell" => Some(Self::Shell),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Cpp => "cpp",
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Shell => "shell",
        }
    }
}

/// A bound block alias produced by `use BLOCK-... as alias` (`spec.md`
/// §4.6). Carries no pointer into executor-internal memory — resolving
/// `alias.function_name` into a callable happens lazily at member-access
/// time, producing a [`BlockFunctionHandle`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockHandle {
    pub id: ImmutableString,
    pub language: Language,
}

/// Ordered field map shared by struct instances, keyed by field name in
/// declaration order so iteration and `spec.md`'s "insertion-ordered
/// fields" invariant hold without a separate name-order vector.
pub type FieldMap = IndexMap<ImmutableString, Value, ahash::RandomState>;

#[derive(Debug, Clone, PartialEq)]
pub struct StructInstance {
    pub type_name: ImmutableString,
    pub fields: FieldMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariantValue {
    pub enum_name: ImmutableString,
    pub tag: ImmutableString,
    pub payload: Option<Value>,
}

/// A user-defined closure: the declaring environment is captured by scope
/// id so free variables resolve through the normal environment chain
/// (`spec.md` §4.4 "true closures").
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionValue {
    pub decl: Rc<crate::ast::FunctionDecl>,
    pub closure_scope: crate::env::ScopeId,
}

/// A bound block function: `(block-id, fn-name, executor-tag)`, per
/// `spec.md` §3/§9. Deliberately holds no pointer into executor-internal
/// memory — the executor owns the code's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockFunctionHandle {
    pub block_id: ImmutableString,
    pub function_name: ImmutableString,
    pub language: Language,
}

/// An opaque foreign object (a Python `PyObject*`, a JS value handle, or a
/// C++ `void*`), identified by an executor-assigned token. The executor
/// that produced it is the only thing that can dereference the token; the
/// core never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignObject {
    pub type_name: ImmutableString,
    pub language: Language,
    pub handle: u64,
}

/// The payload behind every mutable, reference-counted [`Value`] variant.
/// Unified under one type so [`crate::gc`] can walk all three kinds with
/// one `Rc`/`Weak` bookkeeping scheme.
#[derive(Debug, PartialEq)]
pub enum GcPayload {
    List(Vec<Value>),
    Dict(IndexMap<ImmutableString, Value, ahash::RandomState>),
    Struct(StructInstance),
}

#[derive(Debug)]
pub struct GcCell {
    pub payload: RefCell<GcPayload>,
}

pub type GcHandle = Rc<GcCell>;

impl PartialEq for GcCell {
    /// Structural equality of the current snapshot. `Value::values_equal`
    /// is the operator NAAb programs actually observe; this impl only
    /// exists so `#[derive(PartialEq)]` on `Value` type-checks and so Rust
    /// tests can assert on `Value` directly.
    fn eq(&self, other: &Self) -> bool {
        *self.payload.borrow() == *other.payload.borrow()
    }
}

fn new_handle(payload: GcPayload) -> GcHandle {
    Rc::new(GcCell {
        payload: RefCell::new(payload),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    String(ImmutableString),
    List(GcHandle),
    Dict(GcHandle),
    Struct(GcHandle),
    EnumVariant(Rc<EnumVariantValue>),
    Function(Rc<FunctionValue>),
    Block(Rc<BlockHandle>),
    BlockFunction(Rc<BlockFunctionHandle>),
    Foreign(Rc<ForeignObject>),
    /// A thrown/uncaught error surfaced as a first-class value so `catch`
    /// can bind it (`spec.md` §3 "Error value").
    Error(Rc<crate::error::Error>),
}

impl Value {
    #[must_use]
    pub fn new_list(items: Vec<Value>) -> Self {
        Self::List(new_handle(GcPayload::List(items)))
    }

    #[must_use]
    pub fn new_dict(entries: FieldMap) -> Self {
        Self::Dict(new_handle(GcPayload::Dict(entries)))
    }

    #[must_use]
    pub fn new_struct(instance: StructInstance) -> Self {
        Self::Struct(new_handle(GcPayload::Struct(instance)))
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Struct(_) => "struct",
            Self::EnumVariant(_) => "enum",
            Self::Function(_) => "function",
            Self::Block(_) => "block",
            Self::BlockFunction(_) => "block-function",
            Self::Foreign(_) => "foreign",
            Self::Error(_) => "error",
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.as_str().is_empty(),
            _ => true,
        }
    }

    /// Structural equality used by `==`/`!=`. Aggregates compare by value,
    /// not identity, since `spec.md` makes no mention of reference
    /// equality semantics.
    #[must_use]
    pub fn values_equal(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            (Bool(a), Bool(b)) => a == b,
            (String(a), String(b)) => a == b,
            (List(a), List(b)) => {
                let (a, b) = (a.payload.borrow(), b.payload.borrow());
                match (&*a, &*b) {
                    (GcPayload::List(a), GcPayload::List(b)) => {
                        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.values_equal(y))
                    }
                    _ => false,
                }
            }
            (Dict(a), Dict(b)) => {
                let (a, b) = (a.payload.borrow(), b.payload.borrow());
                match (&*a, &*b) {
                    (GcPayload::Dict(a), GcPayload::Dict(b)) => {
                        a.len() == b.len()
                            && a.iter().all(|(k, v)| b.get(k).is_some_and(|bv| v.values_equal(bv)))
                    }
                    _ => false,
                }
            }
            (Struct(a), Struct(b)) => {
                let (a, b) = (a.payload.borrow(), b.payload.borrow());
                match (&*a, &*b) {
                    (GcPayload::Struct(a), GcPayload::Struct(b)) => {
                        a.type_name == b.type_name
                            && a.fields.len() == b.fields.len()
                            && a.fields
                                .iter()
                                .zip(b.fields.iter())
                                .all(|((k1, v1), (k2, v2))| k1 == k2 && v1.values_equal(v2))
                    }
                    _ => false,
                }
            }
            (EnumVariant(a), EnumVariant(b)) => {
                a.enum_name == b.enum_name
                    && a.tag == b.tag
                    && match (&a.payload, &b.payload) {
                        (Some(x), Some(y)) => x.values_equal(y),
                        (None, None) => true,
                        _ => false,
                    }
            }
            (Block(a), Block(b)) => a == b,
            (BlockFunction(a), BlockFunction(b)) => a == b,
            (Foreign(a), Foreign(b)) => a == b,
            _ => false,
        }
    }

    /// Best-effort `print`/`debug` rendering (not used for `==`).
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::String(s) => s.as_str().to_string(),
            Self::List(h) => match &*h.payload.borrow() {
                GcPayload::List(items) => {
                    let parts: Vec<String> = items.iter().map(Value::display).collect();
                    format!("[{}]", parts.join(", "))
                }
                _ => unreachable!("List handle must carry GcPayload::List"),
            },
            Self::Dict(h) => match &*h.payload.borrow() {
                GcPayload::Dict(entries) => {
                    let parts: Vec<String> =
                        entries.iter().map(|(k, v)| format!("{k}: {}", v.display())).collect();
                    format!("{{{}}}", parts.join(", "))
                }
                _ => unreachable!("Dict handle must carry GcPayload::Dict"),
            },
            Self::Struct(h) => match &*h.payload.borrow() {
                GcPayload::Struct(inst) => {
                    let parts: Vec<String> = inst
                        .fields
                        .iter()
                        .map(|(k, v)| format!("{k}: {}", v.display()))
                        .collect();
                    format!("{} {{ {} }}", inst.type_name, parts.join(", "))
                }
                _ => unreachable!("Struct handle must carry GcPayload::Struct"),
            },
            Self::EnumVariant(v) => match &v.payload {
                Some(p) => format!("{}::{}({})", v.enum_name, v.tag, p.display()),
                None => format!("{}::{}", v.enum_name, v.tag),
            },
            Self::Function(f) => format!("<function {}>", f.decl.name),
            Self::Block(b) => format!("<block {}>", b.id),
            Self::BlockFunction(b) => {
                format!("<block-function {}::{}>", b.block_id, b.function_name)
            }
            Self::Foreign(o) => format!("<foreign {} @{}>", o.type_name, o.handle),
            Self::Error(e) => format!("<error {}: {}>", e.kind.label(), e.message),
        }
    }

    /// Child values directly owned by this value, for the cycle collector's
    /// mark phase. Scalars and non-owning handles yield nothing.
    pub(crate) fn gc_children(&self) -> Vec<Value> {
        match self {
            Self::List(h) => match &*h.payload.borrow() {
                GcPayload::List(items) => items.clone(),
                _ => unreachable!(),
            },
            Self::Dict(h) => match &*h.payload.borrow() {
                GcPayload::Dict(entries) => entries.values().cloned().collect(),
                _ => unreachable!(),
            },
            Self::Struct(h) => match &*h.payload.borrow() {
                GcPayload::Struct(inst) => inst.fields.values().cloned().collect(),
                _ => unreachable!(),
            },
            Self::EnumVariant(v) => v.payload.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// The `Rc` pointer identity used by the cycle collector to dedup
    /// visits and to recognize "this object, wherever it's aliased from".
    pub(crate) fn gc_identity(&self) -> Option<usize> {
        match self {
            Self::List(h) | Self::Dict(h) | Self::Struct(h) => Some(Rc::as_ptr(h) as usize),
            _ => None,
        }
    }

    #[must_use]
    pub fn location_null(file: std::rc::Rc<str>) -> SourceLocation {
        SourceLocation::new(file, Position::START)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.into())
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_matches_spec_coercions() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(1).is_truthy());
        assert!(!Value::String("".into()).is_truthy());
        assert!(Value::String("x".into()).is_truthy());
    }

    #[test]
    fn list_equality_is_structural() {
        let a = Value::new_list(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::new_list(vec![Value::Int(1), Value::Int(2)]);
        assert!(a.values_equal(&b));
    }

    #[test]
    fn struct_field_order_is_preserved_in_display() {
        let mut fields = FieldMap::default();
        fields.insert("b".into(), Value::Int(2));
        fields.insert("a".into(), Value::Int(1));
        let s = Value::new_struct(StructInstance {
            type_name: "Point".into(),
            fields,
        });
        assert_eq!(s.display(), "Point { b: 2, a: 1 }");
    }

    #[test]
    fn self_referential_list_is_detected_via_gc_identity() {
        let list = Value::new_list(vec![Value::Null]);
        if let Value::List(handle) = &list {
            if let GcPayload::List(items) = &mut *handle.payload.borrow_mut() {
                items[0] = list.clone();
            }
        }
        let ptr = list.gc_identity().unwrap();
        let child = list.gc_children().into_iter().next().unwrap();
        assert_eq!(child.gc_identity(), Some(ptr));
    }
}
