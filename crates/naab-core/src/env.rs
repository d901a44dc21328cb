//! The lexical environment: an arena of scopes with index-based parent
//! pointers (`spec.md` §3 "Environment", design note in §9).
//!
//! A `Vec<(name, Value)>`-per-scope, heap-node-per-binding design would
//! force a pointer chase through the heap on every shadowing lookup. Using
//! `slotmap` for the scope arena — the same technique the teacher pack's
//! `rhai-hir` crate uses for its own scopes — turns the parent pointer into
//! an index, gives O(depth) lookup, and gives the cycle collector a ready-
//! made root set: the set of currently-live scope ids.

use crate::value::Value;
use ahash::AHashMap;
use slotmap::{new_key_type, SlotMap};

new_key_type! { pub struct ScopeId; }

#[derive(Debug, Default)]
struct ScopeData {
    parent: Option<ScopeId>,
    bindings: AHashMap<String, Value>,
}

/// The full set of lexical scopes for one running program. A scope pushed
/// for a block/call that nothing outlives it — `Interpreter` pops it with
/// [`Environment::pop_scope`] on every exit path of that block/call, normal
/// or exceptional, per `spec.md` §5's "exit from that scope ... releases
/// it." The one scope nothing ever pops is `root`, since globals live for
/// the program's whole run; the cycle collector's root walk only ever
/// starts from scopes the call stack still holds.
pub struct Environment {
    scopes: SlotMap<ScopeId, ScopeData>,
    root: ScopeId,
}

impl Environment {
    #[must_use]
    pub fn new() -> Self {
        let mut scopes = SlotMap::with_key();
        let root = scopes.insert(ScopeData::default());
        Self { scopes, root }
    }

    #[must_use]
    pub fn root(&self) -> ScopeId {
        self.root
    }

    /// Push a child scope (function call or compound statement entry).
    pub fn push_child(&mut self, parent: ScopeId) -> ScopeId {
        self.scopes.insert(ScopeData {
            parent: Some(parent),
            bindings: AHashMap::new(),
        })
    }

    /// Free a scope's slot once its owning block/call has finished with it.
    /// Only ever called by the interpreter on a scope it just pushed and is
    /// the sole owner of: a [`Value::Function`] closes over `globals`, never
    /// over an inner scope, so no live value can still reference a scope
    /// after this — see the call sites in `interp.rs` for the exit paths
    /// this is threaded through.
    pub fn pop_scope(&mut self, scope: ScopeId) {
        self.scopes.remove(scope);
    }

    /// Bind a new name in `scope`. Shadowing an outer binding of the same
    /// name is allowed; shadowing a binding already introduced in `scope`
    /// itself is a duplicate-declaration error caught by the analyzer, not
    /// here.
    pub fn declare(&mut self, scope: ScopeId, name: impl Into<String>, value: Value) {
        self.scopes[scope].bindings.insert(name.into(), value);
    }

    /// Resolve `name` to the nearest enclosing binding.
    #[must_use]
    pub fn get(&self, scope: ScopeId, name: &str) -> Option<Value> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let data = &self.scopes[id];
            if let Some(v) = data.bindings.get(name) {
                return Some(v.clone());
            }
            current = data.parent;
        }
        None
    }

    /// Assign to an existing binding without `let`. Per `spec.md` §3, this
    /// is only legal if a binding already exists in some enclosing scope;
    /// returns `false` if no such binding was found so the caller can raise
    /// `NameError`.
    pub fn assign(&mut self, scope: ScopeId, name: &str, value: Value) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            if self.scopes[id].bindings.contains_key(name) {
                self.scopes[id].bindings.insert(name.to_string(), value);
                return true;
            }
            current = self.scopes[id].parent;
        }
        false
    }

    #[must_use]
    pub fn is_declared_in_scope(&self, scope: ScopeId, name: &str) -> bool {
        self.scopes[scope].bindings.contains_key(name)
    }

    /// All direct bindings of `scope`, for the cycle collector's root walk.
    pub(crate) fn bindings_of(&self, scope: ScopeId) -> impl Iterator<Item = &Value> {
        self.scopes[scope].bindings.values()
    }

    pub(crate) fn parent_of(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes.get(scope).and_then(|s| s.parent)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowing_resolves_to_nearest_binding() {
        let mut env = Environment::new();
        let root = env.root();
        env.declare(root, "x", Value::Int(1));
        let child = env.push_child(root);
        env.declare(child, "x", Value::Int(2));
        assert_eq!(env.get(child, "x"), Some(Value::Int(2)));
        assert_eq!(env.get(root, "x"), Some(Value::Int(1)));
    }

    #[test]
    fn assign_without_let_requires_existing_binding() {
        let mut env = Environment::new();
        let root = env.root();
        let child = env.push_child(root);
        assert!(!env.assign(child, "missing", Value::Int(1)));
        env.declare(root, "y", Value::Int(0));
        assert!(env.assign(child, "y", Value::Int(5)));
        assert_eq!(env.get(child, "y"), Some(Value::Int(5)));
    }

    #[test]
    fn child_scope_exit_does_not_leak_bindings_outward() {
        let mut env = Environment::new();
        let root = env.root();
        let child = env.push_child(root);
        env.declare(child, "local", Value::Int(1));
        assert_eq!(env.get(root, "local"), None);
    }

    #[test]
    fn popped_scope_slot_is_reused_rather_than_growing_the_arena() {
        let mut env = Environment::new();
        let root = env.root();
        for _ in 0..1_000 {
            let child = env.push_child(root);
            env.declare(child, "x", Value::Int(1));
            env.pop_scope(child);
        }
        assert_eq!(env.scopes.len(), 1, "only the root scope should remain live");
    }
}
