//! The cycle collector (`spec.md` §4.5).
//!
//! Reference counting (plain `Rc`) reclaims everything acyclic the moment
//! its last handle drops. What it cannot reclaim is a structure with a
//! back-edge into itself — a struct field pointing back to the struct that
//! owns it, or a list containing itself. This module performs the
//! mark-and-sweep pass `spec.md` explicitly licenses as an alternative to a
//! full Bacon-Rajan trial-deletion scheme: periodically (on an allocation
//! threshold or an explicit call) walk every value reachable from the
//! current environment roots, then break the back-edges of anything left
//! over, letting ordinary `Rc` drops finish the reclamation.
//!
//! No teacher file owns this concern — Rhai's value model rarely needs one
//! (scripts embedding a host rarely build reference cycles through it) — so
//! this is new code, shaped like the teacher's self-contained passes
//! (`optimize.rs`: a struct holding pass state, plus a free-function entry
//! point) rather than bolted onto the interpreter.

use crate::env::{Environment, ScopeId};
use crate::value::Value;
use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Weak;

/// Registers every `List`/`Dict`/`Struct` allocation so a sweep can find
/// objects no live root points to, even though nothing currently holds a
/// strong reference to `GcCell` *from the registry itself* (it only holds
/// `Weak`s, so registering an object never keeps it alive past its last
/// real owner).
pub struct Gc {
    registry: std::cell::RefCell<Vec<Weak<crate::value::GcCell>>>,
    allocations_since_sweep: Cell<usize>,
    threshold: usize,
    collections_run: Cell<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct GcStats {
    pub tracked: usize,
    pub collections_run: usize,
}

impl Gc {
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self {
            registry: std::cell::RefCell::new(Vec::new()),
            allocations_since_sweep: Cell::new(0),
            threshold,
            collections_run: Cell::new(0),
        }
    }

    /// Track a freshly allocated aggregate. Called by the interpreter right
    /// after `Value::new_list`/`new_dict`/`new_struct`.
    pub fn track(&self, value: &Value) {
        if let Value::List(h) | Value::Dict(h) | Value::Struct(h) = value {
            self.registry.borrow_mut().push(std::rc::Rc::downgrade(h));
            self.allocations_since_sweep.set(self.allocations_since_sweep.get() + 1);
        }
    }

    #[must_use]
    pub fn should_collect(&self) -> bool {
        self.allocations_since_sweep.get() >= self.threshold
    }

    #[must_use]
    pub fn stats(&self) -> GcStats {
        GcStats {
            tracked: self.registry.borrow().len(),
            collections_run: self.collections_run.get(),
        }
    }

    /// Walk `env`'s reachable scopes (`active_scopes` plus their ancestors)
    /// and reclaim any tracked object the walk never reaches.
    ///
    /// Only call this between statements — never while an iterator or loop
    /// holds a `Ref`/`RefMut` borrow into a `GcCell` payload being swept,
    /// which would panic on the sweep's own borrow. The interpreter only
    /// invokes collection at statement boundaries, where the value being
    /// iterated is already a root via the loop's own environment binding,
    /// satisfying the "iterators take a temporary root" invariant without
    /// extra bookkeeping.
    pub fn collect(&self, env: &Environment, active_scopes: &[ScopeId]) -> usize {
        let mut marked = HashSet::new();
        let mut stack: Vec<Value> = Vec::new();

        let mut visited_scopes = HashSet::new();
        for &scope in active_scopes {
            let mut current = Some(scope);
            while let Some(id) = current {
                if !visited_scopes.insert(id) {
                    break;
                }
                stack.extend(env.bindings_of(id).cloned());
                current = env.parent_of(id);
            }
        }

        while let Some(value) = stack.pop() {
            if let Some(identity) = value.gc_identity() {
                if !marked.insert(identity) {
                    continue;
                }
            }
            stack.extend(value.gc_children());
        }

        let mut registry = self.registry.borrow_mut();
        let mut reclaimed = 0;
        registry.retain(|weak| {
            let Some(strong) = weak.upgrade() else {
                return false; // already freed by ordinary Rc drop
            };
            let identity = std::rc::Rc::as_ptr(&strong) as usize;
            if marked.contains(&identity) {
                return true;
            }
            // Unreachable from any root but still alive: a cycle. Clear its
            // outgoing edges so the members' Rc counts drop to zero and
            // ordinary refcounting reclaims them.
            let mut payload = strong.payload.borrow_mut();
            match &mut *payload {
                crate::value::GcPayload::List(items) => items.clear(),
                crate::value::GcPayload::Dict(entries) => entries.clear(),
                crate::value::GcPayload::Struct(inst) => inst.fields.clear(),
            }
            reclaimed += 1;
            false
        });

        self.allocations_since_sweep.set(0);
        self.collections_run.set(self.collections_run.get() + 1);
        reclaimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{GcPayload, StructInstance};

    #[test]
    fn collects_self_referential_struct_not_reachable_from_roots() {
        let gc = Gc::new(1000);
        let mut env = Environment::new();
        let root = env.root();

        let mut fields = crate::value::FieldMap::default();
        fields.insert("next".into(), Value::Null);
        let cyclic = Value::new_struct(StructInstance {
            type_name: "Node".into(),
            fields,
        });
        gc.track(&cyclic);

        if let Value::Struct(handle) = &cyclic {
            if let GcPayload::Struct(inst) = &mut *handle.payload.borrow_mut() {
                inst.fields.insert("next".into(), cyclic.clone());
            }
        }

        // Bind it, then unbind it (simulate going out of scope by never
        // declaring it at all past this point) so no root reaches it.
        drop(cyclic);

        let reclaimed = gc.collect(&env, &[root]);
        assert_eq!(reclaimed, 1);
        assert_eq!(gc.stats().tracked, 0);
    }

    #[test]
    fn does_not_collect_values_reachable_from_a_binding() {
        let gc = Gc::new(1000);
        let mut env = Environment::new();
        let root = env.root();

        let list = Value::new_list(vec![Value::Int(1)]);
        gc.track(&list);
        env.declare(root, "kept", list);

        let reclaimed = gc.collect(&env, &[root]);
        assert_eq!(reclaimed, 0);
        assert_eq!(gc.stats().tracked, 1);
    }
}
