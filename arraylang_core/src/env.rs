//! Chained lexical environments (C5, §3.4).
//!
//! A binding map plus an optional parent, reference-counted so closures can
//! share a snapshot cheaply. Grounded in the teacher's frame-chaining idea
//! (`vm/frame.rs`) but flattened to a single symbol→value map per scope,
//! since this spec has no per-type storage split.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

#[derive(Debug, Default)]
struct Scope {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
}

/// A handle to a scope. Cloning an `Environment` shares the same scope
/// (needed so a function's call environment stays visible to nested
/// closures created during its execution); `copy()` produces an
/// independent snapshot instead.
#[derive(Debug, Clone)]
pub struct Environment(Rc<RefCell<Scope>>);

impl Environment {
    /// The process-wide root environment: no parent, holds built-ins and
    /// top-level functions.
    pub fn root() -> Self {
        Environment(Rc::new(RefCell::new(Scope::default())))
    }

    /// Creates a child scope whose parent is `self`.
    pub fn extend(&self) -> Self {
        Environment(Rc::new(RefCell::new(Scope {
            bindings: HashMap::new(),
            parent: Some(self.clone()),
        })))
    }

    /// A snapshot of `self` and its parent chain, suitable for closure
    /// capture — later mutation of the original does not affect the copy.
    pub fn copy(&self) -> Self {
        let scope = self.0.borrow();
        Environment(Rc::new(RefCell::new(Scope {
            bindings: scope.bindings.clone(),
            parent: scope.parent.as_ref().map(Environment::copy),
        })))
    }

    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().bindings.insert(name.into(), value);
    }

    /// Looks up `name`, walking the parent chain.
    pub fn get(&self, name: &str) -> Option<Value> {
        let scope = self.0.borrow();
        if let Some(v) = scope.bindings.get(name) {
            return Some(v.clone());
        }
        scope.parent.as_ref().and_then(|p| p.get(name))
    }

    /// `true` if `name` is bound in this scope or an ancestor.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Rebinds `name` in the nearest scope (current or ancestor) that
    /// already defines it; if nowhere in the chain, defines it locally.
    /// Matches MATLAB-family assignment semantics: plain assignment always
    /// targets the current scope unless the name was already a local.
    pub fn assign_local(&self, name: impl Into<String>, value: Value) {
        self.define(name, value);
    }

    pub fn names(&self) -> Vec<String> {
        let scope = self.0.borrow();
        let mut names: Vec<String> = scope.bindings.keys().cloned().collect();
        if let Some(p) = &scope.parent {
            names.extend(p.names());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── chained lookup ──
    #[test]
    fn child_sees_parent_bindings() {
        let root = Environment::root();
        root.define("x", Value::scalar_int(1));
        let child = root.extend();
        assert!(matches!(child.get("x"), Some(_)));
    }

    #[test]
    fn child_shadowing_does_not_affect_parent() {
        let root = Environment::root();
        root.define("x", Value::scalar_int(1));
        let child = root.extend();
        child.define("x", Value::scalar_int(2));
        assert_eq!(root.get("x").unwrap().display_text(), "[1]");
        assert_eq!(child.get("x").unwrap().display_text(), "[2]");
    }

    #[test]
    fn copy_is_an_independent_snapshot() {
        let root = Environment::root();
        root.define("x", Value::scalar_int(1));
        let snapshot = root.copy();
        root.define("x", Value::scalar_int(99));
        assert_eq!(snapshot.get("x").unwrap().display_text(), "[1]");
    }

    #[test]
    fn unbound_symbol_returns_none() {
        let root = Environment::root();
        assert!(root.get("nope").is_none());
    }
}
