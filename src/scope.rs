//! Scoped execution: "show deleted" suppression and ambient conditions.
//!
//! Both kinds of state are entered through an RAII guard and left when the
//! guard drops, so they are restored on a normal return, an early `?` return
//! and a panic alike. Suppression is a depth counter: an inner `with_deleted`
//! that finishes leaves an outer one in force.

use std::cell::RefCell;
use std::collections::HashMap;

use tracing::debug;

use crate::predicate::Conditions;
use crate::session::Session;

#[derive(Debug, Default)]
pub struct ScopeStack {
    suppressed: RefCell<HashMap<String, usize>>,
    ambient: RefCell<HashMap<String, Vec<Conditions>>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn is_suppressed(&self, model: &str) -> bool {
        self.depth(model) > 0
    }
    pub fn depth(&self, model: &str) -> usize {
        self.suppressed.borrow().get(model).copied().unwrap_or(0)
    }
    /// Nothing suppressed and no ambient conditions for any model.
    pub fn is_idle(&self) -> bool {
        self.suppressed.borrow().is_empty() && self.ambient.borrow().is_empty()
    }
    pub fn suppress(&self, model: &str) -> SuppressionGuard<'_> {
        *self.suppressed.borrow_mut().entry(model.to_string()).or_insert(0) += 1;
        SuppressionGuard {
            stack: self,
            model: model.to_string(),
        }
    }
    pub fn push(&self, model: &str, conditions: Conditions) -> ScopeGuard<'_> {
        self.ambient
            .borrow_mut()
            .entry(model.to_string())
            .or_default()
            .push(conditions);
        ScopeGuard {
            stack: self,
            model: model.to_string(),
        }
    }
    /// All ambient conditions for the model, ANDed in the order they were entered.
    pub fn ambient(&self, model: &str) -> Conditions {
        let mut merged = Conditions::new();
        if let Some(scopes) = self.ambient.borrow().get(model) {
            for conditions in scopes {
                merged.merge(conditions);
            }
        }
        merged
    }

    fn release(&self, model: &str) {
        let mut suppressed = self.suppressed.borrow_mut();
        if let Some(depth) = suppressed.get_mut(model) {
            *depth -= 1;
            if *depth == 0 {
                suppressed.remove(model);
            }
        }
    }
    fn pop(&self, model: &str) {
        let mut ambient = self.ambient.borrow_mut();
        if let Some(scopes) = ambient.get_mut(model) {
            scopes.pop();
            if scopes.is_empty() {
                ambient.remove(model);
            }
        }
    }
}

#[must_use = "suppression ends when the guard is dropped"]
pub struct SuppressionGuard<'s> {
    stack: &'s ScopeStack,
    model: String,
}
impl Drop for SuppressionGuard<'_> {
    fn drop(&mut self) {
        self.stack.release(&self.model);
    }
}

#[must_use = "the scope ends when the guard is dropped"]
pub struct ScopeGuard<'s> {
    stack: &'s ScopeStack,
    model: String,
}
impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.stack.pop(&self.model);
    }
}

impl Session<'_> {
    pub fn is_suppressed(&self, model: &str) -> bool {
        self.scope.is_suppressed(model)
    }
    /// Runs `op` with deleted rows of `model` visible.
    pub fn with_deleted<T>(&self, model: &str, op: impl FnOnce() -> T) -> T {
        let _guard = self.scope.suppress(model);
        debug!(model, depth = self.scope.depth(model), "entering with_deleted");
        op()
    }
    /// Runs `op` with the exclusion predicate merged into the ambient
    /// conditions of `model`. Models that are not deletion capable (or not
    /// registered) run `op` untouched.
    pub fn without_deleted<T>(&self, model: &str, op: impl FnOnce() -> T) -> T {
        if !self.registry.is_deletion_capable(model) {
            return op();
        }
        let _guard = self.scope.push(model, Conditions::not_deleted());
        op()
    }
    /// Runs `op` with `conditions` ANDed into every statement built for `model`.
    pub fn with_scope<T>(&self, model: &str, conditions: Conditions, op: impl FnOnce() -> T) -> T {
        let _guard = self.scope.push(model, conditions);
        op()
    }
}
