// src/scope.rs
//
// Block scopes and the scope stack. Each scope holds two parallel maps -
// ordinary identifiers and tags - so a lookup can never cross namespaces.
// Labels are function-wide and flat; they live on the local context, not
// here.

use rustc_hash::FxHashMap;

use crate::ident::ScopedIdentifier;
use crate::intern::Symbol;

/// One block scope: the ordinary and tag namespaces for a `{ ... }`.
#[derive(Debug, Default)]
pub struct Scope {
    ordinary: FxHashMap<Symbol, ScopedIdentifier>,
    tags: FxHashMap<Symbol, ScopedIdentifier>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ordinary(&self, name: Symbol) -> Option<&ScopedIdentifier> {
        self.ordinary.get(&name)
    }

    pub fn ordinary_mut(&mut self, name: Symbol) -> Option<&mut ScopedIdentifier> {
        self.ordinary.get_mut(&name)
    }

    pub fn insert_ordinary(&mut self, name: Symbol, ident: ScopedIdentifier) {
        self.ordinary.insert(name, ident);
    }

    pub fn tag(&self, name: Symbol) -> Option<&ScopedIdentifier> {
        self.tags.get(&name)
    }

    pub fn insert_tag(&mut self, name: Symbol, ident: ScopedIdentifier) {
        self.tags.insert(name, ident);
    }
}

/// Ordered block scopes, innermost last. Lookup walks from the end toward
/// the start; falling through to the file scope is the local context's
/// job.
#[derive(Debug)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    /// A stack with the function's outermost block already open.
    pub fn new() -> Self {
        ScopeStack {
            scopes: vec![Scope::new()],
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push(&mut self) {
        self.scopes.push(Scope::new());
    }

    /// Pop the innermost block. The function-level scope is never popped;
    /// returns false if that was attempted.
    pub fn pop(&mut self) -> bool {
        if self.scopes.len() <= 1 {
            return false;
        }
        self.scopes.pop();
        true
    }

    pub fn current(&self) -> &Scope {
        self.scopes.last().expect("scope stack is never empty")
    }

    pub fn current_mut(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    /// Innermost-to-outermost ordinary lookup.
    pub fn resolve_ordinary(&self, name: Symbol) -> Option<&ScopedIdentifier> {
        self.scopes.iter().rev().find_map(|s| s.ordinary(name))
    }

    /// Innermost-to-outermost tag lookup.
    pub fn resolve_tag(&self, name: Symbol) -> Option<&ScopedIdentifier> {
        self.scopes.iter().rev().find_map(|s| s.tag(name))
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeId;

    fn type_tag(ty: TypeId) -> ScopedIdentifier {
        ScopedIdentifier::TypeTag { ty }
    }

    fn typedef(ty: TypeId) -> ScopedIdentifier {
        ScopedIdentifier::TypeDefinition { ty }
    }

    #[test]
    fn lookup_walks_innermost_first() {
        let mut stack = ScopeStack::new();
        stack
            .current_mut()
            .insert_ordinary(Symbol(0), typedef(TypeId::SIGNED_INT));

        stack.push();
        stack
            .current_mut()
            .insert_ordinary(Symbol(0), typedef(TypeId::FLOAT));

        match stack.resolve_ordinary(Symbol(0)) {
            Some(ScopedIdentifier::TypeDefinition { ty }) => assert_eq!(*ty, TypeId::FLOAT),
            other => panic!("unexpected: {:?}", other),
        }

        assert!(stack.pop());
        match stack.resolve_ordinary(Symbol(0)) {
            Some(ScopedIdentifier::TypeDefinition { ty }) => assert_eq!(*ty, TypeId::SIGNED_INT),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn namespaces_do_not_cross() {
        let mut stack = ScopeStack::new();
        stack
            .current_mut()
            .insert_tag(Symbol(0), type_tag(TypeId::SIGNED_INT));

        assert!(stack.resolve_ordinary(Symbol(0)).is_none());
        assert!(stack.resolve_tag(Symbol(0)).is_some());
    }

    #[test]
    fn function_scope_is_never_popped() {
        let mut stack = ScopeStack::new();
        assert!(!stack.pop());
        stack.push();
        assert_eq!(stack.depth(), 2);
        assert!(stack.pop());
        assert_eq!(stack.depth(), 1);
        assert!(!stack.pop());
    }
}
