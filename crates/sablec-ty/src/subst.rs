//! The unification substitution.
//!
//! Stored as a dense table keyed by [`UnknownId`]: slot `n` holds the type
//! that unknown `?n` was solved to, or `None` while it is still free. The
//! substitution only ever grows; bindings are never overwritten.

use crate::types::{Type, UnknownId};
use sablec_util::{Idx, IndexVec};

/// A dense map from unification unknowns to their solutions
#[derive(Clone, Debug, Default)]
pub struct Substitution {
    bindings: IndexVec<UnknownId, Option<Type>>,
}

impl Substitution {
    /// An empty substitution
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a slot for a fresh unknown
    pub fn fresh_slot(&mut self) -> UnknownId {
        self.bindings.push(None)
    }

    /// Number of allocated unknowns
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// True if no unknowns have been allocated
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The binding for an unknown, if solved
    pub fn lookup(&self, id: UnknownId) -> Option<&Type> {
        self.bindings.get(id).and_then(|slot| slot.as_ref())
    }

    /// Record a solution for an unknown
    ///
    /// The slot must be free; `unify` re-applies the substitution before it
    /// ever binds, so a double bind is a solver bug.
    pub fn bind(&mut self, id: UnknownId, ty: Type) {
        debug_assert!(
            self.bindings.get(id).map_or(true, |slot| slot.is_none()),
            "rebinding solved unknown ?{}",
            id.0
        );
        if self.bindings.get(id).is_none() {
            // Slots can be allocated out of band in tests
            while self.bindings.len() <= id.index() {
                self.bindings.push(None);
            }
        }
        self.bindings[id] = Some(ty);
    }

    /// Apply the substitution to a type, deeply
    ///
    /// Chains of solved unknowns are followed to the end, so the result
    /// contains only free unknowns.
    pub fn apply(&self, ty: &Type) -> Type {
        match ty {
            Type::Unknown(id) => match self.lookup(*id) {
                Some(bound) => self.apply(bound),
                None => ty.clone(),
            },
            Type::App(f, x) => Type::app(self.apply(f), self.apply(x)),
            Type::ForAll { var, body, skolem } => Type::ForAll {
                var: *var,
                body: Box::new(self.apply(body)),
                skolem: *skolem,
            },
            Type::Kinded(t, k) => Type::Kinded(Box::new(self.apply(t)), Box::new(self.apply(k))),
            Type::RCons(label, head, tail) => Type::RCons(
                *label,
                Box::new(self.apply(head)),
                Box::new(self.apply(tail)),
            ),
            _ => ty.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_slots_are_sequential() {
        let mut subst = Substitution::new();
        assert_eq!(subst.fresh_slot(), UnknownId(0));
        assert_eq!(subst.fresh_slot(), UnknownId(1));
        assert_eq!(subst.len(), 2);
    }

    #[test]
    fn test_apply_unbound() {
        let mut subst = Substitution::new();
        let id = subst.fresh_slot();
        assert_eq!(subst.apply(&Type::Unknown(id)), Type::Unknown(id));
    }

    #[test]
    fn test_apply_follows_chains() {
        let mut subst = Substitution::new();
        let a = subst.fresh_slot();
        let b = subst.fresh_slot();
        subst.bind(a, Type::Unknown(b));
        subst.bind(b, Type::con("Prim", "Int"));
        assert_eq!(subst.apply(&Type::Unknown(a)), Type::con("Prim", "Int"));
    }

    #[test]
    fn test_apply_rebuilds_structure() {
        let mut subst = Substitution::new();
        let id = subst.fresh_slot();
        subst.bind(id, Type::con("Prim", "Int"));
        let ty = Type::app(Type::con("M", "List"), Type::Unknown(id));
        assert_eq!(
            subst.apply(&ty),
            Type::app(Type::con("M", "List"), Type::con("Prim", "Int"))
        );
    }

    #[test]
    fn test_apply_rows() {
        let mut subst = Substitution::new();
        let id = subst.fresh_slot();
        subst.bind(id, Type::REmpty);
        let row = Type::RCons(
            sablec_util::Symbol::intern("foo"),
            Box::new(Type::con("Prim", "Int")),
            Box::new(Type::Unknown(id)),
        );
        let applied = subst.apply(&row);
        let (entries, tail) = crate::rows::row_to_list(&applied);
        assert_eq!(entries.len(), 1);
        assert_eq!(tail, Type::REmpty);
    }
}
