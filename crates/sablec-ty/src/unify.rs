//! Structural unification under the shared substitution.
//!
//! The [`InferCtx`] owns the substitution and the fresh-name supplies for a
//! single compilation task. `unify` re-applies the substitution to both
//! sides before matching shapes, so callers never observe a stale binding.

use crate::rows::{align_rows, row_from_list, RowEntry};
use crate::subst::Substitution;
use crate::types::{QName, Type, UnknownId};
use sablec_util::Symbol;
use thiserror::Error;

/// Unification and synonym-expansion failures
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TypeError {
    /// The occurs check failed: binding would build an infinite type
    #[error("infinite type: {id:?} occurs in {ty}")]
    OccursCheck {
        /// The unknown being bound
        id: UnknownId,
        /// The type it occurs in
        ty: Type,
    },

    /// The two types have incompatible shapes
    #[error("could not match type {0} with type {1}")]
    TypesDoNotUnify(Type, Type),

    /// A rigid type variable met a different type
    #[error("could not unify the rigid type variable {name} with another type")]
    CannotUnifySkolem {
        /// Origin name of the skolem
        name: Symbol,
    },

    /// A synonym was applied to fewer arguments than it declares
    #[error("type synonym {0} is partially applied")]
    PartiallyAppliedSynonym(QName),

    /// Synonym expansion did not terminate
    #[error("cycle detected while expanding type synonym {0}")]
    CycleInTypeSynonym(QName),
}

/// Mutable unification state for one compilation task
///
/// Bundles the substitution with the monotonic fresh supplies so the solver
/// can pass a single exclusive reference around.
#[derive(Debug, Default)]
pub struct InferCtx {
    /// The live substitution
    pub subst: Substitution,
    next_ident: u32,
}

impl InferCtx {
    /// A fresh context with an empty substitution
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh unification unknown
    pub fn fresh_unknown(&mut self) -> Type {
        Type::Unknown(self.subst.fresh_slot())
    }

    /// Mint a fresh identifier with the given prefix
    pub fn fresh_ident(&mut self, prefix: &str) -> Symbol {
        let n = self.next_ident;
        self.next_ident += 1;
        Symbol::intern(&format!("{}{}", prefix, n))
    }

    /// Apply the current substitution to a type
    pub fn apply(&self, ty: &Type) -> Type {
        self.subst.apply(ty)
    }

    /// Unify two types under the current substitution
    pub fn unify(&mut self, t1: &Type, t2: &Type) -> Result<(), TypeError> {
        let a = self.subst.apply(t1);
        let b = self.subst.apply(t2);
        self.unify_resolved(&a, &b)
    }

    fn unify_resolved(&mut self, a: &Type, b: &Type) -> Result<(), TypeError> {
        let a = a.strip_kinded();
        let b = b.strip_kinded();
        match (a, b) {
            (Type::Unknown(i), Type::Unknown(j)) if i == j => Ok(()),
            (Type::Unknown(i), _) => self.solve_unknown(*i, b),
            (_, Type::Unknown(j)) => self.solve_unknown(*j, a),

            (Type::Var(x), Type::Var(y)) if x == y => Ok(()),
            (Type::Skolem { id: i, .. }, Type::Skolem { id: j, .. }) if i == j => Ok(()),
            (Type::Skolem { name, .. }, _) | (_, Type::Skolem { name, .. }) => {
                Err(TypeError::CannotUnifySkolem { name: *name })
            }

            (Type::Con(x), Type::Con(y)) if x == y => Ok(()),
            (Type::StrLit(x), Type::StrLit(y)) if x == y => Ok(()),

            (Type::App(f1, x1), Type::App(f2, x2)) => {
                self.unify(f1, f2)?;
                self.unify(x1, x2)
            }

            (Type::REmpty, Type::REmpty) => Ok(()),
            (Type::RCons(..), Type::RCons(..))
            | (Type::RCons(..), Type::REmpty)
            | (Type::REmpty, Type::RCons(..)) => self.unify_rows(a, b),

            _ => Err(TypeError::TypesDoNotUnify(a.clone(), b.clone())),
        }
    }

    /// Unify two rows via label alignment
    ///
    /// Common labels unify pointwise. A leftover side is absorbed into the
    /// other side's unknown tail; two open rows with leftovers on both
    /// sides meet through a fresh common tail; a closed tail facing
    /// leftovers fails.
    fn unify_rows(&mut self, a: &Type, b: &Type) -> Result<(), TypeError> {
        let aligned = align_rows(a, b);
        for (l, r) in &aligned.common {
            self.unify(&l.ty, &r.ty)?;
        }

        let left_exhausted = aligned.left_rest.is_empty();
        let right_exhausted = aligned.right_rest.is_empty();
        match (left_exhausted, right_exhausted) {
            (true, true) => self.unify(&aligned.left_tail, &aligned.right_tail),
            (true, false) => self.absorb_into_tail(
                &aligned.left_tail,
                &aligned.right_rest,
                &aligned.right_tail,
                a,
                b,
            ),
            (false, true) => self.absorb_into_tail(
                &aligned.right_tail,
                &aligned.left_rest,
                &aligned.left_tail,
                a,
                b,
            ),
            (false, false) => {
                match (
                    aligned.left_tail.strip_kinded(),
                    aligned.right_tail.strip_kinded(),
                ) {
                    (Type::Unknown(i), Type::Unknown(j)) if i != j => {
                        let fresh = self.fresh_unknown();
                        self.solve_unknown(*i, &row_from_list(&aligned.right_rest, fresh.clone()))?;
                        self.solve_unknown(*j, &row_from_list(&aligned.left_rest, fresh))
                    }
                    _ => Err(TypeError::TypesDoNotUnify(a.clone(), b.clone())),
                }
            }
        }
    }

    fn absorb_into_tail(
        &mut self,
        tail: &Type,
        rest: &[RowEntry],
        other_tail: &Type,
        a: &Type,
        b: &Type,
    ) -> Result<(), TypeError> {
        match tail.strip_kinded() {
            Type::Unknown(id) => self.solve_unknown(*id, &row_from_list(rest, other_tail.clone())),
            _ => Err(TypeError::TypesDoNotUnify(a.clone(), b.clone())),
        }
    }

    fn solve_unknown(&mut self, id: UnknownId, ty: &Type) -> Result<(), TypeError> {
        if let Some(bound) = self.subst.lookup(id).cloned() {
            return self.unify(&bound, ty);
        }
        let ty = self.subst.apply(ty);
        if let Type::Unknown(other) = ty {
            if other == id {
                return Ok(());
            }
        }
        if self.occurs(id, &ty) {
            return Err(TypeError::OccursCheck { id, ty });
        }
        self.subst.bind(id, ty);
        Ok(())
    }

    /// Occurs check, iterative to survive deeply nested types
    fn occurs(&self, var: UnknownId, ty: &Type) -> bool {
        let mut stack = vec![ty];
        while let Some(current) = stack.pop() {
            match current {
                Type::Unknown(id) => {
                    if *id == var {
                        return true;
                    }
                    if let Some(bound) = self.subst.lookup(*id) {
                        stack.push(bound);
                    }
                }
                Type::App(f, x) => {
                    stack.push(f);
                    stack.push(x);
                }
                Type::ForAll { body, .. } => stack.push(body),
                Type::Kinded(t, k) => {
                    stack.push(t);
                    stack.push(k);
                }
                Type::RCons(_, head, tail) => {
                    stack.push(head);
                    stack.push(tail);
                }
                _ => {}
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::row_to_list;

    fn int() -> Type {
        Type::con("Prim", "Int")
    }

    fn string() -> Type {
        Type::con("Prim", "String")
    }

    fn entry(label: &str, ty: Type) -> RowEntry {
        RowEntry::new(Symbol::intern(label), ty)
    }

    #[test]
    fn test_unify_identical_cons() {
        let mut ctx = InferCtx::new();
        assert!(ctx.unify(&int(), &int()).is_ok());
    }

    #[test]
    fn test_unify_mismatched_cons() {
        let mut ctx = InferCtx::new();
        let err = ctx.unify(&int(), &string()).unwrap_err();
        assert!(matches!(err, TypeError::TypesDoNotUnify(..)));
    }

    #[test]
    fn test_unify_binds_unknown() {
        let mut ctx = InferCtx::new();
        let u = ctx.fresh_unknown();
        ctx.unify(&u, &int()).unwrap();
        assert_eq!(ctx.apply(&u), int());
    }

    #[test]
    fn test_unify_applications() {
        let mut ctx = InferCtx::new();
        let u = ctx.fresh_unknown();
        let list_u = Type::app(Type::con("M", "List"), u.clone());
        let list_int = Type::app(Type::con("M", "List"), int());
        ctx.unify(&list_u, &list_int).unwrap();
        assert_eq!(ctx.apply(&u), int());
    }

    #[test]
    fn test_occurs_check() {
        let mut ctx = InferCtx::new();
        let u = ctx.fresh_unknown();
        let list_u = Type::app(Type::con("M", "List"), u.clone());
        let err = ctx.unify(&u, &list_u).unwrap_err();
        assert!(matches!(err, TypeError::OccursCheck { .. }));
    }

    #[test]
    fn test_skolem_only_unifies_with_itself() {
        use crate::types::SkolemId;
        let mut ctx = InferCtx::new();
        let sk = Type::Skolem {
            name: Symbol::intern("a"),
            id: SkolemId(0),
        };
        assert!(ctx.unify(&sk, &sk.clone()).is_ok());
        assert!(matches!(
            ctx.unify(&sk, &int()),
            Err(TypeError::CannotUnifySkolem { .. })
        ));
    }

    #[test]
    fn test_unify_kinded_transparent() {
        let mut ctx = InferCtx::new();
        let kinded = Type::Kinded(Box::new(int()), Box::new(Type::con("Prim", "Type")));
        assert!(ctx.unify(&kinded, &int()).is_ok());
    }

    #[test]
    fn test_unify_rows_common_labels() {
        let mut ctx = InferCtx::new();
        let u = ctx.fresh_unknown();
        // ( foo :: ?0 ) ~ ( foo :: Int )
        let l = row_from_list(&[entry("foo", u.clone())], Type::REmpty);
        let r = row_from_list(&[entry("foo", int())], Type::REmpty);
        ctx.unify(&l, &r).unwrap();
        assert_eq!(ctx.apply(&u), int());
    }

    #[test]
    fn test_unify_rows_order_insensitive() {
        let mut ctx = InferCtx::new();
        let l = row_from_list(&[entry("a", int()), entry("b", string())], Type::REmpty);
        let r = row_from_list(&[entry("b", string()), entry("a", int())], Type::REmpty);
        assert!(ctx.unify(&l, &r).is_ok());
    }

    #[test]
    fn test_unify_rows_absorb_into_tail() {
        let mut ctx = InferCtx::new();
        let tail = ctx.fresh_unknown();
        // ( a :: Int | ?t ) ~ ( a :: Int, b :: String )
        let l = row_from_list(&[entry("a", int())], tail.clone());
        let r = row_from_list(&[entry("a", int()), entry("b", string())], Type::REmpty);
        ctx.unify(&l, &r).unwrap();
        let (entries, rest) = row_to_list(&ctx.apply(&tail));
        assert_eq!(entries, vec![entry("b", string())]);
        assert_eq!(rest, Type::REmpty);
    }

    #[test]
    fn test_unify_rows_closed_tail_rejects_extra() {
        let mut ctx = InferCtx::new();
        let l = row_from_list(&[entry("a", int())], Type::REmpty);
        let r = row_from_list(&[entry("a", int()), entry("b", string())], Type::REmpty);
        assert!(ctx.unify(&l, &r).is_err());
    }

    #[test]
    fn test_unify_open_rows_meet_through_fresh_tail() {
        let mut ctx = InferCtx::new();
        let t1 = ctx.fresh_unknown();
        let t2 = ctx.fresh_unknown();
        // ( a :: Int | ?1 ) ~ ( b :: String | ?2 )
        let l = row_from_list(&[entry("a", int())], t1.clone());
        let r = row_from_list(&[entry("b", string())], t2.clone());
        ctx.unify(&l, &r).unwrap();

        let (t1_entries, _) = row_to_list(&ctx.apply(&t1));
        let (t2_entries, _) = row_to_list(&ctx.apply(&t2));
        assert_eq!(t1_entries, vec![entry("b", string())]);
        assert_eq!(t2_entries, vec![entry("a", int())]);
    }

    #[test]
    fn test_fresh_ident_prefixes() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh_ident("dictShow");
        let b = ctx.fresh_ident("dictShow");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("dictShow"));
    }
}
