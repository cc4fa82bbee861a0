//! Deciding whether an instance head fits a wanted constraint.
//!
//! Head comparison is three-valued: the types are known to match, known to
//! be apart, or not yet decidable because an unknown stands in the way.
//! `Apart` is absorbing under combination and `Match` is the unit, so a
//! single undecidable position degrades a whole comparison to `Unknown`
//! unless some other position is already apart.
//!
//! Functional dependencies relax the requirement that every position match
//! directly: once the determining positions match, the determined ones are
//! inferred by unification at commit time rather than checked here.

use crate::context::TypeClassDict;
use indexmap::IndexMap;
use sablec_ty::rows::{align_rows, row_from_list, RowAlignment};
use sablec_ty::{FunctionalDependency, Type};
use sablec_util::Symbol;
use std::collections::BTreeSet;

/// Outcome of comparing types against an instance head
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Matched<T> {
    /// The shapes are compatible
    Match(T),
    /// The shapes can never be made equal
    Apart,
    /// Not decidable until some unknown is solved
    Unknown,
}

impl Matched<()> {
    /// Monoidal combination: `Apart` absorbs, `Match(())` is the unit
    pub fn and(self, other: Matched<()>) -> Matched<()> {
        match (self, other) {
            (Matched::Apart, _) | (_, Matched::Apart) => Matched::Apart,
            (Matched::Unknown, _) | (_, Matched::Unknown) => Matched::Unknown,
            _ => Matched::Match(()),
        }
    }
}

/// Bindings collected while matching: instance variable to the wanted types
/// it was seen against
///
/// Multiple occurrences of a variable accumulate; the commit step verifies
/// the list is pairwise unifiable. Insertion order is kept so candidate
/// selection stays deterministic.
pub type Matching = IndexMap<Symbol, Vec<Type>>;

/// Compare one wanted argument against one instance head argument
///
/// Variables in the *instance* head are binders: anything on the wanted
/// side matches them and is recorded in the returned [`Matching`].
pub fn type_heads_are_equal(wanted: &Type, instance: &Type) -> (Matched<()>, Matching) {
    let mut matching = Matching::default();
    let outcome = heads_go(wanted, instance, &mut matching);
    (outcome, matching)
}

fn heads_go(wanted: &Type, instance: &Type, matching: &mut Matching) -> Matched<()> {
    let wanted = wanted.strip_kinded();
    let instance = instance.strip_kinded();
    match (wanted, instance) {
        (_, Type::Var(v)) => {
            matching.entry(*v).or_default().push(wanted.clone());
            Matched::Match(())
        }
        (Type::Unknown(a), Type::Unknown(b)) if a == b => Matched::Match(()),
        (Type::Skolem { id: a, .. }, Type::Skolem { id: b, .. }) if a == b => Matched::Match(()),
        (Type::Con(a), Type::Con(b)) if a == b => Matched::Match(()),
        (Type::StrLit(a), Type::StrLit(b)) if a == b => Matched::Match(()),
        (Type::REmpty, Type::REmpty) => Matched::Match(()),
        (Type::App(f1, x1), Type::App(f2, x2)) => {
            heads_go(f1, f2, matching).and(heads_go(x1, x2, matching))
        }
        (Type::RCons(..), Type::RCons(..)) => {
            let aligned = align_rows(wanted, instance);
            let mut outcome = Matched::Match(());
            for (w, i) in &aligned.common {
                outcome = outcome.and(heads_go(&w.ty, &i.ty, matching));
            }
            outcome.and(row_tails(&aligned, matching))
        }
        (Type::Unknown(_), _) => Matched::Unknown,
        _ => Matched::Apart,
    }
}

/// Compare the unaligned remainders of two rows
///
/// A trailing variable on the instance side absorbs whatever is left of the
/// wanted row; otherwise the leftovers must be empty and the tails compare
/// structurally.
fn row_tails(aligned: &RowAlignment, matching: &mut Matching) -> Matched<()> {
    if aligned.right_rest.is_empty() {
        if let Type::Var(v) = aligned.right_tail.strip_kinded() {
            let absorbed = row_from_list(&aligned.left_rest, aligned.left_tail.clone());
            matching.entry(*v).or_default().push(absorbed);
            return Matched::Match(());
        }
    }
    if aligned.left_rest.is_empty() && aligned.right_rest.is_empty() {
        return heads_go(&aligned.left_tail, &aligned.right_tail, matching);
    }
    // One side demands labels the other does not have
    match aligned.left_tail.strip_kinded() {
        Type::Unknown(_) => Matched::Unknown,
        _ => Matched::Apart,
    }
}

/// Strict equality used to verify repeated-variable bindings
///
/// No binders here: variables only match themselves. A skolem facing any
/// other shape is `Unknown` because apartness cannot be proven without more
/// information.
pub fn types_are_equal(a: &Type, b: &Type) -> Matched<()> {
    let a = a.strip_kinded();
    let b = b.strip_kinded();
    match (a, b) {
        (Type::Unknown(x), Type::Unknown(y)) if x == y => Matched::Match(()),
        (Type::Unknown(_), _) | (_, Type::Unknown(_)) => Matched::Unknown,
        (Type::Skolem { id: x, .. }, Type::Skolem { id: y, .. }) if x == y => Matched::Match(()),
        (Type::Skolem { .. }, _) | (_, Type::Skolem { .. }) => Matched::Unknown,
        (Type::Var(x), Type::Var(y)) => {
            if x == y {
                Matched::Match(())
            } else {
                Matched::Apart
            }
        }
        (Type::Con(x), Type::Con(y)) => {
            if x == y {
                Matched::Match(())
            } else {
                Matched::Apart
            }
        }
        (Type::StrLit(x), Type::StrLit(y)) => {
            if x == y {
                Matched::Match(())
            } else {
                Matched::Apart
            }
        }
        (Type::App(f1, x1), Type::App(f2, x2)) => {
            types_are_equal(f1, f2).and(types_are_equal(x1, x2))
        }
        (Type::REmpty, Type::REmpty) => Matched::Match(()),
        (Type::RCons(..), Type::RCons(..))
        | (Type::RCons(..), Type::REmpty)
        | (Type::REmpty, Type::RCons(..)) => rows_are_equal(a, b),
        _ => Matched::Apart,
    }
}

fn rows_are_equal(a: &Type, b: &Type) -> Matched<()> {
    let aligned = align_rows(a, b);
    let mut outcome = Matched::Match(());
    for (l, r) in &aligned.common {
        outcome = outcome.and(types_are_equal(&l.ty, &r.ty));
    }
    if aligned.left_rest.is_empty() && aligned.right_rest.is_empty() {
        return outcome.and(types_are_equal(&aligned.left_tail, &aligned.right_tail));
    }
    let either_open = matches!(aligned.left_tail.strip_kinded(), Type::Unknown(_))
        || matches!(aligned.right_tail.strip_kinded(), Type::Unknown(_));
    if either_open {
        outcome.and(Matched::Unknown)
    } else {
        Matched::Apart
    }
}

/// Close a set of matched positions under the class's functional
/// dependencies
fn fd_closure(fdeps: &[FunctionalDependency], start: &BTreeSet<usize>, arity: usize) -> BTreeSet<usize> {
    let mut closed = start.clone();
    loop {
        let before = closed.len();
        for fdep in fdeps {
            if fdep.determiners.iter().all(|d| closed.contains(d)) {
                closed.extend(fdep.determined.iter().copied());
            }
        }
        if closed.len() == before || closed.len() >= arity {
            return closed;
        }
    }
}

/// Decide whether an instance fits the wanted arguments
///
/// The returned [`Matching`] keeps the bindings for every position,
/// including those only inferred through functional dependencies; the
/// commit step needs them for unification.
pub fn match_instance(
    fdeps: &[FunctionalDependency],
    dict: &TypeClassDict,
    wanted: &[Type],
) -> Matched<Matching> {
    if dict.types.len() != wanted.len() {
        return Matched::Apart;
    }

    let mut outcomes = Vec::with_capacity(wanted.len());
    let mut per_position = Vec::with_capacity(wanted.len());
    for (w, i) in wanted.iter().zip(&dict.types) {
        let (outcome, matching) = type_heads_are_equal(w, i);
        outcomes.push(outcome);
        per_position.push(matching);
    }

    let matched: BTreeSet<usize> = outcomes
        .iter()
        .enumerate()
        .filter(|(_, o)| matches!(o, Matched::Match(())))
        .map(|(i, _)| i)
        .collect();
    let covered = fd_closure(fdeps, &matched, wanted.len());
    if covered.len() != wanted.len() {
        return if outcomes.iter().any(|o| matches!(o, Matched::Apart)) {
            Matched::Apart
        } else {
            Matched::Unknown
        };
    }

    // Positions inferred through dependencies are dropped from
    // verification; their bindings are only proposals for unification.
    let mut direct = Matching::default();
    for i in &matched {
        for (var, types) in &per_position[*i] {
            direct.entry(*var).or_default().extend(types.iter().cloned());
        }
    }
    for types in direct.values() {
        for i in 0..types.len() {
            for j in (i + 1)..types.len() {
                if types_are_equal(&types[i], &types[j]) == Matched::Apart {
                    return Matched::Apart;
                }
            }
        }
    }

    let mut all = Matching::default();
    for matching in per_position {
        for (var, types) in matching {
            all.entry(var).or_default().extend(types);
        }
    }
    Matched::Match(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Evidence;
    use sablec_ty::rows::RowEntry;
    use sablec_ty::{QName, UnknownId};

    fn int() -> Type {
        Type::con("Prim", "Int")
    }

    fn string() -> Type {
        Type::con("Prim", "String")
    }

    fn list(t: Type) -> Type {
        Type::app(Type::con("Data.List", "List"), t)
    }

    fn instance(types: Vec<Type>) -> TypeClassDict {
        TypeClassDict {
            chain: None,
            index: 0,
            evidence: Evidence::Named(QName::local("inst")),
            path: Vec::new(),
            class: QName::new("C", "C"),
            types,
            deps: Some(Vec::new()),
        }
    }

    // ========================================================================
    // Head Comparison Tests
    // ========================================================================

    #[test]
    fn test_heads_instance_var_binds_anything() {
        let (outcome, matching) = type_heads_are_equal(&list(int()), &Type::var("a"));
        assert_eq!(outcome, Matched::Match(()));
        assert_eq!(matching[&Symbol::intern("a")], vec![list(int())]);
    }

    #[test]
    fn test_heads_app_recursion() {
        let (outcome, matching) = type_heads_are_equal(&list(int()), &list(Type::var("a")));
        assert_eq!(outcome, Matched::Match(()));
        assert_eq!(matching[&Symbol::intern("a")], vec![int()]);
    }

    #[test]
    fn test_heads_apart_constructors() {
        let (outcome, _) = type_heads_are_equal(&int(), &string());
        assert_eq!(outcome, Matched::Apart);
    }

    #[test]
    fn test_heads_unknown_blocks() {
        let (outcome, _) = type_heads_are_equal(&Type::Unknown(UnknownId(0)), &int());
        assert_eq!(outcome, Matched::Unknown);
    }

    #[test]
    fn test_heads_unknown_still_binds_instance_var() {
        let unknown = Type::Unknown(UnknownId(0));
        let (outcome, matching) = type_heads_are_equal(&unknown, &Type::var("a"));
        assert_eq!(outcome, Matched::Match(()));
        assert_eq!(matching[&Symbol::intern("a")], vec![unknown]);
    }

    #[test]
    fn test_heads_kinded_transparent() {
        let kinded = Type::Kinded(Box::new(int()), Box::new(Type::con("Prim", "Type")));
        let (outcome, _) = type_heads_are_equal(&kinded, &int());
        assert_eq!(outcome, Matched::Match(()));
    }

    #[test]
    fn test_heads_row_alignment() {
        let wanted = row_from_list(
            &[
                RowEntry::new(Symbol::intern("a"), int()),
                RowEntry::new(Symbol::intern("b"), string()),
            ],
            Type::REmpty,
        );
        let head = row_from_list(
            &[RowEntry::new(Symbol::intern("a"), Type::var("x"))],
            Type::var("rest"),
        );
        let (outcome, matching) = type_heads_are_equal(&wanted, &head);
        assert_eq!(outcome, Matched::Match(()));
        assert_eq!(matching[&Symbol::intern("x")], vec![int()]);
        // The instance tail variable absorbed the rest of the wanted row
        let absorbed = &matching[&Symbol::intern("rest")][0];
        let (entries, tail) = sablec_ty::rows::row_to_list(absorbed);
        assert_eq!(entries, vec![RowEntry::new(Symbol::intern("b"), string())]);
        assert_eq!(tail, Type::REmpty);
    }

    #[test]
    fn test_heads_row_missing_label_apart() {
        let wanted = row_from_list(
            &[RowEntry::new(Symbol::intern("a"), int())],
            Type::REmpty,
        );
        let head = row_from_list(
            &[RowEntry::new(Symbol::intern("b"), Type::var("x"))],
            Type::REmpty,
        );
        let (outcome, _) = type_heads_are_equal(&wanted, &head);
        assert_eq!(outcome, Matched::Apart);
    }

    #[test]
    fn test_heads_row_open_wanted_unknown() {
        let wanted = row_from_list(
            &[RowEntry::new(Symbol::intern("a"), int())],
            Type::Unknown(UnknownId(0)),
        );
        let head = row_from_list(
            &[
                RowEntry::new(Symbol::intern("a"), int()),
                RowEntry::new(Symbol::intern("b"), string()),
            ],
            Type::REmpty,
        );
        let (outcome, _) = type_heads_are_equal(&wanted, &head);
        assert_eq!(outcome, Matched::Unknown);
    }

    // ========================================================================
    // Strict Equality Tests
    // ========================================================================

    #[test]
    fn test_equal_vars_only_match_themselves() {
        assert_eq!(
            types_are_equal(&Type::var("a"), &Type::var("a")),
            Matched::Match(())
        );
        assert_eq!(
            types_are_equal(&Type::var("a"), &Type::var("b")),
            Matched::Apart
        );
    }

    #[test]
    fn test_equal_skolem_is_unknown_against_other() {
        use sablec_ty::SkolemId;
        let sk = Type::Skolem {
            name: Symbol::intern("a"),
            id: SkolemId(1),
        };
        assert_eq!(types_are_equal(&sk, &sk), Matched::Match(()));
        assert_eq!(types_are_equal(&sk, &int()), Matched::Unknown);
    }

    // ========================================================================
    // Instance Matching Tests
    // ========================================================================

    #[test]
    fn test_match_simple_instance() {
        let dict = instance(vec![list(Type::var("a"))]);
        let result = match_instance(&[], &dict, &[list(int())]);
        let Matched::Match(matching) = result else {
            panic!("expected a match");
        };
        assert_eq!(matching[&Symbol::intern("a")], vec![int()]);
    }

    #[test]
    fn test_match_arity_mismatch_is_apart() {
        let dict = instance(vec![int()]);
        assert_eq!(match_instance(&[], &dict, &[int(), int()]), Matched::Apart);
    }

    #[test]
    fn test_match_repeated_var_consistent() {
        // instance C (Pair a a), wanted C (Pair Int Int)
        let pair = |x: Type, y: Type| Type::app_all(Type::con("M", "Pair"), [x, y]);
        let dict = instance(vec![pair(Type::var("a"), Type::var("a"))]);
        let result = match_instance(&[], &dict, &[pair(int(), int())]);
        let Matched::Match(matching) = result else {
            panic!("expected a match");
        };
        assert_eq!(matching[&Symbol::intern("a")].len(), 2);
    }

    #[test]
    fn test_match_repeated_var_apart() {
        // instance C (Pair a a), wanted C (Pair Int String)
        let pair = |x: Type, y: Type| Type::app_all(Type::con("M", "Pair"), [x, y]);
        let dict = instance(vec![pair(Type::var("a"), Type::var("a"))]);
        assert_eq!(
            match_instance(&[], &dict, &[pair(int(), string())]),
            Matched::Apart
        );
    }

    #[test]
    fn test_match_unknown_without_fundep_blocks() {
        let dict = instance(vec![int(), string()]);
        let wanted = vec![int(), Type::Unknown(UnknownId(0))];
        assert_eq!(match_instance(&[], &dict, &wanted), Matched::Unknown);
    }

    #[test]
    fn test_match_fundep_covers_unknown_position() {
        // class C a b | a -> b; the unknown output position is inferred
        let fdeps = vec![FunctionalDependency::new(vec![0], vec![1])];
        let dict = instance(vec![int(), string()]);
        let wanted = vec![int(), Type::Unknown(UnknownId(0))];
        assert!(matches!(
            match_instance(&fdeps, &dict, &wanted),
            Matched::Match(_)
        ));
    }

    #[test]
    fn test_match_fundep_closure_is_transitive() {
        // class C a b c | a -> b, b -> c
        let fdeps = vec![
            FunctionalDependency::new(vec![0], vec![1]),
            FunctionalDependency::new(vec![1], vec![2]),
        ];
        let dict = instance(vec![int(), string(), string()]);
        let wanted = vec![
            int(),
            Type::Unknown(UnknownId(0)),
            Type::Unknown(UnknownId(1)),
        ];
        assert!(matches!(
            match_instance(&fdeps, &dict, &wanted),
            Matched::Match(_)
        ));
    }

    #[test]
    fn test_match_apart_beats_unknown() {
        // One position apart, another unknown: the result is apart
        let dict = instance(vec![int(), string()]);
        let wanted = vec![string(), Type::Unknown(UnknownId(0))];
        assert_eq!(match_instance(&[], &dict, &wanted), Matched::Apart);
    }

    #[test]
    fn test_match_keeps_fundep_bindings() {
        // class C a b | a -> b with instance C Int b: the binding for the
        // inferred position must survive for unification.
        let fdeps = vec![FunctionalDependency::new(vec![0], vec![1])];
        let dict = instance(vec![int(), Type::var("b")]);
        let wanted = vec![int(), Type::Unknown(UnknownId(7))];
        let Matched::Match(matching) = match_instance(&fdeps, &dict, &wanted) else {
            panic!("expected a match");
        };
        assert_eq!(
            matching[&Symbol::intern("b")],
            vec![Type::Unknown(UnknownId(7))]
        );
    }
}
