//! Decision procedures for the solver-synthesised classes.
//!
//! These classes have no user-written instances; their dictionaries are
//! computed from type structure. Each procedure returns at most one
//! synthesised candidate (the `Warn` solver additionally forwards the
//! dictionaries already in scope), or `None` to express no opinion, in
//! which case the generic instance lookup proceeds.
//!
//! A synthesised dictionary often carries *output* positions that differ
//! from the wanted arguments, e.g. the third argument of `SymbolAppend`.
//! Nothing is written back here: the commit step unifies the dictionary's
//! head with the wanted types, and that unification is what propagates the
//! computed results into the substitution.

use crate::context::{find_dicts, Evidence, InstanceContext, TypeClassDict};
use sablec_ty::rows::{row_from_list, row_to_list, RowEntry};
use sablec_ty::{roles_of, Constraint, Environment, InferCtx, QName, Role, RoleTable, Type};
use sablec_util::Symbol;
use std::sync::Arc;

/// The classes the solver computes instances for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Builtin {
    Warn,
    Coercible,
    IsSymbol,
    SymbolCompare,
    SymbolAppend,
    SymbolCons,
    RowUnion,
    RowNub,
    RowLacks,
    RowCons,
    RowToList,
}

fn builtin_for(class: &QName) -> Option<Builtin> {
    let module = class.module?;
    Some(match (module.as_str(), class.name.as_str()) {
        ("Prim", "Warn") => Builtin::Warn,
        ("Prim.Coerce", "Coercible") => Builtin::Coercible,
        ("Sable.Symbol", "IsSymbol") => Builtin::IsSymbol,
        ("Prim.Symbol", "SymbolCompare") => Builtin::SymbolCompare,
        ("Prim.Symbol", "SymbolAppend") => Builtin::SymbolAppend,
        ("Prim.Symbol", "SymbolCons") => Builtin::SymbolCons,
        ("Prim.Row", "Union") => Builtin::RowUnion,
        ("Prim.Row", "Nub") => Builtin::RowNub,
        ("Prim.Row", "Lacks") => Builtin::RowLacks,
        ("Prim.Row", "Cons") => Builtin::RowCons,
        ("Prim.RowList", "RowToList") => Builtin::RowToList,
        _ => return None,
    })
}

/// Consult the built-in solver for a class
///
/// `Some` is a definitive candidate set; `None` means the class is not
/// built in, or the arguments are not yet concrete enough to commit.
pub fn solve_builtin(
    env: &Environment,
    roles: &mut RoleTable,
    infer: &mut InferCtx,
    ctx: &InstanceContext,
    scope: &[Option<Symbol>],
    class: &QName,
    args: &[Type],
) -> Option<Vec<Arc<TypeClassDict>>> {
    match builtin_for(class)? {
        Builtin::Warn => solve_warn(ctx, scope, class, args),
        Builtin::Coercible => solve_coercible(env, roles, class, args),
        Builtin::IsSymbol => solve_is_symbol(class, args),
        Builtin::SymbolCompare => solve_symbol_compare(class, args),
        Builtin::SymbolAppend => solve_symbol_append(class, args),
        Builtin::SymbolCons => solve_symbol_cons(class, args),
        Builtin::RowUnion => solve_row_union(infer, class, args),
        Builtin::RowNub => solve_row_nub(class, args),
        Builtin::RowLacks => solve_row_lacks(class, args),
        Builtin::RowCons => solve_row_cons(class, args),
        Builtin::RowToList => solve_row_to_list(class, args),
    }
}

fn synthesized(
    class: QName,
    types: Vec<Type>,
    deps: Vec<Constraint>,
    evidence: Evidence,
) -> Arc<TypeClassDict> {
    Arc::new(TypeClassDict {
        chain: None,
        index: 0,
        evidence,
        path: Vec::new(),
        class,
        types,
        deps: Some(deps),
    })
}

fn as_literal(ty: &Type) -> Option<Symbol> {
    match ty.strip_kinded() {
        Type::StrLit(s) => Some(*s),
        _ => None,
    }
}

/// `Warn msg`: every in-scope dictionary, then a fresh synthesised warning
///
/// The synthetic instance comes last so that a user-introduced `Warn`
/// constraint in scope wins and the warning is deferred to whoever
/// introduced it.
fn solve_warn(
    ctx: &InstanceContext,
    scope: &[Option<Symbol>],
    class: &QName,
    args: &[Type],
) -> Option<Vec<Arc<TypeClassDict>>> {
    let [message] = args else { return None };
    let mut dicts = find_dicts(ctx, class, scope);
    dicts.push(synthesized(
        *class,
        args.to_vec(),
        Vec::new(),
        Evidence::Warn(message.clone()),
    ));
    Some(dicts)
}

/// `Coercible a b`: role-driven newtype and congruence reasoning
fn solve_coercible(
    env: &Environment,
    roles: &mut RoleTable,
    class: &QName,
    args: &[Type],
) -> Option<Vec<Arc<TypeClassDict>>> {
    let [a, b] = args else { return None };
    // Failing to expand a synonym is "no opinion", not an error
    let a_expanded = env.expand_synonyms(a).ok()?;
    let b_expanded = env.expand_synonyms(b).ok()?;

    let subgoals = if a_expanded == b_expanded {
        Vec::new()
    } else {
        reduce_coercible(env, roles, class, &a_expanded, &b_expanded)
            .or_else(|| reduce_coercible(env, roles, class, &b_expanded, &a_expanded))?
    };
    Some(vec![synthesized(
        *class,
        args.to_vec(),
        subgoals,
        Evidence::EmptyClass,
    )])
}

/// One step of `Coercible` reduction, oriented left to right
fn reduce_coercible(
    env: &Environment,
    roles: &mut RoleTable,
    class: &QName,
    a: &Type,
    b: &Type,
) -> Option<Vec<Constraint>> {
    let (a_head, a_args) = a.app_spine();
    let Type::Con(name) = a_head else { return None };

    // Identical heads decompose by role: representational positions
    // produce subgoals, phantom positions are skipped.
    let (b_head, b_args) = b.app_spine();
    if b_head == a_head && a_args.len() == b_args.len() && !a_args.is_empty() {
        let role_list = roles_of(env, roles, name);
        let mut goals = Vec::new();
        for (i, (x, y)) in a_args.iter().zip(&b_args).enumerate() {
            let role = role_list
                .get(i)
                .map(|(_, r)| *r)
                .unwrap_or(Role::Representational);
            if role == Role::Representational && x != y {
                goals.push(Constraint::new(*class, vec![(*x).clone(), (*y).clone()]));
            }
        }
        return Some(goals);
    }

    // A saturated newtype unwraps to its field
    let newtype = env.newtype_constructor(name)?;
    if a_args.len() != newtype.params.len() {
        return None;
    }
    let mut map = sablec_util::FxHashMap::default();
    for (param, arg) in newtype.params.iter().zip(&a_args) {
        map.insert(*param, (*arg).clone());
    }
    Some(vec![Constraint::new(
        *class,
        vec![newtype.wrapped.replace_vars(&map), b.clone()],
    )])
}

/// `IsSymbol s` for a literal `s`
fn solve_is_symbol(class: &QName, args: &[Type]) -> Option<Vec<Arc<TypeClassDict>>> {
    let [ty] = args else { return None };
    let s = as_literal(ty)?;
    Some(vec![synthesized(
        *class,
        vec![Type::StrLit(s)],
        Vec::new(),
        Evidence::IsSymbol(s),
    )])
}

/// `SymbolCompare l r o`: lexicographic comparison of two literals
fn solve_symbol_compare(class: &QName, args: &[Type]) -> Option<Vec<Arc<TypeClassDict>>> {
    let [left, right, _] = args else { return None };
    let l = as_literal(left)?;
    let r = as_literal(right)?;
    let ordering = match l.as_str().cmp(r.as_str()) {
        std::cmp::Ordering::Less => "LT",
        std::cmp::Ordering::Equal => "EQ",
        std::cmp::Ordering::Greater => "GT",
    };
    Some(vec![synthesized(
        *class,
        vec![
            left.clone(),
            right.clone(),
            Type::con("Sable.Ordering", ordering),
        ],
        Vec::new(),
        Evidence::EmptyClass,
    )])
}

/// `SymbolAppend a b c`: any one of the three may be derived from the
/// other two
fn solve_symbol_append(class: &QName, args: &[Type]) -> Option<Vec<Arc<TypeClassDict>>> {
    let [a, b, c] = args else { return None };
    let types = match (as_literal(a), as_literal(b), as_literal(c)) {
        (Some(x), Some(y), _) => {
            let appended = format!("{}{}", x.as_str(), y.as_str());
            vec![a.clone(), b.clone(), Type::str_lit(&appended)]
        }
        (Some(x), None, Some(z)) => {
            let rest = z.as_str().strip_prefix(x.as_str())?;
            vec![a.clone(), Type::str_lit(rest), c.clone()]
        }
        (None, Some(y), Some(z)) => {
            let prefix = z.as_str().strip_suffix(y.as_str())?;
            vec![Type::str_lit(prefix), b.clone(), c.clone()]
        }
        _ => return None,
    };
    Some(vec![synthesized(
        *class,
        types,
        Vec::new(),
        Evidence::EmptyClass,
    )])
}

/// `SymbolCons h t s`: decompose a non-empty literal, or compose a
/// single-character head with a tail
fn solve_symbol_cons(class: &QName, args: &[Type]) -> Option<Vec<Arc<TypeClassDict>>> {
    let [h, t, s] = args else { return None };
    let types = match (as_literal(h), as_literal(t), as_literal(s)) {
        (_, _, Some(full)) if !full.as_str().is_empty() => {
            let mut chars = full.as_str().chars();
            let head = chars.next().expect("non-empty literal");
            vec![
                Type::str_lit(&head.to_string()),
                Type::str_lit(chars.as_str()),
                s.clone(),
            ]
        }
        (Some(head), Some(tail), None) => {
            if head.as_str().chars().count() != 1 {
                return None;
            }
            let full = format!("{}{}", head.as_str(), tail.as_str());
            vec![h.clone(), t.clone(), Type::str_lit(&full)]
        }
        _ => return None,
    };
    Some(vec![synthesized(
        *class,
        types,
        Vec::new(),
        Evidence::EmptyClass,
    )])
}

/// `Union l r u`, left-biased: a label fixed on the left shadows the same
/// label on the right, whose entry is dropped from the union
fn solve_row_union(
    infer: &mut InferCtx,
    class: &QName,
    args: &[Type],
) -> Option<Vec<Arc<TypeClassDict>>> {
    let [l, r, _] = args else { return None };
    let (fixed, tail) = row_to_list(l);
    let right = without_labels(r, &fixed);
    match &tail {
        Type::REmpty => {
            let union = row_from_list(&fixed, right);
            Some(vec![synthesized(
                *class,
                vec![l.clone(), r.clone(), union],
                Vec::new(),
                Evidence::EmptyClass,
            )])
        }
        Type::Unknown(_) | Type::Var(_) if !fixed.is_empty() => {
            // Peel the known prefix and keep working on the open tail
            let rest = infer.fresh_unknown();
            let union = row_from_list(&fixed, rest.clone());
            let subgoal = Constraint::new(*class, vec![tail.clone(), right, rest]);
            Some(vec![synthesized(
                *class,
                vec![l.clone(), r.clone(), union],
                vec![subgoal],
                Evidence::EmptyClass,
            )])
        }
        _ => None,
    }
}

/// A row minus the entries whose label is fixed by `shadowing`
fn without_labels(row: &Type, shadowing: &[RowEntry]) -> Type {
    let (fixed, tail) = row_to_list(row);
    let kept: Vec<RowEntry> = fixed
        .into_iter()
        .filter(|entry| shadowing.iter().all(|s| s.label != entry.label))
        .collect();
    row_from_list(&kept, tail)
}

/// `Nub r o` for a closed row: label-sorted, first occurrence per label
fn solve_row_nub(class: &QName, args: &[Type]) -> Option<Vec<Arc<TypeClassDict>>> {
    let [r, _] = args else { return None };
    let (fixed, tail) = row_to_list(r);
    if tail != Type::REmpty {
        return None;
    }
    let mut sorted = fixed;
    sorted.sort_by_key(|entry| entry.label);
    let mut deduped: Vec<RowEntry> = Vec::with_capacity(sorted.len());
    for entry in sorted {
        if deduped.last().map(|prev| prev.label) != Some(entry.label) {
            deduped.push(entry);
        }
    }
    let nubbed = row_from_list(&deduped, Type::REmpty);
    Some(vec![synthesized(
        *class,
        vec![r.clone(), nubbed],
        Vec::new(),
        Evidence::EmptyClass,
    )])
}

/// `Lacks sym r`: the label must be absent from the fixed fields; an open
/// tail becomes a residual subgoal
fn solve_row_lacks(class: &QName, args: &[Type]) -> Option<Vec<Arc<TypeClassDict>>> {
    let [sym, r] = args else { return None };
    let label = as_literal(sym)?;
    let (fixed, tail) = row_to_list(r);
    if fixed.iter().any(|entry| entry.label == label) {
        return None;
    }
    let deps = match &tail {
        Type::REmpty => Vec::new(),
        _ if !fixed.is_empty() => {
            vec![Constraint::new(*class, vec![sym.clone(), tail.clone()])]
        }
        _ => return None,
    };
    Some(vec![synthesized(
        *class,
        vec![sym.clone(), r.clone()],
        deps,
        Evidence::EmptyClass,
    )])
}

/// `Cons sym ty r o`: always extends the row
fn solve_row_cons(class: &QName, args: &[Type]) -> Option<Vec<Arc<TypeClassDict>>> {
    let [sym, ty, r, _] = args else { return None };
    let label = as_literal(sym)?;
    let extended = Type::RCons(label, Box::new(ty.clone()), Box::new(r.clone()));
    Some(vec![synthesized(
        *class,
        vec![sym.clone(), ty.clone(), r.clone(), extended],
        Vec::new(),
        Evidence::EmptyClass,
    )])
}

/// `RowToList r l` for a closed row: a label-sorted constructor chain
fn solve_row_to_list(class: &QName, args: &[Type]) -> Option<Vec<Arc<TypeClassDict>>> {
    let [r, _] = args else { return None };
    let (fixed, tail) = row_to_list(r);
    if tail != Type::REmpty {
        return None;
    }
    let mut sorted = fixed;
    sorted.sort_by_key(|entry| entry.label);
    let list = sorted
        .iter()
        .rev()
        .fold(Type::con("Prim.RowList", "Nil"), |acc, entry| {
            Type::app_all(
                Type::con("Prim.RowList", "Cons"),
                [Type::StrLit(entry.label), entry.ty.clone(), acc],
            )
        });
    Some(vec![synthesized(
        *class,
        vec![r.clone(), list],
        Vec::new(),
        Evidence::EmptyClass,
    )])
}
