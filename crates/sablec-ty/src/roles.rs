//! Role inference for data type parameters.
//!
//! A parameter is *representational* when its representation can affect the
//! representation of the whole type, and *phantom* otherwise. `Coercible`
//! constraints recurse into representational argument positions only, so
//! this table is what makes zero-cost newtype coercions safe.
//!
//! Roles for a data type are computed by walking every constructor field:
//! a bare occurrence of a parameter marks it representational, and an
//! occurrence under another constructor inherits that constructor's role at
//! the position. Results are memoised per type; mutually recursive
//! declarations start from an optimistic all-phantom assumption and iterate
//! to a fixed point, which converges because marking only ever grows.

use crate::env::{DataDecl, Environment};
use crate::types::{QName, Type};
use sablec_util::{FxHashMap, FxHashSet, Symbol};

/// The role of a data type parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// The parameter's representation matters
    Representational,
    /// The parameter never affects the representation
    Phantom,
}

/// Memoised role assignments, one entry per data type
#[derive(Debug, Default)]
pub struct RoleTable {
    cache: FxHashMap<QName, Vec<(Symbol, Role)>>,
}

impl RoleTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }
}

/// Roles of the primitive type constructors
fn primitive_roles(name: &QName) -> Option<Vec<(Symbol, Role)>> {
    if name.module != Some(Symbol::intern("Prim")) {
        return None;
    }
    let a = Symbol::intern("a");
    let b = Symbol::intern("b");
    match name.name.as_str() {
        "Function" => Some(vec![(a, Role::Representational), (b, Role::Representational)]),
        "Array" => Some(vec![(a, Role::Representational)]),
        "Record" => Some(vec![(a, Role::Representational)]),
        _ => None,
    }
}

/// Infer the roles of a data type's parameters, in declaration order
///
/// Unknown type names produce an empty list; their argument positions are
/// then treated as representational by callers, which is the conservative
/// direction.
pub fn roles_of(env: &Environment, table: &mut RoleTable, name: &QName) -> Vec<(Symbol, Role)> {
    if let Some(cached) = table.cache.get(name) {
        return cached.clone();
    }
    if let Some(prim) = primitive_roles(name) {
        table.cache.insert(*name, prim.clone());
        return prim;
    }
    let Some(decl) = env.data_decl(name) else {
        return Vec::new();
    };

    // Optimistic assumption for recursive occurrences
    let optimistic: Vec<(Symbol, Role)> = decl
        .params
        .iter()
        .map(|p| (*p, Role::Phantom))
        .collect();
    table.cache.insert(*name, optimistic);

    loop {
        let computed = compute_roles(env, table, decl);
        let current = table.cache.get(name).cloned().unwrap_or_default();
        table.cache.insert(*name, computed.clone());
        if computed == current {
            return computed;
        }
    }
}

fn compute_roles(env: &Environment, table: &mut RoleTable, decl: &DataDecl) -> Vec<(Symbol, Role)> {
    let mut representational = FxHashSet::default();
    for ctor in &decl.constructors {
        for field in &ctor.fields {
            walk(env, table, field, &mut representational);
        }
    }
    decl.params
        .iter()
        .map(|p| {
            let role = if representational.contains(p) {
                Role::Representational
            } else {
                Role::Phantom
            };
            (*p, role)
        })
        .collect()
}

/// Mark the variables of one field type
///
/// Bindings introduced by a quantifier may end up in the set; the caller's
/// projection onto declared parameters discards them.
fn walk(env: &Environment, table: &mut RoleTable, ty: &Type, marks: &mut FxHashSet<Symbol>) {
    match ty.strip_kinded() {
        Type::Var(v) => {
            marks.insert(*v);
        }
        Type::ForAll { body, .. } => walk(env, table, body, marks),
        Type::App(..) => {
            let (head, args) = ty.app_spine();
            match head {
                Type::Con(name) => {
                    let roles = roles_of(env, table, name);
                    for (i, arg) in args.iter().enumerate() {
                        let role = roles
                            .get(i)
                            .map(|(_, r)| *r)
                            .unwrap_or(Role::Representational);
                        if role == Role::Representational {
                            walk(env, table, arg, marks);
                        }
                    }
                }
                _ => {
                    walk(env, table, head, marks);
                    for arg in args {
                        walk(env, table, arg, marks);
                    }
                }
            }
        }
        Type::RCons(_, head, tail) => {
            walk(env, table, head, marks);
            walk(env, table, tail, marks);
        }
        _ => {}
    }
}
