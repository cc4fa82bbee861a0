//! sablec-ty - Type Terms, Unification, and Role Inference
//!
//! ============================================================================
//! TYPE SYSTEM OVERVIEW
//! ============================================================================
//!
//! This crate holds the type-level vocabulary of the sablec type checker and
//! the machinery the constraint solver leans on:
//!
//! 1. TYPE TERMS
//!    The recursive [`Type`] sum: variables, unification unknowns, skolems,
//!    constructors, applications, quantifiers, kinded wrappers, type-level
//!    strings, and rows.
//!
//! 2. ROWS
//!    Rows are unordered collections of labelled fields represented as a
//!    cons list (`RCons`). The [`rows`] module decomposes, rebuilds, and
//!    aligns them by label; every consumer (unification, instance matching,
//!    the row built-ins) shares that one alignment routine.
//!
//! 3. UNIFICATION
//!    A dense substitution keyed by [`UnknownId`] plus a structural unifier
//!    with an occurs check. The substitution is the single source of truth
//!    during a solve: every step re-applies it before looking at a type.
//!
//! 4. ROLE INFERENCE
//!    Per-data-type parameter roles (representational or phantom), computed
//!    from constructor fields and memoised. `Coercible` resolution is driven
//!    entirely by this table.
//!
//! The [`env::Environment`] ties the vocabulary together: data declarations,
//! type classes with superclasses and functional dependencies, type
//! synonyms, and newtype descriptors.

pub mod env;
pub mod roles;
pub mod rows;
pub mod subst;
pub mod types;
pub mod unify;

pub use env::{DataConstructor, DataDecl, Environment, NewtypeInfo, SynonymInfo};
pub use roles::{roles_of, Role, RoleTable};
pub use rows::{align_rows, row_from_list, row_to_list, RowAlignment, RowEntry};
pub use subst::Substitution;
pub use types::{
    Constraint, ConstraintHint, FunctionalDependency, QName, SkolemId, Type, TypeClassInfo,
    UnknownId,
};
pub use unify::{InferCtx, TypeError};
