//! sablec-solve - Type Class Entailment
//!
//! ============================================================================
//! ENTAILMENT OVERVIEW
//! ============================================================================
//!
//! Given a wanted constraint `C t₁ … tₙ` left behind by type checking, this
//! crate decides whether the constraint is satisfied by the instances in
//! scope and, if so, synthesises the dictionary term that replaces the
//! constraint's placeholder in the elaborated program.
//!
//! THE SOLVE PIPELINE:
//! -------------------
//!
//! 1. CANDIDATE GATHERING
//!    Built-in classes (`Coercible`, the `Symbol` family, the row operators,
//!    `Warn`) are answered by per-class decision procedures that compute
//!    instances from type structure. Everything else is looked up in the
//!    [`context::InstanceContext`], scoped to the modules mentioned by the
//!    wanted arguments.
//!
//! 2. SELECTION
//!    Candidate heads are compared against the wanted arguments with a
//!    three-valued outcome (match / apart / unknown), modulated by the
//!    class's functional dependencies. Instance chains commit greedily:
//!    the first matching member wins, an apart member is skipped, and an
//!    unknown member blocks the whole chain.
//!
//! 3. COMMIT
//!    The winning instance's head is unified with the wanted arguments
//!    (this is where functional dependencies propagate information back
//!    into the substitution), its subgoals are solved recursively, and the
//!    dictionary term is assembled from the evidence.
//!
//! 4. DRIVER
//!    [`entail::replace_dictionaries`] runs a solve-or-defer fixpoint over
//!    an expression tree, then a generalisation pass that turns leftover
//!    constraints into obligations for the enclosing binding.
//!
//! Everything runs single-threaded under one mutable [`entail::SolverState`]
//! holding the substitution, the inferred context, and the fresh-name
//! supplies.

pub mod builtins;
pub mod context;
pub mod entail;
pub mod errors;
pub mod expr;
pub mod matching;

mod edge_cases;

pub use context::{find_dicts, scope_modules, Evidence, InstanceContext, TypeClassDict};
pub use entail::{
    entails, new_dictionaries, replace_dictionaries, EntailOptions, Obligation, SolverState,
};
pub use errors::{SolverError, SolverErrorKind};
pub use expr::{everywhere_top_down_m, Expr, PlaceholderData};
pub use matching::{match_instance, type_heads_are_equal, types_are_equal, Matched, Matching};
