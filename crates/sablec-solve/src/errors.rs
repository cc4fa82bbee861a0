//! Failures the entailment solver can report.

use crate::context::Evidence;
use sablec_ty::{Constraint, QName, TypeError};
use thiserror::Error;

/// What went wrong while solving a constraint
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SolverErrorKind {
    /// The class is not in the environment
    #[error("unknown type class {0}")]
    UnknownClass(QName),

    /// No candidate matched and the constraint was neither deferrable nor
    /// generalisable
    #[error("no type class instance was found for {0}")]
    NoInstanceFound(Constraint),

    /// Multiple non-derived, non-local candidates with distinct evidence
    #[error("overlapping type class instances found for {constraint}")]
    OverlappingInstances {
        /// The wanted constraint
        constraint: Constraint,
        /// Evidence of the conflicting candidates
        evidences: Vec<Evidence>,
    },

    /// The subgoal recursion exceeded its work limit
    #[error("possibly infinite type class instance for {0}")]
    PossiblyInfiniteInstance(Constraint),

    /// A unification failure surfaced during commit, re-thrown unchanged
    #[error(transparent)]
    Unification(#[from] TypeError),
}

/// A solver failure together with the constraints being solved when it
/// arose, outermost first
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{kind}")]
pub struct SolverError {
    /// The failure itself
    pub kind: SolverErrorKind,
    /// The constraint stack at the point of failure
    pub hints: Vec<Constraint>,
}

impl SolverError {
    /// A failure with no constraint stack attached
    pub fn bare(kind: SolverErrorKind) -> Self {
        Self {
            kind,
            hints: Vec::new(),
        }
    }
}
