//! Dictionaries in scope and the instance context.
//!
//! The instance context is a three-level mapping: optional module, then
//! class name, then dictionary identifier. All three levels use insertion-
//! ordered maps because iteration order is user-visible through candidate
//! ordering, and combining two contexts is a left-biased union at every
//! level.

use indexmap::IndexMap;
use sablec_ty::{Constraint, QName, Type};
use sablec_util::Symbol;
use std::sync::Arc;

/// The runtime identity of a dictionary
///
/// Overlap checks compare evidence equality; only `Named` refers to a
/// user-written instance declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Evidence {
    /// A user-declared instance with a referable identifier
    Named(QName),
    /// A solved `Warn` constraint carrying its message type
    Warn(Type),
    /// A computed `IsSymbol` dictionary for the given literal
    IsSymbol(Symbol),
    /// A dictionary for a class with no members
    EmptyClass,
}

/// A dictionary visible to the solver
///
/// `deps` distinguishes two states that must not be collapsed: `None` marks
/// a local assumption that never participates in overlap detection, while
/// `Some(vec![])` is a user instance with no subgoals, which does.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeClassDict {
    /// Chain this instance belongs to, if declared in one
    pub chain: Option<QName>,
    /// Position inside the chain
    pub index: i32,
    /// Runtime identity of the dictionary
    pub evidence: Evidence,
    /// Superclass accessor path back to the dictionary holding the value;
    /// non-empty marks a derived dictionary
    pub path: Vec<(QName, usize)>,
    /// The instance's class
    pub class: QName,
    /// The instance head arguments
    pub types: Vec<Type>,
    /// Subgoals, or `None` for a local assumption
    pub deps: Option<Vec<Constraint>>,
}

impl TypeClassDict {
    /// True when this dictionary can participate in overlap detection
    ///
    /// Derived superclass dictionaries (non-empty path) and local
    /// assumptions (`deps = None`) are exempt.
    pub fn overlap_participant(&self) -> bool {
        self.deps.is_some() && self.path.is_empty()
    }
}

/// Dictionaries in scope: module, then class, then identifier
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstanceContext {
    modules: IndexMap<Option<Symbol>, IndexMap<QName, IndexMap<QName, Arc<TypeClassDict>>>>,
}

impl InstanceContext {
    /// An empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no dictionaries are registered
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Register a dictionary under a module key
    pub fn insert(
        &mut self,
        module: Option<Symbol>,
        class: QName,
        ident: QName,
        dict: Arc<TypeClassDict>,
    ) {
        self.modules
            .entry(module)
            .or_default()
            .entry(class)
            .or_default()
            .insert(ident, dict);
    }

    /// Dictionaries registered for a class under one module key
    pub fn dicts_for(
        &self,
        module: Option<Symbol>,
        class: &QName,
    ) -> impl Iterator<Item = &Arc<TypeClassDict>> {
        self.modules
            .get(&module)
            .and_then(|classes| classes.get(class))
            .into_iter()
            .flat_map(|dicts| dicts.values())
    }

    /// Left-biased union at every level
    pub fn combine(&self, other: &InstanceContext) -> InstanceContext {
        let mut result = self.clone();
        for (module, classes) in &other.modules {
            let into_classes = result.modules.entry(*module).or_default();
            for (class, dicts) in classes {
                let into_dicts = into_classes.entry(*class).or_default();
                for (ident, dict) in dicts {
                    into_dicts.entry(*ident).or_insert_with(|| dict.clone());
                }
            }
        }
        result
    }
}

/// The module keys to search for a wanted constraint
///
/// The modules owning any constructor occurring in the wanted arguments,
/// together with the current module and the local context (`None`), with
/// duplicates removed preserving the order `None, currentModule, …`.
pub fn scope_modules(current_module: Option<Symbol>, args: &[Type]) -> Vec<Option<Symbol>> {
    let mut scope = vec![None, current_module];
    for ty in args {
        for con in ty.constructors() {
            scope.push(con.module);
        }
    }
    let mut deduped = Vec::new();
    for module in scope {
        if !deduped.contains(&module) {
            deduped.push(module);
        }
    }
    deduped
}

/// All candidate dictionaries for a class, in scope order
pub fn find_dicts(
    ctx: &InstanceContext,
    class: &QName,
    scope: &[Option<Symbol>],
) -> Vec<Arc<TypeClassDict>> {
    let mut out = Vec::new();
    for module in scope {
        out.extend(ctx.dicts_for(*module, class).cloned());
    }
    out
}
