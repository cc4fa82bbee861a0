//! The entailment loop: solve, defer, or generalise each wanted constraint.
//!
//! A solve step refreshes the wanted arguments through the substitution,
//! gathers candidates (built-in solver first, instance context otherwise),
//! lets instance chains compete, and commits the winner by unifying its
//! head with the wanted types and recursing on its subgoals. Chains commit
//! greedily and there is no backtracking: an `Unknown` member blocks its
//! chain outright, because the chain can neither commit nor be skipped
//! without a proof of apartness.
//!
//! The program-level driver rewrites dictionary placeholders in an
//! expression tree to a fixed point, deferring what it cannot solve yet,
//! then makes a final pass in which remaining constraints either
//! generalise into obligations for the enclosing binding or report errors.

use crate::builtins::solve_builtin;
use crate::context::{
    find_dicts, scope_modules, Evidence, InstanceContext, TypeClassDict,
};
use crate::errors::{SolverError, SolverErrorKind};
use crate::expr::{everywhere_top_down_m, Expr, PlaceholderData};
use crate::matching::{match_instance, Matched, Matching};
use sablec_ty::{Constraint, Environment, InferCtx, QName, RoleTable, Type};
use sablec_util::{DiagnosticBuilder, DiagnosticCode, FxHashMap, Handler, Symbol};
use std::sync::Arc;

/// Subgoal recursion bound guarding against endless instance expansion
const WORK_LIMIT: u32 = 1000;

/// Options for a single entailment call
#[derive(Clone, Copy, Debug, Default)]
pub struct EntailOptions {
    /// Convert unsolvable outcomes into deferrals instead of errors
    pub defer_errors: bool,
    /// Allow constraints over unknowns to generalise into obligations
    pub should_generalize: bool,
}

/// A constraint that could not be solved and must be abstracted over by
/// the enclosing binding
#[derive(Clone, Debug)]
pub struct Obligation {
    /// The dictionary identifier handed out for the constraint
    pub ident: QName,
    /// The inherited context at the point of deferral
    pub context: InstanceContext,
    /// The generalised constraint
    pub constraint: Constraint,
}

/// All mutable solver state for one compilation task
///
/// The substitution, the inferred context, the fresh supplies, the progress
/// flag, and the obligation list travel together behind one exclusive
/// reference; nothing solver-related lives in globals.
pub struct SolverState<'a> {
    env: &'a Environment,
    handler: &'a Handler,
    current_module: Option<Symbol>,
    /// Unification state: substitution and fresh supplies
    pub infer: InferCtx,
    /// Memoised role assignments
    pub roles: RoleTable,
    /// Constraints deferred earlier and now assumed
    pub inferred: InstanceContext,
    progress: bool,
    obligations: Vec<Obligation>,
    hint_stack: Vec<Constraint>,
}

impl<'a> SolverState<'a> {
    /// Fresh solver state over an environment
    pub fn new(env: &'a Environment, handler: &'a Handler, current_module: Option<Symbol>) -> Self {
        Self {
            env,
            handler,
            current_module,
            infer: InferCtx::new(),
            roles: RoleTable::new(),
            inferred: InstanceContext::new(),
            progress: false,
            obligations: Vec::new(),
            hint_stack: Vec::new(),
        }
    }

    /// Whether the most recent pass solved anything
    pub fn made_progress(&self) -> bool {
        self.progress
    }

    /// Obligations accumulated by generalisation, draining them
    pub fn take_obligations(&mut self) -> Vec<Obligation> {
        std::mem::take(&mut self.obligations)
    }

    fn error(&self, kind: SolverErrorKind) -> SolverError {
        SolverError {
            kind,
            hints: self.hint_stack.clone(),
        }
    }
}

/// Solve a single wanted constraint, producing its dictionary term
pub fn entails(
    state: &mut SolverState,
    opts: EntailOptions,
    constraint: Constraint,
    context: &InstanceContext,
    hints: &[Constraint],
) -> Result<Expr, SolverError> {
    solve(state, &opts, context, hints, 0, &constraint)
}

/// Rewrite every dictionary placeholder in an expression
///
/// First a solve-or-defer fixpoint with errors deferred, repeated while any
/// pass makes progress; then a generalisation pass in which errors are
/// reported and leftover constraints over unknowns become obligations.
pub fn replace_dictionaries(
    state: &mut SolverState,
    should_generalize: bool,
    expr: Expr,
) -> Result<(Expr, Vec<Obligation>), SolverError> {
    let mut expr = expr;
    loop {
        state.progress = false;
        let opts = EntailOptions {
            defer_errors: true,
            should_generalize,
        };
        expr = everywhere_top_down_m(expr, &mut |e| rewrite_placeholder(state, &opts, e))?;
        if !state.progress {
            break;
        }
    }

    let opts = EntailOptions {
        defer_errors: false,
        should_generalize,
    };
    expr = everywhere_top_down_m(expr, &mut |e| rewrite_placeholder(state, &opts, e))?;
    Ok((expr, state.take_obligations()))
}

fn rewrite_placeholder(
    state: &mut SolverState,
    opts: &EntailOptions,
    expr: Expr,
) -> Result<Expr, SolverError> {
    match expr {
        Expr::DictPlaceholder(data) => {
            let PlaceholderData {
                constraint,
                context,
                hints,
            } = *data;
            solve(state, opts, &context, &hints, 0, &constraint)
        }
        other => Ok(other),
    }
}

/// Seed dictionaries for a constraint entering scope
///
/// One descriptor for the constraint itself plus, recursively, one for
/// every transitively implied superclass, each tagged with the accessor
/// path leading back to the base dictionary.
pub fn new_dictionaries(
    env: &Environment,
    path: Vec<(QName, usize)>,
    ident: QName,
    constraint: &Constraint,
) -> Result<Vec<Arc<TypeClassDict>>, SolverError> {
    let Some(info) = env.type_class(&constraint.class) else {
        return Err(SolverError::bare(SolverErrorKind::UnknownClass(
            constraint.class,
        )));
    };

    let mut var_map = FxHashMap::default();
    for (param, arg) in info.params.iter().zip(&constraint.args) {
        var_map.insert(*param, arg.clone());
    }

    let mut out = Vec::new();
    for (index, superclass) in info.superclasses.iter().enumerate() {
        let sub = Constraint::new(
            superclass.class,
            superclass
                .args
                .iter()
                .map(|t| t.replace_vars(&var_map))
                .collect(),
        );
        let mut sub_path = vec![(superclass.class, index)];
        sub_path.extend(path.iter().copied());
        out.extend(new_dictionaries(env, sub_path, ident, &sub)?);
    }

    out.push(Arc::new(TypeClassDict {
        chain: None,
        index: 0,
        evidence: Evidence::Named(ident),
        path,
        class: constraint.class,
        types: constraint.args.clone(),
        deps: None,
    }));
    Ok(out)
}

enum Outcome {
    Solved(Matching, Arc<TypeClassDict>),
    Unsolved(Constraint),
    Deferred(Constraint),
}

fn solve(
    state: &mut SolverState,
    opts: &EntailOptions,
    context: &InstanceContext,
    hints: &[Constraint],
    work: u32,
    con: &Constraint,
) -> Result<Expr, SolverError> {
    if work > WORK_LIMIT {
        return Err(state.error(SolverErrorKind::PossiblyInfiniteInstance(con.clone())));
    }
    state.hint_stack.push(con.clone());
    let result = solve_inner(state, opts, context, hints, work, con);
    state.hint_stack.pop();
    result
}

fn solve_inner(
    state: &mut SolverState,
    opts: &EntailOptions,
    context: &InstanceContext,
    hints: &[Constraint],
    work: u32,
    con: &Constraint,
) -> Result<Expr, SolverError> {
    let _span = tracing::trace_span!("entails", class = %con.class, work).entered();
    let env = state.env;

    // Refresh the wanted arguments; nothing below may read a stale type
    let tys: Vec<Type> = con.args.iter().map(|t| state.infer.apply(t)).collect();
    let refreshed = Constraint {
        class: con.class,
        args: tys.clone(),
        hint: con.hint.clone(),
    };

    let Some(class_info) = env.type_class(&con.class) else {
        if opts.defer_errors {
            tracing::trace!(class = %con.class, "unknown class, deferring");
            return Ok(defer(refreshed, context, hints));
        }
        return Err(state.error(SolverErrorKind::UnknownClass(con.class)));
    };
    let fdeps = class_info.fundeps.clone();

    let scope = scope_modules(state.current_module, &tys);
    let combined = context.combine(&state.inferred);
    let candidates = match solve_builtin(
        env,
        &mut state.roles,
        &mut state.infer,
        &combined,
        &scope,
        &con.class,
        &tys,
    ) {
        Some(dicts) => dicts,
        None => find_dicts(&combined, &con.class, &scope),
    };

    // Group candidates into chains ordered by (chain, index). Unchained
    // instances stand alone. Within a chain the first match wins, apart
    // members are skipped, and an unknown blocks the chain.
    let mut groups: Vec<Vec<Arc<TypeClassDict>>> = Vec::new();
    let mut chain_slots: FxHashMap<QName, usize> = FxHashMap::default();
    for dict in candidates {
        match dict.chain {
            None => groups.push(vec![dict]),
            Some(id) => match chain_slots.get(&id) {
                Some(&slot) => groups[slot].push(dict),
                None => {
                    chain_slots.insert(id, groups.len());
                    groups.push(vec![dict]);
                }
            },
        }
    }
    for group in &mut groups {
        group.sort_by_key(|d| d.index);
    }
    groups.sort_by(|a, b| a[0].chain.cmp(&b[0].chain));

    let mut winners: Vec<(Matching, Arc<TypeClassDict>)> = Vec::new();
    for group in groups {
        for dict in group {
            match match_instance(&fdeps, &dict, &tys) {
                Matched::Match(matching) => {
                    tracing::trace!(class = %dict.class, "chain winner");
                    winners.push((matching, dict));
                    break;
                }
                Matched::Apart => continue,
                Matched::Unknown => break,
            }
        }
    }

    let outcome = if winners.is_empty() {
        if opts.defer_errors {
            Outcome::Deferred(refreshed)
        } else if opts.should_generalize && is_generalizable(&tys) {
            Outcome::Unsolved(refreshed)
        } else {
            return Err(state.error(SolverErrorKind::NoInstanceFound(refreshed)));
        }
    } else if winners.len() == 1 {
        let (matching, dict) = winners.pop().expect("one winner");
        Outcome::Solved(matching, dict)
    } else {
        let overlapping = winners.iter().enumerate().any(|(i, (_, a))| {
            winners.iter().skip(i + 1).any(|(_, b)| {
                a.overlap_participant() && b.overlap_participant() && a.evidence != b.evidence
            })
        });
        if overlapping {
            if opts.defer_errors {
                Outcome::Deferred(refreshed)
            } else {
                let evidences = winners.iter().map(|(_, d)| d.evidence.clone()).collect();
                return Err(state.error(SolverErrorKind::OverlappingInstances {
                    constraint: refreshed,
                    evidences,
                }));
            }
        } else {
            // Prefer the least-derived dictionary; stable min keeps the
            // earliest candidate on ties
            let (matching, dict) = winners
                .into_iter()
                .min_by_key(|(_, d)| d.path.len())
                .expect("non-empty winners");
            Outcome::Solved(matching, dict)
        }
    };

    match outcome {
        Outcome::Solved(matching, dict) => {
            commit_solved(state, opts, context, hints, work, con, &tys, matching, dict)
        }
        Outcome::Unsolved(constraint) => commit_unsolved(state, context, constraint),
        Outcome::Deferred(constraint) => {
            tracing::trace!(class = %constraint.class, "deferred");
            Ok(defer(constraint, context, hints))
        }
    }
}

/// A zero-winner constraint may generalise when it is nullary or any
/// argument is still an unknown (modulo kinded wrappers)
fn is_generalizable(tys: &[Type]) -> bool {
    tys.is_empty()
        || tys
            .iter()
            .any(|t| matches!(t.strip_kinded(), Type::Unknown(_)))
}

fn defer(constraint: Constraint, context: &InstanceContext, hints: &[Constraint]) -> Expr {
    Expr::DictPlaceholder(Box::new(PlaceholderData {
        constraint,
        context: context.clone(),
        hints: hints.to_vec(),
    }))
}

#[allow(clippy::too_many_arguments)]
fn commit_solved(
    state: &mut SolverState,
    opts: &EntailOptions,
    context: &InstanceContext,
    hints: &[Constraint],
    work: u32,
    con: &Constraint,
    tys: &[Type],
    matching: Matching,
    dict: Arc<TypeClassDict>,
) -> Result<Expr, SolverError> {
    state.progress = true;
    tracing::trace!(class = %dict.class, evidence = ?dict.evidence, "committing instance");

    // Repeated instance variables must have unifiable bindings
    for types in matching.values() {
        for i in 0..types.len() {
            for j in (i + 1)..types.len() {
                if let Err(e) = state.infer.unify(&types[i], &types[j]) {
                    return Err(state.error(e.into()));
                }
            }
        }
    }

    // Commit to the head of each binding list, then freshen whatever
    // instance variable is still unbound
    let mut binding: FxHashMap<Symbol, Type> = FxHashMap::default();
    for (var, types) in &matching {
        if let Some(first) = types.first() {
            binding.insert(*var, state.infer.apply(first));
        }
    }
    freshen_instance_head(state, &dict, &mut binding);

    // Unifying the instantiated head against the wanted types is what
    // propagates functional-dependency information into the substitution
    for (inst_ty, wanted_ty) in dict.types.iter().zip(tys) {
        let instantiated = inst_ty.replace_vars(&binding);
        if let Err(e) = state.infer.unify(&instantiated, wanted_ty) {
            return Err(state.error(e.into()));
        }
    }

    let mut subgoal_dicts = Vec::new();
    if let Some(deps) = &dict.deps {
        for dep in deps {
            let dep_con = dep.map_args(|t| t.replace_vars(&binding));
            subgoal_dicts.push(solve(state, opts, context, hints, work + 1, &dep_con)?);
        }
    }

    let term = match &dict.evidence {
        Evidence::Named(name) => subgoal_dicts.into_iter().fold(Expr::Var(*name), Expr::app),
        Evidence::EmptyClass => empty_dict_term(subgoal_dicts),
        Evidence::Warn(message) => {
            let rendered = render_warn_message(&state.infer.apply(message));
            DiagnosticBuilder::warning(format!("user-defined warning: {}", rendered))
                .code(DiagnosticCode::W_SOLVER_USER_WARNING)
                .span(con.span())
                .emit(state.handler);
            empty_dict_term(subgoal_dicts)
        }
        Evidence::IsSymbol(s) => Expr::RecordLit(vec![(
            Symbol::intern("reflectSymbol"),
            Expr::Lam(Symbol::intern("_"), Box::new(Expr::StringLit(*s))),
        )]),
    };

    // A derived dictionary is reached through its superclass accessors,
    // innermost path entry first
    let term = dict.path.iter().rev().fold(term, |inner, (class, index)| {
        Expr::app(
            Expr::Accessor(superclass_field_name(class, *index), Box::new(inner)),
            Expr::Undefined,
        )
    });
    Ok(term)
}

fn commit_unsolved(
    state: &mut SolverState,
    context: &InstanceContext,
    constraint: Constraint,
) -> Result<Expr, SolverError> {
    let prefix = format!("dict{}", constraint.class.name);
    let ident = QName {
        module: None,
        name: state.infer.fresh_ident(&prefix),
    };

    let dicts = match new_dictionaries(state.env, Vec::new(), ident, &constraint) {
        Ok(dicts) => dicts,
        Err(e) => return Err(state.error(e.kind)),
    };
    let mut addition = InstanceContext::new();
    for dict in dicts {
        addition.insert(None, dict.class, ident, dict);
    }
    state.inferred = state.inferred.combine(&addition);

    state.obligations.push(Obligation {
        ident,
        context: context.clone(),
        constraint,
    });
    Ok(Expr::Var(ident))
}

/// Extend the committed binding with fresh unknowns for every variable in
/// the instance head or its subgoals that matching left unbound
fn freshen_instance_head(
    state: &mut SolverState,
    dict: &TypeClassDict,
    binding: &mut FxHashMap<Symbol, Type>,
) {
    let mut vars: Vec<Symbol> = Vec::new();
    for ty in &dict.types {
        vars.extend(ty.free_vars());
    }
    if let Some(deps) = &dict.deps {
        for dep in deps {
            for arg in &dep.args {
                vars.extend(arg.free_vars());
            }
        }
    }
    for var in vars {
        if !binding.contains_key(&var) {
            let fresh = state.infer.fresh_unknown();
            binding.insert(var, fresh);
        }
    }
}

/// `(λ_. undefined) d₁ … dₙ`: the value is a placeholder but the subgoal
/// dictionaries must appear in the term to preserve evaluation order
fn empty_dict_term(args: Vec<Expr>) -> Expr {
    args.into_iter().fold(Expr::Undefined, |acc, arg| {
        Expr::app(Expr::Lam(Symbol::intern("_"), Box::new(acc)), arg)
    })
}

fn superclass_field_name(class: &QName, index: usize) -> Symbol {
    Symbol::intern(&format!("{}{}", class.name, index))
}

fn render_warn_message(ty: &Type) -> String {
    match ty.strip_kinded() {
        Type::StrLit(s) => s.as_str().to_string(),
        other => other.to_string(),
    }
}
