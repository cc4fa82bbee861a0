//! Core type terms of the sablec type checker.

use sablec_util::{define_idx, FxHashMap, Span, Symbol};
use std::fmt;

define_idx!(UnknownId);
define_idx!(SkolemId);

/// A possibly module-qualified name
///
/// Type constructors, class names, and instance identifiers are all
/// qualified; `module = None` means the name is local to the current
/// compilation unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QName {
    /// Owning module, if any
    pub module: Option<Symbol>,
    /// The unqualified name
    pub name: Symbol,
}

impl QName {
    /// A name qualified by a module
    pub fn new(module: &str, name: &str) -> Self {
        Self {
            module: Some(Symbol::intern(module)),
            name: Symbol::intern(name),
        }
    }

    /// An unqualified (local) name
    pub fn local(name: &str) -> Self {
        Self {
            module: None,
            name: Symbol::intern(name),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.module {
            Some(m) => write!(f, "{}.{}", m, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A type in the type system
///
/// Rows deserve a note: they are *unordered* collections of labelled fields,
/// but the representation is a cons list (`RCons`). Canonical comparison
/// aligns matching labels and leaves an unaligned tail; see [`crate::rows`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    /// Named type variable
    Var(Symbol),
    /// Unification unknown
    Unknown(UnknownId),
    /// Skolem constant, rigid within its scope
    Skolem {
        /// Name of the variable the skolem originated from
        name: Symbol,
        /// Identity of the skolem
        id: SkolemId,
    },
    /// Type constructor
    Con(QName),
    /// Type application
    App(Box<Type>, Box<Type>),
    /// Universal quantification
    ForAll {
        /// Bound variable
        var: Symbol,
        /// Quantified body
        body: Box<Type>,
        /// Skolem identity assigned during checking, if any
        skolem: Option<SkolemId>,
    },
    /// A type annotated with its kind
    Kinded(Box<Type>, Box<Type>),
    /// Type-level string literal
    StrLit(Symbol),
    /// The empty row
    REmpty,
    /// Row cons: label, field type, tail
    RCons(Symbol, Box<Type>, Box<Type>),
}

impl Type {
    /// Build an application `f x`
    pub fn app(f: Type, x: Type) -> Type {
        Type::App(Box::new(f), Box::new(x))
    }

    /// Build a left-nested application `head x₁ … xₙ`
    pub fn app_all(head: Type, args: impl IntoIterator<Item = Type>) -> Type {
        args.into_iter().fold(head, Type::app)
    }

    /// A bare type constructor
    pub fn con(module: &str, name: &str) -> Type {
        Type::Con(QName::new(module, name))
    }

    /// A type variable by name
    pub fn var(name: &str) -> Type {
        Type::Var(Symbol::intern(name))
    }

    /// A type-level string literal
    pub fn str_lit(value: &str) -> Type {
        Type::StrLit(Symbol::intern(value))
    }

    /// Strip `Kinded` wrappers from the outside of the term
    pub fn strip_kinded(&self) -> &Type {
        let mut ty = self;
        while let Type::Kinded(inner, _) = ty {
            ty = inner;
        }
        ty
    }

    /// View an application spine: `f x₁ … xₙ` becomes `(f, [x₁, …, xₙ])`
    ///
    /// Kinded wrappers are transparent both at the head and between
    /// applications.
    pub fn app_spine(&self) -> (&Type, Vec<&Type>) {
        let mut args = Vec::new();
        let mut head = self.strip_kinded();
        while let Type::App(f, x) = head {
            args.push(x.as_ref());
            head = f.strip_kinded();
        }
        args.reverse();
        (head, args)
    }

    /// Free type variables, in first-occurrence order
    pub fn free_vars(&self) -> Vec<Symbol> {
        fn go(ty: &Type, bound: &mut Vec<Symbol>, out: &mut Vec<Symbol>) {
            match ty {
                Type::Var(v) => {
                    if !bound.contains(v) && !out.contains(v) {
                        out.push(*v);
                    }
                }
                Type::App(f, x) => {
                    go(f, bound, out);
                    go(x, bound, out);
                }
                Type::ForAll { var, body, .. } => {
                    bound.push(*var);
                    go(body, bound, out);
                    bound.pop();
                }
                Type::Kinded(t, k) => {
                    go(t, bound, out);
                    go(k, bound, out);
                }
                Type::RCons(_, head, tail) => {
                    go(head, bound, out);
                    go(tail, bound, out);
                }
                _ => {}
            }
        }
        let mut out = Vec::new();
        go(self, &mut Vec::new(), &mut out);
        out
    }

    /// Substitute named type variables
    ///
    /// A `ForAll` binder shadows any replacement for its own variable.
    pub fn replace_vars(&self, map: &FxHashMap<Symbol, Type>) -> Type {
        match self {
            Type::Var(v) => map.get(v).cloned().unwrap_or_else(|| self.clone()),
            Type::App(f, x) => Type::app(f.replace_vars(map), x.replace_vars(map)),
            Type::ForAll { var, body, skolem } => {
                if map.contains_key(var) {
                    let mut inner = map.clone();
                    inner.remove(var);
                    Type::ForAll {
                        var: *var,
                        body: Box::new(body.replace_vars(&inner)),
                        skolem: *skolem,
                    }
                } else {
                    Type::ForAll {
                        var: *var,
                        body: Box::new(body.replace_vars(map)),
                        skolem: *skolem,
                    }
                }
            }
            Type::Kinded(t, k) => {
                Type::Kinded(Box::new(t.replace_vars(map)), Box::new(k.replace_vars(map)))
            }
            Type::RCons(label, head, tail) => Type::RCons(
                *label,
                Box::new(head.replace_vars(map)),
                Box::new(tail.replace_vars(map)),
            ),
            _ => self.clone(),
        }
    }

    /// True if any unification unknown occurs in the term
    pub fn contains_unknowns(&self) -> bool {
        match self {
            Type::Unknown(_) => true,
            Type::App(f, x) => f.contains_unknowns() || x.contains_unknowns(),
            Type::ForAll { body, .. } => body.contains_unknowns(),
            Type::Kinded(t, k) => t.contains_unknowns() || k.contains_unknowns(),
            Type::RCons(_, head, tail) => head.contains_unknowns() || tail.contains_unknowns(),
            _ => false,
        }
    }

    /// Collect every constructor name mentioned anywhere in the term
    pub fn constructors(&self) -> Vec<QName> {
        fn go(ty: &Type, out: &mut Vec<QName>) {
            match ty {
                Type::Con(name) => {
                    if !out.contains(name) {
                        out.push(*name);
                    }
                }
                Type::App(f, x) => {
                    go(f, out);
                    go(x, out);
                }
                Type::ForAll { body, .. } => go(body, out),
                Type::Kinded(t, k) => {
                    go(t, out);
                    go(k, out);
                }
                Type::RCons(_, head, tail) => {
                    go(head, out);
                    go(tail, out);
                }
                _ => {}
            }
        }
        let mut out = Vec::new();
        go(self, &mut out);
        out
    }

    fn fmt_atom(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::App(..) | Type::ForAll { .. } | Type::Kinded(..) => write!(f, "({})", self),
            _ => write!(f, "{}", self),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Var(v) => write!(f, "{}", v),
            Type::Unknown(u) => write!(f, "?{}", u.0),
            Type::Skolem { name, id } => write!(f, "{}#{}", name, id.0),
            Type::Con(name) => write!(f, "{}", name),
            Type::App(g, x) => {
                write!(f, "{} ", g)?;
                x.fmt_atom(f)
            }
            Type::ForAll { var, body, .. } => write!(f, "forall {}. {}", var, body),
            Type::Kinded(t, k) => write!(f, "({} :: {})", t, k),
            Type::StrLit(s) => write!(f, "\"{}\"", s),
            Type::REmpty => write!(f, "()"),
            Type::RCons(..) => {
                let (entries, tail) = crate::rows::row_to_list(self);
                write!(f, "( ")?;
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} :: {}", entry.label, entry.ty)?;
                }
                match tail {
                    Type::REmpty => {}
                    other => write!(f, " | {}", other)?,
                }
                write!(f, " )")
            }
        }
    }
}

/// Extra information attached to a wanted constraint
///
/// Opaque to the solver; only threaded into diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstraintHint {
    /// Source position of the expression that produced the constraint
    pub span: Span,
    /// Free-form note shown alongside solver errors
    pub note: Option<String>,
}

/// A wanted or given class constraint `C t₁ … tₙ`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    /// The class being constrained
    pub class: QName,
    /// The class arguments
    pub args: Vec<Type>,
    /// Source hints, opaque to the solver
    pub hint: Option<ConstraintHint>,
}

impl Constraint {
    /// Build a constraint with no hints
    pub fn new(class: QName, args: Vec<Type>) -> Self {
        Self {
            class,
            args,
            hint: None,
        }
    }

    /// The same constraint with its arguments mapped
    pub fn map_args(&self, mut f: impl FnMut(&Type) -> Type) -> Constraint {
        Constraint {
            class: self.class,
            args: self.args.iter().map(&mut f).collect(),
            hint: self.hint.clone(),
        }
    }

    /// Span to report errors for this constraint at
    pub fn span(&self) -> Span {
        self.hint.as_ref().map(|h| h.span).unwrap_or(Span::DUMMY)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class)?;
        for arg in &self.args {
            write!(f, " ")?;
            arg.fmt_atom(f)?;
        }
        Ok(())
    }
}

/// A functional dependency between class parameters
///
/// Some parameter positions (the determiners) uniquely determine others.
/// Both sets are indices into the class's parameter list and are disjoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionalDependency {
    /// Determining positions
    pub determiners: Vec<usize>,
    /// Positions determined by them
    pub determined: Vec<usize>,
}

impl FunctionalDependency {
    /// A dependency `determiners -> determined`
    pub fn new(determiners: Vec<usize>, determined: Vec<usize>) -> Self {
        Self {
            determiners,
            determined,
        }
    }
}

/// Metadata about a declared type class
#[derive(Clone, Debug, Default)]
pub struct TypeClassInfo {
    /// Parameter names, in declaration order
    pub params: Vec<Symbol>,
    /// Superclass constraints, stated over the parameters
    pub superclasses: Vec<Constraint>,
    /// Declared functional dependencies
    pub fundeps: Vec<FunctionalDependency>,
}

impl TypeClassInfo {
    /// A class with the given parameters and nothing else
    pub fn new(params: &[&str]) -> Self {
        Self {
            params: params.iter().map(|p| Symbol::intern(p)).collect(),
            superclasses: Vec::new(),
            fundeps: Vec::new(),
        }
    }

    /// Add a superclass constraint
    pub fn with_superclass(mut self, superclass: Constraint) -> Self {
        self.superclasses.push(superclass);
        self
    }

    /// Add a functional dependency
    pub fn with_fundep(mut self, determiners: Vec<usize>, determined: Vec<usize>) -> Self {
        self.fundeps
            .push(FunctionalDependency::new(determiners, determined));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_of(t: Type) -> Type {
        Type::app(Type::con("Data.List", "List"), t)
    }

    #[test]
    fn test_qname_display() {
        assert_eq!(QName::new("Data.Show", "Show").to_string(), "Data.Show.Show");
        assert_eq!(QName::local("dictShow0").to_string(), "dictShow0");
    }

    #[test]
    fn test_app_spine() {
        let int = Type::con("Prim", "Int");
        let ty = Type::app_all(Type::con("M", "Either"), [int.clone(), Type::var("b")]);
        let (head, args) = ty.app_spine();
        assert_eq!(head, &Type::con("M", "Either"));
        assert_eq!(args, vec![&int, &Type::var("b")]);
    }

    #[test]
    fn test_app_spine_through_kinded() {
        let inner = Type::app(Type::con("M", "F"), Type::var("a"));
        let ty = Type::Kinded(Box::new(inner), Box::new(Type::con("Prim", "Type")));
        let (head, args) = ty.app_spine();
        assert_eq!(head, &Type::con("M", "F"));
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_free_vars_respects_binders() {
        let ty = Type::ForAll {
            var: Symbol::intern("a"),
            body: Box::new(Type::app(Type::var("a"), Type::var("b"))),
            skolem: None,
        };
        assert_eq!(ty.free_vars(), vec![Symbol::intern("b")]);
    }

    #[test]
    fn test_replace_vars_shadowing() {
        let mut map = FxHashMap::default();
        map.insert(Symbol::intern("a"), Type::con("Prim", "Int"));
        let ty = Type::ForAll {
            var: Symbol::intern("a"),
            body: Box::new(Type::var("a")),
            skolem: None,
        };
        // The binder shadows the outer replacement
        assert_eq!(ty.replace_vars(&map), ty);
    }

    #[test]
    fn test_replace_vars_in_rows() {
        let mut map = FxHashMap::default();
        map.insert(Symbol::intern("r"), Type::REmpty);
        let row = Type::RCons(
            Symbol::intern("foo"),
            Box::new(Type::con("Prim", "Int")),
            Box::new(Type::var("r")),
        );
        let replaced = row.replace_vars(&map);
        let (entries, tail) = crate::rows::row_to_list(&replaced);
        assert_eq!(entries.len(), 1);
        assert_eq!(tail, Type::REmpty);
    }

    #[test]
    fn test_contains_unknowns() {
        let known = list_of(Type::con("Prim", "Int"));
        let unknown = list_of(Type::Unknown(UnknownId(3)));
        assert!(!known.contains_unknowns());
        assert!(unknown.contains_unknowns());
    }

    #[test]
    fn test_constructors_walk() {
        let ty = Type::app(
            Type::con("Data.Maybe", "Maybe"),
            Type::app(Type::con("Data.List", "List"), Type::var("a")),
        );
        let cons = ty.constructors();
        assert_eq!(
            cons,
            vec![
                QName::new("Data.Maybe", "Maybe"),
                QName::new("Data.List", "List")
            ]
        );
    }

    #[test]
    fn test_type_display() {
        let ty = list_of(list_of(Type::con("Prim", "Int")));
        assert_eq!(
            ty.to_string(),
            "Data.List.List (Data.List.List Prim.Int)"
        );
    }

    #[test]
    fn test_row_display() {
        let row = Type::RCons(
            Symbol::intern("foo"),
            Box::new(Type::con("Prim", "Int")),
            Box::new(Type::var("r")),
        );
        assert_eq!(row.to_string(), "( foo :: Prim.Int | r )");
    }

    #[test]
    fn test_constraint_display() {
        let con = Constraint::new(
            QName::new("Data.Show", "Show"),
            vec![list_of(Type::con("Prim", "Int"))],
        );
        assert_eq!(con.to_string(), "Data.Show.Show (Data.List.List Prim.Int)");
    }
}
