//! The compiler environment consulted by the constraint solver.
//!
//! Holds data declarations, type classes, type synonyms, and newtype
//! descriptors. The built-in classes the solver synthesises instances for
//! are registered here as well, so that functional-dependency information is
//! available for them through the same lookup path as user classes.

use crate::types::{QName, Type, TypeClassInfo};
use crate::unify::TypeError;
use sablec_util::{FxHashMap, Symbol};

/// A data constructor and its field types
#[derive(Clone, Debug)]
pub struct DataConstructor {
    /// Constructor name
    pub name: Symbol,
    /// Field types, possibly mentioning the declaration's parameters
    pub fields: Vec<Type>,
}

/// A data type declaration
#[derive(Clone, Debug)]
pub struct DataDecl {
    /// Type parameters in declaration order
    pub params: Vec<Symbol>,
    /// Declared constructors
    pub constructors: Vec<DataConstructor>,
}

/// A newtype: single constructor, single field
#[derive(Clone, Debug)]
pub struct NewtypeInfo {
    /// Type parameters in declaration order
    pub params: Vec<Symbol>,
    /// The wrapped field type
    pub wrapped: Type,
    /// Constructor name, when exported
    pub ctor: Option<Symbol>,
}

/// A type synonym and its expansion
#[derive(Clone, Debug)]
pub struct SynonymInfo {
    /// Type parameters in declaration order
    pub params: Vec<Symbol>,
    /// The right-hand side
    pub body: Type,
}

/// Everything the solver knows about the program being checked
#[derive(Default)]
pub struct Environment {
    /// Data type declarations by name
    pub types: FxHashMap<QName, DataDecl>,
    /// Type classes by name
    pub type_classes: FxHashMap<QName, TypeClassInfo>,
    /// Type synonyms by name
    pub type_synonyms: FxHashMap<QName, SynonymInfo>,
    /// Newtype descriptors by name
    pub newtypes: FxHashMap<QName, NewtypeInfo>,
}

/// Maximum number of synonym expansion steps before assuming a cycle
const SYNONYM_FUEL: u32 = 512;

impl Environment {
    /// An environment with the built-in solver classes registered
    ///
    /// User code never writes instances for these; the solver computes them
    /// from type structure. They still need class metadata in the
    /// environment because candidate matching consults their functional
    /// dependencies.
    pub fn with_prim_classes() -> Self {
        let mut env = Environment::default();

        env.add_class(QName::new("Prim.Coerce", "Coercible"), TypeClassInfo::new(&["a", "b"]));
        env.add_class(QName::new("Prim", "Warn"), TypeClassInfo::new(&["message"]));
        env.add_class(QName::new("Sable.Symbol", "IsSymbol"), TypeClassInfo::new(&["sym"]));
        env.add_class(
            QName::new("Prim.Symbol", "SymbolCompare"),
            TypeClassInfo::new(&["left", "right", "ordering"]).with_fundep(vec![0, 1], vec![2]),
        );
        env.add_class(
            QName::new("Prim.Symbol", "SymbolAppend"),
            TypeClassInfo::new(&["left", "right", "appended"])
                .with_fundep(vec![0, 1], vec![2])
                .with_fundep(vec![0, 2], vec![1])
                .with_fundep(vec![1, 2], vec![0]),
        );
        env.add_class(
            QName::new("Prim.Symbol", "SymbolCons"),
            TypeClassInfo::new(&["head", "tail", "symbol"])
                .with_fundep(vec![0, 1], vec![2])
                .with_fundep(vec![2], vec![0, 1]),
        );
        env.add_class(
            QName::new("Prim.Row", "Union"),
            TypeClassInfo::new(&["left", "right", "union"])
                .with_fundep(vec![0, 1], vec![2])
                .with_fundep(vec![1, 2], vec![0])
                .with_fundep(vec![2, 0], vec![1]),
        );
        env.add_class(
            QName::new("Prim.Row", "Nub"),
            TypeClassInfo::new(&["original", "nubbed"]).with_fundep(vec![0], vec![1]),
        );
        env.add_class(QName::new("Prim.Row", "Lacks"), TypeClassInfo::new(&["label", "row"]));
        env.add_class(
            QName::new("Prim.Row", "Cons"),
            TypeClassInfo::new(&["label", "a", "tail", "row"])
                .with_fundep(vec![0, 1, 2], vec![3])
                .with_fundep(vec![0, 3], vec![1, 2]),
        );
        env.add_class(
            QName::new("Prim.RowList", "RowToList"),
            TypeClassInfo::new(&["row", "list"]).with_fundep(vec![0], vec![1]),
        );

        env
    }

    /// Register a data declaration
    pub fn add_data(&mut self, name: QName, decl: DataDecl) {
        self.types.insert(name, decl);
    }

    /// Register a type class
    pub fn add_class(&mut self, name: QName, info: TypeClassInfo) {
        self.type_classes.insert(name, info);
    }

    /// Register a type synonym
    pub fn add_synonym(&mut self, name: QName, info: SynonymInfo) {
        self.type_synonyms.insert(name, info);
    }

    /// Register a newtype
    ///
    /// The newtype is also visible as an ordinary single-constructor data
    /// declaration, which is what role inference walks.
    pub fn add_newtype(&mut self, name: QName, info: NewtypeInfo) {
        let decl = DataDecl {
            params: info.params.clone(),
            constructors: vec![DataConstructor {
                name: info.ctor.unwrap_or(name.name),
                fields: vec![info.wrapped.clone()],
            }],
        };
        self.types.insert(name, decl);
        self.newtypes.insert(name, info);
    }

    /// Look up a type class
    pub fn type_class(&self, name: &QName) -> Option<&TypeClassInfo> {
        self.type_classes.get(name)
    }

    /// Look up a data declaration
    pub fn data_decl(&self, name: &QName) -> Option<&DataDecl> {
        self.types.get(name)
    }

    /// Look up a newtype descriptor
    pub fn newtype_constructor(&self, name: &QName) -> Option<&NewtypeInfo> {
        self.newtypes.get(name)
    }

    /// Fully expand all type synonyms in a term
    ///
    /// Errors on under-applied synonyms and on expansion that fails to
    /// terminate within the fuel budget (cyclic synonyms).
    pub fn expand_synonyms(&self, ty: &Type) -> Result<Type, TypeError> {
        let mut fuel = SYNONYM_FUEL;
        self.expand_inner(ty, &mut fuel)
    }

    fn expand_inner(&self, ty: &Type, fuel: &mut u32) -> Result<Type, TypeError> {
        let (head, args) = ty.app_spine();
        if let Type::Con(name) = head {
            if let Some(synonym) = self.type_synonyms.get(name) {
                if *fuel == 0 {
                    return Err(TypeError::CycleInTypeSynonym(*name));
                }
                *fuel -= 1;
                if args.len() < synonym.params.len() {
                    return Err(TypeError::PartiallyAppliedSynonym(*name));
                }
                let mut map = FxHashMap::default();
                for (param, arg) in synonym.params.iter().zip(&args) {
                    map.insert(*param, (*arg).clone());
                }
                let expanded = synonym.body.replace_vars(&map);
                let rebuilt = Type::app_all(
                    expanded,
                    args[synonym.params.len()..].iter().map(|a| (*a).clone()),
                );
                return self.expand_inner(&rebuilt, fuel);
            }
        }

        Ok(match ty {
            Type::App(f, x) => {
                Type::app(self.expand_inner(f, fuel)?, self.expand_inner(x, fuel)?)
            }
            Type::ForAll { var, body, skolem } => Type::ForAll {
                var: *var,
                body: Box::new(self.expand_inner(body, fuel)?),
                skolem: *skolem,
            },
            Type::Kinded(t, k) => Type::Kinded(
                Box::new(self.expand_inner(t, fuel)?),
                Box::new(k.as_ref().clone()),
            ),
            Type::RCons(label, head, tail) => Type::RCons(
                *label,
                Box::new(self.expand_inner(head, fuel)?),
                Box::new(self.expand_inner(tail, fuel)?),
            ),
            other => other.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> Type {
        Type::con("Prim", "Int")
    }

    #[test]
    fn test_prim_classes_registered() {
        let env = Environment::with_prim_classes();
        let union = env.type_class(&QName::new("Prim.Row", "Union")).unwrap();
        assert_eq!(union.params.len(), 3);
        assert_eq!(union.fundeps.len(), 3);
        assert!(env.type_class(&QName::new("Prim.Coerce", "Coercible")).is_some());
    }

    #[test]
    fn test_expand_simple_synonym() {
        let mut env = Environment::default();
        env.add_synonym(
            QName::new("M", "MyInt"),
            SynonymInfo {
                params: vec![],
                body: int(),
            },
        );
        let expanded = env.expand_synonyms(&Type::con("M", "MyInt")).unwrap();
        assert_eq!(expanded, int());
    }

    #[test]
    fn test_expand_applied_synonym() {
        let mut env = Environment::default();
        // type Pair a = Tuple a a
        env.add_synonym(
            QName::new("M", "Pair"),
            SynonymInfo {
                params: vec![Symbol::intern("a")],
                body: Type::app_all(
                    Type::con("M", "Tuple"),
                    [Type::var("a"), Type::var("a")],
                ),
            },
        );
        let expanded = env
            .expand_synonyms(&Type::app(Type::con("M", "Pair"), int()))
            .unwrap();
        assert_eq!(
            expanded,
            Type::app_all(Type::con("M", "Tuple"), [int(), int()])
        );
    }

    #[test]
    fn test_expand_nested_synonyms() {
        let mut env = Environment::default();
        env.add_synonym(
            QName::new("M", "A"),
            SynonymInfo {
                params: vec![],
                body: Type::con("M", "B"),
            },
        );
        env.add_synonym(
            QName::new("M", "B"),
            SynonymInfo {
                params: vec![],
                body: int(),
            },
        );
        assert_eq!(env.expand_synonyms(&Type::con("M", "A")).unwrap(), int());
    }

    #[test]
    fn test_expand_partially_applied() {
        let mut env = Environment::default();
        env.add_synonym(
            QName::new("M", "Pair"),
            SynonymInfo {
                params: vec![Symbol::intern("a")],
                body: Type::var("a"),
            },
        );
        let err = env.expand_synonyms(&Type::con("M", "Pair")).unwrap_err();
        assert!(matches!(err, TypeError::PartiallyAppliedSynonym(_)));
    }

    #[test]
    fn test_expand_cyclic_synonym() {
        let mut env = Environment::default();
        env.add_synonym(
            QName::new("M", "Loop"),
            SynonymInfo {
                params: vec![],
                body: Type::con("M", "Loop"),
            },
        );
        let err = env.expand_synonyms(&Type::con("M", "Loop")).unwrap_err();
        assert!(matches!(err, TypeError::CycleInTypeSynonym(_)));
    }

    #[test]
    fn test_newtype_also_registers_data() {
        let mut env = Environment::default();
        env.add_newtype(
            QName::new("M", "Age"),
            NewtypeInfo {
                params: vec![],
                wrapped: int(),
                ctor: Some(Symbol::intern("Age")),
            },
        );
        assert!(env.newtype_constructor(&QName::new("M", "Age")).is_some());
        let decl = env.data_decl(&QName::new("M", "Age")).unwrap();
        assert_eq!(decl.constructors.len(), 1);
        assert_eq!(decl.constructors[0].fields, vec![int()]);
    }
}
