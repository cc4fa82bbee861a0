//! The elaborated expression tree the solver rewrites.
//!
//! Only the shapes the solver produces or traverses are represented:
//! dictionary terms are variables, applications, lambdas, record literals,
//! and accessors; unsolved constraints sit in the tree as
//! [`Expr::DictPlaceholder`] nodes until a solve pass replaces them.

use crate::context::InstanceContext;
use sablec_ty::{Constraint, QName};
use sablec_util::Symbol;

/// The payload of a dictionary placeholder
#[derive(Clone, Debug, PartialEq)]
pub struct PlaceholderData {
    /// The wanted constraint
    pub constraint: Constraint,
    /// The instance context inherited at the placeholder's position
    pub context: InstanceContext,
    /// Constraints being solved when this placeholder was created
    pub hints: Vec<Constraint>,
}

/// An elaborated expression
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Variable reference
    Var(QName),
    /// Function application
    App(Box<Expr>, Box<Expr>),
    /// Lambda abstraction
    Lam(Symbol, Box<Expr>),
    /// String literal
    StringLit(Symbol),
    /// Record literal
    RecordLit(Vec<(Symbol, Expr)>),
    /// Record field access
    Accessor(Symbol, Box<Expr>),
    /// The canonical bottom value used in dictionary plumbing
    Undefined,
    /// Let binding
    Let(Symbol, Box<Expr>, Box<Expr>),
    /// Conditional
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    /// A wanted constraint awaiting a dictionary
    DictPlaceholder(Box<PlaceholderData>),
}

impl Expr {
    /// Build an application `f x`
    pub fn app(f: Expr, x: Expr) -> Expr {
        Expr::App(Box::new(f), Box::new(x))
    }

    /// A variable by local name
    pub fn local_var(name: &str) -> Expr {
        Expr::Var(QName::local(name))
    }

    /// Count the placeholders remaining in the tree
    pub fn placeholder_count(&self) -> usize {
        match self {
            Expr::DictPlaceholder(_) => 1,
            Expr::App(f, x) => f.placeholder_count() + x.placeholder_count(),
            Expr::Lam(_, body) => body.placeholder_count(),
            Expr::Accessor(_, e) => e.placeholder_count(),
            Expr::RecordLit(fields) => fields.iter().map(|(_, e)| e.placeholder_count()).sum(),
            Expr::Let(_, value, body) => value.placeholder_count() + body.placeholder_count(),
            Expr::If(c, t, e) => {
                c.placeholder_count() + t.placeholder_count() + e.placeholder_count()
            }
            _ => 0,
        }
    }
}

/// Rewrite every node of an expression, top-down
///
/// The function is applied to a node first; traversal then continues into
/// the children of whatever it returned. A node introduced by the rewrite is
/// therefore traversed, but not itself rewritten again.
pub fn everywhere_top_down_m<E, F>(expr: Expr, f: &mut F) -> Result<Expr, E>
where
    F: FnMut(Expr) -> Result<Expr, E>,
{
    let expr = f(expr)?;
    Ok(match expr {
        Expr::App(g, x) => Expr::App(
            Box::new(everywhere_top_down_m(*g, f)?),
            Box::new(everywhere_top_down_m(*x, f)?),
        ),
        Expr::Lam(var, body) => Expr::Lam(var, Box::new(everywhere_top_down_m(*body, f)?)),
        Expr::Accessor(label, e) => {
            Expr::Accessor(label, Box::new(everywhere_top_down_m(*e, f)?))
        }
        Expr::RecordLit(fields) => Expr::RecordLit(
            fields
                .into_iter()
                .map(|(label, e)| Ok((label, everywhere_top_down_m(e, f)?)))
                .collect::<Result<Vec<_>, E>>()?,
        ),
        Expr::Let(name, value, body) => Expr::Let(
            name,
            Box::new(everywhere_top_down_m(*value, f)?),
            Box::new(everywhere_top_down_m(*body, f)?),
        ),
        Expr::If(c, t, e) => Expr::If(
            Box::new(everywhere_top_down_m(*c, f)?),
            Box::new(everywhere_top_down_m(*t, f)?),
            Box::new(everywhere_top_down_m(*e, f)?),
        ),
        leaf => leaf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_replaces_vars() {
        let expr = Expr::app(Expr::local_var("f"), Expr::local_var("x"));
        let rewritten: Result<Expr, ()> = everywhere_top_down_m(expr, &mut |e| {
            Ok(match e {
                Expr::Var(v) if v == QName::local("x") => Expr::local_var("y"),
                other => other,
            })
        });
        assert_eq!(
            rewritten.unwrap(),
            Expr::app(Expr::local_var("f"), Expr::local_var("y"))
        );
    }

    #[test]
    fn test_rewrite_visits_introduced_children() {
        // Replacing `x` with `g y` must still rewrite the new `y` child
        let expr = Expr::local_var("x");
        let rewritten: Result<Expr, ()> = everywhere_top_down_m(expr, &mut |e| {
            Ok(match e {
                Expr::Var(v) if v == QName::local("x") => {
                    Expr::app(Expr::local_var("g"), Expr::local_var("y"))
                }
                Expr::Var(v) if v == QName::local("y") => Expr::local_var("z"),
                other => other,
            })
        });
        assert_eq!(
            rewritten.unwrap(),
            Expr::app(Expr::local_var("g"), Expr::local_var("z"))
        );
    }

    #[test]
    fn test_rewrite_propagates_errors() {
        let expr = Expr::app(Expr::local_var("f"), Expr::Undefined);
        let rewritten: Result<Expr, &'static str> = everywhere_top_down_m(expr, &mut |e| {
            if matches!(e, Expr::Undefined) {
                Err("boom")
            } else {
                Ok(e)
            }
        });
        assert_eq!(rewritten, Err("boom"));
    }

    #[test]
    fn test_placeholder_count() {
        use sablec_ty::QName as Q;
        let data = PlaceholderData {
            constraint: Constraint::new(Q::new("C", "C"), vec![]),
            context: InstanceContext::new(),
            hints: vec![],
        };
        let expr = Expr::app(
            Expr::DictPlaceholder(Box::new(data.clone())),
            Expr::Lam(
                Symbol::intern("x"),
                Box::new(Expr::DictPlaceholder(Box::new(data))),
            ),
        );
        assert_eq!(expr.placeholder_count(), 2);
    }
}
