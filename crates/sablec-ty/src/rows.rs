//! Row decomposition and alignment.
//!
//! Rows are unordered by label but stored as a cons list, so any comparison
//! of two rows must first pair up entries with equal labels and set aside
//! whatever is left. That alignment is implemented exactly once, here, and
//! shared by unification, instance head matching, and the row built-ins.

use crate::types::Type;
use sablec_util::Symbol;

/// A labelled field of a row
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowEntry {
    /// Field label
    pub label: Symbol,
    /// Field type
    pub ty: Type,
}

impl RowEntry {
    /// Build an entry
    pub fn new(label: Symbol, ty: Type) -> Self {
        Self { label, ty }
    }
}

/// Split a row into its fixed fields and its tail
///
/// Kinded wrappers are transparent. The tail is whatever non-`RCons` term
/// terminates the list: `REmpty` for a closed row, a variable or unknown for
/// an open one.
pub fn row_to_list(ty: &Type) -> (Vec<RowEntry>, Type) {
    let mut entries = Vec::new();
    let mut current = ty.strip_kinded();
    while let Type::RCons(label, head, tail) = current {
        entries.push(RowEntry::new(*label, head.as_ref().clone()));
        current = tail.strip_kinded();
    }
    (entries, current.clone())
}

/// Rebuild a row from fixed fields and a tail
pub fn row_from_list(entries: &[RowEntry], tail: Type) -> Type {
    entries.iter().rev().fold(tail, |acc, entry| {
        Type::RCons(entry.label, Box::new(entry.ty.clone()), Box::new(acc))
    })
}

/// The result of aligning two rows by label
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowAlignment {
    /// Pairs of entries whose labels matched, label-sorted
    pub common: Vec<(RowEntry, RowEntry)>,
    /// Left entries with no counterpart on the right
    pub left_rest: Vec<RowEntry>,
    /// Right entries with no counterpart on the left
    pub right_rest: Vec<RowEntry>,
    /// Tail of the left row
    pub left_tail: Type,
    /// Tail of the right row
    pub right_tail: Type,
}

/// Align two rows by label equality
///
/// Entries are sorted by label on each side (stably, so duplicate labels
/// keep their relative order) and then merged: equal labels pair up,
/// everything else lands in the per-side leftovers. Duplicate labels pair
/// positionally, first with first.
pub fn align_rows(left: &Type, right: &Type) -> RowAlignment {
    let (mut l_entries, left_tail) = row_to_list(left);
    let (mut r_entries, right_tail) = row_to_list(right);
    l_entries.sort_by_key(|e| e.label);
    r_entries.sort_by_key(|e| e.label);

    let mut common = Vec::new();
    let mut left_rest = Vec::new();
    let mut right_rest = Vec::new();

    let mut l_iter = l_entries.into_iter().peekable();
    let mut r_iter = r_entries.into_iter().peekable();
    loop {
        match (l_iter.peek(), r_iter.peek()) {
            (Some(l), Some(r)) => {
                if l.label == r.label {
                    common.push((l_iter.next().unwrap(), r_iter.next().unwrap()));
                } else if l.label < r.label {
                    left_rest.push(l_iter.next().unwrap());
                } else {
                    right_rest.push(r_iter.next().unwrap());
                }
            }
            (Some(_), None) => left_rest.push(l_iter.next().unwrap()),
            (None, Some(_)) => right_rest.push(r_iter.next().unwrap()),
            (None, None) => break,
        }
    }

    RowAlignment {
        common,
        left_rest,
        right_rest,
        left_tail,
        right_tail,
    }
}
