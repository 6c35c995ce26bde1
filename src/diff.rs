//! Identity-keyed diffing of entity collections.
//!
//! The diff is by id, not by value: an item whose id exists on both sides is
//! reported as updated even when none of its fields changed. Callers that need
//! to know whether anything actually changed use [`Diff::changed`].

use indexmap::IndexMap;
use std::collections::HashSet;

use crate::model::Id;

/// An item with a stable identity.
pub trait Keyed {
    fn key(&self) -> &Id;
}

/// Result of comparing two versions of a collection.
///
/// `added` and `updated` follow the order of the new collection, `removed`
/// follows the order of the old one.
#[derive(Debug, Clone, PartialEq)]
pub struct Diff<T> {
    pub added: Vec<T>,
    pub updated: Vec<T>,
    pub removed: Vec<T>,
}

impl<T> Default for Diff<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<T: Keyed> Diff<T> {
    /// Updated items paired with their previous version, keeping only those
    /// whose value differs.
    pub fn changed<'a>(&'a self, old: &'a [T]) -> Vec<(&'a T, &'a T)>
    where
        T: PartialEq,
    {
        let previous: IndexMap<&Id, &T> = old.iter().map(|item| (item.key(), item)).collect();
        self.updated
            .iter()
            .filter_map(|item| {
                let before = previous.get(item.key())?;
                (*before != item).then_some((*before, item))
            })
            .collect()
    }
}

/// Compare `old` and `new` by id in O(n + m).
pub fn diff<T: Keyed + Clone>(old: &[T], new: &[T]) -> Diff<T> {
    let old_ids: HashSet<&Id> = old.iter().map(Keyed::key).collect();
    let new_ids: HashSet<&Id> = new.iter().map(Keyed::key).collect();

    let mut out = Diff::default();
    for item in new {
        if old_ids.contains(item.key()) {
            out.updated.push(item.clone());
        } else {
            out.added.push(item.clone());
        }
    }
    out.removed = old
        .iter()
        .filter(|item| !new_ids.contains(item.key()))
        .cloned()
        .collect();
    out
}
