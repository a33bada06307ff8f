use std::{collections::BTreeSet, num::NonZeroUsize};

/// A set of distinct strings holding at most `limit` members.
///
/// Once full, values not already present are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundedDistinctSet {
    members: BTreeSet<String>,
    limit: Option<NonZeroUsize>,
}

impl BoundedDistinctSet {
    /// Create an empty set. A `limit` of 0 means unbounded.
    pub fn new(limit: usize) -> Self {
        Self {
            members: BTreeSet::new(),
            limit: NonZeroUsize::new(limit),
        }
    }

    /// Add `value`, returning `true` if it was not present and there was room
    /// for it.
    pub fn insert(&mut self, value: impl AsRef<str>) -> bool {
        let value = value.as_ref();
        if self.members.contains(value) {
            return false;
        }
        if self.limit.is_some_and(|limit| self.members.len() >= limit.get()) {
            return false;
        }
        self.members.insert(value.to_owned())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.members.contains(value)
    }

    /// Members in ascending lexicographic order.
    pub fn into_sorted_vec(self) -> Vec<String> {
        self.members.into_iter().collect()
    }
}
