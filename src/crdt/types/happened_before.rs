//! Happened-before sets attached to insert operations.
//!
//! When a site inserts after a reference node it records the timestamps of
//! every child the reference node had at that moment. Two sibling insertions
//! are then ordered by checking whether either author had seen the other.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::crdt::types::timestamp::Timestamp;

/// An immutable set of timestamps observed by an operation's author.
///
/// Backed by an ordered set so that the minimum element is available without
/// scanning, and so that serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HappenedBeforeSet {
    timestamps: BTreeSet<Timestamp>,
}

impl HappenedBeforeSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from any collection of timestamps.
    pub fn of<I>(timestamps: I) -> Self
    where
        I: IntoIterator<Item = Timestamp>,
    {
        HappenedBeforeSet {
            timestamps: timestamps.into_iter().collect(),
        }
    }

    /// Returns true if `timestamp` was observed.
    pub fn contains(&self, timestamp: &Timestamp) -> bool {
        self.timestamps.contains(timestamp)
    }

    /// Returns a copy of this set extended with `timestamp`.
    pub fn with(&self, timestamp: &Timestamp) -> Self {
        let mut timestamps = self.timestamps.clone();
        timestamps.insert(timestamp.clone());
        HappenedBeforeSet { timestamps }
    }

    /// Returns `self - other`.
    pub fn difference(&self, other: &HappenedBeforeSet) -> Self {
        HappenedBeforeSet {
            timestamps: self
                .timestamps
                .difference(&other.timestamps)
                .cloned()
                .collect(),
        }
    }

    /// The smallest timestamp by the timestamp total order, if any.
    pub fn min(&self) -> Option<&Timestamp> {
        self.timestamps.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Timestamp> {
        self.timestamps.iter()
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

impl FromIterator<Timestamp> for HappenedBeforeSet {
    fn from_iter<I: IntoIterator<Item = Timestamp>>(iter: I) -> Self {
        HappenedBeforeSet::of(iter)
    }
}
