//! Operation timestamps for the replicated tree.
//!
//! This module contains the Timestamp struct which gives every insertion a
//! globally unique identity and a total order across sites.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crdt::types::site::SiteId;

/// A `(site, clock)` pair minted by a site when it authors an operation.
///
/// Only the authoring site ever mints timestamps with its own site id, and its
/// clock strictly increases, so no two operations share a timestamp.
///
/// # Ordering
///
/// Timestamps are ordered first by clock, then by site. This ordering is used
/// when breaking ties between concurrent insertions at the same position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// The site that authored the operation
    pub site: SiteId,
    /// The author's logical clock at creation time
    pub clock: u64,
}

impl Timestamp {
    /// Creates a new timestamp.
    pub fn new(site: impl Into<SiteId>, clock: u64) -> Self {
        Timestamp {
            site: site.into(),
            clock,
        }
    }

    /// The timestamp carried by the virtual root node.
    ///
    /// The empty site id with clock 0 can never be minted by a real site,
    /// whose clocks start at 1.
    pub fn root() -> Self {
        Timestamp {
            site: SiteId::new(),
            clock: 0,
        }
    }

    /// Returns true if this is the root timestamp.
    pub fn is_root(&self) -> bool {
        self.clock == 0 && self.site.is_empty()
    }

    /// Canonical string form, `clock@site`.
    pub fn to_id_string(&self) -> String {
        self.to_string()
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.clock
            .cmp(&other.clock)
            .then_with(|| self.site.cmp(&other.site))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.clock, self.site)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ordering() {
        let a1 = Timestamp::new("a", 1);
        let b1 = Timestamp::new("b", 1);
        let a2 = Timestamp::new("a", 2);

        // Same clock, different site
        assert!(a1 < b1);

        // Clock dominates site
        assert!(b1 < a2);
        assert!(a1 < a2);
    }

    #[test]
    fn test_root_sorts_first() {
        let root = Timestamp::root();
        assert!(root.is_root());
        assert!(root < Timestamp::new("", 1));
        assert!(root < Timestamp::new("a", 1));
        assert!(!Timestamp::new("a", 0).is_root());
    }

    #[test]
    fn test_canonical_string_is_unambiguous() {
        // "11" + "a" and "1" + "1a" would collide without a separator
        let x = Timestamp::new("a", 11);
        let y = Timestamp::new("1a", 1);
        assert_ne!(x.to_id_string(), y.to_id_string());
        assert_eq!(x.to_id_string(), "11@a");
    }
}
