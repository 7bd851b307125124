//! Vector clocks for causal delivery.
//!
//! Every peer session keeps one clock and stamps it on each outgoing
//! operation. Comparing a received stamp against the local clock tells the
//! mailbox whether everything the sender had seen has already been
//! delivered here.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::crdt::types::SiteId;

/// Per-site event counters owned by one site.
///
/// The owning site only ever increments its own entry; other entries advance
/// through [`merge`](Self::merge).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireVectorClock", from = "WireVectorClock")]
pub struct VectorClock {
    site: SiteId,
    counts: BTreeMap<SiteId, u64>,
}

impl VectorClock {
    /// Creates a clock for `site` with its own entry at zero.
    pub fn new(site: impl Into<SiteId>) -> Self {
        let site = site.into();
        let mut counts = BTreeMap::new();
        counts.insert(site.clone(), 0);
        VectorClock { site, counts }
    }

    /// Creates a clock from explicit entries, as received from a peer.
    pub fn with_entries<I, S>(site: impl Into<SiteId>, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<SiteId>,
    {
        VectorClock {
            site: site.into(),
            counts: entries
                .into_iter()
                .map(|(site, count)| (site.into(), count))
                .collect(),
        }
    }

    /// The site this clock belongs to.
    pub fn site(&self) -> &SiteId {
        &self.site
    }

    /// Returns the counter for `site` (0 if not present).
    pub fn get(&self, site: &str) -> u64 {
        self.counts.get(site).copied().unwrap_or(0)
    }

    /// All known sites and their counters, ordered by site.
    pub fn entries(&self) -> impl Iterator<Item = (&SiteId, u64)> {
        self.counts.iter().map(|(site, count)| (site, *count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Advances the owning site's counter and returns the new value.
    pub fn increment(&mut self) -> u64 {
        let count = self.counts.entry(self.site.clone()).or_insert(0);
        *count += 1;
        *count
    }

    /// Takes the entrywise maximum over the union of known sites.
    pub fn merge(&mut self, other: &VectorClock) {
        for (site, &count) in &other.counts {
            let entry = self.counts.entry(site.clone()).or_insert(0);
            if count > *entry {
                *entry = count;
            }
        }
    }

    fn sites<'a>(&'a self, other: &'a VectorClock) -> BTreeSet<&'a SiteId> {
        self.counts.keys().chain(other.counts.keys()).collect()
    }

    /// True iff every entry is <= the other's and at least one is strictly
    /// smaller.
    pub fn happened_before(&self, other: &VectorClock) -> bool {
        let mut strictly_less = false;
        for site in self.sites(other) {
            let (mine, theirs) = (self.get(site), other.get(site));
            if mine > theirs {
                return false;
            }
            strictly_less |= mine < theirs;
        }
        strictly_less
    }

    /// Neither clock happened before the other.
    pub fn concurrent(&self, other: &VectorClock) -> bool {
        !self.happened_before(other) && !other.happened_before(self)
    }

    /// Causal order where it exists, otherwise the owning sites compared
    /// lexicographically.
    ///
    /// Gives the delivery queue a deterministic draw order even among
    /// concurrent messages. Clocks of the same site that are equal or
    /// concurrent compare `Equal`.
    pub fn compare_to(&self, other: &VectorClock) -> Ordering {
        if self.happened_before(other) {
            Ordering::Less
        } else if other.happened_before(self) {
            Ordering::Greater
        } else {
            self.site.cmp(&other.site)
        }
    }

    /// True iff every entry except `except`'s is <= the other's.
    ///
    /// With `except` set to a message's sender, this checks that the sender
    /// had not seen anything the receiver has not delivered yet.
    pub fn all_less_than_or_equal_except(&self, except: &str, other: &VectorClock) -> bool {
        self.sites(other)
            .into_iter()
            .filter(|site| site.as_str() != except)
            .all(|site| self.get(site) <= other.get(site))
    }
}

/// Wire layout of a vector clock: the owner plus a flat entry list.
#[derive(Serialize, Deserialize)]
struct WireVectorClock {
    site: SiteId,
    entries: Vec<ClockEntry>,
}

#[derive(Serialize, Deserialize)]
struct ClockEntry {
    site: SiteId,
    clock: u64,
}

impl From<VectorClock> for WireVectorClock {
    fn from(vclock: VectorClock) -> Self {
        WireVectorClock {
            site: vclock.site,
            entries: vclock
                .counts
                .into_iter()
                .map(|(site, clock)| ClockEntry { site, clock })
                .collect(),
        }
    }
}

impl From<WireVectorClock> for VectorClock {
    fn from(wire: WireVectorClock) -> Self {
        VectorClock::with_entries(
            wire.site,
            wire.entries.into_iter().map(|entry| (entry.site, entry.clock)),
        )
    }
}
