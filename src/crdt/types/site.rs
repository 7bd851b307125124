//! Site identifier type.
//!
//! A site is one peer session taking part in the collaboration. The transport
//! assigns the identifier once per session, so it is an opaque string.

/// A unique identifier for each site (peer session) in the distributed system.
///
/// Site identifiers only need to be unique and totally ordered; the ordering
/// is plain lexicographic string comparison.
pub type SiteId = String;
