//! Type definitions for the replicated tree.
//!
//! This module contains the identity types used throughout the RGA
//! implementation, organized into focused submodules.

pub mod happened_before;
pub mod site;
pub mod timestamp;

pub use happened_before::HappenedBeforeSet;
pub use site::SiteId;
pub use timestamp::Timestamp;
