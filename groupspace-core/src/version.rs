//! Version tokens for cache validation
//!
//! Every mutable activation view publishes a fresh token each time it
//! changes. Tokens come from one process-wide counter, so two distinct
//! publications never share a token even if the view that produced them
//! was dropped and recreated in between.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

/// Opaque version token compared by value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u64);

impl Version {
    /// Token of a view that has never held anything
    ///
    /// Absent views always denote the empty set, so every absent view may
    /// share this token.
    pub const ZERO: Version = Version(0);

    /// Allocate a fresh token, strictly greater than every earlier one
    pub fn next() -> Version {
        Version(NEXT_VERSION.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::ZERO
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
