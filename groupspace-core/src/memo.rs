//! Memoization with early cutoff
//!
//! Composite evaluations are cached per remote node together with the
//! versions of the operand results they were computed from. A cached entry
//! is valid exactly when every operand still reports the same version.
//! When a recomputation reproduces the cached nodes, the entry keeps its
//! old version so callers further up do not recompute either.

use crate::tree::NodeRef;
use crate::version::Version;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use groupspace_types::NodeId;
use std::fmt;
use std::sync::Arc;

/// A cached evaluation
#[derive(Debug, Clone)]
pub struct MemoEntry {
    /// The cached nodes
    pub nodes: Arc<[NodeRef]>,

    /// Operand versions this was computed from
    pub stamps: Vec<Version>,

    /// Version handed to callers of this result
    pub version: Version,
}

impl MemoEntry {
    /// Check if `nodes` equals the cached result (early cutoff check)
    pub fn is_unchanged(&self, nodes: &[NodeRef]) -> bool {
        self.nodes.len() == nodes.len() && self.nodes.iter().zip(nodes).all(|(a, b)| a == b)
    }
}

/// Outcome of publishing a recomputed result
#[derive(Debug, Clone)]
pub(crate) struct Published {
    pub nodes: Arc<[NodeRef]>,
    pub version: Version,
    pub early_cutoff: bool,
}

/// Per-remote-node memo table
#[derive(Default)]
pub struct MemoTable {
    entries: DashMap<NodeId, MemoEntry>,
}

impl MemoTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached result if it was computed from exactly `stamps`
    pub fn lookup(&self, remote: &NodeId, stamps: &[Version]) -> Option<(Arc<[NodeRef]>, Version)> {
        self.entries
            .get(remote)
            .filter(|entry| entry.stamps == stamps)
            .map(|entry| (entry.nodes.clone(), entry.version))
    }

    /// Get the full memo entry
    pub fn get_entry(&self, remote: &NodeId) -> Option<MemoEntry> {
        self.entries.get(remote).map(|entry| entry.clone())
    }

    /// Store a recomputed result
    ///
    /// The old version is kept when the nodes did not change.
    pub(crate) fn publish(
        &self,
        remote: &NodeId,
        nodes: Vec<NodeRef>,
        stamps: Vec<Version>,
    ) -> Published {
        match self.entries.entry(remote.clone()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.stamps = stamps;
                if entry.is_unchanged(&nodes) {
                    Published {
                        nodes: entry.nodes.clone(),
                        version: entry.version,
                        early_cutoff: true,
                    }
                } else {
                    entry.nodes = nodes.into();
                    entry.version = Version::next();
                    Published {
                        nodes: entry.nodes.clone(),
                        version: entry.version,
                        early_cutoff: false,
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let entry = vacant.insert(MemoEntry {
                    nodes: nodes.into(),
                    stamps,
                    version: Version::next(),
                });
                Published {
                    nodes: entry.nodes.clone(),
                    version: entry.version,
                    early_cutoff: false,
                }
            }
        }
    }

    /// Drop the entry for one remote node
    pub fn invalidate(&self, remote: &NodeId) {
        self.entries.remove(remote);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for MemoTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoTable")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k() -> NodeId {
        NodeId::new("k1")
    }

    #[test]
    fn test_lookup_requires_matching_stamps() {
        let table = MemoTable::new();
        let v1 = Version::next();
        let v2 = Version::next();

        table.publish(&k(), Vec::new(), vec![v1]);
        assert!(table.lookup(&k(), &[v1]).is_some());
        assert!(table.lookup(&k(), &[v2]).is_none());
        assert!(table.lookup(&k(), &[v1, v2]).is_none());
        assert!(table.lookup(&NodeId::new("k2"), &[v1]).is_none());
    }

    #[test]
    fn test_early_cutoff_keeps_version() {
        let table = MemoTable::new();
        let first = table.publish(&k(), Vec::new(), vec![Version::next()]);
        assert!(!first.early_cutoff);

        let stamps = vec![Version::next()];
        let second = table.publish(&k(), Vec::new(), stamps.clone());
        assert!(second.early_cutoff);
        assert_eq!(first.version, second.version);

        // The refreshed stamps are what validate the entry now
        assert_eq!(table.lookup(&k(), &stamps).map(|(_, v)| v), Some(first.version));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let table = MemoTable::new();
        table.publish(&k(), Vec::new(), Vec::new());
        table.publish(&NodeId::new("k2"), Vec::new(), Vec::new());
        assert_eq!(table.len(), 2);

        table.invalidate(&k());
        assert!(table.get_entry(&k()).is_none());
        assert_eq!(table.len(), 1);

        table.clear();
        assert!(table.is_empty());
    }
}
