//! Admission checks attached to groups at first creation

use groupspace_types::{GroupPath, NodeId};
use std::collections::HashSet;
use std::sync::Arc;

/// Decides whether a remote node may join a group
pub trait Gatekeeper: Send + Sync {
    fn admit(&self, path: &GroupPath, node: &NodeId) -> bool;
}

impl<F> Gatekeeper for F
where
    F: Fn(&GroupPath, &NodeId) -> bool + Send + Sync,
{
    fn admit(&self, path: &GroupPath, node: &NodeId) -> bool {
        self(path, node)
    }
}

/// Gatekeeper admitting a fixed set of remote nodes
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    nodes: HashSet<NodeId>,
}

impl AllowList {
    pub fn new<I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = NodeId>,
    {
        Self {
            nodes: nodes.into_iter().collect(),
        }
    }
}

impl Gatekeeper for AllowList {
    fn admit(&self, _path: &GroupPath, node: &NodeId) -> bool {
        self.nodes.contains(node)
    }
}

/// Identity comparison of two optional gatekeeper handles
pub(crate) fn same_gatekeeper(
    a: Option<&Arc<dyn Gatekeeper>>,
    b: Option<&Arc<dyn Gatekeeper>>,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const (),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list() {
        let path = GroupPath::parse("c", "a").unwrap();
        let gate = AllowList::new([NodeId::new("k1")]);

        assert!(gate.admit(&path, &NodeId::new("k1")));
        assert!(!gate.admit(&path, &NodeId::new("k2")));
    }

    #[test]
    fn test_same_gatekeeper_is_identity() {
        let a: Arc<dyn Gatekeeper> = Arc::new(AllowList::default());
        let b: Arc<dyn Gatekeeper> = Arc::new(AllowList::default());

        assert!(same_gatekeeper(None, None));
        assert!(same_gatekeeper(Some(&a), Some(&a.clone())));
        assert!(!same_gatekeeper(Some(&a), Some(&b)));
        assert!(!same_gatekeeper(Some(&a), None));
    }
}
