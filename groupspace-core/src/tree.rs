//! The group forest
//!
//! One tree per community. Every node keeps a reference count (from
//! joins), a reserved flag, and a per-remote-node activation record. The
//! activation record of a node also lists which of its descendants are
//! active for that remote node, so subtree queries never walk the tree.
//!
//! Mutations lock the chain root-to-leaf and hold every guard until the
//! ancestors agree with the leaf. The forest map lock is only ever taken
//! after a root lock, never before one.

use crate::error::{integrity_violation, NamespaceError, Result};
use crate::gatekeeper::{same_gatekeeper, Gatekeeper};
use crate::namespace::JoinOptions;
use crate::version::Version;
use groupspace_types::{GroupPath, NodeId};
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write as _};
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

type StateGuard = ArcMutexGuard<RawMutex, NodeState>;

/// A node of a community tree
pub struct GroupNode {
    /// `None` for the community root
    path: Option<GroupPath>,
    community: String,
    parent: Option<Weak<GroupNode>>,
    distributed: bool,
    gatekeeper: Option<Arc<dyn Gatekeeper>>,
    state: Arc<Mutex<NodeState>>,
}

#[derive(Default)]
struct NodeState {
    children: Arc<BTreeMap<String, Arc<GroupNode>>>,
    reserved: bool,
    references: usize,
    /// Set once the node is unlinked from its tree
    detached: bool,
    remote: HashMap<NodeId, RemoteState>,
}

impl NodeState {
    fn is_prunable(&self) -> bool {
        self.references == 0 && self.remote.is_empty() && self.children.is_empty()
    }
}

/// Activation record of one node for one remote node
#[derive(Default)]
struct RemoteState {
    activation: usize,
    /// Active strict descendants, in activation order
    descendants: Arc<Vec<NodeRef>>,
    version: Version,
}

impl GroupNode {
    fn root(community: &str) -> Arc<Self> {
        Arc::new(Self {
            path: None,
            community: community.to_string(),
            parent: None,
            distributed: true,
            gatekeeper: None,
            state: Arc::new(Mutex::new(NodeState::default())),
        })
    }

    fn child(
        parent: &Arc<GroupNode>,
        path: GroupPath,
        options: &JoinOptions,
        reserved: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            community: path.community().to_string(),
            path: Some(path),
            parent: Some(Arc::downgrade(parent)),
            distributed: options.distributed,
            gatekeeper: options.gatekeeper.clone(),
            state: Arc::new(Mutex::new(NodeState {
                reserved,
                ..NodeState::default()
            })),
        })
    }

    pub fn community(&self) -> &str {
        &self.community
    }

    /// Full path of this group
    pub fn path(&self) -> &GroupPath {
        match &self.path {
            Some(path) => path,
            None => integrity_violation!("community root {} escaped as a group", self.community),
        }
    }

    /// Last path segment; empty for a community root
    pub fn name(&self) -> &str {
        self.path.as_ref().map(GroupPath::name).unwrap_or("")
    }

    pub fn is_root(&self) -> bool {
        self.path.is_none()
    }

    pub fn is_distributed(&self) -> bool {
        self.distributed
    }

    pub fn gatekeeper(&self) -> Option<&Arc<dyn Gatekeeper>> {
        self.gatekeeper.as_ref()
    }

    pub fn is_reserved(&self) -> bool {
        self.state.lock().reserved
    }

    /// Number of outstanding join handles
    pub fn references(&self) -> usize {
        self.state.lock().references
    }

    /// Whether the node was unlinked by pruning or shutdown
    pub fn is_detached(&self) -> bool {
        self.state.lock().detached
    }

    /// Activation counter for `remote`
    pub fn activation(&self, remote: &NodeId) -> usize {
        self.state
            .lock()
            .remote
            .get(remote)
            .map(|r| r.activation)
            .unwrap_or(0)
    }

    pub fn is_active(&self, remote: &NodeId) -> bool {
        self.activation(remote) > 0
    }

    /// Remote nodes on which this group is active, sorted
    pub fn active_remote_nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self
            .state
            .lock()
            .remote
            .iter()
            .filter(|(_, r)| r.activation > 0)
            .map(|(k, _)| k.clone())
            .collect();
        nodes.sort();
        nodes
    }

    /// Active strict descendants for `remote`, in activation order
    pub fn active_descendants(&self, remote: &NodeId) -> Vec<NodeRef> {
        self.state
            .lock()
            .remote
            .get(remote)
            .map(|r| r.descendants.to_vec())
            .unwrap_or_default()
    }

    /// Direct children, ordered by name
    pub fn children(&self) -> Vec<NodeRef> {
        let children = self.state.lock().children.clone();
        children.values().cloned().map(NodeRef).collect()
    }

    /// Parent group, unless the parent is the community root
    pub fn parent(&self) -> Option<NodeRef> {
        self.parent_arc()
            .filter(|parent| !parent.is_root())
            .map(NodeRef)
    }

    fn parent_arc(&self) -> Option<Arc<GroupNode>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Nodes this node represents for `remote`, with the version of the
    /// record they were read from
    ///
    /// The version is [`Version::ZERO`] when no record exists, which only
    /// happens when the answer is empty.
    pub(crate) fn represented(
        self: &Arc<Self>,
        remote: &NodeId,
        subtree: bool,
    ) -> (Vec<NodeRef>, Version) {
        let (active, descendants, version) = {
            let state = self.state.lock();
            match state.remote.get(remote) {
                Some(record) => (
                    record.activation > 0,
                    record.descendants.clone(),
                    record.version,
                ),
                None => return (Vec::new(), Version::ZERO),
            }
        };

        let mut nodes = Vec::with_capacity(1 + if subtree { descendants.len() } else { 0 });
        if active {
            nodes.push(NodeRef(self.clone()));
        }
        if subtree {
            nodes.extend(descendants.iter().cloned());
        }
        (nodes, version)
    }

    /// This node and its ancestors, root first
    fn chain(self: &Arc<Self>) -> Vec<Arc<GroupNode>> {
        let mut chain = vec![self.clone()];
        let mut current = self.clone();
        while let Some(parent) = current.parent_arc() {
            chain.push(parent.clone());
            current = parent;
        }
        chain.reverse();
        chain
    }

    fn child_named(&self, name: &str) -> Option<Arc<GroupNode>> {
        self.state.lock().children.get(name).cloned()
    }

    fn warn_conflicts(&self, options: &JoinOptions) {
        if self.distributed != options.distributed {
            warn!(
                group = %self.path(),
                declared = options.distributed,
                kept = self.distributed,
                "group re-declared with a different distributed flag"
            );
        }
        if !same_gatekeeper(self.gatekeeper.as_ref(), options.gatekeeper.as_ref()) {
            warn!(
                group = %self.path(),
                "group re-declared with a different gatekeeper"
            );
        }
    }
}

impl fmt::Debug for GroupNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("GroupNode");
        match &self.path {
            Some(path) => s.field("path", &path.to_string()),
            None => s.field("root", &self.community),
        };
        s.field("distributed", &self.distributed)
            .field("gatekeeper", &self.gatekeeper.is_some())
            .finish()
    }
}

fn lock_chain(chain: &[Arc<GroupNode>]) -> Vec<StateGuard> {
    chain.iter().map(|node| node.state.lock_arc()).collect()
}

/// Ask `gatekeeper`, if any, whether `remote` may join `path`
fn admit(
    gatekeeper: Option<&Arc<dyn Gatekeeper>>,
    path: &GroupPath,
    remote: &NodeId,
) -> Result<()> {
    match gatekeeper {
        Some(gatekeeper) if !gatekeeper.admit(path, remote) => {
            info!(group = %path, %remote, "admission refused");
            Err(NamespaceError::AccessDenied {
                path: path.clone(),
                node: remote.clone(),
            })
        }
        _ => Ok(()),
    }
}

/// Identity handle on a group node
///
/// Two refs are equal iff they point at the same node object.
#[derive(Clone)]
pub struct NodeRef(pub(crate) Arc<GroupNode>);

impl NodeRef {
    pub fn ptr_eq(&self, other: &NodeRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for NodeRef {
    type Target = GroupNode;

    fn deref(&self) -> &GroupNode {
        &self.0
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for NodeRef {}

impl Hash for NodeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.path {
            Some(path) => write!(f, "{}", path),
            None => write!(f, "{}:/", self.0.community),
        }
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({})", self)
    }
}

/// All community trees of a namespace
#[derive(Debug, Default)]
pub(crate) struct Forest {
    roots: RwLock<BTreeMap<String, Arc<GroupNode>>>,
}

impl Forest {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn root_or_create(&self, community: &str) -> Arc<GroupNode> {
        if let Some(root) = self.roots.read().get(community) {
            return root.clone();
        }
        let mut roots = self.roots.write();
        roots
            .entry(community.to_string())
            .or_insert_with(|| {
                debug!(community, "community created");
                GroupNode::root(community)
            })
            .clone()
    }

    fn remove_root(&self, root: &Arc<GroupNode>) {
        let mut roots = self.roots.write();
        if roots
            .get(&root.community)
            .is_some_and(|current| Arc::ptr_eq(current, root))
        {
            roots.remove(&root.community);
            debug!(community = %root.community, "community removed");
        }
    }

    /// Snapshot of the community roots, ordered by name
    pub(crate) fn roots(&self) -> Vec<Arc<GroupNode>> {
        self.roots.read().values().cloned().collect()
    }

    pub(crate) fn communities(&self) -> Vec<String> {
        self.roots.read().keys().cloned().collect()
    }

    pub(crate) fn has_community(&self, community: &str) -> bool {
        self.roots.read().contains_key(community)
    }

    /// Look a node up without creating anything
    pub(crate) fn resolve(&self, path: &GroupPath) -> Option<Arc<GroupNode>> {
        let mut node = self.roots.read().get(path.community()).cloned()?;
        for segment in path.segments() {
            node = node.child_named(segment)?;
        }
        Some(node)
    }

    /// Find or create the node at `path` and add one reference to it
    ///
    /// Admission is checked before anything is created or reserved: against
    /// the existing node's gatekeeper, or against the one in `options` when
    /// the node is new. Gatekeepers run under the node locks and must not
    /// call back into the namespace.
    pub(crate) fn get_or_create(
        &self,
        path: &GroupPath,
        remote: &NodeId,
        options: &JoinOptions,
        warn_conflicts: bool,
    ) -> Result<Arc<GroupNode>> {
        loop {
            let root = self.root_or_create(path.community());
            let guard = root.state.lock_arc();
            if guard.detached {
                // pruned between lookup and lock
                continue;
            }
            let result = Self::reference_below(
                root.clone(),
                guard,
                path,
                remote,
                options,
                warn_conflicts,
            );
            if result.is_err() {
                self.prune_empty_root(&root);
            }
            return result;
        }
    }

    fn reference_below(
        root: Arc<GroupNode>,
        root_guard: StateGuard,
        path: &GroupPath,
        remote: &NodeId,
        options: &JoinOptions,
        warn_conflicts: bool,
    ) -> Result<Arc<GroupNode>> {
        let depth = path.depth();
        let mut held: Vec<StateGuard> = Vec::with_capacity(depth);
        let mut node = root;
        let mut guard = root_guard;
        let mut created = false;

        let prefixes = path.prefixes();
        for (i, (segment, child_path)) in path.segments().iter().zip(prefixes).enumerate() {
            let terminal = i + 1 == depth;
            let existing = guard.children.get(segment).cloned();
            let child = match existing {
                Some(child) => child,
                None => {
                    if !created {
                        admit(options.gatekeeper.as_ref(), path, remote)?;
                    }
                    let child = GroupNode::child(
                        &node,
                        child_path,
                        options,
                        terminal && options.reserved,
                    );
                    Arc::make_mut(&mut guard.children).insert(segment.clone(), child.clone());
                    created = true;
                    child
                }
            };
            let child_guard = child.state.lock_arc();
            held.push(guard);
            guard = child_guard;
            node = child;
        }

        if !created {
            admit(node.gatekeeper.as_ref(), path, remote)?;
            if guard.reserved {
                return Err(NamespaceError::Reserved(path.clone()));
            }
            if options.reserved && guard.references > 0 {
                return Err(NamespaceError::CannotReserve {
                    path: path.clone(),
                    references: guard.references,
                });
            }
            if options.reserved {
                guard.reserved = true;
            }
            if warn_conflicts {
                node.warn_conflicts(options);
            }
        }

        guard.references += 1;
        debug!(
            group = %path,
            references = guard.references,
            created,
            "group referenced"
        );
        Ok(node)
    }

    /// Drop a root left empty by a failed join
    fn prune_empty_root(&self, root: &Arc<GroupNode>) {
        let mut guard = root.state.lock();
        if !guard.detached && guard.is_prunable() {
            guard.detached = true;
            self.remove_root(root);
        }
    }

    /// Drop one reference, pruning whatever became unused
    ///
    /// A group that is still active keeps its place in the tree after its
    /// last reference goes; its final deactivation prunes it.
    pub(crate) fn release(&self, node: &Arc<GroupNode>) {
        let chain = node.chain();
        let mut guards = lock_chain(&chain);
        let last = guards.len() - 1;
        let state = &mut guards[last];

        if state.references == 0 {
            integrity_violation!("{} released more often than referenced", node.path());
        }
        state.references -= 1;
        if state.detached {
            return;
        }
        debug!(group = %node.path(), references = state.references, "group released");
        self.prune_upward(&chain, &mut guards);
    }

    /// Add `count` to the activation of `node` for `remote`
    ///
    /// Returns true on the inactive to active edge.
    pub(crate) fn activate(&self, node: &Arc<GroupNode>, remote: &NodeId, count: usize) -> bool {
        if count == 0 {
            return false;
        }
        let chain = node.chain();
        let mut guards = lock_chain(&chain);
        let last = guards.len() - 1;

        if guards[last].detached {
            warn!(group = %node.path(), %remote, "activation on a detached group ignored");
            return false;
        }

        let record = guards[last].remote.entry(remote.clone()).or_default();
        let before = record.activation;
        record.activation += count;
        if before > 0 {
            return false;
        }
        record.version = Version::next();

        let me = NodeRef(node.clone());
        for guard in guards[..last].iter_mut() {
            let record = guard.remote.entry(remote.clone()).or_default();
            Arc::make_mut(&mut record.descendants).push(me.clone());
            record.version = Version::next();
        }
        debug!(group = %node.path(), %remote, "group activated");
        true
    }

    /// Subtract `count` from the activation of `node` for `remote`
    ///
    /// Returns true on the active to inactive edge.
    pub(crate) fn deactivate(
        &self,
        node: &Arc<GroupNode>,
        remote: &NodeId,
        count: usize,
    ) -> bool {
        if count == 0 {
            return false;
        }
        let chain = node.chain();
        let mut guards = lock_chain(&chain);
        let last = guards.len() - 1;

        if guards[last].detached {
            warn!(group = %node.path(), %remote, "deactivation on a detached group ignored");
            return false;
        }

        let state = &mut guards[last];
        let Some(record) = state.remote.get_mut(remote) else {
            integrity_violation!("{} deactivated on {} but it is not active", node.path(), remote)
        };
        if record.activation < count {
            integrity_violation!(
                "{} deactivated {} time(s) on {} but active only {}",
                node.path(),
                count,
                remote,
                record.activation
            );
        }
        record.activation -= count;
        if record.activation > 0 {
            return false;
        }
        record.version = Version::next();
        if record.descendants.is_empty() {
            state.remote.remove(remote);
        }

        let me = NodeRef(node.clone());
        for guard in guards[..last].iter_mut() {
            let Some(record) = guard.remote.get_mut(remote) else {
                integrity_violation!("ancestor of {} has no record for {}", node.path(), remote)
            };
            let descendants = Arc::make_mut(&mut record.descendants);
            let Some(pos) = descendants.iter().position(|n| *n == me) else {
                integrity_violation!("ancestor of {} does not list it as active", node.path())
            };
            descendants.remove(pos);
            record.version = Version::next();
            if record.activation == 0 && record.descendants.is_empty() {
                guard.remote.remove(remote);
            }
        }
        debug!(group = %node.path(), %remote, "group deactivated");

        self.prune_upward(&chain, &mut guards);
        true
    }

    /// Unlink nodes from the leaf upward while they hold nothing
    fn prune_upward(&self, chain: &[Arc<GroupNode>], guards: &mut [StateGuard]) {
        for i in (0..chain.len()).rev() {
            if !guards[i].is_prunable() {
                break;
            }
            guards[i].detached = true;

            if i == 0 {
                if chain[0].is_root() {
                    self.remove_root(&chain[0]);
                }
                break;
            }

            let name = chain[i].name();
            match Arc::make_mut(&mut guards[i - 1].children).remove(name) {
                Some(removed) if Arc::ptr_eq(&removed, &chain[i]) => {}
                _ => integrity_violation!("{} missing from its parent", chain[i].path()),
            }
            debug!(group = %chain[i].path(), "group pruned");
        }
    }

    /// Detach and drop every tree
    pub(crate) fn shutdown(&self) {
        let roots = std::mem::take(&mut *self.roots.write());
        for root in roots.values() {
            detach_all(root);
        }
        debug!(communities = roots.len(), "forest cleared");
    }

    /// Indented listing of every tree
    pub(crate) fn dump(&self) -> String {
        let mut out = String::new();
        for root in self.roots() {
            let _ = writeln!(out, "{}", root.community);
            dump_children(&root, 1, &mut out);
        }
        out
    }
}

fn detach_all(node: &Arc<GroupNode>) {
    let children = {
        let mut state = node.state.lock();
        state.detached = true;
        state.children.clone()
    };
    for child in children.values() {
        detach_all(child);
    }
}

fn dump_children(node: &GroupNode, depth: usize, out: &mut String) {
    let children = node.state.lock().children.clone();
    for child in children.values() {
        let (references, reserved, mut active) = {
            let state = child.state.lock();
            let active: Vec<(NodeId, usize)> = state
                .remote
                .iter()
                .filter(|(_, r)| r.activation > 0)
                .map(|(k, r)| (k.clone(), r.activation))
                .collect();
            (state.references, state.reserved, active)
        };
        active.sort();

        let _ = write!(
            out,
            "{:indent$}{}/ refs={}",
            "",
            child.name(),
            references,
            indent = depth * 2
        );
        if reserved {
            out.push_str(" reserved");
        }
        if child.distributed {
            out.push_str(" distributed");
        }
        for (remote, activation) in active {
            let _ = write!(out, " {}={}", remote, activation);
        }
        out.push('\n');
        dump_children(child, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatekeeper::AllowList;

    fn path(p: &str) -> GroupPath {
        GroupPath::parse("c", p).unwrap()
    }

    fn k(id: &str) -> NodeId {
        NodeId::new(id)
    }

    #[test]
    fn test_get_or_create_builds_intermediates() {
        let forest = Forest::new();
        let b = forest
            .get_or_create(&path("a/b"), &k("k0"), &JoinOptions::default(), true)
            .unwrap();

        assert_eq!(b.references(), 1);
        let a = forest.resolve(&path("a")).unwrap();
        assert_eq!(a.references(), 0);
        assert_eq!(a.children().len(), 1);
        assert!(b.parent().unwrap().ptr_eq(&NodeRef(a)));
        assert_eq!(forest.communities(), vec!["c".to_string()]);
    }

    #[test]
    fn test_release_prunes_to_root() {
        let forest = Forest::new();
        let b = forest
            .get_or_create(&path("a/b"), &k("k0"), &JoinOptions::default(), true)
            .unwrap();

        forest.release(&b);
        assert!(b.is_detached());
        assert!(forest.resolve(&path("a")).is_none());
        assert!(!forest.has_community("c"));
    }

    #[test]
    fn test_release_keeps_referenced_ancestor() {
        let forest = Forest::new();
        let options = JoinOptions::default();
        let a = forest.get_or_create(&path("a"), &k("k0"), &options, true).unwrap();
        let b = forest.get_or_create(&path("a/b"), &k("k0"), &options, true).unwrap();

        forest.release(&b);
        assert!(forest.resolve(&path("a/b")).is_none());
        assert!(forest.resolve(&path("a")).is_some());

        forest.release(&a);
        assert!(!forest.has_community("c"));
    }

    #[test]
    fn test_activation_edges_update_ancestors() {
        let forest = Forest::new();
        let b = forest
            .get_or_create(&path("a/b"), &k("k0"), &JoinOptions::default(), true)
            .unwrap();
        let a = forest.resolve(&path("a")).unwrap();

        assert!(forest.activate(&b, &k("k1"), 1));
        assert!(!forest.activate(&b, &k("k1"), 1));
        assert_eq!(b.activation(&k("k1")), 2);
        assert_eq!(a.active_descendants(&k("k1")).len(), 1);
        assert!(!a.is_active(&k("k1")));

        assert!(!forest.deactivate(&b, &k("k1"), 1));
        assert!(forest.deactivate(&b, &k("k1"), 1));
        assert!(a.active_descendants(&k("k1")).is_empty());
        assert!(b.active_remote_nodes().is_empty());
    }

    #[test]
    fn test_versions_move_on_edges_only() {
        let forest = Forest::new();
        let b = forest
            .get_or_create(&path("a/b"), &k("k0"), &JoinOptions::default(), true)
            .unwrap();
        let a = forest.resolve(&path("a")).unwrap();

        let (_, v0) = a.represented(&k("k1"), true);
        assert_eq!(v0, Version::ZERO);

        forest.activate(&b, &k("k1"), 1);
        let (nodes, v1) = a.represented(&k("k1"), true);
        assert_eq!(nodes.len(), 1);
        assert_ne!(v1, Version::ZERO);

        forest.activate(&b, &k("k1"), 1);
        let (_, v2) = a.represented(&k("k1"), true);
        assert_eq!(v1, v2);
    }

    #[test]
    fn test_represented_plain_vs_subtree() {
        let forest = Forest::new();
        let options = JoinOptions::default();
        let a = forest.get_or_create(&path("a"), &k("k0"), &options, true).unwrap();
        let b = forest.get_or_create(&path("a/b"), &k("k0"), &options, true).unwrap();
        forest.activate(&b, &k("k1"), 1);

        assert!(a.represented(&k("k1"), false).0.is_empty());
        assert_eq!(a.represented(&k("k1"), true).0, vec![NodeRef(b.clone())]);

        forest.activate(&a, &k("k1"), 1);
        let (nodes, _) = a.represented(&k("k1"), true);
        assert_eq!(nodes, vec![NodeRef(a.clone()), NodeRef(b.clone())]);
    }

    #[test]
    fn test_reserved_terminal() {
        let forest = Forest::new();
        let reserved = JoinOptions::default().reserved(true);
        let a = forest.get_or_create(&path("a"), &k("k0"), &reserved, true).unwrap();
        assert!(a.is_reserved());

        let err = forest
            .get_or_create(&path("a"), &k("k0"), &JoinOptions::default(), true)
            .unwrap_err();
        assert!(matches!(err, NamespaceError::Reserved(_)));

        // Children of a reserved group stay joinable
        assert!(forest
            .get_or_create(&path("a/b"), &k("k0"), &JoinOptions::default(), true)
            .is_ok());
    }

    #[test]
    fn test_cannot_reserve_referenced() {
        let forest = Forest::new();
        forest
            .get_or_create(&path("a"), &k("k0"), &JoinOptions::default(), true)
            .unwrap();
        let err = forest
            .get_or_create(&path("a"), &k("k0"), &JoinOptions::default().reserved(true), true)
            .unwrap_err();
        assert_eq!(
            err,
            NamespaceError::CannotReserve {
                path: path("a"),
                references: 1
            }
        );
    }

    #[test]
    fn test_reserve_existing_intermediate() {
        let forest = Forest::new();
        forest
            .get_or_create(&path("a/b"), &k("k0"), &JoinOptions::default(), true)
            .unwrap();
        let a = forest
            .get_or_create(&path("a"), &k("k0"), &JoinOptions::default().reserved(true), true)
            .unwrap();
        assert!(a.is_reserved());
        assert_eq!(a.references(), 1);
    }

    #[test]
    fn test_first_declaration_wins() {
        let forest = Forest::new();
        forest
            .get_or_create(&path("a"), &k("k0"), &JoinOptions::default().distributed(true), true)
            .unwrap();
        let again = forest
            .get_or_create(&path("a"), &k("k0"), &JoinOptions::default(), true)
            .unwrap();
        assert!(again.is_distributed());
    }

    #[test]
    #[should_panic(expected = "data integrity violation")]
    fn test_deactivate_inactive_is_fatal() {
        let forest = Forest::new();
        let a = forest
            .get_or_create(&path("a"), &k("k0"), &JoinOptions::default(), true)
            .unwrap();
        forest.deactivate(&a, &k("k1"), 1);
    }

    #[test]
    fn test_release_while_active_keeps_node_until_deactivated() {
        let forest = Forest::new();
        let a = forest
            .get_or_create(&path("a/b"), &k("k0"), &JoinOptions::default(), true)
            .unwrap();
        forest.activate(&a, &k("k1"), 1);
        forest.release(&a);

        assert!(!a.is_detached());
        assert_eq!(a.references(), 0);
        assert!(forest.resolve(&path("a/b")).is_some());

        assert!(forest.deactivate(&a, &k("k1"), 1));
        assert!(a.is_detached());
        assert!(forest.resolve(&path("a")).is_none());
        assert!(!forest.has_community("c"));
    }

    #[test]
    #[should_panic(expected = "released more often than referenced")]
    fn test_double_release_is_fatal() {
        let forest = Forest::new();
        let a = forest
            .get_or_create(&path("a"), &k("k0"), &JoinOptions::default(), true)
            .unwrap();
        forest.activate(&a, &k("k1"), 1);
        forest.release(&a);
        forest.release(&a);
    }

    #[test]
    fn test_refused_join_creates_nothing() {
        let forest = Forest::new();
        let vip = JoinOptions::default().gatekeeper(Arc::new(AllowList::new([k("k1")])));

        let err = forest
            .get_or_create(&path("a/b"), &k("k2"), &vip, true)
            .unwrap_err();
        assert!(matches!(err, NamespaceError::AccessDenied { .. }));
        assert!(forest.resolve(&path("a")).is_none());
        assert!(!forest.has_community("c"));
    }

    #[test]
    fn test_refused_reservation_leaves_group_unreserved() {
        let forest = Forest::new();
        let vip = JoinOptions::default().gatekeeper(Arc::new(AllowList::new([k("k1")])));
        let a = forest.get_or_create(&path("a"), &k("k1"), &vip, true).unwrap();
        let b = forest
            .get_or_create(&path("a/b"), &k("k1"), &JoinOptions::default(), true)
            .unwrap();
        forest.release(&a);

        let err = forest
            .get_or_create(&path("a"), &k("k2"), &vip.clone().reserved(true), true)
            .unwrap_err();
        assert!(matches!(err, NamespaceError::AccessDenied { .. }));
        assert!(!a.is_reserved());
        assert_eq!(a.references(), 0);

        let again = forest.get_or_create(&path("a"), &k("k1"), &vip, true).unwrap();
        assert!(Arc::ptr_eq(&again, &a));
        forest.release(&again);
        forest.release(&b);
    }

    #[test]
    fn test_release_parent_of_active_child() {
        let forest = Forest::new();
        let options = JoinOptions::default();
        let a = forest.get_or_create(&path("a"), &k("k0"), &options, true).unwrap();
        let b = forest.get_or_create(&path("a/b"), &k("k0"), &options, true).unwrap();
        forest.activate(&b, &k("k1"), 1);

        forest.release(&a);
        assert!(!a.is_detached());
        assert_eq!(a.active_descendants(&k("k1")).len(), 1);

        forest.deactivate(&b, &k("k1"), 1);
        forest.release(&b);
        assert!(a.is_detached());
    }

    #[test]
    fn test_shutdown_detaches_outstanding_nodes() {
        let forest = Forest::new();
        let a = forest
            .get_or_create(&path("a"), &k("k0"), &JoinOptions::default(), true)
            .unwrap();
        forest.shutdown();

        assert!(a.is_detached());
        assert!(forest.communities().is_empty());
        assert!(!forest.activate(&a, &k("k1"), 1));
        forest.release(&a);
        assert_eq!(a.references(), 0);
    }

    #[test]
    fn test_dump() {
        let forest = Forest::new();
        let b = forest
            .get_or_create(&path("a/b"), &k("k0"), &JoinOptions::default(), true)
            .unwrap();
        forest
            .get_or_create(&path("z"), &k("k0"), &JoinOptions::default().reserved(true), true)
            .unwrap();
        forest.activate(&b, &k("k2"), 1);
        forest.activate(&b, &k("k1"), 3);

        insta::assert_snapshot!(forest.dump(), @r"
        c
          a/ refs=0
            b/ refs=1 k1=3 k2=1
          z/ refs=1 reserved
        ");
    }
}
