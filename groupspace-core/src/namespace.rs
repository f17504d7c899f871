//! The namespace: the entry point the agent runtime talks to
//!
//! A [`Namespace`] owns the community forest, the change notifier, the
//! universe cache and the evaluation metrics. It is a cheap handle; clones
//! share everything.

use crate::config::NamespaceConfig;
use crate::error::Result;
use crate::eval;
use crate::expr::GroupExpr;
use crate::gatekeeper::Gatekeeper;
use crate::group::Group;
use crate::memo::MemoTable;
use crate::membership::Membership;
use crate::metrics::{EvalMetrics, MetricsSnapshot};
use crate::notify::{ChangeNotifier, ChangeObserver, SubscriptionId};
use crate::tree::{Forest, GroupNode, NodeRef};
use groupspace_types::{GroupPath, NodeId};
use once_cell::sync::Lazy;
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Creation attributes for [`Namespace::join`]
///
/// `distributed` and `gatekeeper` only take effect when the join creates
/// the group; later joins keep the first declaration.
#[derive(Clone, Default)]
pub struct JoinOptions {
    pub(crate) reserved: bool,
    pub(crate) distributed: bool,
    pub(crate) gatekeeper: Option<Arc<dyn Gatekeeper>>,
}

impl JoinOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserved(mut self, reserved: bool) -> Self {
        self.reserved = reserved;
        self
    }

    pub fn distributed(mut self, distributed: bool) -> Self {
        self.distributed = distributed;
        self
    }

    pub fn gatekeeper(mut self, gatekeeper: Arc<dyn Gatekeeper>) -> Self {
        self.gatekeeper = Some(gatekeeper);
        self
    }
}

impl fmt::Debug for JoinOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinOptions")
            .field("reserved", &self.reserved)
            .field("distributed", &self.distributed)
            .field("gatekeeper", &self.gatekeeper.is_some())
            .finish()
    }
}

pub(crate) struct Inner {
    pub(crate) forest: Forest,
    pub(crate) notifier: ChangeNotifier,
    pub(crate) universe: MemoTable,
    pub(crate) metrics: EvalMetrics,
    pub(crate) config: NamespaceConfig,
}

/// Shared handle on a group namespace
#[derive(Clone)]
pub struct Namespace {
    inner: Arc<Inner>,
}

static GLOBAL: Lazy<Namespace> = Lazy::new(|| {
    debug!("process namespace created");
    Namespace::new()
});

/// The process-wide namespace, created on first use
pub fn global() -> &'static Namespace {
    &GLOBAL
}

impl Namespace {
    pub fn new() -> Self {
        Self::with_config(NamespaceConfig::default())
    }

    pub fn with_config(config: NamespaceConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                forest: Forest::new(),
                notifier: ChangeNotifier::new(),
                universe: MemoTable::new(),
                metrics: EvalMetrics::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &NamespaceConfig {
        &self.inner.config
    }

    /// Join options carrying this namespace's defaults
    pub fn join_options(&self) -> JoinOptions {
        JoinOptions::default().distributed(self.inner.config.default_distributed)
    }

    /// Take one reference on the group at `path` on behalf of `remote`
    ///
    /// Missing groups on the way are created. The group's gatekeeper is
    /// asked before anything changes, so a refused join leaves no trace.
    /// The returned handle releases its reference when dropped or passed
    /// to [`leave`](Self::leave).
    pub fn join(
        &self,
        path: &GroupPath,
        remote: &NodeId,
        options: &JoinOptions,
    ) -> Result<NodeHandle> {
        let node = self.inner.forest.get_or_create(
            path,
            remote,
            options,
            self.inner.config.warn_on_conflicting_declarations,
        )?;
        Ok(NodeHandle {
            node,
            namespace: self.clone(),
            released: false,
        })
    }

    /// [`join`](Self::join) from a path string with default options
    pub fn join_path(&self, community: &str, path: &str, remote: &NodeId) -> Result<NodeHandle> {
        let path = GroupPath::parse(community, path)?;
        self.join(&path, remote, &self.join_options())
    }

    /// Join and wrap the handle in a role ledger for `remote`
    pub fn membership(
        &self,
        path: &GroupPath,
        remote: &NodeId,
        options: &JoinOptions,
    ) -> Result<Membership> {
        let handle = self.join(path, remote, options)?;
        Ok(Membership::new(handle, remote.clone()))
    }

    /// Release one reference
    pub fn leave(&self, handle: NodeHandle) {
        drop(handle);
    }

    pub fn set_active(&self, handle: &NodeHandle, remote: &NodeId) -> bool {
        self.batch(|b| b.set_active(handle, remote))
    }

    pub fn set_active_by(&self, handle: &NodeHandle, remote: &NodeId, count: usize) -> bool {
        self.batch(|b| b.set_active_by(handle, remote, count))
    }

    pub fn set_inactive(&self, handle: &NodeHandle, remote: &NodeId) -> bool {
        self.batch(|b| b.set_inactive(handle, remote))
    }

    pub fn set_inactive_by(&self, handle: &NodeHandle, remote: &NodeId, count: usize) -> bool {
        self.batch(|b| b.set_inactive_by(handle, remote, count))
    }

    /// Deactivate a group by node, for when its handles are already gone
    ///
    /// Returns true on the active to inactive edge. A group left with no
    /// references, activations or children is pruned.
    pub fn deactivate_node(&self, node: &NodeRef, remote: &NodeId, count: usize) -> bool {
        self.batch(|b| b.record(self.inner.forest.deactivate(&node.0, remote, count)))
    }

    /// Run `f` as one logical batch
    ///
    /// Observers are notified once when the batch closes, and only if an
    /// activation edge happened inside it.
    pub fn batch<R>(&self, f: impl FnOnce(&Batch<'_>) -> R) -> R {
        let batch = Batch {
            namespace: self,
            edges: Cell::new(0),
        };
        let result = f(&batch);
        let edges = batch.edges.get();
        if edges > 0 {
            debug!(edges, "notifying observers");
            self.inner.notifier.notify();
        }
        result
    }

    /// Active nodes represented by `expr` on `remote`
    pub fn evaluate(&self, expr: &GroupExpr, remote: &NodeId) -> Vec<NodeRef> {
        eval::evaluate(&self.inner, expr, remote).nodes.to_vec()
    }

    /// Like [`evaluate`](Self::evaluate), sharing the cached slice
    pub fn evaluate_shared(&self, expr: &GroupExpr, remote: &NodeId) -> Arc<[NodeRef]> {
        eval::evaluate(&self.inner, expr, remote).nodes
    }

    /// Whether everything `b` represents on `remote` is represented by `a`
    pub fn includes(&self, a: &GroupExpr, b: &GroupExpr, remote: &NodeId) -> bool {
        let outer = eval::evaluate(&self.inner, a, remote).nodes;
        let inner = eval::evaluate(&self.inner, b, remote).nodes;
        let outer: hashbrown::HashSet<&NodeRef> = outer.iter().collect();
        inner.iter().all(|node| outer.contains(node))
    }

    /// Every active group of every community on `remote`
    pub fn universe(&self, remote: &NodeId) -> Vec<NodeRef> {
        self.evaluate(&GroupExpr::Universe, remote)
    }

    /// Active groups below `group` on `remote`, as plain handles
    ///
    /// Reserved groups are skipped.
    pub fn sub_groups(&self, group: &Group, remote: &NodeId) -> Vec<Group> {
        let Some(node) = self.inner.forest.resolve(group.path()) else {
            return Vec::new();
        };
        node.active_descendants(remote)
            .into_iter()
            .filter(|n| !n.is_reserved())
            .map(|n| Group::new(n.path().clone()))
            .collect()
    }

    /// The enclosing group of `group`, unless that group is reserved
    pub fn parent_of(&self, group: &Group) -> Option<Group> {
        let parent = group.parent()?;
        match self.inner.forest.resolve(parent.path()) {
            Some(node) if node.is_reserved() => None,
            _ => Some(parent),
        }
    }

    /// Look a group up without creating it
    pub fn node(&self, path: &GroupPath) -> Option<NodeRef> {
        self.inner.forest.resolve(path).map(NodeRef)
    }

    /// Names of the communities that currently hold any group
    pub fn communities(&self) -> Vec<String> {
        self.inner.forest.communities()
    }

    pub fn is_community(&self, community: &str) -> bool {
        self.inner.forest.has_community(community)
    }

    pub fn subscribe(&self, observer: Arc<dyn ChangeObserver>) -> SubscriptionId {
        self.inner.notifier.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.notifier.unsubscribe(id)
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.inner.notifier
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.inner.metrics.reset();
    }

    /// Indented listing of every community tree
    pub fn dump(&self) -> String {
        self.inner.forest.dump()
    }

    /// Detach every tree, drop every observer and clear the universe cache
    ///
    /// Outstanding handles stay valid but inert: activating them is a
    /// logged no-op and dropping them only decrements their own counter.
    /// The namespace can be used again afterwards.
    pub fn shutdown(&self) {
        self.inner.forest.shutdown();
        self.inner.notifier.clear();
        self.inner.universe.clear();
        info!("namespace shut down");
    }

    fn same_as(&self, other: &Namespace) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("communities", &self.communities())
            .field("observers", &self.inner.notifier.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// One reference on a group, obtained from [`Namespace::join`]
///
/// Not `Clone`: each handle is one reference. Dropping it releases the
/// reference. A group that is still active outlives its last handle and is
/// pruned by its final deactivation, see [`Namespace::deactivate_node`].
pub struct NodeHandle {
    node: Arc<GroupNode>,
    namespace: Namespace,
    released: bool,
}

impl NodeHandle {
    pub fn node(&self) -> NodeRef {
        NodeRef(self.node.clone())
    }

    pub fn path(&self) -> &GroupPath {
        self.node.path()
    }

    /// Plain handle on this group
    pub fn group(&self) -> Group {
        Group::new(self.path().clone())
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.namespace.inner.forest.release(&self.node);
        }
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHandle({})", self.node.path())
    }
}

/// Scope of a [`Namespace::batch`]
pub struct Batch<'a> {
    namespace: &'a Namespace,
    edges: Cell<usize>,
}

impl Batch<'_> {
    pub fn set_active(&self, handle: &NodeHandle, remote: &NodeId) -> bool {
        self.set_active_by(handle, remote, 1)
    }

    /// Returns true when the group became active on `remote`
    pub fn set_active_by(&self, handle: &NodeHandle, remote: &NodeId, count: usize) -> bool {
        debug_assert!(handle.namespace.same_as(self.namespace));
        let edge = self
            .namespace
            .inner
            .forest
            .activate(&handle.node, remote, count);
        self.record(edge)
    }

    pub fn set_inactive(&self, handle: &NodeHandle, remote: &NodeId) -> bool {
        self.set_inactive_by(handle, remote, 1)
    }

    /// Returns true when the group became inactive on `remote`
    pub fn set_inactive_by(&self, handle: &NodeHandle, remote: &NodeId, count: usize) -> bool {
        debug_assert!(handle.namespace.same_as(self.namespace));
        let edge = self
            .namespace
            .inner
            .forest
            .deactivate(&handle.node, remote, count);
        self.record(edge)
    }

    /// Edges seen so far in this batch
    pub fn edges(&self) -> usize {
        self.edges.get()
    }

    fn record(&self, edge: bool) -> bool {
        if edge {
            self.edges.set(self.edges.get() + 1);
        }
        edge
    }
}

impl fmt::Debug for Batch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch").field("edges", &self.edges()).finish()
    }
}
