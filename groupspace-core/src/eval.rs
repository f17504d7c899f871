//! Evaluation of expressions against one remote node
//!
//! Every evaluation returns the nodes together with a version. Handles take
//! the version of the activation record they read; composites and the
//! universe take the version of their memo entry. A composite's entry is
//! reused only while its operands keep returning the same versions.

use crate::expr::{GroupExpr, MultiGroup};
use crate::group::Group;
use crate::memo::MemoTable;
use crate::namespace::Inner;
use crate::tree::NodeRef;
use crate::version::Version;
use groupspace_types::NodeId;
use hashbrown::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Nodes represented by an expression, and the version they carry
#[derive(Debug, Clone)]
pub(crate) struct Evaluated {
    pub nodes: Arc<[NodeRef]>,
    pub version: Version,
}

impl Evaluated {
    fn empty() -> Self {
        Self {
            nodes: Arc::from(Vec::new()),
            version: Version::ZERO,
        }
    }
}

pub(crate) fn evaluate(ns: &Inner, expr: &GroupExpr, remote: &NodeId) -> Evaluated {
    match expr {
        GroupExpr::Group(group) => evaluate_group(ns, group, remote),
        GroupExpr::Universe => evaluate_universe(ns, remote),
        GroupExpr::Multi(multi) => evaluate_multi(ns, multi, remote),
    }
}

fn evaluate_group(ns: &Inner, group: &Group, remote: &NodeId) -> Evaluated {
    match ns.forest.resolve(group.path()) {
        Some(node) => {
            let (nodes, version) = node.represented(remote, group.includes_subgroups());
            Evaluated {
                nodes: nodes.into(),
                version,
            }
        }
        // never joined, or pruned
        None => Evaluated::empty(),
    }
}

fn evaluate_universe(ns: &Inner, remote: &NodeId) -> Evaluated {
    let parts: Vec<(Vec<NodeRef>, Version)> = ns
        .forest
        .roots()
        .iter()
        .map(|root| root.represented(remote, true))
        .collect();
    let stamps = parts.iter().map(|(_, version)| *version).collect();

    cached(ns, &ns.universe, remote, stamps, || {
        parts.into_iter().flat_map(|(nodes, _)| nodes).collect()
    })
}

fn evaluate_multi(ns: &Inner, multi: &MultiGroup, remote: &NodeId) -> Evaluated {
    let operands: Vec<(bool, Evaluated)> = multi
        .operands()
        .iter()
        .map(|op| (op.excluded, evaluate(ns, &op.expr, remote)))
        .collect();
    let stamps = operands.iter().map(|(_, e)| e.version).collect();

    let result = cached(ns, &multi.memo, remote, stamps, || combine(&operands));
    trace!(
        composite = multi.id(),
        %remote,
        nodes = result.nodes.len(),
        version = %result.version,
        "composite evaluated"
    );
    result
}

/// Serve from `memo` when `stamps` match, otherwise recompute and publish
fn cached(
    ns: &Inner,
    memo: &MemoTable,
    remote: &NodeId,
    stamps: Vec<Version>,
    compute: impl FnOnce() -> Vec<NodeRef>,
) -> Evaluated {
    let track = ns.config.track_metrics;

    if ns.config.memoize {
        if let Some((nodes, version)) = memo.lookup(remote, &stamps) {
            if track {
                ns.metrics.record_hit();
            }
            return Evaluated { nodes, version };
        }
        if track {
            ns.metrics.record_miss();
        }
    }

    let start = Instant::now();
    let nodes = compute();
    if track {
        ns.metrics.record_recompute(start.elapsed());
    }

    if !ns.config.memoize {
        return Evaluated {
            nodes: nodes.into(),
            version: Version::next(),
        };
    }

    let published = memo.publish(remote, nodes, stamps);
    if published.early_cutoff && track {
        ns.metrics.record_early_cutoff();
    }
    Evaluated {
        nodes: published.nodes,
        version: published.version,
    }
}

/// Union of the included results in first-seen order, minus every node of
/// the excluded results
fn combine(operands: &[(bool, Evaluated)]) -> Vec<NodeRef> {
    let mut seen: HashSet<NodeRef> = HashSet::new();
    let mut nodes = Vec::new();
    for (_, evaluated) in operands.iter().filter(|(excluded, _)| !excluded) {
        for node in evaluated.nodes.iter() {
            if seen.insert(node.clone()) {
                nodes.push(node.clone());
            }
        }
    }

    let removed: HashSet<&NodeRef> = operands
        .iter()
        .filter(|(excluded, _)| *excluded)
        .flat_map(|(_, evaluated)| evaluated.nodes.iter())
        .collect();
    if !removed.is_empty() {
        nodes.retain(|node| !removed.contains(node));
    }
    nodes
}
