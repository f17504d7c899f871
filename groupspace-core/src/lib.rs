//! Groupspace namespace engine
//!
//! A hierarchical group namespace with set algebra and per-remote-node
//! activation tracking.
//!
//! # Architecture
//!
//! Each **community** owns a tree of named groups (`/world/region/room`).
//! Agents take references on groups with [`Namespace::join`]; the runtime
//! marks a group active on a remote node with [`Namespace::set_active`] when
//! its first member there registers, and inactive when the last one leaves.
//!
//! Callers describe sets of groups with [`GroupExpr`]: a [`Group`] handle
//! (optionally covering the subtree), the universe, or a [`MultiGroup`]
//! composite of included and excluded operands. The algebra in [`algebra`]
//! combines expressions structurally; [`Namespace::evaluate`] resolves one
//! against a remote node's live state.
//!
//! ## Key Features
//!
//! - **Incremental subtree views**: every group knows which descendants are
//!   active per remote node, so subtree queries never walk the tree
//! - **Memoization**: composite results are cached per remote node and
//!   validated by version tokens
//! - **Early Cutoff**: a recomputation that reproduces the cached nodes keeps
//!   the old version, so enclosing composites stay cached
//! - **Change notification**: observers hear about every batch of
//!   activation edges
//!
//! # Example
//!
//! ```rust
//! use groupspace_core::{GroupExpr, GroupPath, MultiGroup, Namespace, NodeId};
//!
//! let ns = Namespace::new();
//! let k1 = NodeId::new("k1");
//! let path = |p: &str| GroupPath::parse("C", p).unwrap();
//!
//! let a = ns.join_path("C", "A", &k1).unwrap();
//! let ab = ns.join_path("C", "A/B", &k1).unwrap();
//! let ac = ns.join_path("C", "A/C", &k1).unwrap();
//! for h in [&a, &ab, &ac] {
//!     ns.set_active(h, &k1);
//! }
//!
//! let mut expr = MultiGroup::of([GroupExpr::subtree(path("A"))]);
//! expr.add_excluded(GroupExpr::group(path("A/B")));
//!
//! let names: Vec<String> = ns
//!     .evaluate(&expr.into(), &k1)
//!     .iter()
//!     .map(|n| n.path().path_string())
//!     .collect();
//! assert_eq!(names, vec!["/A/", "/A/C/"]);
//!
//! for h in [&a, &ab, &ac] {
//!     ns.set_inactive(h, &k1);
//! }
//! ```

#![warn(missing_debug_implementations)]

pub mod algebra;
pub mod config;
pub mod error;
mod eval;
pub mod expr;
pub mod gatekeeper;
pub mod group;
pub mod memo;
pub mod membership;
pub mod metrics;
pub mod namespace;
pub mod notify;
pub mod tree;
pub mod version;

pub use algebra::{intersect, is_empty, minus, symmetric_difference, union};
pub use config::{ConfigError, NamespaceConfig};
pub use error::{NamespaceError, Result, ReturnCode};
pub use expr::{GroupExpr, MultiGroup, Operand};
pub use gatekeeper::{AllowList, Gatekeeper};
pub use group::Group;
pub use membership::Membership;
pub use metrics::{EvalMetrics, MetricsSnapshot};
pub use namespace::{global, Batch, JoinOptions, Namespace, NodeHandle};
pub use notify::{ChangeNotifier, ChangeObserver, DirtyFlag, SubscriptionId};
pub use tree::{GroupNode, NodeRef};
pub use version::Version;

pub use groupspace_types::{GroupPath, NameError, NodeId};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Group, GroupExpr, GroupPath, JoinOptions, Membership, MultiGroup, Namespace,
        NamespaceError, NodeHandle, NodeId, NodeRef,
    };
}
