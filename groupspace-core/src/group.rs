//! Group handles
//!
//! A [`Group`] names a node by path; it does not own or pin the node. It is
//! resolved against a namespace each time it is evaluated, so a handle to a
//! group nobody joined simply represents nothing.

use groupspace_types::{GroupPath, NameError};
use std::fmt;
use std::sync::Arc;

/// A group, or a group together with all of its subgroups
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Group {
    path: Arc<GroupPath>,
    subgroups: bool,
}

impl Group {
    /// Handle on the single group at `path`
    pub fn new(path: GroupPath) -> Self {
        Self {
            path: Arc::new(path),
            subgroups: false,
        }
    }

    /// Handle on the group at `path` and everything below it
    pub fn with_subgroups_of(path: GroupPath) -> Self {
        Self {
            path: Arc::new(path),
            subgroups: true,
        }
    }

    /// Parse `community` and a `/`-separated path
    pub fn parse(community: &str, path: &str) -> Result<Self, NameError> {
        Ok(Self::new(GroupPath::parse(community, path)?))
    }

    pub fn path(&self) -> &GroupPath {
        &self.path
    }

    pub fn community(&self) -> &str {
        self.path.community()
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        self.path.name()
    }

    pub fn includes_subgroups(&self) -> bool {
        self.subgroups
    }

    /// Same path, covering the subtree
    pub fn with_subgroups(&self) -> Self {
        Self {
            path: self.path.clone(),
            subgroups: true,
        }
    }

    /// Same path, this group only
    pub fn without_subgroups(&self) -> Self {
        Self {
            path: self.path.clone(),
            subgroups: false,
        }
    }

    /// The enclosing group, if this is not a top-level group
    pub fn parent(&self) -> Option<Self> {
        self.path.parent().map(Self::new)
    }

    pub fn parent_with_subgroups(&self) -> Option<Self> {
        self.path.parent().map(Self::with_subgroups_of)
    }

    /// Handle on a group nested below this one
    pub fn sub_group<I, S>(&self, segments: I) -> Result<Self, NameError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self::new(self.path.join(segments)?))
    }

    pub fn sub_group_with_subgroups<I, S>(&self, segments: I) -> Result<Self, NameError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self::with_subgroups_of(self.path.join(segments)?))
    }

    /// Enclosing groups, nearest first
    pub fn ancestors(&self) -> Vec<Self> {
        self.path.ancestors().into_iter().map(Self::new).collect()
    }

    /// Whether every node this handle can represent is also representable
    /// by `other`, judged from paths alone
    pub fn is_covered_by(&self, other: &Group) -> bool {
        if self.path == other.path {
            return other.subgroups || !self.subgroups;
        }
        other.subgroups && other.path.is_ancestor_of(&self.path)
    }
}

impl From<GroupPath> for Group {
    fn from(path: GroupPath) -> Self {
        Self::new(path)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.subgroups {
            "GroupAndSubGroups"
        } else {
            "Group"
        };
        write!(f, "{}({})", kind, self.path)
    }
}
