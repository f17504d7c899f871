//! Role ledger for one agent in one group

use crate::namespace::NodeHandle;
use crate::tree::NodeRef;
use groupspace_types::{GroupPath, NodeId};
use tracing::warn;

/// One agent's membership in one group, as seen from one remote node
///
/// Every requested role adds one unit of activation; the group is active on
/// the remote node while any role is held. Dropping the membership leaves
/// every outstanding role, then releases the group reference.
#[derive(Debug)]
pub struct Membership {
    handle: NodeHandle,
    remote: NodeId,
    roles: usize,
}

impl Membership {
    pub fn new(handle: NodeHandle, remote: NodeId) -> Self {
        Self {
            handle,
            remote,
            roles: 0,
        }
    }

    /// Take one more role; returns true if the group became active
    pub fn request_role(&mut self) -> bool {
        self.roles += 1;
        self.handle
            .namespace()
            .set_active(&self.handle, &self.remote)
    }

    /// Give back one role; returns true if the group became inactive
    pub fn leave_role(&mut self) -> bool {
        if self.roles == 0 {
            warn!(group = %self.handle.path(), remote = %self.remote, "no role to leave");
            return false;
        }
        self.roles -= 1;
        self.handle
            .namespace()
            .set_inactive(&self.handle, &self.remote)
    }

    /// Give back every role in one step
    pub fn leave_all_roles(&mut self) -> bool {
        let roles = std::mem::take(&mut self.roles);
        self.handle
            .namespace()
            .set_inactive_by(&self.handle, &self.remote, roles)
    }

    pub fn roles(&self) -> usize {
        self.roles
    }

    pub fn has_roles(&self) -> bool {
        self.roles > 0
    }

    pub fn remote(&self) -> &NodeId {
        &self.remote
    }

    pub fn path(&self) -> &GroupPath {
        self.handle.path()
    }

    pub fn node(&self) -> NodeRef {
        self.handle.node()
    }

    pub fn handle(&self) -> &NodeHandle {
        &self.handle
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        if self.roles > 0 {
            self.leave_all_roles();
        }
    }
}
