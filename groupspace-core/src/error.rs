//! Error types for the namespace engine

use groupspace_types::{GroupPath, NameError, NodeId};
use thiserror::Error;

/// Recoverable errors reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamespaceError {
    /// A community or segment name is malformed
    #[error("invalid group name: {0}")]
    InvalidName(#[from] NameError),

    /// The group is reserved and cannot be joined again
    #[error("the group {0} is reserved")]
    Reserved(GroupPath),

    /// Reservation requested on a group that already has references
    #[error("the group {path} cannot be reserved: it already has {references} reference(s)")]
    CannotReserve { path: GroupPath, references: usize },

    /// The group's gatekeeper refused admission
    #[error("access to the group {path} denied for node {node}")]
    AccessDenied { path: GroupPath, node: NodeId },
}

/// Outcome codes handed back across the agent runtime boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    Success,
    InvalidName,
    Reserved,
    AccessDenied,
}

impl NamespaceError {
    /// Map this error to the code the runtime layer expects
    pub fn return_code(&self) -> ReturnCode {
        match self {
            NamespaceError::InvalidName(_) => ReturnCode::InvalidName,
            NamespaceError::Reserved(_) | NamespaceError::CannotReserve { .. } => {
                ReturnCode::Reserved
            }
            NamespaceError::AccessDenied { .. } => ReturnCode::AccessDenied,
        }
    }
}

impl<T> From<&std::result::Result<T, NamespaceError>> for ReturnCode {
    fn from(result: &std::result::Result<T, NamespaceError>) -> Self {
        match result {
            Ok(_) => ReturnCode::Success,
            Err(e) => e.return_code(),
        }
    }
}

/// Result type using NamespaceError
pub type Result<T> = std::result::Result<T, NamespaceError>;

/// Abort on an accounting contradiction inside the engine
///
/// These are engine bugs, not caller misuse: continuing would hand wrong
/// membership answers to every later caller.
macro_rules! integrity_violation {
    ($($arg:tt)+) => {{
        let message = format!($($arg)+);
        tracing::error!(%message, "data integrity violation");
        panic!("data integrity violation: {}", message)
    }};
}

pub(crate) use integrity_violation;
