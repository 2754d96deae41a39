//! Error types for registry operations.

use std::collections::TryReserveError;
use thiserror::Error;
use ticksim_common::NodeId;

/// Reasons a registry operation was rejected.
///
/// None of these are fatal: the operation leaves all node state unchanged and
/// the caller reports the error to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// The node is crashed.
    #[error("Node {0} is not alive.")]
    NotAlive(NodeId),

    /// Both ends of a send are crashed.
    #[error("Both Node {from} and Node {to} are not alive.")]
    BothNotAlive {
        /// Source node.
        from: NodeId,
        /// Destination node.
        to: NodeId,
    },

    /// The destination inbox is at capacity.
    #[error("Node {node}'s inbox is full ({capacity} messages). Message not sent.")]
    InboxFull {
        /// Destination node.
        node: NodeId,
        /// Inbox capacity.
        capacity: usize,
    },

    /// A send request carried no destination node.
    #[error("Node {0} sent a message without a destination.")]
    NoDestination(NodeId),

    /// The id is outside the registry.
    #[error("Node {node} does not exist (network has {count} nodes).")]
    UnknownNode {
        /// Requested node.
        node: NodeId,
        /// Number of nodes in the registry.
        count: usize,
    },
}

impl NodeError {
    /// Short machine-friendly reason, used as a metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            NodeError::NotAlive(_) | NodeError::BothNotAlive { .. } => "not_alive",
            NodeError::InboxFull { .. } => "inbox_full",
            NodeError::NoDestination(_) => "no_destination",
            NodeError::UnknownNode { .. } => "unknown_node",
        }
    }
}

/// Errors building a [`NodeRegistry`](crate::NodeRegistry).
///
/// Unlike [`NodeError`], these are fatal: there is no network to run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Node ids would not fit in 32 bits.
    #[error("cannot create {count} nodes (at most {})", crate::MAX_NODES)]
    TooManyNodes {
        /// Requested node count.
        count: usize,
    },

    /// The node table could not be allocated.
    #[error("failed to allocate the node table for {count} nodes: {source}")]
    Alloc {
        /// Requested node count.
        count: usize,
        /// Underlying error.
        #[source]
        source: TryReserveError,
    },
}

/// Result type alias for registry operations.
pub type NodeResult<T> = Result<T, NodeError>;
