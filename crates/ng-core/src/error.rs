use crate::id::{EdgeId, NodeId};

/// Rejection reasons for Graph Store mutations.
///
/// A failed operation leaves the store exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("group not found: {0}")]
    GroupNotFound(NodeId),

    #[error("node {0} is not a group")]
    NotAGroup(NodeId),

    #[error("node {node} is not a child of {parent}")]
    NotAChild { node: NodeId, parent: NodeId },

    #[error("cannot place {node} inside {parent}: groups nest one level deep")]
    CyclicParent { node: NodeId, parent: NodeId },

    #[error("child {0} cannot move independently of its group; reparent it instead")]
    DetachedChildMove(NodeId),

    #[error("duplicate id: {0}")]
    DuplicateId(String),

    #[error("edge {edge} references missing node {node}")]
    DanglingEdge { edge: EdgeId, node: NodeId },

    #[error("edge not found: {0}")]
    EdgeNotFound(EdgeId),

    #[error("membership of {0} does not match its parent's child sequence")]
    MembershipMismatch(NodeId),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised while importing or exporting snapshots.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("invalid snapshot: {0}")]
    Invalid(#[from] StoreError),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("msgpack encode: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("msgpack decode: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}
