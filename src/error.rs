//! Error taxonomy surfaced to callers of [`crate::RenderGraph::update`] and
//! the command recorder.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RgError {
    #[error("out of memory while growing {pool}")]
    OutOfMemory { pool: &'static str },

    #[error("index out of bounds: {what} (index {index}, bound {bound})")]
    IndexOutOfBounds {
        what: &'static str,
        index: u32,
        bound: u32,
    },

    #[error("unbalanced SUBGRAPH_END with no matching SUBGRAPH_BEGIN")]
    UnbalancedSubgraphEnd,

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("inconsistent view/resource format pairing on resource {resource_id}")]
    InconsistentViewFormat { resource_id: u32 },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("node reached through a queue it does not support (node {node_id})")]
    QueueNotSupported { node_id: u32 },

    #[error("frame resource count {requested} exceeds queued-frame limit {limit}")]
    FrameResourceLimitExceeded { requested: u32, limit: u32 },

    #[error("type mismatch reading command argument {arg_index}")]
    TypeMismatch { arg_index: u32 },

    #[error("integer overflow computing {what}")]
    IntegerOverflow { what: &'static str },

    #[error("feature not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("feature not supported on this backend: {0}")]
    NotSupported(&'static str),

    #[error("backend API call failed: {0}")]
    RuntimeApiError(String),
}

pub type RgResult<T> = Result<T, RgError>;
