use crate::score::Layer;
use thiserror::Error;

/// A parcel's raw layers could not be turned into scores.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoreError {
    #[error("layer '{layer}' is missing")]
    MissingLayer { layer: Layer },

    #[error("layer '{layer}' is empty")]
    EmptyLayer { layer: Layer },

    #[error("layer '{layer}' is malformed: {reason}")]
    MalformedLayer { layer: Layer, reason: String },

    #[error("parcel data could not be read: {reason}")]
    Unreadable { reason: String },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SearchError {
    #[error("score grid is {score:?} but divider grid is {divider:?}")]
    ShapeMismatch {
        score: (usize, usize),
        divider: (usize, usize),
    },

    #[error("search cancelled")]
    Cancelled,

    #[error("search deadline exceeded")]
    DeadlineExceeded,

    #[error("internal computation error: {0}")]
    Internal(String),
}
