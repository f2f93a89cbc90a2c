//! Error types for the document engine.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("unknown node type: {0}")]
    UnknownType(String),

    #[error("offset {0} is outside of the document")]
    InvalidOffset(usize),

    #[error("invalid content for node type {0}")]
    InvalidContent(String),

    #[error("cannot join {0} onto {1}")]
    CannotJoin(String, String),

    #[error("inconsistent open depths in slice")]
    BadSlice,

    #[error("invalid step: {0}")]
    InvalidStep(String),
}
