//! Error types for the editor

use notewell_model::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("No node with id {0}")]
    UnknownNode(String),

    #[error("Update not applicable: {0}")]
    NotApplicable(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),
}
