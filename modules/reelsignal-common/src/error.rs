use thiserror::Error;

use crate::types::SourceId;

#[derive(Error, Debug)]
pub enum ReelSignalError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing credential for required source {0}")]
    MissingCredential(SourceId),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
