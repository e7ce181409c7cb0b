//! Per-item compiler failures. None of these abort a run.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("Empty group: '{character}/{animation}' has no valid frames")]
    EmptyGroup { character: String, animation: String },

    #[error("Invalid frame rate {0}: must be finite and > 0")]
    InvalidFrameRate(f32),

    #[error("Corrupt clip: {path} has 0 keyframes even after recreate")]
    CorruptClip { path: String },

    #[error("Missing required clip: controller for '{character}' requested with no clips")]
    MissingRequiredClip { character: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CompilerError {
    /// Short machine-readable kind, used in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            CompilerError::EmptyGroup { .. } => "empty_group",
            CompilerError::InvalidFrameRate(_) => "invalid_frame_rate",
            CompilerError::CorruptClip { .. } => "corrupt_clip",
            CompilerError::MissingRequiredClip { .. } => "missing_required_clip",
            CompilerError::Store(_) => "store",
        }
    }
}
