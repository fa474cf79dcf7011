//! Error taxonomy for the rendering and packaging pipeline.
//!
//! Failures that change what the viewer sees (wrong link, missing text, a
//! truncated archive) are fatal. Failures in side channels are recovered
//! where they happen and only logged.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// Payload too large or rejected by the matrix-code encoder.
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    /// Photo bytes or photo URL unreadable. Recovered by the avatar chain.
    #[error("Asset load failed: {0}")]
    AssetLoadFailed(String),

    /// Backup content-store write failed. Logged, never propagated.
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("Packaging failed: {0}")]
    PackagingFailed(String),

    #[error("Compositing failed: {0}")]
    CompositingFailed(String),

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Whether this error must reach the caller.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            RenderError::AssetLoadFailed(_) | RenderError::PersistenceFailed(_)
        )
    }

    /// HTTP-equivalent status for the boundary layer.
    pub fn status_code(&self) -> u16 {
        match self {
            RenderError::InvalidProfile(_) | RenderError::InvalidConfig(_) => 400,
            _ => 500,
        }
    }
}

pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_channel_errors_are_not_fatal() {
        assert!(!RenderError::AssetLoadFailed("x".into()).is_fatal());
        assert!(!RenderError::PersistenceFailed("x".into()).is_fatal());
        assert!(RenderError::EncodingFailed("x".into()).is_fatal());
        assert!(RenderError::PackagingFailed("x".into()).is_fatal());
    }

    #[test]
    fn status_codes() {
        assert_eq!(RenderError::EncodingFailed("x".into()).status_code(), 500);
        assert_eq!(RenderError::InvalidProfile("x".into()).status_code(), 400);
    }
}
