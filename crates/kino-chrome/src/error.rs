//! Error types for Kino Chrome

use thiserror::Error;

use crate::types::PlayerId;

/// Result type alias for player chrome operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player chrome error types
#[derive(Error, Debug)]
pub enum Error {
    // Construction errors
    #[error("Media node is already wrapped by player {0}")]
    AlreadyWrapped(PlayerId),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Node is detached from the document")]
    DetachedNode,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid dimension: {0:?}")]
    InvalidDimension(String),

    #[error("Config JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Feature errors
    #[error("Failed to build feature {feature}: {reason}")]
    FeatureBuild { feature: String, reason: String },

    #[error("Failed to clean feature {feature}: {reason}")]
    FeatureCleanup { feature: String, reason: String },

    // Lifecycle errors
    #[error("Player {0} has been removed")]
    PlayerRemoved(PlayerId),

    #[error("Unknown player: {0}")]
    UnknownPlayer(PlayerId),
}

impl Error {
    /// Create a feature build error
    pub fn feature_build(feature: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::FeatureBuild {
            feature: feature.into(),
            reason: reason.into(),
        }
    }

    /// Create a feature cleanup error
    pub fn feature_cleanup(feature: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::FeatureCleanup {
            feature: feature.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the player remains usable after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::FeatureBuild { .. }
                | Error::FeatureCleanup { .. }
                | Error::InvalidDimension(_)
                | Error::NodeNotFound(_)
        )
    }

    /// Returns the error code for log fields
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::AlreadyWrapped(_) => "ALREADY_WRAPPED",
            Error::NodeNotFound(_) => "NODE_NOT_FOUND",
            Error::DetachedNode => "DETACHED_NODE",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::InvalidDimension(_) => "INVALID_DIMENSION",
            Error::Json(_) => "CONFIG_JSON",
            Error::FeatureBuild { .. } => "FEATURE_BUILD",
            Error::FeatureCleanup { .. } => "FEATURE_CLEANUP",
            Error::PlayerRemoved(_) => "PLAYER_REMOVED",
            Error::UnknownPlayer(_) => "UNKNOWN_PLAYER",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::feature_build("poster", "no layer").error_code(), "FEATURE_BUILD");
        assert_eq!(Error::feature_cleanup("poster", "gone").error_code(), "FEATURE_CLEANUP");
        assert_eq!(Error::UnknownPlayer(PlayerId(1)).error_code(), "UNKNOWN_PLAYER");
    }

    #[test]
    fn test_recoverable() {
        assert!(Error::feature_build("volume", "no slider").is_recoverable());
        assert!(Error::NodeNotFound("clip".into()).is_recoverable());
        assert!(!Error::AlreadyWrapped(PlayerId(0)).is_recoverable());
        assert!(!Error::InvalidConfig("framesPerSecond".into()).is_recoverable());
    }
}
