//! Error types for Fanpost

use thiserror::Error;

use crate::types::PlatformKind;

pub type Result<T> = std::result::Result<T, FanpostError>;

#[derive(Error, Debug)]
pub enum FanpostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl FanpostError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            FanpostError::InvalidInput(_) => 3,
            FanpostError::Credential(_) => 2,
            FanpostError::Platform(PlatformError::Authentication(_)) => 2,
            FanpostError::Platform(_) => 1,
            FanpostError::Config(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// A credential was rejected before any network call was made.
///
/// Rejected input is never repaired: the message says what is wrong and the
/// platform attempt is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("expected a {expected} credential but found a {actual} credential")]
    KindMismatch {
        expected: PlatformKind,
        actual: PlatformKind,
    },

    #[error("invalid Nostr secret key: {0}")]
    InvalidNostrKey(String),

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Failure reported by a platform adapter while publishing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Request rejected: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

impl PlatformError {
    /// Short machine-readable label for reports
    pub fn kind_label(&self) -> &'static str {
        match self {
            PlatformError::Authentication(_) => "authentication",
            PlatformError::Validation(_) => "rejected",
            PlatformError::Posting(_) => "posting",
            PlatformError::Network(_) => "network",
            PlatformError::RateLimit(_) => "rate_limit",
            PlatformError::Timeout(_) => "timeout",
        }
    }
}
