//! Error types for Retoot

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetootError>;

#[derive(Error, Debug)]
pub enum RetootError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Relay cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Media staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
}

impl RetootError {
    /// Returns the appropriate exit code for this error
    ///
    /// Only a destination authentication failure is process-fatal in a
    /// distinguished way (the daemon cannot run without a session); every
    /// other error exits 1 when it escapes the relay loop.
    pub fn exit_code(&self) -> i32 {
        match self {
            RetootError::Publish(PublishError::Authentication(_)) => 2,
            RetootError::Publish(_) => 1,
            RetootError::Source(_) => 1,
            RetootError::Config(_) => 1,
            RetootError::Cache(_) => 1,
            RetootError::Staging(_) => 1,
        }
    }

    /// True for errors that are expected to clear up on a later cycle
    /// (network blips, rate limits, a flaky upstream). The relay loop logs
    /// these and keeps running at the normal cadence.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            RetootError::Config(_)
                | RetootError::Staging(_)
                | RetootError::Publish(PublishError::Authentication(_))
        )
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
}

/// Failures of the durable dedup log.
///
/// An append failure is deliberately NOT fatal to the relay loop: the post
/// stays out of the in-memory set, reads as not-yet-relayed on the next
/// cycle, and may be delivered again. Duplicate delivery is preferred over
/// silently losing the record.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to open relay cache: {0}")]
    Open(std::io::Error),

    #[error("Failed to append to relay cache: {0}")]
    Append(std::io::Error),
}

/// Failures of the local media staging area.
///
/// These come from the local filesystem, not from either platform, and
/// only surface when the staging root itself is unusable. Per-attachment
/// download and write failures never reach this type: staging is
/// best-effort per item.
#[derive(Error, Debug)]
pub enum StagingError {
    #[error("Failed to create media staging directory: {0}")]
    Init(std::io::Error),
}

/// Errors from the source platform capability.
///
/// All of these abandon the current poll cycle; none abort the relay loop.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[error("Source authentication failed: {0}")]
    Authentication(String),

    #[error("Source request failed: {0}")]
    Network(String),

    #[error("Source rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Source response decode failed: {0}")]
    Decode(String),
}

/// Errors from the destination platform capability.
#[derive(Error, Debug, Clone)]
pub enum PublishError {
    #[error("Destination authentication failed: {0}")]
    Authentication(String),

    #[error("Media upload failed: {0}")]
    Upload(String),

    #[error("Post creation failed: {0}")]
    Posting(String),

    #[error("Destination request failed: {0}")]
    Network(String),

    #[error("Destination rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Content rejected by destination: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_destination_auth() {
        let error = RetootError::Publish(PublishError::Authentication("bad token".to_string()));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_other_errors() {
        let publish = RetootError::Publish(PublishError::Posting("timeout".to_string()));
        assert_eq!(publish.exit_code(), 1);

        let source = RetootError::Source(SourceError::RateLimit("429".to_string()));
        assert_eq!(source.exit_code(), 1);

        let config = RetootError::Config(ConfigError::MissingField("source.account".to_string()));
        assert_eq!(config.exit_code(), 1);

        let cache = RetootError::Cache(CacheError::Append(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )));
        assert_eq!(cache.exit_code(), 1);

        let staging = RetootError::Staging(StagingError::Init(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        )));
        assert_eq!(staging.exit_code(), 1);
    }

    #[test]
    fn test_transient_classification() {
        assert!(RetootError::Source(SourceError::Network("unreachable".to_string())).is_transient());
        assert!(RetootError::Publish(PublishError::Upload("503".to_string())).is_transient());
        assert!(
            RetootError::Cache(CacheError::Append(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full"
            )))
            .is_transient()
        );

        assert!(
            !RetootError::Publish(PublishError::Authentication("revoked".to_string()))
                .is_transient()
        );
        assert!(
            !RetootError::Config(ConfigError::MissingField("destination".to_string()))
                .is_transient()
        );
        // An unusable staging root will not fix itself between cycles.
        assert!(
            !RetootError::Staging(StagingError::Init(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied"
            )))
            .is_transient()
        );
    }

    #[test]
    fn test_error_message_formatting() {
        let error = RetootError::Source(SourceError::Decode("missing field `id`".to_string()));
        assert_eq!(
            format!("{}", error),
            "Source error: Source response decode failed: missing field `id`"
        );

        let error = RetootError::Publish(PublishError::Upload("HTTP 500".to_string()));
        assert_eq!(
            format!("{}", error),
            "Publish error: Media upload failed: HTTP 500"
        );
    }

    #[test]
    fn test_error_conversion() {
        let source_error = SourceError::Network("connection refused".to_string());
        let error: RetootError = source_error.into();
        assert!(matches!(error, RetootError::Source(_)));

        let cache_error = CacheError::Open(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let error: RetootError = cache_error.into();
        assert!(matches!(error, RetootError::Cache(_)));
    }
}
