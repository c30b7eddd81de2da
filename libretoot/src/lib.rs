//! Retoot - relay a Twitter account's fresh posts to Mastodon
//!
//! This library provides the relay pipeline: polling the source timeline,
//! filtering out stale and already-relayed posts, rewriting the post text,
//! staging attached media on disk, publishing to the destination, and
//! recording delivery so each source post goes out at most once.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod poller;
pub mod publish;
pub mod relay;
pub mod source;
pub mod staging;
pub mod transform;
pub mod types;

// Re-export commonly used types
pub use cache::RelayCache;
pub use config::Config;
pub use error::{Result, RetootError};
pub use relay::RelayOrchestrator;
pub use types::{LinkRef, MediaRef, Post, PostSummary, StagedMedia};
