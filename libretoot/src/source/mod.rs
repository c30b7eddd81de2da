//! Source platform capability
//!
//! The relay reads the source platform through this trait: a cheap timeline
//! listing for filtering, then a per-post detail fetch with resolved media
//! and link entities. Responses are decoded into explicit typed structures
//! at this boundary; a missing field fails fast with a decode error instead
//! of surfacing deep inside the pipeline.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Post, PostSummary};

pub mod mock;
pub mod twitter;

#[async_trait]
pub trait SourceTimeline: Send + Sync {
    /// List the author's most recent posts, newest-first, excluding reposts
    /// and replies, bounded below by `since_id` when present.
    async fn list_recent(
        &self,
        author: &str,
        since_id: Option<u64>,
        limit: usize,
    ) -> Result<Vec<PostSummary>>;

    /// Fetch one post with its media and link entities resolved.
    async fn post_detail(&self, id: u64) -> Result<Post>;
}
