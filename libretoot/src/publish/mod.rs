//! Destination platform capability
//!
//! The relay writes to the destination through this trait: one session
//! check at startup, per-file media uploads, and post creation. The
//! provided `publish` method ties them together with the abort-on-upload-
//! failure policy the orchestrator relies on.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::StagedMedia;

pub mod mastodon;
pub mod mock;

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Validate the destination session. Called once at startup; a failure
    /// here is fatal to the process.
    async fn verify_session(&self) -> Result<()>;

    /// Upload one staged media file, returning the destination-side media id.
    async fn upload_media(&self, media: &StagedMedia) -> Result<String>;

    /// Create a destination post carrying `text` and the given media ids,
    /// returning the destination post id. An empty id list makes a
    /// text-only post.
    async fn create_post(&self, text: &str, media_ids: Vec<String>) -> Result<String>;

    /// Lowercase platform identifier, e.g. "mastodon".
    fn name(&self) -> &str;

    /// Upload all staged media in input order (order affects display order),
    /// then create the post. Any single upload failure aborts the whole
    /// attempt: no partial post is ever created.
    async fn publish(&self, text: &str, staged: &[StagedMedia]) -> Result<String> {
        let mut media_ids = Vec::with_capacity(staged.len());
        for item in staged {
            media_ids.push(self.upload_media(item).await?);
        }
        self.create_post(text, media_ids).await
    }
}
