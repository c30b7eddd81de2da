//! The relay loop
//!
//! One orchestrator owns the whole pipeline and runs it as a single logical
//! thread of control: posts are relayed strictly one at a time, which is
//! what gives the ordering guarantee and keeps dedup commits monotonic with
//! respect to source ordering.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::cache::RelayCache;
use crate::error::Result;
use crate::poller::SourcePoller;
use crate::publish::Publisher;
use crate::staging::MediaStaging;
use crate::transform::transform;
use crate::types::Post;

pub struct RelayOrchestrator {
    poller: SourcePoller,
    staging: MediaStaging,
    publisher: Box<dyn Publisher>,
    cache: RelayCache,
    /// Upper bound of the last relayed post, in memory only. Restart safety
    /// comes from the recency window plus the cache, not from this.
    cursor: Option<u64>,
}

impl RelayOrchestrator {
    pub fn new(
        poller: SourcePoller,
        staging: MediaStaging,
        publisher: Box<dyn Publisher>,
        cache: RelayCache,
    ) -> Self {
        Self {
            poller,
            staging,
            publisher,
            cache,
            cursor: None,
        }
    }

    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    pub fn cache(&self) -> &RelayCache {
        &self.cache
    }

    /// One full relay cycle. Returns how many posts were relayed.
    ///
    /// A poll failure abandons the cycle with nothing processed or
    /// committed. Per-post failures are contained: the post is skipped
    /// without a commit and retried next cycle for as long as it stays
    /// inside the recency window.
    pub async fn run_cycle(&mut self) -> Result<usize> {
        let posts = self.poller.poll(&self.cache, self.cursor).await?;

        if posts.is_empty() {
            info!("nothing to relay");
            return Ok(0);
        }

        let mut relayed = 0;
        // The cursor may only advance past posts that are durably settled.
        // Once a post fails, later successes in the same cycle must not move
        // it, or the next poll's since_id would hide the failed post from
        // the listing before the dedup filter could readmit it.
        let mut advance_cursor = true;
        for post in posts {
            match self.relay_post(&post).await {
                Ok(()) => {
                    relayed += 1;
                    if advance_cursor {
                        self.cursor = Some(post.id);
                    }
                }
                Err(e) => {
                    advance_cursor = false;
                    warn!(post_id = post.id, error = %e, "relay attempt failed, will retry while recent");
                }
            }
        }
        Ok(relayed)
    }

    /// Relay one post end to end.
    ///
    /// Staged media is released on every exit path. The cache commit
    /// happens strictly after the destination confirms the post; the
    /// caller advances the cursor strictly after a successful return.
    async fn relay_post(&mut self, post: &Post) -> Result<()> {
        let (text, media_refs) = transform(post);

        let mut staged = Vec::with_capacity(media_refs.len());
        for media in &media_refs {
            if let Some(item) = self.staging.stage(post.id, &media.source_url).await {
                staged.push(item);
            }
        }
        if staged.len() < media_refs.len() {
            warn!(
                post_id = post.id,
                staged = staged.len(),
                referenced = media_refs.len(),
                "relaying with fewer attachments than the source post"
            );
        }

        let outcome = self.publisher.publish(&text, &staged).await;
        self.staging.release(post.id);
        let destination_id = outcome?;

        info!(
            post_id = post.id,
            destination_id = %destination_id,
            attachments = staged.len(),
            "post relayed"
        );

        if let Err(e) = self.cache.commit(post.id) {
            // The destination already has the post. Failing to record that
            // is worse than an ordinary relay failure: the next cycle may
            // deliver a duplicate.
            error!(
                post_id = post.id,
                destination_id = %destination_id,
                error = %e,
                "post delivered but dedup commit failed, a duplicate delivery is possible"
            );
            return Err(e);
        }
        Ok(())
    }

    /// Run cycles until the shutdown flag is set, sleeping `poll_interval`
    /// seconds between them. Cycle errors are logged and never abort the
    /// loop; a commit failure in particular means a possible duplicate
    /// delivery later, never a crash.
    pub async fn run(&mut self, poll_interval: u64, shutdown: Arc<AtomicBool>) -> Result<()> {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("shutdown requested, stopping relay loop");
                break;
            }

            info!("polling source timeline");
            match self.run_cycle().await {
                Ok(0) => {}
                Ok(n) => info!(relayed = n, "cycle complete"),
                Err(e) => error!(error = %e, "relay cycle failed"),
            }

            // Sleep until the next cycle, checking for shutdown every second
            for _ in 0..poll_interval {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                sleep(Duration::from_secs(1)).await;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::mock::MockPublisher;
    use crate::source::mock::MockTimeline;
    use crate::staging::MockFetcher;
    use chrono::Utc;
    use tempfile::TempDir;

    fn text_post(id: u64, text: &str) -> Post {
        Post {
            id,
            author: "someone".to_string(),
            created_at: Utc::now(),
            raw_text: text.to_string(),
            media_refs: vec![],
            link_refs: vec![],
        }
    }

    fn orchestrator_with(
        dir: &TempDir,
        timeline: MockTimeline,
        fetcher: MockFetcher,
    ) -> RelayOrchestrator {
        let poller = SourcePoller::new(Box::new(timeline), "someone".to_string(), 5, 60);
        let staging = MediaStaging::new(dir.path().join("media"), Box::new(fetcher)).unwrap();
        let cache = RelayCache::open(dir.path().join("relayed.ids")).unwrap();
        RelayOrchestrator::new(poller, staging, Box::new(MockPublisher::new()), cache)
    }

    #[tokio::test]
    async fn test_cycle_relays_and_commits() {
        let dir = TempDir::new().unwrap();
        let timeline = MockTimeline::new().with_post(text_post(1, "hello"));
        let mut orchestrator = orchestrator_with(&dir, timeline, MockFetcher::new());

        let relayed = orchestrator.run_cycle().await.unwrap();
        assert_eq!(relayed, 1);
        assert!(orchestrator.cache().contains(1));
        assert_eq!(orchestrator.cursor(), Some(1));
    }

    #[tokio::test]
    async fn test_cursor_narrows_next_poll() {
        let dir = TempDir::new().unwrap();
        let timeline = MockTimeline::new()
            .with_post(text_post(1, "first"))
            .with_post(text_post(2, "second"));
        let mut orchestrator = orchestrator_with(&dir, timeline, MockFetcher::new());

        orchestrator.run_cycle().await.unwrap();
        assert_eq!(orchestrator.cursor(), Some(2));

        // Second cycle finds nothing above the cursor
        let relayed = orchestrator.run_cycle().await.unwrap();
        assert_eq!(relayed, 0);
    }

    #[tokio::test]
    async fn test_commit_failure_contained_without_cursor_advance() {
        let dir = TempDir::new().unwrap();
        let timeline = MockTimeline::new().with_post(text_post(1, "hello"));
        let mut orchestrator = orchestrator_with(&dir, timeline, MockFetcher::new());

        // Make the append impossible after open by turning the cache path
        // into a directory.
        let cache_path = dir.path().join("relayed.ids");
        std::fs::remove_file(&cache_path).unwrap();
        std::fs::create_dir(&cache_path).unwrap();

        // The post was delivered but not recorded: the attempt counts as
        // failed, nothing is in the dedup set, and the cursor stays put so
        // the next cycle sees the post again.
        let relayed = orchestrator.run_cycle().await.unwrap();
        assert_eq!(relayed, 0);
        assert!(!orchestrator.cache().contains(1));
        assert_eq!(orchestrator.cursor(), None);
    }

    #[tokio::test]
    async fn test_poll_failure_abandons_cycle() {
        let dir = TempDir::new().unwrap();
        let timeline = MockTimeline::new().with_list_failure();
        let mut orchestrator = orchestrator_with(&dir, timeline, MockFetcher::new());

        assert!(orchestrator.run_cycle().await.is_err());
        assert!(orchestrator.cache().is_empty());
        assert_eq!(orchestrator.cursor(), None);
    }
}
