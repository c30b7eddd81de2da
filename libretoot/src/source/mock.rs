//! Mock source timeline for testing
//!
//! Holds a fixed set of posts and serves them the way the real timeline
//! does: newest-first listings bounded by `since_id`, per-post detail
//! lookups, and optional injected failures. Compiled for all builds so
//! integration tests can use it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Result, SourceError};
use crate::source::SourceTimeline;
use crate::types::{Post, PostSummary};

pub struct MockTimeline {
    posts: Vec<Post>,
    list_fails: bool,
    detail_fails_for: HashSet<u64>,
    list_call_count: Arc<Mutex<usize>>,
    detail_call_count: Arc<Mutex<usize>>,
}

impl MockTimeline {
    pub fn new() -> Self {
        Self {
            posts: Vec::new(),
            list_fails: false,
            detail_fails_for: HashSet::new(),
            list_call_count: Arc::new(Mutex::new(0)),
            detail_call_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_post(mut self, post: Post) -> Self {
        self.posts.push(post);
        self
    }

    /// Fail every listing call, as an unreachable or rate-limited upstream
    /// would.
    pub fn with_list_failure(mut self) -> Self {
        self.list_fails = true;
        self
    }

    /// Fail the detail fetch for one specific post id.
    pub fn with_detail_failure(mut self, id: u64) -> Self {
        self.detail_fails_for.insert(id);
        self
    }

    pub fn list_call_count(&self) -> usize {
        *self.list_call_count.lock().unwrap()
    }

    pub fn detail_call_count(&self) -> usize {
        *self.detail_call_count.lock().unwrap()
    }
}

impl Default for MockTimeline {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceTimeline for MockTimeline {
    async fn list_recent(
        &self,
        _author: &str,
        since_id: Option<u64>,
        limit: usize,
    ) -> Result<Vec<PostSummary>> {
        *self.list_call_count.lock().unwrap() += 1;

        if self.list_fails {
            return Err(SourceError::Network("mock timeline unavailable".to_string()).into());
        }

        let mut summaries: Vec<PostSummary> = self
            .posts
            .iter()
            .filter(|p| since_id.map_or(true, |since| p.id > since))
            .map(|p| p.summary())
            .collect();
        // Newest-first, as the real timeline returns them
        summaries.sort_by(|a, b| b.id.cmp(&a.id));
        summaries.truncate(limit);
        Ok(summaries)
    }

    async fn post_detail(&self, id: u64) -> Result<Post> {
        *self.detail_call_count.lock().unwrap() += 1;

        if self.detail_fails_for.contains(&id) {
            return Err(SourceError::Network(format!("mock detail failure for {}", id)).into());
        }

        self.posts
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| SourceError::Decode(format!("unknown post id {}", id)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(id: u64) -> Post {
        Post {
            id,
            author: "someone".to_string(),
            created_at: Utc::now(),
            raw_text: format!("post {}", id),
            media_refs: vec![],
            link_refs: vec![],
        }
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let timeline = MockTimeline::new()
            .with_post(post(1))
            .with_post(post(3))
            .with_post(post(2));

        let summaries = timeline.list_recent("someone", None, 10).await.unwrap();
        let ids: Vec<u64> = summaries.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(timeline.list_call_count(), 1);
    }

    #[tokio::test]
    async fn test_list_honors_since_id_and_limit() {
        let timeline = MockTimeline::new()
            .with_post(post(1))
            .with_post(post(2))
            .with_post(post(3))
            .with_post(post(4));

        let summaries = timeline.list_recent("someone", Some(1), 2).await.unwrap();
        let ids: Vec<u64> = summaries.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![4, 3]);
    }

    #[tokio::test]
    async fn test_detail_lookup() {
        let timeline = MockTimeline::new().with_post(post(5));

        let detail = timeline.post_detail(5).await.unwrap();
        assert_eq!(detail.raw_text, "post 5");
        assert!(timeline.post_detail(6).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let failing = MockTimeline::new().with_list_failure();
        assert!(failing.list_recent("someone", None, 5).await.is_err());

        let timeline = MockTimeline::new().with_post(post(9)).with_detail_failure(9);
        assert!(timeline.post_detail(9).await.is_err());
    }
}
