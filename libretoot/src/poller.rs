//! Candidate selection from the source timeline
//!
//! One poll lists the most recent timeline entries, drops everything
//! already relayed or outside the recency window, and resolves the
//! survivors oldest-first so a burst of posts goes out in publication
//! order. Candidate selection itself is a pure function over the listing,
//! exercised directly by the unit tests.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::cache::RelayCache;
use crate::error::Result;
use crate::source::SourceTimeline;
use crate::types::{Post, PostSummary};

pub struct SourcePoller {
    source: Box<dyn SourceTimeline>,
    author: String,
    page_size: usize,
    lookback: Duration,
}

impl SourcePoller {
    pub fn new(
        source: Box<dyn SourceTimeline>,
        author: String,
        page_size: usize,
        lookback_seconds: u64,
    ) -> Self {
        Self {
            source,
            author,
            page_size,
            lookback: Duration::seconds(lookback_seconds as i64),
        }
    }

    /// One poll: list, filter, resolve. Returns fully resolved posts
    /// oldest-first. Any upstream failure propagates and the whole cycle is
    /// abandoned; no partial results are returned.
    pub async fn poll(&self, cache: &RelayCache, since_id: Option<u64>) -> Result<Vec<Post>> {
        let summaries = self
            .source
            .list_recent(&self.author, since_id, self.page_size)
            .await?;

        let candidates = select_candidates(&summaries, cache, Utc::now(), self.lookback);
        debug!(
            listed = summaries.len(),
            selected = candidates.len(),
            "poll complete"
        );

        let mut posts = Vec::with_capacity(candidates.len());
        for id in candidates {
            posts.push(self.source.post_detail(id).await?);
        }
        Ok(posts)
    }
}

/// Pick the candidate ids out of one timeline listing, oldest-first.
///
/// A post qualifies when it is not yet in the dedup cache and its age at
/// `now` is strictly less than `lookback`. The strict bound is applied
/// consistently in both directions: age == lookback is excluded.
pub fn select_candidates(
    summaries: &[PostSummary],
    cache: &RelayCache,
    now: DateTime<Utc>,
    lookback: Duration,
) -> Vec<u64> {
    let mut ids: Vec<u64> = summaries
        .iter()
        .filter(|s| !cache.contains(s.id))
        .filter(|s| now.signed_duration_since(s.created_at) < lookback)
        .map(|s| s.id)
        .collect();
    // Source ids are totally ordered by publication time.
    ids.sort_unstable();
    ids
}
