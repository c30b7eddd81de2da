//! Core types for Retoot

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fully resolved source post, immutable once fetched.
///
/// `id` is the source platform's native identifier. Identifiers are totally
/// ordered by the platform, which makes them usable both as the "since"
/// bound for timeline queries and as the dedup key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub raw_text: String,
    pub media_refs: Vec<MediaRef>,
    pub link_refs: Vec<LinkRef>,
}

/// A timeline listing row: just enough to run the recency and dedup filters
/// before paying for a full detail fetch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: u64,
    pub created_at: DateTime<Utc>,
}

/// A media attachment reference, transient for the lifetime of one transform.
///
/// `text_marker` is the shortened form embedded in the post body and gets
/// stripped during transformation; `source_url` is the downloadable asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    pub text_marker: String,
    pub source_url: String,
}

/// A shortened link and its expanded destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRef {
    pub short_url: String,
    pub expanded_url: String,
}

/// A media file downloaded into the staging area for one relay attempt.
///
/// Owned by `MediaStaging`; deleted unconditionally when the attempt ends,
/// whatever the outcome, so retries never re-upload stale files.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedMedia {
    pub post_id: u64,
    pub local_path: PathBuf,
}

impl Post {
    /// Summary view of this post, as the timeline listing would return it.
    pub fn summary(&self) -> PostSummary {
        PostSummary {
            id: self.id,
            created_at: self.created_at,
        }
    }
}
