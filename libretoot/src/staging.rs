//! On-disk media staging between source download and destination upload
//!
//! Media lives in a per-post subdirectory under a configured root for the
//! lifetime of one relay attempt. Staging is best-effort per attachment: a
//! failed download degrades the post to fewer attachments, it never blocks
//! text delivery. `release` must run on every exit path so failed attempts
//! do not leak files into the next cycle.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{Result, SourceError, StagingError};
use crate::types::StagedMedia;

/// Capability for fetching a media body over HTTP.
///
/// `Ok(None)` means the server answered with a non-success status; transport
/// failures are errors. Split out as a trait so tests can script bodies and
/// failures without a network.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>>;
}

/// Production fetcher backed by reqwest.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("media download {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "media download rejected");
            return Ok(None);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SourceError::Network(format!("media download {}: {}", url, e)))?;
        Ok(Some(body.to_vec()))
    }
}

/// Scoped holding area for media downloaded from a source post.
pub struct MediaStaging {
    root: PathBuf,
    fetcher: Box<dyn MediaFetcher>,
}

impl std::fmt::Debug for MediaStaging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStaging")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl MediaStaging {
    /// Create the staging area rooted at `root`, creating the directory if
    /// needed.
    pub fn new(root: impl Into<PathBuf>, fetcher: Box<dyn MediaFetcher>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(StagingError::Init)?;
        Ok(Self { root, fetcher })
    }

    /// Download one media URL into the post's staging directory.
    ///
    /// Returns `None` on any per-item failure (HTTP status, transport,
    /// filesystem); the caller treats that as "media unavailable" for this
    /// single attachment.
    pub async fn stage(&self, post_id: u64, media_url: &str) -> Option<StagedMedia> {
        let body = match self.fetcher.fetch(media_url).await {
            Ok(Some(body)) => body,
            Ok(None) => return None,
            Err(e) => {
                warn!(post_id, %media_url, error = %e, "media download failed");
                return None;
            }
        };

        let dir = self.post_dir(post_id);
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!(post_id, error = %e, "cannot create staging directory");
            return None;
        }

        let path = dir.join(file_name_for(media_url));
        if let Err(e) = fs::write(&path, &body) {
            warn!(post_id, path = %path.display(), error = %e, "cannot write staged media");
            return None;
        }

        debug!(post_id, path = %path.display(), bytes = body.len(), "staged media");
        Some(StagedMedia {
            post_id,
            local_path: path,
        })
    }

    /// Remove every staged file for this post. Idempotent; an absent
    /// directory is not an error.
    pub fn release(&self, post_id: u64) {
        let dir = self.post_dir(post_id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => debug!(post_id, "released staged media"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(post_id, error = %e, "failed to release staged media"),
        }
    }

    /// Whether any staged files remain for this post.
    pub fn has_staged(&self, post_id: u64) -> bool {
        self.post_dir(post_id).exists()
    }

    fn post_dir(&self, post_id: u64) -> PathBuf {
        self.root.join(post_id.to_string())
    }
}

/// Derive a local file name from the URL's trailing path segment, ignoring
/// query and fragment.
fn file_name_for(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "media".to_string(),
    }
}

/// Scripted fetcher for tests: maps URLs to bodies, non-success statuses,
/// or transport failures. Compiled for all builds so integration tests can
/// use it, same as the publisher and timeline mocks.
pub struct MockFetcher {
    bodies: std::collections::HashMap<String, Option<Vec<u8>>>,
    failing: std::collections::HashSet<String>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            bodies: std::collections::HashMap::new(),
            failing: std::collections::HashSet::new(),
        }
    }

    /// Serve `body` with HTTP 200 for `url`.
    pub fn with_body(mut self, url: &str, body: &[u8]) -> Self {
        self.bodies.insert(url.to_string(), Some(body.to_vec()));
        self
    }

    /// Answer `url` with a non-success status.
    pub fn with_rejection(mut self, url: &str) -> Self {
        self.bodies.insert(url.to_string(), None);
        self
    }

    /// Fail `url` at the transport level.
    pub fn with_transport_failure(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>> {
        if self.failing.contains(url) {
            return Err(SourceError::Network(format!("mock transport failure: {}", url)).into());
        }
        match self.bodies.get(url) {
            Some(Some(body)) => Ok(Some(body.clone())),
            Some(None) => Ok(None),
            None => Ok(None),
        }
    }
}
