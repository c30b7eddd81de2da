//! Mock publisher for testing
//!
//! Configurable stand-in for the destination platform: it can fail
//! authentication, uploads, or post creation on demand, and records
//! everything it was asked to publish so tests can verify ordering, media
//! bytes, and at-most-once behavior. Compiled for all builds so integration
//! tests can use it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{PublishError, Result};
use crate::publish::Publisher;
use crate::types::StagedMedia;

/// One destination post as the mock observed it.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPost {
    pub text: String,
    pub media_ids: Vec<String>,
}

#[derive(Default)]
struct MockState {
    uploads: Vec<Vec<u8>>,
    posts: Vec<CreatedPost>,
    upload_calls: usize,
    create_calls: usize,
    transient_create_failures: HashSet<String>,
}

/// Clones share the recorded state, so a test can keep a handle to a
/// publisher it has handed to the orchestrator.
#[derive(Clone)]
pub struct MockPublisher {
    auth_succeeds: bool,
    upload_succeeds: bool,
    create_succeeds: bool,
    state: Arc<Mutex<MockState>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self {
            auth_succeeds: true,
            upload_succeeds: true,
            create_succeeds: true,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    pub fn with_auth_failure(mut self) -> Self {
        self.auth_succeeds = false;
        self
    }

    pub fn with_upload_failure(mut self) -> Self {
        self.upload_succeeds = false;
        self
    }

    pub fn with_create_failure(mut self) -> Self {
        self.create_succeeds = false;
        self
    }

    /// Fail the next create of a post with exactly this text, then recover.
    pub fn with_transient_create_failure(self, text: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .transient_create_failures
            .insert(text.to_string());
        self
    }

    /// Bodies of every successfully uploaded media file, in upload order.
    pub fn uploaded_bodies(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().uploads.clone()
    }

    /// Every post created, in creation order.
    pub fn created_posts(&self) -> Vec<CreatedPost> {
        self.state.lock().unwrap().posts.clone()
    }

    pub fn upload_call_count(&self) -> usize {
        self.state.lock().unwrap().upload_calls
    }

    pub fn create_call_count(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }
}

impl Default for MockPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn verify_session(&self) -> Result<()> {
        if self.auth_succeeds {
            Ok(())
        } else {
            Err(PublishError::Authentication("mock session rejected".to_string()).into())
        }
    }

    async fn upload_media(&self, media: &StagedMedia) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.upload_calls += 1;

        if !self.upload_succeeds {
            return Err(PublishError::Upload("mock upload failure".to_string()).into());
        }

        // Read the staged bytes so round-trip tests can compare bodies.
        let body = std::fs::read(&media.local_path)
            .map_err(|e| PublishError::Upload(format!("cannot read staged file: {}", e)))?;
        state.uploads.push(body);

        Ok(format!("media-{}", state.uploads.len()))
    }

    async fn create_post(&self, text: &str, media_ids: Vec<String>) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;

        if !self.create_succeeds {
            return Err(PublishError::Posting("mock post failure".to_string()).into());
        }
        if state.transient_create_failures.remove(text) {
            return Err(PublishError::Posting("mock transient post failure".to_string()).into());
        }

        state.posts.push(CreatedPost {
            text: text.to_string(),
            media_ids,
        });
        Ok(format!("post-{}", state.posts.len()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
