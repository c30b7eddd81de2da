//! Mastodon publisher
//!
//! Destination side of the relay, built on the megalodon library. The
//! access token comes from a previously persisted token file; validating it
//! (and acquiring it in the first place) is the credential lifecycle's job,
//! so an absent or rejected token surfaces as a fatal authentication error
//! rather than triggering a login flow here.

use async_trait::async_trait;
use megalodon::entities::UploadMedia;
use megalodon::megalodon::{PostStatusInputOptions, PostStatusOutput};
use megalodon::{Megalodon, SNS};

use crate::config::DestinationConfig;
use crate::error::{PublishError, Result};
use crate::publish::Publisher;
use crate::types::StagedMedia;

pub struct MastodonPublisher {
    client: Box<dyn Megalodon + Send + Sync>,
    instance_url: String,
}

impl MastodonPublisher {
    pub fn new(instance_url: String, access_token: String) -> Result<Self> {
        let client = megalodon::generator(
            SNS::Mastodon,
            instance_url.clone(),
            Some(access_token),
            None,
        )
        .map_err(|e| {
            PublishError::Authentication(format!("cannot create Mastodon client: {:?}", e))
        })?;

        Ok(Self {
            client,
            instance_url,
        })
    }

    /// Build a publisher from configuration, reading the access token from
    /// the configured token file and normalizing the instance URL to https.
    pub fn from_config(config: &DestinationConfig) -> Result<Self> {
        let token_path = shellexpand::full(&config.token_file).map_err(|e| {
            PublishError::Authentication(format!("cannot expand token file path: {}", e))
        })?;

        let token = std::fs::read_to_string(token_path.as_ref())
            .map_err(|e| {
                PublishError::Authentication(format!("cannot read Mastodon token file: {}", e))
            })?
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(
                PublishError::Authentication("Mastodon token file is empty".to_string()).into(),
            );
        }

        let instance_url =
            if config.instance.starts_with("http://") || config.instance.starts_with("https://") {
                config.instance.clone()
            } else {
                format!("https://{}", config.instance)
            };

        Self::new(instance_url, token)
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }
}

#[async_trait]
impl Publisher for MastodonPublisher {
    async fn verify_session(&self) -> Result<()> {
        self.client
            .verify_account_credentials()
            .await
            .map_err(|e| auth_error(e, "verify credentials"))?;
        Ok(())
    }

    async fn upload_media(&self, media: &StagedMedia) -> Result<String> {
        let file_path = media.local_path.to_string_lossy().to_string();
        let response = self
            .client
            .upload_media(file_path, None)
            .await
            .map_err(|e| map_megalodon_error(e, "upload media", true))?;

        let media_id = match response.json {
            UploadMedia::Attachment(attachment) => attachment.id,
            UploadMedia::AsyncAttachment(attachment) => attachment.id,
        };
        Ok(media_id)
    }

    async fn create_post(&self, text: &str, media_ids: Vec<String>) -> Result<String> {
        let options = PostStatusInputOptions {
            media_ids: if media_ids.is_empty() {
                None
            } else {
                Some(media_ids)
            },
            ..Default::default()
        };

        let response = self
            .client
            .post_status(text.to_string(), Some(&options))
            .await
            .map_err(|e| map_megalodon_error(e, "post status", false))?;

        let post_id = match response.json {
            PostStatusOutput::Status(status) => status.id,
            PostStatusOutput::ScheduledStatus(scheduled) => scheduled.id,
        };
        Ok(post_id)
    }

    fn name(&self) -> &str {
        "mastodon"
    }
}

fn auth_error(error: megalodon::error::Error, context: &str) -> PublishError {
    PublishError::Authentication(format!("Mastodon {} failed: {}", context, error))
}

/// Map megalodon errors onto the publish taxonomy.
///
/// megalodon does not expose status codes structurally, so classification
/// parses the rendered message: 401/403 map to authentication, 422 to
/// validation, 429 to rate limiting, 5xx and everything unrecognized to
/// network. `uploading` picks the Upload variant for the catch-all so the
/// orchestrator's logs distinguish which phase of a publish failed.
fn map_megalodon_error(
    error: megalodon::error::Error,
    context: &str,
    uploading: bool,
) -> PublishError {
    let message = format!("Mastodon {} failed: {}", context, error);
    let lower = message.to_lowercase();

    match extract_http_status(&message) {
        Some(401) | Some(403) => PublishError::Authentication(message),
        Some(422) => PublishError::Validation(message),
        Some(429) => PublishError::RateLimit(message),
        Some(500..=599) => PublishError::Network(message),
        _ if lower.contains("unauthorized") || lower.contains("forbidden") => {
            PublishError::Authentication(message)
        }
        _ if lower.contains("rate limit") || lower.contains("too many requests") => {
            PublishError::RateLimit(message)
        }
        _ if uploading => PublishError::Upload(message),
        _ => PublishError::Posting(message),
    }
}

/// Pull a plausible HTTP status code out of an error message, looking for
/// `HTTP 422`, `status 429`, `401:` and the like.
fn extract_http_status(message: &str) -> Option<u16> {
    for prefix in ["HTTP ", "status ", "code: ", "status_code: "] {
        if let Some(pos) = message.find(prefix) {
            if let Some(code_str) = message[pos + prefix.len()..].get(0..3) {
                if let Ok(code) = code_str.parse::<u16>() {
                    if (100..=599).contains(&code) {
                        return Some(code);
                    }
                }
            }
        }
    }

    let bytes = message.as_bytes();
    for (i, window) in bytes.windows(4).enumerate() {
        if window[..3].iter().all(u8::is_ascii_digit)
            && (window[3] == b':' || window[3] == b' ')
            && (i == 0 || !bytes[i - 1].is_ascii_digit())
        {
            if let Ok(code) = std::str::from_utf8(&window[..3]).unwrap_or("").parse::<u16>() {
                if (100..=599).contains(&code) {
                    return Some(code);
                }
            }
        }
    }

    None
}
