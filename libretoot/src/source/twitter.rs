//! Twitter timeline client
//!
//! Talks to the v1.1 REST API with bearer-token auth. The timeline listing
//! uses `statuses/user_timeline` with reposts and replies excluded; the
//! detail fetch uses `statuses/show` in extended mode so the full text and
//! the complete media list come back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::SourceConfig;
use crate::error::{Result, SourceError};
use crate::source::SourceTimeline;
use crate::types::{LinkRef, MediaRef, Post, PostSummary};

/// Wire timestamp format, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
const WIRE_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

pub struct TwitterTimeline {
    client: reqwest::Client,
    api_base: String,
    bearer_token: String,
}

impl TwitterTimeline {
    pub fn new(api_base: String, bearer_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            bearer_token,
        }
    }

    /// Build a client from configuration, reading the bearer token from the
    /// configured token file.
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let token_path = shellexpand::full(&config.bearer_token_file).map_err(|e| {
            SourceError::Authentication(format!("cannot expand bearer token path: {}", e))
        })?;

        let token = std::fs::read_to_string(token_path.as_ref())
            .map_err(|e| {
                SourceError::Authentication(format!("cannot read bearer token file: {}", e))
            })?
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(SourceError::Authentication("bearer token file is empty".to_string()).into());
        }

        Ok(Self::new(config.api_base.clone(), token))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.api_base, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("{}: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status.as_u16(), path).into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("{}: {}", path, e)))?;
        serde_json::from_str(&body)
            .map_err(|e| SourceError::Decode(format!("{}: {}", path, e)).into())
    }
}

#[async_trait]
impl SourceTimeline for TwitterTimeline {
    async fn list_recent(
        &self,
        author: &str,
        since_id: Option<u64>,
        limit: usize,
    ) -> Result<Vec<PostSummary>> {
        let mut query = vec![
            ("screen_name", author.to_string()),
            ("count", limit.to_string()),
            ("include_rts", "false".to_string()),
            ("exclude_replies", "true".to_string()),
            ("trim_user", "true".to_string()),
        ];
        if let Some(id) = since_id {
            query.push(("since_id", id.to_string()));
        }

        let statuses: Vec<TimelineStatus> =
            self.get_json("statuses/user_timeline.json", &query).await?;

        statuses
            .into_iter()
            .map(|status| {
                Ok(PostSummary {
                    id: status.id,
                    created_at: parse_created_at(&status.created_at)?,
                })
            })
            .collect()
    }

    async fn post_detail(&self, id: u64) -> Result<Post> {
        let query = vec![
            ("id", id.to_string()),
            ("tweet_mode", "extended".to_string()),
            ("include_entities", "true".to_string()),
        ];

        let status: ExtendedStatus = self.get_json("statuses/show.json", &query).await?;
        status.into_post()
    }
}

fn map_status(status: u16, context: &str) -> SourceError {
    match status {
        401 | 403 => SourceError::Authentication(format!("{}: HTTP {}", context, status)),
        429 => SourceError::RateLimit(format!("{}: HTTP {}", context, status)),
        500..=599 => SourceError::Network(format!("{}: HTTP {}", context, status)),
        _ => SourceError::Network(format!("{}: HTTP {}", context, status)),
    }
}

fn parse_created_at(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_str(raw, WIRE_TIME_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SourceError::Decode(format!("created_at {:?}: {}", raw, e)).into())
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TimelineStatus {
    id: u64,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct ExtendedStatus {
    id: u64,
    full_text: String,
    created_at: String,
    user: StatusUser,
    #[serde(default)]
    entities: StatusEntities,
    /// Extended mode puts the complete media list here; `entities.media`
    /// only ever carries the first attachment.
    #[serde(default)]
    extended_entities: Option<MediaEntities>,
}

#[derive(Debug, Deserialize)]
struct StatusUser {
    screen_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct StatusEntities {
    #[serde(default)]
    urls: Vec<UrlEntity>,
    #[serde(default)]
    media: Vec<MediaEntity>,
}

#[derive(Debug, Deserialize)]
struct MediaEntities {
    #[serde(default)]
    media: Vec<MediaEntity>,
}

#[derive(Debug, Deserialize)]
struct UrlEntity {
    url: String,
    expanded_url: String,
}

#[derive(Debug, Deserialize)]
struct MediaEntity {
    url: String,
    media_url_https: String,
}

impl ExtendedStatus {
    fn into_post(self) -> Result<Post> {
        let created_at = parse_created_at(&self.created_at)?;

        let media_entities = match self.extended_entities {
            Some(extended) if !extended.media.is_empty() => extended.media,
            _ => self.entities.media,
        };

        let media_refs = media_entities
            .into_iter()
            .map(|m| MediaRef {
                text_marker: m.url,
                source_url: m.media_url_https,
            })
            .collect();

        let link_refs = self
            .entities
            .urls
            .into_iter()
            .map(|u| LinkRef {
                short_url: u.url,
                expanded_url: u.expanded_url,
            })
            .collect();

        Ok(Post {
            id: self.id,
            author: self.user.screen_name,
            created_at,
            raw_text: self.full_text,
            media_refs,
            link_refs,
        })
    }
}
