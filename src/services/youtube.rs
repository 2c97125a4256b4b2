use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::event::parse_start_time;
use crate::services::{format_start_time, send_with_backoff, YoutubePlatform};

const YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";

const BROADCAST_PARTS: &str = "id,snippet,status";
const PAGE_SIZE: &str = "50";

#[derive(Debug, Clone)]
pub struct YoutubeService {
    client: Client,
    access_token: String,
    channel: Arc<RwLock<Option<YoutubeChannel>>>,
}

// ============================================================================
// Broadcast Types
// ============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastListResponse {
    #[serde(default)]
    pub items: Vec<YoutubeBroadcast>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct YoutubeBroadcast {
    pub id: String,
    pub snippet: BroadcastSnippet,
    pub status: BroadcastStatus,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub scheduled_start_time: Option<String>,
    pub actual_start_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastStatus {
    pub life_cycle_status: LifeCycleStatus,
    pub privacy_status: Option<PrivacyStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LifeCycleStatus {
    Created,
    Ready,
    TestStarting,
    Testing,
    LiveStarting,
    Live,
    Complete,
    Revoked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PrivacyStatus {
    Public,
    Unlisted,
    Private,
}

impl Default for PrivacyStatus {
    fn default() -> Self {
        PrivacyStatus::Public
    }
}

// ============================================================================
// Channel Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChannelListResponse {
    #[serde(default)]
    pub items: Vec<YoutubeChannel>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct YoutubeChannel {
    pub id: String,
    pub snippet: ChannelSnippet,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChannelSnippet {
    pub title: String,
}

// ============================================================================
// Draft Settings
// ============================================================================

/// Editable settings for one broadcast, bound to the scheduling form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YoutubeStreamSettings {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub privacy_status: PrivacyStatus,
    /// Epoch milliseconds; kept in sync with the form's generic time field.
    pub scheduled_start_time: i64,
}

impl YoutubeService {
    pub fn new(access_token: String) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            client,
            access_token,
            channel: Arc::new(RwLock::new(None)),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/{}", YOUTUBE_API_URL, path))
            .bearer_auth(&self.access_token)
    }

    fn broadcast_body(
        &self,
        broadcast_id: Option<&str>,
        start_time: &str,
        settings: &YoutubeStreamSettings,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "snippet": {
                "title": settings.title,
                "description": settings.description,
                "scheduledStartTime": start_time,
            },
            "status": {
                "privacyStatus": settings.privacy_status,
            },
        });
        if let Some(id) = broadcast_id {
            body["id"] = serde_json::Value::String(id.to_string());
        }
        body
    }

    async fn fetch_broadcast(&self, broadcast_id: &str) -> AppResult<YoutubeBroadcast> {
        let response = send_with_backoff(
            || {
                self.request(reqwest::Method::GET, "liveBroadcasts")
                    .query(&[("part", BROADCAST_PARTS), ("id", broadcast_id)])
            },
            AppError::YoutubeApi,
        )
        .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::YoutubeApi(format!(
                "Failed to fetch broadcast {}: {}",
                broadcast_id, error_text
            )));
        }

        let list: BroadcastListResponse = response
            .json()
            .await
            .map_err(|e| AppError::YoutubeApi(format!("Failed to parse broadcast list: {}", e)))?;

        list.items
            .into_iter()
            .next()
            .ok_or_else(|| AppError::YoutubeApi(format!("Broadcast {} not found", broadcast_id)))
    }
}

#[async_trait]
impl YoutubePlatform for YoutubeService {
    /// Resolve and cache the channel of the authenticated account.
    async fn prepopulate_info(&self) -> AppResult<()> {
        if self.channel.read().await.is_some() {
            return Ok(());
        }

        let response = send_with_backoff(
            || {
                self.request(reqwest::Method::GET, "channels")
                    .query(&[("part", "snippet"), ("mine", "true")])
            },
            AppError::YoutubeApi,
        )
        .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::YoutubeApi(format!(
                "Failed to fetch channel info: {}",
                error_text
            )));
        }

        let list: ChannelListResponse = response
            .json()
            .await
            .map_err(|e| AppError::YoutubeApi(format!("Failed to parse channel list: {}", e)))?;

        let channel = list.items.into_iter().next().ok_or_else(|| {
            AppError::YoutubeApi("No channel for the authenticated account".to_string())
        })?;

        tracing::info!("Using YouTube channel {} ({})", channel.snippet.title, channel.id);
        *self.channel.write().await = Some(channel);
        Ok(())
    }

    async fn fetch_broadcasts(&self) -> AppResult<Vec<YoutubeBroadcast>> {
        let mut broadcasts = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let response = send_with_backoff(
                || {
                    let mut request = self
                        .request(reqwest::Method::GET, "liveBroadcasts")
                        .query(&[
                            ("part", BROADCAST_PARTS),
                            ("broadcastType", "all"),
                            ("mine", "true"),
                            ("maxResults", PAGE_SIZE),
                        ]);
                    if let Some(token) = page_token.as_deref() {
                        request = request.query(&[("pageToken", token)]);
                    }
                    request
                },
                AppError::YoutubeApi,
            )
            .await?;

            if !response.status().is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(AppError::YoutubeApi(format!(
                    "Failed to fetch broadcasts: {}",
                    error_text
                )));
            }

            let page: BroadcastListResponse = response.json().await.map_err(|e| {
                AppError::YoutubeApi(format!("Failed to parse broadcast list: {}", e))
            })?;

            broadcasts.extend(page.items);
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(broadcasts)
    }

    async fn fetch_start_stream_options(
        &self,
        broadcast_id: &str,
    ) -> AppResult<YoutubeStreamSettings> {
        let broadcast = self.fetch_broadcast(broadcast_id).await?;

        Ok(YoutubeStreamSettings {
            title: broadcast.snippet.title,
            description: broadcast.snippet.description,
            privacy_status: broadcast.status.privacy_status.unwrap_or_default(),
            scheduled_start_time: broadcast
                .snippet
                .scheduled_start_time
                .as_deref()
                .and_then(parse_start_time)
                .unwrap_or_default(),
        })
    }

    async fn schedule_stream(
        &self,
        start_time_ms: i64,
        settings: &YoutubeStreamSettings,
    ) -> AppResult<YoutubeBroadcast> {
        let start_time = format_start_time(start_time_ms)?;
        let body = self.broadcast_body(None, &start_time, settings);

        let response = send_with_backoff(
            || {
                self.request(reqwest::Method::POST, "liveBroadcasts")
                    .query(&[("part", BROADCAST_PARTS)])
                    .json(&body)
            },
            AppError::YoutubeApi,
        )
        .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::YoutubeApi(format!(
                "Failed to schedule broadcast: {}",
                error_text
            )));
        }

        let mut broadcast: YoutubeBroadcast = response
            .json()
            .await
            .map_err(|e| AppError::YoutubeApi(format!("Failed to parse broadcast: {}", e)))?;

        // The insert response occasionally omits the echoed start time.
        if broadcast.snippet.scheduled_start_time.is_none() {
            broadcast.snippet.scheduled_start_time = Some(start_time);
        }

        Ok(broadcast)
    }

    async fn update_broadcast(
        &self,
        broadcast_id: &str,
        settings: &YoutubeStreamSettings,
    ) -> AppResult<YoutubeBroadcast> {
        let start_time = format_start_time(settings.scheduled_start_time)?;
        let body = self.broadcast_body(Some(broadcast_id), &start_time, settings);

        let response = send_with_backoff(
            || {
                self.request(reqwest::Method::PUT, "liveBroadcasts")
                    .query(&[("part", BROADCAST_PARTS)])
                    .json(&body)
            },
            AppError::YoutubeApi,
        )
        .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::YoutubeApi(format!(
                "Failed to update broadcast {}: {}",
                broadcast_id, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::YoutubeApi(format!("Failed to parse broadcast: {}", e)))
    }

    async fn remove_broadcast(&self, broadcast_id: &str) -> AppResult<()> {
        let response = send_with_backoff(
            || {
                self.request(reqwest::Method::DELETE, "liveBroadcasts")
                    .query(&[("id", broadcast_id)])
            },
            AppError::YoutubeApi,
        )
        .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::YoutubeApi(format!(
                "Failed to delete broadcast {}: {}",
                broadcast_id, error_text
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn life_cycle_status_deserializes_from_camel_case() {
        let status: LifeCycleStatus = serde_json::from_str("\"testStarting\"").unwrap();
        assert_eq!(status, LifeCycleStatus::TestStarting);

        let status: LifeCycleStatus = serde_json::from_str("\"ready\"").unwrap();
        assert_eq!(status, LifeCycleStatus::Ready);
    }

    #[test]
    fn broadcast_list_parses_api_shape() {
        let json = r#"{
            "items": [{
                "id": "yt1",
                "snippet": {
                    "title": "Launch",
                    "scheduledStartTime": "2024-01-01T10:00:00Z"
                },
                "status": {"lifeCycleStatus": "ready", "privacyStatus": "public"}
            }],
            "nextPageToken": "abc"
        }"#;

        let list: BroadcastListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.next_page_token.as_deref(), Some("abc"));

        let broadcast = &list.items[0];
        assert_eq!(broadcast.id, "yt1");
        assert_eq!(broadcast.status.life_cycle_status, LifeCycleStatus::Ready);
        assert_eq!(broadcast.status.privacy_status, Some(PrivacyStatus::Public));
        assert!(broadcast.snippet.actual_start_time.is_none());
    }
}
