use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::event::{FacebookDestinationType, FacebookRouting};
use crate::services::{format_start_time, send_with_backoff, FacebookPlatform};

const FACEBOOK_GRAPH_URL: &str = "https://graph.facebook.com/v3.2";

const VIDEO_FIELDS: &str = "id,title,description,planned_start_time,broadcast_start_time";

#[derive(Debug, Clone)]
pub struct FacebookService {
    client: Client,
    access_token: String,
    pages: Arc<RwLock<Vec<FacebookPage>>>,
    groups: Arc<RwLock<Vec<FacebookGroup>>>,
}

// ============================================================================
// Live Video Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LiveVideoListResponse {
    #[serde(default)]
    pub data: Vec<FacebookLiveVideo>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FacebookLiveVideo {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub planned_start_time: Option<String>,
    pub broadcast_start_time: Option<String>,
}

// ============================================================================
// Page Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PageListResponse {
    #[serde(default)]
    pub data: Vec<FacebookPage>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FacebookPage {
    pub id: String,
    pub name: String,
    /// Page-scoped token; page destinations are mutated with this instead of
    /// the user token.
    pub access_token: Option<String>,
}

// ============================================================================
// Group Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GroupListResponse {
    #[serde(default)]
    pub data: Vec<FacebookGroup>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FacebookGroup {
    pub id: String,
    pub name: String,
}

// ============================================================================
// Draft Settings
// ============================================================================

/// Editable settings for one live video, bound to the scheduling form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacebookStreamSettings {
    pub title: String,
    pub description: String,
    pub destination_type: FacebookDestinationType,
    pub page_id: Option<String>,
    pub group_id: Option<String>,
    /// Epoch milliseconds; kept in sync with the form's generic time field.
    pub planned_start_time: i64,
}

impl FacebookStreamSettings {
    /// The Graph node a new live video is created under. Page and group
    /// destinations must have an id picked in the form.
    pub fn resolve_destination_id(&self) -> AppResult<String> {
        match self.destination_type {
            FacebookDestinationType::Timeline => Ok("me".to_string()),
            FacebookDestinationType::Page => {
                self.page_id.clone().ok_or(AppError::MissingDestination)
            }
            FacebookDestinationType::Group => {
                self.group_id.clone().ok_or(AppError::MissingDestination)
            }
        }
    }
}

impl FacebookService {
    pub fn new(access_token: String) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            client,
            access_token,
            pages: Arc::new(RwLock::new(Vec::new())),
            groups: Arc::new(RwLock::new(Vec::new())),
        })
    }

    /// Page destinations use the page-scoped token when one is available.
    async fn token_for(&self, routing: &FacebookRouting) -> String {
        if routing.destination_type == FacebookDestinationType::Page {
            let pages = self.pages.read().await;
            if let Some(page) = pages.iter().find(|p| p.id == routing.destination_id) {
                if let Some(token) = &page.access_token {
                    return token.clone();
                }
            }
        }
        self.access_token.clone()
    }

    fn graph_url(&self, path: &str) -> String {
        format!("{}/{}", FACEBOOK_GRAPH_URL, path)
    }

    async fn fetch_video(
        &self,
        video_id: &str,
        token: &str,
    ) -> AppResult<FacebookLiveVideo> {
        let response = send_with_backoff(
            || {
                self.client
                    .get(self.graph_url(video_id))
                    .query(&[("fields", VIDEO_FIELDS), ("access_token", token)])
            },
            AppError::FacebookApi,
        )
        .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::FacebookApi(format!(
                "Failed to fetch live video {}: {}",
                video_id, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::FacebookApi(format!("Failed to parse live video: {}", e)))
    }

    async fn fetch_videos_for(
        &self,
        routing: &FacebookRouting,
    ) -> AppResult<Vec<(FacebookLiveVideo, FacebookRouting)>> {
        let token = self.token_for(routing).await;

        let response = send_with_backoff(
            || {
                self.client
                    .get(self.graph_url(&format!("{}/live_videos", routing.destination_id)))
                    .query(&[
                        ("fields", VIDEO_FIELDS),
                        ("broadcast_status", "[\"SCHEDULED_UNPUBLISHED\"]"),
                        ("access_token", token.as_str()),
                    ])
            },
            AppError::FacebookApi,
        )
        .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::FacebookApi(format!(
                "Failed to fetch live videos for {}: {}",
                routing.destination_id, error_text
            )));
        }

        let list: LiveVideoListResponse = response
            .json()
            .await
            .map_err(|e| AppError::FacebookApi(format!("Failed to parse live videos: {}", e)))?;

        Ok(list
            .data
            .into_iter()
            .map(|video| (video, routing.clone()))
            .collect())
    }
}

/// Every destination the account can publish to: the timeline, each page and
/// each group. Mutating a video later routes back through the same entry.
fn destinations(pages: &[FacebookPage], groups: &[FacebookGroup]) -> Vec<FacebookRouting> {
    let mut destinations = vec![FacebookRouting {
        destination_type: FacebookDestinationType::Timeline,
        destination_id: "me".to_string(),
    }];
    destinations.extend(pages.iter().map(|page| FacebookRouting {
        destination_type: FacebookDestinationType::Page,
        destination_id: page.id.clone(),
    }));
    destinations.extend(groups.iter().map(|group| FacebookRouting {
        destination_type: FacebookDestinationType::Group,
        destination_id: group.id.clone(),
    }));
    destinations
}

#[async_trait]
impl FacebookPlatform for FacebookService {
    /// Resolve and cache the pages and groups the user can publish to.
    async fn prepopulate_info(&self) -> AppResult<()> {
        let response = send_with_backoff(
            || {
                self.client
                    .get(self.graph_url("me/accounts"))
                    .query(&[("access_token", self.access_token.as_str())])
            },
            AppError::FacebookApi,
        )
        .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::FacebookApi(format!(
                "Failed to fetch pages: {}",
                error_text
            )));
        }

        let pages: PageListResponse = response
            .json()
            .await
            .map_err(|e| AppError::FacebookApi(format!("Failed to parse page list: {}", e)))?;

        let response = send_with_backoff(
            || {
                self.client
                    .get(self.graph_url("me/groups"))
                    .query(&[
                        ("fields", "id,name"),
                        ("access_token", self.access_token.as_str()),
                    ])
            },
            AppError::FacebookApi,
        )
        .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::FacebookApi(format!(
                "Failed to fetch groups: {}",
                error_text
            )));
        }

        let groups: GroupListResponse = response
            .json()
            .await
            .map_err(|e| AppError::FacebookApi(format!("Failed to parse group list: {}", e)))?;

        tracing::info!(
            "Facebook account has {} publishable pages and {} groups",
            pages.data.len(),
            groups.data.len()
        );
        *self.pages.write().await = pages.data;
        *self.groups.write().await = groups.data;
        Ok(())
    }

    async fn fetch_all_videos(&self) -> AppResult<Vec<(FacebookLiveVideo, FacebookRouting)>> {
        let destinations = {
            let pages = self.pages.read().await;
            let groups = self.groups.read().await;
            destinations(&pages, &groups)
        };

        let mut videos = Vec::new();
        for routing in &destinations {
            videos.extend(self.fetch_videos_for(routing).await?);
        }

        Ok(videos)
    }

    async fn fetch_start_stream_options(
        &self,
        video_id: &str,
        routing: &FacebookRouting,
    ) -> AppResult<FacebookStreamSettings> {
        let token = self.token_for(routing).await;
        let video = self.fetch_video(video_id, &token).await?;

        Ok(FacebookStreamSettings {
            title: video.title.unwrap_or_default(),
            description: video.description.unwrap_or_default(),
            destination_type: routing.destination_type,
            page_id: (routing.destination_type == FacebookDestinationType::Page)
                .then(|| routing.destination_id.clone()),
            group_id: (routing.destination_type == FacebookDestinationType::Group)
                .then(|| routing.destination_id.clone()),
            planned_start_time: video
                .planned_start_time
                .as_deref()
                .and_then(crate::event::parse_start_time)
                .unwrap_or_default(),
        })
    }

    async fn schedule_stream(
        &self,
        start_time_ms: i64,
        settings: &FacebookStreamSettings,
    ) -> AppResult<FacebookLiveVideo> {
        let destination_id = settings.resolve_destination_id()?;
        let routing = FacebookRouting {
            destination_type: settings.destination_type,
            destination_id: destination_id.clone(),
        };
        let token = self.token_for(&routing).await;
        // The Graph API takes planned_start_time as unix seconds.
        let planned_start = (start_time_ms / 1000).to_string();

        let response = send_with_backoff(
            || {
                self.client
                    .post(self.graph_url(&format!("{}/live_videos", destination_id)))
                    .query(&[
                        ("title", settings.title.as_str()),
                        ("description", settings.description.as_str()),
                        ("planned_start_time", planned_start.as_str()),
                        ("status", "SCHEDULED_UNPUBLISHED"),
                        ("access_token", token.as_str()),
                    ])
            },
            AppError::FacebookApi,
        )
        .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::FacebookApi(format!(
                "Failed to schedule live video: {}",
                error_text
            )));
        }

        let mut video: FacebookLiveVideo = response
            .json()
            .await
            .map_err(|e| AppError::FacebookApi(format!("Failed to parse live video: {}", e)))?;

        // The create response only carries the id; backfill what the
        // normalizer needs from the request.
        if video.planned_start_time.is_none() {
            video.planned_start_time = Some(format_start_time(start_time_ms)?);
        }
        if video.title.is_none() {
            video.title = Some(settings.title.clone());
        }

        Ok(video)
    }

    async fn update_live_video(
        &self,
        video_id: &str,
        settings: &FacebookStreamSettings,
    ) -> AppResult<FacebookLiveVideo> {
        let destination_id = settings.resolve_destination_id()?;
        let routing = FacebookRouting {
            destination_type: settings.destination_type,
            destination_id,
        };
        let token = self.token_for(&routing).await;
        let planned_start = (settings.planned_start_time / 1000).to_string();

        let response = send_with_backoff(
            || {
                self.client
                    .post(self.graph_url(video_id))
                    .query(&[
                        ("title", settings.title.as_str()),
                        ("description", settings.description.as_str()),
                        ("planned_start_time", planned_start.as_str()),
                        ("access_token", token.as_str()),
                    ])
            },
            AppError::FacebookApi,
        )
        .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::FacebookApi(format!(
                "Failed to update live video {}: {}",
                video_id, error_text
            )));
        }

        // The update response does not echo the resource; fetch it back so the
        // caller can re-normalize from current platform state.
        self.fetch_video(video_id, &token).await
    }

    async fn remove_live_video(&self, video_id: &str, routing: &FacebookRouting) -> AppResult<()> {
        let token = self.token_for(routing).await;

        let response = send_with_backoff(
            || {
                self.client
                    .delete(self.graph_url(video_id))
                    .query(&[("access_token", token.as_str())])
            },
            AppError::FacebookApi,
        )
        .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::FacebookApi(format!(
                "Failed to delete live video {}: {}",
                video_id, error_text
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_destination_resolves_to_me() {
        let settings = FacebookStreamSettings::default();
        assert_eq!(settings.resolve_destination_id().unwrap(), "me");
    }

    #[test]
    fn page_destination_requires_a_page_id() {
        let mut settings = FacebookStreamSettings {
            destination_type: FacebookDestinationType::Page,
            ..Default::default()
        };
        assert!(matches!(
            settings.resolve_destination_id(),
            Err(AppError::MissingDestination)
        ));

        settings.page_id = Some("page1".to_string());
        assert_eq!(settings.resolve_destination_id().unwrap(), "page1");
    }

    #[test]
    fn group_destination_requires_a_group_id() {
        let settings = FacebookStreamSettings {
            destination_type: FacebookDestinationType::Group,
            group_id: Some("group9".to_string()),
            ..Default::default()
        };
        assert_eq!(settings.resolve_destination_id().unwrap(), "group9");
    }

    #[test]
    fn destinations_cover_timeline_pages_and_groups() {
        let pages = vec![FacebookPage {
            id: "page1".to_string(),
            name: "My page".to_string(),
            access_token: None,
        }];
        let groups = vec![FacebookGroup {
            id: "group9".to_string(),
            name: "My group".to_string(),
        }];

        let routings = destinations(&pages, &groups);
        assert_eq!(
            routings,
            vec![
                FacebookRouting {
                    destination_type: FacebookDestinationType::Timeline,
                    destination_id: "me".to_string(),
                },
                FacebookRouting {
                    destination_type: FacebookDestinationType::Page,
                    destination_id: "page1".to_string(),
                },
                FacebookRouting {
                    destination_type: FacebookDestinationType::Group,
                    destination_id: "group9".to_string(),
                },
            ]
        );
    }

    #[test]
    fn group_list_parses_graph_shape() {
        let json = r#"{"data": [{"id": "group9", "name": "Speedrunners"}]}"#;
        let list: GroupListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(list.data.len(), 1);
        assert_eq!(list.data[0].id, "group9");
    }

    #[test]
    fn live_video_list_parses_graph_shape() {
        let json = r#"{
            "data": [{
                "id": "fb1",
                "title": "Page stream",
                "planned_start_time": "2024-03-01T12:00:00+0000"
            }]
        }"#;

        let list: LiveVideoListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(list.data.len(), 1);
        assert_eq!(list.data[0].id, "fb1");
        assert!(list.data[0].broadcast_start_time.is_none());
    }
}
