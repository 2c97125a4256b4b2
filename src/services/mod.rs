pub mod facebook;
pub mod youtube;

use async_trait::async_trait;
use chrono::{SecondsFormat, TimeZone, Utc};

use crate::error::{AppError, AppResult};
use crate::event::FacebookRouting;
use self::facebook::{FacebookLiveVideo, FacebookStreamSettings};
use self::youtube::{YoutubeBroadcast, YoutubeStreamSettings};

/// Seam between the scheduler and the YouTube Data API.
///
/// `prepopulate_info` must be awaited before any fetch or schedule call; it
/// establishes the channel context the other operations rely on.
#[async_trait]
pub trait YoutubePlatform: Send + Sync {
    async fn prepopulate_info(&self) -> AppResult<()>;

    /// All broadcasts of the linked channel, scheduled and past.
    async fn fetch_broadcasts(&self) -> AppResult<Vec<YoutubeBroadcast>>;

    /// Full editable settings for one broadcast. The calendar list data does
    /// not carry these, so editing requires this second round trip.
    async fn fetch_start_stream_options(
        &self,
        broadcast_id: &str,
    ) -> AppResult<YoutubeStreamSettings>;

    /// Create a new scheduled broadcast; returns the resource with its
    /// platform-assigned id.
    async fn schedule_stream(
        &self,
        start_time_ms: i64,
        settings: &YoutubeStreamSettings,
    ) -> AppResult<YoutubeBroadcast>;

    async fn update_broadcast(
        &self,
        broadcast_id: &str,
        settings: &YoutubeStreamSettings,
    ) -> AppResult<YoutubeBroadcast>;

    async fn remove_broadcast(&self, broadcast_id: &str) -> AppResult<()>;
}

/// Seam between the scheduler and the Facebook Graph API.
#[async_trait]
pub trait FacebookPlatform: Send + Sync {
    async fn prepopulate_info(&self) -> AppResult<()>;

    /// Upcoming live videos across every destination the user can publish to,
    /// each tagged with the routing needed to mutate it later.
    async fn fetch_all_videos(&self) -> AppResult<Vec<(FacebookLiveVideo, FacebookRouting)>>;

    async fn fetch_start_stream_options(
        &self,
        video_id: &str,
        routing: &FacebookRouting,
    ) -> AppResult<FacebookStreamSettings>;

    async fn schedule_stream(
        &self,
        start_time_ms: i64,
        settings: &FacebookStreamSettings,
    ) -> AppResult<FacebookLiveVideo>;

    async fn update_live_video(
        &self,
        video_id: &str,
        settings: &FacebookStreamSettings,
    ) -> AppResult<FacebookLiveVideo>;

    async fn remove_live_video(&self, video_id: &str, routing: &FacebookRouting) -> AppResult<()>;
}

/// Format an epoch-millisecond start time as RFC 3339 for the platform APIs.
pub(crate) fn format_start_time(time_ms: i64) -> AppResult<String> {
    Utc.timestamp_millis_opt(time_ms)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .ok_or_else(|| AppError::Validation(format!("Invalid start time: {}", time_ms)))
}

/// Send a request with retries on transient failures (429 / 5xx / network
/// errors), honoring Retry-After when the platform provides one.
pub(crate) async fn send_with_backoff<F, E>(
    make_request: F,
    api_error: E,
) -> AppResult<reqwest::Response>
where
    F: Fn() -> reqwest::RequestBuilder,
    E: Fn(String) -> AppError,
{
    const MAX_RETRIES: usize = 5;
    let max_backoff_secs: u64 = 60;
    let mut backoff_secs: u64 = 1;

    for attempt in 0..MAX_RETRIES {
        match make_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    let mut wait_secs = backoff_secs;
                    if let Some(header) = response.headers().get("retry-after") {
                        if let Ok(parsed) = header.to_str().unwrap_or_default().parse::<u64>() {
                            wait_secs = parsed;
                        }
                    }

                    if attempt + 1 >= MAX_RETRIES {
                        let error_text = response.text().await.unwrap_or_default();
                        return Err(api_error(format!(
                            "Failed after {} attempts: {}",
                            attempt + 1,
                            error_text
                        )));
                    }

                    tracing::warn!(
                        "Transient platform error (status: {}). Retrying in {}s (attempt {}/{})",
                        status,
                        wait_secs,
                        attempt + 1,
                        MAX_RETRIES
                    );

                    tokio::time::sleep(std::time::Duration::from_secs(wait_secs)).await;
                    backoff_secs = std::cmp::min(backoff_secs * 2, max_backoff_secs);
                    continue;
                }

                return Ok(response);
            }
            Err(e) => {
                if attempt + 1 >= MAX_RETRIES {
                    return Err(AppError::Request(e));
                }

                tracing::warn!(
                    "Network error calling platform API: {}. Retrying in {}s (attempt {}/{})",
                    e,
                    backoff_secs,
                    attempt + 1,
                    MAX_RETRIES
                );

                tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                backoff_secs = std::cmp::min(backoff_secs * 2, max_backoff_secs);
            }
        }
    }

    Err(api_error("Retry attempts exhausted".to_string()))
}
