use std::fmt;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::services::facebook::FacebookLiveVideo;
use crate::services::youtube::{LifeCycleStatus, YoutubeBroadcast};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Youtube,
    Facebook,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "YouTube",
            Platform::Facebook => "Facebook",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Scheduled,
    Completed,
}

/// Where a Facebook live video is published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacebookDestinationType {
    Timeline,
    Page,
    Group,
}

impl Default for FacebookDestinationType {
    fn default() -> Self {
        FacebookDestinationType::Timeline
    }
}

/// Routing info needed to mutate or delete a Facebook live video later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacebookRouting {
    pub destination_type: FacebookDestinationType,
    pub destination_id: String,
}

/// Normalized, platform-agnostic calendar entry.
///
/// `id` is unique only within its platform's namespace; `(platform, id)` is the
/// identity key for lookups, updates and removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub id: String,
    pub platform: Platform,
    /// Scheduled or actual start time, epoch milliseconds.
    pub date: i64,
    pub title: String,
    pub status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook: Option<FacebookRouting>,
}

/// Parse a platform start-time string into epoch milliseconds.
///
/// Accepts RFC 3339 (YouTube) and the Facebook Graph variant with an offset
/// that has no colon (`2024-01-01T10:00:00+0000`).
pub(crate) fn parse_start_time(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Normalize a native YouTube broadcast into a `StreamEvent`.
///
/// A broadcast counts as scheduled only while its lifecycle status is `created`
/// or `ready`; everything past that point shows up as completed. The date is
/// the scheduled start time when present, otherwise the actual start time.
pub fn normalize_youtube(broadcast: &YoutubeBroadcast) -> AppResult<StreamEvent> {
    let status = match broadcast.status.life_cycle_status {
        LifeCycleStatus::Created | LifeCycleStatus::Ready => EventStatus::Scheduled,
        _ => EventStatus::Completed,
    };

    let date = broadcast
        .snippet
        .scheduled_start_time
        .as_deref()
        .or(broadcast.snippet.actual_start_time.as_deref())
        .and_then(parse_start_time)
        .ok_or_else(|| AppError::MissingStartTime(broadcast.id.clone()))?;

    Ok(StreamEvent {
        id: broadcast.id.clone(),
        platform: Platform::Youtube,
        date,
        title: broadcast.snippet.title.clone(),
        status,
        facebook: None,
    })
}

/// Normalize a native Facebook live video into a `StreamEvent`.
///
/// The videos feed only surfaces upcoming streams, so the status is always
/// scheduled. The date prefers the planned start time and falls back to the
/// broadcast start time. The routing sub-record is always populated.
pub fn normalize_facebook(
    video: &FacebookLiveVideo,
    routing: FacebookRouting,
) -> AppResult<StreamEvent> {
    let date = video
        .planned_start_time
        .as_deref()
        .or(video.broadcast_start_time.as_deref())
        .and_then(parse_start_time)
        .ok_or_else(|| AppError::MissingStartTime(video.id.clone()))?;

    Ok(StreamEvent {
        id: video.id.clone(),
        platform: Platform::Facebook,
        date,
        title: video.title.clone().unwrap_or_default(),
        status: EventStatus::Scheduled,
        facebook: Some(routing),
    })
}
