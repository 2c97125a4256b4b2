use std::fmt;
use std::sync::Arc;

use chrono::Local;
use tracing::{info, warn};

use crate::calendar::start_of_day_ms;
use crate::error::{AppError, AppResult};
use crate::event::{self, EventStatus, FacebookRouting, Platform, StreamEvent};
use crate::services::facebook::FacebookStreamSettings;
use crate::services::youtube::YoutubeStreamSettings;
use crate::services::{FacebookPlatform, YoutubePlatform};

/// Per-platform draft form values. Both drafts exist side by side; the one
/// that applies is picked by an explicit match on the selected platform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftSettings {
    pub youtube: YoutubeStreamSettings,
    pub facebook: FacebookStreamSettings,
}

/// User-visible toast. Commands record one instead of returning an error when
/// a failure is something the user can act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    PastDate,
    Invalid(String),
    FacebookSchedulingWindow,
    SchedulingFailed,
    LoadFailed,
}

impl Alert {
    pub fn user_message(&self) -> String {
        match self {
            Alert::PastDate => "You can not schedule to a past date".to_string(),
            Alert::Invalid(message) => message.clone(),
            Alert::FacebookSchedulingWindow => {
                "Please schedule no further than 7 days in advance and no sooner than 10 minutes in advance"
                    .to_string()
            }
            Alert::SchedulingFailed => "Can not schedule a stream for this platform".to_string(),
            Alert::LoadFailed => "Failed to load scheduled streams".to_string(),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message())
    }
}

/// Which footer buttons the modal shows in its current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModalButtons {
    pub delete: bool,
    pub save: bool,
    pub schedule: bool,
}

/// State container coordinating scheduled streams across platforms.
///
/// Owns the in-memory event list, the current selection, modal visibility and
/// per-platform draft settings. Constructed when the scheduler view opens and
/// dropped when it closes; an absent adapter means the account is not linked
/// and that platform is skipped.
pub struct StreamScheduler {
    youtube: Option<Arc<dyn YoutubePlatform>>,
    facebook: Option<Arc<dyn FacebookPlatform>>,
    events: Vec<StreamEvent>,
    /// `None` means the open modal is creating a new event.
    selected_event_id: Option<String>,
    selected_platform: Platform,
    drafts: DraftSettings,
    /// Draft start time bound to the form's time input, epoch milliseconds.
    time_ms: i64,
    is_modal_visible: bool,
    is_loading: bool,
    is_events_loaded: bool,
    alert: Option<Alert>,
}

impl StreamScheduler {
    pub fn new(
        youtube: Option<Arc<dyn YoutubePlatform>>,
        facebook: Option<Arc<dyn FacebookPlatform>>,
    ) -> Self {
        let selected_platform = if youtube.is_some() {
            Platform::Youtube
        } else {
            Platform::Facebook
        };

        Self {
            youtube,
            facebook,
            events: Vec::new(),
            selected_event_id: None,
            selected_platform,
            drafts: DraftSettings::default(),
            time_ms: 0,
            is_modal_visible: false,
            is_loading: false,
            is_events_loaded: false,
            alert: None,
        }
    }

    // ========================================================================
    // State Accessors
    // ========================================================================

    pub fn events(&self) -> &[StreamEvent] {
        &self.events
    }

    pub fn selected_platform(&self) -> Platform {
        self.selected_platform
    }

    pub fn selected_event(&self) -> Option<&StreamEvent> {
        let id = self.selected_event_id.as_deref()?;
        self.events.iter().find(|e| e.id == id)
    }

    pub fn drafts(&self) -> &DraftSettings {
        &self.drafts
    }

    pub fn drafts_mut(&mut self) -> &mut DraftSettings {
        &mut self.drafts
    }

    pub fn time_ms(&self) -> i64 {
        self.time_ms
    }

    pub fn is_modal_visible(&self) -> bool {
        self.is_modal_visible
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Gates the loading spinner. An empty list after a successful load is a
    /// valid loaded state, so this flag is authoritative, not the list length.
    pub fn is_events_loaded(&self) -> bool {
        self.is_events_loaded
    }

    /// Pending toast, if any. Consuming it clears the slot.
    pub fn take_alert(&mut self) -> Option<Alert> {
        self.alert.take()
    }

    pub fn alert(&self) -> Option<&Alert> {
        self.alert.as_ref()
    }

    /// The platform selector is hidden once an existing event is being edited.
    pub fn platform_selector_visible(&self) -> bool {
        self.selected_event_id.is_none()
    }

    pub fn modal_buttons(&self) -> ModalButtons {
        let editing = self.selected_event_id.is_some();
        let removable = self
            .selected_event()
            .map(|e| e.status == EventStatus::Scheduled)
            .unwrap_or(false);

        ModalButtons {
            delete: editing && removable,
            save: editing,
            schedule: !editing,
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Reload the event list from every linked platform.
    ///
    /// Both fetch sequences run concurrently and join before the list is
    /// committed atomically, YouTube results first. The join is fail-fast: if
    /// either platform fails, nothing is committed and a toast is recorded.
    pub async fn load_events(&mut self) -> AppResult<()> {
        self.events.clear();
        self.is_events_loaded = false;
        self.is_loading = true;

        let youtube = self.youtube.clone();
        let facebook = self.facebook.clone();

        let youtube_fetch = async {
            match youtube {
                Some(youtube) => {
                    youtube.prepopulate_info().await?;
                    let broadcasts = youtube.fetch_broadcasts().await?;
                    broadcasts
                        .iter()
                        .map(event::normalize_youtube)
                        .collect::<AppResult<Vec<_>>>()
                }
                None => Ok(Vec::new()),
            }
        };

        let facebook_fetch = async {
            match facebook {
                Some(facebook) => {
                    facebook.prepopulate_info().await?;
                    let videos = facebook.fetch_all_videos().await?;
                    videos
                        .iter()
                        .map(|(video, routing)| event::normalize_facebook(video, routing.clone()))
                        .collect::<AppResult<Vec<_>>>()
                }
                None => Ok(Vec::new()),
            }
        };

        match futures::try_join!(youtube_fetch, facebook_fetch) {
            Ok((youtube_events, facebook_events)) => {
                let mut events = youtube_events;
                events.extend(facebook_events);
                info!("Loaded {} scheduled events", events.len());
                self.events = events;
                self.is_events_loaded = true;
                self.is_loading = false;
                Ok(())
            }
            Err(e) if e.is_invariant() => {
                self.is_loading = false;
                Err(e)
            }
            Err(e) => {
                warn!("Failed to load scheduled events: {}", e);
                self.is_loading = false;
                self.alert = Some(Alert::LoadFailed);
                Ok(())
            }
        }
    }

    /// Open the modal in create mode for `platform`.
    ///
    /// Rejects times before the start of the current local day with a blocking
    /// toast and no state change.
    pub fn show_new_event_modal(&mut self, platform: Platform, time_ms: Option<i64>) {
        let now = Local::now();
        let time_ms = time_ms.unwrap_or_else(|| now.timestamp_millis());

        if time_ms < start_of_day_ms(&now) {
            self.alert = Some(Alert::PastDate);
            return;
        }

        self.selected_event_id = None;
        self.selected_platform = platform;
        self.drafts = DraftSettings::default();
        self.set_time(time_ms);
        self.is_modal_visible = true;
    }

    /// Update the draft start time, keeping the generic field and the selected
    /// platform's draft field in sync.
    pub fn set_time(&mut self, time_ms: i64) {
        self.time_ms = time_ms;
        match self.selected_platform {
            Platform::Youtube => self.drafts.youtube.scheduled_start_time = time_ms,
            Platform::Facebook => self.drafts.facebook.planned_start_time = time_ms,
        }
    }

    /// Switch the platform targeted by the open form.
    pub fn select_platform(&mut self, platform: Platform) {
        self.selected_platform = platform;
        self.set_time(self.time_ms);
    }

    /// Open the modal in edit mode, pre-populated with the platform's current
    /// start-stream options for the event.
    ///
    /// An unknown id is a programming invariant: the calendar only hands out
    /// ids of rendered events.
    pub async fn show_edit_event_modal(&mut self, event_id: &str) -> AppResult<()> {
        let event = self
            .events
            .iter()
            .find(|e| e.id == event_id)
            .ok_or_else(|| AppError::EventNotFound(event_id.to_string()))?
            .clone();

        self.is_loading = true;

        // List data doesn't carry full settings; a second round trip does.
        let fetched = match event.platform {
            Platform::Youtube => {
                let youtube = self.require_youtube()?;
                match youtube.fetch_start_stream_options(&event.id).await {
                    Ok(options) => {
                        self.drafts.youtube = options;
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            Platform::Facebook => {
                let routing = event.facebook.clone().ok_or(AppError::MissingDestination)?;
                let facebook = self.require_facebook()?;
                match facebook.fetch_start_stream_options(&event.id, &routing).await {
                    Ok(options) => {
                        self.drafts.facebook = options;
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
        };

        match fetched {
            Ok(()) => {
                self.selected_platform = event.platform;
                self.selected_event_id = Some(event.id.clone());
                self.set_time(event.date);
                self.is_modal_visible = true;
                self.is_loading = false;
                Ok(())
            }
            Err(e) if e.is_invariant() => {
                self.is_loading = false;
                Err(e)
            }
            Err(e) => {
                warn!("Failed to fetch settings for event {}: {}", event.id, e);
                self.is_loading = false;
                self.alert = Some(Alert::LoadFailed);
                Ok(())
            }
        }
    }

    /// Save the open form: update the selected event, or create a new one.
    ///
    /// Validation failures and platform failures become toasts and leave the
    /// modal open for correction; only invariant violations propagate.
    pub async fn submit(&mut self) -> AppResult<()> {
        if let Err(message) = self.validate_draft() {
            self.alert = Some(Alert::Invalid(message));
            return Ok(());
        }

        self.is_loading = true;

        let result = match self.selected_event_id.clone() {
            Some(event_id) => self.update_existing(&event_id).await,
            None => self.create_new().await,
        };

        match result {
            Ok(()) => {
                self.close_modal();
                Ok(())
            }
            Err(e) if e.is_invariant() => {
                self.is_loading = false;
                Err(e)
            }
            Err(e) => {
                warn!("Failed to submit scheduled stream: {}", e);
                self.alert = Some(scheduling_alert(self.selected_platform));
                self.is_loading = false;
                Ok(())
            }
        }
    }

    /// Delete the selected event.
    ///
    /// Optimistic: the remote delete is spawned fire-and-forget and the local
    /// entry is removed unconditionally, so the calendar updates immediately.
    /// A failed remote delete is logged; the next `load_events` reconciles.
    pub fn remove(&mut self) -> AppResult<()> {
        let event_id = self
            .selected_event_id
            .clone()
            .ok_or(AppError::NoEventSelected)?;
        let event = self
            .events
            .iter()
            .find(|e| e.id == event_id)
            .ok_or_else(|| AppError::EventNotFound(event_id.clone()))?
            .clone();

        self.is_loading = true;
        let platform = event.platform;

        match platform {
            Platform::Youtube => {
                let youtube = self.require_youtube()?;
                let id = event.id.clone();
                tokio::spawn(async move {
                    if let Err(e) = youtube.remove_broadcast(&id).await {
                        warn!("Failed to delete YouTube broadcast {}: {}", id, e);
                    }
                });
            }
            Platform::Facebook => {
                let routing = event.facebook.clone().ok_or(AppError::MissingDestination)?;
                let facebook = self.require_facebook()?;
                let id = event.id.clone();
                tokio::spawn(async move {
                    if let Err(e) = facebook.remove_live_video(&id, &routing).await {
                        warn!("Failed to delete Facebook live video {}: {}", id, e);
                    }
                });
            }
        }

        self.events
            .retain(|e| !(e.id == event_id && e.platform == platform));
        self.close_modal();
        Ok(())
    }

    /// Close the modal and reset every draft field. Never touches the event
    /// list; safe to call repeatedly.
    pub fn close_modal(&mut self) {
        self.selected_event_id = None;
        self.is_modal_visible = false;
        self.is_loading = false;
        self.time_ms = 0;
        self.drafts = DraftSettings::default();
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn require_youtube(&self) -> AppResult<Arc<dyn YoutubePlatform>> {
        self.youtube
            .clone()
            .ok_or(AppError::PlatformNotLinked(Platform::Youtube))
    }

    fn require_facebook(&self) -> AppResult<Arc<dyn FacebookPlatform>> {
        self.facebook
            .clone()
            .ok_or(AppError::PlatformNotLinked(Platform::Facebook))
    }

    fn validate_draft(&self) -> Result<(), String> {
        match self.selected_platform {
            Platform::Youtube => {
                let draft = &self.drafts.youtube;
                if draft.title.trim().is_empty() {
                    return Err("The title field is required".to_string());
                }
                if draft.title.chars().count() > 100 {
                    return Err("The title may not be longer than 100 characters".to_string());
                }
            }
            Platform::Facebook => {
                let draft = &self.drafts.facebook;
                if draft.title.trim().is_empty() {
                    return Err("The title field is required".to_string());
                }
                if draft.resolve_destination_id().is_err() {
                    return Err("The destination field is required".to_string());
                }
            }
        }
        Ok(())
    }

    async fn update_existing(&mut self, event_id: &str) -> AppResult<()> {
        match self.selected_platform {
            Platform::Youtube => {
                let youtube = self.require_youtube()?;
                let broadcast = youtube
                    .update_broadcast(event_id, &self.drafts.youtube)
                    .await?;
                let updated = event::normalize_youtube(&broadcast)?;
                self.patch_event(updated);
            }
            Platform::Facebook => {
                let routing = self
                    .events
                    .iter()
                    .find(|e| e.id == event_id)
                    .ok_or_else(|| AppError::EventNotFound(event_id.to_string()))?
                    .facebook
                    .clone()
                    .ok_or(AppError::MissingDestination)?;
                let facebook = self.require_facebook()?;
                let video = facebook
                    .update_live_video(event_id, &self.drafts.facebook)
                    .await?;
                let updated = event::normalize_facebook(&video, routing)?;
                self.patch_event(updated);
            }
        }
        Ok(())
    }

    async fn create_new(&mut self) -> AppResult<()> {
        match self.selected_platform {
            Platform::Youtube => {
                let youtube = self.require_youtube()?;
                let broadcast = youtube
                    .schedule_stream(self.time_ms, &self.drafts.youtube)
                    .await?;
                let created = event::normalize_youtube(&broadcast)?;
                info!("Scheduled YouTube broadcast {}", created.id);
                self.patch_event(created);
            }
            Platform::Facebook => {
                // The routing must resolve before normalization; the create
                // response doesn't carry it.
                let destination_id = self.drafts.facebook.resolve_destination_id()?;
                let routing = FacebookRouting {
                    destination_type: self.drafts.facebook.destination_type,
                    destination_id,
                };
                let facebook = self.require_facebook()?;
                let video = facebook
                    .schedule_stream(self.time_ms, &self.drafts.facebook)
                    .await?;
                let created = event::normalize_facebook(&video, routing)?;
                info!("Scheduled Facebook live video {}", created.id);
                self.patch_event(created);
            }
        }
        Ok(())
    }

    /// Replace the entry with the same identity key, or append when the key is
    /// new (create flow, keyed by the platform-assigned id).
    fn patch_event(&mut self, updated: StreamEvent) {
        match self
            .events
            .iter_mut()
            .find(|e| e.id == updated.id && e.platform == updated.platform)
        {
            Some(slot) => *slot = updated,
            None => self.events.push(updated),
        }
    }
}

fn scheduling_alert(platform: Platform) -> Alert {
    match platform {
        Platform::Facebook => Alert::FacebookSchedulingWindow,
        Platform::Youtube => Alert::SchedulingFailed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use tokio_test::assert_ok;

    use crate::event::FacebookDestinationType;
    use crate::services::facebook::FacebookLiveVideo;
    use crate::services::youtube::{
        BroadcastSnippet, BroadcastStatus, LifeCycleStatus, YoutubeBroadcast,
    };

    fn rfc3339(time_ms: i64) -> String {
        Utc.timestamp_millis_opt(time_ms).unwrap().to_rfc3339()
    }

    fn broadcast(id: &str, title: &str, time_ms: i64) -> YoutubeBroadcast {
        YoutubeBroadcast {
            id: id.to_string(),
            snippet: BroadcastSnippet {
                title: title.to_string(),
                description: String::new(),
                scheduled_start_time: Some(rfc3339(time_ms)),
                actual_start_time: None,
            },
            status: BroadcastStatus {
                life_cycle_status: LifeCycleStatus::Ready,
                privacy_status: None,
            },
        }
    }

    fn video(id: &str, title: &str, time_ms: i64) -> FacebookLiveVideo {
        FacebookLiveVideo {
            id: id.to_string(),
            title: Some(title.to_string()),
            description: None,
            planned_start_time: Some(rfc3339(time_ms)),
            broadcast_start_time: None,
        }
    }

    fn page_routing(page_id: &str) -> FacebookRouting {
        FacebookRouting {
            destination_type: FacebookDestinationType::Page,
            destination_id: page_id.to_string(),
        }
    }

    fn group_routing(group_id: &str) -> FacebookRouting {
        FacebookRouting {
            destination_type: FacebookDestinationType::Group,
            destination_id: group_id.to_string(),
        }
    }

    fn future_ms() -> i64 {
        (Utc::now() + Duration::days(1)).timestamp_millis()
    }

    #[derive(Default)]
    struct MockYoutube {
        broadcasts: Vec<YoutubeBroadcast>,
        fail_fetch: bool,
        fail_schedule: bool,
        stall_remove: bool,
        schedule_calls: Mutex<usize>,
    }

    #[async_trait]
    impl YoutubePlatform for MockYoutube {
        async fn prepopulate_info(&self) -> AppResult<()> {
            Ok(())
        }

        async fn fetch_broadcasts(&self) -> AppResult<Vec<YoutubeBroadcast>> {
            if self.fail_fetch {
                return Err(AppError::YoutubeApi("quota exceeded".to_string()));
            }
            Ok(self.broadcasts.clone())
        }

        async fn fetch_start_stream_options(
            &self,
            broadcast_id: &str,
        ) -> AppResult<YoutubeStreamSettings> {
            let broadcast = self
                .broadcasts
                .iter()
                .find(|b| b.id == broadcast_id)
                .expect("broadcast exists");
            Ok(YoutubeStreamSettings {
                title: broadcast.snippet.title.clone(),
                description: broadcast.snippet.description.clone(),
                ..Default::default()
            })
        }

        async fn schedule_stream(
            &self,
            start_time_ms: i64,
            settings: &YoutubeStreamSettings,
        ) -> AppResult<YoutubeBroadcast> {
            *self.schedule_calls.lock().unwrap() += 1;
            if self.fail_schedule {
                return Err(AppError::YoutubeApi("backend error".to_string()));
            }
            Ok(broadcast("yt-new", &settings.title, start_time_ms))
        }

        async fn update_broadcast(
            &self,
            broadcast_id: &str,
            settings: &YoutubeStreamSettings,
        ) -> AppResult<YoutubeBroadcast> {
            Ok(broadcast(
                broadcast_id,
                &settings.title,
                settings.scheduled_start_time,
            ))
        }

        async fn remove_broadcast(&self, _broadcast_id: &str) -> AppResult<()> {
            if self.stall_remove {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockFacebook {
        videos: Vec<(FacebookLiveVideo, FacebookRouting)>,
        fail_schedule: bool,
    }

    #[async_trait]
    impl FacebookPlatform for MockFacebook {
        async fn prepopulate_info(&self) -> AppResult<()> {
            Ok(())
        }

        async fn fetch_all_videos(&self) -> AppResult<Vec<(FacebookLiveVideo, FacebookRouting)>> {
            Ok(self.videos.clone())
        }

        async fn fetch_start_stream_options(
            &self,
            video_id: &str,
            routing: &FacebookRouting,
        ) -> AppResult<FacebookStreamSettings> {
            let (video, _) = self
                .videos
                .iter()
                .find(|(v, _)| v.id == video_id)
                .expect("video exists");
            Ok(FacebookStreamSettings {
                title: video.title.clone().unwrap_or_default(),
                destination_type: routing.destination_type,
                page_id: Some(routing.destination_id.clone()),
                ..Default::default()
            })
        }

        async fn schedule_stream(
            &self,
            start_time_ms: i64,
            settings: &FacebookStreamSettings,
        ) -> AppResult<FacebookLiveVideo> {
            if self.fail_schedule {
                return Err(AppError::FacebookApi("(#100) time out of range".to_string()));
            }
            Ok(video("fb-new", &settings.title, start_time_ms))
        }

        async fn update_live_video(
            &self,
            video_id: &str,
            settings: &FacebookStreamSettings,
        ) -> AppResult<FacebookLiveVideo> {
            Ok(video(video_id, &settings.title, settings.planned_start_time))
        }

        async fn remove_live_video(
            &self,
            _video_id: &str,
            _routing: &FacebookRouting,
        ) -> AppResult<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn scheduler(yt: Option<MockYoutube>, fb: Option<MockFacebook>) -> StreamScheduler {
        StreamScheduler::new(
            yt.map(|y| Arc::new(y) as Arc<dyn YoutubePlatform>),
            fb.map(|f| Arc::new(f) as Arc<dyn FacebookPlatform>),
        )
    }

    fn two_plus_three() -> StreamScheduler {
        let t = future_ms();
        let yt = MockYoutube {
            broadcasts: vec![broadcast("yt1", "Launch", t), broadcast("yt2", "Q&A", t)],
            ..Default::default()
        };
        let fb = MockFacebook {
            videos: vec![
                (video("fb1", "Page stream", t), page_routing("page1")),
                (video("fb2", "Second", t), page_routing("page1")),
                (video("fb3", "Third", t), page_routing("page2")),
            ],
            ..Default::default()
        };
        scheduler(Some(yt), Some(fb))
    }

    #[tokio::test]
    async fn load_events_merges_both_platforms() {
        let mut scheduler = two_plus_three();
        scheduler.load_events().await.unwrap();

        assert_eq!(scheduler.events().len(), 5);
        assert!(scheduler.is_events_loaded());
        assert!(!scheduler.is_loading());

        // YouTube first, then Facebook.
        let platforms: Vec<Platform> = scheduler.events().iter().map(|e| e.platform).collect();
        assert_eq!(
            platforms,
            vec![
                Platform::Youtube,
                Platform::Youtube,
                Platform::Facebook,
                Platform::Facebook,
                Platform::Facebook,
            ]
        );
        assert!(scheduler.events()[2].facebook.is_some());
    }

    #[tokio::test]
    async fn empty_load_is_still_a_loaded_state() {
        let mut scheduler = scheduler(None, None);
        scheduler.load_events().await.unwrap();

        assert!(scheduler.events().is_empty());
        assert!(scheduler.is_events_loaded());
        assert!(scheduler.take_alert().is_none());
    }

    #[tokio::test]
    async fn load_failure_becomes_a_toast() {
        let yt = MockYoutube {
            fail_fetch: true,
            ..Default::default()
        };
        let mut scheduler = scheduler(Some(yt), None);

        scheduler.load_events().await.unwrap();
        assert!(!scheduler.is_events_loaded());
        assert!(!scheduler.is_loading());
        assert_eq!(scheduler.take_alert(), Some(Alert::LoadFailed));
    }

    #[tokio::test]
    async fn new_event_modal_rejects_past_dates() {
        let mut scheduler = scheduler(Some(MockYoutube::default()), None);
        let past = (Utc::now() - Duration::days(2)).timestamp_millis();

        scheduler.show_new_event_modal(Platform::Youtube, Some(past));

        assert!(!scheduler.is_modal_visible());
        assert_eq!(scheduler.time_ms(), 0);
        assert_eq!(scheduler.drafts().youtube, YoutubeStreamSettings::default());
        assert_eq!(scheduler.take_alert(), Some(Alert::PastDate));
    }

    #[tokio::test]
    async fn new_event_modal_syncs_time_into_the_platform_draft() {
        let mut scheduler = scheduler(Some(MockYoutube::default()), Some(MockFacebook::default()));
        let t = future_ms();

        scheduler.show_new_event_modal(Platform::Youtube, Some(t));
        assert!(scheduler.is_modal_visible());
        assert_eq!(scheduler.time_ms(), t);
        assert_eq!(scheduler.drafts().youtube.scheduled_start_time, t);

        scheduler.select_platform(Platform::Facebook);
        assert_eq!(scheduler.drafts().facebook.planned_start_time, t);
    }

    #[tokio::test]
    async fn edit_modal_prefills_from_the_platform() {
        let mut scheduler = two_plus_three();
        scheduler.load_events().await.unwrap();
        let date = scheduler.events()[0].date;

        scheduler.show_edit_event_modal("yt1").await.unwrap();

        assert!(scheduler.is_modal_visible());
        assert_eq!(scheduler.selected_platform(), Platform::Youtube);
        assert_eq!(scheduler.drafts().youtube.title, "Launch");
        assert_eq!(scheduler.time_ms(), date);
        assert!(!scheduler.platform_selector_visible());
        assert_eq!(
            scheduler.modal_buttons(),
            ModalButtons {
                delete: true,
                save: true,
                schedule: false,
            }
        );
    }

    #[tokio::test]
    async fn edit_modal_with_unknown_id_is_an_invariant_violation() {
        let mut scheduler = two_plus_three();
        scheduler.load_events().await.unwrap();

        let err = scheduler.show_edit_event_modal("missing").await.unwrap_err();
        assert!(matches!(err, AppError::EventNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn submitting_an_edit_replaces_the_event_in_place() {
        let mut scheduler = two_plus_three();
        scheduler.load_events().await.unwrap();
        scheduler.show_edit_event_modal("yt1").await.unwrap();

        scheduler.drafts_mut().youtube.title = "Launch v2".to_string();
        assert_ok!(scheduler.submit().await);

        assert_eq!(scheduler.events().len(), 5);
        let updated = scheduler.events().iter().find(|e| e.id == "yt1").unwrap();
        assert_eq!(updated.title, "Launch v2");
        assert!(!scheduler.is_modal_visible());
    }

    #[tokio::test]
    async fn submitting_a_new_event_appends_the_platform_assigned_id() {
        let mut scheduler = two_plus_three();
        scheduler.load_events().await.unwrap();

        scheduler.show_new_event_modal(Platform::Youtube, Some(future_ms()));
        scheduler.drafts_mut().youtube.title = "Brand new".to_string();
        assert_ok!(scheduler.submit().await);

        assert_eq!(scheduler.events().len(), 6);
        let created = scheduler.events().last().unwrap();
        assert_eq!(created.id, "yt-new");
        assert_eq!(created.title, "Brand new");
        assert!(!scheduler.is_modal_visible());
    }

    #[tokio::test]
    async fn facebook_create_carries_the_resolved_routing() {
        let mut scheduler = scheduler(None, Some(MockFacebook::default()));
        scheduler.load_events().await.unwrap();

        scheduler.show_new_event_modal(Platform::Facebook, Some(future_ms()));
        {
            let draft = &mut scheduler.drafts_mut().facebook;
            draft.title = "Page launch".to_string();
            draft.destination_type = FacebookDestinationType::Page;
            draft.page_id = Some("page1".to_string());
        }
        assert_ok!(scheduler.submit().await);

        let created = scheduler.events().last().unwrap();
        assert_eq!(created.id, "fb-new");
        assert_eq!(created.facebook, Some(page_routing("page1")));
    }

    #[tokio::test]
    async fn group_routed_event_survives_a_reload() {
        let t = future_ms();
        let fb = MockFacebook {
            videos: vec![(video("fb-group", "Group stream", t), group_routing("group9"))],
            ..Default::default()
        };
        let mut scheduler = scheduler(None, Some(fb));

        scheduler.load_events().await.unwrap();

        assert_eq!(scheduler.events().len(), 1);
        let event = &scheduler.events()[0];
        assert_eq!(event.id, "fb-group");
        assert_eq!(event.facebook, Some(group_routing("group9")));

        // Reload must keep surfacing it.
        scheduler.load_events().await.unwrap();
        assert_eq!(scheduler.events().len(), 1);
        assert_eq!(
            scheduler.events()[0].facebook,
            Some(group_routing("group9"))
        );
    }

    #[tokio::test]
    async fn validation_failure_makes_no_platform_call() {
        let yt = Arc::new(MockYoutube::default());
        let mut scheduler =
            StreamScheduler::new(Some(yt.clone() as Arc<dyn YoutubePlatform>), None);

        scheduler.show_new_event_modal(Platform::Youtube, Some(future_ms()));
        scheduler.submit().await.unwrap();

        assert_eq!(*yt.schedule_calls.lock().unwrap(), 0);
        assert!(scheduler.is_modal_visible());
        assert!(matches!(scheduler.take_alert(), Some(Alert::Invalid(_))));
    }

    #[tokio::test]
    async fn title_length_is_counted_in_characters_not_bytes() {
        let mut scheduler = scheduler(Some(MockYoutube::default()), None);
        scheduler.show_new_event_modal(Platform::Youtube, Some(future_ms()));

        // 100 two-byte characters: within the limit despite 200 bytes.
        scheduler.drafts_mut().youtube.title = "é".repeat(100);
        assert_ok!(scheduler.submit().await);
        assert!(!scheduler.is_modal_visible());
        assert!(scheduler.take_alert().is_none());

        scheduler.show_new_event_modal(Platform::Youtube, Some(future_ms()));
        scheduler.drafts_mut().youtube.title = "é".repeat(101);
        scheduler.submit().await.unwrap();
        assert!(scheduler.is_modal_visible());
        assert!(matches!(scheduler.take_alert(), Some(Alert::Invalid(_))));
    }

    #[tokio::test]
    async fn platform_failure_keeps_the_modal_open() {
        let yt = MockYoutube {
            fail_schedule: true,
            ..Default::default()
        };
        let mut scheduler = scheduler(Some(yt), None);

        scheduler.show_new_event_modal(Platform::Youtube, Some(future_ms()));
        scheduler.drafts_mut().youtube.title = "Doomed".to_string();
        scheduler.submit().await.unwrap();

        assert!(scheduler.is_modal_visible());
        assert!(!scheduler.is_loading());
        assert_eq!(scheduler.take_alert(), Some(Alert::SchedulingFailed));
        assert!(scheduler.events().is_empty());
    }

    #[tokio::test]
    async fn facebook_failure_mentions_the_scheduling_window() {
        let fb = MockFacebook {
            fail_schedule: true,
            ..Default::default()
        };
        let mut scheduler = scheduler(None, Some(fb));

        scheduler.show_new_event_modal(Platform::Facebook, Some(future_ms()));
        scheduler.drafts_mut().facebook.title = "Too far out".to_string();
        scheduler.submit().await.unwrap();

        assert!(scheduler.is_modal_visible());
        assert_eq!(
            scheduler.take_alert(),
            Some(Alert::FacebookSchedulingWindow)
        );
    }

    #[tokio::test]
    async fn remove_is_optimistic_about_the_remote_delete() {
        // The mock's delete never resolves; local state must not wait for it.
        let yt = MockYoutube {
            broadcasts: vec![broadcast("yt1", "Launch", future_ms())],
            stall_remove: true,
            ..Default::default()
        };
        let mut scheduler = scheduler(Some(yt), None);
        scheduler.load_events().await.unwrap();
        scheduler.show_edit_event_modal("yt1").await.unwrap();

        scheduler.remove().unwrap();

        assert!(scheduler.events().is_empty());
        assert!(!scheduler.is_modal_visible());
        assert!(!scheduler.is_loading());
    }

    #[tokio::test]
    async fn close_modal_is_idempotent() {
        let mut scheduler = two_plus_three();
        scheduler.load_events().await.unwrap();
        scheduler.show_edit_event_modal("yt1").await.unwrap();

        scheduler.close_modal();
        let events_after_first = scheduler.events().to_vec();
        let drafts_after_first = scheduler.drafts().clone();

        scheduler.close_modal();
        assert_eq!(scheduler.events(), events_after_first.as_slice());
        assert_eq!(scheduler.drafts(), &drafts_after_first);
        assert!(!scheduler.is_modal_visible());
        assert!(scheduler.selected_event().is_none());
        assert_eq!(scheduler.time_ms(), 0);
    }

    #[tokio::test]
    async fn modal_buttons_follow_the_mode() {
        let mut scheduler = two_plus_three();
        scheduler.load_events().await.unwrap();

        scheduler.show_new_event_modal(Platform::Youtube, Some(future_ms()));
        assert_eq!(
            scheduler.modal_buttons(),
            ModalButtons {
                delete: false,
                save: false,
                schedule: true,
            }
        );
        assert!(scheduler.platform_selector_visible());
    }
}
