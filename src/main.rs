use std::sync::Arc;

use chrono::{Local, TimeZone};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stream_scheduler::calendar;
use stream_scheduler::config::Config;
use stream_scheduler::scheduler::StreamScheduler;
use stream_scheduler::services::facebook::FacebookService;
use stream_scheduler::services::youtube::YoutubeService;
use stream_scheduler::services::{FacebookPlatform, YoutubePlatform};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stream_scheduler=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting stream scheduler");

    let youtube: Option<Arc<dyn YoutubePlatform>> = match config.youtube.access_token.clone() {
        Some(token) => Some(Arc::new(YoutubeService::new(token)?) as Arc<dyn YoutubePlatform>),
        None => None,
    };
    let facebook: Option<Arc<dyn FacebookPlatform>> = match config.facebook.access_token.clone() {
        Some(token) => Some(Arc::new(FacebookService::new(token)?) as Arc<dyn FacebookPlatform>),
        None => None,
    };

    let mut scheduler = StreamScheduler::new(youtube, facebook);
    scheduler.load_events().await?;

    if let Some(alert) = scheduler.take_alert() {
        anyhow::bail!("{}", alert.user_message());
    }

    let today = Local::now().date_naive();
    let (start, end) = calendar::calendar_range(today);
    tracing::info!(
        "Calendar covers {} to {}; {} events loaded",
        start,
        end,
        scheduler.events().len()
    );

    for event in scheduler.events() {
        let when = Local
            .timestamp_millis_opt(event.date)
            .single()
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| event.date.to_string());
        tracing::info!(
            "[{}] {} - {} ({:?})",
            event.platform,
            when,
            event.title,
            event.status
        );
    }

    Ok(())
}
