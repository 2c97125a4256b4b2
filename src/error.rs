use crate::event::Platform;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("YouTube API error: {0}")]
    YoutubeApi(String),

    #[error("Facebook API error: {0}")]
    FacebookApi(String),

    #[error("Scheduled event not found: {0}")]
    EventNotFound(String),

    #[error("No scheduled event is selected")]
    NoEventSelected,

    #[error("{0} account is not linked")]
    PlatformNotLinked(Platform),

    #[error("Facebook destination is not configured")]
    MissingDestination,

    #[error("Resource {0} has no start time")]
    MissingStartTime(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Invariant violations are programming errors: the UI gating is supposed to
    /// make them unreachable, so they propagate instead of turning into toasts.
    pub fn is_invariant(&self) -> bool {
        matches!(
            self,
            AppError::EventNotFound(_)
                | AppError::NoEventSelected
                | AppError::PlatformNotLinked(_)
                | AppError::MissingDestination
                | AppError::MissingStartTime(_)
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
