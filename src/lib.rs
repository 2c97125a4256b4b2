//! Multi-platform live stream scheduler.
//!
//! Platform adapters fetch and mutate platform-native broadcast resources,
//! [`event`] normalizes them into the unified [`StreamEvent`] shape, and
//! [`StreamScheduler`] owns the in-memory calendar state and the
//! load/create/update/delete command flow that drives the scheduling UI.

pub mod calendar;
pub mod config;
pub mod error;
pub mod event;
pub mod scheduler;
pub mod services;

pub use error::{AppError, AppResult};
pub use event::{EventStatus, Platform, StreamEvent};
pub use scheduler::{Alert, StreamScheduler};
