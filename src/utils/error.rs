use thiserror::Error;

use crate::models::Platform;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feed error: {0}")]
    Feed(#[from] feed_rs::parser::ParseFeedError),

    #[error("Unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("API error: {platform}: {message}")]
    Api { platform: Platform, message: String },

    #[error("Persistence error: {path}: {message}")]
    Persistence { path: String, message: String },

    #[error("Rendering engine launch failed: {0}")]
    EngineLaunch(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl AppError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        AppError::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn api(platform: Platform, message: impl Into<String>) -> Self {
        AppError::Api {
            platform,
            message: message.into(),
        }
    }
}

impl From<tokio_cron_scheduler::JobSchedulerError> for AppError {
    fn from(err: tokio_cron_scheduler::JobSchedulerError) -> Self {
        AppError::Scheduler(format!("{:?}", err))
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
