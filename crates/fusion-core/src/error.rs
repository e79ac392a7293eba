//! Error types for Fusion Core

use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Timeline errors
    #[error("Failed to fetch thumbnail timeline: {0}")]
    TimelineFetch(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    // Streaming errors
    #[error("Quality change rejected: {reason}")]
    QualityNotReady { reason: &'static str },

    #[error("Quality level {index} out of range (0..{available})")]
    QualityOutOfRange { index: i32, available: usize },

    #[error("Streaming engine terminated after fatal error: {details}")]
    EngineTerminated { details: String },

    // Playback errors
    #[error("Media element is not mounted")]
    MediaNotMounted,

    #[error("Playback rejected: {0}")]
    PlayRejected(String),

    #[error("Invalid playback speed: {0}")]
    InvalidSpeed(f64),

    // Display errors
    #[error("Fullscreen request failed: {0}")]
    Fullscreen(String),

    #[error("Picture-in-picture request failed: {0}")]
    PictureInPicture(String),

    #[error("Player runtime has shut down")]
    RuntimeClosed,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Network errors
    #[cfg(feature = "native")]
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true if the player keeps working after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Error::EngineTerminated { .. } | Error::InvalidConfig(_) | Error::RuntimeClosed
        )
    }

    /// Returns the error code recorded in diagnostics
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::TimelineFetch(_) => "TIMELINE_FETCH",
            Error::InvalidTimestamp(_) => "INVALID_TIMESTAMP",
            Error::QualityNotReady { .. } => "QUALITY_NOT_READY",
            Error::QualityOutOfRange { .. } => "QUALITY_OUT_OF_RANGE",
            Error::EngineTerminated { .. } => "ENGINE_TERMINATED",
            Error::MediaNotMounted => "MEDIA_NOT_MOUNTED",
            Error::PlayRejected(_) => "PLAY_REJECTED",
            Error::InvalidSpeed(_) => "INVALID_SPEED",
            Error::Fullscreen(_) => "FULLSCREEN",
            Error::PictureInPicture(_) => "PICTURE_IN_PICTURE",
            Error::RuntimeClosed => "RUNTIME_CLOSED",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::Json(_) => "JSON",
            #[cfg(feature = "native")]
            Error::Network(_) => "NETWORK",
            Error::Io(_) => "IO",
        }
    }
}
