//! Error types shared across Reelforge crates.

use std::path::PathBuf;

/// Top-level error type for Reelforge operations.
#[derive(Debug, thiserror::Error)]
pub enum ReelforgeError {
    #[error("An export is already in progress on this engine")]
    AlreadyExporting,

    #[error("Encoder initialization failed: {message}")]
    EncoderInit { message: String },

    #[error("Export cancelled")]
    Cancelled,

    #[error("Seek to {target_secs:.3}s timed out after {timeout_ms}ms ({url})")]
    SeekTimeout {
        url: String,
        target_secs: f64,
        timeout_ms: u64,
    },

    #[error("Frame validation failed for element {element_id}: content coverage {coverage:.3}")]
    FrameValidation { element_id: String, coverage: f64 },

    #[error("Element {element_id} failed to render after {attempts} attempt(s): {source}")]
    ElementRender {
        element_id: String,
        attempts: u32,
        #[source]
        source: Box<ReelforgeError>,
    },

    #[error("Media load error ({url}): {message}")]
    MediaLoad { url: String, message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Snapshot error: {message}")]
    Snapshot { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReelforgeError.
pub type ReelforgeResult<T> = Result<T, ReelforgeError>;

impl ReelforgeError {
    pub fn encoder_init(msg: impl Into<String>) -> Self {
        Self::EncoderInit {
            message: msg.into(),
        }
    }

    pub fn media_load(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::MediaLoad {
            url: url.into(),
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot {
            message: msg.into(),
        }
    }

    /// Errors that end the export session when they reach the frame loop.
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }

    /// Errors a video render attempt retries on. Everything except
    /// session-level failures and already exhausted element renders.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::AlreadyExporting
                | Self::Cancelled
                | Self::EncoderInit { .. }
                | Self::ElementRender { .. }
        )
    }
}
