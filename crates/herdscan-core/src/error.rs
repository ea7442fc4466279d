//! Error types for herdscan

use crate::types::ModelKind;

/// Result type alias using herdscan's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for herdscan operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Zero-length image payload
    #[error("empty input: no image bytes supplied")]
    EmptyInput,

    /// Bytes could not be decoded as a supported raster image
    #[error("decode error: {0}")]
    Decode(String),

    /// Caller supplied a threshold outside [0, 1]
    #[error("invalid threshold {0}: expected a value in [0, 1]")]
    InvalidThreshold(f32),

    /// Numeric backend failure during a forward pass
    #[error("inference error in {kind} model: {message}")]
    Inference { kind: ModelKind, message: String },

    /// Weights missing, unreadable, or incompatible with the configured backbone
    #[error("failed to load {kind} model: {message}")]
    ModelLoad { kind: ModelKind, message: String },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Scan record storage errors
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new inference error for the given model kind
    pub fn inference(kind: ModelKind, msg: impl Into<String>) -> Self {
        Self::Inference {
            kind,
            message: msg.into(),
        }
    }

    /// Create a new model load error for the given model kind
    pub fn model_load(kind: ModelKind, msg: impl Into<String>) -> Self {
        Self::ModelLoad {
            kind,
            message: msg.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether the failure was caused by the request itself (bad image, bad threshold).
    ///
    /// An upstream request layer maps these to client errors; everything else
    /// is a server-side failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput | Self::Decode(_) | Self::InvalidThreshold(_)
        )
    }

    /// Stable label used for metrics and structured logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::Decode(_) => "decode",
            Self::InvalidThreshold(_) => "invalid_threshold",
            Self::Inference { .. } => "inference",
            Self::ModelLoad { .. } => "model_load",
            Self::Config(_) => "config",
            Self::Storage(_) => "storage",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}
