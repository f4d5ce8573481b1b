/// Result alias that carries the custom [`RhythmError`] type.
pub type Result<T> = std::result::Result<T, RhythmError>;

/// Common error type for the core crate.
///
/// Only the boundaries of the engine are fallible: decoding a track, loading
/// configuration and asking the platform for sensor access. Energy analysis,
/// scheduling and judgment are total over well-formed input.
#[derive(Debug, thiserror::Error)]
pub enum RhythmError {
    /// Free-form message for conditions that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// The audio track could not be decoded. Fatal to starting a session.
    #[error("failed to decode audio: {0}")]
    Decode(String),
    /// The platform refused access to a sensor or audio device.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl RhythmError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Creates a decode error from anything printable.
    pub fn decode<T: std::fmt::Display>(reason: T) -> Self {
        Self::Decode(reason.to_string())
    }
}

impl From<&str> for RhythmError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for RhythmError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<hound::Error> for RhythmError {
    fn from(value: hound::Error) -> Self {
        Self::decode(value)
    }
}
