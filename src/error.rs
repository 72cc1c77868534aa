//! Error types shared across the stream, codec, pager and device layers.

use thiserror::Error;

/// Errors raised by [`crate::stream::RingStream`] bookkeeping.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// A cursor was read before anything set it
    #[error("Unknown cursor: {0}")]
    UnknownCursor(String),

    /// A stream needs room for at least one sample
    #[error("Stream capacity must be positive")]
    ZeroCapacity,
}

/// Errors at the 16-bit sample encode/decode boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Sample value {0} is outside the signed 16-bit range")]
    OutOfRange(f64),

    #[error("Byte buffer of length {0} does not hold whole 16-bit samples")]
    OddByteCount(usize),

    #[error("Callback delivered {actual} samples, expected {expected}")]
    FrameCountMismatch { expected: usize, actual: usize },
}

/// Invalid oscilloscope pager tuning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PagerError {
    #[error("Invalid pager tuning: {0}")]
    InvalidTuning(String),
}

/// Errors that can occur while opening audio devices.
#[derive(Error, Debug)]
pub enum AudioError {
    /// No device of the requested direction exists
    #[error("No default audio {0} device available")]
    NoDefaultDevice(&'static str),

    /// Named device not found
    #[error("Audio device '{0}' not found")]
    DeviceNotFound(String),

    /// Failed to query the device configuration
    #[error("Could not query device config: {0}")]
    ConfigError(String),

    /// Failed to build the stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start the stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// Rejected configuration values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("Setting '{0}' must be positive")]
    NotPositive(&'static str),

    #[error("Tone frequency {0} Hz must be a finite positive number")]
    ToneFrequency(f32),

    #[error(transparent)]
    Pager(#[from] PagerError),
}

pub type StreamResult<T> = Result<T, StreamError>;
pub type CodecResult<T> = Result<T, CodecError>;
pub type AudioResult<T> = Result<T, AudioError>;
