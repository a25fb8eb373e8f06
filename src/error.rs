//! Engine-wide error types.
//!
//! All errors are non-fatal to the engine itself: a failure tears down at
//! most the track session it occurred in, and the caller observes it
//! indirectly through the track-changed hook. Nothing is ever propagated
//! across the shared-state lock to the command thread.

/// Engine-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Playback engine error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The track's byte source could not be opened or read.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The compressed stream contained a malformed or unsupported frame.
    /// Later frames of the same track are unrecoverable.
    #[error("decode error: {0}")]
    Decode(String),

    /// The audio output device could not be opened or written to.
    #[error("audio device error: {0}")]
    Device(String),

    /// The engine worker has shut down and no longer accepts commands.
    #[error("player command channel closed")]
    ChannelClosed,
}

impl Error {
    /// Create a source-unavailable error.
    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable(message.into())
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create a device error.
    pub fn device(message: impl Into<String>) -> Self {
        Self::Device(message.into())
    }
}
