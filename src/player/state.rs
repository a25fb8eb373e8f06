//! Shared playback state and engine commands.

use crate::model::{Pid, PlaylistId};

/// Where the engine currently is in its lifecycle.
///
/// Seeking and draining states are transient but observable, which makes
/// the state machine testable from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    /// No track session; the engine thread is parked.
    #[default]
    Idle,
    /// Resolving a target pid and opening decoder + device.
    Loading,
    Playing,
    Paused,
    /// Rewinding by replaying cached frames.
    SeekingReplay,
    /// Fast-forwarding by decoding and discarding.
    SeekingForward,
    /// Tearing down a finished or superseded track session.
    Draining,
}

/// Everything the command thread and the engine thread share.
///
/// Mutated only under one exclusive lock; neither side ever holds it
/// across blocking I/O or a decode call. The command thread writes
/// intents (`paused`, `pending_seek_ms`, `epoch`); the engine observes
/// them once per frame and writes progress back.
#[derive(Debug, Default)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    /// Playlist of the current (or last) track session.
    pub playlist: Option<PlaylistId>,
    /// Pid of the current (or last) track session.
    pub pid: Option<Pid>,
    /// Elapsed play time, accumulated from decoded frame durations.
    pub position_ms: f64,
    pub paused: bool,
    /// Seek target awaiting the engine's next per-frame check.
    pub pending_seek_ms: Option<f64>,
    /// Interruption token: bumped by every new play command. The engine
    /// compares it against the value captured at session start and
    /// abandons the track when they diverge. Cancellation is cooperative
    /// and frame-granular; a session is never killed mid-frame.
    pub epoch: u64,
}

impl PlaybackState {
    /// Whether a track session exists (in any phase).
    pub fn has_session(&self) -> bool {
        self.status != PlaybackStatus::Idle
    }
}

/// Commands sent to the engine thread.
///
/// Pause and seek are not commands: they are shared-state writes paired
/// with a `Wake`, so they apply idempotently and return synchronously.
#[derive(Debug, Clone)]
pub(crate) enum Command {
    /// Start a track, superseding whatever is in flight.
    /// `entry: None` means "nothing resolvable" and idles the engine.
    Play {
        playlist: PlaylistId,
        entry: Option<Pid>,
    },
    /// Rouse a parked engine to re-read shared state.
    Wake,
    /// Stop the engine thread for good.
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        let state = PlaybackState::default();
        assert_eq!(state.status, PlaybackStatus::Idle);
        assert!(!state.has_session());
        assert_eq!(state.position_ms, 0.0);
        assert!(state.pid.is_none());
    }
}
