//! The playback engine: command surface and worker ownership.
//!
//! # Architecture
//!
//! ```text
//! callers (UI / host)
//!     | play / pause / seek          | position_ms / status
//!     v                              v
//! +--------- Player ------------------------------------+
//! |  command channel (crossbeam)   shared state (mutex) |
//! +----------------|-----------------------^------------+
//!                  v                       |
//!        engine thread: resolve pid -> decode -> cache -> sink
//! ```
//!
//! One engine thread exists for the lifetime of the [`Player`]; it parks
//! on the command channel when idle. Play commands travel through the
//! channel so they wake a parked engine; pause and seek are shared-state
//! writes the engine observes once per frame, which makes them idempotent
//! and lets them return synchronously.

mod engine;
mod state;

pub use state::{PlaybackStatus, PlaybackState};

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, bounded};
use parking_lot::Mutex;

use crate::config::PlayerConfig;
use crate::cursor;
use crate::decoder::{DecoderFactory, SymphoniaOpener};
use crate::error::{Error, Result};
use crate::model::{NoopHooks, Pid, PlayerHooks, PlaylistId, PlaylistProvider, SongLookup};
use crate::sink::{CpalSinkFactory, SinkFactory};
use state::Command;

use engine::Engine;

/// Everything the engine consumes from the host.
#[derive(Clone)]
pub struct Deps {
    pub playlists: Arc<dyn PlaylistProvider>,
    pub songs: Arc<dyn SongLookup>,
    pub decoders: Arc<dyn DecoderFactory>,
    pub sinks: Arc<dyn SinkFactory>,
    pub hooks: Arc<dyn PlayerHooks>,
}

impl Deps {
    /// Production wiring: symphonia decoding from the filesystem and a
    /// cpal output device.
    pub fn production(
        playlists: Arc<dyn PlaylistProvider>,
        songs: Arc<dyn SongLookup>,
        config: &PlayerConfig,
    ) -> Self {
        Self {
            playlists,
            songs,
            decoders: Arc::new(SymphoniaOpener::default()),
            sinks: Arc::new(CpalSinkFactory::new(
                config.output_device.clone(),
                config.sink_buffer_ms,
            )),
            hooks: Arc::new(NoopHooks),
        }
    }

    /// Replace the notification hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn PlayerHooks>) -> Self {
        self.hooks = hooks;
        self
    }
}

/// The playback engine's thread-safe command and query surface.
///
/// Commands are fire-and-forget; a `play` always supersedes whatever is
/// in flight. Queries read a locked snapshot and return immediately, so
/// a UI timer polling [`Player::position_ms`] never stalls behind the
/// decode loop.
pub struct Player {
    shared: Arc<Mutex<PlaybackState>>,
    commands: Sender<Command>,
    playlists: Arc<dyn PlaylistProvider>,
    worker: Option<JoinHandle<()>>,
}

impl Player {
    /// Create the engine and spawn its worker thread.
    pub fn new(config: &PlayerConfig, deps: Deps) -> Result<Self> {
        let shared = Arc::new(Mutex::new(PlaybackState::default()));
        let (tx, rx) = bounded(config.command_queue_depth.max(1));
        let playlists = Arc::clone(&deps.playlists);

        let engine = Engine::new(Arc::clone(&shared), rx, deps);
        let worker = thread::Builder::new()
            .name("playdeck-engine".to_string())
            .spawn(move || engine.run())
            .map_err(|e| Error::device(format!("failed to spawn engine thread: {e}")))?;

        Ok(Self {
            shared,
            commands: tx,
            playlists,
            worker: Some(worker),
        })
    }

    /// Start playing a playlist entry, superseding any in-flight track.
    pub fn play(&self, playlist: PlaylistId, pid: Pid) -> Result<()> {
        self.begin_play(playlist, Some(pid))
    }

    /// Play the entry `delta` positions from the current one: `+1` for
    /// next, `-1` for previous, `0` to restart the current track.
    ///
    /// Whether "previous" should restart instead of going back is caller
    /// policy; the engine only executes the delta it is given. A no-op
    /// when no playlist has been played yet.
    pub fn play_relative(&self, delta: i32) -> Result<()> {
        let (playlist, pid) = {
            let st = self.shared.lock();
            (st.playlist, st.pid)
        };
        let Some(playlist) = playlist else {
            return Ok(());
        };
        let entry = self
            .playlists
            .playlist(playlist)
            .and_then(|snap| cursor::advance(&snap, pid, delta));
        self.begin_play(playlist, entry)
    }

    fn begin_play(&self, playlist: PlaylistId, entry: Option<Pid>) -> Result<()> {
        {
            // Bump the interruption token so an in-flight session stands
            // down; starting a track also always un-pauses.
            let mut st = self.shared.lock();
            st.epoch += 1;
            st.paused = false;
            st.pending_seek_ms = None;
        }
        self.commands
            .send(Command::Play { playlist, entry })
            .map_err(|_| Error::ChannelClosed)
    }

    /// Pause playback. Returns the resulting paused state: `true` unless
    /// nothing is playing. Idempotent.
    pub fn pause(&self) -> bool {
        self.set_paused(true)
    }

    /// Resume playback. Returns the resulting paused state: `false`.
    pub fn resume(&self) -> bool {
        self.set_paused(false)
    }

    fn set_paused(&self, paused: bool) -> bool {
        {
            let mut st = self.shared.lock();
            if !st.has_session() {
                return false;
            }
            st.paused = paused;
        }
        let _ = self.commands.send(Command::Wake);
        paused
    }

    /// Jump to a position in the current track, in milliseconds.
    /// Rewinds replay from the in-memory cache; forward jumps decode and
    /// discard. Ignored when nothing is playing.
    pub fn seek(&self, target_ms: f64) {
        {
            let mut st = self.shared.lock();
            if !st.has_session() {
                return;
            }
            st.pending_seek_ms = Some(target_ms.max(0.0));
        }
        let _ = self.commands.send(Command::Wake);
    }

    /// Elapsed play time of the current track in milliseconds.
    /// Non-blocking; safe to call from a UI timer.
    pub fn position_ms(&self) -> f64 {
        self.shared.lock().position_ms
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock().paused
    }

    pub fn status(&self) -> PlaybackStatus {
        self.shared.lock().status
    }

    /// Pid of the current (or most recent) track.
    pub fn current_pid(&self) -> Option<Pid> {
        self.shared.lock().pid
    }

    /// Playlist of the current (or most recent) track.
    pub fn current_playlist(&self) -> Option<PlaylistId> {
        self.shared.lock().playlist
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
