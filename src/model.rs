//! Core identifiers, the playlist model, and collaborator traits.
//!
//! The engine never owns the library: playlists, song metadata, and file
//! bytes all come from the host through the traits defined here. The
//! engine stores and compares [`Pid`]s, never list indices; that is the
//! mechanism by which "currently playing" survives playlist edits.

use std::path::PathBuf;

/// Stable per-entry playlist identifier.
///
/// Assigned monotonically when a song is added to a playlist and never
/// reused. You are playing the Nth song, which has pid X; delete the first
/// song and you are now playing the (N-1)th song, but it is still pid X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(pub u64);

/// Opaque playlist identifier, assigned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaylistId(pub u64);

/// Opaque song identifier, assigned by the host's library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SongId(pub u64);

/// One playlist entry: a song tagged with its stable pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub pid: Pid,
    pub song: SongId,
}

/// An ordered list of songs with stable per-entry pids.
///
/// This is a reference implementation of the playlist side of the
/// contract; hosts with their own playlist storage only need to produce
/// [`PlaylistSnapshot`]s.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    entries: Vec<PlaylistEntry>,
    next_pid: u64,
}

impl Playlist {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_pid: 1,
        }
    }

    /// Append a song and return its freshly assigned pid.
    pub fn add(&mut self, song: SongId) -> Pid {
        let pid = Pid(self.next_pid);
        self.next_pid += 1;
        self.entries.push(PlaylistEntry { pid, song });
        pid
    }

    /// Remove the entry with the given pid. Returns false if it is gone.
    pub fn remove(&mut self, pid: Pid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.pid != pid);
        self.entries.len() != before
    }

    /// Replace the contents, assigning fresh pids to every song.
    pub fn reset(&mut self, songs: &[SongId]) {
        self.entries.clear();
        for &song in songs {
            self.add(song);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pid of the entry at a list position, if in range.
    pub fn nth_pid(&self, index: usize) -> Option<Pid> {
        self.entries.get(index).map(|e| e.pid)
    }

    /// Immutable view for the engine to read.
    pub fn snapshot(&self) -> PlaylistSnapshot {
        PlaylistSnapshot {
            entries: self.entries.clone(),
        }
    }
}

/// Immutable view of a playlist at one point in time.
///
/// The engine resolves pids against whatever snapshot the provider hands
/// it, so a stale pid simply fails to resolve rather than pointing at the
/// wrong song.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistSnapshot {
    entries: Vec<PlaylistEntry>,
}

impl PlaylistSnapshot {
    pub fn from_entries(entries: Vec<PlaylistEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The pids in playlist order.
    pub fn pid_sequence(&self) -> impl Iterator<Item = Pid> + '_ {
        self.entries.iter().map(|e| e.pid)
    }

    /// Current index of a pid, by linear scan. Pids are not guaranteed
    /// contiguous or sorted.
    pub fn index_of(&self, pid: Pid) -> Option<usize> {
        self.entries.iter().position(|e| e.pid == pid)
    }

    /// Pid at a list position, if in range.
    pub fn pid_at(&self, index: usize) -> Option<Pid> {
        self.entries.get(index).map(|e| e.pid)
    }

    /// Song carried by a pid, if the entry still exists.
    pub fn songid_of(&self, pid: Pid) -> Option<SongId> {
        self.entries.iter().find(|e| e.pid == pid).map(|e| e.song)
    }
}

/// Resolved song metadata plus the path to its byte stream.
///
/// Created on demand when the engine starts a track; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackDetails {
    pub song: SongId,
    pub path: PathBuf,
    pub duration_ms: f64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl TrackDetails {
    /// Get display title (file stem if no title tag).
    pub fn display_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Unknown".to_string())
        })
    }

    /// Get display artist.
    pub fn display_artist(&self) -> &str {
        self.artist.as_deref().unwrap_or("Unknown Artist")
    }
}

/// Host-side playlist storage.
pub trait PlaylistProvider: Send + Sync {
    /// Current contents of a playlist, or `None` if it was deleted.
    fn playlist(&self, id: PlaylistId) -> Option<PlaylistSnapshot>;
}

/// Host-side song metadata lookup.
pub trait SongLookup: Send + Sync {
    /// Resolve a song to its metadata and file path, or `None` if the
    /// song left the library.
    fn resolve(&self, song: SongId) -> Option<TrackDetails>;
}

/// Notifications pushed by the engine to the host.
///
/// Invoked on the engine thread; implementations must not block. Position
/// updates are deliberately *not* pushed: the host polls
/// [`Player::position_ms`](crate::Player::position_ms) on its own timer,
/// keeping scheduling policy out of the engine.
pub trait PlayerHooks: Send + Sync {
    /// A new track started (`Some`), or playback stopped with nothing
    /// queued (`None`). Fired at most once per track session.
    fn on_track_changed(&self, _track: Option<&TrackDetails>) {}
}

/// Hooks implementation that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl PlayerHooks for NoopHooks {}
