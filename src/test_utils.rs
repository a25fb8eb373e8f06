//! Test fixtures for playback engine tests.
//!
//! Provides scripted decoders and capturing sinks so engine behavior is
//! deterministic and observable without real audio files or devices, an
//! in-memory playlist/song library, and a WAV byte builder for decoder
//! smoke tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::cache::DecodedFrame;
use crate::decoder::{DecoderFactory, FrameDecoder};
use crate::error::{Error, Result};
use crate::model::{
    Pid, PlayerHooks, Playlist, PlaylistId, PlaylistProvider, PlaylistSnapshot, SongId, SongLookup,
    TrackDetails,
};
use crate::sink::{AudioSink, SinkFactory};

/// Frames whose samples encode their own index, so tests can assert
/// exactly which frames reached the sink and in what order.
pub fn script_frames(count: usize, frame_ms: f64, samples_per_frame: usize) -> Vec<DecodedFrame> {
    (0..count)
        .map(|i| DecodedFrame {
            samples: vec![i as f32; samples_per_frame],
            duration_ms: frame_ms,
        })
        .collect()
}

/// A canned decode sequence for one track.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub frames: Vec<DecodedFrame>,
    /// Fail with a decode error when asked for this frame index.
    pub fail_at: Option<usize>,
}

impl Script {
    pub fn of(frames: Vec<DecodedFrame>) -> Self {
        Self {
            frames,
            fail_at: None,
        }
    }
}

/// Decoder that replays a [`Script`].
pub struct ScriptedDecoder {
    script: Script,
    next: usize,
}

impl FrameDecoder for ScriptedDecoder {
    fn next_frame(&mut self) -> Result<Option<DecodedFrame>> {
        if Some(self.next) == self.script.fail_at {
            return Err(Error::decode("scripted decode failure"));
        }
        let frame = self.script.frames.get(self.next).cloned();
        if frame.is_some() {
            self.next += 1;
        }
        Ok(frame)
    }

    fn sample_rate(&self) -> u32 {
        44_100
    }

    fn channels(&self) -> u16 {
        2
    }
}

/// Decoder factory mapping paths to scripts. Paths without a script fail
/// to open, which doubles as the source-unavailable fixture.
#[derive(Default)]
pub struct ScriptLibrary {
    scripts: HashMap<PathBuf, Script>,
    opens: AtomicUsize,
}

impl ScriptLibrary {
    pub fn insert(&mut self, path: impl Into<PathBuf>, script: Script) {
        self.scripts.insert(path.into(), script);
    }

    /// How many times any decoder was opened (retry detection).
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl DecoderFactory for ScriptLibrary {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameDecoder>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .get(path)
            .cloned()
            .ok_or_else(|| Error::source_unavailable(format!("no script for {}", path.display())))?;
        Ok(Box::new(ScriptedDecoder { script, next: 0 }))
    }
}

/// What a capturing sink saw, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Wrote(Vec<f32>),
    Flushed,
}

/// Shared log written by [`CapturingSink`]s.
#[derive(Default)]
pub struct SinkLog {
    events: Mutex<Vec<SinkEvent>>,
}

impl SinkLog {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, SinkEvent::Wrote(_)))
            .count()
    }

    /// Sample buffers written after the last flush marker.
    pub fn written_after_last_flush(&self) -> Vec<Vec<f32>> {
        let events = self.events.lock();
        let start = events
            .iter()
            .rposition(|e| *e == SinkEvent::Flushed)
            .map(|i| i + 1)
            .unwrap_or(0);
        events[start..]
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Wrote(samples) => Some(samples.clone()),
                SinkEvent::Flushed => None,
            })
            .collect()
    }
}

/// Sink that records writes and flushes to a shared [`SinkLog`]. An
/// optional per-write delay simulates device backpressure so tests can
/// interact with an in-flight session.
pub struct CapturingSink {
    log: Arc<SinkLog>,
    write_delay: Duration,
}

impl AudioSink for CapturingSink {
    fn write(&mut self, frame: &DecodedFrame) -> Result<()> {
        if !self.write_delay.is_zero() {
            std::thread::sleep(self.write_delay);
        }
        self.log
            .events
            .lock()
            .push(SinkEvent::Wrote(frame.samples.clone()));
        Ok(())
    }

    fn flush(&mut self) {
        self.log.events.lock().push(SinkEvent::Flushed);
    }
}

/// Factory for [`CapturingSink`]s; can be told to fail opening, which is
/// the device-unavailable fixture.
pub struct CapturingSinkFactory {
    pub log: Arc<SinkLog>,
    pub write_delay: Duration,
    pub fail_open: bool,
}

impl CapturingSinkFactory {
    pub fn new(log: Arc<SinkLog>) -> Self {
        Self {
            log,
            write_delay: Duration::ZERO,
            fail_open: false,
        }
    }

    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }
}

impl SinkFactory for CapturingSinkFactory {
    fn open(&self, _sample_rate: u32, _channels: u16) -> Result<Box<dyn AudioSink>> {
        if self.fail_open {
            return Err(Error::device("scripted device failure"));
        }
        Ok(Box::new(CapturingSink {
            log: Arc::clone(&self.log),
            write_delay: self.write_delay,
        }))
    }
}

/// In-memory playlists and song metadata, mutable behind locks so tests
/// can edit a playlist while it is playing.
#[derive(Default)]
pub struct MemoryLibrary {
    playlists: Mutex<HashMap<PlaylistId, Playlist>>,
    songs: Mutex<HashMap<SongId, TrackDetails>>,
}

impl MemoryLibrary {
    pub fn add_song(&self, song: SongId, path: impl Into<PathBuf>, duration_ms: f64) {
        self.songs.lock().insert(
            song,
            TrackDetails {
                song,
                path: path.into(),
                duration_ms,
                title: Some(format!("Track {}", song.0)),
                artist: Some("Test Artist".to_string()),
                album: Some("Test Album".to_string()),
            },
        );
    }

    /// Create or replace a playlist from songs, returning assigned pids.
    pub fn set_playlist(&self, id: PlaylistId, songs: &[SongId]) -> Vec<Pid> {
        let mut list = Playlist::new();
        let pids = songs.iter().map(|&s| list.add(s)).collect();
        self.playlists.lock().insert(id, list);
        pids
    }

    /// Mutate a playlist in place (e.g. delete the playing entry).
    pub fn edit_playlist(&self, id: PlaylistId, edit: impl FnOnce(&mut Playlist)) {
        if let Some(list) = self.playlists.lock().get_mut(&id) {
            edit(list);
        }
    }

    pub fn remove_playlist(&self, id: PlaylistId) {
        self.playlists.lock().remove(&id);
    }
}

impl PlaylistProvider for MemoryLibrary {
    fn playlist(&self, id: PlaylistId) -> Option<PlaylistSnapshot> {
        self.playlists.lock().get(&id).map(|p| p.snapshot())
    }
}

impl SongLookup for MemoryLibrary {
    fn resolve(&self, song: SongId) -> Option<TrackDetails> {
        self.songs.lock().get(&song).cloned()
    }
}

/// Hooks that record every track-changed notification.
#[derive(Default)]
pub struct RecordingHooks {
    changes: Mutex<Vec<Option<SongId>>>,
}

impl RecordingHooks {
    pub fn changes(&self) -> Vec<Option<SongId>> {
        self.changes.lock().clone()
    }

    pub fn count_of(&self, song: SongId) -> usize {
        self.changes
            .lock()
            .iter()
            .filter(|c| **c == Some(song))
            .count()
    }
}

impl PlayerHooks for RecordingHooks {
    fn on_track_changed(&self, track: Option<&TrackDetails>) {
        self.changes.lock().push(track.map(|t| t.song));
    }
}

/// Poll until a condition holds or the timeout passes.
pub fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// Minimal 16-bit PCM WAV file in memory: `frames` frames of silence.
pub fn wav_bytes(sample_rate: u32, channels: u16, frames: u32) -> Vec<u8> {
    let block_align = channels * 2;
    let byte_rate = sample_rate * u32::from(block_align);
    let data_len = frames * u32::from(block_align);

    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(44 + data_len as usize, 0);
    out
}
