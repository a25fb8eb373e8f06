//! Sample cache: retained decoded frames of the current track.
//!
//! Compressed-audio frame decoding is not byte-seekable, so the only way
//! to rewind precisely is to have kept every frame decoded so far and
//! replay it. Forward seeks beyond the cache still decode sequentially;
//! the engine discards those frames instead of writing them.

use std::sync::Arc;

/// One decoded frame: interleaved f32 PCM plus its play time.
///
/// Immutable once produced; the cache stores frames behind `Arc` so
/// replay hands out cheap clones of the exact bytes decoded the first
/// time.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// Interleaved samples, channel-major within each frame.
    pub samples: Vec<f32>,
    /// Play time of this frame in milliseconds.
    pub duration_ms: f64,
}

/// How a seek will reach its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// Target is behind the playback position: replay cached frames
    /// from the top of the track.
    ReplayFromStart,
    /// Target is ahead: keep decoding (or replaying) forward and
    /// discard until the target is reached.
    DecodeForward,
}

/// Append-only store of the current track's decoded frames.
///
/// A replay cursor distinguishes "replaying from cache" from "decoding
/// fresh". The cache is dropped and recreated whenever a new track
/// starts.
#[derive(Debug, Default)]
pub struct SampleCache {
    frames: Vec<Arc<DecodedFrame>>,
    total_ms: f64,
    /// Index of the next frame to replay; `None` means decoding fresh.
    next_replay: Option<usize>,
}

impl SampleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retain a freshly decoded frame. O(1) amortized.
    pub fn push(&mut self, frame: Arc<DecodedFrame>) {
        self.total_ms += frame.duration_ms;
        self.frames.push(frame);
    }

    /// Cumulative duration of everything cached so far.
    pub fn cached_ms(&self) -> f64 {
        self.total_ms
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_replaying(&self) -> bool {
        self.next_replay.is_some()
    }

    /// Position the cache for a seek.
    ///
    /// Rewinds (target behind the current playback position) reset the
    /// replay cursor to the top of the track; the caller resets its
    /// position to zero and replays forward. Forward targets leave the
    /// cursor untouched so an in-progress replay keeps feeding frames
    /// until the cache runs out.
    pub fn seek_for_replay(&mut self, target_ms: f64, position_ms: f64) -> SeekMode {
        if target_ms < position_ms {
            self.next_replay = Some(0);
            SeekMode::ReplayFromStart
        } else {
            SeekMode::DecodeForward
        }
    }

    /// Next frame when replaying, or `None` when the caller must decode
    /// fresh. Advancing past the last cached frame leaves replay mode.
    pub fn next_for_playback(&mut self) -> Option<Arc<DecodedFrame>> {
        let index = self.next_replay?;
        let frame = Arc::clone(self.frames.get(index)?);
        self.next_replay = if index + 1 < self.frames.len() {
            Some(index + 1)
        } else {
            None
        };
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(value: f32, duration_ms: f64) -> Arc<DecodedFrame> {
        Arc::new(DecodedFrame {
            samples: vec![value; 4],
            duration_ms,
        })
    }

    #[test]
    fn test_fresh_cache_is_not_replaying() {
        let mut cache = SampleCache::new();
        assert!(!cache.is_replaying());
        assert_eq!(cache.next_for_playback(), None);
        assert_eq!(cache.cached_ms(), 0.0);
    }

    #[test]
    fn test_rewind_replays_identical_frames() {
        let mut cache = SampleCache::new();
        for i in 0..5 {
            cache.push(frame(i as f32, 100.0));
        }
        assert_eq!(cache.cached_ms(), 500.0);

        // Position 500ms, target 200ms: rewind.
        let mode = cache.seek_for_replay(200.0, 500.0);
        assert_eq!(mode, SeekMode::ReplayFromStart);

        // Replay reproduces the exact frames in order.
        for i in 0..5 {
            let f = cache.next_for_playback().expect("cached frame");
            assert_eq!(f.samples[0], i as f32);
        }

        // Cache exhausted: back to fresh decoding.
        assert!(!cache.is_replaying());
        assert_eq!(cache.next_for_playback(), None);
    }

    #[test]
    fn test_forward_target_keeps_decoding() {
        let mut cache = SampleCache::new();
        cache.push(frame(0.0, 100.0));

        let mode = cache.seek_for_replay(400.0, 100.0);
        assert_eq!(mode, SeekMode::DecodeForward);
        assert!(!cache.is_replaying());
    }

    #[test]
    fn test_forward_seek_during_replay_keeps_cursor() {
        let mut cache = SampleCache::new();
        for i in 0..4 {
            cache.push(frame(i as f32, 100.0));
        }

        // Rewind to the top, consume one frame...
        cache.seek_for_replay(0.0, 400.0);
        let first = cache.next_for_playback().unwrap();
        assert_eq!(first.samples[0], 0.0);

        // ...then seek forward past the replay point: the cursor keeps
        // feeding cached frames so the jump can discard them in order.
        let mode = cache.seek_for_replay(300.0, 100.0);
        assert_eq!(mode, SeekMode::DecodeForward);
        assert!(cache.is_replaying());
        assert_eq!(cache.next_for_playback().unwrap().samples[0], 1.0);
    }

    #[test]
    fn test_push_during_replay_extends_tail() {
        let mut cache = SampleCache::new();
        cache.push(frame(0.0, 100.0));
        cache.seek_for_replay(0.0, 100.0);

        cache.push(frame(1.0, 100.0));
        assert_eq!(cache.next_for_playback().unwrap().samples[0], 0.0);
        assert_eq!(cache.next_for_playback().unwrap().samples[0], 1.0);
        assert_eq!(cache.next_for_playback(), None);
    }
}
