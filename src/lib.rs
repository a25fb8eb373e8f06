//! Playdeck - an audio playback engine.
//!
//! This crate drives gapless playback of a playlist on a background engine
//! thread: decoding frames, pushing them to an audio sink, caching decoded
//! samples so rewinds replay instead of re-decoding, and tracking the
//! current entry by its stable playlist id so the cursor survives playlist
//! edits. The [`Player`] handle is cheap to share and all of its methods
//! return without blocking on audio.

pub mod cache;
pub mod config;
pub mod cursor;
pub mod decoder;
pub mod error;
pub mod model;
pub mod player;
pub mod sink;
#[cfg(test)]
pub mod test_utils;

pub use cache::{DecodedFrame, SampleCache, SeekMode};
pub use config::PlayerConfig;
pub use decoder::{ByteSource, DecoderFactory, FrameDecoder, FsByteSource, SymphoniaOpener};
pub use error::{Error, Result};
pub use model::{
    NoopHooks, Pid, PlayerHooks, Playlist, PlaylistEntry, PlaylistId, PlaylistProvider,
    PlaylistSnapshot, SongId, SongLookup, TrackDetails,
};
pub use player::{Deps, PlaybackStatus, Player};
pub use sink::{AudioSink, CpalSinkFactory, SinkFactory, list_output_devices};
