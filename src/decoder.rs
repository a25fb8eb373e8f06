//! Frame decoding behind a narrow trait, with a symphonia adapter.
//!
//! The engine pulls one compressed frame at a time and distinguishes the
//! three outcomes with a tagged result: `Ok(Some(frame))`, `Ok(None)` at
//! end of stream, and `Err` for a malformed stream. End of stream is
//! expected control flow, not an error.

use std::fs::File;
use std::io;
use std::path::Path;

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::cache::DecodedFrame;
use crate::error::{Error, Result};

/// Pulls compressed frames from a byte source and produces PCM frames
/// plus their duration. Stateless beyond stream position; all rewind
/// buffering lives in the sample cache, never here.
pub trait FrameDecoder {
    /// Decode the next frame. `Ok(None)` means the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<DecodedFrame>>;

    /// Sample rate of the decoded stream.
    fn sample_rate(&self) -> u32;

    /// Channel count of the decoded stream.
    fn channels(&self) -> u16;
}

/// Opens the raw byte stream behind a track path.
///
/// This is the host's seam for non-filesystem storage (archives,
/// network caches, test fixtures).
pub trait ByteSource: Send + Sync {
    fn open(&self, path: &Path) -> io::Result<Box<dyn MediaSource>>;
}

/// Byte source backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsByteSource;

impl ByteSource for FsByteSource {
    fn open(&self, path: &Path) -> io::Result<Box<dyn MediaSource>> {
        Ok(Box::new(File::open(path)?))
    }
}

/// Creates a decoder for a track path. Called on the engine thread each
/// time a track session starts.
pub trait DecoderFactory: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameDecoder>>;
}

/// Production decoder factory: byte source + symphonia probe.
pub struct SymphoniaOpener {
    source: Box<dyn ByteSource>,
}

impl SymphoniaOpener {
    pub fn new(source: Box<dyn ByteSource>) -> Self {
        Self { source }
    }
}

impl Default for SymphoniaOpener {
    fn default() -> Self {
        Self::new(Box::new(FsByteSource))
    }
}

impl DecoderFactory for SymphoniaOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameDecoder>> {
        let stream = self
            .source
            .open(path)
            .map_err(|e| Error::source_unavailable(format!("{}: {}", path.display(), e)))?;
        let extension = path.extension().map(|e| e.to_string_lossy().to_string());
        let decoder = SymphoniaDecoder::new(stream, extension.as_deref())?;
        Ok(Box::new(decoder))
    }
}

/// Frame decoder backed by symphonia (MP3, FLAC, OGG, WAV, AAC).
pub struct SymphoniaDecoder {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
}

impl SymphoniaDecoder {
    /// Probe a byte stream and set up decoding of its first audio track.
    pub fn new(stream: Box<dyn MediaSource>, extension: Option<&str>) -> Result<Self> {
        let mss = MediaSourceStream::new(stream, Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };
        let metadata_opts = MetadataOptions::default();

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &metadata_opts)
            .map_err(|e| Error::source_unavailable(e.to_string()))?;

        let reader = probed.format;

        // First real audio track; skip attachments and null codecs.
        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::decode("no audio track found"))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| Error::decode("unknown sample rate"))?;
        let channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(2);

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::decode(e.to_string()))?;

        Ok(Self {
            reader,
            decoder,
            track_id,
            sample_rate,
            channels,
        })
    }
}

impl FrameDecoder for SymphoniaDecoder {
    fn next_frame(&mut self) -> Result<Option<DecodedFrame>> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None); // End of stream
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(Error::decode(e.to_string())),
            };

            // Skip packets from other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            // A bad frame aborts the track: later frames of a corrupt
            // stream are unrecoverable, and the engine auto-advances.
            let decoded = self
                .decoder
                .decode(&packet)
                .map_err(|e| Error::decode(e.to_string()))?;

            let samples = interleave_f32(&decoded);
            let frames = samples.len() / self.channels.max(1) as usize;
            let duration_ms = frames as f64 * 1000.0 / f64::from(self.sample_rate);

            return Ok(Some(DecodedFrame {
                samples,
                duration_ms,
            }));
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }
}

/// Convert a planar decode buffer to interleaved f32 samples.
fn interleave_f32(buffer: &AudioBufferRef) -> Vec<f32> {
    macro_rules! interleave {
        ($buf:expr, $to_f32:expr) => {{
            let planes = $buf.planes();
            let plane_slice = planes.planes();
            let frames = $buf.frames();
            let mut output = Vec::with_capacity(frames * plane_slice.len());
            for frame in 0..frames {
                for plane in plane_slice {
                    output.push($to_f32(plane[frame]));
                }
            }
            output
        }};
    }

    match buffer {
        AudioBufferRef::F32(buf) => interleave!(buf, |s| s),
        AudioBufferRef::S16(buf) => interleave!(buf, |s: i16| s as f32 / 32768.0),
        AudioBufferRef::S24(buf) => {
            interleave!(buf, |s: symphonia::core::sample::i24| s.0 as f32 / 8388608.0)
        }
        AudioBufferRef::S32(buf) => interleave!(buf, |s: i32| s as f32 / 2147483648.0),
        AudioBufferRef::U8(buf) => interleave!(buf, |s: u8| (s as f32 - 128.0) / 128.0),
        _ => Vec::new(),
    }
}
