//! Audio output behind a narrow trait, with a cpal adapter.
//!
//! The sink is a thin adapter: open, write frames, flush, close (drop).
//! It buffers only what the device needs; rewind/seek buffering lives in
//! the sample cache. `write` blocking while the device catches up is the
//! engine's backpressure, not a bug: it bounds memory growth.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use parking_lot::{Condvar, Mutex};

use crate::cache::DecodedFrame;
use crate::error::{Error, Result};

/// Platform audio output for one track session.
pub trait AudioSink {
    /// Queue a frame for playback. May block on device backpressure.
    fn write(&mut self, frame: &DecodedFrame) -> Result<()>;

    /// Block until everything queued so far has been played out.
    fn flush(&mut self);
}

/// Opens a sink for a track's sample rate and channel count. Called on
/// the engine thread at the start of each track session.
pub trait SinkFactory: Send + Sync {
    fn open(&self, sample_rate: u32, channels: u16) -> Result<Box<dyn AudioSink>>;
}

/// Production sink factory: cpal output device.
#[derive(Debug, Clone, Default)]
pub struct CpalSinkFactory {
    /// Preferred device name; empty selects the system default.
    device_name: String,
    buffer_ms: u32,
}

impl CpalSinkFactory {
    pub fn new(device_name: impl Into<String>, buffer_ms: u32) -> Self {
        Self {
            device_name: device_name.into(),
            buffer_ms,
        }
    }
}

impl SinkFactory for CpalSinkFactory {
    fn open(&self, sample_rate: u32, channels: u16) -> Result<Box<dyn AudioSink>> {
        let sink = CpalSink::open(&self.device_name, sample_rate, channels, self.buffer_ms)?;
        Ok(Box::new(sink))
    }
}

/// List available audio output device names.
pub fn list_output_devices() -> Vec<String> {
    let host = cpal::default_host();
    host.output_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default()
}

/// State shared between the engine thread and the cpal callback.
struct SinkShared {
    /// Interleaved samples waiting for the device.
    queue: Mutex<VecDeque<f32>>,
    /// Signaled by the callback whenever it drains the queue.
    drained: Condvar,
    /// Set if the stream reported a fatal error.
    failed: AtomicBool,
    /// Callback starvation count, logged at teardown.
    underruns: AtomicU32,
    /// Backpressure bound, in samples.
    max_queued: usize,
}

/// Audio sink backed by a cpal output stream.
pub struct CpalSink {
    shared: Arc<SinkShared>,
    _stream: Stream,
}

impl CpalSink {
    fn open(device_name: &str, sample_rate: u32, channels: u16, buffer_ms: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = select_device(&host, device_name)?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        tracing::info!("opening audio device {name}: {sample_rate}Hz, {channels}ch");

        let supported = device
            .default_output_config()
            .map_err(|e| Error::device(e.to_string()))?;

        let config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let max_queued =
            (sample_rate as usize * channels as usize * buffer_ms.max(1) as usize) / 1000;
        let shared = Arc::new(SinkShared {
            queue: Mutex::new(VecDeque::with_capacity(max_queued)),
            drained: Condvar::new(),
            failed: AtomicBool::new(false),
            underruns: AtomicU32::new(0),
            max_queued: max_queued.max(1),
        });

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, Arc::clone(&shared)),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, Arc::clone(&shared)),
            format => {
                return Err(Error::device(format!(
                    "unsupported sample format: {format:?}"
                )));
            }
        }
        .map_err(|e| Error::device(e.to_string()))?;

        stream.play().map_err(|e| Error::device(e.to_string()))?;

        Ok(Self {
            shared,
            _stream: stream,
        })
    }
}

impl AudioSink for CpalSink {
    fn write(&mut self, frame: &DecodedFrame) -> Result<()> {
        let mut queue = self.shared.queue.lock();
        while queue.len() + frame.samples.len() > self.shared.max_queued {
            if self.shared.failed.load(Ordering::Relaxed) {
                return Err(Error::device("output stream failed"));
            }
            // Timed wait so a dead stream cannot wedge the engine.
            self.shared
                .drained
                .wait_for(&mut queue, Duration::from_millis(100));
        }
        queue.extend(frame.samples.iter().copied());
        Ok(())
    }

    fn flush(&mut self) {
        let mut queue = self.shared.queue.lock();
        while !queue.is_empty() {
            if self.shared.failed.load(Ordering::Relaxed) {
                queue.clear();
                return;
            }
            self.shared
                .drained
                .wait_for(&mut queue, Duration::from_millis(100));
        }
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        // Dropping without flush discards queued audio; that is the
        // prompt-teardown path for interruptions.
        let underruns = self.shared.underruns.load(Ordering::Relaxed);
        if underruns > 0 {
            tracing::debug!("audio sink closed with {underruns} underruns");
        }
    }
}

/// Pick the configured output device, falling back to the default.
fn select_device(host: &cpal::Host, device_name: &str) -> Result<Device> {
    if !device_name.is_empty() {
        let devices = host
            .output_devices()
            .map_err(|e| Error::device(e.to_string()))?;
        for device in devices {
            if device.name().map(|n| n == device_name).unwrap_or(false) {
                return Ok(device);
            }
        }
        tracing::warn!("output device {device_name:?} not found, using default");
    }
    host.default_output_device()
        .ok_or_else(|| Error::device("no output device found"))
}

/// Build the output stream; the callback pops queued samples and emits
/// silence on underrun.
fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    shared: Arc<SinkShared>,
) -> std::result::Result<Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let callback_shared = Arc::clone(&shared);
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let mut queue = callback_shared.queue.lock();
            let available = queue.len().min(data.len());
            for sample in &mut data[..available] {
                let s = queue.pop_front().unwrap_or(0.0);
                *sample = T::from_sample(s);
            }
            if available < data.len() {
                callback_shared.underruns.fetch_add(1, Ordering::Relaxed);
                for sample in &mut data[available..] {
                    *sample = T::from_sample(0.0f32);
                }
            }
            drop(queue);
            callback_shared.drained.notify_one();
        },
        move |err| {
            tracing::error!("audio stream error: {err}");
            shared.failed.store(true, Ordering::Relaxed);
        },
        None,
    )
}
