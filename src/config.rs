//! Engine configuration.
//!
//! The engine is a library, so it never touches the filesystem for
//! configuration: hosts own the config file and hand a [`PlayerConfig`]
//! to [`Player::new`](crate::Player::new). The struct round-trips through
//! TOML so hosts can embed it in their own config files.

use serde::{Deserialize, Serialize};

/// Playback engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Selected output device name (empty = system default)
    pub output_device: String,

    /// Depth of the command queue between callers and the engine thread.
    /// Commands beyond this block the caller briefly; 32 is plenty for
    /// interactive use.
    pub command_queue_depth: usize,

    /// How much decoded audio the output sink may hold before `write`
    /// blocks. This is the engine's only backpressure bound; all seek
    /// buffering lives in the sample cache instead.
    pub sink_buffer_ms: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            output_device: String::new(),
            command_queue_depth: 32,
            sink_buffer_ms: 500,
        }
    }
}
