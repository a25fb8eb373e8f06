//! Playlist cursor: stateless next/previous resolution by pid.

use crate::model::{Pid, PlaylistSnapshot};

/// Resolve the pid `delta` entries away from `current` in the playlist.
///
/// `current = None` behaves as a virtual index before the first entry, so
/// `delta = +1` starts the playlist from the beginning. A `current` pid
/// that no longer exists yields `None`; this is how the engine detects a
/// track deleted out from under it. `delta = 0` re-resolves the current
/// pid (restart semantics). Out-of-range results yield `None`.
pub fn advance(playlist: &PlaylistSnapshot, current: Option<Pid>, delta: i32) -> Option<Pid> {
    let index = match current {
        None => -1,
        Some(pid) => playlist.index_of(pid)? as i64,
    };
    let target = index + i64::from(delta);
    if target < 0 {
        return None;
    }
    playlist.pid_at(target as usize)
}
