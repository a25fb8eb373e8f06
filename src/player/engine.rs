//! The decode/output worker.
//!
//! Exactly one engine thread exists for the lifetime of the player. It
//! parks on the command channel when idle, and while a track session is
//! running it checks commands, the interruption token, the pause flag,
//! and any pending seek exactly once per decoded frame. The lock is held
//! only for those checks and for position updates, never across a file
//! read, a decode call, or a device write.

use std::ops::ControlFlow;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::cache::{DecodedFrame, SampleCache, SeekMode};
use crate::cursor;
use crate::decoder::FrameDecoder;
use crate::error::Result;
use crate::model::{Pid, PlaylistId};
use crate::player::Deps;
use crate::player::state::{Command, PlaybackState, PlaybackStatus};
use crate::sink::AudioSink;

/// What the engine should load next.
#[derive(Debug, Clone, Copy)]
enum Target {
    /// An explicit entry from a play command. `None` pid means the
    /// caller's cursor resolved nothing; the engine idles and notifies.
    Entry(PlaylistId, Option<Pid>),
    /// Automatic advance: resolve +1 from the track that just finished.
    Advance(PlaylistId),
}

/// Why a track session ended.
enum SessionEnd {
    /// The stream ran out, or a decode error made the rest of the track
    /// unrecoverable. Either way the playlist is still sound: advance.
    Finished,
    /// A new play command superseded this session.
    Interrupted,
    /// The output device failed mid-track.
    DeviceFailed,
    /// The player was dropped.
    Shutdown,
}

pub(crate) struct Engine {
    shared: Arc<Mutex<PlaybackState>>,
    commands: Receiver<Command>,
    deps: Deps,
    next: Option<Target>,
}

impl Engine {
    pub(crate) fn new(
        shared: Arc<Mutex<PlaybackState>>,
        commands: Receiver<Command>,
        deps: Deps,
    ) -> Self {
        Self {
            shared,
            commands,
            deps,
            next: None,
        }
    }

    /// Thread entry point. Returns when the player shuts down.
    pub(crate) fn run(mut self) {
        loop {
            if self.next.is_none() {
                // Idle: park until somebody wants something played.
                match self.commands.recv() {
                    Ok(cmd) => {
                        if self.apply(cmd).is_break() {
                            return;
                        }
                    }
                    Err(_) => return,
                }
            }
            if self.drain_commands().is_break() {
                return;
            }
            let Some(target) = self.next.take() else {
                continue;
            };
            if self.run_track(target).is_break() {
                return;
            }
        }
    }

    /// Absorb one command. Play commands only stash a target; the last
    /// one queued wins.
    fn apply(&mut self, cmd: Command) -> ControlFlow<()> {
        match cmd {
            Command::Play { playlist, entry } => {
                self.next = Some(Target::Entry(playlist, entry));
                ControlFlow::Continue(())
            }
            Command::Wake => ControlFlow::Continue(()),
            Command::Shutdown => ControlFlow::Break(()),
        }
    }

    fn drain_commands(&mut self) -> ControlFlow<()> {
        while let Ok(cmd) = self.commands.try_recv() {
            self.apply(cmd)?;
        }
        ControlFlow::Continue(())
    }

    /// One full track session: resolve, open, play, tear down.
    /// `Break` means the player is shutting down.
    fn run_track(&mut self, target: Target) -> ControlFlow<()> {
        let session_epoch = {
            let mut st = self.shared.lock();
            st.status = PlaybackStatus::Loading;
            st.pending_seek_ms = None;
            st.epoch
        };

        let playlist_id = match target {
            Target::Entry(id, _) | Target::Advance(id) => id,
        };
        let Some(playlist) = self.deps.playlists.playlist(playlist_id) else {
            tracing::warn!("playlist {playlist_id:?} is gone, stopping");
            self.idle_cleared();
            return ControlFlow::Continue(());
        };

        let pid = match target {
            Target::Entry(_, entry) => entry,
            Target::Advance(_) => {
                let finished = self.shared.lock().pid;
                cursor::advance(&playlist, finished, 1)
            }
        };
        // Exhausted playlist, or the entry was deleted under us.
        let Some(pid) = pid else {
            tracing::info!("end of playlist {playlist_id:?}");
            self.idle_cleared();
            return ControlFlow::Continue(());
        };
        let Some(song) = playlist.songid_of(pid) else {
            tracing::info!("entry {pid:?} no longer in playlist {playlist_id:?}");
            self.idle_cleared();
            return ControlFlow::Continue(());
        };

        let Some(track) = self.deps.songs.resolve(song) else {
            tracing::error!("song {song:?} not found in library");
            self.idle_kept();
            return ControlFlow::Continue(());
        };

        // Commit the target before opening anything: if the open fails,
        // the failed entry stays current, so a follow-up next/previous
        // command moves past it instead of landing on it again.
        {
            let mut st = self.shared.lock();
            st.playlist = Some(playlist_id);
            st.pid = Some(pid);
        }

        // Open decoder and device. Failures return to Idle with no
        // automatic retry: retrying a fixed bad entry would loop
        // tightly, so the caller must issue the next command.
        let mut decoder = match self.deps.decoders.open(&track.path) {
            Ok(d) => d,
            Err(e) => {
                tracing::error!("cannot open {}: {e}", track.path.display());
                self.idle_kept();
                return ControlFlow::Continue(());
            }
        };
        let mut sink = match self
            .deps
            .sinks
            .open(decoder.sample_rate(), decoder.channels())
        {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("cannot open audio output: {e}");
                self.idle_kept();
                return ControlFlow::Continue(());
            }
        };

        {
            let mut st = self.shared.lock();
            st.position_ms = 0.0;
            st.status = if st.paused {
                PlaybackStatus::Paused
            } else {
                PlaybackStatus::Playing
            };
        }
        tracing::info!(
            "playing {:?} ({} by {})",
            pid,
            track.display_title(),
            track.display_artist()
        );
        self.deps.hooks.on_track_changed(Some(&track));

        let end = self.play_session(session_epoch, decoder.as_mut(), sink.as_mut());

        self.shared.lock().status = PlaybackStatus::Draining;
        match end {
            SessionEnd::Finished => {
                // Let queued audio play out, then advance.
                sink.flush();
                self.next = Some(Target::Advance(playlist_id));
                ControlFlow::Continue(())
            }
            SessionEnd::Interrupted => {
                // Drop the sink without flushing: discard queued audio
                // so the superseding track starts promptly.
                ControlFlow::Continue(())
            }
            SessionEnd::DeviceFailed => {
                self.idle_kept();
                ControlFlow::Continue(())
            }
            SessionEnd::Shutdown => {
                self.shared.lock().status = PlaybackStatus::Idle;
                ControlFlow::Break(())
            }
        }
    }

    /// The per-frame loop. Returns only at a session boundary.
    fn play_session(
        &mut self,
        session_epoch: u64,
        decoder: &mut dyn FrameDecoder,
        sink: &mut dyn AudioSink,
    ) -> SessionEnd {
        let mut cache = SampleCache::new();

        loop {
            if let Some(end) = self.absorb_commands() {
                return end;
            }

            let (interrupted, paused, seek) = {
                let mut st = self.shared.lock();
                (
                    st.epoch != session_epoch,
                    st.paused,
                    st.pending_seek_ms.take(),
                )
            };
            if interrupted || self.next.is_some() {
                return SessionEnd::Interrupted;
            }

            // Seeks apply even while paused, and preserve pause state:
            // the jump never writes to the sink.
            if let Some(target_ms) = seek {
                match self.jump(decoder, sink, &mut cache, target_ms, session_epoch) {
                    Ok(()) => continue,
                    Err(end) => return end,
                }
            }

            if paused {
                sink.flush();
                self.shared.lock().status = PlaybackStatus::Paused;
                // Park until a command changes something, then re-check
                // everything from the top.
                match self.commands.recv() {
                    Ok(cmd) => {
                        if self.apply(cmd).is_break() {
                            return SessionEnd::Shutdown;
                        }
                        continue;
                    }
                    Err(_) => return SessionEnd::Shutdown,
                }
            }

            {
                let mut st = self.shared.lock();
                if st.status != PlaybackStatus::Playing {
                    st.status = PlaybackStatus::Playing;
                }
            }

            // One frame: cache replay if rewinding, fresh decode
            // otherwise. The frame is written before position advances,
            // so position never gets ahead of the audio.
            match next_playback_frame(decoder, &mut cache) {
                Ok(Some(frame)) => {
                    if let Err(e) = sink.write(&frame) {
                        tracing::error!("device write failed: {e}");
                        return SessionEnd::DeviceFailed;
                    }
                    self.shared.lock().position_ms += frame.duration_ms;
                }
                Ok(None) => return SessionEnd::Finished,
                Err(e) => {
                    tracing::warn!("decode error, abandoning track: {e}");
                    return SessionEnd::Finished;
                }
            }
        }
    }

    /// Jump forward or backward in the stream. Rewinds replay the cache
    /// from the top; forward jumps decode and discard. No sink writes
    /// happen until the target is reached.
    fn jump(
        &mut self,
        decoder: &mut dyn FrameDecoder,
        sink: &mut dyn AudioSink,
        cache: &mut SampleCache,
        target_ms: f64,
        session_epoch: u64,
    ) -> std::result::Result<(), SessionEnd> {
        sink.flush();
        {
            let mut st = self.shared.lock();
            match cache.seek_for_replay(target_ms, st.position_ms) {
                SeekMode::ReplayFromStart => {
                    st.position_ms = 0.0;
                    st.status = PlaybackStatus::SeekingReplay;
                }
                SeekMode::DecodeForward => {
                    st.status = PlaybackStatus::SeekingForward;
                }
            }
        }
        tracing::debug!("seeking to {target_ms}ms");

        loop {
            // Long jumps stay cancellable at frame granularity.
            if let Some(end) = self.absorb_commands() {
                return Err(end);
            }
            {
                let st = self.shared.lock();
                if st.epoch != session_epoch {
                    return Err(SessionEnd::Interrupted);
                }
                if st.position_ms >= target_ms {
                    break;
                }
            }
            match next_playback_frame(decoder, cache) {
                Ok(Some(frame)) => {
                    self.shared.lock().position_ms += frame.duration_ms;
                }
                // Target beyond end of stream: stop where we are and let
                // the playback loop observe the exhausted stream.
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("decode error while seeking: {e}");
                    break;
                }
            }
        }

        let mut st = self.shared.lock();
        st.status = if st.paused {
            PlaybackStatus::Paused
        } else {
            PlaybackStatus::Playing
        };
        Ok(())
    }

    /// Drain pending commands mid-session. `Some` means the session must
    /// end; a stashed play target is picked up by the outer loop.
    fn absorb_commands(&mut self) -> Option<SessionEnd> {
        while let Ok(cmd) = self.commands.try_recv() {
            if self.apply(cmd).is_break() {
                return Some(SessionEnd::Shutdown);
            }
        }
        if self.next.is_some() {
            return Some(SessionEnd::Interrupted);
        }
        None
    }

    /// Stop with nothing playing: playlist gone, exhausted, or entry
    /// deleted. Clears the remembered session entirely.
    fn idle_cleared(&mut self) {
        {
            let mut st = self.shared.lock();
            st.status = PlaybackStatus::Idle;
            st.playlist = None;
            st.pid = None;
            st.position_ms = 0.0;
            st.paused = false;
            st.pending_seek_ms = None;
        }
        self.deps.hooks.on_track_changed(None);
    }

    /// Stop after a load or device failure. The playlist and pid stay
    /// remembered so the caller can still issue next/previous.
    fn idle_kept(&mut self) {
        {
            let mut st = self.shared.lock();
            st.status = PlaybackStatus::Idle;
            st.pending_seek_ms = None;
        }
        self.deps.hooks.on_track_changed(None);
    }
}

/// The next frame to play: from the cache while replaying, freshly
/// decoded (and cached) otherwise.
fn next_playback_frame(
    decoder: &mut dyn FrameDecoder,
    cache: &mut SampleCache,
) -> Result<Option<Arc<DecodedFrame>>> {
    if let Some(frame) = cache.next_for_playback() {
        return Ok(Some(frame));
    }
    match decoder.next_frame()? {
        Some(frame) => {
            let frame = Arc::new(frame);
            cache.push(Arc::clone(&frame));
            Ok(Some(frame))
        }
        None => Ok(None),
    }
}
