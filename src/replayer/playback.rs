//! Threaded playback sessions
//!
//! A session renders on its own worker thread and writes to a
//! [`FrameSink`]. Stop requests are cooperative: the worker checks the flag
//! only between pattern passes, never mid-row. The completion callback runs
//! exactly once per session, including when the worker unwinds.

use super::engine::Session;
use super::{PlaybackController, PlaybackState, Repeat};
use crate::streaming::FrameSink;
use crate::{ModMixError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Outcome of a playback session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackSummary {
    /// Pattern passes rendered
    pub passes: u64,
    /// Stereo frames handed to the sink
    pub frames_written: u64,
    /// Whether the session ended because of a stop request
    pub stopped: bool,
}

#[derive(Debug)]
struct Shared {
    stop_requested: AtomicBool,
    state: Mutex<PlaybackState>,
}

/// Fires the completion callback once, on finish or on drop
struct Completion<F: FnOnce(&PlaybackSummary)> {
    callback: Option<F>,
    summary: PlaybackSummary,
    shared: Arc<Shared>,
}

impl<F: FnOnce(&PlaybackSummary)> Completion<F> {
    fn finish(mut self) -> PlaybackSummary {
        self.fire();
        self.summary
    }

    fn fire(&mut self) {
        *self.shared.state.lock() = PlaybackState::Stopped;
        if let Some(callback) = self.callback.take() {
            callback(&self.summary);
        }
    }
}

impl<F: FnOnce(&PlaybackSummary)> Drop for Completion<F> {
    fn drop(&mut self) {
        self.fire();
    }
}

/// Handle to a running playback session
#[derive(Debug)]
pub struct PlaybackHandle {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<Result<PlaybackSummary>>>,
    forever: bool,
}

impl PlaybackHandle {
    pub(crate) fn spawn<S, F>(
        mut session: Session,
        repeat: Repeat,
        mut sink: S,
        on_complete: F,
    ) -> Result<Self>
    where
        S: FrameSink + Send + 'static,
        F: FnOnce(&PlaybackSummary) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            stop_requested: AtomicBool::new(false),
            state: Mutex::new(PlaybackState::Playing),
        });
        let worker_shared = Arc::clone(&shared);

        let worker = thread::Builder::new()
            .name("modmix-playback".to_string())
            .spawn(move || {
                let mut completion = Completion {
                    callback: Some(on_complete),
                    summary: PlaybackSummary::default(),
                    shared: Arc::clone(&worker_shared),
                };
                let stop = &worker_shared.stop_requested;
                let mut buffer = Vec::with_capacity(session.frames_per_pass() * 2);

                let result = match repeat.count() {
                    Some(passes) => {
                        for _ in 0..passes {
                            if stop.load(Ordering::Acquire) {
                                completion.summary.stopped = true;
                                break;
                            }
                            session.render_pass(&mut buffer);
                            completion.summary.passes += 1;
                        }
                        write(&mut sink, &buffer, &mut completion.summary)
                    }
                    None => loop {
                        if stop.load(Ordering::Acquire) {
                            completion.summary.stopped = true;
                            break Ok(());
                        }
                        buffer.clear();
                        session.render_pass(&mut buffer);
                        completion.summary.passes += 1;
                        if let Err(e) = write(&mut sink, &buffer, &mut completion.summary) {
                            break Err(e);
                        }
                    },
                };

                if completion.summary.stopped {
                    log::debug!(
                        "playback stopped after {} pass(es)",
                        completion.summary.passes
                    );
                }
                let summary = completion.finish();
                result.map(|()| summary)
            })
            .map_err(|e| ModMixError::Playback(format!("failed to spawn playback thread: {e}")))?;

        Ok(PlaybackHandle {
            shared,
            worker: Some(worker),
            forever: repeat.is_forever(),
        })
    }

    /// Whether the worker thread has exited
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Block until the session ends and return its summary
    pub fn wait(mut self) -> Result<PlaybackSummary> {
        let worker = self
            .worker
            .take()
            .ok_or_else(|| ModMixError::Playback("playback already joined".to_string()))?;
        worker
            .join()
            .map_err(|_| ModMixError::Playback("playback thread panicked".to_string()))?
    }
}

fn write<S: FrameSink>(sink: &mut S, frames: &[i16], summary: &mut PlaybackSummary) -> Result<()> {
    sink.write_frames(frames)?;
    sink.flush()?;
    summary.frames_written += (frames.len() / 2) as u64;
    Ok(())
}

impl PlaybackController for PlaybackHandle {
    fn stop(&self) {
        self.shared.stop_requested.store(true, Ordering::Release);
        let mut state = self.shared.state.lock();
        if *state == PlaybackState::Playing {
            *state = PlaybackState::Stopping;
        }
    }

    fn state(&self) -> PlaybackState {
        *self.shared.state.lock()
    }
}

impl Drop for PlaybackHandle {
    /// A dropped handle can no longer stop an endless session, so dropping
    /// one requests the stop itself. Finite sessions run to completion.
    fn drop(&mut self) {
        if self.forever && self.worker.is_some() {
            self.stop();
        }
    }
}
