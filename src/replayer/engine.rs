//! Pattern rendering engine
//!
//! [`Engine`] turns a [`Pattern`] plus a [`RenderConfig`] into interleaved
//! stereo frames. Each render or playback runs its own [`Session`]: a
//! private set of channel states and a mixer, with the sample store as the
//! only shared (read-only) input.

use super::channel::ChannelState;
use super::compiled::CompiledPattern;
use super::playback::{PlaybackHandle, PlaybackSummary};
use super::RenderConfig;
use crate::mixer::StereoMixer;
use crate::pattern::Pattern;
use crate::sample_store::SampleStore;
use crate::streaming::FrameSink;
use crate::{ModMixError, Result};
use std::sync::Arc;

/// One render session: channel states, mixer and the compiled pattern
#[derive(Debug)]
pub(crate) struct Session {
    pattern: CompiledPattern,
    channels: Vec<ChannelState>,
    mixer: StereoMixer,
    speed: u32,
    samples_per_tick: usize,
}

impl Session {
    pub(crate) fn new(pattern: CompiledPattern, config: &RenderConfig) -> Self {
        let channels = (0..pattern.channels())
            .map(|_| ChannelState::new(config.sample_rate()))
            .collect();
        Session {
            mixer: StereoMixer::new(pattern.channels()),
            channels,
            pattern,
            speed: config.speed(),
            samples_per_tick: config.samples_per_tick(),
        }
    }

    /// Stereo frames produced by one pass over the pattern
    pub(crate) fn frames_per_pass(&self) -> usize {
        self.pattern.len() * self.speed as usize * self.samples_per_tick
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }

    /// Render one pass over every row, appending interleaved frames.
    ///
    /// Channel state carries over between passes.
    pub(crate) fn render_pass(&mut self, out: &mut Vec<i16>) {
        out.reserve(self.frames_per_pass() * 2);

        for (row, events) in self.pattern.rows().iter().enumerate() {
            for tick in 0..self.speed {
                for (channel, state) in self.channels.iter_mut().enumerate() {
                    if tick == 0 {
                        state.begin_row();
                    }
                    state.tick();
                    if tick == 0 {
                        if let Some(event) = events.get(channel).filter(|e| !e.is_empty()) {
                            log::trace!(
                                "row {row}, channel {channel}: {:?} ratio {:?} vol {:?} pan {:?} delay {}",
                                event.sample_name(),
                                event.pitch_ratio(),
                                event.volume(),
                                event.pan(),
                                event.delay()
                            );
                            state.apply(event);
                        }
                    }
                }

                for _ in 0..self.samples_per_tick {
                    for state in &mut self.channels {
                        let (left, right) = state.render();
                        self.mixer.add(left, right);
                    }
                    let (left, right) = self.mixer.finish();
                    out.push(left);
                    out.push(right);
                }
            }
        }
    }
}

/// Pattern renderer bound to a sample store
#[derive(Debug, Clone)]
pub struct Engine {
    store: Arc<SampleStore>,
}

impl Engine {
    /// Create an engine reading samples from `store`
    pub fn new(store: Arc<SampleStore>) -> Self {
        Engine { store }
    }

    /// The sample store
    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }

    /// Resolve every sample and pitch in `pattern`.
    ///
    /// Fails with `SampleNotFound` on the first unknown sample name.
    pub fn compile(&self, pattern: &Pattern) -> Result<CompiledPattern> {
        CompiledPattern::compile(pattern, &self.store)
    }

    /// Render `pattern` into one buffer of interleaved 16-bit stereo frames.
    ///
    /// `Repeat::Times(n)` plays the pattern `n` times back to back;
    /// `Repeat::Forever` needs a handle and is rejected here.
    pub fn render(&self, pattern: &Pattern, config: &RenderConfig) -> Result<Vec<i16>> {
        let passes = config.repeat().count().ok_or_else(|| {
            ModMixError::InvalidArgument(
                "infinite repeat cannot render to a buffer; use Engine::play".to_string(),
            )
        })?;
        let mut session = Session::new(self.compile(pattern)?, config);

        log::debug!(
            "rendering {} rows x {} channels, {} pass(es), {} frames per tick",
            pattern.len(),
            pattern.channels(),
            passes,
            config.samples_per_tick()
        );

        let mut out = Vec::with_capacity(session.frames_per_pass() * 2 * passes as usize);
        for _ in 0..passes {
            session.render_pass(&mut out);
        }

        log::debug!("render finished: {} frames", out.len() / 2);
        Ok(out)
    }

    /// Render `pattern` and write the frames to `sink`, returning the frame count
    pub fn render_to<S: FrameSink + ?Sized>(
        &self,
        pattern: &Pattern,
        config: &RenderConfig,
        sink: &mut S,
    ) -> Result<usize> {
        let frames = self.render(pattern, config)?;
        sink.write_frames(&frames)?;
        sink.flush()?;
        Ok(frames.len() / 2)
    }

    /// Start playback on a worker thread.
    ///
    /// The pattern is compiled before the thread starts, so a missing sample
    /// fails here and `on_complete` is never called. Otherwise `on_complete`
    /// runs exactly once, after natural completion or an honoured stop.
    pub fn play<S, F>(
        &self,
        pattern: &Pattern,
        config: &RenderConfig,
        sink: S,
        on_complete: F,
    ) -> Result<PlaybackHandle>
    where
        S: FrameSink + Send + 'static,
        F: FnOnce(&PlaybackSummary) + Send + 'static,
    {
        let session = Session::new(self.compile(pattern)?, config);
        if config.repeat().is_forever() && session.is_empty() {
            return Err(ModMixError::InvalidArgument(
                "cannot loop a pattern with no rows".to_string(),
            ));
        }
        PlaybackHandle::spawn(session, config.repeat(), sink, on_complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternCell;
    use crate::replayer::Repeat;
    use crate::sample_store::SampleOptions;
    use crate::streaming::BufferSink;

    fn engine() -> Engine {
        let store = Arc::new(SampleStore::new());
        store.load("tone", &[100; 64], SampleOptions::default()).unwrap();
        Engine::new(store)
    }

    fn config(speed: u32, repeat: Repeat) -> RenderConfig {
        RenderConfig::from_tick_seconds(0.001, speed, repeat)
            .and_then(|c| c.with_sample_rate(10_000))
            .unwrap()
    }

    #[test]
    fn test_frame_count() {
        let pattern = Pattern::new(vec![vec![PatternCell::note("tone", "C-4")], vec![]]);
        let frames = engine().render(&pattern, &config(3, Repeat::once())).unwrap();
        // 2 rows x 3 ticks x 10 frames, stereo
        assert_eq!(frames.len(), 2 * 3 * 10 * 2);
    }

    #[test]
    fn test_centre_pan_output() {
        let pattern = Pattern::new(vec![vec![PatternCell::note("tone", "C-4")]]);
        let frames = engine().render(&pattern, &config(1, Repeat::once())).unwrap();
        // 100 * 256 * 128/255 * 0.3
        let expected = (100.0 * 256.0 * 128.0 / 255.0 * 0.3f64).round() as i16;
        assert_eq!(frames[0], (100.0 * 256.0 * 127.0 / 255.0 * 0.3f64).round() as i16);
        assert_eq!(frames[1], expected);
    }

    #[test]
    fn test_forever_rejected_by_render() {
        let pattern = Pattern::silent(1);
        let result = engine().render(&pattern, &config(1, Repeat::Forever));
        assert!(matches!(result, Err(ModMixError::InvalidArgument(_))));
    }

    #[test]
    fn test_delay_shifts_onset() {
        let pattern = Pattern::new(vec![vec![PatternCell::note("tone", "C-4").with_delay(2)]]);
        let frames = engine().render(&pattern, &config(4, Repeat::once())).unwrap();
        let first_sound = frames.iter().position(|&s| s != 0).unwrap();
        assert_eq!(first_sound / 2, 2 * 10);
    }

    #[test]
    fn test_overlong_delay_does_not_cut_next_row() {
        let store = Arc::new(SampleStore::new());
        store.load("a", &[10; 200], SampleOptions::default()).unwrap();
        store.load("b", &[100; 200], SampleOptions::default()).unwrap();
        let pattern = Pattern::new(vec![
            vec![PatternCell::note("a", "C-4").with_delay(5)],
            vec![PatternCell::note("b", "C-4")],
            vec![],
            vec![],
        ]);
        let frames = Engine::new(store).render(&pattern, &config(2, Repeat::once())).unwrap();

        let left: Vec<i16> = frames.chunks(2).map(|frame| frame[0]).collect();
        let b_level = left[20];
        assert!(b_level > 0);
        assert!(left[..20].iter().all(|&s| s == 0));
        // b runs through rows 1 to 3 untouched by the dropped delayed note
        assert!(left[20..].iter().all(|&s| s == b_level));
    }

    #[test]
    fn test_render_to_sink() {
        let pattern = Pattern::silent(2);
        let mut sink = BufferSink::new();
        let frames = engine()
            .render_to(&pattern, &config(2, Repeat::times(3).unwrap()), &mut sink)
            .unwrap();
        assert_eq!(frames, 2 * 2 * 10 * 3);
        assert_eq!(sink.samples().len(), frames * 2);
    }

    #[test]
    fn test_state_carries_across_passes() {
        let store = Arc::new(SampleStore::new());
        store
            .load("loop", &[50; 16], SampleOptions::default().looped(0, 16))
            .unwrap();
        let pattern = Pattern::new(vec![vec![PatternCell::note("loop", "C-4")], vec![]]);
        let frames = Engine::new(store)
            .render(&pattern, &config(1, Repeat::times(2).unwrap()))
            .unwrap();
        assert!(frames.iter().all(|&s| s != 0));
    }
}
