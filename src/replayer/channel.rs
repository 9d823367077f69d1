//! Channel playback state machine
//!
//! A channel is idle until a note triggers it, then plays its sample until
//! the data runs out (non-looping) or forever (looping). A delayed note is
//! held with a tick countdown and fires without touching other channels. A
//! delayed note that has not fired by the end of its row is dropped.
//!
//! Time base: `position` counts output frames since the trigger. The source
//! index is `position * pitch_ratio * native_rate / output_rate`, so pitch
//! never changes how the channel's own clock advances.

use super::compiled::{CompiledEvent, Trigger};
use crate::pattern::{MAX_VOLUME, PAN_CENTER};
use crate::sample_store::Sample;
use std::sync::Arc;

/// Scale from signed 8-bit PCM to the 16-bit mixing range
const PCM_SCALE: f64 = 256.0;

#[derive(Debug, Clone)]
struct DelayedNote {
    event: CompiledEvent,
    remaining: u8,
}

/// Playback state of one pattern channel
#[derive(Debug, Clone)]
pub struct ChannelState {
    output_rate: u32,
    sample: Option<Arc<Sample>>,
    position: u64,
    pitch_ratio: f64,
    step: f64,
    volume: u8,
    pan: u8,
    active: bool,
    delayed: Option<DelayedNote>,
}

impl ChannelState {
    /// Idle channel rendering at `output_rate` Hz
    pub fn new(output_rate: u32) -> Self {
        ChannelState {
            output_rate,
            sample: None,
            position: 0,
            pitch_ratio: 1.0,
            step: 1.0,
            volume: MAX_VOLUME,
            pan: PAN_CENTER,
            active: false,
            delayed: None,
        }
    }

    /// Whether a sample is currently sounding
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether a delayed note is pending
    pub fn has_pending_note(&self) -> bool {
        self.delayed.is_some()
    }

    /// Current volume, 0-64
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Current pan, 0-255
    pub fn pan(&self) -> u8 {
        self.pan
    }

    /// Current pitch ratio
    pub fn pitch_ratio(&self) -> f64 {
        self.pitch_ratio
    }

    /// Output frames rendered since the last trigger
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Apply a row event at tick 0.
    ///
    /// A delayed trigger is stashed (replacing any pending one). An
    /// immediate trigger cancels any pending note and restarts the sample
    /// only when it differs from what is playing or the channel has gone
    /// idle. Volume and pan always apply.
    pub fn apply(&mut self, event: &CompiledEvent) {
        match &event.trigger {
            Some(_) if event.delay > 0 => {
                self.delayed = Some(DelayedNote {
                    event: event.clone(),
                    remaining: event.delay,
                });
            }
            Some(trigger) => {
                self.delayed = None;
                if !self.active || !self.is_playing(trigger) {
                    self.start(trigger);
                }
                self.update_mix(event);
            }
            None => self.update_mix(event),
        }
    }

    /// Drop a delayed note left over from the previous row.
    ///
    /// Called at tick 0 of every row, before the row's events apply. A
    /// delay of `speed` ticks or more never fires.
    pub fn begin_row(&mut self) {
        if let Some(pending) = self.delayed.take() {
            log::trace!(
                "delayed note dropped with {} ticks remaining",
                pending.remaining
            );
        }
    }

    /// Advance the pending-note countdown by one tick, firing it at zero
    pub fn tick(&mut self) {
        let fire = match self.delayed.as_mut() {
            Some(pending) => {
                pending.remaining = pending.remaining.saturating_sub(1);
                pending.remaining == 0
            }
            None => false,
        };
        if fire {
            if let Some(pending) = self.delayed.take() {
                if let Some(trigger) = &pending.event.trigger {
                    self.start(trigger);
                }
                self.update_mix(&pending.event);
            }
        }
    }

    /// Render one output frame as (left, right) in the 16-bit range
    #[inline]
    pub fn render(&mut self) -> (f64, f64) {
        if !self.active {
            return (0.0, 0.0);
        }
        let Some(sample) = self.sample.as_deref() else {
            self.active = false;
            return (0.0, 0.0);
        };
        let pcm = sample.pcm();

        let source = self.position as f64 * self.step;
        let frac = source.fract();
        let mut index = source as usize;

        if sample.has_loop() {
            if index >= sample.loop_end() {
                index = sample.loop_start() + (index - sample.loop_start()) % sample.loop_length();
            }
        } else if index >= pcm.len() {
            self.active = false;
            return (0.0, 0.0);
        }

        let current = f64::from(pcm[index]);
        let next_index = index + 1;
        let next = if sample.has_loop() && next_index >= sample.loop_end() {
            f64::from(pcm[sample.loop_start()])
        } else {
            pcm.get(next_index).map_or(current, |&v| f64::from(v))
        };

        let value = (current + (next - current) * frac) * PCM_SCALE * f64::from(self.volume)
            / f64::from(MAX_VOLUME);
        let left = value * f64::from(255 - self.pan) / 255.0;
        let right = value * f64::from(self.pan) / 255.0;

        self.position += 1;
        (left, right)
    }

    fn is_playing(&self, trigger: &Trigger) -> bool {
        self.sample
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &trigger.sample))
            && self.pitch_ratio == trigger.pitch_ratio
    }

    fn start(&mut self, trigger: &Trigger) {
        let rate_factor = trigger
            .sample
            .sample_rate()
            .map_or(1.0, |rate| f64::from(rate) / f64::from(self.output_rate));
        self.sample = Some(Arc::clone(&trigger.sample));
        self.pitch_ratio = trigger.pitch_ratio;
        self.step = trigger.pitch_ratio * rate_factor;
        self.position = 0;
        self.active = !trigger.sample.is_empty();
    }

    fn update_mix(&mut self, event: &CompiledEvent) {
        if let Some(volume) = event.volume {
            self.volume = volume.min(MAX_VOLUME);
        }
        if let Some(pan) = event.pan {
            self.pan = pan;
        }
    }
}
