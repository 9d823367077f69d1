//! Pattern Playback Engine Domain
//!
//! Drives one [`ChannelState`] per pattern channel tick by tick, resamples
//! with linear interpolation and mixes into interleaved 16-bit stereo.
//!
//! Timing is always an explicit tick duration. [`TickTiming`] converts the
//! two tracker tempo conventions into one:
//! - rows per minute: `tick = 60 / tempo / speed`
//! - BPM (S3M/MOD): `tick = 2.5 / tempo`
//!
//! A row lasts `speed` ticks; a tick lasts `round(tick_seconds * rate)`
//! output frames.

pub mod channel;
mod compiled;
mod engine;
mod playback;

pub use channel::ChannelState;
pub use compiled::{CompiledEvent, CompiledPattern};
pub use engine::Engine;
pub use playback::{PlaybackHandle, PlaybackSummary};

use crate::{ModMixError, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// Output sample rate used when none is configured
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Ticks per row used when none is configured
pub const DEFAULT_SPEED: u32 = 6;

/// Unit of a tempo value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempoMode {
    /// Tempo counts rows per minute
    #[default]
    RowsPerMinute,
    /// Tracker BPM (`tick = 2.5 / bpm`)
    Bpm,
    /// Tempo is the tick duration in seconds
    TickSeconds,
}

/// Tempo with its unit, convertible to a tick duration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickTiming {
    /// Rows per minute
    RowsPerMinute(f64),
    /// Tracker BPM
    Bpm(f64),
    /// Explicit tick duration in seconds
    TickSeconds(f64),
}

impl TickTiming {
    /// Pair a tempo value with its unit
    pub fn new(mode: TempoMode, tempo: f64) -> Self {
        match mode {
            TempoMode::RowsPerMinute => TickTiming::RowsPerMinute(tempo),
            TempoMode::Bpm => TickTiming::Bpm(tempo),
            TempoMode::TickSeconds => TickTiming::TickSeconds(tempo),
        }
    }

    /// Tick duration in seconds at `speed` ticks per row
    pub fn tick_seconds(&self, speed: u32) -> Result<f64> {
        let (TickTiming::RowsPerMinute(value)
        | TickTiming::Bpm(value)
        | TickTiming::TickSeconds(value)) = *self;
        if !value.is_finite() || value <= 0.0 {
            return Err(ModMixError::InvalidArgument(format!(
                "tempo must be a positive number, got {value}"
            )));
        }
        if speed == 0 {
            return Err(ModMixError::InvalidArgument(
                "speed must be at least 1 tick per row".to_string(),
            ));
        }
        Ok(match *self {
            TickTiming::RowsPerMinute(rows) => 60.0 / rows / f64::from(speed),
            TickTiming::Bpm(bpm) => 2.5 / bpm,
            TickTiming::TickSeconds(seconds) => seconds,
        })
    }
}

/// How many times a pattern is played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Repeat {
    /// Play back-to-back this many times into one buffer
    Times(NonZeroU32),
    /// Loop until stopped (`-1`)
    Forever,
}

impl Repeat {
    /// Play once
    pub fn once() -> Self {
        Repeat::Times(NonZeroU32::MIN)
    }

    /// Play `count` times; zero is rejected
    pub fn times(count: u32) -> Result<Self> {
        NonZeroU32::new(count)
            .map(Repeat::Times)
            .ok_or_else(|| ModMixError::InvalidArgument("repeat count must be positive".to_string()))
    }

    /// Finite pass count, `None` for [`Repeat::Forever`]
    pub fn count(&self) -> Option<u32> {
        match self {
            Repeat::Times(count) => Some(count.get()),
            Repeat::Forever => None,
        }
    }

    /// Whether playback loops until stopped
    pub fn is_forever(&self) -> bool {
        matches!(self, Repeat::Forever)
    }
}

impl Default for Repeat {
    fn default() -> Self {
        Self::once()
    }
}

impl TryFrom<i32> for Repeat {
    type Error = ModMixError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            -1 => Ok(Repeat::Forever),
            n if n > 0 => Self::times(n.unsigned_abs()),
            n => Err(ModMixError::InvalidArgument(format!(
                "repeat must be a positive count or -1, got {n}"
            ))),
        }
    }
}

impl From<Repeat> for i32 {
    fn from(repeat: Repeat) -> i32 {
        match repeat {
            Repeat::Times(count) => i32::try_from(count.get()).unwrap_or(i32::MAX),
            Repeat::Forever => -1,
        }
    }
}

/// Caller-facing timing options, as they arrive from a request or file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Tempo value, required
    pub tempo: Option<f64>,
    /// Unit of `tempo`
    pub tempo_mode: TempoMode,
    /// Ticks per row (default 6)
    pub speed: Option<u32>,
    /// Positive pass count or -1 (default 1)
    pub repeat: Option<i32>,
    /// Output rate in Hz (default 44100)
    pub sample_rate: Option<u32>,
}

impl RenderOptions {
    /// Options with a rows-per-minute tempo
    pub fn rows_per_minute(tempo: f64) -> Self {
        RenderOptions {
            tempo: Some(tempo),
            ..Self::default()
        }
    }

    /// Options with a tracker BPM tempo
    pub fn bpm(tempo: f64) -> Self {
        RenderOptions {
            tempo: Some(tempo),
            tempo_mode: TempoMode::Bpm,
            ..Self::default()
        }
    }

    /// Set ticks per row
    pub fn with_speed(mut self, speed: u32) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Set the repeat value
    pub fn with_repeat(mut self, repeat: i32) -> Self {
        self.repeat = Some(repeat);
        self
    }

    /// Set the output rate
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }
}

/// Validated timing for one render: explicit tick duration, speed, repeat
/// and output rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    tick_seconds: f64,
    speed: u32,
    repeat: Repeat,
    sample_rate: u32,
}

impl RenderConfig {
    /// Build from a tempo convention at the default output rate
    pub fn new(timing: TickTiming, speed: u32, repeat: Repeat) -> Result<Self> {
        Ok(RenderConfig {
            tick_seconds: timing.tick_seconds(speed)?,
            speed,
            repeat,
            sample_rate: DEFAULT_SAMPLE_RATE,
        })
    }

    /// Build from an explicit tick duration
    pub fn from_tick_seconds(tick_seconds: f64, speed: u32, repeat: Repeat) -> Result<Self> {
        Self::new(TickTiming::TickSeconds(tick_seconds), speed, repeat)
    }

    /// Change the output rate
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(ModMixError::InvalidArgument(
                "sample rate must be greater than 0".to_string(),
            ));
        }
        self.sample_rate = sample_rate;
        Ok(self)
    }

    /// Change the repeat mode
    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    /// Tick duration in seconds
    pub fn tick_seconds(&self) -> f64 {
        self.tick_seconds
    }

    /// Ticks per row
    pub fn speed(&self) -> u32 {
        self.speed
    }

    /// Repeat mode
    pub fn repeat(&self) -> Repeat {
        self.repeat
    }

    /// Output rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Output frames per tick (at least one)
    pub fn samples_per_tick(&self) -> usize {
        ((self.tick_seconds * f64::from(self.sample_rate)).round() as usize).max(1)
    }

    /// Output frames per row
    pub fn frames_per_row(&self) -> usize {
        self.samples_per_tick() * self.speed as usize
    }
}

impl TryFrom<RenderOptions> for RenderConfig {
    type Error = ModMixError;

    fn try_from(options: RenderOptions) -> Result<Self> {
        let tempo = options.tempo.ok_or_else(|| {
            ModMixError::InvalidArgument("missing required tempo (bpm) parameter".to_string())
        })?;
        let repeat = match options.repeat {
            Some(value) => Repeat::try_from(value)?,
            None => Repeat::once(),
        };
        let config = RenderConfig::new(
            TickTiming::new(options.tempo_mode, tempo),
            options.speed.unwrap_or(DEFAULT_SPEED),
            repeat,
        )?;
        config.with_sample_rate(options.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE))
    }
}

/// Playback session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Rendering and writing passes
    Playing,
    /// Stop requested; finishing the current pass
    Stopping,
    /// Session over, completion signalled
    #[default]
    Stopped,
}

/// Control surface of a running playback session
pub trait PlaybackController {
    /// Request a stop at the next pattern boundary
    fn stop(&self);

    /// Get current playback state
    fn state(&self) -> PlaybackState;

    /// Check if the session is still producing audio
    fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tick_formulas() {
        assert_relative_eq!(
            TickTiming::RowsPerMinute(120.0).tick_seconds(6).unwrap(),
            60.0 / 120.0 / 6.0
        );
        assert_relative_eq!(TickTiming::Bpm(125.0).tick_seconds(6).unwrap(), 0.02);
        assert_relative_eq!(TickTiming::Bpm(125.0).tick_seconds(3).unwrap(), 0.02);
        assert_relative_eq!(TickTiming::TickSeconds(0.01).tick_seconds(4).unwrap(), 0.01);
    }

    #[test]
    fn test_tick_validation() {
        assert!(TickTiming::Bpm(0.0).tick_seconds(6).is_err());
        assert!(TickTiming::RowsPerMinute(-1.0).tick_seconds(6).is_err());
        assert!(TickTiming::Bpm(f64::NAN).tick_seconds(6).is_err());
        assert!(matches!(
            TickTiming::Bpm(125.0).tick_seconds(0),
            Err(ModMixError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_repeat_values() {
        assert_eq!(Repeat::try_from(-1).unwrap(), Repeat::Forever);
        assert_eq!(Repeat::try_from(3).unwrap().count(), Some(3));
        assert!(matches!(Repeat::try_from(0), Err(ModMixError::InvalidArgument(_))));
        assert!(matches!(Repeat::try_from(-2), Err(ModMixError::InvalidArgument(_))));
        assert_eq!(i32::from(Repeat::Forever), -1);
        assert_eq!(i32::from(Repeat::once()), 1);
        assert!(Repeat::Forever.is_forever());
    }

    #[test]
    fn test_repeat_serde() {
        let repeat: Repeat = serde_json::from_str("-1").unwrap();
        assert_eq!(repeat, Repeat::Forever);
        assert_eq!(serde_json::to_string(&Repeat::times(4).unwrap()).unwrap(), "4");
        assert!(serde_json::from_str::<Repeat>("0").is_err());
    }

    #[test]
    fn test_config_from_options() {
        let options: RenderOptions =
            serde_json::from_str(r#"{"tempo": 125, "tempo_mode": "bpm", "speed": 3, "repeat": 2}"#)
                .unwrap();
        let config = RenderConfig::try_from(options).unwrap();
        assert_relative_eq!(config.tick_seconds(), 0.02);
        assert_eq!(config.speed(), 3);
        assert_eq!(config.repeat().count(), Some(2));
        assert_eq!(config.sample_rate(), 44_100);
        assert_eq!(config.samples_per_tick(), 882);
        assert_eq!(config.frames_per_row(), 2646);
    }

    #[test]
    fn test_config_defaults() {
        let config = RenderConfig::try_from(RenderOptions::rows_per_minute(600.0)).unwrap();
        assert_eq!(config.speed(), DEFAULT_SPEED);
        assert_eq!(config.repeat(), Repeat::once());
        assert_relative_eq!(config.tick_seconds(), 60.0 / 600.0 / 6.0);
    }

    #[test]
    fn test_missing_tempo() {
        let result = RenderConfig::try_from(RenderOptions::default());
        assert!(matches!(result, Err(ModMixError::InvalidArgument(_))));
    }

    #[test]
    fn test_invalid_options() {
        let options = RenderOptions::rows_per_minute(120.0).with_repeat(0);
        assert!(RenderConfig::try_from(options).is_err());
        let options = RenderOptions::rows_per_minute(120.0).with_sample_rate(0);
        assert!(RenderConfig::try_from(options).is_err());
        let options = RenderOptions::bpm(125.0).with_speed(0);
        assert!(RenderConfig::try_from(options).is_err());
    }

    #[test]
    fn test_samples_per_tick_minimum() {
        let config = RenderConfig::from_tick_seconds(1e-9, 1, Repeat::once()).unwrap();
        assert_eq!(config.samples_per_tick(), 1);
    }
}
