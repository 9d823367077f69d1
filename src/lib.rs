//! Tracker engine for ProTracker MOD and ScreamTracker 3 S3M modules
//!
//! Parses binary module files and a simplified JSON pattern representation,
//! then renders patterns to interleaved 16-bit stereo PCM through a
//! sample-accurate, tick-driven channel mixer.
//!
//! # Features
//! - Note-name / semitone / pitch-ratio utilities
//! - Shared sample store (signed 8-bit PCM, loop points, base note)
//! - MOD (15/31 samples, 4/6/8 channels) and S3M parsers
//! - Module-to-pattern adapters with volume/pan/note-delay resolution
//! - Per-channel playback state machines with linear interpolation
//! - Finite and infinite (cancellable) repeat playback
//!
//! # Crate feature flags
//! - `mod-format` (default): ProTracker parser and adapter
//! - `s3m-format` (default): ScreamTracker 3 parser and adapter
//!
//! # Quick start
//! ## Render a hand-written pattern
//! ```no_run
//! use modmix::{Engine, Pattern, RenderConfig, RenderOptions, SampleOptions, SampleStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(SampleStore::new());
//! let pcm = std::fs::read("piano.raw").unwrap();
//! store.load("piano", &pcm, SampleOptions::default()).unwrap();
//!
//! let pattern = Pattern::from_json(r#"{"sample": "piano", "rows": [["C-4"], ["E-4"], ["G-4"]]}"#).unwrap();
//! let config = RenderConfig::try_from(RenderOptions::rows_per_minute(120.0)).unwrap();
//! let frames = Engine::new(store).render(&pattern, &config).unwrap();
//! ```
//!
//! ## Render a module
//! ```no_run
//! # #[cfg(all(feature = "mod-format", feature = "s3m-format"))]
//! # {
//! use modmix::adapter::ModuleAdapter;
//! use modmix::{module_loader, Engine, Repeat, SampleStore};
//! use std::sync::Arc;
//!
//! let data = std::fs::read("song.s3m").unwrap();
//! let module = module_loader::load_bytes(&data).unwrap();
//! let store = Arc::new(SampleStore::new());
//! let adapter = ModuleAdapter::new("song");
//! adapter.populate_store(&module, &store).unwrap();
//! let pattern = adapter.to_pattern(&module, 0..module.orders().len()).unwrap();
//! let config = module.render_config(Repeat::once()).unwrap();
//! let frames = Engine::new(store).render(&pattern, &config).unwrap();
//! # }
//! ```

#![warn(missing_docs)]

pub mod mixer; // Stereo summing and clipping control
pub mod note; // Note names and pitch ratios
pub mod pattern; // Generic pattern model
pub mod replayer; // Playback Engine
pub mod sample_store; // Sample registry
pub mod streaming; // Output sinks

#[cfg(any(feature = "mod-format", feature = "s3m-format"))]
pub mod adapter; // Module-to-pattern conversion
#[cfg(any(feature = "mod-format", feature = "s3m-format"))]
pub mod module_loader; // Format detection
#[cfg(any(feature = "mod-format", feature = "s3m-format"))]
pub mod module_parser; // MOD / S3M Format Parsing

/// Error types for tracker engine operations
#[derive(thiserror::Error, Debug)]
pub enum ModMixError {
    /// File signature mismatch or a fixed-offset read past the end of the data
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Structurally valid header pointing at malformed or truncated content
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// Note string does not match the `[A-G](#)?-?digit` syntax
    #[error("Invalid note format: {0}")]
    InvalidNoteFormat(String),

    /// Note letter and accidental are not one of the 12 chromatic names
    #[error("Invalid note name: {0}")]
    InvalidNoteName(String),

    /// Pattern references a sample that is not in the store
    #[error("Sample not found: {0}")]
    SampleNotFound(String),

    /// Missing or out-of-range argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error from an output sink
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON pattern document or render options
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Playback worker failure
    #[error("Playback error: {0}")]
    Playback(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for ModMixError {
    /// Converts a String into `ModMixError::Other`.
    ///
    /// Prefer the specific variants (`InvalidFormat`, `CorruptData`, ...) in
    /// library code; this exists for ad-hoc messages only.
    fn from(msg: String) -> Self {
        ModMixError::Other(msg)
    }
}

impl From<&str> for ModMixError {
    /// Converts a string slice into `ModMixError::Other`.
    fn from(msg: &str) -> Self {
        ModMixError::Other(msg.to_string())
    }
}

/// Result type for tracker engine operations
pub type Result<T> = std::result::Result<T, ModMixError>;

// Public API exports
pub use mixer::StereoMixer;
pub use note::{note_to_semitones, semitones_to_pitch_ratio};
pub use pattern::{Pattern, PatternCell, Pitch};
pub use replayer::{
    Engine, PlaybackController, PlaybackHandle, PlaybackState, PlaybackSummary, RenderConfig,
    RenderOptions, Repeat, TempoMode, TickTiming,
};
pub use sample_store::{Sample, SampleOptions, SampleStore};
pub use streaming::{BufferSink, ByteSink, FrameSink, NullSink, RingBuffer, RingBufferSink, StreamConfig};

#[cfg(any(feature = "mod-format", feature = "s3m-format"))]
pub use module_loader::{load_bytes, LoadedModule};
