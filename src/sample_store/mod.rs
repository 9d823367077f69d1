//! Sample registry
//!
//! Maps a name to decoded signed 8-bit PCM plus its pitch and loop metadata.
//! The store is shared between playback sessions as `Arc<SampleStore>`; every
//! entry is handed out as an `Arc<Sample>` and never mutated after insertion.
//! Loading takes the write lock, rendering only ever reads.

use crate::note;
use crate::{ModMixError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Loop lengths at or below this value mean "no loop" (tracker convention)
pub const MIN_LOOP_LENGTH: usize = 2;

/// Default base note for loaded samples
pub const DEFAULT_BASE_NOTE: &str = "C-4";

/// Options accompanying a sample load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SampleOptions {
    /// Note at which the PCM plays back unresampled
    pub base_note: String,
    /// Loop start, in samples
    pub loop_start: usize,
    /// Loop length, in samples (`<= 2` disables the loop)
    pub loop_length: usize,
    /// Rate the PCM was recorded at; `None` plays it at the output rate
    pub sample_rate: Option<u32>,
}

impl SampleOptions {
    /// Options with the given base note and no loop
    pub fn with_base_note(base_note: impl Into<String>) -> Self {
        SampleOptions {
            base_note: base_note.into(),
            ..Self::default()
        }
    }

    /// Set the loop region
    pub fn looped(mut self, loop_start: usize, loop_length: usize) -> Self {
        self.loop_start = loop_start;
        self.loop_length = loop_length;
        self
    }

    /// Set the native sample rate
    pub fn at_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }
}

impl Default for SampleOptions {
    fn default() -> Self {
        SampleOptions {
            base_note: DEFAULT_BASE_NOTE.to_string(),
            loop_start: 0,
            loop_length: 0,
            sample_rate: None,
        }
    }
}

/// One loaded instrument sound
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    name: String,
    pcm: Vec<i8>,
    base_note: String,
    base_semitone: i32,
    loop_start: usize,
    loop_length: usize,
    sample_rate: Option<u32>,
}

impl Sample {
    /// Build a sample from decoded PCM, validating the base note and
    /// clamping the loop region to the data.
    pub fn new(name: impl Into<String>, pcm: Vec<i8>, options: SampleOptions) -> Result<Self> {
        let name = name.into();
        let base_semitone = note::parse_note(&options.base_note)?;

        if options.sample_rate == Some(0) {
            return Err(ModMixError::InvalidArgument(format!(
                "sample '{name}': sample rate must be greater than 0"
            )));
        }

        let mut loop_start = options.loop_start;
        let mut loop_length = options.loop_length;
        if loop_length > MIN_LOOP_LENGTH {
            if loop_start >= pcm.len() {
                log::warn!(
                    "sample '{}': loop start {} beyond data length {}, loop disabled",
                    name,
                    loop_start,
                    pcm.len()
                );
                loop_start = 0;
                loop_length = 0;
            } else if loop_length > pcm.len() - loop_start {
                log::warn!(
                    "sample '{}': loop of {} samples from {} clamped to data length {}",
                    name,
                    loop_length,
                    loop_start,
                    pcm.len()
                );
                loop_length = pcm.len() - loop_start;
            }
        }

        Ok(Sample {
            name,
            pcm,
            base_note: options.base_note,
            base_semitone,
            loop_start,
            loop_length,
            sample_rate: options.sample_rate,
        })
    }

    /// Registry name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signed 8-bit PCM data
    pub fn pcm(&self) -> &[i8] {
        &self.pcm
    }

    /// Number of PCM samples
    pub fn len(&self) -> usize {
        self.pcm.len()
    }

    /// True when the sample holds no PCM data
    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    /// Base note name
    pub fn base_note(&self) -> &str {
        &self.base_note
    }

    /// Absolute semitone index of the base note
    pub fn base_semitone(&self) -> i32 {
        self.base_semitone
    }

    /// Loop start, in samples
    pub fn loop_start(&self) -> usize {
        self.loop_start
    }

    /// Loop length, in samples
    pub fn loop_length(&self) -> usize {
        self.loop_length
    }

    /// Exclusive loop end, in samples
    pub fn loop_end(&self) -> usize {
        self.loop_start + self.loop_length
    }

    /// Whether the loop region is active (`loop_length > 2`)
    pub fn has_loop(&self) -> bool {
        self.loop_length > MIN_LOOP_LENGTH
    }

    /// Native sample rate, if declared
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }
}

/// Name-indexed sample registry
#[derive(Debug, Default)]
pub struct SampleStore {
    samples: RwLock<HashMap<String, Arc<Sample>>>,
}

impl SampleStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load raw signed 8-bit PCM bytes under `name`.
    ///
    /// Re-loading an existing name replaces the previous entry.
    pub fn load(&self, name: &str, pcm_bytes: &[u8], options: SampleOptions) -> Result<Arc<Sample>> {
        let pcm = pcm_bytes.iter().map(|&b| b as i8).collect();
        self.insert(Sample::new(name, pcm, options)?)
    }

    /// Load already-decoded signed PCM under `name`.
    pub fn load_pcm(&self, name: &str, pcm: Vec<i8>, options: SampleOptions) -> Result<Arc<Sample>> {
        self.insert(Sample::new(name, pcm, options)?)
    }

    /// Insert a built sample, replacing any entry with the same name
    pub fn insert(&self, sample: Sample) -> Result<Arc<Sample>> {
        let sample = Arc::new(sample);
        let previous = self
            .samples
            .write()
            .insert(sample.name().to_string(), Arc::clone(&sample));
        log::debug!(
            "{} sample '{}' ({} bytes, base {}, loop {}+{})",
            if previous.is_some() { "replaced" } else { "loaded" },
            sample.name(),
            sample.len(),
            sample.base_note(),
            sample.loop_start(),
            sample.loop_length()
        );
        Ok(sample)
    }

    /// Look up a sample
    pub fn get(&self, name: &str) -> Option<Arc<Sample>> {
        self.samples.read().get(name).cloned()
    }

    /// Look up a sample, failing with `SampleNotFound`
    pub fn require(&self, name: &str) -> Result<Arc<Sample>> {
        self.get(name)
            .ok_or_else(|| ModMixError::SampleNotFound(name.to_string()))
    }

    /// Whether a sample is registered under `name`
    pub fn has(&self, name: &str) -> bool {
        self.samples.read().contains_key(name)
    }

    /// Remove a sample, returning it if present
    pub fn remove(&self, name: &str) -> Option<Arc<Sample>> {
        self.samples.write().remove(name)
    }

    /// Number of registered samples
    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    /// True when no samples are registered
    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.samples.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_get() {
        let store = SampleStore::new();
        store
            .load("kick", &[0x00, 0x7F, 0x80, 0xFF], SampleOptions::default())
            .unwrap();

        assert!(store.has("kick"));
        let sample = store.get("kick").unwrap();
        assert_eq!(sample.pcm(), &[0, 127, -128, -1]);
        assert_eq!(sample.base_note(), "C-4");
        assert_eq!(sample.base_semitone(), 48);
        assert!(store.get("snare").is_none());
    }

    #[test]
    fn test_reload_replaces_entry() {
        let store = SampleStore::new();
        store.load("a", &[1, 2, 3], SampleOptions::default()).unwrap();
        store
            .load("a", &[4, 5], SampleOptions::with_base_note("A-3"))
            .unwrap();

        assert_eq!(store.len(), 1);
        let sample = store.get("a").unwrap();
        assert_eq!(sample.pcm(), &[4, 5]);
        assert_eq!(sample.base_note(), "A-3");
    }

    #[test]
    fn test_loop_detection_boundary() {
        let pcm = vec![0u8; 16];
        let store = SampleStore::new();
        let two = store
            .load("two", &pcm, SampleOptions::default().looped(0, 2))
            .unwrap();
        let three = store
            .load("three", &pcm, SampleOptions::default().looped(0, 3))
            .unwrap();

        assert!(!two.has_loop());
        assert!(three.has_loop());
    }

    #[test]
    fn test_loop_clamped_to_data() {
        let sample = Sample::new("s", vec![0; 10], SampleOptions::default().looped(4, 20)).unwrap();
        assert_eq!(sample.loop_start(), 4);
        assert_eq!(sample.loop_length(), 6);

        let sample = Sample::new("s", vec![0; 10], SampleOptions::default().looped(12, 4)).unwrap();
        assert!(!sample.has_loop());
    }

    #[test]
    fn test_huge_loop_length_clamped() {
        let sample =
            Sample::new("s", vec![1; 10], SampleOptions::default().looped(1, usize::MAX)).unwrap();
        assert_eq!(sample.loop_start(), 1);
        assert_eq!(sample.loop_length(), 9);
        assert_eq!(sample.loop_end(), 10);

        let sample =
            Sample::new("s", vec![1; 10], SampleOptions::default().looped(usize::MAX, usize::MAX))
                .unwrap();
        assert!(!sample.has_loop());
        assert_eq!(sample.loop_end(), 0);
    }

    #[test]
    fn test_invalid_base_note() {
        let store = SampleStore::new();
        let result = store.load("bad", &[0], SampleOptions::with_base_note("X-4"));
        assert!(matches!(result, Err(ModMixError::InvalidNoteFormat(_))));
        assert!(!store.has("bad"));
    }

    #[test]
    fn test_require_missing() {
        let store = SampleStore::new();
        assert!(matches!(
            store.require("ghost"),
            Err(ModMixError::SampleNotFound(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_remove_and_names() {
        let store = SampleStore::new();
        store.load("b", &[0], SampleOptions::default()).unwrap();
        store.load("a", &[0], SampleOptions::default()).unwrap();
        assert_eq!(store.names(), vec!["a".to_string(), "b".to_string()]);

        assert!(store.remove("a").is_some());
        assert!(store.remove("a").is_none());
        assert_eq!(store.len(), 1);
    }
}
