//! Pattern compilation
//!
//! Resolves every sample reference and pitch of a [`Pattern`] against the
//! store before any audio is produced. Rendering only ever sees the compiled
//! form, so a missing sample or malformed note aborts the whole render up
//! front.

use crate::note;
use crate::pattern::{Pattern, PatternCell, Pitch, MAX_VOLUME};
use crate::sample_store::{Sample, SampleStore};
use crate::{ModMixError, Result};
use std::sync::Arc;

/// A resolved note trigger
#[derive(Debug, Clone)]
pub(crate) struct Trigger {
    pub(crate) sample: Arc<Sample>,
    pub(crate) pitch_ratio: f64,
}

/// One cell with its sample resolved and its pitch as a ratio
#[derive(Debug, Clone, Default)]
pub struct CompiledEvent {
    pub(crate) trigger: Option<Trigger>,
    pub(crate) volume: Option<u8>,
    pub(crate) pan: Option<u8>,
    pub(crate) delay: u8,
}

impl CompiledEvent {
    /// Name of the triggered sample
    pub fn sample_name(&self) -> Option<&str> {
        self.trigger.as_ref().map(|t| t.sample.name())
    }

    /// Playback ratio relative to the sample's base note
    pub fn pitch_ratio(&self) -> Option<f64> {
        self.trigger.as_ref().map(|t| t.pitch_ratio)
    }

    /// Volume update, 0-64
    pub fn volume(&self) -> Option<u8> {
        self.volume
    }

    /// Pan update, 0-255
    pub fn pan(&self) -> Option<u8> {
        self.pan
    }

    /// Ticks before the trigger fires
    pub fn delay(&self) -> u8 {
        self.delay
    }

    /// True when the event changes nothing
    pub fn is_empty(&self) -> bool {
        self.trigger.is_none() && self.volume.is_none() && self.pan.is_none()
    }

    fn compile(cell: &PatternCell, store: &SampleStore, row: usize, channel: usize) -> Result<Self> {
        if let Some(volume) = cell.volume {
            if volume > MAX_VOLUME {
                return Err(ModMixError::InvalidArgument(format!(
                    "row {row}, channel {channel}: volume {volume} exceeds {MAX_VOLUME}"
                )));
            }
        }

        let trigger = match &cell.sample {
            Some(name) => {
                let sample = store.require(name)?;
                let semitones = match &cell.note {
                    None => 0,
                    Some(Pitch::Semitones(offset)) => *offset,
                    Some(Pitch::Name(target)) => note::note_to_semitones(target, sample.base_note())?,
                };
                Some(Trigger {
                    pitch_ratio: note::semitones_to_pitch_ratio(f64::from(semitones)),
                    sample,
                })
            }
            None => {
                if cell.note.is_some() {
                    log::trace!("row {row}, channel {channel}: note without sample ignored");
                }
                None
            }
        };

        Ok(CompiledEvent {
            trigger,
            volume: cell.volume,
            pan: cell.pan,
            delay: cell.delay.unwrap_or(0),
        })
    }
}

/// A pattern whose events are ready to render
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    rows: Vec<Vec<CompiledEvent>>,
    channels: usize,
}

impl CompiledPattern {
    /// Resolve every cell of `pattern` against `store`
    pub fn compile(pattern: &Pattern, store: &SampleStore) -> Result<Self> {
        let rows = pattern
            .rows()
            .iter()
            .enumerate()
            .map(|(row, cells)| {
                cells
                    .iter()
                    .enumerate()
                    .map(|(channel, cell)| CompiledEvent::compile(cell, store, row, channel))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CompiledPattern {
            rows,
            channels: pattern.channels(),
        })
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the pattern has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Channel slots per row
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// All rows
    pub fn rows(&self) -> &[Vec<CompiledEvent>] {
        &self.rows
    }

    /// Event at (row, channel)
    pub fn event(&self, row: usize, channel: usize) -> Option<&CompiledEvent> {
        self.rows.get(row).and_then(|r| r.get(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_store::SampleOptions;
    use approx::assert_relative_eq;

    fn store() -> SampleStore {
        let store = SampleStore::new();
        store
            .load("steinway", &[0; 16], SampleOptions::default())
            .unwrap();
        store
    }

    #[test]
    fn test_pitch_ratios() {
        let pattern = Pattern::new(vec![
            vec![PatternCell::note("steinway", "C-4")],
            vec![PatternCell::note("steinway", "D-4")],
            vec![PatternCell::note("steinway", "E-4")],
            vec![PatternCell::note("steinway", -12)],
        ]);
        let compiled = CompiledPattern::compile(&pattern, &store()).unwrap();

        assert_eq!(compiled.len(), 4);
        assert_eq!(compiled.event(0, 0).unwrap().sample_name(), Some("steinway"));
        assert_eq!(compiled.event(0, 0).unwrap().pitch_ratio(), Some(1.0));
        assert_relative_eq!(
            compiled.event(1, 0).unwrap().pitch_ratio().unwrap(),
            2f64.powf(2.0 / 12.0)
        );
        assert_relative_eq!(
            compiled.event(2, 0).unwrap().pitch_ratio().unwrap(),
            2f64.powf(4.0 / 12.0)
        );
        assert_relative_eq!(compiled.event(3, 0).unwrap().pitch_ratio().unwrap(), 0.5);
        assert!(compiled.event(0, 1).unwrap().is_empty());
    }

    #[test]
    fn test_missing_sample() {
        let pattern = Pattern::new(vec![vec![], vec![PatternCell::note("ghost", "C-4")]]);
        let result = CompiledPattern::compile(&pattern, &store());
        assert!(matches!(result, Err(ModMixError::SampleNotFound(name)) if name == "ghost"));
    }

    #[test]
    fn test_invalid_note_and_volume() {
        let pattern = Pattern::new(vec![vec![PatternCell::note("steinway", "H-4")]]);
        assert!(matches!(
            CompiledPattern::compile(&pattern, &store()),
            Err(ModMixError::InvalidNoteFormat(_))
        ));

        let pattern = Pattern::new(vec![vec![PatternCell::note("steinway", "C-4").with_volume(65)]]);
        assert!(matches!(
            CompiledPattern::compile(&pattern, &store()),
            Err(ModMixError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_volume_only_cell() {
        let cell = PatternCell {
            volume: Some(10),
            pan: Some(0),
            ..PatternCell::default()
        };
        let compiled = CompiledPattern::compile(&Pattern::new(vec![vec![cell]]), &store()).unwrap();
        let event = compiled.event(0, 0).unwrap();
        assert!(event.sample_name().is_none());
        assert_eq!(event.volume(), Some(10));
        assert_eq!(event.pan(), Some(0));
        assert!(!event.is_empty());
    }
}
