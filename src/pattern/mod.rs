//! Generic pattern model
//!
//! A [`Pattern`] is a fixed grid of rows by channel slots. Each slot holds a
//! [`PatternCell`]; a cell with every field absent is the "no event" encoding.
//! Patterns can be built in code, produced by the module adapters, or read
//! from a small JSON document:
//!
//! ```json
//! {
//!   "sample": "steinway",
//!   "rows": [
//!     ["C-4", null, {"sample": "kick", "volume": 48}],
//!     [],
//!     [{"note": "E-4", "delay": 3, "pan": 200}]
//!   ]
//! }
//! ```
//!
//! A bare string is a note name for the document's default sample; a bare
//! integer is a semitone offset from that sample's base note.

use crate::{ModMixError, Result};
use serde::{Deserialize, Serialize};

/// Minimum channel count (Amiga-style four voices)
pub const MIN_CHANNELS: usize = 4;

/// Maximum cell volume
pub const MAX_VOLUME: u8 = 64;

/// Centre pan position
pub const PAN_CENTER: u8 = 128;

/// Pitch of a note event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Pitch {
    /// Tracker note name such as `C-4` or `F#3`
    Name(String),
    /// Signed semitone offset from the sample's base note
    Semitones(i32),
}

impl From<&str> for Pitch {
    fn from(name: &str) -> Self {
        Pitch::Name(name.to_string())
    }
}

impl From<i32> for Pitch {
    fn from(semitones: i32) -> Self {
        Pitch::Semitones(semitones)
    }
}

/// One event slot at a (row, channel) position
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternCell {
    /// Sample to trigger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
    /// Pitch to play the sample at; the base note when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<Pitch>,
    /// Channel volume, 0-64
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
    /// Channel pan, 0 (left) - 255 (right)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan: Option<u8>,
    /// Ticks to wait before triggering the note
    #[serde(default, alias = "delayTicks", skip_serializing_if = "Option::is_none")]
    pub delay: Option<u8>,
}

impl PatternCell {
    /// Cell with no event
    pub fn empty() -> Self {
        Self::default()
    }

    /// Cell triggering `sample` at `note`
    pub fn note(sample: impl Into<String>, note: impl Into<Pitch>) -> Self {
        PatternCell {
            sample: Some(sample.into()),
            note: Some(note.into()),
            ..Self::default()
        }
    }

    /// Set the volume
    pub fn with_volume(mut self, volume: u8) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Set the pan
    pub fn with_pan(mut self, pan: u8) -> Self {
        self.pan = Some(pan);
        self
    }

    /// Set the note delay
    pub fn with_delay(mut self, ticks: u8) -> Self {
        self.delay = Some(ticks);
        self
    }

    /// True when the cell carries no event
    pub fn is_empty(&self) -> bool {
        self.sample.is_none()
            && self.note.is_none()
            && self.volume.is_none()
            && self.pan.is_none()
            && self.delay.is_none()
    }
}

/// Rows of channel slots, fixed in size once constructed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    rows: Vec<Vec<PatternCell>>,
    channels: usize,
}

impl Pattern {
    /// Build a pattern; the channel count is the widest row, at least 4.
    ///
    /// Short rows are padded with empty cells.
    pub fn new(rows: Vec<Vec<PatternCell>>) -> Self {
        Self::with_channels(rows, MIN_CHANNELS)
    }

    /// Build a pattern with at least `channels` channel slots.
    pub fn with_channels(mut rows: Vec<Vec<PatternCell>>, channels: usize) -> Self {
        let widest = rows.iter().map(Vec::len).max().unwrap_or(0);
        let channels = widest.max(channels).max(MIN_CHANNELS);
        for row in &mut rows {
            row.resize(channels, PatternCell::empty());
        }
        Pattern { rows, channels }
    }

    /// Pattern of `rows` empty rows
    pub fn silent(rows: usize) -> Self {
        Self::new(vec![Vec::new(); rows])
    }

    /// Parse a JSON pattern document
    pub fn from_json(json: &str) -> Result<Self> {
        let document: PatternDocument = serde_json::from_str(json)?;
        document.into_pattern()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the pattern has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of channel slots per row
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// All rows
    pub fn rows(&self) -> &[Vec<PatternCell>] {
        &self.rows
    }

    /// Cell at (row, channel)
    pub fn cell(&self, row: usize, channel: usize) -> Option<&PatternCell> {
        self.rows.get(row).and_then(|r| r.get(channel))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PatternDocument {
    #[serde(default)]
    sample: Option<String>,
    #[serde(default)]
    channels: Option<usize>,
    rows: Vec<Vec<Option<CellEntry>>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CellEntry {
    Name(String),
    Offset(i32),
    Event(PatternCell),
}

impl PatternDocument {
    fn into_pattern(self) -> Result<Pattern> {
        let default_sample = self.sample;
        let mut rows = Vec::with_capacity(self.rows.len());

        for (row_idx, row) in self.rows.into_iter().enumerate() {
            let mut cells = Vec::with_capacity(row.len());
            for (channel, entry) in row.into_iter().enumerate() {
                let cell = match entry {
                    None => PatternCell::empty(),
                    Some(CellEntry::Event(mut cell)) => {
                        if cell.sample.is_none() && cell.note.is_some() {
                            cell.sample = default_sample.clone();
                        }
                        cell
                    }
                    Some(CellEntry::Name(name)) => {
                        let sample = Self::shorthand_sample(&default_sample, row_idx, channel)?;
                        PatternCell::note(sample, Pitch::Name(name))
                    }
                    Some(CellEntry::Offset(semitones)) => {
                        let sample = Self::shorthand_sample(&default_sample, row_idx, channel)?;
                        PatternCell::note(sample, Pitch::Semitones(semitones))
                    }
                };
                cells.push(cell);
            }
            rows.push(cells);
        }

        Ok(Pattern::with_channels(rows, self.channels.unwrap_or(MIN_CHANNELS)))
    }

    fn shorthand_sample(default: &Option<String>, row: usize, channel: usize) -> Result<String> {
        default.clone().ok_or_else(|| {
            ModMixError::InvalidArgument(format!(
                "row {row}, channel {channel}: note shorthand requires a default \"sample\""
            ))
        })
    }
}
