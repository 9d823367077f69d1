//! ScreamTracker 3 cell conversion
//!
//! S3M notes are re-derived through the ST3 period formula, then expressed
//! as a note name relative to C-4 at the instrument's `c4speed`. Samples are
//! registered with base note C-4 at that rate.
//!
//! Volume, pan and instrument carry per channel across the converted range.

use super::{empty_row, patterns_in_order, ModuleAdapter};
use crate::module_parser::effects::Effect;
use crate::module_parser::s3m::{S3mCell, S3mModule, NOTE_CUT};
use crate::module_parser::{ChannelSetting, Instrument};
use crate::note::{self, C4_FREQUENCY, SEMITONES_PER_OCTAVE};
use crate::pattern::{PatternCell, Pitch, MAX_VOLUME};
use crate::sample_store::{SampleOptions, SampleStore};
use crate::{ModMixError, Result};
use std::ops::Range;

/// Note the registered samples are tuned to
pub const S3M_BASE_NOTE: &str = "C-4";

/// ST3 period table for octave 0
const PERIOD_TABLE: [u32; 12] = [
    1712, 1616, 1524, 1440, 1356, 1280, 1208, 1140, 1076, 1016, 960, 907,
];

/// Period-to-frequency constant (14.31818 MHz / 4 * 4)
const PERIOD_CLOCK: f64 = 14_317_456.0;

/// Reference rate the period table is expressed in
const REFERENCE_C4SPEED: f64 = 8363.0;

/// Absolute semitone index of C-4
const C4_INDEX: i32 = 4 * SEMITONES_PER_OCTAVE;

/// Playback frequency in Hz of a note byte for an instrument.
///
/// Returns `None` for semitone nibbles above B or octaves beyond the table.
pub fn note_frequency(octave: u8, semitone: u8, c4speed: u32) -> Option<f64> {
    let base = *PERIOD_TABLE.get(usize::from(semitone))?;
    let shifted = base.checked_shr(u32::from(octave)).filter(|&p| p > 0)?;
    let period = REFERENCE_C4SPEED * 16.0 * f64::from(shifted) / f64::from(c4speed);
    Some(PERIOD_CLOCK / period)
}

/// Pitch of a note relative to the instrument's C-4 rate
pub fn note_pitch(octave: u8, semitone: u8, c4speed: u32) -> Option<Pitch> {
    let frequency = note_frequency(octave, semitone, c4speed)?;
    let offset = note::frequency_to_semitones(frequency * C4_FREQUENCY / f64::from(c4speed));
    Some(match note::note_name(C4_INDEX + offset) {
        Some(name) => Pitch::Name(name),
        None => Pitch::Semitones(offset),
    })
}

pub(super) fn populate_store(
    adapter: &ModuleAdapter,
    module: &S3mModule,
    store: &SampleStore,
) -> Result<usize> {
    let mut registered = 0;
    for (index, instrument) in module.instruments.iter().enumerate() {
        if instrument.is_empty() {
            continue;
        }
        let mut options = SampleOptions::with_base_note(S3M_BASE_NOTE).at_rate(instrument.c4speed);
        if instrument.has_loop() {
            options = options.looped(instrument.loop_start, instrument.loop_length);
        }
        store.load_pcm(&adapter.sample_name(index + 1), instrument.data.clone(), options)?;
        registered += 1;
    }
    Ok(registered)
}

/// What a channel remembers between cells
#[derive(Debug, Clone)]
struct ChannelMemory {
    instrument: Option<u8>,
    volume: Option<u8>,
    pan: u8,
}

impl ChannelMemory {
    fn new(setting: &ChannelSetting) -> Self {
        ChannelMemory {
            instrument: None,
            volume: None,
            pan: setting.pan,
        }
    }
}

/// Position of a cell, for error messages
#[derive(Debug, Clone, Copy)]
struct CellPosition {
    pattern: usize,
    row: usize,
    channel: usize,
}

pub(super) fn convert(
    adapter: &ModuleAdapter,
    module: &S3mModule,
    range: Range<usize>,
) -> Result<Vec<Vec<PatternCell>>> {
    let channels = module.channel_count();
    let mut memory: Vec<ChannelMemory> = module.channels.iter().map(ChannelMemory::new).collect();
    let mut rows = Vec::new();

    for (index, pattern) in patterns_in_order(module, range)? {
        for (row_index, raw_row) in pattern.rows.iter().enumerate() {
            let mut row = empty_row(channels);
            for (channel, cell) in raw_row.iter().enumerate() {
                let enabled = module.channels.get(channel).is_some_and(|s| s.enabled);
                if !enabled || cell.is_empty() {
                    continue;
                }
                let position = CellPosition {
                    pattern: index,
                    row: row_index,
                    channel,
                };
                row[channel] = convert_cell(
                    adapter,
                    &module.instruments,
                    cell,
                    &mut memory[channel],
                    position,
                )?;
            }
            rows.push(row);
        }
    }
    Ok(rows)
}

fn convert_cell(
    adapter: &ModuleAdapter,
    instruments: &[Instrument],
    cell: &S3mCell,
    memory: &mut ChannelMemory,
    position: CellPosition,
) -> Result<PatternCell> {
    let mut effect_volume = None;
    let mut delay = None;
    let mut pan_changed = false;
    match Effect::from_s3m(cell.command, cell.info) {
        Some(Effect::SetVolume(v)) => effect_volume = Some(v.min(MAX_VOLUME)),
        Some(Effect::NoteDelay(d)) if d > 0 => delay = Some(d),
        Some(Effect::SetPanning(pan)) => {
            memory.pan = pan;
            pan_changed = true;
        }
        _ => {}
    }
    let explicit_volume = effect_volume.or(cell.volume.map(|v| v.min(MAX_VOLUME)));

    // A cell without a sample cannot be delayed, so the cut lands on tick 0
    if cell.note == NOTE_CUT {
        if let Some(ticks) = delay {
            log::trace!("note cut delay of {ticks} ticks ignored");
        }
        return Ok(PatternCell {
            volume: Some(0),
            pan: pan_changed.then_some(memory.pan),
            ..PatternCell::empty()
        });
    }

    if cell.has_note() {
        let number = if cell.instrument > 0 {
            Some(cell.instrument)
        } else {
            memory.instrument
        };
        if let Some(number) = number {
            let instrument = instruments
                .get(usize::from(number) - 1)
                .ok_or_else(|| {
                    ModMixError::CorruptData(format!(
                        "pattern {} row {} channel {}: instrument {} beyond {} instruments",
                        position.pattern,
                        position.row,
                        position.channel,
                        number,
                        instruments.len()
                    ))
                })?;
            memory.instrument = Some(number);

            if !instrument.is_empty() {
                let pitch = note_pitch(cell.octave(), cell.semitone(), instrument.c4speed)
                    .ok_or_else(|| {
                        ModMixError::CorruptData(format!(
                            "pattern {} row {} channel {}: invalid note byte {:#04x}",
                            position.pattern, position.row, position.channel, cell.note
                        ))
                    })?;
                let volume = explicit_volume
                    .or(memory.volume)
                    .unwrap_or(instrument.volume.min(MAX_VOLUME));
                memory.volume = Some(volume);

                return Ok(PatternCell {
                    sample: Some(adapter.sample_name(usize::from(number))),
                    note: Some(pitch),
                    volume: Some(volume),
                    pan: Some(memory.pan),
                    delay,
                });
            }
        } else {
            log::trace!(
                "pattern {} row {} channel {}: note without instrument ignored",
                position.pattern,
                position.row,
                position.channel
            );
        }
    }

    if explicit_volume.is_some() {
        memory.volume = explicit_volume;
    }
    Ok(PatternCell {
        volume: explicit_volume,
        pan: pan_changed.then_some(memory.pan),
        ..PatternCell::empty()
    })
}
