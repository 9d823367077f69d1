//! ProTracker cell conversion
//!
//! Periods map to note names through the finetune-0 period table (C-1 to
//! B-3). Samples are registered at their finetuned C-2 rate with base note
//! C-2, so a converted note plays at the pitch the period asked for.

use super::{empty_row, patterns_in_order, ModuleAdapter};
use crate::module_parser::effects::Effect;
use crate::module_parser::protracker::{ModCell, ProTrackerModule};
use crate::module_parser::Instrument;
use crate::note;
use crate::pattern::{PatternCell, Pitch, MAX_VOLUME};
use crate::sample_store::{SampleOptions, SampleStore};
use crate::Result;
use std::ops::Range;

/// Note the registered samples are tuned to
pub const MOD_BASE_NOTE: &str = "C-2";

/// Octave of the first period table entry
const FIRST_OCTAVE: i32 = 1;

/// Finetune-0 Amiga periods, C-1 to B-3
const PERIOD_TABLE: [u16; 36] = [
    856, 808, 762, 720, 678, 640, 604, 570, 538, 508, 480, 453, // octave 1
    428, 404, 381, 360, 339, 320, 302, 285, 269, 254, 240, 226, // octave 2
    214, 202, 190, 180, 170, 160, 151, 143, 135, 127, 120, 113, // octave 3
];

/// Note name for an Amiga period.
///
/// Periods missing from the table (finetuned or out-of-range values) snap
/// to the nearest entry.
pub fn period_to_note(period: u16) -> Option<String> {
    let index = match PERIOD_TABLE.iter().position(|&p| p == period) {
        Some(index) => index,
        None => {
            let (index, nearest) = PERIOD_TABLE
                .iter()
                .enumerate()
                .min_by_key(|&(_, p)| p.abs_diff(period))?;
            log::warn!("period {period} not in table, using nearest {nearest}");
            index
        }
    };
    note::note_name(FIRST_OCTAVE * note::SEMITONES_PER_OCTAVE + index as i32)
}

pub(super) fn populate_store(
    adapter: &ModuleAdapter,
    module: &ProTrackerModule,
    store: &SampleStore,
) -> Result<usize> {
    let mut registered = 0;
    for (index, instrument) in module.instruments.iter().enumerate() {
        if instrument.is_empty() {
            continue;
        }
        let mut options = SampleOptions::with_base_note(MOD_BASE_NOTE).at_rate(instrument.c4speed);
        if instrument.has_loop() {
            options = options.looped(instrument.loop_start, instrument.loop_length);
        }
        store.load_pcm(&adapter.sample_name(index + 1), instrument.data.clone(), options)?;
        registered += 1;
    }
    Ok(registered)
}

pub(super) fn convert(
    adapter: &ModuleAdapter,
    module: &ProTrackerModule,
    range: Range<usize>,
) -> Result<Vec<Vec<PatternCell>>> {
    let channels = module.channel_count();
    let mut rows = Vec::new();

    for (_, pattern) in patterns_in_order(module, range)? {
        for raw_row in &pattern.rows {
            let mut row = empty_row(channels);
            for (channel, (cell, setting)) in raw_row.iter().zip(&module.channels).enumerate() {
                if setting.enabled {
                    row[channel] = convert_cell(adapter, &module.instruments, cell, setting.pan);
                }
            }
            rows.push(row);
        }
    }
    Ok(rows)
}

fn convert_cell(
    adapter: &ModuleAdapter,
    instruments: &[Instrument],
    cell: &ModCell,
    pan: u8,
) -> PatternCell {
    let mut volume = None;
    let mut delay = None;
    match cell.effect() {
        Some(Effect::SetVolume(v)) => volume = Some(v.min(MAX_VOLUME)),
        Some(Effect::NoteDelay(d)) if d > 0 => delay = Some(d),
        _ => {}
    }

    let instrument = usize::from(cell.sample)
        .checked_sub(1)
        .and_then(|index| instruments.get(index))
        .filter(|instrument| !instrument.is_empty());

    let note = if cell.period == 0 {
        None
    } else {
        period_to_note(cell.period)
    };

    match (instrument, note) {
        (Some(instrument), Some(note)) => PatternCell {
            sample: Some(adapter.sample_name(usize::from(cell.sample))),
            note: Some(Pitch::Name(note)),
            volume: Some(volume.unwrap_or(instrument.volume.min(MAX_VOLUME))),
            pan: Some(pan),
            delay,
        },
        _ => PatternCell {
            volume,
            ..PatternCell::empty()
        },
    }
}
