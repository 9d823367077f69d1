//! ProTracker MOD parser
//!
//! Layout (all multi-byte fields big-endian):
//! - Title: 20 bytes
//! - Sample headers: 15 or 31 x 30 bytes (name, length in words, finetune,
//!   volume, loop start in words, loop length in words)
//! - Song length (1 byte), restart byte, 128-byte order table
//! - Format tag at 1080 (31-sample layout only): `M.K.`, `4CHN`, `6CHN`, ...
//! - Patterns: 64 rows x channels x 4-byte cells
//! - Sample PCM: signed 8-bit, contiguous, in sample order
//!
//! Speed and tempo are not stored in the header; they are discovered from
//! the first `Fxx` effect within the first three patterns in play order.

use super::{
    mod_tag_channels, parse_at, parse_string, slice_at, ChannelSetting, Effect, FormatParser,
    Instrument, Module, ModuleFormat, RawPattern, DEFAULT_SPEED, DEFAULT_TEMPO, MOD_TAG_OFFSET,
    ROWS_PER_PATTERN,
};
use crate::{ModMixError, Result};
use nom::bytes::complete::take;
use nom::number::complete::{be_u16, u8 as byte};
use nom::IResult;

/// Parsed ProTracker module
pub type ProTrackerModule = Module<ModCell>;

/// Amiga PAL clock divided by two (period -> Hz numerator)
pub const AMIGA_PAL_CLOCK: f64 = 3_546_895.0;

/// Period of C-2, the note at which instrument rates are referenced
pub const C2_PERIOD: u16 = 428;

/// Instrument slots after padding
pub const SAMPLE_SLOTS: usize = 31;

/// One 4-byte MOD pattern cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModCell {
    /// Sample number, 1-based (0 = none)
    pub sample: u8,
    /// Amiga period, 12 bits (0 = no note)
    pub period: u16,
    /// Effect command nibble
    pub effect: u8,
    /// Effect parameter
    pub param: u8,
}

impl ModCell {
    /// Decode the packed cell bytes
    pub fn from_bytes(data: [u8; 4]) -> Self {
        ModCell {
            sample: (data[0] & 0xF0) | (data[2] >> 4),
            period: (u16::from(data[0] & 0x0F) << 8) | u16::from(data[1]),
            effect: data[2] & 0x0F,
            param: data[3],
        }
    }

    /// Decoded effect, if any
    pub fn effect(&self) -> Option<Effect> {
        Effect::from_protracker(self.effect, self.param)
    }

    /// Does this cell do nothing?
    pub fn is_empty(&self) -> bool {
        self.sample == 0 && self.period == 0 && self.effect == 0 && self.param == 0
    }
}

/// Hard pan for a physical channel: 0 and 3 left, 1 and 2 right (repeating)
pub fn amiga_pan(channel: usize) -> u8 {
    match channel % 4 {
        0 | 3 => 0,
        _ => 255,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    format: ModuleFormat,
    sample_count: usize,
    channels: usize,
    song_length_offset: usize,
    pattern_offset: usize,
}

#[derive(Debug, Clone)]
struct SampleHeader {
    name: String,
    length: usize,
    finetune: i8,
    volume: u8,
    loop_start: usize,
    loop_length: usize,
}

/// ProTracker / Soundtracker module parser
pub struct ProTrackerParser;

impl ProTrackerParser {
    const TITLE_LEN: usize = 20;
    const SAMPLE_HEADER_OFFSET: usize = 20;
    const SAMPLE_HEADER_LEN: usize = 30;
    const ORDER_TABLE_LEN: usize = 128;
    const CELL_LEN: usize = 4;
    /// Patterns scanned (in play order) for the initial speed/tempo
    const TIMING_SCAN_PATTERNS: usize = 3;

    /// Whether the data carries a recognised 31-sample tag
    pub fn has_tag(data: &[u8]) -> bool {
        data.get(MOD_TAG_OFFSET..MOD_TAG_OFFSET + 4)
            .and_then(mod_tag_channels)
            .is_some()
    }

    fn detect_layout(data: &[u8]) -> Layout {
        let tagged = data
            .get(MOD_TAG_OFFSET..MOD_TAG_OFFSET + 4)
            .and_then(|tag| mod_tag_channels(tag).map(|channels| (tag, channels)));

        match tagged {
            Some((tag, channels)) => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(tag);
                Layout {
                    format: ModuleFormat::ProTracker(raw),
                    sample_count: 31,
                    channels,
                    song_length_offset: 950,
                    pattern_offset: 1084,
                }
            }
            None => Layout {
                format: ModuleFormat::Soundtracker15,
                sample_count: 15,
                channels: 4,
                song_length_offset: 470,
                pattern_offset: 600,
            },
        }
    }

    fn sample_header(input: &[u8]) -> IResult<&[u8], SampleHeader> {
        let (input, name) = take(22usize)(input)?;
        let (input, length_words) = be_u16(input)?;
        let (input, finetune) = byte(input)?;
        let (input, volume) = byte(input)?;
        let (input, loop_start_words) = be_u16(input)?;
        let (input, loop_length_words) = be_u16(input)?;

        let finetune = (finetune & 0x0F) as i8;
        Ok((
            input,
            SampleHeader {
                name: parse_string(name),
                length: usize::from(length_words) * 2,
                finetune: if finetune > 7 { finetune - 16 } else { finetune },
                volume: volume.min(64),
                loop_start: usize::from(loop_start_words) * 2,
                loop_length: usize::from(loop_length_words) * 2,
            },
        ))
    }

    fn parse_pattern(bytes: &[u8], channels: usize) -> RawPattern<ModCell> {
        let rows = bytes
            .chunks_exact(channels * Self::CELL_LEN)
            .map(|row| {
                row.chunks_exact(Self::CELL_LEN)
                    .map(|cell| ModCell::from_bytes([cell[0], cell[1], cell[2], cell[3]]))
                    .collect()
            })
            .collect();
        RawPattern { rows }
    }

    /// Reference playback rate for a finetune value
    pub fn reference_rate(finetune: i8) -> u32 {
        let rate = AMIGA_PAL_CLOCK / f64::from(C2_PERIOD);
        (rate * 2f64.powf(f64::from(finetune) / 96.0)).round() as u32
    }

    fn discover_timing(orders: &[u8], patterns: &[RawPattern<ModCell>]) -> (u8, u8) {
        let scanned = orders
            .iter()
            .take(Self::TIMING_SCAN_PATTERNS)
            .filter_map(|&order| patterns.get(usize::from(order)));

        for pattern in scanned {
            for cell in pattern.rows.iter().flatten() {
                match cell.effect() {
                    Some(Effect::SetSpeed(speed)) => return (speed, DEFAULT_TEMPO),
                    Some(Effect::SetTempo(tempo)) => return (DEFAULT_SPEED, tempo),
                    _ => {}
                }
            }
        }
        (DEFAULT_SPEED, DEFAULT_TEMPO)
    }
}

impl FormatParser for ProTrackerParser {
    type Output = ProTrackerModule;

    fn parse(&self, data: &[u8]) -> Result<ProTrackerModule> {
        let layout = Self::detect_layout(data);
        let header_len = layout.pattern_offset;
        if data.len() < header_len {
            return Err(ModMixError::InvalidFormat(format!(
                "MOD file too small for {}-sample header ({} < {} bytes)",
                layout.sample_count,
                data.len(),
                header_len
            )));
        }

        let title = parse_string(&data[..Self::TITLE_LEN]);

        let mut headers = Vec::with_capacity(layout.sample_count);
        for i in 0..layout.sample_count {
            let offset = Self::SAMPLE_HEADER_OFFSET + i * Self::SAMPLE_HEADER_LEN;
            let what = format!("sample header {}", i + 1);
            headers.push(parse_at(
                data,
                offset,
                &what,
                ModMixError::InvalidFormat,
                Self::sample_header,
            )?);
        }

        let song_length = usize::from(data[layout.song_length_offset]);
        if song_length == 0 || song_length > Self::ORDER_TABLE_LEN {
            return Err(ModMixError::CorruptData(format!(
                "MOD song length {song_length} outside 1..=128"
            )));
        }
        let order_start = layout.song_length_offset + 2;
        let order_table = &data[order_start..order_start + Self::ORDER_TABLE_LEN];
        let orders = order_table[..song_length].to_vec();
        let pattern_count = usize::from(order_table.iter().copied().max().unwrap_or(0)) + 1;

        let pattern_len = ROWS_PER_PATTERN * layout.channels * Self::CELL_LEN;
        let mut patterns = Vec::with_capacity(pattern_count);
        for index in 0..pattern_count {
            let offset = layout.pattern_offset + index * pattern_len;
            let what = format!("pattern {index}");
            let bytes = slice_at(data, offset, pattern_len, &what, ModMixError::InvalidFormat)?;
            patterns.push(Self::parse_pattern(bytes, layout.channels));
        }

        let mut offset = layout.pattern_offset + pattern_count * pattern_len;
        let mut instruments = Vec::with_capacity(SAMPLE_SLOTS);
        for (i, header) in headers.into_iter().enumerate() {
            let pcm = if header.length > 0 {
                let what = format!("sample {} data", i + 1);
                let bytes = slice_at(data, offset, header.length, &what, ModMixError::CorruptData)?;
                offset += header.length;
                bytes.iter().map(|&b| b as i8).collect()
            } else {
                Vec::new()
            };

            instruments.push(Instrument {
                name: header.name,
                filename: String::new(),
                volume: header.volume,
                finetune: header.finetune,
                c4speed: Self::reference_rate(header.finetune),
                loop_start: header.loop_start,
                loop_length: header.loop_length,
                data: pcm,
            });
        }
        instruments.resize(SAMPLE_SLOTS, Instrument::default());

        let (initial_speed, initial_tempo) = Self::discover_timing(&orders, &patterns);
        let channels = (0..layout.channels)
            .map(|ch| ChannelSetting {
                enabled: true,
                pan: amiga_pan(ch),
            })
            .collect();

        log::debug!(
            "parsed {:?} module '{}': {} channels, {} patterns, {} orders, speed {}, tempo {}",
            layout.format,
            title,
            layout.channels,
            patterns.len(),
            orders.len(),
            initial_speed,
            initial_tempo
        );

        Ok(Module {
            format: layout.format,
            title,
            initial_speed,
            initial_tempo,
            global_volume: 64,
            channels,
            instruments,
            orders,
            patterns,
        })
    }

    fn name(&self) -> &str {
        "ProTracker MOD"
    }
}
