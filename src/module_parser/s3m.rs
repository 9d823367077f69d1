//! ScreamTracker 3 (S3M) parser
//!
//! Layout (all multi-byte fields little-endian):
//! - 0x00: title (28 bytes), 0x20: order/instrument/pattern counts, flags,
//!   tracker version, sample format (`ffi`), 0x2C: `SCRM`
//! - 0x30: global volume, initial speed, initial tempo, master volume,
//!   ultraclick, default-pan marker
//! - 0x40: 32 channel settings, 0x60: orders, then instrument and pattern
//!   parapointers (offset = pointer x 16), then an optional pan table
//! - Instrument records are 80 bytes, sample PCM lives at `memseg x 16`
//! - Patterns are RLE-packed rows behind a 2-byte length prefix

use super::{
    parse_at, parse_string, slice_at, ChannelSetting, FormatParser, Instrument, Module,
    ModuleFormat, RawPattern, DEFAULT_SPEED, DEFAULT_TEMPO, ROWS_PER_PATTERN, S3M_SIGNATURE,
    S3M_SIGNATURE_OFFSET,
};
use crate::{ModMixError, Result};
use bitflags::bitflags;
use nom::bytes::complete::take;
use nom::multi::count;
use nom::number::complete::{le_u16, le_u32, u8 as byte};
use nom::IResult;

/// Parsed S3M module
pub type S3mModule = Module<S3mCell>;

/// Number of channel slots in an S3M file
pub const S3M_CHANNELS: usize = 32;

/// Note byte meaning "no note"
pub const NOTE_EMPTY: u8 = 255;

/// Note byte meaning "note cut"
pub const NOTE_CUT: u8 = 254;

/// Order entry marking a skippable separator
pub const ORDER_MARKER: u8 = 254;

/// Order entry marking the end of the song
pub const ORDER_END: u8 = 255;

/// Reference rate assumed for instruments with a zero `c4speed`
pub const DEFAULT_C4SPEED: u32 = 8363;

bitflags! {
    /// Which sub-fields follow a packed-row lead byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PackFlags: u8 {
        /// Note byte and instrument byte follow
        const NOTE_INSTRUMENT = 0x20;
        /// Volume byte follows
        const VOLUME = 0x40;
        /// Command byte and info byte follow
        const COMMAND = 0x80;
    }
}

bitflags! {
    /// Instrument sample flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SampleFlags: u8 {
        /// Loop region is active
        const LOOP = 0x01;
        /// Stereo sample (left block, then right block)
        const STEREO = 0x02;
        /// 16-bit little-endian samples
        const SIXTEEN_BIT = 0x04;
    }
}

/// One unpacked S3M pattern cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct S3mCell {
    /// `octave << 4 | semitone`, [`NOTE_EMPTY`] or [`NOTE_CUT`]
    pub note: u8,
    /// Instrument number, 1-based (0 = none)
    pub instrument: u8,
    /// Volume column, 0-64
    pub volume: Option<u8>,
    /// Effect command (1 = `A`, 0 = none)
    pub command: u8,
    /// Effect parameter
    pub info: u8,
}

impl Default for S3mCell {
    fn default() -> Self {
        S3mCell {
            note: NOTE_EMPTY,
            instrument: 0,
            volume: None,
            command: 0,
            info: 0,
        }
    }
}

impl S3mCell {
    /// True for the "no event" encoding
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether the cell carries a playable note
    pub fn has_note(&self) -> bool {
        self.note != NOTE_EMPTY && self.note != NOTE_CUT
    }

    /// Octave (upper nibble of the note byte)
    pub fn octave(&self) -> u8 {
        self.note >> 4
    }

    /// Semitone within the octave (lower nibble of the note byte)
    pub fn semitone(&self) -> u8 {
        self.note & 0x0F
    }
}

#[derive(Debug, Clone)]
struct Header {
    title: String,
    order_count: usize,
    instrument_count: usize,
    pattern_count: usize,
    sample_format: u16,
    global_volume: u8,
    initial_speed: u8,
    initial_tempo: u8,
    default_pan: u8,
    channel_settings: Vec<u8>,
}

#[derive(Debug, Clone)]
struct InstrumentRecord {
    kind: u8,
    filename: String,
    memseg: usize,
    length: usize,
    loop_begin: usize,
    loop_end: usize,
    volume: u8,
    pack: u8,
    flags: SampleFlags,
    c4speed: u32,
    name: String,
    signature: [u8; 4],
}

/// Bounded reader over packed pattern bytes
struct PackedReader<'a> {
    data: &'a [u8],
    pos: usize,
    pattern: usize,
}

impl PackedReader<'_> {
    fn next(&mut self) -> Result<u8> {
        let value = self.data.get(self.pos).copied().ok_or_else(|| {
            ModMixError::CorruptData(format!(
                "pattern {}: packed data truncated at byte {}",
                self.pattern, self.pos
            ))
        })?;
        self.pos += 1;
        Ok(value)
    }
}

/// ScreamTracker 3 module parser
pub struct S3mParser;

impl S3mParser {
    const INSTRUMENT_SIGNATURE: &'static [u8; 4] = b"SCRS";
    const ORDER_OFFSET: usize = 0x60;
    const PARAPOINTER_SCALE: usize = 16;
    const DEFAULT_PAN_MARKER: u8 = 252;
    const SAMPLE_KIND_PCM: u8 = 1;
    const SIGNED_SAMPLES: u16 = 1;

    /// Whether the data carries the `SCRM` signature
    pub fn has_signature(data: &[u8]) -> bool {
        data.get(S3M_SIGNATURE_OFFSET..S3M_SIGNATURE_OFFSET + 4) == Some(&S3M_SIGNATURE[..])
    }

    fn header(input: &[u8]) -> IResult<&[u8], Header> {
        let (input, title) = take(28usize)(input)?;
        let (input, _) = take(4usize)(input)?;
        let (input, order_count) = le_u16(input)?;
        let (input, instrument_count) = le_u16(input)?;
        let (input, pattern_count) = le_u16(input)?;
        let (input, _flags) = le_u16(input)?;
        let (input, _tracker_version) = le_u16(input)?;
        let (input, sample_format) = le_u16(input)?;
        let (input, _signature) = take(4usize)(input)?;
        let (input, global_volume) = byte(input)?;
        let (input, initial_speed) = byte(input)?;
        let (input, initial_tempo) = byte(input)?;
        let (input, _master_volume) = byte(input)?;
        let (input, _ultra_click) = byte(input)?;
        let (input, default_pan) = byte(input)?;
        let (input, _reserved) = take(8usize)(input)?;
        let (input, _special) = le_u16(input)?;
        let (input, channel_settings) = take(S3M_CHANNELS)(input)?;

        Ok((
            input,
            Header {
                title: parse_string(title),
                order_count: usize::from(order_count),
                instrument_count: usize::from(instrument_count),
                pattern_count: usize::from(pattern_count),
                sample_format,
                global_volume,
                initial_speed,
                initial_tempo,
                default_pan,
                channel_settings: channel_settings.to_vec(),
            },
        ))
    }

    fn instrument_record(input: &[u8]) -> IResult<&[u8], InstrumentRecord> {
        let (input, kind) = byte(input)?;
        let (input, filename) = take(12usize)(input)?;
        let (input, memseg_hi) = byte(input)?;
        let (input, memseg_lo) = le_u16(input)?;
        let (input, length) = le_u32(input)?;
        let (input, loop_begin) = le_u32(input)?;
        let (input, loop_end) = le_u32(input)?;
        let (input, volume) = byte(input)?;
        let (input, _reserved) = byte(input)?;
        let (input, pack) = byte(input)?;
        let (input, flags) = byte(input)?;
        let (input, c4speed) = le_u32(input)?;
        let (input, _internal) = take(12usize)(input)?;
        let (input, name) = take(28usize)(input)?;
        let (input, signature) = take(4usize)(input)?;

        let mut sig = [0u8; 4];
        sig.copy_from_slice(signature);
        Ok((
            input,
            InstrumentRecord {
                kind,
                filename: parse_string(filename),
                memseg: (usize::from(memseg_hi) << 16) | usize::from(memseg_lo),
                length: length as usize,
                loop_begin: loop_begin as usize,
                loop_end: loop_end as usize,
                volume,
                pack,
                flags: SampleFlags::from_bits_truncate(flags),
                c4speed,
                name: parse_string(name),
                signature: sig,
            },
        ))
    }

    /// Pan from a channel-setting byte: 0-7 left, 8-15 right, others centre
    fn channel_pan(setting: u8) -> u8 {
        match setting & 0x7F {
            0..=7 => 0,
            8..=15 => 255,
            _ => 128,
        }
    }

    fn parse_instrument(
        data: &[u8],
        index: usize,
        pointer: u16,
        sample_format: u16,
    ) -> Result<Instrument> {
        if pointer == 0 {
            return Ok(Instrument::default());
        }
        let offset = usize::from(pointer) * Self::PARAPOINTER_SCALE;
        let what = format!("instrument {}", index + 1);
        let record = parse_at(
            data,
            offset,
            &what,
            ModMixError::CorruptData,
            Self::instrument_record,
        )?;

        if record.kind != Self::SAMPLE_KIND_PCM {
            return Ok(Instrument {
                name: record.name,
                filename: record.filename,
                ..Instrument::default()
            });
        }
        if &record.signature != Self::INSTRUMENT_SIGNATURE {
            return Err(ModMixError::CorruptData(format!(
                "{what}: missing SCRS signature"
            )));
        }
        if record.pack != 0 {
            return Err(ModMixError::CorruptData(format!(
                "{what}: packed sample data (pack = {}) is not supported",
                record.pack
            )));
        }

        let sixteen_bit = record.flags.contains(SampleFlags::SIXTEEN_BIT);
        let width = if sixteen_bit { 2 } else { 1 };
        let bytes = slice_at(
            data,
            record.memseg * Self::PARAPOINTER_SCALE,
            record.length * width,
            &format!("{what} sample data"),
            ModMixError::CorruptData,
        )?;

        // Stereo data stores the left block first; only that block is kept.
        let signed = sample_format == Self::SIGNED_SAMPLES;
        let pcm = bytes
            .chunks_exact(width)
            .map(|frame| {
                let raw = frame[width - 1];
                if signed {
                    raw as i8
                } else {
                    raw.wrapping_sub(128) as i8
                }
            })
            .collect();

        let (loop_start, loop_length) =
            if record.flags.contains(SampleFlags::LOOP) && record.loop_end > record.loop_begin {
                (record.loop_begin, record.loop_end - record.loop_begin)
            } else {
                (0, 0)
            };

        Ok(Instrument {
            name: record.name,
            filename: record.filename,
            volume: record.volume.min(64),
            finetune: 0,
            c4speed: if record.c4speed == 0 {
                DEFAULT_C4SPEED
            } else {
                record.c4speed
            },
            loop_start,
            loop_length,
            data: pcm,
        })
    }

    fn parse_pattern(
        data: &[u8],
        index: usize,
        pointer: u16,
        channels: &[ChannelSetting],
    ) -> Result<RawPattern<S3mCell>> {
        let mut pattern = RawPattern::empty(S3M_CHANNELS);
        if pointer == 0 {
            return Ok(pattern);
        }

        // Skip the 2-byte packed length; rows are self-terminating.
        let offset = usize::from(pointer) * Self::PARAPOINTER_SCALE + 2;
        let body = data.get(offset..).ok_or_else(|| {
            ModMixError::CorruptData(format!(
                "pattern {index} at offset {offset} lies beyond end of data"
            ))
        })?;
        let mut reader = PackedReader {
            data: body,
            pos: 0,
            pattern: index,
        };

        for row in pattern.rows.iter_mut().take(ROWS_PER_PATTERN) {
            loop {
                let lead = reader.next()?;
                if lead == 0 {
                    break;
                }
                let flags = PackFlags::from_bits_truncate(lead);
                let mut cell = S3mCell::default();
                if flags.contains(PackFlags::NOTE_INSTRUMENT) {
                    cell.note = reader.next()?;
                    cell.instrument = reader.next()?;
                }
                if flags.contains(PackFlags::VOLUME) {
                    cell.volume = Some(reader.next()?);
                }
                if flags.contains(PackFlags::COMMAND) {
                    cell.command = reader.next()?;
                    cell.info = reader.next()?;
                }

                let channel = usize::from(lead & 0x1F);
                if channels[channel].enabled {
                    row[channel] = cell;
                }
            }
        }
        Ok(pattern)
    }
}

impl FormatParser for S3mParser {
    type Output = S3mModule;

    fn parse(&self, data: &[u8]) -> Result<S3mModule> {
        if !Self::has_signature(data) {
            return Err(ModMixError::InvalidFormat(
                "missing SCRM signature at offset 44".to_string(),
            ));
        }
        let header = parse_at(data, 0, "S3M header", ModMixError::InvalidFormat, Self::header)?;

        let orders = slice_at(
            data,
            Self::ORDER_OFFSET,
            header.order_count,
            "order list",
            ModMixError::InvalidFormat,
        )?
        .to_vec();

        let instrument_table = Self::ORDER_OFFSET + header.order_count;
        let instrument_pointers = parse_at(
            data,
            instrument_table,
            "instrument pointers",
            ModMixError::InvalidFormat,
            count(le_u16, header.instrument_count),
        )?;
        let pattern_table = instrument_table + header.instrument_count * 2;
        let pattern_pointers = parse_at(
            data,
            pattern_table,
            "pattern pointers",
            ModMixError::InvalidFormat,
            count(le_u16, header.pattern_count),
        )?;

        let mut channels: Vec<ChannelSetting> = header
            .channel_settings
            .iter()
            .map(|&setting| ChannelSetting {
                enabled: setting < 128,
                pan: Self::channel_pan(setting),
            })
            .collect();

        if header.default_pan == Self::DEFAULT_PAN_MARKER {
            let pan_table = pattern_table + header.pattern_count * 2;
            let pans = slice_at(
                data,
                pan_table,
                S3M_CHANNELS,
                "default pan table",
                ModMixError::InvalidFormat,
            )?;
            for (channel, &pan) in channels.iter_mut().zip(pans) {
                if pan & 0x20 != 0 {
                    channel.pan = (pan & 0x0F) * 17;
                }
            }
        }

        let instruments = instrument_pointers
            .iter()
            .enumerate()
            .map(|(i, &pointer)| Self::parse_instrument(data, i, pointer, header.sample_format))
            .collect::<Result<Vec<_>>>()?;

        let patterns = pattern_pointers
            .iter()
            .enumerate()
            .map(|(i, &pointer)| Self::parse_pattern(data, i, pointer, &channels))
            .collect::<Result<Vec<_>>>()?;

        let initial_speed = match header.initial_speed {
            0 => DEFAULT_SPEED,
            speed => speed,
        };
        let initial_tempo = match header.initial_tempo {
            0 => DEFAULT_TEMPO,
            tempo => tempo,
        };

        log::debug!(
            "parsed S3M module '{}': {} instruments, {} patterns, {} orders, speed {}, tempo {}",
            header.title,
            instruments.len(),
            patterns.len(),
            orders.len(),
            initial_speed,
            initial_tempo
        );

        Ok(Module {
            format: ModuleFormat::S3m,
            title: header.title,
            initial_speed,
            initial_tempo,
            global_volume: header.global_volume.min(64),
            channels,
            instruments,
            orders,
            patterns,
        })
    }

    fn name(&self) -> &str {
        "ScreamTracker 3"
    }
}
