//! Module Format Parsing Domain
//!
//! Decodes ProTracker MOD and ScreamTracker 3 S3M files into a shared
//! [`Module`] model: title, timing defaults, channel configuration, the
//! instrument table with decoded PCM, the order list, and the patterns in
//! their raw per-format cell encoding.
//!
//! Parsers are pure functions of the input bytes. Any read outside the data
//! is fatal: `InvalidFormat` for fixed header offsets, `CorruptData` for
//! content reached through pointers or lengths.

pub mod effects;
#[cfg(feature = "mod-format")]
pub mod protracker;
#[cfg(feature = "s3m-format")]
pub mod s3m;

pub use effects::Effect;
#[cfg(feature = "mod-format")]
pub use protracker::{ModCell, ProTrackerModule, ProTrackerParser};
#[cfg(feature = "s3m-format")]
pub use s3m::{S3mCell, S3mModule, S3mParser};

use crate::replayer::{RenderConfig, Repeat, TickTiming};
use crate::{ModMixError, Result};
use nom::IResult;

/// Rows in every MOD and S3M pattern
pub const ROWS_PER_PATTERN: usize = 64;

/// Default ticks per row when a module does not specify one
pub const DEFAULT_SPEED: u8 = 6;

/// Default tempo (BPM) when a module does not specify one
pub const DEFAULT_TEMPO: u8 = 125;

/// Offset of the `SCRM` signature in S3M files
pub const S3M_SIGNATURE_OFFSET: usize = 0x2C;

/// S3M file signature
pub const S3M_SIGNATURE: &[u8; 4] = b"SCRM";

/// Offset of the 31-sample format tag in MOD files
pub const MOD_TAG_OFFSET: usize = 1080;

/// 31-sample MOD format tags with their channel counts
pub const MOD_TAGS: [(&[u8; 4], usize); 7] = [
    (b"M.K.", 4),
    (b"M!K!", 4),
    (b"4CHN", 4),
    (b"FLT4", 4),
    (b"6CHN", 6),
    (b"8CHN", 8),
    (b"FLT8", 8),
];

/// Channel count implied by a MOD format tag, `None` if unrecognised
pub fn mod_tag_channels(tag: &[u8]) -> Option<usize> {
    MOD_TAGS
        .iter()
        .find(|(known, _)| &known[..] == tag)
        .map(|&(_, channels)| channels)
}

/// Trait for module format parsers
pub trait FormatParser {
    /// Parsed module type
    type Output;

    /// Parse a complete module from its file bytes
    fn parse(&self, data: &[u8]) -> Result<Self::Output>;

    /// Human-readable format name
    fn name(&self) -> &str;
}

/// Source format of a parsed module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFormat {
    /// Legacy 15-sample Soundtracker layout
    Soundtracker15,
    /// 31-sample ProTracker layout, with its format tag
    ProTracker([u8; 4]),
    /// ScreamTracker 3
    S3m,
}

/// Per-physical-channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSetting {
    /// Whether the channel plays at all
    pub enabled: bool,
    /// Initial pan, 0 (left) - 255 (right)
    pub pan: u8,
}

/// One instrument/sample record with its decoded PCM
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instrument {
    /// Display name
    pub name: String,
    /// DOS filename (S3M only)
    pub filename: String,
    /// Default volume, 0-64
    pub volume: u8,
    /// Finetune in 1/8 semitones, -8..7 (MOD only)
    pub finetune: i8,
    /// Playback rate in Hz of the instrument's reference note
    /// (C-4 for S3M `c4speed`, C-2 with finetune applied for MOD)
    pub c4speed: u32,
    /// Loop start, in samples
    pub loop_start: usize,
    /// Loop length, in samples
    pub loop_length: usize,
    /// Signed 8-bit PCM
    pub data: Vec<i8>,
}

impl Instrument {
    /// True when the instrument has no sample data
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the loop region is active
    pub fn has_loop(&self) -> bool {
        self.loop_length > crate::sample_store::MIN_LOOP_LENGTH
    }
}

/// A pattern in its raw per-format cell encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPattern<C> {
    /// Rows of per-channel cells
    pub rows: Vec<Vec<C>>,
}

impl<C: Clone + Default> RawPattern<C> {
    /// Pattern of 64 rows of empty cells
    pub fn empty(channels: usize) -> Self {
        RawPattern {
            rows: vec![vec![C::default(); channels]; ROWS_PER_PATTERN],
        }
    }
}

/// Parse result shared by all formats, generic over the raw cell type
#[derive(Debug, Clone, PartialEq)]
pub struct Module<C> {
    /// Source format
    pub format: ModuleFormat,
    /// Song title
    pub title: String,
    /// Ticks per row at song start
    pub initial_speed: u8,
    /// Tempo (BPM) at song start
    pub initial_tempo: u8,
    /// Global volume, 0-64
    pub global_volume: u8,
    /// Physical channel configuration
    pub channels: Vec<ChannelSetting>,
    /// Instrument table
    pub instruments: Vec<Instrument>,
    /// Order list (pattern indices in play order)
    pub orders: Vec<u8>,
    /// Pattern table
    pub patterns: Vec<RawPattern<C>>,
}

impl<C> Module<C> {
    /// Render configuration from the module's initial speed and tempo
    pub fn render_config(&self, repeat: Repeat) -> Result<RenderConfig> {
        RenderConfig::new(
            TickTiming::Bpm(f64::from(self.initial_tempo)),
            u32::from(self.initial_speed),
            repeat,
        )
    }

    /// Number of physical channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

/// Run a nom parser on `data[offset..]`, mapping failure to `error`.
pub(crate) fn parse_at<'a, T>(
    data: &'a [u8],
    offset: usize,
    what: &str,
    error: fn(String) -> ModMixError,
    mut parser: impl FnMut(&'a [u8]) -> IResult<&'a [u8], T>,
) -> Result<T> {
    let input = data.get(offset..).ok_or_else(|| {
        error(format!(
            "{what} at offset {offset} lies beyond end of data ({} bytes)",
            data.len()
        ))
    })?;
    parser(input)
        .map(|(_, value)| value)
        .map_err(|_| error(format!("{what} at offset {offset} is truncated")))
}

/// Slice `len` bytes at `offset`, mapping failure to `error`.
pub(crate) fn slice_at<'a>(
    data: &'a [u8],
    offset: usize,
    len: usize,
    what: &str,
    error: fn(String) -> ModMixError,
) -> Result<&'a [u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| {
            error(format!(
                "{what} ({len} bytes at offset {offset}) exceeds data length {}",
                data.len()
            ))
        })
}

/// Decode a fixed-width, NUL-padded text field.
pub(crate) fn parse_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).trim_end().to_string()
}
