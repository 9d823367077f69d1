//! Module-to-Pattern Adapter Domain
//!
//! Converts parsed MOD/S3M modules into what the engine consumes:
//! - instruments become [`Sample`](crate::sample_store::Sample)s named
//!   `"{prefix}:{n}"` (1-based), registered at their native rate
//! - an order range becomes one flat [`Pattern`] of generic cells with
//!   sample reference, note name, volume, pan and note delay
//!
//! Disabled channels always produce empty cells.

#[cfg(feature = "mod-format")]
pub mod protracker;
#[cfg(feature = "s3m-format")]
pub mod s3m;

use crate::module_loader::LoadedModule;
use crate::module_parser::{Module, RawPattern};
use crate::pattern::{Pattern, PatternCell};
use crate::sample_store::SampleStore;
use crate::{ModMixError, Result};
use std::ops::Range;

/// S3M `+++` order entry, skipped
const ORDER_SKIP: u8 = 254;

/// S3M end-of-song order entry; nothing after it plays
const ORDER_END: u8 = 255;

/// Converts modules for one song, naming its samples under a prefix
#[derive(Debug, Clone)]
pub struct ModuleAdapter {
    prefix: String,
    min_channels: usize,
}

impl ModuleAdapter {
    /// Adapter registering samples as `"{prefix}:{n}"`
    pub fn new(prefix: impl Into<String>) -> Self {
        ModuleAdapter {
            prefix: prefix.into(),
            min_channels: 0,
        }
    }

    /// Widen produced patterns to at least `channels` slots
    pub fn with_min_channels(mut self, channels: usize) -> Self {
        self.min_channels = channels;
        self
    }

    /// Store name of instrument `number` (1-based)
    pub fn sample_name(&self, number: usize) -> String {
        format!("{}:{}", self.prefix, number)
    }

    /// Register every non-empty instrument in `store`; returns how many
    pub fn populate_store(&self, module: &LoadedModule, store: &SampleStore) -> Result<usize> {
        let registered = match module {
            #[cfg(feature = "mod-format")]
            LoadedModule::ProTracker(module) => protracker::populate_store(self, module, store)?,
            #[cfg(feature = "s3m-format")]
            LoadedModule::S3m(module) => s3m::populate_store(self, module, store)?,
        };
        log::debug!(
            "registered {} samples for '{}' under prefix '{}'",
            registered,
            module.title(),
            self.prefix
        );
        Ok(registered)
    }

    /// Flatten the patterns named by `orders[range]` into one pattern
    pub fn to_pattern(&self, module: &LoadedModule, range: Range<usize>) -> Result<Pattern> {
        let rows = match module {
            #[cfg(feature = "mod-format")]
            LoadedModule::ProTracker(module) => protracker::convert(self, module, range)?,
            #[cfg(feature = "s3m-format")]
            LoadedModule::S3m(module) => s3m::convert(self, module, range)?,
        };
        let channels = module.channel_count().max(self.min_channels);
        Ok(Pattern::with_channels(rows, channels))
    }
}

/// Patterns in play order for `orders[range]`, skipping `+++` entries and
/// stopping at the first end marker
pub(crate) fn patterns_in_order<C>(
    module: &Module<C>,
    range: Range<usize>,
) -> Result<Vec<(usize, &RawPattern<C>)>> {
    let orders = module.orders.get(range.clone()).ok_or_else(|| {
        ModMixError::InvalidArgument(format!(
            "order range {}..{} outside order list of length {}",
            range.start,
            range.end,
            module.orders.len()
        ))
    })?;

    orders
        .iter()
        .take_while(|&&order| order != ORDER_END)
        .filter(|&&order| order != ORDER_SKIP)
        .map(|&order| {
            let index = usize::from(order);
            module
                .patterns
                .get(index)
                .map(|pattern| (index, pattern))
                .ok_or_else(|| {
                    ModMixError::CorruptData(format!(
                        "order list references pattern {index}, module has {}",
                        module.patterns.len()
                    ))
                })
        })
        .collect()
}

/// Row of empty cells
pub(crate) fn empty_row(channels: usize) -> Vec<PatternCell> {
    vec![PatternCell::empty(); channels]
}
