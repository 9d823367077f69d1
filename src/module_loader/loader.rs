//! Module Loader
//!
//! Detects MOD or S3M from signature bytes and parses with the matching
//! [`FormatParser`](crate::module_parser::FormatParser).

#[cfg(feature = "mod-format")]
use crate::module_parser::{ProTrackerModule, ProTrackerParser};
#[cfg(feature = "s3m-format")]
use crate::module_parser::{S3mModule, S3mParser};
use crate::module_parser::{
    mod_tag_channels, FormatParser, ModuleFormat, MOD_TAG_OFFSET, S3M_SIGNATURE,
    S3M_SIGNATURE_OFFSET,
};
use crate::replayer::{RenderConfig, Repeat};
use crate::{ModMixError, Result};

/// Format family identified from signature bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedFormat {
    /// `SCRM` at offset 44
    S3m,
    /// Known 31-sample tag at offset 1080
    ProTracker,
    /// No signature; assumed legacy 15-sample MOD
    Soundtracker,
}

/// A parsed module of either supported format
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedModule {
    /// ProTracker / Soundtracker MOD
    #[cfg(feature = "mod-format")]
    ProTracker(ProTrackerModule),
    /// ScreamTracker 3
    #[cfg(feature = "s3m-format")]
    S3m(S3mModule),
}

impl LoadedModule {
    /// Source format
    pub fn format(&self) -> ModuleFormat {
        match self {
            #[cfg(feature = "mod-format")]
            LoadedModule::ProTracker(module) => module.format,
            #[cfg(feature = "s3m-format")]
            LoadedModule::S3m(module) => module.format,
        }
    }

    /// Song title
    pub fn title(&self) -> &str {
        match self {
            #[cfg(feature = "mod-format")]
            LoadedModule::ProTracker(module) => &module.title,
            #[cfg(feature = "s3m-format")]
            LoadedModule::S3m(module) => &module.title,
        }
    }

    /// Order list
    pub fn orders(&self) -> &[u8] {
        match self {
            #[cfg(feature = "mod-format")]
            LoadedModule::ProTracker(module) => &module.orders,
            #[cfg(feature = "s3m-format")]
            LoadedModule::S3m(module) => &module.orders,
        }
    }

    /// Number of physical channels
    pub fn channel_count(&self) -> usize {
        match self {
            #[cfg(feature = "mod-format")]
            LoadedModule::ProTracker(module) => module.channel_count(),
            #[cfg(feature = "s3m-format")]
            LoadedModule::S3m(module) => module.channel_count(),
        }
    }

    /// Render configuration from the module's initial speed and tempo
    pub fn render_config(&self, repeat: Repeat) -> Result<RenderConfig> {
        match self {
            #[cfg(feature = "mod-format")]
            LoadedModule::ProTracker(module) => module.render_config(repeat),
            #[cfg(feature = "s3m-format")]
            LoadedModule::S3m(module) => module.render_config(repeat),
        }
    }
}

/// Detects and parses module files
pub struct ModuleLoader;

impl ModuleLoader {
    /// Detect the format of `data` and parse it
    pub fn load(data: &[u8]) -> Result<LoadedModule> {
        let detected = Self::detect_format(data);
        log::debug!("detected {:?} module ({} bytes)", detected, data.len());

        match detected {
            #[cfg(feature = "s3m-format")]
            DetectedFormat::S3m => S3mParser.parse(data).map(LoadedModule::S3m),
            #[cfg(feature = "mod-format")]
            DetectedFormat::ProTracker | DetectedFormat::Soundtracker => {
                ProTrackerParser.parse(data).map(LoadedModule::ProTracker)
            }
            #[allow(unreachable_patterns)]
            other => Err(ModMixError::InvalidFormat(format!(
                "{other:?} support is not enabled in this build"
            ))),
        }
    }

    /// Identify the format family from signature bytes
    pub fn detect_format(data: &[u8]) -> DetectedFormat {
        let s3m_signature = data.get(S3M_SIGNATURE_OFFSET..S3M_SIGNATURE_OFFSET + 4);
        if s3m_signature == Some(&S3M_SIGNATURE[..]) {
            return DetectedFormat::S3m;
        }
        let mod_tag = data.get(MOD_TAG_OFFSET..MOD_TAG_OFFSET + 4);
        if mod_tag.and_then(mod_tag_channels).is_some() {
            return DetectedFormat::ProTracker;
        }
        DetectedFormat::Soundtracker
    }
}
