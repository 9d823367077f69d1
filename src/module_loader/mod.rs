//! Module Loader Domain
//!
//! Format auto-detection over raw module bytes and dispatch to the matching
//! parser. File reading is left to the caller.

pub mod loader;

pub use loader::{DetectedFormat, LoadedModule, ModuleLoader};

use crate::Result;

/// Convenience function to detect and parse a module from its bytes
pub fn load_bytes(data: &[u8]) -> Result<LoadedModule> {
    ModuleLoader::load(data)
}
