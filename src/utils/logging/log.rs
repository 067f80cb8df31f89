//! Logging utilities
//!
//! Standardized messages for pipeline stages and persisted artifacts.

use std::path::Path;
use std::time::Duration;

/// Log the start of a stage with the number of input items
///
/// # Arguments
/// * `stage` - Description of the stage
/// * `items` - Number of items the stage will process
pub fn log_stage_start(stage: &str, items: usize) {
    log::info!("{stage}: {items} input items");
}

/// Log the completion of a stage
///
/// # Arguments
/// * `stage` - Past-tense description of the stage
/// * `items` - Number of items produced
/// * `elapsed` - Time the stage took
pub fn log_stage_complete(stage: &str, items: usize, elapsed: Duration) {
    log::info!("{stage} {items} items in {elapsed:?}");
}

/// Log a persisted artifact together with its fingerprint
pub fn log_artifact(what: &str, path: &Path, fingerprint: &str) {
    log::info!("{what} saved in {} with SHA-256 of {fingerprint}", path.display());
}

/// Log a warning with consistent format
///
/// # Arguments
/// * `message` - Warning message
/// * `path` - Optional path related to the warning
pub fn log_warning(message: &str, path: Option<&Path>) {
    if let Some(path) = path {
        log::warn!("{}: {}", message, path.display());
    } else {
        log::warn!("{message}");
    }
}
