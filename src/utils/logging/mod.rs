//! Logging and progress tracking

pub mod log;
pub mod progress;

pub use log::{log_artifact, log_stage_complete, log_stage_start, log_warning};
pub use progress::{create_main_progress_bar, finish_and_clear};
