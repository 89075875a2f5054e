pub mod constants;
pub mod filename;
pub mod logging;
pub mod progress;
pub mod retry;

pub use constants::*;
pub use filename::{
    canonical_filename, disambiguated_filename, is_illegal_filename_char,
    sanitize_filename_component,
};
pub use logging::init_logging;
pub use progress::ProgressReporter;
pub use retry::retry_with_backoff;
