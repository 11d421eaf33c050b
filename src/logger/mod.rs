//! Process-wide `tracing` setup. Starts at `info` and is reloaded with the
//! configured filter once settings are parsed.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
