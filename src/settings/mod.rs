//! Layered settings: a TOML profile plus `QUILLPRESS__*` overrides.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
