//! CLI argument parsing and session parameter construction

mod settings;

pub use settings::*;
