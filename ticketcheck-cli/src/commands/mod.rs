//! CLI command implementations

pub mod config;
pub mod inspect;
pub mod run;

pub use config::{handle_config_generate, handle_config_validate};
pub use inspect::{snapshot_command, strategies_table, verify_command};
pub use run::run_command;
