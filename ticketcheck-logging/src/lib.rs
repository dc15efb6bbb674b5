//! Logging setup for ticketcheck
//!
//! Every crate logs through `tracing`; this crate installs the subscriber
//! described by the `logging` configuration domain.

pub mod init;

pub use init::{filter_directive, init_logging};
pub use ticketcheck_config::{LogFormat, LogLevel, LoggingConfig};
