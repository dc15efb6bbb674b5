//! HTTP client for the reservation service under test
//!
//! Implements [`ticketcheck_core::TicketService`] on top of reqwest, with
//! settings taken from the `http` configuration domain.

pub mod client;
pub mod config;
pub mod errors;

// Re-export main types for convenience
pub use client::HttpTicketService;
pub use config::HttpClientConfig;
pub use errors::HttpError;
