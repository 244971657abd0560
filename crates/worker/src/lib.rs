//! Worker side of the job dispatch protocol.
//!
//! - [`protocol`]: wire types shared with the HTTP server.
//! - [`client`]: typed HTTP client for the poll/complete/error endpoints.
//! - [`runner`]: poll loop that feeds claimed jobs to a [`runner::JobHandler`].

pub mod client;
pub mod protocol;
pub mod runner;

pub use client::{ExtensionClient, ExtensionClientError};
pub use runner::{JobHandler, JobOutput, Worker};
