//! Job lifecycle event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`JobEvent`]: one state change of one job.
//! - [`EventLogger`]: background subscriber that writes every event to
//!   the tracing log.

pub mod bus;
pub mod log;

pub use bus::{EventBus, JobEvent, JobEventKind};
pub use log::EventLogger;
