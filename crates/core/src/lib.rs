//! Domain building blocks shared by the job store, the HTTP server and the
//! worker client.

pub mod chat;
pub mod error;
pub mod storage;
pub mod types;
