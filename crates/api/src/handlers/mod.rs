//! HTTP request handlers, one module per resource.

pub mod chat;
pub mod extension;
pub mod jobs;
pub mod videos;
