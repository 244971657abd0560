use std::sync::Arc;

use imagine_core::storage::VideoStorage;
use imagine_events::EventBus;

use crate::config::ServerConfig;
use crate::engine::dispatcher::Dispatcher;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (the job store).
    pub pool: imagine_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Local store for uploaded video artifacts.
    pub storage: Arc<VideoStorage>,
    /// Job lifecycle event bus.
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Dispatch engine bound to this state's store, bus and timeouts.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.pool.clone(),
            Arc::clone(&self.event_bus),
            self.config.stale_timeouts(),
        )
    }
}
