use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use imagine_api::background::{stale_sweep, video_retention};
use imagine_api::config::ServerConfig;
use imagine_api::router::build_app_router;
use imagine_api::state::AppState;
use imagine_core::storage::VideoStorage;
use imagine_events::{EventBus, EventLogger};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        video_timeout_secs = config.job_timeout_secs,
        chat_timeout_secs = config.chat_job_timeout_secs,
        chat_wait_secs = config.chat_completion_wait_secs,
        "Loaded server configuration"
    );
    if config.request_timeout_secs <= config.chat_completion_wait_secs {
        tracing::warn!(
            request_timeout_secs = config.request_timeout_secs,
            chat_wait_secs = config.chat_completion_wait_secs,
            "Request timeout does not exceed the chat wait; slow chat jobs will be cut off with 408"
        );
    }

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = imagine_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    imagine_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    imagine_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Artifact storage ---
    let storage = Arc::new(VideoStorage::new(&config.video_storage_path));
    storage
        .init()
        .await
        .expect("Failed to create video storage directory");
    let stored = storage
        .list()
        .await
        .expect("Failed to read video storage directory");
    tracing::info!(
        root = %storage.root().display(),
        artifacts = stored.len(),
        "Video storage ready",
    );

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let logger_handle = tokio::spawn(EventLogger::run(event_bus.subscribe()));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        storage: Arc::clone(&storage),
        event_bus: Arc::clone(&event_bus),
    };

    // --- Background tasks ---
    let cancel = CancellationToken::new();
    let mut background = Vec::new();

    if config.stale_sweep_interval_secs > 0 {
        background.push(tokio::spawn(stale_sweep::run(
            state.dispatcher(),
            Duration::from_secs(config.stale_sweep_interval_secs),
            cancel.clone(),
        )));
    }
    if config.max_video_age_days > 0 {
        background.push(tokio::spawn(video_retention::run(
            Arc::clone(&storage),
            config.max_video_age_days,
            cancel.clone(),
        )));
    }

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    for handle in background {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }
    tracing::info!("Background tasks stopped");

    // Dropping the last sender closes the channel and stops the logger.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), logger_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Install the global subscriber. `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "imagine_api=debug,imagine_db=info,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for SIGINT or SIGTERM to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
