use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coldspark_api::config::ServerConfig;
use coldspark_api::hosting;
use coldspark_api::router::build_app_router;
use coldspark_api::state::AppState;
use coldspark_core::config::EndpointConfig;
use coldspark_serverless::backend::ServerlessBackend;
use coldspark_serverless::registry::BackendRegistry;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "coldspark_api=debug,coldspark_serverless=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let endpoint = EndpointConfig::from_env();
    tracing::info!(
        endpoint_id = %endpoint.endpoint_id,
        auto_refresh = endpoint.auto_refresh,
        "Loaded serverless endpoint configuration"
    );

    // --- Host collaborators ---
    let host = hosting::standalone_host();
    let permissions = Arc::clone(&host.permissions);

    // --- Serverless backends ---
    let registry = Arc::new(BackendRegistry::new());
    let backend = Arc::new(ServerlessBackend::new(
        1,
        "Serverless",
        endpoint,
        config.model_categories.clone(),
        host,
    ));
    registry.register(backend).await;
    tracing::info!("Serverless backend registered");

    // --- Background init ---
    // Init may wake a cold worker and take minutes; the server starts
    // accepting requests while it runs.
    let shutdown = tokio_util::sync::CancellationToken::new();
    let init_registry = Arc::clone(&registry);
    let init_cancel = shutdown.clone();
    let init_handle = tokio::spawn(async move {
        init_registry.init_all(None, &init_cancel).await;
    });

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        registry: Arc::clone(&registry),
        permissions,
        shutdown: shutdown.clone(),
    };

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

    // Cancel in-flight init and refresh polling, then wait for init to drain.
    shutdown.cancel();
    let _ = tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        init_handle,
    )
    .await;
    tracing::info!("Background init drained");

    registry.shutdown_all().await;
    tracing::info!("Serverless backends marked idle");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
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
