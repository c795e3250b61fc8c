use clap::Parser;
use roomcast::{router, AppState, Coordinator, ServerConfig};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomcast=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::parse();
    info!(?config, "Starting roomcast server");

    let coordinator = Arc::new(Coordinator::new(config.coordinator()));
    coordinator.seed_rooms(&config.seed_rooms).await;

    let app = router(AppState::new(coordinator))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = match tokio::net::TcpListener::bind(config.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(bind = %config.bind, error = %e, "Failed to bind listener");
            std::process::exit(1);
        }
    };
    info!("Server running on http://{}", config.bind);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error");
    }

    info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
