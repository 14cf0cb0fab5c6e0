//! Saga service entry point.
//!
//! Runs one participant role (selected by `SERVICE`) together with its
//! outbox publisher. With `DATABASE_URL` set, state lives in Postgres; with
//! no database the process runs against in-memory storage for demos.

use std::sync::Arc;

use api::config::Config;
use publisher::{OutboxPublisher, PublisherConfig};
use services::ProtocolConfig;
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStorage, PostgresStorage, Storage};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<S: Storage + Clone>(config: Config, storage: Arc<S>) {
    let protocol = ProtocolConfig::from_env();
    let publisher_config = PublisherConfig::from_env();

    // Install the Prometheus recorder; every series this process emits
    // carries its participant role.
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .add_global_label("service", config.service.as_str())
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // Build the application.
    let app = api::create_app(
        config.service,
        api::service_router(config.service, storage.clone(), protocol),
        metrics_handle,
    );

    // The outbox publisher runs beside the server and drains on shutdown.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let outbox_publisher =
        OutboxPublisher::new(storage, publisher_config).expect("failed to build HTTP client");
    let publisher_handle = tokio::spawn(outbox_publisher.run(shutdown_rx));

    let addr = config.addr();
    tracing::info!(service = %config.service, %addr, "starting saga service");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    let _ = publisher_handle.await;
    tracing::info!("service shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(?config, "loaded configuration");

    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to database");
            let storage = Arc::new(PostgresStorage::new(pool));
            storage
                .run_migrations()
                .await
                .expect("failed to run migrations");
            serve(config, storage).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory storage");
            serve(config, Arc::new(InMemoryStorage::new())).await;
        }
    }
}
