//! Segmentify service entry point
//!
//! Boot order: configuration, logging, storage (exit code 1 when the
//! backend cannot be initialized), expiry reaper, HTTP server with
//! graceful shutdown on SIGINT/SIGTERM.

use std::process::ExitCode;
use std::sync::Arc;

use segmentify_app::logging::setup_logging;
use segmentify_app::{build_router, AppState};
use segmentify_core::SegmentationService;
use segmentify_infra::{ExpiryReaper, PostgresStorage};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match segmentify_infra::config::load() {
        Ok(config) => config,
        Err(err) => {
            // Logging is configured from ENV, which may itself be missing
            eprintln!("failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    setup_logging(config.env);
    info!(env = %config.env, "starting segmentify");

    let storage = match init_storage(&config.postgres).await {
        Ok(storage) => storage,
        Err(err) => {
            error!(error = %err, "failed to init storage");
            return ExitCode::FAILURE;
        }
    };

    let store = Arc::new(storage.clone());
    let service = Arc::new(SegmentationService::new(
        Arc::clone(&store) as Arc<dyn segmentify_core::SegmentCatalog>,
        Arc::clone(&store) as Arc<dyn segmentify_core::UserDirectory>,
        Arc::clone(&store) as Arc<dyn segmentify_core::MembershipStore>,
    ));

    let mut reaper = ExpiryReaper::new(store, config.reaper.clone());
    if let Err(err) = reaper.start().await {
        error!(error = %err, "failed to start expiry reaper");
        return ExitCode::FAILURE;
    }

    let router = build_router(AppState::new(service), config.http_server.timeout);

    let listener = match tokio::net::TcpListener::bind(&config.http_server.address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(address = %config.http_server.address, error = %err, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    info!(
        address = %config.http_server.address,
        idle_timeout_secs = config.http_server.idle_timeout.as_secs(),
        reaper_interval_secs = config.reaper.interval.as_secs(),
        "server started"
    );

    let served = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await;

    info!("stopping server");
    if let Err(err) = reaper.stop().await {
        error!(error = %err, "failed to stop expiry reaper");
    }
    storage.close().await;

    match served {
        Ok(()) => {
            info!("server stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "server terminated abnormally");
            ExitCode::FAILURE
        }
    }
}

async fn init_storage(
    config: &segmentify_domain::DatabaseConfig,
) -> segmentify_domain::Result<PostgresStorage> {
    let storage = PostgresStorage::connect(config).await?;
    storage.init_schema().await?;
    Ok(storage)
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            error!("failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install sigterm handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
