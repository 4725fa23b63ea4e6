//! PiNAS server binary.
//!
//! Serves a single storage directory over plain HTTP: file routes for
//! listing, upload, download, rename, delete, metadata and hashing, a few
//! diagnostic routes, and the paperplane deployment route. Every handled
//! request is also appended to a per-run log file.

mod atomic;
mod config;
mod deploy;
mod diagnostics;
mod error;
mod files;
mod fingerprint;
mod http;
mod logging;
mod request_log;
mod storage;

use axum::extract::DefaultBodyLimit;
use axum::extract::Extension;
use axum::routing::{any, get, post};
use axum::{Router, middleware};
use axum_server::Handle;
use chrono::Utc;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use crate::config::Args;
use crate::deploy::Deployer;
use crate::request_log::RequestLog;
use crate::storage::Storage;

/// Starts the PiNAS server and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let args = Args::parse();
    let storage = Arc::new(Storage::new(PathBuf::from(&args.storage_dir)));
    storage.ensure_root().await?;
    info!(root = %storage.root_path().display(), "storage ready");
    let deployer = Arc::new(Deployer::new(PathBuf::from(&args.deploy_dir)));
    deployer.ensure_work_dir().await?;
    let request_log =
        Arc::new(RequestLog::create(&PathBuf::from(&args.log_dir), Utc::now()).await?);
    info!(log_file = %request_log.path().display(), "request log opened");

    let app = build_router(storage, request_log.clone(), deployer, args.max_body_size);

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let addr = SocketAddr::new(host, args.port);
    let handle = Handle::new();

    let server = axum_server::bind(addr)
        .handle(handle.clone())
        .serve(app.into_make_service_with_connect_info::<SocketAddr>());

    request_log
        .record(&format!("PiNAS server running at http://localhost:{}", args.port))
        .await;

    let outcome = tokio::select! {
        result = server => result,
        _ = shutdown_signal(handle) => Ok(()),
    };
    request_log.close().await;
    outcome
}

/// Builds the full route table with shared state attached as extensions.
fn build_router(
    storage: Arc<Storage>,
    request_log: Arc<RequestLog>,
    deployer: Arc<Deployer>,
    max_body_size: usize,
) -> Router {
    Router::new()
        .route("/", get(diagnostics::repository_redirect))
        .route("/docs", get(diagnostics::repository_redirect))
        .route("/list/{id}", get(files::list_files))
        .route("/metadata/{id}", get(files::file_metadata))
        .route("/download/{id}", get(files::download_file))
        .route(
            "/delete/{id}",
            get(files::delete_file).delete(files::delete_file),
        )
        .route(
            "/upload/{id}",
            post(files::upload_file).get(files::upload_requires_post),
        )
        .route("/rename/{id}", post(files::rename_file))
        .route("/hash/{id}", get(files::hash_file))
        .route("/health", any(diagnostics::health))
        .route("/time", any(diagnostics::current_time))
        .route("/echo", any(diagnostics::echo))
        .route("/helloworld", any(diagnostics::hello_world))
        .route("/uuid", any(diagnostics::new_uuid))
        .route("/log", any(diagnostics::read_log))
        .route("/paperplane/upload/{id}", post(deploy::deploy_project))
        .fallback(diagnostics::not_found)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(middleware::from_fn(http::cors_headers))
        .layer(http::trace_layer())
        .layer(Extension(storage))
        .layer(Extension(request_log))
        .layer(Extension(deployer))
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
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

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
