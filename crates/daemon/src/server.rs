//! HTTP server lifecycle.
//!
//! Builds the file service from configuration, binds the listener and serves
//! the API router until a shutdown signal arrives.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::files::{DirectorySizeAggregator, FileService, PathResolver};
use crate::router::{build_router, RouterOptions};

/// Create the file service for the configured sandbox root.
///
/// Fails if the root does not exist or is not a directory.
pub fn build_service(config: &Config) -> Result<FileService> {
    let root = &config.sandbox.root;
    let resolver = PathResolver::new(root)
        .with_context(|| format!("Invalid sandbox root: {}", root.display()))?;
    let sizes = DirectorySizeAggregator::new(config.sandbox.max_depth);
    Ok(FileService::new(resolver, sizes))
}

/// Build the complete application router from configuration.
pub fn build_app(config: &Config) -> Result<Router> {
    let service = Arc::new(build_service(config)?);
    Ok(build_router(service, RouterOptions::from_config(config)))
}

/// A bound, not yet running HTTP server.
pub struct Server {
    listener: TcpListener,
    app: Router,
}

impl Server {
    /// Bind the listener on the configured host and port.
    ///
    /// Staging files left by uploads interrupted in a previous run are
    /// removed first.
    pub async fn bind(config: &Config) -> Result<Self> {
        let service = Arc::new(build_service(config)?);
        service.cleanup_stale_uploads().await;

        let app = build_router(service, RouterOptions::from_config(config));
        Self::bind_to(&config.server.bind_addr(), app).await
    }

    /// Bind an already built router to `addr`.
    pub async fn bind_to(addr: &str, app: Router) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        Ok(Self { listener, app })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read listener address")
    }

    /// Serve requests until `shutdown` completes.
    ///
    /// In-flight requests are allowed to finish before this returns.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        tracing::info!("Listening on http://{}", addr);

        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server error")?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!("Failed to register signal handlers: {}", e);
                std::future::pending::<()>().await;
                return;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }
}

/// Wait for a shutdown signal (Ctrl-C).
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl-C"),
        Err(e) => {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
