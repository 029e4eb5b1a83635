//! # Filedeck Daemon Library
//!
//! This crate provides the server side of Filedeck, a file manager that
//! exposes one directory subtree (the *sandbox root*) to a browser over HTTP.
//!
//! ## Overview
//!
//! The daemon provides:
//!
//! - **Path Resolution**: Every client path is confined to the sandbox root
//! - **File Operations**: List, download, preview, upload, rename, delete, mkdir
//! - **Directory Sizes**: Recursive size aggregation for listings
//! - **HTTP API**: JSON endpoints plus optional static asset serving
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        HTTP Server                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                  Router (axum handlers)                    │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! │                                                                  │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────┐  │
//! │  │     Path     │  │     File     │  │   Directory Size     │  │
//! │  │   Resolver   │─▶│   Service    │─▶│    Aggregator        │  │
//! │  └──────────────┘  └──────────────┘  └──────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use daemon::{server::wait_for_shutdown_signal, Config, Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = Config::load_default()?;
//!     let _overrides = config.apply_env_overrides();
//!     config.validate()?;
//!
//!     let server = Server::bind(&config).await?;
//!     server.run(wait_for_shutdown_signal()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`files`]: Sandboxed path resolution and file operations
//! - [`router`]: HTTP routes and error-to-status mapping
//! - [`server`]: Listener and graceful shutdown

pub mod config;
pub mod files;
pub mod router;
pub mod server;

// Re-export protocol for convenience
pub use filedeck_protocol as protocol;

// Re-export config types for convenience
pub use config::{Config, ConfigError, EnvOverride};

// Re-export files types for convenience
pub use files::{
    DirectoryEntry, DirectorySizeAggregator, FileError, FileResult, FileService, PathResolver,
    ResolvedPath,
};

// Re-export router types for convenience
pub use router::{build_router, ApiError, AppState, RouterOptions};

// Re-export server types for convenience
pub use server::{build_app, Server};
