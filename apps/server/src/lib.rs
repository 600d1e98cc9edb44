//! # Limbo Server
//!
//! HTTP front end of the Limbo file drop: uploads are streamed into a
//! [`FileStore`](limbo_storage::FileStore), listed, downloaded and expired by the
//! store's retention sweeper.
//!
//! ## Example
//! ```no_run
//! use limbo_server::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Server::builder()
//!         .port(8080)
//!         .build()
//!         .await?
//!         .run()
//!         .await
//! }
//! ```

pub mod config;
mod error;
mod handlers;
mod preview;
mod router;
mod state;

pub use crate::error::{ApiError, ApiErrorExt};
pub use crate::router::init as router;
pub use crate::state::{AppState, AppStateInner};

use crate::config::AppConfig;
use anyhow::{Context, Result};
use axum_server::Handle;
use limbo_storage::FileStore;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

/// A fluent builder for configuring and initializing the [`Server`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug, Default)]
pub struct ServerBuilder {
    cfg: AppConfig,
}

impl ServerBuilder {
    /// Set up the server's configuration.
    pub fn config(mut self, cfg: AppConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub const fn port(mut self, port: u16) -> Self {
        self.cfg.server.port = port;
        self
    }

    /// Opens the file store and prepares the router state.
    ///
    /// The retention sweeper is started later by [`Server::run`].
    ///
    /// # Errors
    /// Returns an error if the storage directory cannot be created or resolved,
    /// or if the retention settings are invalid.
    pub async fn build(self) -> Result<Server> {
        let storage = &self.cfg.storage;
        let store = Context::context(
            FileStore::builder()
                .root(&storage.directory)
                .max_age(storage.max_age())
                .disabled(storage.disabled)
                .build()
                .await,
            "Failed to open file storage",
        )?;

        let state = AppState::new(store, storage.url_base());
        let address = SocketAddr::new(self.cfg.server.address, self.cfg.server.port);
        info!(address = %address, root = %state.store.root().display(), "Initializing server");

        Ok(Server { address, state })
    }
}

/// A fully initialized server instance ready to run.
#[must_use = "call .run().await to start the server"]
#[derive(Debug)]
pub struct Server {
    address: SocketAddr,
    state: AppState,
}

impl Server {
    /// Returns a new [`ServerBuilder`] to configure the server.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Starts the sweeper and serves HTTP until a shutdown signal arrives, then
    /// stops the sweeper before returning.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the configured address.
    pub async fn run(self) -> Result<()> {
        let address = self.address;
        let store = self.state.store.clone();
        store.start();

        let app = router::init(self.state);

        let handle = Handle::<SocketAddr>::new();
        let shutdown_handle = handle.clone();

        tokio::spawn(async move {
            if let Err(e) = shutdown_signal().await {
                error!("Error while waiting for shutdown signal: {e}");
                return;
            }
            info!("Shutdown signal received, starting graceful shutdown...");
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(30)));
        });

        info!("Starting HTTP server on http://{address}");
        let served = axum_server::bind(address).handle(handle).serve(app.into_make_service()).await;

        store.stop().await;
        Context::context(served, "HTTP server failed")?;

        info!("Server shutdown complete");
        Ok(())
    }

    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    #[must_use]
    pub const fn address(&self) -> SocketAddr {
        self.address
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { Context::context(signal::ctrl_c().await, "Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        Context::context(
            signal::unix::signal(signal::unix::SignalKind::terminate()),
            "Failed to install SIGTERM handler",
        )?
        .recv()
            .await;
        Ok::<_, anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        res = ctrl_c => {
            res.context("Ctrl+C signal received")?;
        },
        res = terminate => {
            res.context("SIGTERM signal received")?;
        },
    }

    Ok(())
}
