//! TCP server for the HSM host-command simulator.
//!
//! An accept loop (one task) hands each connection to its own session task
//! (`session::handle_connection`), which reads frames sequentially and
//! dispatches each onto a bounded worker pool. See [`session`] for the
//! concurrency model.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use hsm_core::{Hsm, HsmOptions};
use hsm_crypto::KeyRaw;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

pub use error::ServerError;

/// Startup configuration for [`Server`].
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// TCP port to listen on.
    pub port: u16,
    /// Clear 16-byte Local Master Key.
    pub lmk: KeyRaw,
    /// Handler leniency flags (spec.md §6).
    pub options: HsmOptions,
}

/// A bound, not-yet-running server instance.
pub struct Server {
    listener: TcpListener,
    hsm: Arc<Hsm>,
    worker_permits: Arc<Semaphore>,
}

impl Server {
    /// Bind the listening socket and build the shared [`Hsm`] instance.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] if the port cannot be bound.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
        let hsm = Arc::new(Hsm::new(config.lmk, config.options));

        // One worker slot per hardware thread: a frame's handler runs on
        // its own task, but only as many run at once as the machine can
        // actually execute in parallel (spec.md §5).
        let parallelism =
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);

        Ok(Self { listener, hsm, worker_permits: Arc::new(Semaphore::new(parallelism)) })
    }

    /// The address the listener actually bound to (useful when `port` is 0).
    ///
    /// # Errors
    ///
    /// Propagates any I/O error from querying the socket.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the accept loop forever, spawning one session task per
    /// connection.
    ///
    /// # Errors
    ///
    /// Never returns `Err`: an `accept()` failure is logged and the loop
    /// continues, matching spec.md §7 ("Acceptor errors → logged and the
    /// accept loop continues").
    pub async fn run(self) -> Result<(), ServerError> {
        loop {
            let (socket, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    tracing::warn!(error = %err, "accept failed, continuing");
                    continue;
                }
            };
            tracing::debug!(%peer, "accepted connection");

            let hsm = Arc::clone(&self.hsm);
            let permits = Arc::clone(&self.worker_permits);
            tokio::spawn(async move {
                session::handle_connection(socket, peer, hsm, permits).await;
            });
        }
    }
}
