//! HTTP server module
//!
//! Accepts connections with `hyper` and hands each request to the relay
//! handler.
//!
//! # Example
//!
//! ```no_run
//! use beyblade_arena::config::Config;
//! use beyblade_arena::server::Server;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = Server::new(Config::with_address("127.0.0.1:0")).await?;
//! println!("Relay bound to {}", server.local_addr());
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod handler;
pub mod http_tracing;

use crate::config::Config;
use crate::relay::Relay;
use crate::upstream::{DetectionUpstream, HttpUpstream};
use handler::{handle_request, RelayState};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Server error: {0}")]
    RuntimeError(String),
}

/// Upload relay HTTP server
///
/// Binds on construction so the actual port is known before `run`.
pub struct Server {
    state: Arc<RelayState>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Create a server forwarding to the configured detection upstream
    pub async fn new(config: Config) -> Result<Self, ServerError> {
        let upstream = HttpUpstream::new(
            config.upstream.url.clone(),
            config.upstream.field_name.clone(),
            config.upstream.timeout(),
        )
        .map_err(|e| ServerError::RuntimeError(e.to_string()))?;

        info!(
            upstream = %upstream.url(),
            timeout_secs = config.upstream.timeout_seconds,
            "Detection upstream configured"
        );

        Self::with_upstream(&config, Arc::new(upstream)).await
    }

    /// Create a server with an explicit upstream
    pub async fn with_upstream(
        config: &Config,
        upstream: Arc<dyn DetectionUpstream>,
    ) -> Result<Self, ServerError> {
        let addr: SocketAddr = config
            .server
            .address
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        // Actual bound address matters for port 0
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!("Server bound to {}", local_addr);

        Ok(Self {
            state: Arc::new(RelayState {
                relay: Relay::new(upstream),
            }),
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until Ctrl-C
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve until `shutdown` completes
    ///
    /// Connections already accepted finish on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!("Relay listening on {}", self.local_addr);
        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            let state = Arc::clone(&self.state);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| handle_request(req, Arc::clone(&state)));

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", peer_addr, e);
                }
            });
        }

        info!("Shutting down relay");
        Ok(())
    }
}
