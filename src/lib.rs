//! Beyblade Arena Library
//!
//! Video upload relay and client for an external Beyblade detection
//! service.
//!
//! # Features
//!
//! - **Upload Relay**: forwards one multipart video field to the detection
//!   upstream and returns its reply unchanged, or a JSON error envelope
//! - **Upload Client**: attempt state machine with progress events, stale
//!   reply protection and reset
//! - **Browser Client**: single page served by the relay at `/`
//!
//! # Example
//!
//! ```no_run
//! use beyblade_arena::{config::Config, server::Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let server = Server::new(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod media;
pub mod metrics;
pub mod relay;
pub mod router;
pub mod server;
pub mod upstream;

// Re-export commonly used types
pub use config::Config;
pub use server::Server;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
