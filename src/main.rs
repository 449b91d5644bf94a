//! Beyblade Arena - video upload relay and client
//!
//! `serve` runs the relay (and the browser client at `/`); `upload` sends a
//! video through a running relay from the terminal.

use anyhow::Context;
use beyblade_arena::client::outcome::DEFAULT_PLACEHOLDER_URL;
use beyblade_arena::client::{run_attempt, Phase, RelayClient, ResultResolver, UploadSession};
use beyblade_arena::config::Config;
use beyblade_arena::media::MediaFile;
use beyblade_arena::metrics::server::MetricsServer;
use beyblade_arena::server::Server;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_ADDRESS: &str = "0.0.0.0:3000";

/// Beyblade Arena - launch videos into the detection arena
#[derive(Parser, Debug)]
#[command(name = "beyblade-arena")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the upload relay
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Listen address, overrides the configuration file
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Upload a video through a relay
    Upload {
        /// Video file to launch
        file: PathBuf,

        /// Relay base URL
        #[arg(short, long, default_value = "http://localhost:3000")]
        relay_url: String,

        /// Directory for the processed video
        #[arg(short, long, default_value = "arena-output")]
        output_dir: PathBuf,

        /// Clip shown when the arena returns nothing playable
        #[arg(long, default_value = DEFAULT_PLACEHOLDER_URL, conflicts_with = "no_placeholder")]
        placeholder_url: String,

        /// Treat a non-playable reply as an error instead
        #[arg(long)]
        no_placeholder: bool,

        /// Give up on the relay after this many seconds
        #[arg(long, default_value_t = 310)]
        timeout_seconds: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(args.log_level.to_lowercase())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match args.command {
        Command::Serve { config, address } => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .init();
            serve(config, address).await
        }
        Command::Upload {
            file,
            relay_url,
            output_dir,
            placeholder_url,
            no_placeholder,
            timeout_seconds,
        } => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .compact()
                .init();
            let placeholder = (!no_placeholder).then_some(placeholder_url);
            upload(
                file,
                &relay_url,
                output_dir,
                placeholder,
                Duration::from_secs(timeout_seconds),
            )
            .await
        }
    }
}

async fn serve(config_path: PathBuf, address: Option<String>) -> anyhow::Result<()> {
    info!("Starting Beyblade Arena v{}", beyblade_arena::VERSION);

    let mut config = if config_path.exists() {
        let config = Config::load(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        info!("Loaded configuration from {:?}", config_path);
        config
    } else if config_path == PathBuf::from(DEFAULT_CONFIG_PATH) {
        info!("No {} found, using built-in defaults", DEFAULT_CONFIG_PATH);
        Config::with_address(DEFAULT_ADDRESS)
    } else {
        anyhow::bail!("Configuration file {} not found", config_path.display());
    };

    if let Some(address) = address {
        config.server.address = address;
        config.validate()?;
    }

    let mut metrics_server = if config.metrics.enabled {
        let mut server = MetricsServer::new(format!("0.0.0.0:{}", config.metrics.port));
        server.start().await?;
        Some(server)
    } else {
        None
    };

    let server = Server::new(config).await?;
    server.run().await?;

    if let Some(metrics_server) = metrics_server.as_mut() {
        metrics_server.shutdown().await;
    }
    Ok(())
}

async fn upload(
    path: PathBuf,
    relay_url: &str,
    output_dir: PathBuf,
    placeholder: Option<String>,
    timeout: Duration,
) -> anyhow::Result<()> {
    let file = MediaFile::from_path(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let mut session = UploadSession::new();
    session.select_file(file)?;
    if let Some(selected) = session.selected() {
        println!("{} ({:.2} MB)", selected.name(), selected.size_mb());
    }

    let client = RelayClient::new(relay_url, timeout)?;
    let resolver = ResultResolver::new(output_dir, placeholder);

    let mut last_progress = None;
    let status = run_attempt(&mut session, &client, &resolver, |status| {
        if status.phase == Phase::Uploading && last_progress == Some(status.progress) {
            return;
        }
        last_progress = Some(status.progress);
        println!("[{:>3}%] {}", status.progress, status.message);
    })
    .await?;

    match status.phase {
        Phase::Completed => {
            if let Some(result) = &status.result {
                println!("Victory video: {}", result);
            }
            Ok(())
        }
        _ => anyhow::bail!("{}", status.message),
    }
}
