//! onceshared: onceshare storage service
//!
//! Usage:
//!   onceshared [--config /etc/onceshare/onceshare.toml] [--listen 0.0.0.0:1337]
//!              [--tls-cert cert.pem --tls-key key.pem]
//!
//! Holds only ciphertext. Each secret is handed out at most `max_views` times
//! and is destroyed on its last view or at expiry, whichever comes first.

mod api;
mod daemon;
mod metrics;
mod tls;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use onceshare_core::config::OnceshareConfig;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "onceshared", version, about = "onceshare storage service")]
struct Cli {
    /// Path to onceshare.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "ONCESHARE_CONFIG",
        default_value = "/etc/onceshare/onceshare.toml"
    )]
    config: PathBuf,

    /// Listen address, overrides server.listen
    #[arg(long, env = "ONCESHARE_LISTEN")]
    listen: Option<String>,

    /// PEM certificate chain, overrides server.tls_cert
    #[arg(long, env = "ONCESHARE_TLS_CERT", requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// PEM private key, overrides server.tls_key
    #[arg(long, env = "ONCESHARE_TLS_KEY", requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error), overrides server.log_level
    #[arg(long, env = "ONCESHARE_LOG")]
    log: Option<String>,

    /// Log format (json, text), overrides server.log_format
    #[arg(long, env = "ONCESHARE_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, found) = load_config(&cli.config)?;

    let level = cli.log.clone().unwrap_or_else(|| config.server.log_level.clone());
    let format = match cli.log_format {
        Some(f) => f,
        None if config.server.log_format == "text" => LogFormat::Text,
        None => LogFormat::Json,
    };
    init_logging(&level, &format);

    if !found {
        tracing::warn!(
            "config file not found: {}  (using defaults)",
            cli.config.display()
        );
    }
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    if cli.tls_cert.is_some() {
        config.server.tls_cert = cli.tls_cert;
        config.server.tls_key = cli.tls_key;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "onceshared starting"
    );

    daemon::run(config).await
}

/// Parse the config file, or fall back to defaults when it does not exist.
/// The flag reports whether the file was found; logging is not up yet.
fn load_config(path: &Path) -> Result<(OnceshareConfig, bool)> {
    if path.exists() {
        Ok((OnceshareConfig::from_file(path)?, true))
    } else {
        Ok((OnceshareConfig::default(), false))
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
