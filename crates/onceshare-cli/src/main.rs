//! onceshare: share a secret that can be opened once
//!
//! Commands:
//!   login                  - log in to a storage service that requires it
//!   logout                 - forget the stored bearer token
//!   share [TEXT]           - encrypt text (argument or stdin) or --file, print a link
//!   open <LINK>            - fetch, burn, and decrypt a shared secret
//!   config show            - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use onceshare_client::{
    share_link, ApiClient, AuthSession, HttpSecretStore, Producer, Recipient, Route,
    RouteDecision, ShareOptions,
};
use onceshare_core::config::{expand_home, OnceshareConfig};
use onceshare_core::error::CANNOT_DECRYPT;
use onceshare_core::ShareError;
use onceshare_crypto::payload::safe_file_name;
use onceshare_crypto::{KdfParams, OriginalInput, PayloadCodec};
use secrecy::{ExposeSecret, SecretString};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

const PASSWORD_ATTEMPTS: usize = 3;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "onceshare",
    version,
    about = "End-to-end encrypted one-time secret sharing",
    long_about = "onceshare: encrypt locally, upload only ciphertext, share a link that works once"
)]
struct Cli {
    /// Path to onceshare.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "ONCESHARE_CONFIG",
        default_value = "~/.config/onceshare/onceshare.toml"
    )]
    config: PathBuf,

    /// Storage service URL (overrides client.server_url)
    #[arg(long, short = 's', env = "ONCESHARE_SERVER")]
    server: Option<String>,

    /// Log level for diagnostics on stderr
    #[arg(long, env = "ONCESHARE_LOG", default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and keep a bearer token for later shares
    Login {
        #[arg(long, short = 'u', default_value = "admin")]
        username: String,
    },

    /// Forget the stored bearer token
    Logout,

    /// Encrypt a secret and print its link
    ///
    /// Without TEXT or --file, the secret is read from stdin.
    Share {
        /// Text to share
        #[arg(conflicts_with = "file")]
        text: Option<String>,
        /// Share a file instead of text
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
        /// Also protect the secret with a password (prompted)
        #[arg(long, short = 'p')]
        password: bool,
        /// Put the password into the link (anyone with the link can decrypt)
        #[arg(long, requires = "password")]
        embed_password: bool,
        /// Lifetime in seconds (default: client.default_expiry_secs)
        #[arg(long, short = 'e')]
        expiry: Option<u64>,
        /// Number of times the secret may be opened (default: client.default_views)
        #[arg(long)]
        views: Option<u32>,
    },

    /// Open a shared secret. This uses up one view.
    Open {
        /// Link, or bare /{format}/{key} path
        link: String,
        /// Directory to write a shared file into (default: current directory)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        /// Overwrite an existing file with the same name
        #[arg(long)]
        force: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    let config_path = expand_home(&cli.config);
    let mut config = load_config(&config_path)?;
    if let Some(server) = cli.server {
        config.client.server_url = server;
    }

    match cli.command {
        Commands::Login { username } => cmd_login(&config, &username).await,
        Commands::Logout => cmd_logout(&config).await,
        Commands::Share {
            text,
            file,
            password,
            embed_password,
            expiry,
            views,
        } => {
            let options = ShareOptions {
                expiry_secs: expiry.unwrap_or(config.client.default_expiry_secs),
                max_views: views.unwrap_or(config.client.default_views),
                password: if password {
                    Some(prompt_new_password()?)
                } else {
                    None
                },
                embed_password,
            };
            cmd_share(&config, text, file.as_deref(), options).await
        }
        Commands::Open { link, out, force } => {
            cmd_open(&config, &link, out.as_deref(), force).await
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

fn load_config(path: &Path) -> Result<OnceshareConfig> {
    if path.exists() {
        Ok(OnceshareConfig::from_file(path)?)
    } else {
        tracing::warn!(path = %path.display(), "no config file, using defaults");
        Ok(OnceshareConfig::default())
    }
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Keep the detail in the debug log, show the user the generic message.
fn user_error(err: ShareError) -> anyhow::Error {
    tracing::debug!(error = %err, "operation failed");
    anyhow::anyhow!(err.user_message())
}

fn api_client(config: &OnceshareConfig) -> Result<ApiClient> {
    let url = Url::parse(&config.client.server_url)
        .with_context(|| format!("invalid server URL: {}", config.client.server_url))?;
    ApiClient::new(&url).map_err(|e| anyhow::anyhow!("HTTP client: {e}"))
}

fn session(config: &OnceshareConfig) -> Result<Arc<AuthSession>> {
    let path = expand_home(&config.client.session_file);
    let session = AuthSession::persistent(&path)
        .with_context(|| format!("reading session: {}", path.display()))?;
    Ok(Arc::new(session))
}

// ── `onceshare login` / `logout` ──────────────────────────────────────────────

async fn cmd_login(config: &OnceshareConfig, username: &str) -> Result<()> {
    let api = api_client(config)?;
    let session = session(config)?;
    let password = SecretString::from(
        rpassword::prompt_password(format!("Password for {username}: "))
            .context("reading password")?,
    );

    session
        .login(&api, username, &password)
        .await
        .map_err(user_error)?;
    eprintln!("logged in to {}", api.base_url());
    Ok(())
}

async fn cmd_logout(config: &OnceshareConfig) -> Result<()> {
    session(config)?.logout().await.map_err(user_error)?;
    eprintln!("logged out");
    Ok(())
}

// ── `onceshare share` ─────────────────────────────────────────────────────────

async fn cmd_share(
    config: &OnceshareConfig,
    text: Option<String>,
    file: Option<&Path>,
    options: ShareOptions,
) -> Result<()> {
    let api = api_client(config)?;
    let session = session(config)?;

    let route = if file.is_some() {
        Route::Upload
    } else {
        Route::Create
    };
    if route.decide(&session.state().await, config.client.require_login)
        == RouteDecision::RedirectToLogin
    {
        anyhow::bail!("not logged in: run `onceshare login` first");
    }

    let input = read_input(text, file, config.client.max_payload_bytes).await?;
    let codec = PayloadCodec::new(config.client.max_payload_bytes);
    let store = Arc::new(HttpSecretStore::new(api.clone(), session));
    let producer = Producer::new(store, codec, KdfParams::from(&config.crypto));

    let views = options.max_views;
    let created = producer.share(input, options).await.map_err(user_error)?;

    println!("{}", share_link(api.base_url(), &created.reference));
    eprintln!(
        "can be opened {views} time(s), expires in {}s",
        created.expires_at.saturating_sub(onceshare_core::unix_now())
    );
    Ok(())
}

/// Files larger than `max_bytes` are refused before they are read.
async fn read_input(
    text: Option<String>,
    file: Option<&Path>,
    max_bytes: usize,
) -> Result<OriginalInput> {
    if let Some(path) = file {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if size > max_bytes {
            return Err(user_error(ShareError::PayloadTooLarge {
                size,
                max: max_bytes,
            }));
        }
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Ok(OriginalInput::file(name, bytes));
    }

    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading secret from stdin")?;
            buf
        }
    };
    if text.is_empty() {
        anyhow::bail!("nothing to share");
    }
    Ok(OriginalInput::text(text))
}

fn prompt_new_password() -> Result<SecretString> {
    let first = SecretString::from(rpassword::prompt_password("Password: ").context("reading password")?);
    if first.expose_secret().is_empty() {
        anyhow::bail!("empty password");
    }
    let second =
        SecretString::from(rpassword::prompt_password("Repeat password: ").context("reading password")?);
    if first.expose_secret() != second.expose_secret() {
        anyhow::bail!("passwords do not match");
    }
    Ok(first)
}

// ── `onceshare open` ──────────────────────────────────────────────────────────

async fn cmd_open(config: &OnceshareConfig, link: &str, out: Option<&Path>, force: bool) -> Result<()> {
    let api = api_client(config)?;
    let store = Arc::new(HttpSecretStore::new(api, Arc::new(AuthSession::in_memory())));
    let recipient = Recipient::new(store, PayloadCodec::new(config.client.max_payload_bytes));

    let fetched = recipient.fetch(link).await.map_err(user_error)?;

    let recovered = if fetched.needs_password() {
        let mut attempt = 1;
        loop {
            let password = SecretString::from(
                rpassword::prompt_password("Password: ").context("reading password")?,
            );
            match fetched.decrypt(Some(password)).await {
                Ok(input) => break input,
                Err(ShareError::AuthenticationFailed) if attempt < PASSWORD_ATTEMPTS => {
                    eprintln!("{CANNOT_DECRYPT}; try again");
                    attempt += 1;
                }
                Err(e) => return Err(user_error(e)),
            }
        }
    } else {
        fetched.decrypt(None).await.map_err(user_error)?
    };

    match recovered {
        OriginalInput::Text(text) => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            if !text.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
        OriginalInput::File { name, mime, bytes } => {
            let dir = out.unwrap_or_else(|| Path::new("."));
            let path = write_recovered_file(dir, &name, &bytes, force)?;
            eprintln!("wrote {} ({mime}, {} bytes)", path.display(), bytes.len());
        }
    }
    Ok(())
}

/// Write a recovered file under `dir` using its sanitized original name.
fn write_recovered_file(dir: &Path, name: &str, bytes: &[u8], force: bool) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(safe_file_name(name));

    let mut options = std::fs::OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut f = options
        .open(&path)
        .with_context(|| format!("creating {} (use --force to overwrite)", path.display()))?;
    f.write_all(bytes)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

// ── `onceshare config show` ───────────────────────────────────────────────────

fn cmd_config_show(config: &OnceshareConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
