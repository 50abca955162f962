use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ShareError, ShareResult};

/// Top-level configuration (loaded from onceshare.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OnceshareConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub client: ClientConfig,
    pub crypto: CryptoConfig,
}

impl OnceshareConfig {
    /// Parse a config file. Missing files are the caller's concern.
    pub fn from_file(path: &Path) -> ShareResult<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| ShareError::Config(format!("parsing {}: {e}", path.display())))
    }
}

/// Storage service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address (default: 0.0.0.0:1337)
    pub listen: String,
    /// Prometheus metrics + health endpoint (default: 127.0.0.1:9100)
    pub metrics_addr: Option<String>,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
    /// Maximum accepted ciphertext length in bytes
    pub max_length: usize,
    /// Reject any secret that allows more than one view
    pub force_onetime_secrets: bool,
    /// Longest lifetime a producer may request, in seconds (default: 7 days)
    pub max_expiry_secs: u64,
    /// How often the expiry sweeper runs, in seconds
    pub sweep_interval_secs: u64,
    /// PEM certificate chain; with `tls_key`, both listeners serve HTTPS
    pub tls_cert: Option<PathBuf>,
    /// PEM private key matching `tls_cert`
    pub tls_key: Option<PathBuf>,
}

impl ServerConfig {
    /// Certificate and key paths when TLS is configured. Setting only one of
    /// the two is an error.
    pub fn tls_files(&self) -> ShareResult<Option<(&Path, &Path)>> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Ok(Some((cert, key))),
            (None, None) => Ok(None),
            _ => Err(ShareError::Config(
                "server.tls_cert and server.tls_key must be set together".into(),
            )),
        }
    }
}

/// Admin login settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// "none" (anyone may create) or "token" (bearer token required)
    pub mode: String,
    /// TOML file holding the token signing secret and the admin users
    pub users_file: PathBuf,
    /// Bearer token lifetime in seconds (default: 24h)
    pub token_ttl_secs: u64,
    /// Name of the preset admin created with a fresh users file
    pub preset_admin: String,
}

/// Producer/recipient settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the storage service
    pub server_url: String,
    /// Largest plaintext accepted before any encryption work (bytes)
    pub max_payload_bytes: usize,
    /// Default lifetime of a new secret, in seconds (default: 1h)
    pub default_expiry_secs: u64,
    /// Default number of allowed views
    pub default_views: u32,
    /// Where `login` keeps the bearer token
    pub session_file: PathBuf,
    /// Refuse to encrypt anything before `login` (for servers in token mode)
    pub require_login: bool,
}

/// Password derivation work factor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:1337".into(),
            metrics_addr: Some("127.0.0.1:9100".into()),
            log_level: "info".into(),
            log_format: "json".into(),
            // 10 MiB plaintext ceiling plus headroom for the file header and tag
            max_length: 10 * 1024 * 1024 + 4096,
            force_onetime_secrets: false,
            max_expiry_secs: 7 * 24 * 3600,
            sweep_interval_secs: 60,
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: "none".into(),
            users_file: PathBuf::from("/etc/onceshare/users.toml"),
            token_ttl_secs: 24 * 3600,
            preset_admin: "admin".into(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:1337".into(),
            max_payload_bytes: 10 * 1024 * 1024,
            default_expiry_secs: 3600,
            default_views: 1,
            session_file: PathBuf::from("~/.config/onceshare/session"),
            require_login: false,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
        }
    }
}

/// Expand a leading `~/` against `$HOME`.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
