use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::encoding::b64;
use crate::error::ShareError;

/// Kind of payload a share reference points at.
///
/// This is a closed set: it appears verbatim as the first path segment of every
/// share reference and must round-trip through `Display`/`FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// UTF-8 text
    Text,
    /// Binary file with a filename/MIME header
    File,
}

impl Format {
    pub const ALL: [Format; 2] = [Format::Text, Format::File];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::File => "file",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = ShareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Format::Text),
            "file" => Ok(Format::File),
            other => Err(ShareError::InvalidReference(format!(
                "unknown format '{other}'"
            ))),
        }
    }
}

/// Opaque identifier the storage service assigns to a stored secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretId(Uuid);

impl SecretId {
    pub const LEN: usize = 16;

    /// Fresh random identifier (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        self.0.as_bytes()
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SecretId {
    type Err = ShareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ShareError::SecretNotFound)
    }
}

/// Salt and Argon2id work factor used to derive the password wrapping key.
///
/// Neither value is secret; they are stored next to the ciphertext so the
/// recipient re-derives with exactly the producer's parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordSalt {
    #[serde(with = "b64")]
    pub salt: Vec<u8>,
    pub mem_cost_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

/// The only representation of a secret that reaches the storage service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// XChaCha20-Poly1305 ciphertext with the 16-byte tag appended
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    /// 24-byte nonce, fresh per encryption
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
    pub format: Format,
    /// Present only when the secret is password protected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<PasswordSalt>,
    /// Unix timestamp (seconds) of encryption
    pub created_at: u64,
}

impl EncryptedPayload {
    pub fn requires_password(&self) -> bool {
        self.password.is_some()
    }
}

/// Server-side record of a stored secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub id: SecretId,
    pub payload: EncryptedPayload,
    /// Unix timestamp (seconds) after which the record no longer exists
    pub expires_at: u64,
    pub remaining_views: u32,
}
