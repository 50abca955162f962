//! onceshare-core: types shared by the producer, the recipient, and the storage service.
//!
//! Nothing in this crate touches key material. The only payload representation
//! defined here is [`EncryptedPayload`], which is what leaves the producer's device.

pub mod api;
pub mod config;
pub mod encoding;
pub mod error;
pub mod types;

pub use error::{ShareError, ShareResult};
pub use types::{EncryptedPayload, Format, PasswordSalt, SecretId, SecretRecord};

/// Current Unix time in whole seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
