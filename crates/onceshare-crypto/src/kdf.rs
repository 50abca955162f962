//! Password wrapping: Argon2id(password, salt) → 256-bit wrapping key

use argon2::{Algorithm, Argon2, Params, Version};
use onceshare_core::config::CryptoConfig;
use onceshare_core::{PasswordSalt, ShareError, ShareResult};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::keys::fill_random;
use crate::{KEY_SIZE, SALT_SIZE};

/// A 256-bit key derived from the recipient-supplied password.
///
/// Zeroized on drop to prevent secrets lingering in memory.
pub struct WrappingKey {
    bytes: [u8; KEY_SIZE],
}

impl WrappingKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for WrappingKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for WrappingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrappingKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id parameters for the password wrap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl KdfParams {
    /// Upper bounds a recipient accepts from a stored payload (1 GiB, 10 passes, 16 lanes).
    pub const CEILING: KdfParams = KdfParams {
        mem_cost_kib: 1024 * 1024,
        time_cost: 10,
        parallelism: 16,
    };

    pub fn within_ceiling(&self) -> bool {
        self.mem_cost_kib <= Self::CEILING.mem_cost_kib
            && self.time_cost <= Self::CEILING.time_cost
            && self.parallelism <= Self::CEILING.parallelism
    }

    /// Record salt and work factor for storage next to the ciphertext.
    pub fn describe(&self, salt: &[u8; SALT_SIZE]) -> PasswordSalt {
        PasswordSalt {
            salt: salt.to_vec(),
            mem_cost_kib: self.mem_cost_kib,
            time_cost: self.time_cost,
            parallelism: self.parallelism,
        }
    }

    /// Recover salt and parameters from a stored payload.
    ///
    /// Anything out of shape is reported as `AuthenticationFailed`: the stored
    /// parameters are attacker-controlled from the recipient's point of view.
    pub fn from_stored(stored: &PasswordSalt) -> ShareResult<([u8; SALT_SIZE], KdfParams)> {
        let salt: [u8; SALT_SIZE] = stored
            .salt
            .as_slice()
            .try_into()
            .map_err(|_| ShareError::AuthenticationFailed)?;
        let params = KdfParams {
            mem_cost_kib: stored.mem_cost_kib,
            time_cost: stored.time_cost,
            parallelism: stored.parallelism,
        };
        if !params.within_ceiling() {
            tracing::warn!(?params, "stored KDF parameters exceed the accepted ceiling");
            return Err(ShareError::AuthenticationFailed);
        }
        if let Err(e) = params.to_argon2() {
            tracing::warn!(?params, "stored KDF parameters rejected: {e}");
            return Err(ShareError::AuthenticationFailed);
        }
        Ok((salt, params))
    }

    fn to_argon2(&self) -> Result<Params, argon2::Error> {
        Params::new(
            self.mem_cost_kib,
            self.time_cost,
            self.parallelism,
            Some(KEY_SIZE),
        )
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl From<&CryptoConfig> for KdfParams {
    fn from(cfg: &CryptoConfig) -> Self {
        Self {
            mem_cost_kib: cfg.argon2_mem_cost_kib,
            time_cost: cfg.argon2_time_cost,
            parallelism: cfg.argon2_parallelism,
        }
    }
}

/// Draw a fresh random salt.
pub fn generate_salt() -> ShareResult<[u8; SALT_SIZE]> {
    let mut salt = [0u8; SALT_SIZE];
    fill_random(&mut salt)?;
    Ok(salt)
}

/// Derive the password wrapping key with Argon2id.
///
/// Deterministic for a given `(password, salt, params)`; the salt is not secret.
/// This is deliberately slow; async callers should run it on a blocking thread.
pub fn derive_password_wrap(
    password: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> ShareResult<WrappingKey> {
    let argon2_params = params
        .to_argon2()
        .map_err(|e| ShareError::Config(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(password.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| anyhow::anyhow!("Argon2id KDF failed: {e}"))?;

    Ok(WrappingKey::from_bytes(key))
}

#[cfg(test)]
pub(crate) fn fast_params() -> KdfParams {
    KdfParams {
        mem_cost_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    }
}
