//! XChaCha20-Poly1305 payload encryption
//!
//! Ciphertext layout:
//! ```text
//! [N bytes: ciphertext][16 bytes: Poly1305 tag]     nonce (24 bytes) stored separately
//! AAD = "onceshare/v1/" || format
//! ```
//!
//! The AAD binds the ciphertext to its declared format, so a storage service
//! that rewrites the format tag produces an authentication failure.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use onceshare_core::{Format, ShareError, ShareResult};
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::kdf::WrappingKey;
use crate::keys::{fill_random, SymmetricKey};
use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

const AAD_PREFIX: &[u8] = b"onceshare/v1/";
const CONTENT_KEY_INFO: &[u8] = b"onceshare/content-key/v1";

/// The key actually handed to the AEAD. Zeroized on drop.
pub struct ContentKey {
    bytes: [u8; KEY_SIZE],
}

impl ContentKey {
    /// Resolve the content key for a secret.
    ///
    /// Without a password the symmetric key is used as is. With a password the
    /// two factors are combined through HKDF-SHA256, so neither the key token
    /// alone nor the password alone is enough to reproduce the content key.
    pub fn resolve(key: &SymmetricKey, wrap: Option<&WrappingKey>) -> ShareResult<Self> {
        match wrap {
            None => Ok(Self {
                bytes: *key.as_bytes(),
            }),
            Some(wrap) => {
                let hkdf = Hkdf::<Sha256>::new(Some(wrap.as_bytes()), key.as_bytes());
                let mut okm = [0u8; KEY_SIZE];
                hkdf.expand(CONTENT_KEY_INFO, &mut okm)
                    .map_err(|e| anyhow::anyhow!("HKDF expand failed: {e}"))?;
                Ok(Self { bytes: okm })
            }
        }
    }

    fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for ContentKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Encrypt `plaintext` under `key`, drawing a fresh random nonce for this call.
///
/// Returns `(ciphertext || tag, nonce)`.
pub fn encrypt(
    plaintext: &[u8],
    key: &ContentKey,
    format: Format,
) -> ShareResult<(Vec<u8>, [u8; NONCE_SIZE])> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    fill_random(&mut nonce_bytes)?;
    let nonce = XNonce::from_slice(&nonce_bytes);

    let aad = build_aad(format);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|e| anyhow::anyhow!("payload encryption failed: {e}"))?;

    Ok((ciphertext, nonce_bytes))
}

/// Decrypt and authenticate.
///
/// Every failure (short input, bad nonce length, wrong key, tampered bytes,
/// mismatched format) is `AuthenticationFailed`; no partial plaintext escapes.
pub fn decrypt(
    ciphertext: &[u8],
    nonce: &[u8],
    key: &ContentKey,
    format: Format,
) -> ShareResult<Zeroizing<Vec<u8>>> {
    if ciphertext.len() < TAG_SIZE || nonce.len() != NONCE_SIZE {
        return Err(ShareError::AuthenticationFailed);
    }

    let nonce = XNonce::from_slice(nonce);
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let aad = build_aad(format);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: &aad,
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| ShareError::AuthenticationFailed)
}

/// Build AAD: "onceshare/v1/" || format
fn build_aad(format: Format) -> Vec<u8> {
    let tag = format.as_str().as_bytes();
    let mut aad = Vec::with_capacity(AAD_PREFIX.len() + tag.len());
    aad.extend_from_slice(AAD_PREFIX);
    aad.extend_from_slice(tag);
    aad
}
