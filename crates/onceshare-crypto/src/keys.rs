//! Per-secret key generation and the URL-safe key token

use onceshare_core::encoding::{url_decode, url_encode};
use onceshare_core::{SecretId, ShareError, ShareResult};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use crate::KEY_SIZE;

/// Length of a decoded key token: secret id followed by the key.
const TOKEN_BYTES: usize = SecretId::LEN + KEY_SIZE;

/// Length of an encoded key token (base64url, no padding).
pub const KEY_TOKEN_LEN: usize = (TOKEN_BYTES * 4).div_ceil(3);

/// A per-secret 256-bit key. Zeroized on drop.
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Fill `buf` from the operating system CSPRNG.
///
/// Fails closed: an unavailable randomness source is an error, never a silent
/// fallback to a weaker generator.
pub(crate) fn fill_random(buf: &mut [u8]) -> ShareResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| ShareError::WeakRandomnessUnavailable(e.to_string()))
}

/// Generate a random 256-bit key for one secret.
pub fn generate_key() -> ShareResult<SymmetricKey> {
    let mut bytes = [0u8; KEY_SIZE];
    fill_random(&mut bytes)?;

    // An all-zero draw means the source is broken, not that we got lucky.
    if bytes.iter().all(|b| *b == 0) {
        return Err(ShareError::WeakRandomnessUnavailable(
            "randomness source returned all zero bytes".into(),
        ));
    }

    Ok(SymmetricKey::from_bytes(bytes))
}

/// Encode the secret id and key as one URL-safe path segment.
///
/// Layout before encoding: `[16 bytes: secret id][32 bytes: key]`
pub fn encode_key_token(key: &SymmetricKey, id: &SecretId) -> String {
    let mut raw = [0u8; TOKEN_BYTES];
    raw[..SecretId::LEN].copy_from_slice(id.as_bytes());
    raw[SecretId::LEN..].copy_from_slice(key.as_bytes());
    let token = url_encode(&raw);
    raw.zeroize();
    token
}

/// Inverse of [`encode_key_token`].
///
/// Any deviation from the exact layout fails with `MalformedReference`; a
/// partially decoded key is never returned.
pub fn decode_key_token(token: &str) -> ShareResult<(SymmetricKey, SecretId)> {
    if token.len() != KEY_TOKEN_LEN {
        return Err(ShareError::MalformedReference(format!(
            "key token has {} characters (expected {KEY_TOKEN_LEN})",
            token.len()
        )));
    }

    let mut raw = url_decode(token)
        .map_err(|e| ShareError::MalformedReference(format!("key token: {e}")))?;

    if raw.len() != TOKEN_BYTES {
        raw.zeroize();
        return Err(ShareError::MalformedReference(
            "key token decodes to the wrong length".into(),
        ));
    }

    let mut id_bytes = [0u8; SecretId::LEN];
    id_bytes.copy_from_slice(&raw[..SecretId::LEN]);
    let mut key_bytes = [0u8; KEY_SIZE];
    key_bytes.copy_from_slice(&raw[SecretId::LEN..]);
    raw.zeroize();

    Ok((
        SymmetricKey::from_bytes(key_bytes),
        SecretId::from_bytes(id_bytes),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_generation() {
        let k1 = generate_key().unwrap();
        let k2 = generate_key().unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
        assert_ne!(k1.as_bytes(), &[0u8; KEY_SIZE]);
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = SymmetricKey::from_bytes([0xAB; KEY_SIZE]);
        let printed = format!("{key:?}");
        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains("171"));
    }

    #[test]
    fn test_token_is_one_path_segment() {
        let key = generate_key().unwrap();
        let token = encode_key_token(&key, &SecretId::generate());
        assert_eq!(token.len(), KEY_TOKEN_LEN);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_token_wrong_length() {
        let key = generate_key().unwrap();
        let token = encode_key_token(&key, &SecretId::generate());

        let short = &token[..token.len() - 1];
        assert!(matches!(
            decode_key_token(short),
            Err(ShareError::MalformedReference(_))
        ));

        let long = format!("{token}A");
        assert!(matches!(
            decode_key_token(&long),
            Err(ShareError::MalformedReference(_))
        ));
    }

    #[test]
    fn test_token_bad_alphabet() {
        let bad = "!".repeat(KEY_TOKEN_LEN);
        assert!(matches!(
            decode_key_token(&bad),
            Err(ShareError::MalformedReference(_))
        ));
    }

    proptest! {
        #[test]
        fn token_roundtrip_exact(key in any::<[u8; KEY_SIZE]>(), id in any::<[u8; 16]>()) {
            let key = SymmetricKey::from_bytes(key);
            let id = SecretId::from_bytes(id);
            let token = encode_key_token(&key, &id);
            let (k, i) = decode_key_token(&token).unwrap();
            prop_assert_eq!(k.as_bytes(), key.as_bytes());
            prop_assert_eq!(i, id);
        }
    }
}
