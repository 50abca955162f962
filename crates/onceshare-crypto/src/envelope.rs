//! Seal/open: key resolution + AEAD, producing or consuming an `EncryptedPayload`

use onceshare_core::{unix_now, EncryptedPayload, Format, ShareError, ShareResult};
use secrecy::SecretString;
use zeroize::Zeroizing;

use crate::cipher::{decrypt, encrypt, ContentKey};
use crate::kdf::{derive_password_wrap, generate_salt, KdfParams};
use crate::keys::SymmetricKey;

/// Encrypt canonical plaintext bytes for upload.
///
/// With a password, a fresh salt is drawn and stored in the payload together
/// with the work factor; the password itself never leaves this function.
pub fn seal(
    plaintext: &[u8],
    format: Format,
    key: &SymmetricKey,
    password: Option<(&SecretString, &KdfParams)>,
) -> ShareResult<EncryptedPayload> {
    let (content_key, password_salt) = match password {
        None => (ContentKey::resolve(key, None)?, None),
        Some((password, params)) => {
            let salt = generate_salt()?;
            let wrap = derive_password_wrap(password, &salt, params)?;
            (
                ContentKey::resolve(key, Some(&wrap))?,
                Some(params.describe(&salt)),
            )
        }
    };

    let (ciphertext, nonce) = encrypt(plaintext, &content_key, format)?;

    Ok(EncryptedPayload {
        ciphertext,
        nonce: nonce.to_vec(),
        format,
        password: password_salt,
        created_at: unix_now(),
    })
}

/// Decrypt a fetched payload.
///
/// `format` comes from the share reference, not from the storage service, and
/// is authenticated as AAD. A missing or wrong password, a wrong key, and a
/// tampered payload all yield the same `AuthenticationFailed`.
pub fn open(
    payload: &EncryptedPayload,
    format: Format,
    key: &SymmetricKey,
    password: Option<&SecretString>,
) -> ShareResult<Zeroizing<Vec<u8>>> {
    let content_key = match (&payload.password, password) {
        (None, _) => ContentKey::resolve(key, None)?,
        (Some(_), None) => return Err(ShareError::AuthenticationFailed),
        (Some(stored), Some(password)) => {
            let (salt, params) = KdfParams::from_stored(stored)?;
            let wrap = derive_password_wrap(password, &salt, &params)?;
            ContentKey::resolve(key, Some(&wrap))?
        }
    };

    decrypt(&payload.ciphertext, &payload.nonce, &content_key, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::fast_params;
    use crate::keys::generate_key;
    use crate::TAG_SIZE;

    #[test]
    fn test_seal_open_no_password() {
        let key = generate_key().unwrap();
        let payload = seal(b"hello world", Format::Text, &key, None).unwrap();

        assert!(!payload.requires_password());
        assert_eq!(payload.ciphertext.len(), b"hello world".len() + TAG_SIZE);

        let pt = open(&payload, Format::Text, &key, None).unwrap();
        assert_eq!(pt.as_slice(), b"hello world");
    }

    #[test]
    fn test_seal_open_with_password() {
        let key = generate_key().unwrap();
        let password = SecretString::from("p@ss");
        let params = fast_params();

        let payload = seal(b"hello world", Format::Text, &key, Some((&password, &params))).unwrap();
        let stored = payload.password.as_ref().unwrap();
        assert_eq!(stored.salt.len(), crate::SALT_SIZE);
        assert_eq!(stored.mem_cost_kib, params.mem_cost_kib);

        let pt = open(&payload, Format::Text, &key, Some(&password)).unwrap();
        assert_eq!(pt.as_slice(), b"hello world");
    }

    #[test]
    fn test_wrong_or_missing_password() {
        let key = generate_key().unwrap();
        let params = fast_params();
        let payload = seal(
            b"hello world",
            Format::Text,
            &key,
            Some((&SecretString::from("p@ss"), &params)),
        )
        .unwrap();

        let wrong = open(&payload, Format::Text, &key, Some(&SecretString::from("pass")));
        assert!(matches!(wrong, Err(ShareError::AuthenticationFailed)));

        let missing = open(&payload, Format::Text, &key, None);
        assert!(matches!(missing, Err(ShareError::AuthenticationFailed)));
    }

    #[test]
    fn test_password_alone_is_not_enough() {
        let key = generate_key().unwrap();
        let other_key = generate_key().unwrap();
        let password = SecretString::from("p@ss");
        let params = fast_params();

        let payload = seal(b"data", Format::Text, &key, Some((&password, &params))).unwrap();
        let result = open(&payload, Format::Text, &other_key, Some(&password));
        assert!(matches!(result, Err(ShareError::AuthenticationFailed)));
    }

    #[test]
    fn test_reference_format_is_authenticated() {
        let key = generate_key().unwrap();
        let mut payload = seal(b"data", Format::Text, &key, None).unwrap();
        payload.format = Format::File;

        assert!(open(&payload, Format::Text, &key, None).is_ok());
        assert!(matches!(
            open(&payload, Format::File, &key, None),
            Err(ShareError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_salt_swap_fails() {
        let key = generate_key().unwrap();
        let password = SecretString::from("p@ss");
        let params = fast_params();

        let mut payload = seal(b"data", Format::Text, &key, Some((&password, &params))).unwrap();
        if let Some(stored) = payload.password.as_mut() {
            stored.salt[0] ^= 0x01;
        }
        assert!(matches!(
            open(&payload, Format::Text, &key, Some(&password)),
            Err(ShareError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_unusable_stored_params_fail_like_a_wrong_password() {
        let key = generate_key().unwrap();
        let password = SecretString::from("p@ss");
        let params = fast_params();

        let mut payload = seal(b"data", Format::Text, &key, Some((&password, &params))).unwrap();
        if let Some(stored) = payload.password.as_mut() {
            stored.parallelism = 0;
        }
        let err = open(&payload, Format::Text, &key, Some(&password)).unwrap_err();
        assert!(matches!(err, ShareError::AuthenticationFailed), "{err:?}");
        assert_eq!(err.user_message(), onceshare_core::error::CANNOT_DECRYPT);
    }
}
