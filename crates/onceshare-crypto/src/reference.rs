//! Share references: `/{format}/{keyToken}` or `/{format}/{keyToken}/{passwordToken}`
//!
//! The path is the only thing handed to the recipient. The three-segment form
//! carries the password inside the link itself, which defeats keeping the
//! password out of band (history, referrers, access logs all see it); it exists
//! as an explicit convenience mode and is never produced by default.

use onceshare_core::encoding::{url_decode, url_encode};
use onceshare_core::{Format, SecretId, ShareError, ShareResult};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::keys::{decode_key_token, encode_key_token, SymmetricKey};

#[derive(Clone, PartialEq, Eq)]
pub struct ShareReference {
    pub format: Format,
    pub key_token: String,
    pub password_token: Option<String>,
}

impl ShareReference {
    /// Two-segment reference for a stored secret.
    pub fn new(format: Format, key: &SymmetricKey, id: &SecretId) -> Self {
        Self {
            format,
            key_token: encode_key_token(key, id),
            password_token: None,
        }
    }

    /// Embed the password in the reference (convenience mode).
    pub fn with_embedded_password(mut self, password: &SecretString) -> Self {
        tracing::warn!(
            "embedding the password in the share reference; anyone who sees the link can decrypt"
        );
        self.password_token = Some(url_encode(password.expose_secret().as_bytes()));
        self
    }

    /// Render the reference as a URL path.
    pub fn build(&self) -> String {
        match &self.password_token {
            None => format!("/{}/{}", self.format, self.key_token),
            Some(pw) => format!("/{}/{}/{}", self.format, self.key_token, pw),
        }
    }

    /// Parse a URL path. Exactly two or three non-empty segments are accepted.
    pub fn parse(path: &str) -> ShareResult<Self> {
        let rest = path
            .strip_prefix('/')
            .ok_or_else(|| ShareError::InvalidReference("path must start with '/'".into()))?;

        let segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ShareError::InvalidReference("empty path segment".into()));
        }

        match segments.as_slice() {
            [format, key] => Ok(Self {
                format: format.parse()?,
                key_token: (*key).to_string(),
                password_token: None,
            }),
            [format, key, pw] => Ok(Self {
                format: format.parse()?,
                key_token: (*key).to_string(),
                password_token: Some((*pw).to_string()),
            }),
            other => Err(ShareError::InvalidReference(format!(
                "expected 2 or 3 path segments, got {}",
                other.len()
            ))),
        }
    }

    /// Decode the key token into the symmetric key and the secret id.
    pub fn key(&self) -> ShareResult<(SymmetricKey, SecretId)> {
        decode_key_token(&self.key_token)
    }

    /// Decode an embedded password, if the reference carries one.
    pub fn embedded_password(&self) -> ShareResult<Option<SecretString>> {
        let Some(token) = &self.password_token else {
            return Ok(None);
        };
        let mut raw = url_decode(token)
            .map_err(|e| ShareError::MalformedReference(format!("password token: {e}")))?;
        let password = String::from_utf8(raw.clone()).map_err(|_| {
            ShareError::MalformedReference("password token is not UTF-8".into())
        });
        raw.zeroize();
        Ok(Some(SecretString::from(password?)))
    }
}

impl std::fmt::Debug for ShareReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareReference")
            .field("format", &self.format)
            .field("key_token", &"[REDACTED]")
            .field("password_token", &self.password_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_key;
    use proptest::prelude::*;

    #[test]
    fn test_build_two_segments() {
        let key = generate_key().unwrap();
        let id = SecretId::generate();
        let reference = ShareReference::new(Format::Text, &key, &id);

        let path = reference.build();
        assert!(path.starts_with("/text/"));
        assert_eq!(path.matches('/').count(), 2);

        let parsed = ShareReference::parse(&path).unwrap();
        let (k, i) = parsed.key().unwrap();
        assert_eq!(k.as_bytes(), key.as_bytes());
        assert_eq!(i, id);
        assert!(parsed.embedded_password().unwrap().is_none());
    }

    #[test]
    fn test_embedded_password_roundtrip() {
        let key = generate_key().unwrap();
        let reference = ShareReference::new(Format::File, &key, &SecretId::generate())
            .with_embedded_password(&SecretString::from("p@ss/word?"));

        let path = reference.build();
        assert!(path.starts_with("/file/"));
        assert_eq!(path.matches('/').count(), 3);

        let parsed = ShareReference::parse(&path).unwrap();
        let pw = parsed.embedded_password().unwrap().unwrap();
        assert_eq!(pw.expose_secret(), "p@ss/word?");
    }

    #[test]
    fn test_invalid_shapes() {
        for path in [
            "",
            "text/abc",
            "/",
            "/text",
            "/text/",
            "/text//pw",
            "/text/a/b/c",
            "/image/abc",
            "/text/abc/",
        ] {
            assert!(
                matches!(
                    ShareReference::parse(path),
                    Err(ShareError::InvalidReference(_))
                ),
                "{path:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_bad_key_token_is_malformed() {
        let parsed = ShareReference::parse("/text/not-a-real-token").unwrap();
        assert!(matches!(
            parsed.key(),
            Err(ShareError::MalformedReference(_))
        ));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let key = generate_key().unwrap();
        let reference = ShareReference::new(Format::Text, &key, &SecretId::generate());
        let printed = format!("{reference:?}");
        assert!(!printed.contains(&reference.key_token));
    }

    fn token() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_-]{1,96}"
    }

    proptest! {
        #[test]
        fn build_parse_roundtrip(
            fi in 0usize..Format::ALL.len(),
            key in token(),
            pw in proptest::option::of(token()),
        ) {
            let reference = ShareReference {
                format: Format::ALL[fi],
                key_token: key,
                password_token: pw,
            };
            let parsed = ShareReference::parse(&reference.build()).unwrap();
            prop_assert_eq!(parsed, reference);
        }
    }
}
