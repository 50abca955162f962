//! Producer flow: encrypt locally, upload ciphertext, hand back a link.

use onceshare_core::{unix_now, SecretId, ShareError, ShareResult};
use onceshare_crypto::{generate_key, seal, KdfParams, OriginalInput, PayloadCodec, ShareReference};
use onceshare_store::SecretStore;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;
use url::Url;

#[derive(Debug, Clone)]
pub struct ShareOptions {
    /// Lifetime in seconds from now.
    pub expiry_secs: u64,
    pub max_views: u32,
    pub password: Option<SecretString>,
    /// Put the password into the link itself. Anyone who sees the link can decrypt.
    pub embed_password: bool,
}

impl Default for ShareOptions {
    fn default() -> Self {
        Self {
            expiry_secs: 3600,
            max_views: 1,
            password: None,
            embed_password: false,
        }
    }
}

#[derive(Debug)]
pub struct CreatedShare {
    pub id: SecretId,
    pub reference: ShareReference,
    pub expires_at: u64,
}

pub struct Producer<S: ?Sized> {
    store: Arc<S>,
    codec: PayloadCodec,
    kdf: KdfParams,
}

impl<S: SecretStore + ?Sized> Producer<S> {
    pub fn new(store: Arc<S>, codec: PayloadCodec, kdf: KdfParams) -> Self {
        Self { store, codec, kdf }
    }

    /// Encrypt `input` and store it.
    ///
    /// Encoding, key generation, and sealing run on the blocking pool because
    /// Argon2id is deliberately slow. The key is dropped (and zeroized) once the
    /// reference is built. If this future is dropped before `create` returns,
    /// no reference exists, so whatever the store may hold is unreachable.
    pub async fn share(&self, input: OriginalInput, options: ShareOptions) -> ShareResult<CreatedShare> {
        let codec = self.codec;
        let kdf = self.kdf;
        let password = options.password.clone();

        let (payload, key) = tokio::task::spawn_blocking(move || {
            let (plaintext, format) = codec.encode(&input)?;
            drop(input);
            let key = generate_key()?;
            let payload = seal(&plaintext, format, &key, password.as_ref().map(|p| (p, &kdf)))?;
            Ok::<_, ShareError>((payload, key))
        })
        .await
        .map_err(|e| ShareError::Other(anyhow::anyhow!("encryption task failed: {e}")))??;

        let format = payload.format;
        let expires_at = unix_now().saturating_add(options.expiry_secs);
        let id = self.store.create(payload, expires_at, options.max_views).await?;

        let mut reference = ShareReference::new(format, &key, &id);
        drop(key);
        if options.embed_password {
            if let Some(password) = &options.password {
                reference = reference.with_embedded_password(password);
            }
        }

        info!(%format, views = options.max_views, expires_at, "secret shared");
        Ok(CreatedShare {
            id,
            reference,
            expires_at,
        })
    }
}

/// Full link for a reference. The reference goes in the fragment, which
/// browsers and HTTP clients never send to the server.
pub fn share_link(base: &Url, reference: &ShareReference) -> Url {
    let mut link = base.clone();
    link.set_fragment(Some(&reference.build()));
    link
}

#[cfg(test)]
mod tests {
    use super::*;
    use onceshare_core::Format;
    use onceshare_crypto::generate_key;

    #[test]
    fn test_share_link_uses_fragment() {
        let base = Url::parse("https://share.example.com/").unwrap();
        let reference = ShareReference::new(Format::Text, &generate_key().unwrap(), &SecretId::generate());
        let link = share_link(&base, &reference);

        assert_eq!(link.path(), "/");
        assert_eq!(link.fragment(), Some(reference.build().as_str()));
    }
}
