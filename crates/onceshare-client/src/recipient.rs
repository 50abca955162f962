//! Recipient flow: resolve the link, burn the stored copy, decrypt locally.
//!
//! The link is parsed and both its key token and any embedded password token
//! decoded *before* the store is contacted, so a mangled link never consumes
//! the single view. After the one
//! `fetch_and_burn`, the payload only exists in this process; password retries
//! run against that copy and never go back to the store.

use onceshare_core::{EncryptedPayload, SecretId, ShareError, ShareResult};
use onceshare_crypto::{open, OriginalInput, PayloadCodec, ShareReference, SymmetricKey};
use onceshare_store::SecretStore;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Extract the share reference from whatever the recipient pasted: a full link
/// with the reference in its fragment, a URL whose path is the reference, or
/// the bare path.
pub fn reference_from_link(link: &str) -> ShareResult<ShareReference> {
    let link = link.trim();
    if link.starts_with('/') {
        return ShareReference::parse(link);
    }
    let url = Url::parse(link)
        .map_err(|e| ShareError::InvalidReference(format!("not a link: {e}")))?;
    match url.fragment() {
        Some(fragment) if !fragment.is_empty() => ShareReference::parse(fragment),
        _ => ShareReference::parse(url.path()),
    }
}

pub struct Recipient<S: ?Sized> {
    store: Arc<S>,
    codec: PayloadCodec,
}

impl<S: SecretStore + ?Sized> Recipient<S> {
    pub fn new(store: Arc<S>, codec: PayloadCodec) -> Self {
        Self { store, codec }
    }

    /// Resolve `link` and consume one view of the secret it points to.
    pub async fn fetch(&self, link: &str) -> ShareResult<FetchedSecret> {
        let reference = reference_from_link(link)?;
        let (key, id) = reference.key()?;
        let embedded = reference.embedded_password()?;
        self.fetch_reference(reference, key, embedded, id).await
    }

    async fn fetch_reference(
        &self,
        reference: ShareReference,
        key: SymmetricKey,
        embedded: Option<SecretString>,
        id: SecretId,
    ) -> ShareResult<FetchedSecret> {
        let payload = self.store.fetch_and_burn(&id).await?;
        debug!(format = %reference.format, "secret fetched");
        Ok(FetchedSecret {
            reference,
            key: Arc::new(key),
            embedded,
            payload: Arc::new(payload),
            codec: self.codec,
        })
    }
}

/// A payload that has been burned on the server and is held only here.
pub struct FetchedSecret {
    reference: ShareReference,
    key: Arc<SymmetricKey>,
    embedded: Option<SecretString>,
    payload: Arc<EncryptedPayload>,
    codec: PayloadCodec,
}

impl FetchedSecret {
    /// True when the recipient has to type a password the link does not carry.
    pub fn needs_password(&self) -> bool {
        self.payload.requires_password() && self.embedded.is_none()
    }

    pub fn reference(&self) -> &ShareReference {
        &self.reference
    }

    /// Decrypt and decode. May be called again with another password after an
    /// `AuthenticationFailed`.
    ///
    /// A password embedded in the link is used when `password` is `None`.
    pub async fn decrypt(&self, password: Option<SecretString>) -> ShareResult<OriginalInput> {
        let password = password.or_else(|| self.embedded.clone());
        let key = self.key.clone();
        let payload = self.payload.clone();
        let format = self.reference.format;
        let codec = self.codec;

        tokio::task::spawn_blocking(move || {
            let plaintext = open(&payload, format, &key, password.as_ref())?;
            codec.decode(&plaintext, format)
        })
        .await
        .map_err(|e| ShareError::Other(anyhow::anyhow!("decryption task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onceshare_core::Format;
    use onceshare_crypto::generate_key;

    fn reference() -> ShareReference {
        ShareReference::new(Format::Text, &generate_key().unwrap(), &SecretId::generate())
    }

    #[test]
    fn test_reference_from_fragment_link() {
        let r = reference();
        let link = format!("https://share.example.com/#{}", r.build());
        assert_eq!(reference_from_link(&link).unwrap(), r);
    }

    #[test]
    fn test_reference_from_path_link_and_bare_path() {
        let r = reference();
        let link = format!("https://share.example.com{}", r.build());
        assert_eq!(reference_from_link(&link).unwrap(), r);
        assert_eq!(reference_from_link(&format!("  {}\n", r.build())).unwrap(), r);
    }

    proptest::proptest! {
        #[test]
        fn any_accepted_link_rebuilds_to_itself(link in "\\PC{0,120}") {
            if let Ok(r) = reference_from_link(&link) {
                proptest::prop_assert_eq!(ShareReference::parse(&r.build()).unwrap(), r);
            }
        }
    }

    #[test]
    fn test_bad_links() {
        for link in ["", "hello", "https://share.example.com/", "/text", "/text/a/b/c"] {
            let err = reference_from_link(link).unwrap_err();
            assert!(
                matches!(err, ShareError::InvalidReference(_)),
                "{link:?} gave {err:?}"
            );
        }
    }
}
