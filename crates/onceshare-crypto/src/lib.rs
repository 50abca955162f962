//! onceshare-crypto: everything that happens to a secret before it leaves the device
//!
//! Pipeline (producer):
//! ```text
//! input → PayloadCodec::encode → seal(key[, password]) → EncryptedPayload → upload
//!                                                          ShareReference(format, keyToken(id, key)) → recipient
//! ```
//!
//! Key layout:
//! ```text
//! SymmetricKey (256-bit random, travels only inside the key token)
//!   ├── no password:   content key = SymmetricKey
//!   └── with password: content key = HKDF-SHA256(ikm=SymmetricKey, salt=Argon2id(password, salt))
//! Content AEAD: XChaCha20-Poly1305 (nonce=random 192-bit, AAD="onceshare/v1/"||format)
//! ```

pub mod cipher;
pub mod envelope;
pub mod kdf;
pub mod keys;
pub mod payload;
pub mod reference;

pub use cipher::{decrypt, encrypt, ContentKey};
pub use envelope::{open, seal};
pub use kdf::{derive_password_wrap, generate_salt, KdfParams, WrappingKey};
pub use keys::{decode_key_token, encode_key_token, generate_key, SymmetricKey};
pub use payload::{OriginalInput, PayloadCodec};
pub use reference::ShareReference;

/// Size of a symmetric key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of the Argon2id salt
pub const SALT_SIZE: usize = 16;
