//! onceshare-store: where ciphertext lives between upload and its single retrieval
//!
//! The storage contract is deliberately tiny: `create` and `fetch_and_burn`.
//! Everything the core relies on is the atomicity of `fetch_and_burn`; a missing,
//! expired, or already-viewed secret is reported identically as `SecretNotFound`.

pub mod lifecycle;
pub mod memory;
pub mod store;
pub mod sweeper;

pub use lifecycle::{FetchOutcome, SecretState};
pub use memory::MemoryStore;
pub use store::SecretStore;
pub use sweeper::spawn_sweeper;
