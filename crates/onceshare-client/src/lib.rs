//! onceshare-client: the producer and recipient sides of a share
//!
//! ```text
//! Producer:  OriginalInput → encode → seal → SecretStore::create → ShareReference → link
//! Recipient: link → ShareReference → SecretStore::fetch_and_burn → open → decode → OriginalInput
//! ```
//!
//! Both flows are generic over [`SecretStore`](onceshare_store::SecretStore), so
//! they run unchanged against the HTTP service or an in-process store.

pub mod error;
pub mod guard;
pub mod http;
pub mod producer;
pub mod recipient;
pub mod session;

pub use error::ApiError;
pub use guard::{Route, RouteDecision};
pub use http::{ApiClient, HttpSecretStore};
pub use producer::{share_link, CreatedShare, Producer, ShareOptions};
pub use recipient::{reference_from_link, FetchedSecret, Recipient};
pub use session::{AuthSession, AuthState};
