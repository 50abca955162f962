//! onceshare-auth: who may create secrets
//!
//! Recipients never authenticate. Producers log in with a username and password
//! listed in the users file and receive a short-lived HS256 bearer token that the
//! storage service checks on every create.

pub mod authorizer;
pub mod token;
pub mod users;

pub use authorizer::{AuthMode, Authorizer, Principal};
pub use token::{Claims, TokenIssuer};
pub use users::{UserEntry, UsersFile};
