//! Login and create-permission decisions for the storage service.

use onceshare_core::config::{expand_home, AuthConfig};
use onceshare_core::{ShareError, ShareResult};
use secrecy::SecretString;
use std::str::FromStr;
use tracing::{info, warn};

use crate::token::{Claims, TokenIssuer};
use crate::users::UsersFile;

pub const LOGIN_FAILED: &str = "invalid username or password";
pub const LOGIN_REQUIRED: &str = "login required";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Anyone may create secrets; there is nothing to log in to.
    None,
    /// Creating a secret needs a bearer token from `/login`.
    Token,
}

impl FromStr for AuthMode {
    type Err = ShareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(AuthMode::None),
            "token" => Ok(AuthMode::Token),
            other => Err(ShareError::Config(format!(
                "unknown auth mode {other:?} (expected \"none\" or \"token\")"
            ))),
        }
    }
}

/// Who created a secret, when that is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub role: String,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            name: claims.name,
            role: claims.role,
        }
    }
}

#[derive(Debug)]
pub enum Authorizer {
    Open,
    Token { users: UsersFile, issuer: TokenIssuer },
}

impl Authorizer {
    /// Build from config. In token mode a missing users file is created with a
    /// preset admin whose generated password is logged once at WARN.
    pub fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        match config.mode.parse::<AuthMode>()? {
            AuthMode::None => {
                info!("auth mode none: anyone may create secrets");
                Ok(Authorizer::Open)
            }
            AuthMode::Token => {
                let path = expand_home(&config.users_file);
                let users = if path.exists() {
                    let users = UsersFile::load(&path)?;
                    info!(path = %path.display(), users = users.users.len(), "users file loaded");
                    users
                } else {
                    let (users, password) = UsersFile::with_preset_admin(&config.preset_admin)?;
                    users.save(&path)?;
                    warn!(
                        path = %path.display(),
                        username = %config.preset_admin,
                        password = %secrecy::ExposeSecret::expose_secret(&password),
                        "created users file with preset admin; change this password"
                    );
                    users
                };
                Self::with_users(users, config.token_ttl_secs)
            }
        }
    }

    pub fn with_users(users: UsersFile, token_ttl_secs: u64) -> anyhow::Result<Self> {
        let issuer = TokenIssuer::new(users.signing_secret()?, token_ttl_secs);
        Ok(Authorizer::Token { users, issuer })
    }

    pub fn mode(&self) -> AuthMode {
        match self {
            Authorizer::Open => AuthMode::None,
            Authorizer::Token { .. } => AuthMode::Token,
        }
    }

    /// Exchange credentials for a bearer token.
    ///
    /// Runs Argon2 verification; call it off the async executor.
    pub fn login(&self, username: &str, password: &SecretString, now: u64) -> ShareResult<String> {
        match self {
            Authorizer::Open => Err(ShareError::Auth("login is disabled".into())),
            Authorizer::Token { users, issuer } => match users.verify(username, password) {
                Some(user) => issuer.issue(&user.username, &user.role, now),
                None => Err(ShareError::Auth(LOGIN_FAILED.into())),
            },
        }
    }

    /// Decide whether a create request may proceed, given its bearer token.
    pub fn authorize(&self, bearer: Option<&str>, now: u64) -> ShareResult<Option<Principal>> {
        match self {
            Authorizer::Open => Ok(None),
            Authorizer::Token { issuer, .. } => {
                let token = bearer.ok_or_else(|| ShareError::Auth(LOGIN_REQUIRED.into()))?;
                let claims = issuer.verify(token, now)?;
                Ok(Some(claims.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn token_authorizer() -> (Authorizer, SecretString) {
        let (users, password) = UsersFile::with_preset_admin("admin").unwrap();
        (Authorizer::with_users(users, 3600).unwrap(), password)
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("none".parse::<AuthMode>().unwrap(), AuthMode::None);
        assert_eq!("token".parse::<AuthMode>().unwrap(), AuthMode::Token);
        assert!(matches!(
            "ldap".parse::<AuthMode>(),
            Err(ShareError::Config(_))
        ));
    }

    #[test]
    fn test_open_accepts_everything() {
        let auth = Authorizer::Open;
        assert_eq!(auth.authorize(None, 0).unwrap(), None);
        assert_eq!(auth.authorize(Some("junk"), 0).unwrap(), None);
        assert!(auth.login("admin", &SecretString::from("x"), 0).is_err());
    }

    #[test]
    fn test_login_then_authorize() {
        let (auth, password) = token_authorizer();
        let token = auth.login("admin", &password, 1_000).unwrap();

        let principal = auth.authorize(Some(&token), 1_001).unwrap().unwrap();
        assert_eq!(principal.name, "admin");
        assert_eq!(principal.role, "admin");

        assert!(auth.authorize(Some(&token), 1_000 + 3600).is_err());
    }

    #[test]
    fn test_bad_login_message() {
        let (auth, password) = token_authorizer();
        let err = auth
            .login("admin", &SecretString::from("wrong"), 0)
            .unwrap_err();
        assert_eq!(err.user_message(), LOGIN_FAILED);

        let err = auth.login("nobody", &password, 0).unwrap_err();
        assert_eq!(err.user_message(), LOGIN_FAILED);
    }

    #[test]
    fn test_missing_token_rejected() {
        let (auth, _) = token_authorizer();
        let err = auth.authorize(None, 0).unwrap_err();
        assert_eq!(err.user_message(), LOGIN_REQUIRED);
    }

    #[test]
    fn test_from_config_creates_users_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AuthConfig {
            mode: "token".into(),
            users_file: dir.path().join("users.toml"),
            ..AuthConfig::default()
        };

        let auth = Authorizer::from_config(&config).unwrap();
        assert_eq!(auth.mode(), AuthMode::Token);
        assert!(config.users_file.exists());

        // A second start reuses the same file and signing secret.
        let reloaded = UsersFile::load(&config.users_file).unwrap();
        let again = Authorizer::from_config(&config).unwrap();
        match (&auth, &again) {
            (Authorizer::Token { users: a, .. }, Authorizer::Token { users: b, .. }) => {
                assert_eq!(a.users, b.users);
                assert_eq!(a.users, reloaded.users);
            }
            _ => panic!("expected token mode"),
        }
    }

    #[test]
    fn test_from_config_none() {
        let auth = Authorizer::from_config(&AuthConfig::default()).unwrap();
        assert_eq!(auth.mode(), AuthMode::None);
    }

    #[test]
    fn test_token_from_other_users_file_rejected() {
        let (a, pw) = token_authorizer();
        let (b, _) = token_authorizer();
        let token = a.login("admin", &pw, 0).unwrap();
        assert!(b.authorize(Some(&token), 1).is_err());
        assert!(!pw.expose_secret().is_empty());
    }
}
