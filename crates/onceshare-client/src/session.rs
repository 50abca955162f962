//! Producer-side admin session
//!
//! One `AuthSession` per process holds the current bearer token. It is set by
//! a successful login, cleared by logout or by the server rejecting the token,
//! and handed to [`HttpSecretStore`](crate::http::HttpSecretStore) explicitly.

use onceshare_core::{ShareError, ShareResult};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::http::ApiClient;

/// Result of asking the session whether the producer is logged in.
#[derive(Debug, Clone)]
pub enum AuthState {
    Authenticated(SecretString),
    Unauthenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

#[derive(Debug, Default)]
pub struct AuthSession {
    token: RwLock<Option<SecretString>>,
    /// Where the token is persisted between runs; `None` keeps it in memory only.
    path: Option<PathBuf>,
}

impl AuthSession {
    /// Session that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Session backed by a token file, loading any token already there.
    pub fn persistent(path: impl Into<PathBuf>) -> ShareResult<Self> {
        let path = path.into();
        let token = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let trimmed = contents.trim();
                (!trimmed.is_empty()).then(|| SecretString::from(trimmed.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), logged_in = token.is_some(), "session loaded");
        Ok(Self {
            token: RwLock::new(token),
            path: Some(path),
        })
    }

    pub async fn state(&self) -> AuthState {
        match &*self.token.read().await {
            Some(token) => AuthState::Authenticated(token.clone()),
            None => AuthState::Unauthenticated,
        }
    }

    /// Current bearer token, if logged in.
    pub async fn bearer(&self) -> Option<SecretString> {
        self.token.read().await.clone()
    }

    /// Log in against the storage service and keep the issued token.
    pub async fn login(
        &self,
        api: &ApiClient,
        username: &str,
        password: &SecretString,
    ) -> ShareResult<()> {
        let token = api.login(username, password).await?;
        self.set_token(token).await?;
        info!(username, "logged in");
        Ok(())
    }

    pub async fn set_token(&self, token: SecretString) -> ShareResult<()> {
        let mut guard = self.token.write().await;
        if let Some(path) = &self.path {
            write_private(path, token.expose_secret())?;
        }
        *guard = Some(token);
        Ok(())
    }

    /// Forget the token, in memory and on disk.
    pub async fn logout(&self) -> ShareResult<()> {
        let mut guard = self.token.write().await;
        *guard = None;
        if let Some(path) = &self.path {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ShareError::Io(e)),
            }
        }
        Ok(())
    }
}

fn write_private(path: &Path, contents: &str) -> ShareResult<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut f = options.open(path)?;
    f.write_all(contents.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_session() {
        let session = AuthSession::in_memory();
        assert!(!session.state().await.is_authenticated());

        session.set_token(SecretString::from("tok")).await.unwrap();
        match session.state().await {
            AuthState::Authenticated(t) => assert_eq!(t.expose_secret(), "tok"),
            AuthState::Unauthenticated => panic!("expected a token"),
        }

        session.logout().await.unwrap();
        assert!(session.bearer().await.is_none());
    }

    #[tokio::test]
    async fn test_persistent_session_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg/session");

        let session = AuthSession::persistent(&path).unwrap();
        assert!(!session.state().await.is_authenticated());
        session.set_token(SecretString::from("abc.def.ghi")).await.unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let reloaded = AuthSession::persistent(&path).unwrap();
        assert_eq!(
            reloaded.bearer().await.unwrap().expose_secret(),
            "abc.def.ghi"
        );

        reloaded.logout().await.unwrap();
        assert!(!path.exists());
        // Logging out twice is fine.
        reloaded.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_blank_session_file_is_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session");
        std::fs::write(&path, "\n").unwrap();
        let session = AuthSession::persistent(&path).unwrap();
        assert!(!session.state().await.is_authenticated());
    }
}
