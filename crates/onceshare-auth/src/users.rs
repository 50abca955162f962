//! Admin users file (TOML)
//!
//! ```toml
//! secret = "<base64 token signing key>"
//!
//! [[users]]
//! username = "admin"
//! password_hash = "$argon2id$v=19$m=19456,t=2,p=1$..."
//! role = "admin"
//! ```

use anyhow::{Context, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use onceshare_core::encoding::{base64_decode, base64_encode, url_encode};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::Path;
use zeroize::Zeroizing;

const SIGNING_SECRET_LEN: usize = 64;
const PRESET_PASSWORD_BYTES: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub username: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub role: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct UsersFile {
    /// Token signing key, base64
    secret: String,
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

impl std::fmt::Debug for UsersFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsersFile")
            .field("secret", &"[REDACTED]")
            .field("users", &self.users)
            .finish()
    }
}

impl UsersFile {
    /// Fresh file with a random signing key and one admin user with a random
    /// password. The generated password is returned so the operator can be told once.
    pub fn with_preset_admin(username: &str) -> Result<(Self, SecretString)> {
        let mut secret = Zeroizing::new([0u8; SIGNING_SECRET_LEN]);
        OsRng
            .try_fill_bytes(&mut secret[..])
            .context("generating token signing secret")?;

        let mut pw_bytes = Zeroizing::new([0u8; PRESET_PASSWORD_BYTES]);
        OsRng
            .try_fill_bytes(&mut pw_bytes[..])
            .context("generating preset admin password")?;
        let password = SecretString::from(url_encode(&pw_bytes[..]));

        let mut file = Self {
            secret: base64_encode(&secret[..]),
            users: Vec::new(),
        };
        file.add_user(username, &password, "admin")?;
        Ok((file, password))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading users file {}", path.display()))?;
        let file: Self = toml::from_str(&content)
            .with_context(|| format!("parsing users file {}", path.display()))?;
        file.signing_secret()
            .with_context(|| format!("users file {}", path.display()))?;
        Ok(file)
    }

    /// Write the file, readable by the owner only.
    pub fn save(&self, path: &Path) -> Result<()> {
        use std::io::Write;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("serializing users file")?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut f = options
            .open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        f.write_all(content.as_bytes())
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Decoded token signing key.
    pub fn signing_secret(&self) -> Result<Zeroizing<Vec<u8>>> {
        let secret = Zeroizing::new(base64_decode(&self.secret).context("signing secret")?);
        if secret.len() < 32 {
            anyhow::bail!("signing secret is {} bytes (minimum 32)", secret.len());
        }
        Ok(secret)
    }

    /// Add a user, or replace the password and role of an existing one.
    pub fn add_user(&mut self, username: &str, password: &SecretString, role: &str) -> Result<()> {
        let password_hash = hash_password(password)?;
        match self.users.iter_mut().find(|u| u.username == username) {
            Some(existing) => {
                existing.password_hash = password_hash;
                existing.role = role.to_string();
            }
            None => self.users.push(UserEntry {
                username: username.to_string(),
                password_hash,
                role: role.to_string(),
            }),
        }
        Ok(())
    }

    /// The matching user if the credentials are valid.
    pub fn verify(&self, username: &str, password: &SecretString) -> Option<&UserEntry> {
        let user = self.users.iter().find(|u| u.username == username)?;
        let parsed = PasswordHash::new(&user.password_hash).ok()?;
        Argon2::default()
            .verify_password(password.expose_secret().as_bytes(), &parsed)
            .ok()
            .map(|()| user)
    }
}

fn hash_password(password: &SecretString) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .context("generating password salt")?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| anyhow::anyhow!("encoding password salt: {e}"))?;
    let hash = Argon2::default()
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("hashing password: {e}"))?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_admin_can_log_in() {
        let (file, password) = UsersFile::with_preset_admin("admin").unwrap();
        assert_eq!(password.expose_secret().len(), 16);

        let user = file.verify("admin", &password).unwrap();
        assert_eq!(user.role, "admin");
        assert!(user.password_hash.starts_with("$argon2"));
        assert!(file.verify("admin", &SecretString::from("nope")).is_none());
        assert!(file.verify("root", &password).is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/users.toml");

        let (mut file, _) = UsersFile::with_preset_admin("admin").unwrap();
        file.add_user("alice", &SecretString::from("wonderland"), "producer")
            .unwrap();
        file.save(&path).unwrap();

        let loaded = UsersFile::load(&path).unwrap();
        assert_eq!(loaded.users, file.users);
        assert_eq!(
            loaded.signing_secret().unwrap().as_slice(),
            file.signing_secret().unwrap().as_slice()
        );
        assert!(loaded
            .verify("alice", &SecretString::from("wonderland"))
            .is_some());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_add_user_replaces_password() {
        let (mut file, old) = UsersFile::with_preset_admin("admin").unwrap();
        file.add_user("admin", &SecretString::from("changed"), "admin")
            .unwrap();
        assert_eq!(file.users.len(), 1);
        assert!(file.verify("admin", &old).is_none());
        assert!(file.verify("admin", &SecretString::from("changed")).is_some());
    }

    #[test]
    fn test_short_secret_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.toml");
        std::fs::write(&path, "secret = \"c2hvcnQ=\"\n").unwrap();
        assert!(UsersFile::load(&path).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let (file, _) = UsersFile::with_preset_admin("admin").unwrap();
        let printed = format!("{file:?}");
        assert!(!printed.contains(&file.secret));
    }
}
