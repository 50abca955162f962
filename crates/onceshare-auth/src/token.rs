//! HS256 bearer tokens
//!
//! A compact JWT: `base64url(header).base64url(claims).base64url(hmac)`. Only the
//! one fixed header is accepted, so a token cannot talk the verifier into a
//! different algorithm.

use hmac::{Hmac, Mac};
use onceshare_core::encoding::{url_decode, url_encode};
use onceshare_core::{ShareError, ShareResult};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub name: String,
    pub role: String,
    /// Unix seconds
    pub exp: u64,
}

pub struct TokenIssuer {
    secret: Zeroizing<Vec<u8>>,
    ttl_secs: u64,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("secret", &"[REDACTED]")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl TokenIssuer {
    pub fn new(secret: Zeroizing<Vec<u8>>, ttl_secs: u64) -> Self {
        Self { secret, ttl_secs }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    fn mac(&self) -> ShareResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ShareError::Config(format!("token signing secret: {e}")))
    }

    /// Sign a token for `name` valid for the configured lifetime from `now`.
    pub fn issue(&self, name: &str, role: &str, now: u64) -> ShareResult<String> {
        let claims = Claims {
            name: name.to_string(),
            role: role.to_string(),
            exp: now.saturating_add(self.ttl_secs),
        };
        let claims_json =
            serde_json::to_vec(&claims).map_err(|e| ShareError::Other(e.into()))?;

        let signing_input = format!(
            "{}.{}",
            url_encode(HEADER_JSON.as_bytes()),
            url_encode(&claims_json)
        );
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!("{signing_input}.{}", url_encode(&signature)))
    }

    /// Check signature and expiry. Every failure is the same `Auth` error.
    pub fn verify(&self, token: &str, now: u64) -> ShareResult<Claims> {
        let invalid = || ShareError::Auth("invalid or expired token".into());

        let mut parts = token.split('.');
        let (Some(header), Some(claims), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let header_json = url_decode(header).map_err(|_| invalid())?;
        if header_json != HEADER_JSON.as_bytes() {
            return Err(invalid());
        }

        let signature = url_decode(signature).map_err(|_| invalid())?;
        let mut mac = self.mac()?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(claims.as_bytes());
        mac.verify_slice(&signature).map_err(|_| invalid())?;

        let claims_json = url_decode(claims).map_err(|_| invalid())?;
        let claims: Claims = serde_json::from_slice(&claims_json).map_err(|_| invalid())?;
        if now >= claims.exp {
            return Err(invalid());
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(Zeroizing::new(vec![0x42; 64]), 86_400)
    }

    #[test]
    fn test_issue_verify() {
        let issuer = issuer();
        let token = issuer.issue("admin", "admin", 1_000).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = issuer.verify(&token, 1_001).unwrap();
        assert_eq!(claims.name, "admin");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.exp, 1_000 + 86_400);
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = issuer();
        let token = issuer.issue("admin", "admin", 1_000).unwrap();
        assert!(issuer.verify(&token, 1_000 + 86_400).is_err());
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = issuer().issue("admin", "admin", 1_000).unwrap();
        let other = TokenIssuer::new(Zeroizing::new(vec![0x43; 64]), 86_400);
        assert!(matches!(other.verify(&token, 1_001), Err(ShareError::Auth(_))));
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let issuer = issuer();
        let token = issuer.issue("alice", "producer", 1_000).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged = Claims {
            name: "alice".into(),
            role: "admin".into(),
            exp: u64::MAX,
        };
        let forged_claims = url_encode(&serde_json::to_vec(&forged).unwrap());
        let forged_token = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);
        assert!(issuer.verify(&forged_token, 1_001).is_err());
    }

    #[test]
    fn test_alg_none_rejected() {
        let issuer = issuer();
        let token = issuer.issue("admin", "admin", 1_000).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let none_header = url_encode(br#"{"alg":"none","typ":"JWT"}"#);
        let forged = format!("{none_header}.{}.", parts[1]);
        assert!(issuer.verify(&forged, 1_001).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        let issuer = issuer();
        for token in ["", "a.b", "a.b.c.d", "not-a-token", "..."] {
            assert!(issuer.verify(token, 0).is_err(), "{token:?}");
        }
    }
}
