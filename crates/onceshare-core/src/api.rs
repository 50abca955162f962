//! JSON bodies exchanged between the client and the storage service.
//!
//! ```text
//! POST /secret        CreateSecretRequest  -> 201 CreateSecretResponse
//! GET  /secret/{id}                        -> 200 EncryptedPayload | 404 ErrorBody
//! POST /login         LoginRequest         -> 200 LoginResponse    | 401 ErrorBody
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{EncryptedPayload, SecretId};

pub const SECRET_PATH: &str = "/secret";
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSecretRequest {
    #[serde(flatten)]
    pub payload: EncryptedPayload,
    /// Lifetime in seconds, counted from the moment the service stores the record
    pub expiration: u64,
    pub max_views: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSecretResponse {
    pub id: SecretId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Format;

    #[test]
    fn create_request_flattens_payload() {
        let req = CreateSecretRequest {
            payload: EncryptedPayload {
                ciphertext: vec![9; 20],
                nonce: vec![7; 24],
                format: Format::Text,
                password: None,
                created_at: 42,
            },
            expiration: 3600,
            max_views: 1,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["format"], "text");
        assert_eq!(json["expiration"], 3600);
        assert_eq!(json["max_views"], 1);

        let back: CreateSecretRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back.payload, req.payload);
    }
}
