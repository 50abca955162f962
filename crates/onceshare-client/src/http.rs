//! HTTP transport to the storage service

use async_trait::async_trait;
use onceshare_core::api::{
    CreateSecretRequest, CreateSecretResponse, ErrorBody, LoginRequest, LoginResponse,
    LOGIN_PATH, SECRET_PATH,
};
use onceshare_core::{unix_now, EncryptedPayload, SecretId, ShareResult};
use onceshare_store::SecretStore;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::error::ApiError;
use crate::session::AuthSession;

#[derive(Debug, Clone)]
pub struct ApiClient {
    pub remote: Url,
    client: Client,
}

impl ApiClient {
    pub fn new(remote: &Url) -> Result<Self, ApiError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder().default_headers(default_headers).build()?;

        // Keep any path prefix when joining endpoint paths.
        let mut remote = remote.clone();
        if !remote.path().ends_with('/') {
            let path = format!("{}/", remote.path());
            remote.set_path(&path);
        }

        Ok(Self { remote, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.remote
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.remote.join(path.trim_start_matches('/'))?)
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }
        let text = response.text().await?;
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.message)
            .unwrap_or(text);
        Err(ApiError::from_status(status, message))
    }

    /// Exchange admin credentials for a bearer token.
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<SecretString, ApiError> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.expose_secret().to_string(),
        };
        let response = self
            .client
            .post(self.endpoint(LOGIN_PATH)?)
            .json(&body)
            .send()
            .await?;

        match Self::read::<LoginResponse>(response).await {
            Ok(resp) => Ok(SecretString::from(resp.token)),
            Err(ApiError::NotFound) => Err(ApiError::Auth(
                "this server does not require a login".into(),
            )),
            Err(e) => Err(e),
        }
    }

    pub async fn create_secret(
        &self,
        request: &CreateSecretRequest,
        bearer: Option<&SecretString>,
    ) -> Result<SecretId, ApiError> {
        let mut builder = self.client.post(self.endpoint(SECRET_PATH)?).json(request);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token.expose_secret());
        }
        let response = builder.send().await?;
        Ok(Self::read::<CreateSecretResponse>(response).await?.id)
    }

    pub async fn fetch_secret(&self, id: &SecretId) -> Result<EncryptedPayload, ApiError> {
        let url = self.endpoint(&format!("{SECRET_PATH}/{id}"))?;
        let response = self.client.get(url).send().await?;
        Self::read::<EncryptedPayload>(response).await
    }
}

/// [`SecretStore`] backed by the storage service.
///
/// Creates carry the session's bearer token when there is one; a token the
/// server rejects is dropped from the session.
#[derive(Debug, Clone)]
pub struct HttpSecretStore {
    api: ApiClient,
    session: Arc<AuthSession>,
}

impl HttpSecretStore {
    pub fn new(api: ApiClient, session: Arc<AuthSession>) -> Self {
        Self { api, session }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

#[async_trait]
impl SecretStore for HttpSecretStore {
    async fn create(
        &self,
        payload: EncryptedPayload,
        expires_at: u64,
        max_views: u32,
    ) -> ShareResult<SecretId> {
        let request = CreateSecretRequest {
            payload,
            expiration: expires_at.saturating_sub(unix_now()).max(1),
            max_views: max_views.max(1),
        };
        let bearer = self.session.bearer().await;

        match self.api.create_secret(&request, bearer.as_ref()).await {
            Ok(id) => {
                debug!(expiration = request.expiration, "secret uploaded");
                Ok(id)
            }
            Err(ApiError::Auth(message)) => {
                if bearer.is_some() {
                    warn!("bearer token rejected; clearing session");
                    self.session.logout().await?;
                }
                Err(ApiError::Auth(message).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_and_burn(&self, id: &SecretId) -> ShareResult<EncryptedPayload> {
        Ok(self.api.fetch_secret(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        let api = ApiClient::new(&Url::parse("http://localhost:1337").unwrap()).unwrap();
        assert_eq!(
            api.endpoint(SECRET_PATH).unwrap().as_str(),
            "http://localhost:1337/secret"
        );

        let api = ApiClient::new(&Url::parse("https://example.com/share").unwrap()).unwrap();
        assert_eq!(
            api.endpoint(LOGIN_PATH).unwrap().as_str(),
            "https://example.com/share/login"
        );

        let id = SecretId::generate();
        assert_eq!(
            api.endpoint(&format!("{SECRET_PATH}/{id}")).unwrap().as_str(),
            format!("https://example.com/share/secret/{id}")
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        // Port 9 (discard) on localhost is almost never listening.
        let api = ApiClient::new(&Url::parse("http://127.0.0.1:9").unwrap()).unwrap();
        let store = HttpSecretStore::new(api, Arc::new(AuthSession::in_memory()));
        let err = store.fetch_and_burn(&SecretId::generate()).await.unwrap_err();
        assert!(matches!(err, onceshare_core::ShareError::Network(_)));
    }
}
