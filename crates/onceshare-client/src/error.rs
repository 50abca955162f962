use onceshare_core::ShareError;
use reqwest::StatusCode;

/// Failure of one call to the storage service, tagged by cause.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 401/403: the server's message is meant for the user.
    #[error("{0}")]
    Auth(String),
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("HTTP status {status}: {message}")]
    Server { status: StatusCode, message: String },
    #[error("not found")]
    NotFound,
}

impl ApiError {
    /// Classify a non-success response.
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Auth(message),
            StatusCode::NOT_FOUND => ApiError::NotFound,
            status => ApiError::Server { status, message },
        }
    }
}

impl From<ApiError> for ShareError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Auth(message) => ShareError::Auth(message),
            ApiError::Network(e) => ShareError::Network(e.to_string()),
            ApiError::UrlParse(e) => ShareError::Config(format!("server URL: {e}")),
            ApiError::Server { status, message } => ShareError::Server {
                status: status.as_u16(),
                message,
            },
            ApiError::NotFound => ShareError::SecretNotFound,
        }
    }
}
