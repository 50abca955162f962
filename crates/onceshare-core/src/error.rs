use thiserror::Error;

pub type ShareResult<T> = Result<T, ShareError>;

/// The one message a recipient sees for any cryptographic, codec, or link failure.
pub const CANNOT_DECRYPT: &str = "this secret cannot be decrypted";

/// The one message a recipient sees for a missing, expired, or already-viewed secret.
pub const SECRET_UNAVAILABLE: &str =
    "this secret does not exist, has already been viewed, or has expired";

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("secure randomness unavailable: {0}")]
    WeakRandomnessUnavailable(String),

    #[error("payload too large: {size} bytes (maximum {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("malformed reference: {0}")]
    MalformedReference(String),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// Wrong key, wrong password, or tampered data. Deliberately carries no detail.
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    /// Never existed, already viewed, or expired. Deliberately carries no detail.
    #[error("secret not found")]
    SecretNotFound,

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShareError {
    /// Message safe to show to an end user.
    ///
    /// Every failure on the decryption path collapses into [`CANNOT_DECRYPT`] so a
    /// recipient cannot tell a wrong password from a truncated link from tampered
    /// ciphertext. Producer-side login failures keep the server's message.
    pub fn user_message(&self) -> String {
        match self {
            ShareError::AuthenticationFailed
            | ShareError::CorruptPayload(_)
            | ShareError::MalformedReference(_)
            | ShareError::InvalidReference(_) => CANNOT_DECRYPT.to_string(),
            ShareError::SecretNotFound => SECRET_UNAVAILABLE.to_string(),
            ShareError::Auth(message) => message.clone(),
            ShareError::PayloadTooLarge { max, .. } => {
                format!("the secret is too large (maximum {max} bytes)")
            }
            other => other.to_string(),
        }
    }

    /// Fatal errors abort the operation and should not be retried by the user.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ShareError::WeakRandomnessUnavailable(_))
    }
}
