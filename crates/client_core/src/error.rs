use shared::error::ErrorCode;
use thiserror::Error;

/// Shown when a failing response carries no usable `message`.
pub const GENERIC_FAILURE_MESSAGE: &str = "The server did not say why the request failed.";

#[derive(Debug, Error)]
pub enum ClientError {
    /// Caught client-side before any request is issued; `field` names the
    /// offending input so callers can surface it inline.
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// Any 401, or an operation that needs a token when none is held.
    /// Callers route the user to login instead of rendering an error.
    #[error("not logged in")]
    NotLoggedIn,

    /// The server answered with a non-success envelope.
    #[error("request rejected ({code:?}): {message}")]
    Api { code: ErrorCode, message: String },

    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("session persistence failed: {0}")]
    Persistence(anyhow::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ClientError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ClientError::NotLoggedIn)
    }
}
