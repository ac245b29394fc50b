use accord_core::IntegrationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("fixture error: {0}")]
    Fixture(String),
}

pub type AdapterResult<T> = Result<T, AdapterError>;

impl From<AdapterError> for IntegrationError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Http(err) if err.is_decode() => IntegrationError::Decode(err.to_string()),
            AdapterError::Http(err) => IntegrationError::Transport(err.to_string()),
            AdapterError::Api { status, message } => IntegrationError::Status {
                status,
                body: message,
            },
            AdapterError::Fixture(message) => IntegrationError::Transport(message),
        }
    }
}
