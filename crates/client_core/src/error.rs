use shared::domain::{DraftError, RequestId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Client-correctable; the message is safe to show as-is.
    #[error("{0}")]
    Validation(String),
    #[error("blood request {0} not found")]
    NotFound(RequestId),
    #[error("request service unavailable: {0:#}")]
    Unavailable(#[source] anyhow::Error),
}

impl RepositoryError {
    /// One-line cause suitable for a user-visible notice.
    pub fn user_detail(&self) -> String {
        match self {
            RepositoryError::Validation(message) => message.clone(),
            RepositoryError::NotFound(_) => {
                "The request no longer exists. Please fill out the form again.".to_string()
            }
            RepositoryError::Unavailable(_) => {
                "The request service could not be reached. Please try again.".to_string()
            }
        }
    }
}

impl From<DraftError> for RepositoryError {
    fn from(value: DraftError) -> Self {
        RepositoryError::Validation(value.to_string())
    }
}
