use artsclub_client::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Client error: {0}")]
    Client(#[from] ClientError),
    /// The operation has no endpoint for this resource.
    #[error("Operation {operation} is not supported for {resource}")]
    Unsupported {
        operation: &'static str,
        resource: &'static str,
    },
    #[error("The request was cancelled")]
    Cancelled,
}

impl FetchError {
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Client(error) if error.is_unauthenticated())
    }
}
