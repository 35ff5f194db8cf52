//! Error taxonomy shared by the cart and coupon services.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Cart, line item or coupon target is missing.
    #[error("{0}")]
    NotFound(String),

    /// Business-rule violation. The message is shown to the shopper as-is.
    #[error("{0}")]
    Validation(String),

    /// The cart changed between read and write.
    #[error("{0}")]
    Conflict(String),

    /// Catalog, store or broker failed or timed out.
    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl StoreError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    /// Whether a caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Upstream(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        Self::Upstream(error.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for StoreError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::Upstream("collaborator call timed out".to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
