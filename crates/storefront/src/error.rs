//! Top-level application error.

use thiserror::Error;

use crate::backend::BackendError;
use crate::backend::auth::AuthError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;

/// Application-level errors surfaced to the UI shell.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Talking to the backend service failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The checkout pipeline failed.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Authentication failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparent_variants_keep_inner_message() {
        let err = StoreError::from(CheckoutError::EmptyCart);
        assert_eq!(err.to_string(), "cart is empty");

        let err = StoreError::from(BackendError::NotFound("order 1".to_string()));
        assert_eq!(err.to_string(), "Not found: order 1");
    }
}
