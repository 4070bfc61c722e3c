//! Client for the hosted backend service.
//!
//! # Architecture
//!
//! The backend exposes four channels, all reached over HTTPS from the same
//! base URL:
//!
//! - **Tables** - filtered reads and writes against a REST surface
//!   (`/rest/v1/{table}`), no transactional semantics across separate calls
//! - **Functions** - server-side function invocation (`/functions/v1/{name}`),
//!   used for payment-session creation and payment verification
//! - **Auth** - password sign-in/sign-up (`/auth/v1/...`)
//! - **Storage** - binary upload plus public URL resolution (`/storage/v1/...`)
//!
//! plus a websocket **realtime** channel delivering row-change events for a
//! single order. Catalog reads are cached in-memory via `moka` (5-minute
//! TTL); order reads never are.
//!
//! # Example
//!
//! ```rust,ignore
//! use portal_sete_storefront::backend::BackendClient;
//!
//! let backend = BackendClient::new(&config.backend);
//! let products = backend.active_products().await?;
//! let order = backend.create_order(user_id, cart.total()).await?;
//! ```

mod client;
mod realtime;

pub mod auth;
pub mod storage;

pub use client::BackendClient;
pub use realtime::{OrderSubscription, OrderUpdate};

use thiserror::Error;

/// Errors that can occur when talking to the backend service.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The realtime channel could not be established.
    #[error("Realtime error: {0}")]
    Realtime(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::NotFound("product 42".to_string());
        assert_eq!(err.to_string(), "Not found: product 42");

        let err = BackendError::Api {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 503 - unavailable");
    }
}
