//! Password authentication against the backend's auth endpoint.
//!
//! The storefront only needs three operations: sign in, sign up, and a
//! password-reset email trigger. Tokens are held in memory for the session
//! and never persisted.

use portal_sete_core::{Email, UserId};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use super::BackendError;
use super::client::BackendClient;

/// Errors from the auth endpoint.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The backend rejected the credentials.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The email address did not parse.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] portal_sete_core::EmailError),

    /// Transport or API failure.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// An authenticated session.
///
/// Holds the signed-in user's identity plus the bearer token for
/// user-scoped requests.
pub struct AuthSession {
    pub user_id: UserId,
    pub email: Email,
    pub access_token: SecretString,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

#[derive(Deserialize)]
struct AuthUser {
    id: UserId,
    email: String,
}

/// Sign in with email and password.
///
/// # Errors
///
/// Returns [`AuthError::InvalidCredentials`] on a 400-level rejection, or
/// the underlying transport error.
#[instrument(skip(client, password), fields(email = %email))]
pub async fn sign_in(
    client: &BackendClient,
    email: &Email,
    password: &str,
) -> Result<AuthSession, AuthError> {
    let url = format!(
        "{}/auth/v1/token?grant_type=password",
        client.base_url()
    );
    let body = serde_json::json!({
        "email": email.as_str(),
        "password": password,
    });

    token_request(client, &url, &body).await
}

/// Register a new account.
///
/// # Errors
///
/// Returns an error if registration is rejected or the request fails.
#[instrument(skip(client, password), fields(email = %email))]
pub async fn sign_up(
    client: &BackendClient,
    email: &Email,
    password: &str,
) -> Result<AuthSession, AuthError> {
    let url = format!("{}/auth/v1/signup", client.base_url());
    let body = serde_json::json!({
        "email": email.as_str(),
        "password": password,
    });

    token_request(client, &url, &body).await
}

/// Trigger a password-reset email.
///
/// # Errors
///
/// Returns an error if the request fails.
#[instrument(skip(client), fields(email = %email))]
pub async fn reset_password_for_email(
    client: &BackendClient,
    email: &Email,
) -> Result<(), AuthError> {
    let url = format!("{}/auth/v1/recover", client.base_url());
    let body = serde_json::json!({ "email": email.as_str() });

    let response = client
        .http()
        .post(url)
        .header("apikey", client.anon_key())
        .json(&body)
        .send()
        .await
        .map_err(BackendError::from)?;

    let status = response.status();
    if !status.is_success() {
        return Err(BackendError::Api {
            status: status.as_u16(),
            message: response.text().await.map_err(BackendError::from)?,
        }
        .into());
    }

    Ok(())
}

/// Create or update the user's profile row.
///
/// Used right after sign-up and whenever the user edits their name; the
/// write is keyed on the user id so repeats are safe.
///
/// # Errors
///
/// Returns an error if the write fails.
#[instrument(skip(client, session), fields(user_id = %session.user_id))]
pub async fn upsert_profile(
    client: &BackendClient,
    session: &AuthSession,
    full_name: Option<&str>,
) -> Result<(), AuthError> {
    let url = format!("{}/rest/v1/profiles", client.base_url());
    let body = serde_json::json!({
        "id": session.user_id,
        "email": session.email.as_str(),
        "full_name": full_name,
    });

    let response = client
        .http()
        .post(url)
        .header("apikey", client.anon_key())
        .bearer_auth(client.anon_key())
        .header("Prefer", "resolution=merge-duplicates")
        .json(&body)
        .send()
        .await
        .map_err(BackendError::from)?;

    let status = response.status();
    if !status.is_success() {
        return Err(BackendError::Api {
            status: status.as_u16(),
            message: response.text().await.map_err(BackendError::from)?,
        }
        .into());
    }

    Ok(())
}

async fn token_request(
    client: &BackendClient,
    url: &str,
    body: &serde_json::Value,
) -> Result<AuthSession, AuthError> {
    let response = client
        .http()
        .post(url)
        .header("apikey", client.anon_key())
        .json(body)
        .send()
        .await
        .map_err(BackendError::from)?;

    let status = response.status();
    if status.is_client_error() {
        return Err(AuthError::InvalidCredentials);
    }
    if !status.is_success() {
        return Err(BackendError::Api {
            status: status.as_u16(),
            message: response.text().await.map_err(BackendError::from)?,
        }
        .into());
    }

    let token: TokenResponse = response.json().await.map_err(BackendError::from)?;
    let email = Email::parse(&token.user.email)?;

    Ok(AuthSession {
        user_id: token.user.id,
        email,
        access_token: SecretString::from(token.access_token),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_debug_redacts_token() {
        let session = AuthSession {
            user_id: UserId::generate(),
            email: Email::parse("user@example.com").unwrap(),
            access_token: SecretString::from("jwt-goes-here"),
        };

        let rendered = format!("{session:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("jwt-goes-here"));
    }

    #[test]
    fn test_auth_error_display() {
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "invalid credentials"
        );
    }
}
