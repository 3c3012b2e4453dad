//! Request authentication.
//!
//! User routes carry an identity token issued by the identity provider as
//! `Authorization: Bearer <token>`. Webhook routes carry the shared
//! webhook secret the same way.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use ltm_core::Principal;
use ltm_shared::identity::verify_bearer;
use ltm_store::UserIndex;
use subtle::ConstantTimeEq;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::error::ServerError;

/// The authenticated caller's profile, created on first request.
pub struct AuthUser(pub UserIndex);

impl AuthUser {
    pub fn user_id(&self) -> &str {
        &self.0.user_id
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(provider_key) = state.config.identity_provider_pubkey else {
            return Err(ServerError::Unauthorized(
                "Authentication is disabled (no IDENTITY_PROVIDER_PUBKEY configured)".into(),
            ));
        };

        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ServerError::Unauthorized("Missing bearer token".into()))?;
        let claims = verify_bearer(token, &provider_key)
            .map_err(|e| ServerError::Unauthorized(e.to_string()))?;

        let user = state.chat.lock().await.ensure_user(&Principal::from(claims))?;
        Ok(AuthUser(user))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Check the webhook secret in constant time.
pub fn verify_webhook_secret(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ServerError> {
    let Some(ref expected) = config.webhook_secret else {
        return Err(ServerError::Forbidden(
            "Webhooks are disabled (no WEBHOOK_SECRET configured)".into(),
        ));
    };

    let token = bearer_token(headers).unwrap_or("");
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ServerError::Unauthorized("Invalid webhook secret".into()));
    }

    Ok(())
}
