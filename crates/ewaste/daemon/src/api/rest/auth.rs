//! Request authentication
//!
//! The credential is read from an `Authorization: Bearer` header, falling
//! back to the `access_token` cookie. The cookie value may itself carry a
//! `Bearer ` prefix.

use super::state::AppState;
use crate::error::ApiError;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use ewaste_types::Principal;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// The resolved caller of a protected endpoint.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Principal);

#[axum::async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let credential = credential_from_headers(&parts.headers)
            .ok_or_else(|| ApiError::Unauthenticated("no credential presented".to_string()))?;

        match state.identity.resolve(&credential).await? {
            Some(principal) => Ok(Authenticated(principal)),
            None => {
                tracing::debug!("unknown credential presented");
                Err(ApiError::Unauthenticated("credential not recognized".to_string()))
            }
        }
    }
}

pub fn credential_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .filter(|value| value.starts_with("Bearer "));

    let from_cookie = || {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE)
            .map(|(_, value)| value.trim_matches('"'))
    };

    from_header
        .or_else(from_cookie)
        .map(strip_bearer)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn strip_bearer(raw: &str) -> &str {
    raw.trim().strip_prefix("Bearer ").unwrap_or(raw).trim()
}
