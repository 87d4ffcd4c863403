//! API handlers for Bookwarden REST endpoints

pub mod auth;
pub mod books;
pub mod health;
pub mod loans;
pub mod openapi;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Name of the session cookie set on login
pub const SESSION_COOKIE: &str = "token";

/// Plain message response body
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Pull the session token from the cookie, falling back to a Bearer header
/// for non-browser clients.
fn session_token(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.to_string())
}

/// Extractor for the authenticated identity, produced once per request and
/// threaded explicitly into handlers
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(parts)
            .ok_or_else(|| AppError::Authentication("Missing session token".to_string()))?;

        let claims = UserClaims::from_token(&token, &state.config.auth.jwt_secret)
            .map_err(|_| AppError::Authentication("Invalid session token".to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Extractor variant that never rejects; yields `None` for missing or
/// invalid sessions. Used by `/auth/me`.
pub struct OptionalUser(pub Option<UserClaims>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = session_token(parts)
            .and_then(|token| UserClaims::from_token(&token, &state.config.auth.jwt_secret).ok());

        Ok(OptionalUser(claims))
    }
}
