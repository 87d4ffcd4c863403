//! Authentication endpoints

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use validator::Validate;

use crate::{
    error::AppResult,
    models::user::{LoginRequest, RegisterRequest, UserSummary},
};

use super::{MessageResponse, OptionalUser, SESSION_COOKIE};

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = UserSummary),
        (status = 400, description = "Missing or malformed fields"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<crate::AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserSummary>)> {
    request.validate()?;

    let user = state.services.auth.register(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Log in and receive a session cookie
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = UserSummary),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<crate::AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<UserSummary>)> {
    request.validate()?;

    let (token, user) = state.services.auth.login(&request.email, &request.password).await?;

    Ok((jar.add(session_cookie(token)), Json(user)))
}

/// Current session's user, or null without a valid session
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user, or null without a valid session", body = UserSummary)
    )
)]
pub async fn me(
    State(state): State<crate::AppState>,
    OptionalUser(claims): OptionalUser,
) -> Json<Option<UserSummary>> {
    let user = match claims {
        Some(claims) => state.services.auth.get_summary(claims.user_id).await.ok(),
        None => None,
    };

    Json(user)
}

/// Log out by clearing the session cookie
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse)
    )
)]
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    let removal = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    (jar.remove(removal), Json(MessageResponse::new("Logged out")))
}
