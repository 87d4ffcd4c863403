//! User management endpoints

use axum::{extract::State, Json};

use crate::{error::AppResult, models::user::UserSummary};

use super::AuthenticatedUser;

/// List all users without credentials (admin only)
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "admin",
    security(("cookie_auth" = [])),
    responses(
        (status = 200, description = "List of users", body = Vec<UserSummary>),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<UserSummary>>> {
    claims.require_admin()?;

    let users = state.services.auth.list_users().await?;
    Ok(Json(users))
}
