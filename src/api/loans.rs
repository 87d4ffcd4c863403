//! Loan management endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, models::loan::LoanDetails};

use super::AuthenticatedUser;

/// Return response with loan details
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    /// Return status
    pub status: String,
    /// Loan details
    pub loan: LoanDetails,
}

/// Current user's active loans, most recent first
#[utoipa::path(
    get,
    path = "/borrowed-books",
    tag = "loans",
    security(("cookie_auth" = [])),
    responses(
        (status = 200, description = "Active loans", body = Vec<LoanDetails>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_borrowed_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.list_active_for_user(claims.user_id).await?;
    Ok(Json(loans))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/borrowed-books/{id}/return",
    tag = "loans",
    security(("cookie_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 404, description = "No active loan with this id for the caller")
    )
)]
pub async fn return_borrowed_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<ReturnResponse>> {
    let loan = state.services.loans.return_loan(loan_id, claims.user_id).await?;

    Ok(Json(ReturnResponse {
        status: "returned".to_string(),
        loan,
    }))
}

/// All active loans with borrower data (admin only)
#[utoipa::path(
    get,
    path = "/admin/borrowed-books",
    tag = "admin",
    security(("cookie_auth" = [])),
    responses(
        (status = 200, description = "All active loans", body = Vec<LoanDetails>),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn list_all_borrowed_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_admin()?;

    let loans = state.services.loans.list_all_active().await?;
    Ok(Json(loans))
}
