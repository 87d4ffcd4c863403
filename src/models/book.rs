//! Book (inventory) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Book model from database. `quantity` is the count of copies currently
/// available for borrowing, never negative.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub name: String,
    pub details: String,
    /// Image URL
    pub image: Option<String>,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create book request (admin only)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Details are required"))]
    pub details: String,
    pub image: Option<String>,
    #[validate(range(min = 0, message = "Quantity must be non-negative"))]
    pub quantity: i32,
}

/// Update book request (admin only). Replaces all editable fields;
/// `quantity` is trusted as an absolute value.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Details are required"))]
    pub details: String,
    pub image: Option<String>,
    #[validate(range(min = 0, message = "Quantity must be non-negative"))]
    pub quantity: i32,
}
