//! Loans repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, Pool, Postgres, Row};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        loan::{Loan, LoanDetails, LoanStatus},
        user::UserSummary,
    },
};

/// Partial unique index guaranteeing at most one active loan per
/// (user, book) pair; see migrations.
const ACTIVE_LOAN_CONSTRAINT: &str = "loans_one_active_per_user_book";

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert a new active loan. A concurrent duplicate for the same
    /// (user, book) pair trips the partial unique index and surfaces as a
    /// conflict, so no check-then-act window exists.
    pub async fn insert_borrowed<'e>(
        &self,
        executor: impl PgExecutor<'e>,
        user_id: i32,
        book_id: i32,
        borrowed_at: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (user_id, book_id, borrowed_at, due_date, status)
            VALUES ($1, $2, $3, $4, 'borrowed')
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(borrowed_at)
        .bind(due_date)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if AppError::is_unique_violation(&e, ACTIVE_LOAN_CONSTRAINT) {
                AppError::Conflict("You already borrowed this book".to_string())
            } else {
                e.into()
            }
        })
    }

    /// Move a loan to returned. The predicate covers ownership and the
    /// active status in one statement: a loan belonging to another user, an
    /// already-returned loan, and a missing loan all yield `None`.
    pub async fn mark_returned<'e>(
        &self,
        executor: impl PgExecutor<'e>,
        loan_id: i32,
        user_id: i32,
        returned_at: DateTime<Utc>,
    ) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET status = 'returned', returned_at = $1
            WHERE id = $2 AND user_id = $3 AND status = 'borrowed'
            RETURNING *
            "#,
        )
        .bind(returned_at)
        .bind(loan_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(loan)
    }

    /// Active loans for one user, joined with book data, most recent first
    pub async fn list_active_for_user(&self, user_id: i32) -> AppResult<Vec<LoanDetails>> {
        let rows = sqlx::query(
            r#"
            SELECT l.id, l.borrowed_at, l.due_date, l.returned_at, l.status,
                   b.id AS b_id, b.name AS b_name, b.details AS b_details,
                   b.image AS b_image, b.quantity AS b_quantity,
                   b.created_at AS b_created_at, b.updated_at AS b_updated_at
            FROM loans l
            LEFT JOIN books b ON b.id = l.book_id
            WHERE l.user_id = $1 AND l.status = 'borrowed'
            ORDER BY l.borrowed_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let now = Utc::now();
        rows.iter().map(|row| map_loan_row(row, now, false)).collect()
    }

    /// All active loans with book and borrower data, most recent first
    pub async fn list_all_active(&self) -> AppResult<Vec<LoanDetails>> {
        let rows = sqlx::query(
            r#"
            SELECT l.id, l.borrowed_at, l.due_date, l.returned_at, l.status,
                   b.id AS b_id, b.name AS b_name, b.details AS b_details,
                   b.image AS b_image, b.quantity AS b_quantity,
                   b.created_at AS b_created_at, b.updated_at AS b_updated_at,
                   u.id AS u_id, u.email AS u_email, u.role AS u_role,
                   u.created_at AS u_created_at
            FROM loans l
            LEFT JOIN books b ON b.id = l.book_id
            JOIN users u ON u.id = l.user_id
            WHERE l.status = 'borrowed'
            ORDER BY l.borrowed_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let now = Utc::now();
        rows.iter().map(|row| map_loan_row(row, now, true)).collect()
    }
}

/// Map a joined loan row into `LoanDetails`. The book columns come from a
/// LEFT JOIN and may all be NULL when the book was deleted.
fn map_loan_row(
    row: &sqlx::postgres::PgRow,
    now: DateTime<Utc>,
    with_borrower: bool,
) -> AppResult<LoanDetails> {
    let status: LoanStatus = row.try_get("status")?;
    let due_date: DateTime<Utc> = row.try_get("due_date")?;

    let book = match row.try_get::<Option<i32>, _>("b_id")? {
        Some(book_id) => Some(Book {
            id: book_id,
            name: row.try_get("b_name")?,
            details: row.try_get("b_details")?,
            image: row.try_get("b_image")?,
            quantity: row.try_get("b_quantity")?,
            created_at: row.try_get("b_created_at")?,
            updated_at: row.try_get("b_updated_at")?,
        }),
        None => None,
    };

    let borrower = if with_borrower {
        Some(UserSummary {
            id: row.try_get("u_id")?,
            email: row.try_get("u_email")?,
            role: row.try_get("u_role")?,
            created_at: row.try_get("u_created_at")?,
        })
    } else {
        None
    };

    Ok(LoanDetails {
        id: row.try_get("id")?,
        borrowed_at: row.try_get("borrowed_at")?,
        due_date,
        returned_at: row.try_get("returned_at")?,
        status,
        is_overdue: status == LoanStatus::Borrowed && due_date < now,
        book,
        borrower,
    })
}
