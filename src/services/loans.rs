//! Loan management service

use chrono::{Duration, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        loan::{Loan, LoanDetails},
    },
    repository::Repository,
};

/// Fixed loan period
const LOAN_PERIOD_DAYS: i64 = 14;

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
}

impl LoansService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Borrow a book: create an active loan and take one copy.
    ///
    /// Loan insert and quantity decrement run in one transaction, insert
    /// first. The partial unique index rejects a concurrent duplicate
    /// borrow, and the conditional decrement rejects a borrow that lost the
    /// race for the last copy; either failure rolls the whole operation
    /// back.
    pub async fn borrow(&self, user_id: i32, book_id: i32) -> AppResult<LoanDetails> {
        let now = Utc::now();
        let due_date = now + Duration::days(LOAN_PERIOD_DAYS);

        let mut tx = self.repository.pool.begin().await?;

        self.repository
            .books
            .get_by_id_with(&mut *tx, book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        let loan = self
            .repository
            .loans
            .insert_borrowed(&mut *tx, user_id, book_id, now, due_date)
            .await?;

        let book = self
            .repository
            .books
            .decrement_quantity(&mut *tx, book_id)
            .await?
            .ok_or_else(|| AppError::Conflict("Book is not available".to_string()))?;

        tx.commit().await?;

        tracing::info!(user_id, book_id, loan_id = loan.id, "book borrowed");

        Ok(loan_with_book(loan, book))
    }

    /// Return a loan owned by the caller.
    ///
    /// Ownership and active status are part of the update predicate, so a
    /// foreign or already-returned loan comes back as `NotFound`. The
    /// quantity increment is best-effort: a book deleted while on loan
    /// leaves history intact and skips the increment.
    pub async fn return_loan(&self, loan_id: i32, user_id: i32) -> AppResult<LoanDetails> {
        let now = Utc::now();

        let mut tx = self.repository.pool.begin().await?;

        let loan = self
            .repository
            .loans
            .mark_returned(&mut *tx, loan_id, user_id, now)
            .await?
            .ok_or_else(|| AppError::NotFound("Borrowed book not found".to_string()))?;

        let book = self
            .repository
            .books
            .increment_quantity(&mut *tx, loan.book_id)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id, loan_id, book_id = loan.book_id, "book returned");

        Ok(LoanDetails {
            id: loan.id,
            borrowed_at: loan.borrowed_at,
            due_date: loan.due_date,
            returned_at: loan.returned_at,
            status: loan.status,
            is_overdue: false,
            book,
            borrower: None,
        })
    }

    /// Active loans for one user, most recent first
    pub async fn list_active_for_user(&self, user_id: i32) -> AppResult<Vec<LoanDetails>> {
        self.repository.loans.list_active_for_user(user_id).await
    }

    /// All active loans with borrower data, most recent first (admin view)
    pub async fn list_all_active(&self) -> AppResult<Vec<LoanDetails>> {
        self.repository.loans.list_all_active().await
    }
}

fn loan_with_book(loan: Loan, book: Book) -> LoanDetails {
    LoanDetails {
        id: loan.id,
        borrowed_at: loan.borrowed_at,
        due_date: loan.due_date,
        returned_at: loan.returned_at,
        status: loan.status,
        is_overdue: false,
        book: Some(book),
        borrower: None,
    }
}
