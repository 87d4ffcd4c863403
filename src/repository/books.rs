//! Books repository for database operations

use sqlx::{PgExecutor, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, CreateBook, UpdateBook},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Get book by ID on an arbitrary executor, for use inside transactions
    pub async fn get_by_id_with<'e>(
        &self,
        executor: impl PgExecutor<'e>,
        id: i32,
    ) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(book)
    }

    /// List all books, newest first
    pub async fn list(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(books)
    }

    /// Create a new book
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (name, details, image, quantity)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&book.name)
        .bind(&book.details)
        .bind(&book.image)
        .bind(book.quantity)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Update a book. The quantity is written as given, not reconciled
    /// against active loans.
    pub async fn update(&self, id: i32, book: &UpdateBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET name = $1, details = $2, image = $3, quantity = $4, updated_at = now()
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(&book.name)
        .bind(&book.details)
        .bind(&book.image)
        .bind(book.quantity)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Delete a book. Loan history referencing it is kept.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }

        Ok(())
    }

    /// Atomically take one copy. The `quantity > 0` guard makes the
    /// read-modify-write a single conditional statement; `None` means no
    /// copy was available (or the book is gone).
    pub async fn decrement_quantity<'e>(
        &self,
        executor: impl PgExecutor<'e>,
        id: i32,
    ) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET quantity = quantity - 1, updated_at = now()
            WHERE id = $1 AND quantity > 0
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(book)
    }

    /// Atomically put one copy back. `None` when the book was deleted while
    /// on loan; the return flow treats that as a no-op.
    pub async fn increment_quantity<'e>(
        &self,
        executor: impl PgExecutor<'e>,
        id: i32,
    ) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET quantity = quantity + 1, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(book)
    }
}
