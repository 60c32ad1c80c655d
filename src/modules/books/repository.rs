use std::str::FromStr;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use thiserror::Error;

use super::models::{Book, BookFields};
use super::schema::BOOKS;

static SELECT_ALL: Lazy<String> =
    Lazy::new(|| format!("SELECT {} FROM {}", BOOKS.select_list(), BOOKS.name));
static INSERT: Lazy<String> = Lazy::new(|| BOOKS.insert_sql());
static UPDATE: Lazy<String> = Lazy::new(|| BOOKS.update_sql());
static TITLE_SEARCH: Lazy<String> = Lazy::new(|| {
    format!(
        "{} WHERE {} LIKE ? ESCAPE '\\' ORDER BY id",
        *SELECT_ALL,
        BOOKS.folded_column("title").unwrap_or("title")
    )
});

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(#[source] sqlx::Error),

    #[error("book {id} holds an unreadable price '{raw}'")]
    Corrupt { id: i64, raw: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let unique = err
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation());
        if unique {
            StoreError::UniqueViolation(err)
        } else {
            StoreError::Database(err)
        }
    }
}

/// Durable storage for books. Absence is reported through `Option`/`bool`,
/// never as an error.
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Persist a new row and return it with its assigned id.
    async fn insert(&self, fields: BookFields) -> Result<Book, StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Book>, StoreError>;

    /// Every book, in insertion order.
    async fn get_all(&self) -> Result<Vec<Book>, StoreError>;

    async fn exists_by_id(&self, id: i64) -> Result<bool, StoreError>;

    /// Overwrite every column of the row with `book.id`; `None` if there is no such row.
    async fn update(&self, book: Book) -> Result<Option<Book>, StoreError>;

    /// `false` when nothing was deleted.
    async fn delete_by_id(&self, id: i64) -> Result<bool, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, StoreError>;

    async fn exists_by_isbn(&self, isbn: &str) -> Result<bool, StoreError>;

    async fn find_by_author(&self, author: &str) -> Result<Vec<Book>, StoreError>;

    /// Case-insensitive substring match on the title.
    async fn find_by_title_containing(&self, fragment: &str) -> Result<Vec<Book>, StoreError>;
}

/// `BookRepository` over a SQLite pool. Each call borrows one pooled
/// connection for its own duration.
#[derive(Clone)]
pub struct SqliteBookRepository {
    pool: SqlitePool,
}

impl SqliteBookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn book_from_row(row: &SqliteRow) -> Result<Book, StoreError> {
    let id: i64 = row.try_get("id")?;
    let price = match row.try_get::<Option<String>, _>("price")? {
        Some(raw) => Some(Decimal::from_str(&raw).map_err(|_| StoreError::Corrupt {
            id,
            raw: raw.clone(),
        })?),
        None => None,
    };

    Ok(Book {
        id,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        isbn: row.try_get("isbn")?,
        description: row.try_get("description")?,
        price,
    })
}

fn books_from_rows(rows: Vec<SqliteRow>) -> Result<Vec<Book>, StoreError> {
    rows.iter().map(book_from_row).collect()
}

/// Unicode lowercase, used for the stored search key and for search fragments alike.
fn fold(text: &str) -> String {
    text.to_lowercase()
}

/// Escape LIKE wildcards so the folded fragment matches literally.
fn like_pattern(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len() + 2);
    escaped.push('%');
    for ch in fold(fragment).chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl BookRepository for SqliteBookRepository {
    async fn insert(&self, fields: BookFields) -> Result<Book, StoreError> {
        let result = sqlx::query(&INSERT)
            .bind(&fields.title)
            .bind(&fields.author)
            .bind(&fields.isbn)
            .bind(&fields.description)
            .bind(fields.price.map(|price| price.to_string()))
            .bind(fold(&fields.title))
            .execute(&self.pool)
            .await?;

        Ok(Book::from_fields(result.last_insert_rowid(), fields))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Book>, StoreError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", *SELECT_ALL))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(book_from_row).transpose()
    }

    async fn get_all(&self) -> Result<Vec<Book>, StoreError> {
        let rows = sqlx::query(&format!("{} ORDER BY id", *SELECT_ALL))
            .fetch_all(&self.pool)
            .await?;
        books_from_rows(rows)
    }

    async fn exists_by_id(&self, id: i64) -> Result<bool, StoreError> {
        let (exists,): (i64,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM books WHERE id = ?)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists != 0)
    }

    async fn update(&self, book: Book) -> Result<Option<Book>, StoreError> {
        let result = sqlx::query(&UPDATE)
            .bind(&book.title)
            .bind(&book.author)
            .bind(&book.isbn)
            .bind(&book.description)
            .bind(book.price.map(|price| price.to_string()))
            .bind(fold(&book.title))
            .bind(book.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(book))
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, StoreError> {
        let row = sqlx::query(&format!("{} WHERE isbn = ?", *SELECT_ALL))
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(book_from_row).transpose()
    }

    async fn exists_by_isbn(&self, isbn: &str) -> Result<bool, StoreError> {
        let (exists,): (i64,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM books WHERE isbn = ?)")
                .bind(isbn)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists != 0)
    }

    async fn find_by_author(&self, author: &str) -> Result<Vec<Book>, StoreError> {
        let rows = sqlx::query(&format!("{} WHERE author = ? ORDER BY id", *SELECT_ALL))
            .bind(author)
            .fetch_all(&self.pool)
            .await?;
        books_from_rows(rows)
    }

    async fn find_by_title_containing(&self, fragment: &str) -> Result<Vec<Book>, StoreError> {
        let rows = sqlx::query(&TITLE_SEARCH)
            .bind(like_pattern(fragment))
            .fetch_all(&self.pool)
            .await?;
        books_from_rows(rows)
    }
}
