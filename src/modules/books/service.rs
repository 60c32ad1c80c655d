use std::sync::Arc;

use super::error::CatalogError;
use super::models::{Book, BookFields};
use super::repository::{BookRepository, StoreError};

/// Business rules over the book store. Every call is a direct pass-through to
/// the repository with validation wrapped around it.
#[derive(Clone)]
pub struct CatalogService {
    repository: Arc<dyn BookRepository>,
}

fn ensure_valid_id(id: i64) -> Result<(), CatalogError> {
    if id > 0 {
        Ok(())
    } else {
        Err(CatalogError::invalid_argument(format!(
            "'{}' is not a valid book id",
            id
        )))
    }
}

fn required_argument<'a>(name: &str, value: &'a str) -> Result<&'a str, CatalogError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::invalid_argument(format!(
            "{} must not be blank",
            name
        )));
    }
    Ok(trimmed)
}

impl CatalogService {
    pub fn new(repository: Arc<dyn BookRepository>) -> Self {
        Self { repository }
    }

    pub async fn list_all(&self) -> Result<Vec<Book>, CatalogError> {
        Ok(self.repository.get_all().await?)
    }

    pub async fn create(&self, fields: BookFields) -> Result<Book, CatalogError> {
        let fields = fields.validated()?;
        self.ensure_isbn_available(&fields.isbn, None).await?;

        let isbn = fields.isbn.clone();
        let book = self
            .repository
            .insert(fields)
            .await
            .map_err(|err| isbn_conflict(err, isbn))?;

        tracing::info!(book_id = book.id, isbn = %book.isbn, "book created");
        Ok(book)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Book, CatalogError> {
        ensure_valid_id(id)?;
        self.repository
            .get_by_id(id)
            .await?
            .ok_or(CatalogError::NotFound { id })
    }

    /// Replace every field of an existing book, keeping its id.
    pub async fn update_by_id(&self, id: i64, fields: BookFields) -> Result<Book, CatalogError> {
        ensure_valid_id(id)?;
        let fields = fields.validated()?;

        if !self.repository.exists_by_id(id).await? {
            return Err(CatalogError::NotFound { id });
        }
        self.ensure_isbn_available(&fields.isbn, Some(id)).await?;

        let isbn = fields.isbn.clone();
        let book = self
            .repository
            .update(Book::from_fields(id, fields))
            .await
            .map_err(|err| isbn_conflict(err, isbn))?
            // Deleted between the existence check and the write.
            .ok_or(CatalogError::NotFound { id })?;

        tracing::info!(book_id = book.id, "book updated");
        Ok(book)
    }

    pub async fn delete_by_id(&self, id: i64) -> Result<(), CatalogError> {
        ensure_valid_id(id)?;
        if !self.repository.delete_by_id(id).await? {
            return Err(CatalogError::NotFound { id });
        }

        tracing::info!(book_id = id, "book deleted");
        Ok(())
    }

    /// Existence check; ids that can never be issued are simply absent.
    pub async fn exists_by_id(&self, id: i64) -> Result<bool, CatalogError> {
        if id <= 0 {
            return Ok(false);
        }
        Ok(self.repository.exists_by_id(id).await?)
    }

    pub async fn total_count(&self) -> Result<u64, CatalogError> {
        Ok(self.repository.count().await?)
    }

    pub async fn find_by_isbn(&self, isbn: &str) -> Result<Book, CatalogError> {
        let isbn = required_argument("isbn", isbn)?;
        self.repository
            .find_by_isbn(isbn)
            .await?
            .ok_or_else(|| CatalogError::IsbnNotFound {
                isbn: isbn.to_string(),
            })
    }

    pub async fn find_by_author(&self, author: &str) -> Result<Vec<Book>, CatalogError> {
        let author = required_argument("author", author)?;
        Ok(self.repository.find_by_author(author).await?)
    }

    pub async fn search_titles(&self, fragment: &str) -> Result<Vec<Book>, CatalogError> {
        let fragment = required_argument("title", fragment)?;
        Ok(self.repository.find_by_title_containing(fragment).await?)
    }

    /// Reject an ISBN held by any book other than `owner`.
    async fn ensure_isbn_available(&self, isbn: &str, owner: Option<i64>) -> Result<(), CatalogError> {
        let taken = match owner {
            None => self.repository.exists_by_isbn(isbn).await?,
            Some(id) => self
                .repository
                .find_by_isbn(isbn)
                .await?
                .is_some_and(|holder| holder.id != id),
        };

        if taken {
            tracing::debug!(%isbn, "isbn already in use");
            return Err(CatalogError::Conflict {
                isbn: isbn.to_string(),
            });
        }
        Ok(())
    }
}

/// A unique violation that slipped past the pre-check is still an ISBN conflict.
fn isbn_conflict(err: StoreError, isbn: String) -> CatalogError {
    match err {
        StoreError::UniqueViolation(_) => CatalogError::Conflict { isbn },
        other => CatalogError::Store(other),
    }
}
