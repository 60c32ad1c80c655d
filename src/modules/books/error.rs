use catalog_http::error::AppError;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use super::repository::StoreError;

/// A single rejected field in a book payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub error: String,
}

impl FieldViolation {
    pub fn new(field: &'static str, error: impl Into<String>) -> Self {
        Self {
            field,
            error: error.into(),
        }
    }
}

/// Failure kinds reported by the catalog service.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Malformed id, unreadable payload, or payload fields that break the schema.
    #[error("{message}")]
    InvalidArgument {
        message: String,
        violations: Vec<FieldViolation>,
    },

    #[error("book {id} not found")]
    NotFound { id: i64 },

    #[error("no book with isbn '{isbn}'")]
    IsbnNotFound { isbn: String },

    #[error("isbn '{isbn}' is already in use")]
    Conflict { isbn: String },

    #[error("book store failure")]
    Store(#[from] StoreError),
}

impl CatalogError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
            violations: Vec::new(),
        }
    }

    pub fn invalid_fields(violations: Vec<FieldViolation>) -> Self {
        Self::InvalidArgument {
            message: "book payload is invalid".to_string(),
            violations,
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        let message = err.to_string();
        match err {
            CatalogError::InvalidArgument { violations, .. } if violations.is_empty() => {
                AppError::bad_request(message)
            }
            CatalogError::InvalidArgument { violations, .. } => AppError::validation(
                violations.iter().map(|v| json!(v)).collect(),
                message,
            ),
            CatalogError::NotFound { .. } | CatalogError::IsbnNotFound { .. } => {
                AppError::not_found(message)
            }
            CatalogError::Conflict { .. } => AppError::conflict(
                vec![json!({"field": "isbn", "error": "already in use"})],
                message,
            ),
            CatalogError::Store(source) => {
                AppError::Internal(anyhow::Error::new(source).context(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn kinds_map_to_statuses() {
        let cases = [
            (CatalogError::invalid_argument("bad id"), StatusCode::BAD_REQUEST),
            (
                CatalogError::invalid_fields(vec![FieldViolation::new("title", "required")]),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (CatalogError::NotFound { id: 3 }, StatusCode::NOT_FOUND),
            (
                CatalogError::IsbnNotFound {
                    isbn: "123".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                CatalogError::Conflict {
                    isbn: "123".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (
                CatalogError::Store(StoreError::Corrupt {
                    id: 1,
                    raw: "x".to_string(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn field_violations_become_details() {
        let err = CatalogError::invalid_fields(vec![FieldViolation::new("isbn", "required")]);
        match AppError::from(err) {
            AppError::Validation { details, .. } => {
                assert_eq!(details, vec![json!({"field": "isbn", "error": "required"})]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
