use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::error::{CatalogError, FieldViolation};
use super::schema::{ColumnKind, BOOKS};

/// A catalog entry as persisted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Store-assigned identifier
    pub id: i64,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub description: String,
    /// Price with two fractional digits, if the book is for sale
    pub price: Option<Decimal>,
}

impl Book {
    pub fn from_fields(id: i64, fields: BookFields) -> Self {
        Self {
            id,
            title: fields.title,
            author: fields.author,
            isbn: fields.isbn,
            description: fields.description,
            price: fields.price,
        }
    }
}

/// Request model for creating or replacing a book.
///
/// Any `id` in the payload is ignored. Missing text fields deserialize as
/// empty strings so they are reported by validation, not by the JSON parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookFields {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub isbn: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: Option<Decimal>,
}

impl BookFields {
    /// Trim the text fields, check them against the table definition and
    /// normalize the price.
    pub fn validated(mut self) -> Result<Self, CatalogError> {
        let mut violations = Vec::new();

        for (name, value) in [
            ("title", &mut self.title),
            ("author", &mut self.author),
            ("isbn", &mut self.isbn),
            ("description", &mut self.description),
        ] {
            *value = value.trim().to_string();
            if value.is_empty() {
                violations.push(FieldViolation::new(name, "required"));
                continue;
            }
            let limit = BOOKS.column(name).and_then(|column| column.max_len());
            if let Some(max_len) = limit {
                if value.chars().count() > max_len {
                    violations.push(FieldViolation::new(
                        name,
                        format!("must be at most {} characters", max_len),
                    ));
                }
            }
        }

        if let Some(price) = self.price {
            match normalize_price(price) {
                Ok(normalized) => self.price = Some(normalized),
                Err(reason) => violations.push(FieldViolation::new("price", reason)),
            }
        }

        if violations.is_empty() {
            Ok(self)
        } else {
            Err(CatalogError::invalid_fields(violations))
        }
    }
}

/// Round to the column scale the way a `NUMERIC(10,2)` column would, then make
/// sure the integer part still fits.
fn normalize_price(price: Decimal) -> Result<Decimal, String> {
    let Some(ColumnKind::Decimal { precision, scale }) =
        BOOKS.column("price").map(|column| column.kind)
    else {
        return Ok(price);
    };

    if price.is_sign_negative() && !price.is_zero() {
        return Err("must not be negative".to_string());
    }

    let mut rounded = price.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(scale);

    let integer_digits = precision - scale;
    let limit = Decimal::from(10u64.pow(integer_digits));
    if rounded >= limit {
        return Err(format!(
            "must have at most {} integer digits",
            integer_digits
        ));
    }

    Ok(rounded)
}

/// Parse a path segment into a book id. Ids are positive integers.
pub fn parse_book_id(raw: &str) -> Result<i64, CatalogError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(CatalogError::invalid_argument(format!(
            "'{}' is not a valid book id",
            raw
        ))),
    }
}
