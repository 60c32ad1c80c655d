pub mod error;
pub mod models;
pub mod repository;
pub mod routes;
pub mod schema;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use catalog_kernel::{InitCtx, Migration, Module};
use serde_json::{json, Value};
use sqlx::SqlitePool;

use repository::SqliteBookRepository;
use schema::BOOKS;
use service::CatalogService;

/// Book catalog: CRUD over the `books` table.
pub struct BooksModule {
    service: CatalogService,
}

impl BooksModule {
    pub fn new(service: CatalogService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let books = self.service.total_count().await?;
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            books,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.service.clone())
    }

    fn openapi(&self) -> Option<Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration::new("001_create_books", BOOKS.create_sql())]
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Wire the module over a pool: repository → service → module
pub fn create_module(pool: SqlitePool) -> Arc<dyn Module> {
    let repository = SqliteBookRepository::new(pool);
    let service = CatalogService::new(Arc::new(repository));
    Arc::new(BooksModule::new(service))
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn json_response(description: &str, schema: Value) -> Value {
    json!({
        "description": description,
        "content": { "application/json": { "schema": schema } }
    })
}

fn id_parameter() -> Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "integer", "format": "int64", "minimum": 1 }
    })
}

fn book_fields_properties() -> Value {
    let text = |name: &str, description: &str| {
        let max = BOOKS
            .column(name)
            .and_then(|column| column.max_len())
            .unwrap_or_default();
        json!({ "type": "string", "minLength": 1, "maxLength": max, "description": description })
    };

    json!({
        "title": text("title", "Title of the book"),
        "author": text("author", "Author of the book"),
        "isbn": text("isbn", "ISBN, unique across the catalog"),
        "description": text("description", "Description of the book"),
        "price": {
            "type": ["number", "null"],
            "description": "Price with at most two fractional digits"
        }
    })
}

fn openapi_fragment() -> Value {
    let book_ref = json!({ "$ref": "#/components/schemas/Book" });
    let books_array = json!({ "type": "array", "items": book_ref.clone() });
    let fields_body = json!({
        "required": true,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/BookFields" }
            }
        }
    });

    let mut book_properties = book_fields_properties();
    book_properties["id"] = json!({
        "type": "integer",
        "format": "int64",
        "description": "Store-assigned identifier"
    });

    json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List books",
                    "tags": ["Books"],
                    "responses": {
                        "200": json_response("All books in insertion order", books_array.clone()),
                        "500": error_response("Internal server error")
                    }
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": fields_body.clone(),
                    "responses": {
                        "201": json_response("Created book", book_ref.clone()),
                        "400": error_response("Unreadable payload"),
                        "409": error_response("ISBN already in use"),
                        "422": error_response("Invalid fields")
                    }
                }
            },
            "/count": {
                "get": {
                    "summary": "Count books",
                    "tags": ["Books"],
                    "responses": {
                        "200": json_response("Number of books", json!({ "type": "integer" }))
                    }
                }
            },
            "/search": {
                "get": {
                    "summary": "Find books by title fragment, author, or ISBN",
                    "tags": ["Books"],
                    "parameters": [
                        { "name": "title", "in": "query", "schema": { "type": "string" } },
                        { "name": "author", "in": "query", "schema": { "type": "string" } },
                        { "name": "isbn", "in": "query", "schema": { "type": "string" } }
                    ],
                    "responses": {
                        "200": json_response("Matching books", books_array),
                        "400": error_response("Zero or several search keys")
                    }
                }
            },
            "/{id}": {
                "get": {
                    "summary": "Get a book",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "responses": {
                        "200": json_response("The book", book_ref.clone()),
                        "400": error_response("Malformed id"),
                        "404": error_response("Book not found")
                    }
                },
                "put": {
                    "summary": "Replace a book",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "requestBody": fields_body,
                    "responses": {
                        "200": json_response("Updated book", book_ref),
                        "400": error_response("Malformed id or payload"),
                        "404": error_response("Book not found"),
                        "409": error_response("ISBN already in use"),
                        "422": error_response("Invalid fields")
                    }
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "responses": {
                        "204": { "description": "Deleted" },
                        "400": error_response("Malformed id"),
                        "404": error_response("Book not found")
                    }
                }
            },
            "/{id}/exists": {
                "get": {
                    "summary": "Check whether a book exists",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "responses": {
                        "200": json_response("Existence flag", json!({ "type": "boolean" }))
                    }
                }
            },
            "/health": {
                "get": {
                    "summary": "Books health check",
                    "tags": ["Books"],
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": { "text/plain": { "schema": { "type": "string" } } }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": book_properties,
                    "required": ["id", "title", "author", "isbn", "description"]
                },
                "BookFields": {
                    "type": "object",
                    "properties": book_fields_properties(),
                    "required": ["title", "author", "isbn", "description"]
                }
            }
        }
    })
}
