//! HTTP handlers for the books module. Every failure leaves through
//! `AppError`, so no rejection reaches the client in axum's plain-text form.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use catalog_http::error::AppError;
use serde::Deserialize;

use super::error::CatalogError;
use super::models::{parse_book_id, Book, BookFields};
use super::service::CatalogService;

/// Routes relative to the module mount point
pub fn router(service: CatalogService) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/count", get(count_books))
        .route("/search", get(search_books))
        .route("/health", get(health_check))
        .route("/{id}", get(get_book).put(update_book).delete(delete_book))
        .route("/{id}/exists", get(book_exists))
        .with_state(service)
}

fn payload(body: Result<Json<BookFields>, JsonRejection>) -> Result<BookFields, CatalogError> {
    body.map(|Json(fields)| fields).map_err(|rejection| {
        CatalogError::invalid_argument(format!("unreadable book payload: {}", rejection.body_text()))
    })
}

async fn health_check() -> &'static str {
    "books module is healthy"
}

async fn list_books(State(service): State<CatalogService>) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(service.list_all().await?))
}

async fn get_book(
    State(service): State<CatalogService>,
    Path(raw_id): Path<String>,
) -> Result<Json<Book>, AppError> {
    let id = parse_book_id(&raw_id)?;
    Ok(Json(service.get_by_id(id).await?))
}

/// Malformed ids are answered with `false`, never an error.
async fn book_exists(
    State(service): State<CatalogService>,
    Path(raw_id): Path<String>,
) -> Result<Json<bool>, AppError> {
    let exists = match parse_book_id(&raw_id) {
        Ok(id) => service.exists_by_id(id).await?,
        Err(_) => false,
    };
    Ok(Json(exists))
}

async fn count_books(State(service): State<CatalogService>) -> Result<Json<u64>, AppError> {
    Ok(Json(service.total_count().await?))
}

async fn create_book(
    State(service): State<CatalogService>,
    body: Result<Json<BookFields>, JsonRejection>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let book = service.create(payload(body)?).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn update_book(
    State(service): State<CatalogService>,
    Path(raw_id): Path<String>,
    body: Result<Json<BookFields>, JsonRejection>,
) -> Result<Json<Book>, AppError> {
    let id = parse_book_id(&raw_id)?;
    Ok(Json(service.update_by_id(id, payload(body)?).await?))
}

async fn delete_book(
    State(service): State<CatalogService>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_book_id(&raw_id)?;
    service.delete_by_id(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    title: Option<String>,
    author: Option<String>,
    isbn: Option<String>,
}

/// Exactly one of `title`, `author` or `isbn` selects the lookup.
async fn search_books(
    State(service): State<CatalogService>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Book>>, AppError> {
    let books = match (params.title, params.author, params.isbn) {
        (Some(title), None, None) => service.search_titles(&title).await?,
        (None, Some(author), None) => service.find_by_author(&author).await?,
        (None, None, Some(isbn)) => match service.find_by_isbn(&isbn).await {
            Ok(book) => vec![book],
            Err(CatalogError::IsbnNotFound { .. }) => Vec::new(),
            Err(err) => return Err(err.into()),
        },
        _ => {
            return Err(AppError::bad_request(
                "search needs exactly one of 'title', 'author' or 'isbn'",
            ))
        }
    };
    Ok(Json(books))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::repository::tests::test_pool;
    use crate::modules::books::repository::SqliteBookRepository;
    use crate::modules::books::service::tests::UnavailableStore;
    use axum::{body::Body, http::Request, response::Response};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app() -> Router {
        let repository = SqliteBookRepository::new(test_pool().await);
        router(CatalogService::new(Arc::new(repository)))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn send(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn delete(uri: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn dune() -> Value {
        json!({
            "title": "Dune",
            "author": "Herbert",
            "isbn": "9780441013593",
            "description": "Desert planet politics",
            "price": 19.99
        })
    }

    #[tokio::test]
    async fn dune_lifecycle() {
        let router = app().await;

        let response = router.clone().oneshot(send("POST", "/", dune())).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["id"], 1);
        assert_eq!(created["price"], json!(19.99));

        let response = router.clone().oneshot(get("/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, created);

        let mut deluxe = dune();
        deluxe["title"] = json!("Dune (Deluxe)");
        let response = router.clone().oneshot(send("PUT", "/1", deluxe)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert_eq!(updated["id"], 1);
        assert_eq!(updated["title"], "Dune (Deluxe)");

        let response = router.clone().oneshot(delete("/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = router.clone().oneshot(get("/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn list_count_and_exists() {
        let router = app().await;
        router.clone().oneshot(send("POST", "/", dune())).await.unwrap();

        let response = router.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

        let response = router.clone().oneshot(get("/count")).await.unwrap();
        assert_eq!(body_json(response).await, json!(1));

        let response = router.clone().oneshot(get("/1/exists")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!(true));

        let response = router.clone().oneshot(get("/2/exists")).await.unwrap();
        assert_eq!(body_json(response).await, json!(false));

        let response = router.clone().oneshot(get("/abc/exists")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!(false));
    }

    #[tokio::test]
    async fn delete_distinguishes_malformed_from_missing() {
        let router = app().await;

        let response = router.clone().oneshot(delete("/abc")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "bad_request");

        let response = router.clone().oneshot(delete("/0")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router.clone().oneshot(delete("/7")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_ids_and_bodies_are_bad_requests() {
        let router = app().await;
        router.clone().oneshot(send("POST", "/", dune())).await.unwrap();

        let response = router.clone().oneshot(get("/abc")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "bad_request");

        let response = router.clone().oneshot(send("PUT", "/abc", dune())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let request = Request::builder()
            .method("PUT")
            .uri("/1")
            .header("content-type", "application/json")
            .body(Body::from("{\"title\": "))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "bad_request");

        // The stored book is untouched by the rejected update.
        let response = router.clone().oneshot(get("/1")).await.unwrap();
        assert_eq!(body_json(response).await["title"], "Dune");
    }

    #[tokio::test]
    async fn update_of_missing_book_is_not_found() {
        let router = app().await;
        let response = router.oneshot(send("PUT", "/3", dune())).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_payloads_are_rejected() {
        let router = app().await;

        let mut blank = dune();
        blank["title"] = json!("");
        blank.as_object_mut().unwrap().remove("author");
        let response = router.clone().oneshot(send("POST", "/", blank)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "validation_error");
        assert_eq!(body["error"]["details"][0]["field"], "title");
        assert_eq!(body["error"]["details"][1]["field"], "author");

        let response = router.clone().oneshot(send("POST", "/", json!(null))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "bad_request");

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(dune().to_string()))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn duplicate_isbn_is_a_conflict() {
        let router = app().await;
        router.clone().oneshot(send("POST", "/", dune())).await.unwrap();

        let response = router.clone().oneshot(send("POST", "/", dune())).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["error"]["code"], "conflict");
    }

    #[tokio::test]
    async fn search_by_each_key() {
        let router = app().await;
        router.clone().oneshot(send("POST", "/", dune())).await.unwrap();

        for uri in [
            "/search?title=dun",
            "/search?author=Herbert",
            "/search?isbn=9780441013593",
        ] {
            let response = router.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
            assert_eq!(body_json(response).await.as_array().unwrap().len(), 1, "{uri}");
        }

        let response = router.clone().oneshot(get("/search?isbn=000")).await.unwrap();
        assert_eq!(body_json(response).await, json!([]));

        let response = router.clone().oneshot(get("/search")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router
            .clone()
            .oneshot(get("/search?title=a&author=b"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn store_failure_is_an_internal_error() {
        let router = router(CatalogService::new(Arc::new(UnavailableStore)));

        let response = router.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"]["code"], "internal_error");

        let response = router.clone().oneshot(get("/1/exists")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
