//! API integration tests
//!
//! The router is driven in-process against the in-process store.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use library_server::{
    api::create_router, config::AppConfig, repository::Repository, services::Services, AppState,
};

struct TestApp {
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let config = AppConfig::default();
        let services = Services::new(Repository::memory(), &config.auth);
        Self {
            router: create_router(AppState::new(config, services)),
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    async fn patch(&self, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, token, body).await
    }

    async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, token, None).await
    }

    /// Register a user and return its id
    async fn register(&self, email: &str, name: &str) -> String {
        let (status, body) = self
            .post(
                "/users",
                None,
                json!({ "email": email, "name": name, "password": "password123" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    /// Register a user and log in, returning the bearer token
    async fn token(&self) -> String {
        self.register("librarian@example.com", "Librarian").await;
        let (status, body) = self
            .post(
                "/auth/login",
                None,
                json!({ "email": "librarian@example.com", "password": "password123" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["accessToken"].as_str().unwrap().to_string()
    }

    async fn create_author(&self, token: &str, name: &str) -> String {
        let (status, body) = self
            .post("/authors", Some(token), json!({ "name": name, "birthDate": "1890-09-15" }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    async fn create_book(&self, token: &str, title: &str, author_id: &str) -> String {
        let (status, body) = self
            .post(
                "/books",
                Some(token),
                json!({ "title": title, "authorId": author_id, "publishedAt": "1934-01-01" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }
}

fn days_between(from: &Value, to: &Value) -> i64 {
    let from = chrono::DateTime::parse_from_rfc3339(from.as_str().unwrap()).unwrap();
    let to = chrono::DateTime::parse_from_rfc3339(to.as_str().unwrap()).unwrap();
    let delta = to - from;
    assert_eq!(delta, chrono::Duration::days(delta.num_days()));
    delta.num_days()
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();

    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_login_invalid_credentials() {
    let app = TestApp::new();
    app.register("jane@example.com", "Jane Smith").await;

    let (status, wrong_password) = app
        .post(
            "/auth/login",
            None,
            json!({ "email": "jane@example.com", "password": "wrong" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, unknown_email) = app
        .post(
            "/auth/login",
            None,
            json!({ "email": "nobody@example.com", "password": "password123" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password["message"], unknown_email["message"]);
}

#[tokio::test]
async fn test_me_returns_caller() {
    let app = TestApp::new();
    let token = app.token().await;

    let (status, body) = app.get("/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "librarian@example.com");
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = TestApp::new();

    let (status, body) = app.post("/authors", None, json!({ "name": "Agatha Christie" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthorized");

    for uri in ["/users", "/borrowed-books", "/auth/me"] {
        let (status, _) = app.get(uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
    }

    let (status, _) = app.get("/users", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/authors", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/books", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_register_user() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/users",
            None,
            json!({ "email": "jane@example.com", "name": "Jane Smith", "password": "password123" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "jane@example.com");
    assert!(body.get("password").is_none());

    let (status, body) = app
        .post(
            "/users",
            None,
            json!({ "email": "jane@example.com", "name": "Jane Again", "password": "password123" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Duplicate");

    let (status, _) = app
        .post("/users", None, json!({ "email": "john@example.com", "name": "John" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/users",
            None,
            json!({ "email": "john@example.com", "name": "John", "password": "123" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_directory() {
    let app = TestApp::new();
    let token = app.token().await;
    let jane = app.register("jane@example.com", "Jane Smith").await;

    let (status, body) = app.get("/users", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let users = body.as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("password").is_none()));

    let (status, body) = app.get(&format!("/users/{}", jane), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Jane Smith");

    let (status, _) = app
        .get("/users/00000000-0000-4000-8000-000000000000", Some(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_book_filters() {
    let app = TestApp::new();
    let token = app.token().await;
    let christie = app.create_author(&token, "Agatha Christie").await;
    let martin = app.create_author(&token, "George R.R. Martin").await;
    let orient = app.create_book(&token, "Murder on the Orient Express", &christie).await;
    app.create_book(&token, "A Game of Thrones", &martin).await;
    let jane = app.register("jane@example.com", "Jane Smith").await;

    let (status, _) = app
        .post(
            "/borrowed-books",
            Some(&token),
            json!({ "bookId": orient, "userId": jane }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app.get("/books?search=orient", None).await;
    let found = body.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["title"], "Murder on the Orient Express");
    assert_eq!(found[0]["author"]["name"], "Agatha Christie");
    assert_eq!(found[0]["borrowRecords"][0]["user"]["email"], "jane@example.com");

    let (_, body) = app.get("/books?borrowed=true", None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], orient.as_str());

    let (_, body) = app.get("/books?borrowed=false", None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "A Game of Thrones");

    let (_, body) = app.get(&format!("/books?authorId={}", martin), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "A Game of Thrones");
}

#[tokio::test]
async fn test_book_validation() {
    let app = TestApp::new();
    let token = app.token().await;

    let (status, _) = app
        .post("/books", Some(&token), json!({ "title": "Orphan", "authorId": "42" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/books",
            Some(&token),
            json!({ "title": "Orphan", "authorId": "00000000-0000-4000-8000-000000000000" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.post("/books", Some(&token), json!({ "title": "No author" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_malformed_path_and_query_use_error_body() {
    let app = TestApp::new();
    let token = app.token().await;

    for uri in ["/books/not-a-uuid", "/authors/42", "/books?borrowed=yes", "/books?authorId=x"] {
        let (status, body) = app.get(uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["code"], 5, "{}", uri);
        assert_eq!(body["error"], "BadValue", "{}", uri);
        assert!(body["message"].is_string(), "{}", uri);
    }

    let (status, body) = app.get("/users/not-a-uuid", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    let (status, body) = app
        .patch("/borrowed-books/not-a-uuid/return", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_update_author_and_book() {
    let app = TestApp::new();
    let token = app.token().await;
    let christie = app.create_author(&token, "Agatha Christie").await;
    let book = app.create_book(&token, "Murder on the Orient Expres", &christie).await;

    let (status, body) = app
        .patch(
            &format!("/authors/{}", christie),
            Some(&token),
            Some(json!({ "bio": "Queen of Crime" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Agatha Christie");
    assert_eq!(body["bio"], "Queen of Crime");
    assert_eq!(body["birthDate"], "1890-09-15");

    let (status, body) = app
        .patch(
            &format!("/books/{}", book),
            Some(&token),
            Some(json!({ "title": "Murder on the Orient Express" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Murder on the Orient Express");
    assert_eq!(body["publishedAt"], "1934-01-01");
    assert_eq!(body["author"]["id"], christie.as_str());

    let (status, _) = app
        .patch(
            "/books/00000000-0000-4000-8000-000000000000",
            Some(&token),
            Some(json!({ "title": "Nothing" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_author_cascades() {
    let app = TestApp::new();
    let token = app.token().await;
    let christie = app.create_author(&token, "Agatha Christie").await;
    let book = app.create_book(&token, "Murder on the Orient Express", &christie).await;

    let (status, body) = app.get(&format!("/authors/{}", christie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["books"].as_array().unwrap().len(), 1);

    let (status, body) = app.delete(&format!("/authors/{}", christie), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], christie.as_str());

    let (status, _) = app.get(&format!("/books/{}", book), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get(&format!("/authors/{}", christie), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_book_removes_history() {
    let app = TestApp::new();
    let token = app.token().await;
    let christie = app.create_author(&token, "Agatha Christie").await;
    let book = app.create_book(&token, "Murder on the Orient Express", &christie).await;
    let jane = app.register("jane@example.com", "Jane Smith").await;
    app.post("/borrowed-books", Some(&token), json!({ "bookId": book, "userId": jane }))
        .await;

    let (status, _) = app.delete(&format!("/books/{}", book), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/borrowed-books", Some(&token)).await;
    assert!(body.as_array().unwrap().is_empty());
    let (status, _) = app.delete(&format!("/books/{}", book), Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// Author -> book -> user -> borrow -> refused second borrow -> return ->
/// borrow again by another user
#[tokio::test]
async fn test_borrow_cycle_end_to_end() {
    let app = TestApp::new();
    let token = app.token().await;
    let christie = app.create_author(&token, "Agatha Christie").await;
    let book = app.create_book(&token, "Murder on the Orient Express", &christie).await;
    let jane = app.register("jane@example.com", "Jane Smith").await;
    let john = app.register("john@example.com", "John Doe").await;

    let (status, first) = app
        .post("/borrowed-books", Some(&token), json!({ "bookId": book, "userId": jane }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", first);
    assert_eq!(days_between(&first["borrowedAt"], &first["dueDate"]), 14);
    assert!(first["returnedAt"].is_null());
    assert_eq!(first["book"]["author"]["name"], "Agatha Christie");
    assert_eq!(first["user"]["email"], "jane@example.com");
    assert!(first["user"].get("password").is_none());

    let (status, body) = app
        .post("/borrowed-books", Some(&token), json!({ "bookId": book, "userId": john }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Book is already borrowed");

    let record = first["id"].as_str().unwrap();
    let (status, returned) = app
        .patch(&format!("/borrowed-books/{}/return", record), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(returned["returnedAt"].is_string());

    let (status, body) = app
        .patch(&format!("/borrowed-books/{}/return", record), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Book already returned");

    let (status, second) = app
        .post("/borrowed-books", Some(&token), json!({ "bookId": book, "userId": john }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(second["id"], first["id"]);

    let (_, all) = app.get("/borrowed-books", Some(&token)).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
    assert_eq!(all[0]["id"], second["id"]);

    let (_, janes) = app
        .get(&format!("/borrowed-books/user/{}", jane), Some(&token))
        .await;
    assert_eq!(janes.as_array().unwrap().len(), 1);
    assert_eq!(janes[0]["book"]["title"], "Murder on the Orient Express");

    let (_, details) = app.get(&format!("/books/{}", book), None).await;
    assert_eq!(details["borrowRecords"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_borrow_missing_entities() {
    let app = TestApp::new();
    let token = app.token().await;
    let christie = app.create_author(&token, "Agatha Christie").await;
    let book = app.create_book(&token, "Murder on the Orient Express", &christie).await;
    let missing = "00000000-0000-4000-8000-000000000000";

    let (status, body) = app
        .post("/borrowed-books", Some(&token), json!({ "bookId": missing, "userId": missing }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Book not found");

    let (status, body) = app
        .post("/borrowed-books", Some(&token), json!({ "bookId": book, "userId": missing }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");

    let (status, _) = app
        .patch(&format!("/borrowed-books/{}/return", missing), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
