//! API integration tests
//!
//! These run against a live server and database:
//! `cargo run` in one terminal, then `cargo test -- --ignored`.

use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api";

fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to build client")
}

/// Unique email per test run so tests can be re-run against the same
/// database.
fn unique_email(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos();
    format!("{}+{}@example.com", prefix, nanos)
}

/// Register a fresh account and log in; the session cookie lands in the
/// client's cookie store.
async fn register_and_login(client: &Client, email: &str, role: &str) {
    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({ "email": email, "password": "secret1", "role": role }))
        .send()
        .await
        .expect("Failed to send register request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": email, "password": "secret1" }))
        .send()
        .await
        .expect("Failed to send login request");
    assert_eq!(response.status(), StatusCode::OK);
}

/// Create a book through an admin session and return its id
async fn create_book(admin: &Client, name: &str, quantity: i32) -> i64 {
    let response = admin
        .post(format!("{}/books", BASE_URL))
        .json(&json!({
            "name": name,
            "details": "integration test book",
            "quantity": quantity
        }))
        .send()
        .await
        .expect("Failed to send create book request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.expect("Failed to parse book");
    body["id"].as_i64().expect("No book id")
}

async fn book_quantity(client: &Client, book_id: i64) -> i64 {
    let response = client
        .get(format!("{}/books", BASE_URL))
        .send()
        .await
        .expect("Failed to list books");
    assert!(response.status().is_success());

    let books: Vec<Value> = response.json().await.expect("Failed to parse books");
    books
        .iter()
        .find(|b| b["id"].as_i64() == Some(book_id))
        .map(|b| b["quantity"].as_i64().expect("quantity not a number"))
        .expect("book not in listing")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let response = client()
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_register_login_me() {
    let client = client();
    let email = unique_email("alice");
    register_and_login(&client, &email, "user").await;

    let response = client
        .get(format!("{}/auth/me", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["email"], email.as_str());
    assert_eq!(body["role"], "user");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
#[ignore]
async fn test_me_without_session_is_null() {
    let response = client()
        .get(format!("{}/auth/me", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body.is_null());
}

#[tokio::test]
#[ignore]
async fn test_logout_clears_session() {
    let client = client();
    register_and_login(&client, &unique_email("leaver"), "user").await;

    let response = client
        .post(format!("{}/auth/logout", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body: Value = client
        .get(format!("{}/auth/me", BASE_URL))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert!(body.is_null());
}

#[tokio::test]
#[ignore]
async fn test_register_duplicate_email_conflict() {
    let client = client();
    let email = unique_email("dup");

    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({ "email": email, "password": "secret1" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({ "email": email, "password": "secret1" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn test_register_missing_fields() {
    let response = client()
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({ "email": "not-an-email", "password": "secret1" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = client();
    let email = unique_email("badpass");
    register_and_login(&client, &email, "user").await;

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": email, "password": "wrong" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_borrow_requires_session() {
    let response = client()
        .post(format!("{}/books/1/borrow", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_non_admin_is_forbidden() {
    let client = client();
    register_and_login(&client, &unique_email("plain"), "user").await;

    let response = client
        .post(format!("{}/books", BASE_URL))
        .json(&json!({ "name": "x", "details": "y", "quantity": 1 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    for path in ["admin/borrowed-books", "admin/users"] {
        let response = client
            .get(format!("{}/{}", BASE_URL, path))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "path: {}", path);
    }
}

#[tokio::test]
#[ignore]
async fn test_admin_book_crud() {
    let admin = client();
    register_and_login(&admin, &unique_email("admin"), "admin").await;

    let book_id = create_book(&admin, "CRUD Test Book", 3).await;

    let response = admin
        .put(format!("{}/books/{}", BASE_URL, book_id))
        .json(&json!({
            "name": "CRUD Test Book (2nd ed.)",
            "details": "updated",
            "quantity": 5
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("Failed to parse book");
    assert_eq!(body["quantity"], 5);
    assert_eq!(body["name"], "CRUD Test Book (2nd ed.)");

    let response = admin
        .delete(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let response = admin
        .delete(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_borrow_unavailable_book_conflict() {
    let admin = client();
    register_and_login(&admin, &unique_email("admin"), "admin").await;
    let book_id = create_book(&admin, "Out of Stock", 0).await;

    let user = client();
    register_and_login(&user, &unique_email("reader"), "user").await;

    let response = user
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    assert_eq!(book_quantity(&user, book_id).await, 0);
}

#[tokio::test]
#[ignore]
async fn test_borrow_missing_book_not_found() {
    let user = client();
    register_and_login(&user, &unique_email("reader"), "user").await;

    let response = user
        .post(format!("{}/books/999999999/borrow", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_borrow_conflict() {
    let admin = client();
    register_and_login(&admin, &unique_email("admin"), "admin").await;
    let book_id = create_book(&admin, "Popular Book", 2).await;

    let user = client();
    register_and_login(&user, &unique_email("eager"), "user").await;

    let response = user
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = user
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Only one copy actually left the shelf
    assert_eq!(book_quantity(&user, book_id).await, 1);
}

#[tokio::test]
#[ignore]
async fn test_return_other_users_loan_not_found() {
    let admin = client();
    register_and_login(&admin, &unique_email("admin"), "admin").await;
    let book_id = create_book(&admin, "Owned Loan Book", 1).await;

    let alice = client();
    register_and_login(&alice, &unique_email("alice"), "user").await;

    let response = alice
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let loan: Value = response.json().await.expect("Failed to parse loan");
    let loan_id = loan["id"].as_i64().expect("No loan id");

    let bob = client();
    register_and_login(&bob, &unique_email("bob"), "user").await;

    let response = bob
        .post(format!("{}/borrowed-books/{}/return", BASE_URL, loan_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The owner can return it, exactly once
    let response = alice
        .post(format!("{}/borrowed-books/{}/return", BASE_URL, loan_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let response = alice
        .post(format!("{}/borrowed-books/{}/return", BASE_URL, loan_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_borrow_return_lifecycle() {
    let admin = client();
    register_and_login(&admin, &unique_email("admin"), "admin").await;
    let book_id = create_book(&admin, "Dune", 1).await;

    let alice = client();
    register_and_login(&alice, &unique_email("alice"), "user").await;
    let bob = client();
    register_and_login(&bob, &unique_email("bob"), "user").await;

    // Alice borrows the only copy
    let response = alice
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let loan: Value = response.json().await.expect("Failed to parse loan");
    let loan_id = loan["id"].as_i64().expect("No loan id");
    assert_eq!(loan["status"], "borrowed");

    // Due date is exactly 14 days after the borrow timestamp
    let borrowed_at: DateTime<Utc> = loan["borrowed_at"]
        .as_str()
        .expect("No borrowed_at")
        .parse()
        .expect("Bad borrowed_at");
    let due_date: DateTime<Utc> = loan["due_date"]
        .as_str()
        .expect("No due_date")
        .parse()
        .expect("Bad due_date");
    assert_eq!(due_date - borrowed_at, Duration::days(14));

    assert_eq!(book_quantity(&alice, book_id).await, 0);

    // Alice sees the loan in her active list
    let loans: Vec<Value> = alice
        .get(format!("{}/borrowed-books", BASE_URL))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse loans");
    assert!(loans.iter().any(|l| l["id"].as_i64() == Some(loan_id)));

    // Bob cannot borrow: no copies left
    let response = bob
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Alice returns; the copy is back on the shelf
    let response = alice
        .post(format!("{}/borrowed-books/{}/return", BASE_URL, loan_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse return");
    assert_eq!(body["loan"]["status"], "returned");
    assert!(!body["loan"]["returned_at"].is_null());

    assert_eq!(book_quantity(&alice, book_id).await, 1);

    // Now Bob can borrow it
    let response = bob
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);

    assert_eq!(book_quantity(&bob, book_id).await, 0);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_borrows_single_copy() {
    let admin = client();
    register_and_login(&admin, &unique_email("admin"), "admin").await;
    let book_id = create_book(&admin, "Contended Book", 1).await;

    // Five distinct users race for one copy
    let mut clients = Vec::new();
    for i in 0..5 {
        let c = client();
        register_and_login(&c, &unique_email(&format!("racer{}", i)), "user").await;
        clients.push(c);
    }

    let statuses = futures::future::join_all(clients.iter().map(|c| async {
        c.post(format!("{}/books/{}/borrow", BASE_URL, book_id))
            .send()
            .await
            .expect("Failed to send request")
            .status()
    }))
    .await;

    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    let conflicts = statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count();

    assert_eq!(created, 1, "statuses: {:?}", statuses);
    assert_eq!(conflicts, 4, "statuses: {:?}", statuses);
    assert_eq!(book_quantity(&admin, book_id).await, 0);
}

#[tokio::test]
#[ignore]
async fn test_admin_sees_all_active_loans() {
    let admin = client();
    register_and_login(&admin, &unique_email("admin"), "admin").await;
    let book_id = create_book(&admin, "Audited Book", 1).await;

    let user = client();
    let email = unique_email("watched");
    register_and_login(&user, &email, "user").await;

    let response = user
        .post(format!("{}/books/{}/borrow", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let loan: Value = response.json().await.expect("Failed to parse loan");
    let loan_id = loan["id"].as_i64().expect("No loan id");

    let loans: Vec<Value> = admin
        .get(format!("{}/admin/borrowed-books", BASE_URL))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse loans");

    let entry = loans
        .iter()
        .find(|l| l["id"].as_i64() == Some(loan_id))
        .expect("loan missing from admin view");
    assert_eq!(entry["borrower"]["email"], email.as_str());
}

#[tokio::test]
#[ignore]
async fn test_admin_user_listing_has_no_hashes() {
    let admin = client();
    register_and_login(&admin, &unique_email("admin"), "admin").await;

    let users: Vec<Value> = admin
        .get(format!("{}/admin/users", BASE_URL))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse users");

    assert!(!users.is_empty());
    for user in &users {
        assert!(user.get("password_hash").is_none());
        assert!(user["email"].is_string());
    }
}
