//! Book forms end to end

use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use library_catalog::{
    api::transport::Method,
    forms::{FormAction, FormError, FormState},
    models::BookQuery,
};

use crate::support::{book, catalog, dune_fields, FakeServer};

#[tokio::test]
async fn test_add_book_invalidates_list() {
    let server = FakeServer::new();
    let catalog = catalog(&server);
    let query = BookQuery::with_limit(1000);

    let before = assert_ok!(catalog.client.list_books(&query).await);
    assert_eq!(before.total, 0);

    let mut form = catalog.add_book();
    for (name, value) in dune_fields() {
        assert_ok!(form.set_field(&name, value));
    }
    let created = assert_ok!(form.submit().await);

    assert_eq!(created.isbn, "9780441013593");
    assert_eq!(form.state(), FormState::Success);
    assert_eq!(server.count(Method::Post, "/books"), 1);

    let after = assert_ok!(catalog.client.list_books(&query).await);
    assert_eq!(after.total, 1);
    assert_eq!(server.count(Method::Get, "/books"), 2);
}

#[tokio::test]
async fn test_short_isbn_never_reaches_server() {
    let server = FakeServer::new();
    let catalog = catalog(&server);

    let mut form = catalog.add_book();
    for (name, value) in dune_fields() {
        let value = if name == "isbn" { json!("12345") } else { value };
        let _ = form.set_field(&name, value);
    }
    let err = assert_err!(form.submit().await);

    assert_eq!(
        err.field_errors().and_then(|e| e.get("isbn")),
        Some("ISBN must be at least 10 digits")
    );
    assert_eq!(form.state(), FormState::Failed);
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_live_isbn_messages_follow_length() {
    let server = FakeServer::new();
    let mut form = catalog(&server).add_book();

    let cases = [
        ("12345", "ISBN must be at least 10 digits"),
        ("12345678901234", "ISBN cannot be more than 13 digits"),
        ("123456789012", "ISBN must be exactly 10 or 13 digits"),
    ];
    for (isbn, message) in cases {
        let err = assert_err!(form.set_field("isbn", isbn));
        assert_eq!(err.field_errors().and_then(|e| e.get("isbn")), Some(message));
        // Same value, same message
        let again = assert_err!(form.set_field("isbn", isbn));
        assert_eq!(err, again);
    }
}

#[tokio::test]
async fn test_duplicate_isbn_shows_rejection_and_keeps_input() {
    let server = FakeServer::new();
    server.seed(book("b1", "9780441013593", 5));
    let catalog = catalog(&server);

    let mut form = catalog.add_book();
    for (name, value) in dune_fields() {
        assert_ok!(form.set_field(&name, value));
    }
    let err = assert_err!(form.submit().await);

    assert!(matches!(err, FormError::Rejected(_)));
    assert_eq!(err.to_string(), "Isbn already exists or not valid");
    assert_eq!(form.state(), FormState::Failed);
    assert_eq!(form.values().get("title"), Some(&json!("Dune")));

    // Input survives for a corrected retry
    assert_ok!(form.set_field("isbn", "0-441-01359-7"));
    assert_ok!(form.submit().await);
    assert_eq!(server.count(Method::Post, "/books"), 2);
}

#[tokio::test]
async fn test_update_marks_detail_and_list_stale() {
    let server = FakeServer::new();
    server.seed(book("b1", "9780441013593", 5));
    let catalog = catalog(&server);
    let query = BookQuery::with_limit(1000);

    let original = assert_ok!(catalog.client.get_book("b1").await);
    assert_ok!(catalog.client.list_books(&query).await);
    // Served from cache
    assert_ok!(catalog.client.get_book("b1").await);
    assert_eq!(server.count(Method::Get, "/books/b1"), 1);

    let mut form = catalog.edit_book(&original);
    assert_eq!(form.action(), FormAction::Update);
    assert_ok!(form.set_field("copies", 2));
    assert_ok!(form.submit().await);

    let detail = assert_ok!(catalog.client.get_book("b1").await);
    let list = assert_ok!(catalog.client.list_books(&query).await);

    assert_eq!(detail.copies, 2);
    assert_eq!(list.data[0].copies, 2);
    assert_eq!(server.count(Method::Get, "/books/b1"), 2);
    assert_eq!(server.count(Method::Get, "/books"), 2);
}

#[tokio::test]
async fn test_patch_changes_only_given_fields() {
    let server = FakeServer::new();
    server.seed(book("b1", "9780441013593", 5));
    let catalog = catalog(&server);

    let mut form = catalog.patch_book("b1");
    assert_ok!(form.set_field("copies", "1"));
    let updated = assert_ok!(form.submit().await);

    assert_eq!(updated.copies, 1);
    assert_eq!(updated.title, "Dune");
    let sent = server.requests().pop().and_then(|r| r.body);
    assert_eq!(sent, Some(json!({ "copies": 1 })));
}

#[tokio::test]
async fn test_delete_refreshes_list() {
    let server = FakeServer::new();
    server.seed(book("b1", "9780441013593", 5));
    server.seed(book("b2", "0441013597", 1));
    let catalog = catalog(&server);
    let query = BookQuery::default();

    assert_eq!(assert_ok!(catalog.client.list_books(&query).await).total, 2);

    let deleted = assert_ok!(catalog.delete_book("b2").submit().await);
    assert_eq!(deleted.id, "b2");

    assert_eq!(assert_ok!(catalog.client.list_books(&query).await).total, 1);
    assert!(server.book("b2").is_none());
}

#[tokio::test]
async fn test_delete_missing_book_names_action() {
    let server = FakeServer::new();
    let catalog = catalog(&server);

    let mut delete = catalog.delete_book("nope");
    let err = assert_err!(delete.submit().await);

    assert_eq!(err.to_string(), "Failed to delete book");
    assert_eq!(delete.state(), FormState::Failed);
}
