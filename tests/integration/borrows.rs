//! Borrow form end to end

use chrono::{Duration, Local};
use tokio_test::{assert_err, assert_ok};

use library_catalog::{
    api::transport::Method,
    forms::FormState,
    models::{BookQuery, BorrowQuery},
    rules,
};

use crate::support::{book, catalog, FakeServer};

fn date(days_from_today: i64) -> String {
    (Local::now().date_naive() + Duration::days(days_from_today))
        .format("%Y-%m-%d")
        .to_string()
}

#[tokio::test]
async fn test_quantity_above_copies_is_rejected_locally() {
    let server = FakeServer::new();
    let dune = book("b1", "9780441013593", 3);
    server.seed(dune.clone());
    let catalog = catalog(&server);

    assert!(!rules::is_borrowable(&dune, 5));

    let mut form = catalog.borrow_book(&dune);
    assert_ok!(form.set_field("quantity", 5));
    let err = assert_err!(form.submit().await);

    assert_eq!(
        err.field_errors().and_then(|e| e.get("quantity")),
        Some("Quantity cannot exceed 3 available copies")
    );
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_due_date_today_is_too_early() {
    let server = FakeServer::new();
    let dune = book("b1", "9780441013593", 3);
    let catalog = catalog(&server);

    let mut form = catalog.borrow_book(&dune);
    let _ = form.set_field("dueDate", date(0));
    let err = assert_err!(form.submit().await);

    assert_eq!(
        err.field_errors().and_then(|e| e.get("dueDate")),
        Some("Due date must be at least tomorrow")
    );
    assert_eq!(form.errors().get("dueDate"), Some("Due date must be at least tomorrow"));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_borrow_updates_books_and_summary() {
    let server = FakeServer::new();
    let dune = book("b1", "9780441013593", 3);
    server.seed(dune.clone());
    let catalog = catalog(&server);

    assert!(assert_ok!(catalog.client.borrow_summary().await).is_empty());
    assert_ok!(catalog.client.list_books(&BookQuery::default()).await);

    let mut form = catalog.borrow_book(&dune);
    assert_ok!(form.set_field("quantity", "2"));
    assert_ok!(form.set_field("dueDate", date(1)));
    let borrow = assert_ok!(form.submit().await);

    assert_eq!(borrow.quantity, 2);
    assert_eq!(form.state(), FormState::Success);

    let summary = assert_ok!(catalog.client.borrow_summary().await);
    assert_eq!(summary[0].total_quantity_borrowed, 2);
    assert_eq!(summary[0].book_title, "Dune");

    let list = assert_ok!(catalog.client.list_books(&BookQuery::default()).await);
    assert_eq!(list.data[0].copies, 1);
    assert_eq!(server.count(Method::Get, "/books"), 2);

    let borrows = assert_ok!(catalog.client.list_borrows(&BorrowQuery::default()).await);
    assert_eq!(borrows.total, 1);
}

#[tokio::test]
async fn test_recheck_catches_copies_taken_since_opening() {
    let server = FakeServer::new();
    let snapshot = book("b1", "9780441013593", 3);
    server.seed(snapshot.clone());
    let catalog = catalog(&server);

    // Another borrower takes two copies after the form opened
    let mut other = catalog.borrow_book(&snapshot);
    assert_ok!(other.set_field("quantity", 2));
    assert_ok!(other.submit().await);

    let mut form = catalog.borrow_book(&snapshot);
    assert_ok!(form.set_field("quantity", 2));
    let err = assert_err!(form.submit().await);

    assert_eq!(
        err.field_errors().and_then(|e| e.get("quantity")),
        Some("Quantity cannot exceed 1 available copies")
    );
    assert_eq!(server.count(Method::Post, "/borrow"), 1);
    assert_eq!(server.book("b1").map(|b| b.copies), Some(1));
}

#[tokio::test]
async fn test_zero_copies_cannot_be_borrowed() {
    let server = FakeServer::new();
    let mut empty = book("b1", "9780441013593", 0);
    // Server flag says available even though nothing is left
    empty.available = true;
    let catalog = catalog(&server);

    assert!(!rules::is_displayed_available(&empty));

    let err = assert_err!(catalog.borrow_book(&empty).submit().await);
    assert_eq!(
        err.field_errors().and_then(|e| e.get("quantity")),
        Some("No copies available to borrow")
    );
    assert!(server.requests().is_empty());
}
