//! Query cache behaviour through the client

use std::sync::Arc;

use tokio::sync::Notify;
use tokio_test::assert_ok;

use library_catalog::{
    api::transport::Method,
    models::{BookInput, BookPatch, BookQuery},
};

use crate::support::{book, client, until, FakeServer};

#[tokio::test]
async fn test_concurrent_identical_reads_share_one_call() {
    let gate = Arc::new(Notify::new());
    let server = FakeServer::gated(gate.clone());
    server.seed(book("b1", "9780441013593", 5));
    let client = client(&server);
    let query = BookQuery::with_limit(1000);

    let first = tokio::spawn({
        let client = client.clone();
        let query = query.clone();
        async move { client.list_books(&query).await }
    });
    let second = tokio::spawn({
        let client = client.clone();
        let query = query.clone();
        async move { client.list_books(&query).await }
    });

    until(|| server.requests().len() == 1).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    gate.notify_one();

    let first = assert_ok!(assert_ok!(first.await));
    let second = assert_ok!(assert_ok!(second.await));

    assert_eq!(first, second);
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_dropped_reader_still_fills_cache() {
    let gate = Arc::new(Notify::new());
    let server = FakeServer::gated(gate.clone());
    server.seed(book("b1", "9780441013593", 5));
    let client = client(&server);

    let reader = tokio::spawn({
        let client = client.clone();
        async move { client.get_book("b1").await }
    });
    until(|| server.requests().len() == 1).await;
    reader.abort();
    gate.notify_one();

    until(|| !client.cache().is_empty()).await;
    let book = assert_ok!(client.get_book("b1").await);

    assert_eq!(book.id, "b1");
    assert_eq!(server.count(Method::Get, "/books/b1"), 1);
}

#[tokio::test]
async fn test_watch_sees_invalidation_and_refetches() {
    let server = FakeServer::new();
    server.seed(book("b1", "9780441013593", 5));
    let client = client(&server);

    let mut books = client.watch_books(&BookQuery::default());
    let mut detail = client.watch_book("b1");
    assert_eq!(assert_ok!(books.current().await).data[0].copies, 5);
    assert_eq!(assert_ok!(detail.current().await).copies, 5);

    let patch = BookPatch {
        copies: Some(4),
        ..BookPatch::default()
    };
    assert_ok!(client.update_book("b1", &patch).await);

    assert_ok!(books.invalidated().await);
    assert_ok!(detail.invalidated().await);
    assert!(books.is_stale());
    assert!(detail.is_stale());

    assert_eq!(assert_ok!(books.current().await).data[0].copies, 4);
    assert_eq!(assert_ok!(detail.current().await).copies, 4);
    assert_eq!(server.count(Method::Get, "/books"), 2);
}

#[tokio::test]
async fn test_read_after_write_does_not_join_earlier_fetch() {
    let gate = Arc::new(Notify::new());
    let server = FakeServer::gated(gate.clone());
    server.seed(book("b1", "9780441013593", 5));
    let client = client(&server);
    let query = BookQuery::with_limit(1000);

    let early = tokio::spawn({
        let client = client.clone();
        let query = query.clone();
        async move { client.list_books(&query).await }
    });
    until(|| server.count(Method::Get, "/books") == 1).await;

    let input = BookInput::from(&book("b2", "0441013597", 1));
    assert_ok!(client.create_book(&input).await);

    let late = tokio::spawn({
        let client = client.clone();
        let query = query.clone();
        async move { client.list_books(&query).await }
    });
    until(|| server.count(Method::Get, "/books") == 2).await;
    gate.notify_one();
    gate.notify_one();

    assert_eq!(assert_ok!(assert_ok!(early.await)).total, 1);
    assert_eq!(assert_ok!(assert_ok!(late.await)).total, 2);

    // The overtaken response was not cached
    let cached = assert_ok!(client.list_books(&query).await);
    assert_eq!(cached.total, 2);
    assert_eq!(server.count(Method::Get, "/books"), 2);
}

#[tokio::test]
async fn test_refresh_book_rereads_during_earlier_fetch() {
    let gate = Arc::new(Notify::new());
    let server = FakeServer::gated(gate.clone());
    server.seed(book("b1", "9780441013593", 5));
    let client = client(&server);

    let early = tokio::spawn({
        let client = client.clone();
        async move { client.get_book("b1").await }
    });
    until(|| server.count(Method::Get, "/books/b1") == 1).await;

    let patch = BookPatch {
        copies: Some(2),
        ..BookPatch::default()
    };
    assert_ok!(client.update_book("b1", &patch).await);

    let refreshed = tokio::spawn({
        let client = client.clone();
        async move { client.refresh_book("b1").await }
    });
    until(|| server.count(Method::Get, "/books/b1") == 2).await;
    gate.notify_one();
    gate.notify_one();

    assert_eq!(assert_ok!(assert_ok!(early.await)).copies, 5);
    assert_eq!(assert_ok!(assert_ok!(refreshed.await)).copies, 2);
}

#[tokio::test]
async fn test_failed_reads_are_not_cached_or_retried() {
    let server = FakeServer::new();
    let client = client(&server);

    assert!(client.get_book("missing").await.is_err());
    assert_eq!(server.count(Method::Get, "/books/missing"), 1);

    assert!(client.get_book("missing").await.is_err());
    assert_eq!(server.count(Method::Get, "/books/missing"), 2);
}

#[tokio::test]
async fn test_borrow_summary_and_book_list_are_separate_entries() {
    let server = FakeServer::new();
    server.seed(book("b1", "9780441013593", 5));
    let client = client(&server);

    assert_ok!(client.borrow_summary().await);
    assert_ok!(client.list_books(&BookQuery::default()).await);
    assert_eq!(client.cache().len(), 2);

    // Book update leaves the borrow summary cached
    let patch = BookPatch {
        title: Some("Dune Messiah".to_string()),
        ..BookPatch::default()
    };
    assert_ok!(client.update_book("b1", &patch).await);
    assert_ok!(client.borrow_summary().await);

    assert_eq!(server.count(Method::Get, "/borrow"), 1);
}
