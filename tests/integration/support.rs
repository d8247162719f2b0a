//! In-memory catalog server speaking the REST contract

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::Notify;

use library_catalog::{
    api::transport::{ApiRequest, ApiResponse, Method, Transport},
    config::AppConfig,
    models::{Book, Genre},
    AppResult, ApiClient, Catalog,
};

#[derive(Default)]
struct State {
    books: Vec<Book>,
    borrows: Vec<Value>,
    requests: Vec<ApiRequest>,
    next_id: u32,
}

pub struct FakeServer {
    state: Mutex<State>,
    /// When set, every GET waits for one notification before answering
    read_gate: Option<Arc<Notify>>,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            read_gate: None,
        })
    }

    pub fn gated(gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            read_gate: Some(gate),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn seed(&self, book: Book) {
        self.lock().books.push(book);
    }

    pub fn book(&self, id: &str) -> Option<Book> {
        self.lock().books.iter().find(|b| b.id == id).cloned()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.lock().requests.clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let mut state = self.lock();
        let segments: Vec<&str> = request.path.trim_matches('/').split('/').collect();

        match (request.method, segments.as_slice()) {
            (Method::Get, ["books"]) => {
                let genre = query_value(request, "filter");
                let books: Vec<&Book> = state
                    .books
                    .iter()
                    .filter(|b| genre.as_deref().map_or(true, |g| b.genre.as_code() == g))
                    .collect();
                paginated(request, &books)
            }
            (Method::Get, ["books", id]) => match state.books.iter().find(|b| b.id == *id) {
                Some(book) => ok(200, json!(book)),
                None => not_found(),
            },
            (Method::Post, ["books"]) => {
                let body = request.body.clone().unwrap_or_default();
                if state.books.iter().any(|b| Some(b.isbn.as_str()) == body["isbn"].as_str()) {
                    return ApiResponse::new(
                        400,
                        json!({
                            "success": false,
                            "message": "Validation failed",
                            "error": { "name": "MongoServerError", "code": 11000 }
                        })
                        .to_string(),
                    );
                }
                state.next_id += 1;
                let mut record = body;
                record["_id"] = json!(format!("b{}", state.next_id));
                match serde_json::from_value::<Book>(record) {
                    Ok(book) => {
                        state.books.push(book.clone());
                        ok(201, json!(book))
                    }
                    Err(e) => ApiResponse::new(400, json!({ "message": e.to_string() }).to_string()),
                }
            }
            (Method::Put, ["books", id]) => {
                let Some(book) = state.books.iter_mut().find(|b| b.id == *id) else {
                    return not_found();
                };
                let mut record = json!(book.clone());
                if let (Some(target), Some(Value::Object(changes))) = (record.as_object_mut(), &request.body) {
                    target.extend(changes.clone());
                }
                match serde_json::from_value::<Book>(record) {
                    Ok(updated) => {
                        *book = updated.clone();
                        ok(200, json!(updated))
                    }
                    Err(e) => ApiResponse::new(400, json!({ "message": e.to_string() }).to_string()),
                }
            }
            (Method::Delete, ["books", id]) => {
                let before = state.books.len();
                state.books.retain(|b| b.id != *id);
                if state.books.len() == before {
                    return not_found();
                }
                ApiResponse::new(200, json!({ "success": true, "message": "Book deleted successfully", "data": null }).to_string())
            }
            (Method::Post, ["borrow"]) => {
                let body = request.body.clone().unwrap_or_default();
                let quantity = body["quantity"].as_i64().unwrap_or(0);
                let Some(book) = state.books.iter_mut().find(|b| Some(b.id.as_str()) == body["book"].as_str()) else {
                    return not_found();
                };
                if quantity > book.copies {
                    return ApiResponse::new(400, json!({ "message": "Not enough copies available" }).to_string());
                }
                book.copies -= quantity;
                book.available = book.copies > 0;
                let mut record = body;
                record["_id"] = json!(format!("br{}", state.borrows.len() + 1));
                state.borrows.push(record.clone());
                ok(201, record)
            }
            (Method::Get, ["borrow"]) => {
                let mut summary: Vec<Value> = Vec::new();
                for borrow in &state.borrows {
                    let id = borrow["book"].as_str().unwrap_or_default();
                    let quantity = borrow["quantity"].as_i64().unwrap_or(0);
                    match summary.iter_mut().find(|s| s["bookId"] == id) {
                        Some(row) => {
                            let total = row["totalQuantityBorrowed"].as_i64().unwrap_or(0) + quantity;
                            row["totalQuantityBorrowed"] = json!(total);
                        }
                        None => {
                            let book = state.books.iter().find(|b| b.id == id);
                            summary.push(json!({
                                "bookId": id,
                                "bookTitle": book.map(|b| b.title.clone()).unwrap_or_default(),
                                "isbn": book.map(|b| b.isbn.clone()).unwrap_or_default(),
                                "totalQuantityBorrowed": quantity
                            }));
                        }
                    }
                }
                ok(200, Value::Array(summary))
            }
            (Method::Get, ["borrows"]) => paginated(request, &state.borrows),
            _ => not_found(),
        }
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn send(&self, request: ApiRequest) -> AppResult<ApiResponse> {
        self.lock().requests.push(request.clone());
        // A gated read answers with the state it was sent against
        let response = self.handle(&request);
        if request.method == Method::Get {
            if let Some(gate) = &self.read_gate {
                gate.notified().await;
            }
        }
        Ok(response)
    }
}

fn query_value(request: &ApiRequest, key: &str) -> Option<String> {
    request
        .query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}

fn paginated<T: serde::Serialize>(request: &ApiRequest, items: &[T]) -> ApiResponse {
    let page: usize = query_value(request, "page").and_then(|p| p.parse().ok()).unwrap_or(1).max(1);
    let limit: usize = query_value(request, "limit").and_then(|l| l.parse().ok()).unwrap_or(10).max(1);
    let data: Vec<&T> = items.iter().skip((page - 1) * limit).take(limit).collect();
    let body = json!({
        "data": data,
        "total": items.len(),
        "page": page,
        "limit": limit,
        "totalPages": items.len().div_ceil(limit),
    });
    ApiResponse::new(200, body.to_string())
}

fn ok(status: u16, data: Value) -> ApiResponse {
    ApiResponse::new(status, json!({ "success": true, "message": "OK", "data": data }).to_string())
}

fn not_found() -> ApiResponse {
    ApiResponse::new(404, json!({ "success": false, "message": "Not found" }).to_string())
}

pub fn client(server: &Arc<FakeServer>) -> ApiClient {
    let transport: Arc<dyn Transport> = server.clone();
    ApiClient::new(transport, &AppConfig::default().cache)
}

pub fn catalog(server: &Arc<FakeServer>) -> Catalog {
    Catalog::with_client(AppConfig::default(), client(server))
}

pub fn book(id: &str, isbn: &str, copies: i64) -> Book {
    Book {
        id: id.to_string(),
        title: "Dune".to_string(),
        author: "Frank Herbert".to_string(),
        genre: Genre::Fiction,
        isbn: isbn.to_string(),
        description: "A desert planet saga with over ten characters.".to_string(),
        copies,
        available: copies > 0,
        created_at: None,
        updated_at: None,
    }
}

/// The Dune record as typed into a form
pub fn dune_fields() -> Map<String, Value> {
    let fields = json!({
        "title": "Dune",
        "author": "Frank Herbert",
        "genre": "FICTION",
        "isbn": "9780441013593",
        "description": "A desert planet saga with over ten characters.",
        "copies": 5
    });
    fields.as_object().cloned().unwrap_or_default()
}

/// Yield until `done` holds, or panic after a bounded number of turns
pub async fn until(mut done: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
