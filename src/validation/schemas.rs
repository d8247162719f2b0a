//! Schemas for book and borrow forms

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};

use super::{Field, FieldErrors, FieldKind, Rule, Schema};
use crate::{
    models::{BookInput, BookPatch, BorrowInput, Genre},
    rules::{self, MAX_BORROW_QUANTITY},
};

/// Book create/update form
pub static BOOK_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(vec![
        Field::new("title", FieldKind::Text)
            .rule(Rule::Required("Title is required"))
            .rule(Rule::MinLength(2, "Title must be at least 2 characters"))
            .rule(Rule::MaxLength(200, "Title cannot exceed 200 characters")),
        Field::new("author", FieldKind::Text)
            .rule(Rule::Required("Author is required"))
            .rule(Rule::MinLength(2, "Author must be at least 2 characters"))
            .rule(Rule::MaxLength(100, "Author cannot exceed 100 characters")),
        Field::new("genre", FieldKind::Choice)
            .rule(Rule::Required("Genre is required"))
            .rule(Rule::OneOf(Genre::CODES, "Please select a valid genre")),
        Field::new("isbn", FieldKind::Isbn)
            .rule(Rule::Required("ISBN is required"))
            .rule(Rule::Isbn),
        Field::new("description", FieldKind::Text)
            .rule(Rule::Required("Description is required"))
            .rule(Rule::MinLength(10, "Description must be at least 10 characters"))
            .rule(Rule::MaxLength(1000, "Description cannot exceed 1000 characters")),
        Field::new("copies", FieldKind::Integer)
            .rule(Rule::Required("Copies is required"))
            .rule(Rule::Number("Copies must be a number"))
            .rule(Rule::Integer("Copies must be a whole number"))
            .rule(Rule::Min(0, "Copies cannot be negative"))
            .rule(Rule::Max(100, "Copies cannot exceed 100")),
        Field::new("available", FieldKind::Boolean)
            .rule(Rule::Boolean("Available must be true or false")),
    ])
});

/// Borrow form
pub static BORROW_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(vec![
        Field::new("book", FieldKind::Text).rule(Rule::Required("Book is required")),
        Field::new("quantity", FieldKind::Integer)
            .rule(Rule::Required("Quantity is required"))
            .rule(Rule::Number("Quantity must be a number"))
            .rule(Rule::Integer("Quantity must be a whole number"))
            .rule(Rule::Min(1, "Quantity must be at least 1"))
            .rule(Rule::Max(MAX_BORROW_QUANTITY, "Quantity cannot exceed 10")),
        Field::new("dueDate", FieldKind::Date)
            .rule(Rule::Required("Due date is required"))
            .rule(Rule::DueDate),
    ])
});

/// Validate a full book record for creation
pub fn parse_book(values: &Map<String, Value>, today: NaiveDate) -> Result<BookInput, FieldErrors> {
    BOOK_SCHEMA.parse(values, today)
}

/// Validate the fields present in a partial book update
pub fn parse_book_patch(values: &Map<String, Value>, today: NaiveDate) -> Result<BookPatch, FieldErrors> {
    BOOK_SCHEMA.parse_present(values, today)
}

/// Validate a borrow request, including the stock check against `copies`
pub fn parse_borrow(values: &Map<String, Value>, copies: i64, today: NaiveDate) -> Result<BorrowInput, FieldErrors> {
    let input: BorrowInput = BORROW_SCHEMA.parse(values, today)?;

    if let Err(message) = check_stock(input.quantity, copies) {
        let mut errors = FieldErrors::new();
        errors.insert("quantity", message);
        return Err(errors);
    }

    Ok(input)
}

/// Cross-check a requested quantity against the book's live copies
pub fn check_stock(quantity: i64, copies: i64) -> Result<(), String> {
    if copies < 1 {
        return Err("No copies available to borrow".to_string());
    }
    if !rules::within_stock(quantity, copies) {
        return Err(format!("Quantity cannot exceed {} available copies", copies));
    }
    Ok(())
}

/// Form values for a typed record, as a form would hold them
pub fn values_of<T: serde::Serialize>(record: &T) -> Map<String, Value> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
