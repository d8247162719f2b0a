//! Borrowing and availability rules.
//!
//! Pure functions shared by the validation schemas and the form controllers.
//! Nothing here touches the network or the clock; callers pass `now` in.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::book::Book;

/// Default loan length when the borrow form opens
pub const DEFAULT_LOAN_DAYS: i64 = 14;

/// Per-request borrow ceiling, independent of stock
pub const MAX_BORROW_QUANTITY: i64 = 10;

pub const ISBN_TOO_SHORT: &str = "ISBN must be at least 10 digits";
pub const ISBN_TOO_LONG: &str = "ISBN cannot be more than 13 digits";
pub const ISBN_WRONG_LENGTH: &str = "ISBN must be exactly 10 or 13 digits";

pub const DUE_DATE_INVALID: &str = "Due date must be a valid date";
pub const DUE_DATE_TOO_EARLY: &str = "Due date must be at least tomorrow";

static ISBN_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[0-9]{10}|[0-9]{13})$").expect("ISBN pattern is valid"));

/// Outcome of an ISBN check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsbnCheck {
    pub is_valid: bool,
    pub error: Option<&'static str>,
}

/// Strip the separators users type into ISBNs (hyphens and whitespace)
pub fn normalize_isbn(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}

/// Check an ISBN after stripping separators.
///
/// The message depends on the stripped length: too short, too long, or
/// in range but not exactly 10 or 13 digits.
pub fn validate_isbn(raw: &str) -> IsbnCheck {
    let cleaned = normalize_isbn(raw);

    if ISBN_DIGITS.is_match(&cleaned) {
        return IsbnCheck {
            is_valid: true,
            error: None,
        };
    }

    let len = cleaned.chars().count();
    let error = if len < 10 {
        ISBN_TOO_SHORT
    } else if len > 13 {
        ISBN_TOO_LONG
    } else {
        ISBN_WRONG_LENGTH
    };

    IsbnCheck {
        is_valid: false,
        error: Some(error),
    }
}

/// Convenience predicate over [`validate_isbn`]
pub fn is_valid_isbn(raw: &str) -> bool {
    validate_isbn(raw).is_valid
}

/// Earliest acceptable due date: the day after `now`, at midnight
pub fn min_borrow_date(now: NaiveDateTime) -> NaiveDate {
    (now + Duration::days(1)).date()
}

/// Due date pre-filled in a new borrow form
pub fn default_due_date(now: NaiveDateTime) -> NaiveDate {
    (now + Duration::days(DEFAULT_LOAN_DAYS)).date()
}

/// Whether `quantity` copies of `book` can be requested
pub fn is_borrowable(book: &Book, quantity: i64) -> bool {
    within_stock(quantity, book.copies)
}

/// `1 <= quantity <= copies`
pub fn within_stock(quantity: i64, copies: i64) -> bool {
    quantity >= 1 && quantity <= copies
}

/// Availability as shown in listings.
///
/// The server flag alone can say `available` with zero copies left; listings
/// additionally require stock. Both readings are kept: `Book::available` is
/// the raw flag.
pub fn is_displayed_available(book: &Book) -> bool {
    book.available && book.copies > 0
}

/// Parse a due date typed as `YYYY-MM-DD` or as a full RFC 3339 timestamp
pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        chrono::DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.date_naive())
    })
}

/// Check a due date against the calendar day `today`
pub fn check_due_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, &'static str> {
    let due = parse_due_date(raw).ok_or(DUE_DATE_INVALID)?;
    let earliest = min_borrow_date(today.and_hms_opt(0, 0, 0).unwrap_or_default());
    if due < earliest {
        return Err(DUE_DATE_TOO_EARLY);
    }
    Ok(due)
}
