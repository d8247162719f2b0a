//! Schema-driven validation of form input.
//!
//! A [`Schema`] is an ordered list of [`Field`]s. Each field has a kind, which
//! decides how its raw input is normalised once valid, and a chain of
//! [`Rule`]s. Rules run in order and the first failure is the field's message.
//!
//! Input arrives the way forms produce it: a JSON object whose values may be
//! strings even for numeric fields. Empty strings count as missing.

pub mod schemas;

use std::borrow::Cow;
use std::fmt;

use chrono::{Local, NaiveDate};
use indexmap::IndexMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use validator::ValidationError;

use crate::rules;

/// First error message per field, in schema order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(IndexMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure unless the field already has one
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    /// Replace the field's message (live validation as the user types)
    pub fn set(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn clear(&mut self, field: &str) {
        self.0.shift_remove(field);
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        Ok(())
    }
}

/// How a field's raw input is normalised into the typed record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Choice,
    Isbn,
    Integer,
    Boolean,
    Date,
}

/// One validation rule. Messages are the user-facing text.
#[derive(Debug, Clone)]
pub enum Rule {
    Required(&'static str),
    MinLength(usize, &'static str),
    MaxLength(usize, &'static str),
    Number(&'static str),
    Integer(&'static str),
    Min(i64, &'static str),
    Max(i64, &'static str),
    OneOf(&'static [&'static str], &'static str),
    Boolean(&'static str),
    /// ISBN-10/13 after stripping separators, with length-specific messages
    Isbn,
    /// Calendar date no earlier than the day after `today`
    DueDate,
}

impl Rule {
    /// Check a present (non-empty) value
    fn check(&self, value: &Value, today: NaiveDate) -> Result<(), ValidationError> {
        match self {
            Rule::Required(_) => Ok(()),
            Rule::MinLength(min, message) => {
                if text(value).chars().count() < *min {
                    let mut error = failure("length", *message);
                    error.add_param(Cow::Borrowed("min"), min);
                    return Err(error);
                }
                Ok(())
            }
            Rule::MaxLength(max, message) => {
                if text(value).chars().count() > *max {
                    let mut error = failure("length", *message);
                    error.add_param(Cow::Borrowed("max"), max);
                    return Err(error);
                }
                Ok(())
            }
            Rule::Number(message) => match number(value) {
                Some(_) => Ok(()),
                None => Err(failure("number", *message)),
            },
            Rule::Integer(message) => match number(value) {
                Some(n) if n.fract() == 0.0 => Ok(()),
                _ => Err(failure("integer", *message)),
            },
            Rule::Min(min, message) => match number(value) {
                Some(n) if n < *min as f64 => {
                    let mut error = failure("range", *message);
                    error.add_param(Cow::Borrowed("min"), min);
                    Err(error)
                }
                _ => Ok(()),
            },
            Rule::Max(max, message) => match number(value) {
                Some(n) if n > *max as f64 => {
                    let mut error = failure("range", *message);
                    error.add_param(Cow::Borrowed("max"), max);
                    Err(error)
                }
                _ => Ok(()),
            },
            Rule::OneOf(choices, message) => {
                let candidate = text(value);
                if choices.iter().any(|c| *c == candidate.as_ref()) {
                    Ok(())
                } else {
                    Err(failure("enum", *message))
                }
            }
            Rule::Boolean(message) => match boolean(value) {
                Some(_) => Ok(()),
                None => Err(failure("boolean", *message)),
            },
            Rule::Isbn => match rules::validate_isbn(&text(value)).error {
                None => Ok(()),
                Some(message) => Err(failure("isbn", message)),
            },
            Rule::DueDate => rules::check_due_date(&text(value), today)
                .map(|_| ())
                .map_err(|message| failure("due_date", message)),
        }
    }
}

/// A named field with its kind and rule chain
#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    rules: Vec<Rule>,
}

impl Field {
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Run the rule chain. Optional fields accept a missing value.
    pub fn check(&self, value: &Value, today: NaiveDate) -> Result<(), ValidationError> {
        if is_missing(value) {
            return match self.rules.iter().find_map(|r| match r {
                Rule::Required(message) => Some(*message),
                _ => None,
            }) {
                Some(message) => Err(failure("required", message)),
                None => Ok(()),
            };
        }

        self.rules.iter().try_for_each(|rule| rule.check(value, today))
    }

    /// Normalised form of a value that passed [`Field::check`]
    fn normalize(&self, value: &Value) -> Option<Value> {
        if is_missing(value) {
            return None;
        }
        let normalized = match self.kind {
            FieldKind::Text | FieldKind::Choice => Value::String(text(value).into_owned()),
            FieldKind::Isbn => Value::String(rules::normalize_isbn(&text(value))),
            FieldKind::Integer => Value::from(number(value)? as i64),
            FieldKind::Boolean => Value::Bool(boolean(value)?),
            FieldKind::Date => Value::String(
                rules::parse_due_date(&text(value))?
                    .format("%Y-%m-%d")
                    .to_string(),
            ),
        };
        Some(normalized)
    }
}

/// Ordered set of fields validated together
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Validate one field against today's date
    pub fn validate_field(&self, name: &str, value: &Value) -> Result<(), String> {
        self.validate_field_on(name, value, today())
    }

    pub fn validate_field_on(&self, name: &str, value: &Value, today: NaiveDate) -> Result<(), String> {
        let field = self
            .field(name)
            .ok_or_else(|| format!("Unknown field: {}", name))?;
        field.check(value, today).map_err(message_of)
    }

    /// Validate a whole record against today's date
    pub fn validate(&self, values: &Map<String, Value>) -> Result<(), FieldErrors> {
        self.validate_on(values, today())
    }

    /// Validate a whole record. Fields outside the schema are ignored.
    pub fn validate_on(&self, values: &Map<String, Value>, today: NaiveDate) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        for field in &self.fields {
            let value = values.get(field.name).unwrap_or(&Value::Null);
            if let Err(error) = field.check(value, today) {
                errors.insert(field.name, message_of(error));
            }
        }
        errors.into_result()
    }

    /// Validate only the fields present in `values` (partial updates)
    pub fn validate_present_on(&self, values: &Map<String, Value>, today: NaiveDate) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        for field in &self.fields {
            if let Some(value) = values.get(field.name) {
                if let Err(error) = field.check(value, today) {
                    errors.insert(field.name, message_of(error));
                }
            }
        }
        errors.into_result()
    }

    /// Normalised copy of the schema's fields; missing fields are dropped
    pub fn normalize(&self, values: &Map<String, Value>) -> Map<String, Value> {
        self.fields
            .iter()
            .filter_map(|field| {
                let value = values.get(field.name)?;
                field
                    .normalize(value)
                    .map(|v| (field.name.to_string(), v))
            })
            .collect()
    }

    /// Validate, normalise and deserialize into the typed record
    pub fn parse<T: DeserializeOwned>(&self, values: &Map<String, Value>, today: NaiveDate) -> Result<T, FieldErrors> {
        self.validate_on(values, today)?;
        self.decode(values)
    }

    /// Like [`Schema::parse`] but only for the fields present
    pub fn parse_present<T: DeserializeOwned>(&self, values: &Map<String, Value>, today: NaiveDate) -> Result<T, FieldErrors> {
        self.validate_present_on(values, today)?;
        self.decode(values)
    }

    fn decode<T: DeserializeOwned>(&self, values: &Map<String, Value>) -> Result<T, FieldErrors> {
        serde_json::from_value(Value::Object(self.normalize(values))).map_err(|e| {
            let mut errors = FieldErrors::new();
            errors.insert("form", e.to_string());
            errors
        })
    }
}

/// Calendar day used by live validation
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn failure(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

fn message_of(error: ValidationError) -> String {
    match error.message {
        Some(message) => message.into_owned(),
        None => error.code.into_owned(),
    }
}

fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.trim()),
        other => Cow::Owned(other.to_string()),
    }
}

fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
