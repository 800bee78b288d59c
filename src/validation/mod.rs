//! Request validation.
//!
//! Every route declares the fields it accepts as a request DTO. Parsing happens
//! in two steps:
//!
//! 1. A [`FieldReader`] pulls each declared field out of the raw request values
//!    and checks its type (string, integer, number, boolean), recording a
//!    [`FieldError`] for every mismatch.
//! 2. The DTO's `validator` rules (bounds, non-empty strings) run on the typed
//!    value. Fields that already failed their type check are not reported twice.
//!
//! All failures of one request location are returned together as
//! [`AppError::InvalidFields`], so a handler only ever runs with a fully valid
//! request.
//!
//! ```rust,ignore
//! async fn list(ValidQuery(filter): ValidQuery<RiffFilter>) -> Result<Json<RiffPage>> {
//!     // filter.limit is guaranteed to be within 1..=100 here
//! }
//! ```

mod extract;
mod multipart;
pub mod rules;

pub use extract::{ValidBody, ValidParams, ValidParamsBody, ValidQuery};
pub use multipart::{UploadFiles, UploadedFile, ValidUpload, AUDIO_FIELD, COVER_FIELD};

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use validator::Validate;

use crate::error::{AppError, Result};

/// Raw request values keyed by field name
pub type FieldMap = serde_json::Map<String, Value>;

/// Where a field was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Query,
    Params,
    Body,
    Files,
}

/// A single field that failed validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// Field name as sent by the client
    pub field: String,
    pub location: Location,
    pub message: String,
    /// The rejected value, when there was one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl FieldError {
    pub fn new(
        field: impl Into<String>,
        location: Location,
        message: impl Into<String>,
        value: Option<String>,
    ) -> Self {
        Self {
            field: field.into(),
            location,
            message: message.into(),
            value,
        }
    }
}

/// A request DTO that can be read field by field.
pub trait FromFields: Sized + Validate {
    /// Build the DTO, reporting type mismatches to the reader.
    fn from_fields(reader: &mut FieldReader<'_>) -> Self;
}

/// Parse and validate `T` from raw values found at `location`.
pub fn parse_fields<T: FromFields>(location: Location, values: &FieldMap) -> Result<T> {
    let mut reader = FieldReader::new(location, values);
    let value = T::from_fields(&mut reader);
    reader.finish(value)
}

/// Convert plain string pairs (query, path, urlencoded form) into a field map.
pub fn string_fields(raw: HashMap<String, String>) -> FieldMap {
    raw.into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect()
}

/// Typed, error-collecting access to raw request values.
pub struct FieldReader<'a> {
    location: Location,
    values: &'a FieldMap,
    errors: Vec<FieldError>,
}

impl<'a> FieldReader<'a> {
    pub fn new(location: Location, values: &'a FieldMap) -> Self {
        Self {
            location,
            values,
            errors: Vec::new(),
        }
    }

    /// Record an error found outside the reader (e.g. on uploaded files)
    pub fn push_error(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    fn reject(&mut self, name: &str, message: &str, value: Option<&Value>) {
        self.errors.push(FieldError::new(
            name,
            self.location,
            message,
            value.map(display_value),
        ));
    }

    fn missing(&mut self, name: &str) {
        self.reject(name, "is required", None);
    }

    /// Optional string field; non-string JSON values are rejected
    pub fn optional_string(&mut self, name: &str) -> Option<String> {
        let values = self.values;
        match values.get(name)? {
            Value::String(s) => Some(s.clone()),
            other => {
                self.reject(name, "must be a string", Some(other));
                None
            }
        }
    }

    /// Required string field; an absent field yields an empty string and an error
    pub fn required_string(&mut self, name: &str) -> String {
        if !self.values.contains_key(name) {
            self.missing(name);
            return String::new();
        }
        self.optional_string(name).unwrap_or_default()
    }

    /// Optional integer field
    pub fn optional_int(&mut self, name: &str) -> Option<i64> {
        let values = self.values;
        let value = values.get(name)?;
        let parsed = match value {
            Value::String(s) => rules::parse_int(s),
            Value::Number(n) => n.as_i64(),
            _ => None,
        };
        if parsed.is_none() {
            self.reject(name, "must be an integer", Some(value));
        }
        parsed
    }

    /// Required integer field
    pub fn required_int(&mut self, name: &str) -> i64 {
        if !self.values.contains_key(name) {
            self.missing(name);
            return 0;
        }
        self.optional_int(name).unwrap_or_default()
    }

    /// Optional decimal number field
    pub fn optional_number(&mut self, name: &str) -> Option<f64> {
        let values = self.values;
        let value = values.get(name)?;
        let parsed = match value {
            Value::String(s) => rules::parse_numeric(s),
            Value::Number(n) => n.as_f64(),
            _ => None,
        };
        match parsed {
            Some(n) if n.is_finite() => Some(n),
            Some(_) => {
                // digit strings past f64::MAX parse as infinity
                self.reject(name, "must be a finite number", Some(value));
                None
            }
            None => {
                self.reject(name, "must be a number", Some(value));
                None
            }
        }
    }

    /// Required decimal number field
    pub fn required_number(&mut self, name: &str) -> f64 {
        if !self.values.contains_key(name) {
            self.missing(name);
            return 0.0;
        }
        self.optional_number(name).unwrap_or_default()
    }

    /// Optional boolean field
    pub fn optional_bool(&mut self, name: &str) -> Option<bool> {
        let values = self.values;
        let value = values.get(name)?;
        let parsed = match value {
            Value::String(s) => rules::parse_bool(s),
            Value::Bool(b) => Some(*b),
            _ => None,
        };
        if parsed.is_none() {
            self.reject(name, "must be a boolean", Some(value));
        }
        parsed
    }

    /// Run the DTO's declarative rules and return it if nothing failed.
    pub fn finish<T: Validate>(self, value: T) -> Result<T> {
        let Self {
            location,
            values,
            mut errors,
        } = self;

        if let Err(failures) = value.validate() {
            for (field, list) in failures.field_errors() {
                let name = rules::camel_case(&field);
                if errors.iter().any(|e| e.field == name) {
                    continue;
                }
                if let Some(first) = list.first() {
                    let message = first
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed {} check", first.code));
                    let raw = values.get(&name).map(display_value);
                    errors.push(FieldError::new(name, location, message, raw));
                }
            }
        }

        if errors.is_empty() {
            Ok(value)
        } else {
            errors.sort_by(|a, b| a.field.cmp(&b.field));
            Err(AppError::InvalidFields(errors))
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
