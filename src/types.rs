use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;

use crate::error::StoreError;

/// Values that can be bound to a named placeholder or read back from a row.
///
/// ```rust
/// use pg_store::prelude::*;
///
/// let params = params! {
///     "id" => 1_i64,
///     "name" => "alice",
///     "deleted_at" => Option::<i64>::None,
/// };
/// assert_eq!(params.get("name"), Some(&RowValues::Text("alice".into())));
/// assert!(params["deleted_at"].is_null());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value, interpreted as UTC for `timestamptz` columns
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

/// Parameter map handed to every query operation, keyed by placeholder name.
pub type QueryParameters = HashMap<String, RowValues>;

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RowValues::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&JsonValue> {
        if let RowValues::JSON(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            RowValues::Int(_) => "int",
            RowValues::Float(_) => "float",
            RowValues::Text(_) => "text",
            RowValues::Bool(_) => "bool",
            RowValues::Timestamp(_) => "timestamp",
            RowValues::Null => "null",
            RowValues::JSON(_) => "json",
            RowValues::Blob(_) => "blob",
        }
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<i32> for RowValues {
    fn from(value: i32) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<i16> for RowValues {
    fn from(value: i16) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<u32> for RowValues {
    fn from(value: u32) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<NaiveDateTime> for RowValues {
    fn from(value: NaiveDateTime) -> Self {
        RowValues::Timestamp(value)
    }
}

impl From<DateTime<Utc>> for RowValues {
    fn from(value: DateTime<Utc>) -> Self {
        RowValues::Timestamp(value.naive_utc())
    }
}

impl From<NaiveDate> for RowValues {
    fn from(value: NaiveDate) -> Self {
        RowValues::Timestamp(value.and_time(chrono::NaiveTime::MIN))
    }
}

impl From<JsonValue> for RowValues {
    fn from(value: JsonValue) -> Self {
        RowValues::JSON(value)
    }
}

impl From<Vec<u8>> for RowValues {
    fn from(value: Vec<u8>) -> Self {
        RowValues::Blob(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// Conversion from a column value into a Rust type, used by [`crate::Row::value`].
pub trait FromRowValue: Sized {
    /// # Errors
    /// Returns `StoreError::ColumnError` when the value has an incompatible type or is NULL.
    fn from_row_value(value: &RowValues) -> Result<Self, StoreError>;
}

fn mismatch(expected: &str, value: &RowValues) -> StoreError {
    StoreError::ColumnError(format!(
        "expected {expected}, found {}",
        value.type_name()
    ))
}

impl FromRowValue for i64 {
    fn from_row_value(value: &RowValues) -> Result<Self, StoreError> {
        value.as_int().copied().ok_or_else(|| mismatch("int", value))
    }
}

impl FromRowValue for i32 {
    fn from_row_value(value: &RowValues) -> Result<Self, StoreError> {
        let wide = i64::from_row_value(value)?;
        i32::try_from(wide)
            .map_err(|e| StoreError::ColumnError(format!("int out of range for i32: {e}")))
    }
}

impl FromRowValue for f64 {
    fn from_row_value(value: &RowValues) -> Result<Self, StoreError> {
        value.as_float().ok_or_else(|| mismatch("float", value))
    }
}

impl FromRowValue for bool {
    fn from_row_value(value: &RowValues) -> Result<Self, StoreError> {
        value.as_bool().copied().ok_or_else(|| mismatch("bool", value))
    }
}

impl FromRowValue for String {
    fn from_row_value(value: &RowValues) -> Result<Self, StoreError> {
        value
            .as_text()
            .map(ToString::to_string)
            .ok_or_else(|| mismatch("text", value))
    }
}

impl FromRowValue for NaiveDateTime {
    fn from_row_value(value: &RowValues) -> Result<Self, StoreError> {
        value.as_timestamp().ok_or_else(|| mismatch("timestamp", value))
    }
}

impl FromRowValue for DateTime<Utc> {
    fn from_row_value(value: &RowValues) -> Result<Self, StoreError> {
        NaiveDateTime::from_row_value(value).map(|dt| dt.and_utc())
    }
}

impl FromRowValue for JsonValue {
    fn from_row_value(value: &RowValues) -> Result<Self, StoreError> {
        value.as_json().cloned().ok_or_else(|| mismatch("json", value))
    }
}

impl FromRowValue for Vec<u8> {
    fn from_row_value(value: &RowValues) -> Result<Self, StoreError> {
        value
            .as_blob()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| mismatch("blob", value))
    }
}

impl<T: FromRowValue> FromRowValue for Option<T> {
    fn from_row_value(value: &RowValues) -> Result<Self, StoreError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_row_value(value).map(Some)
        }
    }
}

/// Build a [`QueryParameters`] map from `name => value` pairs.
#[macro_export]
macro_rules! params {
    () => {
        $crate::QueryParameters::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut params = $crate::QueryParameters::new();
        $(
            params.insert(::std::string::String::from($name), $crate::RowValues::from($value));
        )+
        params
    }};
}
