//! Stored documents, server time, and write preconditions.

use crate::error::{Result, StoreError};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use dishpatch_core::Collection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Mutex, PoisonError};

/// Keys the store fills from document metadata; writes may not set them.
pub const RESERVED_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];

/// A document as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Collection the document lives in
    pub collection: Collection,
    /// Document ID, unique within the collection
    pub id: String,
    /// Document body
    pub data: Map<String, Value>,
    /// Server time of creation
    pub create_time: DateTime<Utc>,
    /// Server time of the last write
    pub update_time: DateTime<Utc>,
}

impl Document {
    /// Look up a top-level field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Look up a top-level string field.
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(Value::as_str)
    }

    /// Deserialize the document into a model.
    ///
    /// `id`, `created_at` and `updated_at` are taken from the document
    /// metadata, so models can declare them as ordinary fields.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.clone()));
        data.insert("created_at".to_string(), timestamp_value(self.create_time));
        data.insert("updated_at".to_string(), timestamp_value(self.update_time));
        Ok(serde_json::from_value(Value::Object(data))?)
    }
}

/// Serialize a model into a document body, dropping the metadata keys.
pub fn to_data<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(mut data) => {
            for key in RESERVED_FIELDS {
                data.remove(key);
            }
            Ok(data)
        }
        other => Err(StoreError::InvalidArgument(format!(
            "document body must be an object, got {other}"
        ))),
    }
}

/// Reject bodies that try to set metadata keys.
pub(crate) fn check_body(data: &Map<String, Value>) -> Result<()> {
    match RESERVED_FIELDS.iter().find(|key| data.contains_key(**key)) {
        Some(key) => Err(StoreError::InvalidArgument(format!(
            "'{key}' is assigned by the store and cannot be written"
        ))),
        None => Ok(()),
    }
}

/// Format a timestamp the way the store persists it.
///
/// Fixed-width RFC 3339 with microseconds, so string order is time order.
#[must_use]
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// A timestamp as a JSON value, suitable for filters and cursors.
#[must_use]
pub fn timestamp_value(time: DateTime<Utc>) -> Value {
    Value::String(format_timestamp(time))
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Internal(format!("bad stored timestamp '{raw}': {e}")))
}

/// Source of server time for writes.
///
/// Hands out strictly increasing microsecond timestamps, so two writes in
/// the same microsecond still order deterministically.
#[derive(Debug)]
pub struct ServerClock {
    last: Mutex<DateTime<Utc>>,
}

impl Default for ServerClock {
    fn default() -> Self {
        Self {
            last: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }
}

impl ServerClock {
    /// Next server timestamp.
    pub fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now();
        let wall = DateTime::from_timestamp_micros(wall.timestamp_micros()).unwrap_or(wall);

        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let next = if wall > *last {
            wall
        } else {
            *last + Duration::microseconds(1)
        };
        *last = next;
        next
    }

    /// Never hand out a timestamp at or before `time`.
    pub fn observe(&self, time: DateTime<Utc>) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if time > *last {
            *last = time;
        }
    }
}

/// Conditions on the current document, checked atomically with an update.
///
/// Every condition must hold. A missing field reads as `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Precondition {
    conditions: Vec<(String, Vec<Value>)>,
}

impl Precondition {
    /// The field must currently hold one of `values`.
    pub fn field_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            conditions: Vec::new(),
        }
        .and_in(field, values)
    }

    /// The field must currently equal `value`.
    pub fn field_eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field_in(field, [value.into()])
    }

    /// Also require the field to hold one of `values`.
    #[must_use]
    pub fn and_in<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.conditions
            .push((field.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Also require the field to equal `value`.
    #[must_use]
    pub fn and_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and_in(field, [value.into()])
    }

    /// Check the conditions against a document body.
    ///
    /// # Errors
    /// Returns `StoreError::FailedPrecondition` naming the first field whose
    /// current value is not allowed.
    pub fn check(&self, collection: Collection, id: &str, data: &Map<String, Value>) -> Result<()> {
        for (field, allowed) in &self.conditions {
            let current = data.get(field).unwrap_or(&Value::Null);
            if allowed.contains(current) {
                continue;
            }

            let expected: Vec<String> = allowed.iter().map(Value::to_string).collect();
            return Err(StoreError::FailedPrecondition(format!(
                "{collection}/{id}: {field} is {current}, expected one of [{}]",
                expected.join(", ")
            )));
        }
        Ok(())
    }
}
