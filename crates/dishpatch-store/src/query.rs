//! Queries: filters, ordering, limits and cursor continuation.
//!
//! A [`Query`] is compiled into SQL over the `documents` table. Field names
//! are validated and inlined as `json_extract(data, '$.name')` so the
//! expression indexes apply; every value is bound as a parameter.

use crate::document::{format_timestamp, Document};
use crate::error::{Result, StoreError};
use dishpatch_core::Collection;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite};
use std::sync::OnceLock;

/// Maximum number of values in an `In` / `NotIn` filter.
pub const MAX_IN_VALUES: usize = 30;

/// What a filter or ordering reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldPath {
    /// The document ID
    DocumentId,
    /// Server time of creation
    CreateTime,
    /// Server time of the last write
    UpdateTime,
    /// A top-level field of the document body
    Field(String),
}

impl FieldPath {
    /// A top-level body field.
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    fn validate(&self) -> Result<()> {
        static FIELD_REGEX: OnceLock<Regex> = OnceLock::new();

        if let Self::Field(name) = self {
            let regex = FIELD_REGEX
                .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("valid regex"));
            if !regex.is_match(name) {
                return Err(StoreError::InvalidArgument(format!(
                    "invalid field name '{name}'"
                )));
            }
        }
        Ok(())
    }

    fn sql(&self) -> String {
        match self {
            Self::DocumentId => "id".to_string(),
            Self::CreateTime => "create_time".to_string(),
            Self::UpdateTime => "update_time".to_string(),
            Self::Field(name) => format!("json_extract(data, '$.{name}')"),
        }
    }

    /// Value of this path on a document, as used in cursors.
    #[must_use]
    pub fn value_of(&self, doc: &Document) -> Value {
        match self {
            Self::DocumentId => Value::String(doc.id.clone()),
            Self::CreateTime => Value::String(format_timestamp(doc.create_time)),
            Self::UpdateTime => Value::String(format_timestamp(doc.update_time)),
            Self::Field(name) => doc.data.get(name).cloned().unwrap_or(Value::Null),
        }
    }
}

/// Comparison operator of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// `==`
    Eq,
    /// `!=`; documents without the field never match
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// Field equals one of an array of values
    In,
    /// Field equals none of an array of values
    NotIn,
}

impl FilterOp {
    fn sql(self) -> &'static str {
        match self {
            Self::Eq => " = ",
            Self::NotEq => " != ",
            Self::Lt => " < ",
            Self::Lte => " <= ",
            Self::Gt => " > ",
            Self::Gte => " >= ",
            Self::In => " IN ",
            Self::NotIn => " NOT IN ",
        }
    }
}

/// A single `field op value` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Field compared
    pub field: FieldPath,
    /// Operator
    pub op: FilterOp,
    /// Operand; an array for `In` / `NotIn`
    pub value: Value,
}

impl Filter {
    fn validate(&self) -> Result<()> {
        self.field.validate()?;

        match (self.op, &self.value) {
            (FilterOp::In | FilterOp::NotIn, Value::Array(values)) => {
                if values.len() > MAX_IN_VALUES {
                    return Err(StoreError::InvalidArgument(format!(
                        "'{:?}' filter accepts at most {MAX_IN_VALUES} values, got {}",
                        self.op,
                        values.len()
                    )));
                }
                if values.iter().any(|v| v.is_null()) {
                    return Err(StoreError::InvalidArgument(
                        "null is not allowed in an 'in' filter".to_string(),
                    ));
                }
                Ok(())
            }
            (FilterOp::In | FilterOp::NotIn, _) => Err(StoreError::InvalidArgument(format!(
                "'{:?}' filter requires an array value",
                self.op
            ))),
            (FilterOp::Eq | FilterOp::NotEq, _) => Ok(()),
            (_, Value::Null) => Err(StoreError::InvalidArgument(
                "range filters cannot compare against null".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn push_sql(&self, builder: &mut QueryBuilder<'static, Sqlite>) {
        let expr = self.field.sql();

        match (self.op, &self.value) {
            (FilterOp::Eq, Value::Null) => {
                builder.push(format!(" AND {expr} IS NULL"));
            }
            (FilterOp::NotEq, Value::Null) => {
                builder.push(format!(" AND {expr} IS NOT NULL"));
            }
            (FilterOp::In, Value::Array(values)) if values.is_empty() => {
                builder.push(" AND 0");
            }
            (FilterOp::NotIn, Value::Array(values)) if values.is_empty() => {
                builder.push(format!(" AND {expr} IS NOT NULL"));
            }
            (FilterOp::In | FilterOp::NotIn, Value::Array(values)) => {
                builder.push(format!(" AND {expr}{}(", self.op.sql()));
                let mut separated = builder.separated(", ");
                for value in values {
                    push_value_separated(&mut separated, value);
                }
                builder.push(")");
            }
            (op, value) => {
                builder.push(format!(" AND {expr}{}", op.sql()));
                push_value(builder, value);
            }
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Smallest first
    Ascending,
    /// Largest first
    #[default]
    Descending,
}

impl Direction {
    fn sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }

    fn after(self) -> &'static str {
        match self {
            Self::Ascending => " > ",
            Self::Descending => " < ",
        }
    }
}

/// Sort key of a query. The document ID always breaks ties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBy {
    /// Field sorted on
    pub field: FieldPath,
    /// Direction
    pub direction: Direction,
}

/// Position after the last document of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    /// Order-by value of the last document
    pub value: Value,
    /// ID of the last document
    pub id: String,
}

impl Cursor {
    /// Cursor positioned after `doc` under the given ordering.
    #[must_use]
    pub fn after(doc: &Document, order_by: &OrderBy) -> Self {
        Self {
            value: order_by.field.value_of(doc),
            id: doc.id.clone(),
        }
    }
}

/// A query over one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Collection queried
    pub collection: Collection,
    /// Conditions, all of which must hold
    pub filters: Vec<Filter>,
    /// Sort key
    pub order_by: OrderBy,
    /// Maximum number of documents returned
    pub limit: Option<u32>,
    /// Continue after this position
    pub start_after: Option<Cursor>,
}

impl Query {
    /// All documents of `collection`, newest first.
    #[must_use]
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: OrderBy {
                field: FieldPath::CreateTime,
                direction: Direction::Descending,
            },
            limit: None,
            start_after: None,
        }
    }

    /// Add a filter.
    #[must_use]
    pub fn filter(mut self, field: FieldPath, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field,
            op,
            value: value.into(),
        });
        self
    }

    /// Add an equality filter on a body field.
    #[must_use]
    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(FieldPath::field(field), FilterOp::Eq, value)
    }

    /// Add an `in` filter on a body field.
    #[must_use]
    pub fn where_in<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.filter(FieldPath::field(field), FilterOp::In, Value::Array(values))
    }

    /// Set the sort key.
    #[must_use]
    pub fn order_by(mut self, field: FieldPath, direction: Direction) -> Self {
        self.order_by = OrderBy { field, direction };
        self
    }

    /// Limit the number of documents returned.
    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Continue after a cursor.
    #[must_use]
    pub fn start_after(mut self, cursor: Option<Cursor>) -> Self {
        self.start_after = cursor;
        self
    }

    /// Equality filter value on `field`, if the query has one.
    #[must_use]
    pub fn equality_on(&self, field: &FieldPath) -> Option<&Value> {
        self.filters
            .iter()
            .find(|f| f.op == FilterOp::Eq && &f.field == field)
            .map(|f| &f.value)
    }

    /// Check field names and operands.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidArgument` for malformed filters or a zero limit.
    pub fn validate(&self) -> Result<()> {
        for filter in &self.filters {
            filter.validate()?;
        }
        self.order_by.field.validate()?;

        if self.limit == Some(0) {
            return Err(StoreError::InvalidArgument(
                "limit must be at least 1".to_string(),
            ));
        }
        if let Some(cursor) = &self.start_after {
            if cursor.value.is_null() && self.order_by.field != FieldPath::DocumentId {
                return Err(StoreError::InvalidArgument(
                    "cursor value cannot be null".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Compile to a `SELECT` returning at most `fetch` rows.
    pub(crate) fn select_sql(&self, fetch: Option<i64>) -> QueryBuilder<'static, Sqlite> {
        let mut builder = QueryBuilder::new(
            "SELECT collection, id, data, create_time, update_time FROM documents WHERE collection = ",
        );
        builder.push_bind(self.collection.as_str());
        self.push_filters(&mut builder);

        let expr = self.order_by.field.sql();
        let direction = self.order_by.direction;

        if matches!(self.order_by.field, FieldPath::Field(_)) {
            builder.push(format!(" AND {expr} IS NOT NULL"));
        }

        if let Some(cursor) = &self.start_after {
            if self.order_by.field == FieldPath::DocumentId {
                builder.push(format!(" AND id{}", direction.after()));
                builder.push_bind(cursor.id.clone());
            } else {
                builder.push(format!(" AND ({expr}{}", direction.after()));
                push_value(&mut builder, &cursor.value);
                builder.push(format!(" OR ({expr} = "));
                push_value(&mut builder, &cursor.value);
                builder.push(format!(" AND id{}", direction.after()));
                builder.push_bind(cursor.id.clone());
                builder.push("))");
            }
        }

        if self.order_by.field == FieldPath::DocumentId {
            builder.push(format!(" ORDER BY id {}", direction.sql()));
        } else {
            builder.push(format!(
                " ORDER BY {expr} {dir}, id {dir}",
                dir = direction.sql()
            ));
        }

        if let Some(fetch) = fetch {
            builder.push(" LIMIT ");
            builder.push_bind(fetch);
        }

        builder
    }

    /// Compile to a `COUNT(*)` over the filters, ignoring order and cursor.
    pub(crate) fn count_sql(&self) -> QueryBuilder<'static, Sqlite> {
        let mut builder =
            QueryBuilder::new("SELECT COUNT(*) FROM documents WHERE collection = ");
        builder.push_bind(self.collection.as_str());
        self.push_filters(&mut builder);
        builder
    }

    fn push_filters(&self, builder: &mut QueryBuilder<'static, Sqlite>) {
        for filter in &self.filters {
            filter.push_sql(builder);
        }
    }
}

/// A page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Documents in query order
    pub documents: Vec<Document>,
    /// Cursor for the next page; `None` when this is the last page
    pub next_cursor: Option<Cursor>,
}

impl Page {
    /// Decode every document into a model.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.documents.iter().map(Document::decode).collect()
    }
}

fn push_value(builder: &mut QueryBuilder<'static, Sqlite>, value: &Value) {
    match value {
        Value::Bool(b) => builder.push_bind(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => builder.push_bind(i),
            None => builder.push_bind(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => builder.push_bind(s.clone()),
        Value::Null => builder.push_bind(None::<String>),
        other => builder.push_bind(other.to_string()),
    };
}

fn push_value_separated(
    separated: &mut sqlx::query_builder::Separated<'_, 'static, Sqlite, &'static str>,
    value: &Value,
) {
    match value {
        Value::Bool(b) => separated.push_bind(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => separated.push_bind(i),
            None => separated.push_bind(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => separated.push_bind(s.clone()),
        Value::Null => separated.push_bind(None::<String>),
        other => separated.push_bind(other.to_string()),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_query_is_newest_first() {
        let query = Query::new(Collection::Orders);
        let sql = query.select_sql(Some(21)).sql().to_string();
        assert!(sql.contains("ORDER BY create_time DESC, id DESC"));
        assert!(sql.ends_with("LIMIT ?"));
    }

    #[test]
    fn test_field_filters_inline_the_path() {
        let query = Query::new(Collection::Restaurants)
            .where_eq("status", "approved")
            .filter(FieldPath::field("rating"), FilterOp::Gte, 4);
        let sql = query.select_sql(None).sql().to_string();
        assert!(sql.contains("json_extract(data, '$.status') = ?"));
        assert!(sql.contains("json_extract(data, '$.rating') >= ?"));
    }

    #[test]
    fn test_null_and_empty_in_filters() {
        let sql = Query::new(Collection::Orders)
            .where_eq("driver_id", Value::Null)
            .where_in("status", Vec::<String>::new())
            .count_sql()
            .sql()
            .to_string();
        assert!(sql.contains("json_extract(data, '$.driver_id') IS NULL"));
        assert!(sql.contains(" AND 0"));
    }

    #[test]
    fn test_in_filter_binds_each_value() {
        let sql = Query::new(Collection::Restaurants)
            .where_in("status", ["pending", "approved"])
            .count_sql()
            .sql()
            .to_string();
        assert!(sql.contains("json_extract(data, '$.status') IN (?, ?)"));
    }

    #[test]
    fn test_cursor_uses_id_tiebreak() {
        let query = Query::new(Collection::Orders).start_after(Some(Cursor {
            value: json!("2026-10-19T12:00:00.000000Z"),
            id: "o1".to_string(),
        }));
        let sql = query.select_sql(Some(11)).sql().to_string();
        assert!(sql.contains("AND (create_time < ? OR (create_time = ? AND id < ?))"));

        let ascending = query
            .order_by(FieldPath::field("name"), Direction::Ascending)
            .select_sql(None)
            .sql()
            .to_string();
        assert!(ascending.contains("json_extract(data, '$.name') IS NOT NULL"));
        assert!(ascending.contains("ORDER BY json_extract(data, '$.name') ASC, id ASC"));
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let bad_field = Query::new(Collection::Users).where_eq("role') OR 1=1 --", "x");
        assert!(matches!(
            bad_field.validate(),
            Err(StoreError::InvalidArgument(_))
        ));

        let too_many = Query::new(Collection::Users).where_in("role", 0..=30);
        assert!(too_many.validate().is_err());

        let not_array =
            Query::new(Collection::Users).filter(FieldPath::field("role"), FilterOp::In, "x");
        assert!(not_array.validate().is_err());

        let null_range =
            Query::new(Collection::Users).filter(FieldPath::CreateTime, FilterOp::Lt, Value::Null);
        assert!(null_range.validate().is_err());

        assert!(Query::new(Collection::Users).limit(0).validate().is_err());
        assert!(Query::new(Collection::Users).limit(5).validate().is_ok());
    }

    #[test]
    fn test_equality_on() {
        let query = Query::new(Collection::CartItems).where_eq("customer_id", "u1");
        assert_eq!(
            query.equality_on(&FieldPath::field("customer_id")),
            Some(&json!("u1"))
        );
        assert_eq!(query.equality_on(&FieldPath::DocumentId), None);
    }
}
