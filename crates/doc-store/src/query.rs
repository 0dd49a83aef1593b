//! Query parsing for list operations.
//!
//! List endpoints accept raw query parameters; [`ParsedQuery::from_params`]
//! turns them into a validated query against a per-collection allow-list of
//! filterable fields. Parameters outside the allow-list are dropped, so a
//! caller cannot filter on fields the collection does not expose.

use serde_json::{Map, Value};

use crate::error::QueryError;

/// Upper bound on documents returned by a single list operation.
pub const MAX_DATA_CHUNK: usize = 100;

/// Sort direction for a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Numeric form used by wire protocols (1 ascending, -1 descending).
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

/// A validated list query: equality filter, sort, and paging bounds.
#[derive(Debug, Clone)]
pub struct ParsedQuery {
    /// Field equality constraints, all of which must match
    pub filter: Map<String, Value>,

    /// Sort specification applied in order of appearance
    pub sort: Vec<(String, SortOrder)>,

    /// Documents to skip before collecting results
    pub skip: u64,

    /// Maximum documents to return, never above [`MAX_DATA_CHUNK`]
    pub limit: usize,
}

impl Default for ParsedQuery {
    fn default() -> Self {
        Self {
            filter: Map::new(),
            sort: default_sort(),
            skip: 0,
            limit: MAX_DATA_CHUNK,
        }
    }
}

impl ParsedQuery {
    /// Build a query from raw request parameters.
    ///
    /// `skip` and `limit` are reserved paging parameters; every other
    /// parameter becomes an equality constraint when its name appears in
    /// `allowed_fields` and is dropped otherwise. Values that look numeric
    /// or boolean are coerced so that `id=42` matches a numeric document
    /// field.
    pub fn from_params<'a>(
        params: impl IntoIterator<Item = (&'a str, &'a str)>,
        allowed_fields: &[&str],
    ) -> Result<Self, QueryError> {
        let mut query = Self::default();

        for (key, raw) in params {
            match key {
                "skip" => {
                    query.skip = raw.parse().map_err(|_| QueryError::InvalidValue {
                        field: "skip".to_string(),
                        message: format!("expected a non-negative integer, got {:?}", raw),
                    })?;
                }
                "limit" => {
                    let limit: usize = raw.parse().map_err(|_| QueryError::InvalidValue {
                        field: "limit".to_string(),
                        message: format!("expected a non-negative integer, got {:?}", raw),
                    })?;
                    query.limit = limit.min(MAX_DATA_CHUNK);
                }
                field if allowed_fields.contains(&field) => {
                    query.filter.insert(field.to_string(), coerce_value(raw));
                }
                _ => {}
            }
        }

        Ok(query)
    }

    /// Build a query with an explicit filter and default sort and paging.
    pub fn with_filter(filter: Map<String, Value>) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}

/// Newest-first ordering; documents written before `updated_at` stamping
/// began fall back to their creation time.
fn default_sort() -> Vec<(String, SortOrder)> {
    vec![
        ("updated_at".to_string(), SortOrder::Descending),
        ("created_at".to_string(), SortOrder::Descending),
    ]
}

/// Interpret a raw parameter value as the JSON type it looks like.
fn coerce_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// Extract the object map from a JSON value, treating anything else as an
/// empty filter.
pub fn filter_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
