//! Query-related data models.
//!
//! Requests carry SQL plus positional parameters; results are backend-agnostic
//! so a caller cannot tell from a [`QueryResult`] which connection served it.

use serde::Serialize;
use serde_json::Value as JsonValue;

/// Default query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u32 = 30;

/// Maximum query timeout in seconds.
pub const MAX_QUERY_TIMEOUT_SECS: u32 = 300;

/// A parameter value for parameterized queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Null,
    Bool(bool),
    /// Stored as i64 for maximum range
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for QueryParam {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for QueryParam {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A read request handed to the router.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub sql: String,
    pub params: Vec<QueryParam>,
    /// Row cap for this read. `None` returns every row unless the executor has a default cap.
    pub limit: Option<u32>,
    /// Decode valid UTF-8 blobs as text instead of base64
    pub decode_binary: bool,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            limit: None,
            decode_binary: false,
        }
    }

    /// Add a parameter to this query.
    pub fn with_param(mut self, param: impl Into<QueryParam>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_decode_binary(mut self, decode_binary: bool) -> Self {
        self.decode_binary = decode_binary;
        self
    }

    /// The request's own limit, else `default_limit`. `None` means unbounded.
    pub fn effective_limit(&self, default_limit: Option<u32>) -> Option<u32> {
        self.limit.or(default_limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Normalized type name (e.g., "integer", "text", "bigint")
    pub type_name: String,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    /// True if a limit applied and more rows were available than it allowed
    pub truncated: bool,
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn empty(execution_time_ms: u64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            truncated: false,
            execution_time_ms,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Collect one column's values across all rows, skipping rows without it.
    pub fn column_values(&self, column: &str) -> Vec<&JsonValue> {
        self.rows.iter().filter_map(|row| row.get(column)).collect()
    }
}

/// Outcome of a write executed on the primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResult {
    pub rows_affected: u64,
    pub execution_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_unbounded_by_default() {
        let req = QueryRequest::new("SELECT * FROM users");
        assert_eq!(req.effective_limit(None), None);
        assert_eq!(req.effective_limit(Some(500)), Some(500));
    }

    #[test]
    fn test_request_limit_overrides_default() {
        let req = QueryRequest::new("SELECT * FROM users").with_limit(20_000);
        assert_eq!(req.effective_limit(None), Some(20_000));
        assert_eq!(req.effective_limit(Some(500)), Some(20_000));
    }

    #[test]
    fn test_query_param_conversions() {
        let req = QueryRequest::new("SELECT ?, ?, ?")
            .with_param("x")
            .with_param(7_i64)
            .with_param(true)
            .with_decode_binary(true);
        assert_eq!(
            req.params,
            vec![
                QueryParam::String("x".to_string()),
                QueryParam::Int(7),
                QueryParam::Bool(true),
            ]
        );
        assert!(req.decode_binary);
    }

    #[test]
    fn test_query_result_column_values() {
        let mut row = serde_json::Map::new();
        row.insert("name".to_string(), JsonValue::String("Joe".to_string()));
        let result = QueryResult {
            columns: vec![ColumnMetadata::new("name", "text")],
            rows: vec![row, serde_json::Map::new()],
            truncated: false,
            execution_time_ms: 1,
        };
        assert_eq!(result.column_values("name"), vec![&JsonValue::String("Joe".into())]);
        assert!(QueryResult::empty(0).is_empty());
    }
}
