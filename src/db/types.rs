//! Database-agnostic type mappings.
//!
//! Rows from any backend are converted to JSON maps and their column types are
//! normalized, so a result carries no trace of the connection that produced it.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction

use crate::models::{ColumnMetadata, DatabaseType};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Checked first since "numeric" would otherwise look like a float
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC affinity is a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    // varchar, text, char, uuid, date, time, ...
    TypeCategory::Text
}

/// Normalize a database type name so equivalent columns look alike on every backend.
pub fn normalize_type_name(type_name: &str) -> String {
    let lower = type_name.to_lowercase();

    let normalized = match lower.as_str() {
        "int4" | "integer" | "int" => "integer",
        "int8" | "bigint" | "bigserial" => "bigint",
        "int2" | "smallint" => "smallint",
        "tinyint" | "tiny" => "tinyint",
        "varchar" | "character varying" | "text" | "string" => "text",
        "char" | "character" | "bpchar" => "char",
        "bool" | "boolean" => "boolean",
        "float4" | "real" | "float" => "real",
        "float8" | "double precision" | "double" => "double",
        "bytea" | "blob" | "binary" | "varbinary" => "binary",
        "timestamp" | "timestamptz" | "datetime" => "timestamp",
        "time" | "timetz" => "time",
        "json" | "jsonb" => "json",
        _ => return lower,
    };
    normalized.to_string()
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Raw DECIMAL/NUMERIC value kept as its exact textual representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Value Helpers
// =============================================================================

/// Encode binary data as JSON.
///
/// With `decode_binary`, valid UTF-8 becomes a plain string; everything else is base64.
pub fn decode_binary_value(bytes: &[u8], decode_binary: bool) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) if decode_binary => JsonValue::String(s.to_string()),
        _ => JsonValue::String(STANDARD.encode(bytes)),
    }
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

fn text_value(v: String, type_name: &str) -> JsonValue {
    if type_name.to_lowercase().contains("json") {
        if let Ok(json) = serde_json::from_str::<JsonValue>(&v) {
            return json;
        }
    }
    JsonValue::String(v)
}

/// Try each Rust type in order and return the first successfully decoded non-NULL value.
///
/// A NULL in the column, or no matching type, yields `JsonValue::Null`.
macro_rules! decode_first {
    ($row:expr, $idx:expr, $($ty:ty => $map:expr),+ $(,)?) => {{
        $(
            if let Ok(Some(v)) = $row.try_get::<Option<$ty>, _>($idx) {
                return $map(v);
            }
        )+
        JsonValue::Null
    }};
}

// =============================================================================
// Row to JSON Trait
// =============================================================================

/// Conversion of backend-specific rows into the router's result shape.
pub trait RowToJson {
    fn to_json_map(&self, decode_binary: bool) -> serde_json::Map<String, JsonValue>;
    fn column_metadata(&self) -> Vec<ColumnMetadata>;
}

macro_rules! impl_row_to_json {
    ($row:ty, $db:expr, $decoder:path) => {
        impl RowToJson for $row {
            fn to_json_map(&self, decode_binary: bool) -> serde_json::Map<String, JsonValue> {
                self.columns()
                    .iter()
                    .enumerate()
                    .map(|(idx, col)| {
                        let type_name = col.type_info().name();
                        let category = categorize_type(type_name, $db);
                        let value = $decoder(self, idx, type_name, category, decode_binary);
                        (col.name().to_string(), value)
                    })
                    .collect()
            }

            fn column_metadata(&self) -> Vec<ColumnMetadata> {
                self.columns()
                    .iter()
                    .map(|col| {
                        ColumnMetadata::new(col.name(), normalize_type_name(col.type_info().name()))
                    })
                    .collect()
            }
        }
    };
}

impl_row_to_json!(MySqlRow, DatabaseType::MySQL, mysql::decode_column);
impl_row_to_json!(PgRow, DatabaseType::PostgreSQL, postgres::decode_column);
impl_row_to_json!(SqliteRow, DatabaseType::SQLite, sqlite::decode_column);

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
        decode_binary: bool,
    ) -> JsonValue {
        match category {
            TypeCategory::Decimal => decode_first!(row, idx, RawDecimal => |v: RawDecimal| JsonValue::String(v.0)),
            TypeCategory::Integer => decode_first!(row, idx,
                i64 => |v: i64| JsonValue::Number(v.into()),
                u64 => |v: u64| JsonValue::Number(v.into()),
                i32 => |v: i32| JsonValue::Number(v.into()),
                i8 => |v: i8| JsonValue::Number(v.into()),
            ),
            TypeCategory::Boolean => decode_first!(row, idx, bool => JsonValue::Bool),
            TypeCategory::Float => decode_first!(row, idx,
                f64 => float_value,
                f32 => |v: f32| float_value(v as f64),
            ),
            TypeCategory::Binary => decode_first!(row, idx,
                Vec<u8> => |v: Vec<u8>| decode_binary_value(&v, decode_binary),
            ),
            TypeCategory::Json => decode_first!(row, idx, JsonValue => |v: JsonValue| v),
            TypeCategory::Text => decode_first!(row, idx,
                String => |v: String| text_value(v, type_name),
            ),
        }
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
        decode_binary: bool,
    ) -> JsonValue {
        match category {
            TypeCategory::Decimal => decode_first!(row, idx, RawDecimal => |v: RawDecimal| JsonValue::String(v.0)),
            TypeCategory::Integer => decode_first!(row, idx,
                i64 => |v: i64| JsonValue::Number(v.into()),
                i32 => |v: i32| JsonValue::Number(v.into()),
                i16 => |v: i16| JsonValue::Number(v.into()),
            ),
            TypeCategory::Boolean => decode_first!(row, idx, bool => JsonValue::Bool),
            TypeCategory::Float => decode_first!(row, idx,
                f64 => float_value,
                f32 => |v: f32| float_value(v as f64),
            ),
            TypeCategory::Binary => decode_first!(row, idx,
                Vec<u8> => |v: Vec<u8>| decode_binary_value(&v, decode_binary),
            ),
            TypeCategory::Json => decode_first!(row, idx, JsonValue => |v: JsonValue| v),
            TypeCategory::Text => decode_first!(row, idx,
                String => |v: String| text_value(v, type_name),
            ),
        }
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
        decode_binary: bool,
    ) -> JsonValue {
        match category {
            TypeCategory::Integer => decode_first!(row, idx, i64 => |v: i64| JsonValue::Number(v.into())),
            TypeCategory::Boolean => decode_first!(row, idx, bool => JsonValue::Bool),
            TypeCategory::Float | TypeCategory::Decimal => decode_first!(row, idx, f64 => float_value),
            TypeCategory::Binary => decode_first!(row, idx,
                Vec<u8> => |v: Vec<u8>| decode_binary_value(&v, decode_binary),
            ),
            // SQLite has no JSON column type; JSON stored in TEXT is parsed by text_value
            TypeCategory::Json | TypeCategory::Text => decode_first!(row, idx,
                String => |v: String| text_value(v, type_name),
                i64 => |v: i64| JsonValue::Number(v.into()),
                f64 => float_value,
            ),
        }
    }
}
