//! Row to JSON conversion.
//!
//! Conversion happens in two phases:
//! 1. `TypeCategory` classifies a column type name into a logical category
//! 2. Database-specific decoders extract the value for that category
//!
//! Values that do not fit a JSON scalar (decimals, binary, temporals) are
//! rendered as strings so no precision is lost.

use crate::models::DatabaseType;
use serde_json::{Map, Value as JsonValue};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo};

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
    Temporal,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Checked first, "numeric" would otherwise look like a float
    if lower.contains("decimal") || lower.contains("numeric") {
        if db == DatabaseType::SQLite {
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

    // SQLite stores dates as text, the text decoder handles them
    if db != DatabaseType::SQLite
        && (lower.starts_with("timestamp")
            || lower == "datetime"
            || lower == "date"
            || lower == "time"
            || lower == "timetz")
    {
        return TypeCategory::Temporal;
    }

    if lower.contains("char") || lower.contains("text") || lower == "name" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

/// Raw DECIMAL/NUMERIC text, preserving the exact database representation.
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

/// Render binary column data as JSON.
///
/// Valid UTF-8 is returned as text, anything else as standard base64.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

/// Converts a database row into a JSON object keyed by column name.
pub trait RowToJson {
    fn to_json_map(&self) -> Map<String, JsonValue>;
}

impl RowToJson for MySqlRow {
    fn to_json_map(&self) -> Map<String, JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name, DatabaseType::MySQL);
                (col.name().to_string(), mysql::decode_column(self, idx, category))
            })
            .collect()
    }
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> Map<String, JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name, DatabaseType::PostgreSQL);
                (col.name().to_string(), postgres::decode_column(self, idx, category))
            })
            .collect()
    }
}

impl RowToJson for SqliteRow {
    fn to_json_map(&self) -> Map<String, JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name, DatabaseType::SQLite);
                (
                    col.name().to_string(),
                    sqlite::decode_column(self, idx, type_name, category),
                )
            })
            .collect()
    }
}

/// First non-null value among the listed Rust types, mapped through `$body`.
macro_rules! first_decoded {
    ($row:expr, $idx:expr, |$v:ident| $body:expr, $($ty:ty),+ $(,)?) => {
        None$(.or_else(|| {
            $row.try_get::<Option<$ty>, _>($idx).ok().flatten().map(|$v| $body)
        }))+
    };
}

mod mysql {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> JsonValue {
        let value = match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => first_decoded!(
                row, idx, |v| JsonValue::Number(v.into()),
                i64, i32, i16, i8, u64, u32, u16, u8,
            ),
            TypeCategory::Boolean => first_decoded!(row, idx, |v| JsonValue::Bool(v), bool),
            TypeCategory::Float => first_decoded!(
                row, idx, |v| float_value(v), f64
            )
            .or_else(|| first_decoded!(row, idx, |v| float_value(f64::from(v)), f32)),
            TypeCategory::Binary => {
                first_decoded!(row, idx, |v| decode_binary_value(&v), Vec<u8>)
            }
            TypeCategory::Json => first_decoded!(row, idx, |v| v, JsonValue),
            TypeCategory::Temporal => decode_temporal(row, idx).or_else(|| decode_text(row, idx)),
            TypeCategory::Text | TypeCategory::Unknown => decode_text(row, idx),
        };
        value.unwrap_or(JsonValue::Null)
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(v) => v.map(|v| JsonValue::String(v.0)),
            Err(e) => {
                tracing::error!("Failed to decode DECIMAL: {:?}", e);
                None
            }
        }
    }

    fn decode_temporal(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        first_decoded!(row, idx, |v| JsonValue::String(v.to_rfc3339()), DateTime<Utc>).or_else(
            || {
                first_decoded!(
                    row, idx, |v| JsonValue::String(v.to_string()),
                    NaiveDateTime, NaiveDate, NaiveTime,
                )
            },
        )
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        first_decoded!(row, idx, |v| JsonValue::String(v), String).or_else(|| {
            // information_schema columns come back as VARBINARY on some servers
            row.try_get_unchecked::<Option<Vec<u8>>, _>(idx)
                .ok()
                .flatten()
                .map(|v| decode_binary_value(&v))
        })
    }
}

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
        let value = match category {
            TypeCategory::Decimal => match row.try_get::<Option<RawDecimal>, _>(idx) {
                Ok(v) => v.map(|v| JsonValue::String(v.0)),
                Err(e) => {
                    tracing::error!("Failed to decode NUMERIC: {:?}", e);
                    None
                }
            },
            TypeCategory::Integer => {
                first_decoded!(row, idx, |v| JsonValue::Number(v.into()), i64, i32, i16)
            }
            TypeCategory::Boolean => first_decoded!(row, idx, |v| JsonValue::Bool(v), bool),
            TypeCategory::Float => first_decoded!(row, idx, |v| float_value(v), f64)
                .or_else(|| first_decoded!(row, idx, |v| float_value(f64::from(v)), f32)),
            TypeCategory::Binary => {
                first_decoded!(row, idx, |v| decode_binary_value(&v), Vec<u8>)
            }
            TypeCategory::Json => first_decoded!(row, idx, |v| v, JsonValue),
            TypeCategory::Temporal => {
                first_decoded!(row, idx, |v| JsonValue::String(v.to_rfc3339()), DateTime<Utc>)
                    .or_else(|| {
                        first_decoded!(
                            row, idx, |v| JsonValue::String(v.to_string()),
                            NaiveDateTime, NaiveDate, NaiveTime,
                        )
                    })
            }
            TypeCategory::Text | TypeCategory::Unknown => {
                first_decoded!(row, idx, |v| JsonValue::String(v), String)
            }
        };
        value.unwrap_or(JsonValue::Null)
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> JsonValue {
        match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float | TypeCategory::Decimal => decode_float(row, idx),
            TypeCategory::Binary => decode_binary_col(row, idx),
            _ => decode_dynamic(row, idx, type_name),
        }
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<i64>, _>(idx) {
            Ok(Some(v)) => JsonValue::Number(v.into()),
            Ok(None) => JsonValue::Null,
            // Declared INTEGER but holding another storage class
            Err(_) => decode_dynamic(row, idx, ""),
        }
    }

    fn decode_boolean(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<f64>, _>(idx) {
            Ok(Some(v)) => float_value(v),
            Ok(None) => JsonValue::Null,
            Err(_) => decode_dynamic(row, idx, ""),
        }
    }

    fn decode_binary_col(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| decode_binary_value(&v))
            .unwrap_or(JsonValue::Null)
    }

    /// Decode by the value's storage class. Used for expression columns and
    /// declared types SQLite does not enforce.
    fn decode_dynamic(row: &SqliteRow, idx: usize, type_name: &str) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
            if type_name.to_lowercase().contains("json") {
                if let Ok(json) = serde_json::from_str::<JsonValue>(&v) {
                    return json;
                }
            }
            return JsonValue::String(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<Vec<u8>>, _>(idx) {
            return decode_binary_value(&v);
        }
        JsonValue::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("INT", DatabaseType::MySQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("BIGINT", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("SERIAL", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("DECIMAL", DatabaseType::MySQL),
            TypeCategory::Decimal
        );
        assert_eq!(
            categorize_type("NUMERIC", DatabaseType::SQLite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_temporal() {
        assert_eq!(
            categorize_type("TIMESTAMPTZ", DatabaseType::PostgreSQL),
            TypeCategory::Temporal
        );
        assert_eq!(
            categorize_type("DATETIME", DatabaseType::MySQL),
            TypeCategory::Temporal
        );
        assert_eq!(
            categorize_type("DATETIME", DatabaseType::SQLite),
            TypeCategory::Unknown
        );
    }

    #[test]
    fn test_categorize_type_text_and_unknown() {
        assert_eq!(
            categorize_type("VARCHAR", DatabaseType::MySQL),
            TypeCategory::Text
        );
        assert_eq!(
            categorize_type("NULL", DatabaseType::SQLite),
            TypeCategory::Unknown
        );
    }

    #[test]
    fn test_decode_binary_value() {
        assert_eq!(
            decode_binary_value(b"hello world"),
            JsonValue::String("hello world".to_string())
        );
        assert_eq!(
            decode_binary_value(&[0xFF, 0xFE, 0x00, 0x01]),
            JsonValue::String("//4AAQ==".to_string())
        );
    }

    #[test]
    fn test_float_value_handles_nan() {
        assert_eq!(float_value(1.5), serde_json::json!(1.5));
        assert_eq!(float_value(f64::NAN), JsonValue::String("NaN".to_string()));
    }
}
