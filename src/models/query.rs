//! Query-related data models.
//!
//! This module defines the typed parameters accepted by `execute_sql_query`,
//! the bindable values they turn into, and the result shape the tool returns.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A value ready to be bound to a prepared statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Null,
    Bool(bool),
    /// Stored as i64 for maximum range
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(NaiveDateTime),
}

impl QueryParam {
    /// Infer a bindable value from a bare JSON value.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            JsonValue::String(s) => Self::String(s.clone()),
            other => Self::String(other.to_string()),
        }
    }
}

/// Declared type of a statement parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlParamType {
    String,
    Number,
    Boolean,
    Date,
}

impl SqlParamType {
    /// Unknown names fall back to `String`.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "date" => Self::Date,
            _ => Self::String,
        }
    }
}

/// One entry of the `parameters` argument of `execute_sql_query`.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct SqlParameter {
    /// Parameter name, informational only; values bind by position
    #[serde(default)]
    pub name: Option<String>,
    /// Parameter type: string, number, boolean or date
    #[serde(rename = "type", default)]
    pub param_type: Option<String>,
    /// Parameter value
    #[serde(default)]
    pub value: JsonValue,
}

impl SqlParameter {
    /// Convert to a bindable value according to the declared type.
    pub fn to_query_param(&self) -> Result<QueryParam, String> {
        if self.value.is_null() {
            return Ok(QueryParam::Null);
        }
        let Some(declared) = self.param_type.as_deref() else {
            return Ok(QueryParam::from_json(&self.value));
        };

        match SqlParamType::from_name(declared) {
            SqlParamType::String => Ok(QueryParam::String(match &self.value {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            })),
            SqlParamType::Number => self.number(),
            SqlParamType::Boolean => self.boolean(),
            SqlParamType::Date => self.date(),
        }
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    fn number(&self) -> Result<QueryParam, String> {
        match &self.value {
            JsonValue::Number(n) => Ok(QueryParam::from_json(&JsonValue::Number(n.clone()))),
            JsonValue::String(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    Ok(QueryParam::Int(i))
                } else if let Ok(f) = s.parse::<f64>() {
                    Ok(QueryParam::Float(f))
                } else {
                    Err(format!("parameter {} is not a number: {}", self.label(), s))
                }
            }
            other => Err(format!("parameter {} is not a number: {}", self.label(), other)),
        }
    }

    fn boolean(&self) -> Result<QueryParam, String> {
        match &self.value {
            JsonValue::Bool(b) => Ok(QueryParam::Bool(*b)),
            JsonValue::Number(n) => Ok(QueryParam::Bool(n.as_f64().unwrap_or_default() != 0.0)),
            JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(QueryParam::Bool(true)),
                "false" | "0" => Ok(QueryParam::Bool(false)),
                _ => Err(format!("parameter {} is not a boolean: {}", self.label(), s)),
            },
            other => Err(format!("parameter {} is not a boolean: {}", self.label(), other)),
        }
    }

    fn date(&self) -> Result<QueryParam, String> {
        let JsonValue::String(s) = &self.value else {
            return Err(format!(
                "parameter {} must be a date string, got {}",
                self.label(),
                self.value
            ));
        };
        parse_timestamp(s)
            .map(QueryParam::Timestamp)
            .ok_or_else(|| format!("parameter {} is not a valid date: {}", self.label(), s))
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]`, `YYYY-MM-DDTHH:MM:SS[.f]` and
/// plain dates. Offsets are normalized to UTC.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Result of `execute_sql_query`.
///
/// Every statement contributes one entry to `rowsAffected` and one result set
/// to `recordsets`; `recordset` is the first result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutcome {
    pub rows_affected: Vec<u64>,
    pub recordset: Vec<Map<String, JsonValue>>,
    pub recordsets: Vec<Vec<Map<String, JsonValue>>>,
}

impl QueryOutcome {
    /// Outcome of a statement that produced rows.
    pub fn from_rows(rows: Vec<Map<String, JsonValue>>) -> Self {
        Self {
            rows_affected: vec![rows.len() as u64],
            recordset: rows.clone(),
            recordsets: vec![rows],
        }
    }

    /// Outcome of a statement that only changed rows.
    pub fn from_affected(rows_affected: u64) -> Self {
        Self {
            rows_affected: vec![rows_affected],
            recordset: Vec::new(),
            recordsets: vec![Vec::new()],
        }
    }
}
