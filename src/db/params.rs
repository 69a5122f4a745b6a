//! Parameter binding for prepared statements.
//!
//! Values bind positionally, in the order the caller listed them.

use crate::models::QueryParam;
use chrono::NaiveDateTime;
use sqlx::query::Query;
use sqlx::{Database, Encode, Type};

type Arguments<'q, DB> = <DB as Database>::Arguments<'q>;

/// Bind every parameter to `query`, for any backend that can encode the
/// parameter types. SQLite stores timestamps as `YYYY-MM-DD HH:MM:SS` text.
pub(crate) fn bind_params<'q, DB>(
    query: Query<'q, DB, Arguments<'q, DB>>,
    params: &'q [QueryParam],
) -> Query<'q, DB, Arguments<'q, DB>>
where
    DB: Database,
    bool: Encode<'q, DB> + Type<DB>,
    i64: Encode<'q, DB> + Type<DB>,
    f64: Encode<'q, DB> + Type<DB>,
    &'q str: Encode<'q, DB> + Type<DB>,
    Option<String>: Encode<'q, DB> + Type<DB>,
    NaiveDateTime: Encode<'q, DB> + Type<DB>,
{
    params.iter().fold(query, |query, param| match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Timestamp(v) => query.bind(*v),
    })
}
