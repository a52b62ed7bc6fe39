//! Column encoding shared by the row mappers.
//!
//! Timestamps are stored as RFC 3339 text with a fixed microsecond precision
//! so that lexical order equals chronological order. Ids are UUID text and
//! decimals are their canonical string form.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use rust_decimal::Decimal;
use uuid::Uuid;

/// The current time at storage precision, so returned records compare equal
/// to what a later read produces.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub(crate) fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error<E>(row: &Row<'_>, col: &str, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let idx = row.as_ref().column_index(col).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Parse a text column through `FromStr` (ids, enums, decimals).
pub(crate) fn parsed<T>(row: &Row<'_>, col: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(col)?;
    raw.parse().map_err(|e| conversion_error(row, col, e))
}

pub(crate) fn parsed_opt<T>(row: &Row<'_>, col: &str) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(col)?;
    raw.map(|s| s.parse().map_err(|e| conversion_error(row, col, e)))
        .transpose()
}

pub(crate) fn id<T: From<Uuid>>(row: &Row<'_>, col: &str) -> rusqlite::Result<T> {
    parsed::<Uuid>(row, col).map(T::from)
}

pub(crate) fn id_opt<T: From<Uuid>>(row: &Row<'_>, col: &str) -> rusqlite::Result<Option<T>> {
    Ok(parsed_opt::<Uuid>(row, col)?.map(T::from))
}

pub(crate) fn time(row: &Row<'_>, col: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(col)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(row, col, e))
}

pub(crate) fn time_opt(row: &Row<'_>, col: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(col)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(row, col, e))
    })
    .transpose()
}

pub(crate) fn decimal_opt(row: &Row<'_>, col: &str) -> rusqlite::Result<Option<Decimal>> {
    parsed_opt::<Decimal>(row, col)
}

pub(crate) fn decimal_text(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.normalize().to_string())
}
