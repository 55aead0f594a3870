//! Column decoding helpers shared by the repositories.

use std::fmt::Display;
use std::str::FromStr;

use netalloc_domain::time::{Date, parse_date};

fn decode_error(err: impl Display) -> sqlx::Error {
    sqlx::Error::Decode(crate::error::StorageError::Decode(err.to_string()).into())
}

/// Parse a TEXT column through the type's [`FromStr`] impl (ids, enums).
pub(crate) fn parse<T>(value: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: Display,
{
    T::from_str(value).map_err(decode_error)
}

pub(crate) fn parse_opt<T>(value: Option<String>) -> Result<Option<T>, sqlx::Error>
where
    T: FromStr,
    T::Err: Display,
{
    value.as_deref().map(parse).transpose()
}

pub(crate) fn date(value: &str) -> Result<Date, sqlx::Error> {
    parse_date(value).map_err(decode_error)
}

pub(crate) fn date_opt(value: Option<String>) -> Result<Option<Date>, sqlx::Error> {
    value.as_deref().map(date).transpose()
}

/// Convert a row count into the `u64` the ports expose.
pub(crate) fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}
