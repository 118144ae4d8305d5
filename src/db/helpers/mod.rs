//! Conversions between SQLite column values and record fields.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::db::models::TerminationKind;

pub fn limit_param(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("{value} does not fit a SQLite INTEGER"))
}

pub fn minutes_column(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("planned_minutes holds {value}, expected 0..=u32::MAX"))
}

/// Instants are stored as RFC 3339 UTC with nanoseconds so text order is
/// chronological.
pub fn instant_param(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn instant_column(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("{field} is not an RFC 3339 instant: {value}"))
}

pub fn kind_column(value: &str) -> Result<TerminationKind> {
    TerminationKind::ALL
        .into_iter()
        .find(|kind| kind.as_str() == value)
        .ok_or_else(|| anyhow!("unknown termination kind {value}"))
}
