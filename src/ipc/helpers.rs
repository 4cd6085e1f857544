use crate::config::SETTING_EXCLUSION_STATUSES;
use crate::db;
use crate::ipc::error::err;
use crate::ipc::types::Request;
use crate::metrics::MetricsOptions;
use crate::normalize::parse_date;
use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

pub const MIN_YEAR: i64 = 1900;
pub const MAX_YEAR: i64 = 9999;

/// A year given as an integer or a numeric string, within
/// `MIN_YEAR..=MAX_YEAR`.
pub fn year_from_value(v: &serde_json::Value) -> Option<i32> {
    let parsed = v
        .as_i64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse::<i64>().ok()))?;
    if (MIN_YEAR..=MAX_YEAR).contains(&parsed) {
        i32::try_from(parsed).ok()
    } else {
        None
    }
}

pub fn optional_year(req: &Request, key: &str) -> Result<Option<i32>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => match year_from_value(v) {
            Some(y) => Ok(Some(y)),
            None => Err(err(
                &req.id,
                "bad_params",
                format!("{} must be a year", key),
                Some(serde_json::json!({ "value": v })),
            )),
        },
    }
}

/// `params.asOf` as a calendar date; today (local) when absent.
pub fn as_of(req: &Request) -> Result<NaiveDate, serde_json::Value> {
    match req.params.get("asOf") {
        None | Some(serde_json::Value::Null) => Ok(chrono::Local::now().date_naive()),
        Some(v) => parse_date(v.as_str()).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                "asOf must be a date (YYYY-MM-DD)",
                Some(serde_json::json!({ "value": v })),
            )
        }),
    }
}

/// Aggregation options for `year`, applying the workspace's exclusion
/// status override when one is stored.
pub fn metrics_options(
    conn: &Connection,
    year: Option<i32>,
    as_of: NaiveDate,
) -> anyhow::Result<MetricsOptions> {
    let opts = MetricsOptions::new(year.unwrap_or_else(|| as_of.year()), as_of);
    let stored = db::settings_get_json(conn, SETTING_EXCLUSION_STATUSES)?;
    let Some(list) = stored.as_ref().and_then(|v| v.as_array()) else {
        return Ok(opts);
    };
    let statuses: Vec<&str> = list.iter().filter_map(|v| v.as_str()).collect();
    Ok(opts.with_excluded_statuses(statuses))
}
