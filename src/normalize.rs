use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub const UNNAMED_GROUP: &str = "Sin Nombre";

/// Lowercased, trimmed, accent-free form used for every status and name
/// comparison ("  Clínica " and "clinica" compare equal).
pub fn for_comparison(raw: &str) -> String {
    raw.to_lowercase()
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

pub fn opt_for_comparison(raw: Option<&str>) -> String {
    raw.map(for_comparison).unwrap_or_default()
}

/// Base name of a launch/institution: everything before the first
/// " - " or " – " separator. Sections of one opening share a group name.
pub fn group_name(name: Option<&str>) -> String {
    let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
        return UNNAMED_GROUP.to_string();
    };
    let cut = [" - ", " – "]
        .iter()
        .filter_map(|sep| name.find(sep))
        .min()
        .unwrap_or(name.len());
    let base = name[..cut].trim();
    if base.is_empty() {
        UNNAMED_GROUP.to_string()
    } else {
        base.to_string()
    }
}

/// Strips the bracket/quote noise that migrated text columns carry
/// (`["Hospital X"]` -> `Hospital X`).
pub fn clean_raw_value(raw: Option<&str>) -> String {
    raw.unwrap_or("")
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '{' | '}' | '"'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// First id out of a loose link column. Accepts a bare id, a comma list,
/// or an array-shaped text like `["rec1","rec2"]`.
pub fn link_id(raw: Option<&str>) -> Option<String> {
    let cleaned = clean_raw_value(raw);
    cleaned
        .split(',')
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Calendar date (UTC) of a stored date/timestamp. Unparseable input is `None`.
pub fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let s = raw?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc).date_naive());
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    NaiveDate::parse_from_str(s, "%d/%m/%Y").ok()
}

pub fn format_dmy(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}
