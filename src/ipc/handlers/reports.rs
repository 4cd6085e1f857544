use crate::cache::cache_key;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{as_of, metrics_options, optional_year, year_from_value};
use crate::ipc::types::{AppState, Request};
use crate::records::load_dataset;
use crate::reports;
use chrono::Datelike;
use serde_json::json;

#[derive(Clone, Copy)]
enum ReportKind {
    SingleYear(i32),
    Comparative(i32, i32),
}

fn parse_report_kind(req: &Request, default_year: i32) -> Result<ReportKind, serde_json::Value> {
    let report_type = req
        .params
        .get("reportType")
        .and_then(|v| v.as_str())
        .unwrap_or("singleYear")
        .trim();

    match report_type {
        "singleYear" => Ok(ReportKind::SingleYear(
            optional_year(req, "year")?.unwrap_or(default_year),
        )),
        "comparative" => {
            let years = match req.params.get("years") {
                None | Some(serde_json::Value::Null) => {
                    vec![default_year.saturating_sub(1), default_year]
                }
                Some(serde_json::Value::Array(items)) => {
                    let mut years = Vec::with_capacity(items.len());
                    for item in items {
                        match year_from_value(item) {
                            Some(y) => years.push(y),
                            None => {
                                return Err(err(
                                    &req.id,
                                    "bad_params",
                                    "years must contain years",
                                    Some(json!({ "value": item })),
                                ))
                            }
                        }
                    }
                    years
                }
                Some(other) => {
                    return Err(err(
                        &req.id,
                        "bad_params",
                        "years must be an array of two years",
                        Some(json!({ "value": other })),
                    ))
                }
            };
            match years.as_slice() {
                [a, b] => Ok(ReportKind::Comparative(*a, *b)),
                _ => Err(err(
                    &req.id,
                    "bad_params",
                    "years must be an array of two years",
                    None,
                )),
            }
        }
        other => match year_from_value(&json!(other)) {
            Some(y) => Ok(ReportKind::SingleYear(y)),
            None => Err(err(
                &req.id,
                "bad_params",
                format!("invalid report type: {}", other),
                None,
            )),
        },
    }
}

fn handle_reports_executive(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let as_of = match as_of(req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let kind = match parse_report_kind(req, as_of.year()) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let base = match metrics_options(conn, None, as_of) {
        Ok(o) => o,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let years = match kind {
        ReportKind::SingleYear(y) => vec![y],
        ReportKind::Comparative(a, b) => vec![a, b],
    };
    let key = cache_key(&req.method, &years, &as_of.format("%Y-%m-%d").to_string());
    if let Some(hit) = state.cache.get(&key) {
        return ok(&req.id, hit);
    }

    let data = match load_dataset(conn) {
        Ok(d) => d,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let body = match kind {
        ReportKind::SingleYear(y) => serde_json::to_value(reports::single_year(&data, y, &base)),
        ReportKind::Comparative(a, b) => {
            serde_json::to_value(reports::comparative(&data, a, b, &base))
        }
    };
    let body = match body {
        Ok(v) => v,
        Err(e) => return err(&req.id, "serialize_failed", e.to_string(), None),
    };

    state.cache.insert(key, body.clone());
    ok(&req.id, body)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.executive" => Some(handle_reports_executive(state, req)),
        _ => None,
    }
}
