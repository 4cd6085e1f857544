use crate::cache::cache_key;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{as_of, metrics_options, optional_year};
use crate::ipc::types::{AppState, Request};
use crate::metrics::compute_dashboard;
use crate::records::load_dataset;
use serde_json::json;
use std::time::Instant;

fn handle_metrics_dashboard(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let as_of = match as_of(req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let year = match optional_year(req, "year") {
        Ok(y) => y,
        Err(resp) => return resp,
    };
    let opts = match metrics_options(conn, year, as_of) {
        Ok(o) => o,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let key = cache_key(
        &req.method,
        &[opts.target_year],
        &as_of.format("%Y-%m-%d").to_string(),
    );
    if let Some(hit) = state.cache.get(&key) {
        return ok(&req.id, hit);
    }

    let started = Instant::now();
    let data = match load_dataset(conn) {
        Ok(d) => d,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let metrics = compute_dashboard(&data, &opts);
    let body = match serde_json::to_value(&metrics) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "serialize_failed", e.to_string(), None),
    };
    tracing::debug!(
        year = opts.target_year,
        students = data.students.len(),
        convocatorias = data.convocatorias.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "dashboard metrics computed"
    );

    state.cache.insert(key, body.clone());
    ok(&req.id, body)
}

fn handle_cache_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!(state.cache.stats()))
}

fn handle_cache_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let cleared = state.cache.invalidate_all();
    ok(&req.id, json!({ "cleared": cleared }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "metrics.dashboard" => Some(handle_metrics_dashboard(state, req)),
        "cache.stats" => Some(handle_cache_stats(state, req)),
        "cache.clear" => Some(handle_cache_clear(state, req)),
        _ => None,
    }
}
