use crate::cycle;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_cycle_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match cycle::reset_cycle(conn) {
        Ok(summary) => {
            state.data_changed();
            tracing::info!(
                archived_requests = summary.archived_requests,
                reset_launches = summary.reset_launches,
                "cycle reset"
            );
            ok(&req.id, json!(summary))
        }
        Err(e) => err(&req.id, "db_tx_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "cycle.reset" => Some(handle_cycle_reset(state, req)),
        _ => None,
    }
}
