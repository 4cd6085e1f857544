use crate::ipc::error::{err, ok, repo_err};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use crate::repo::{self, TableDef};
use serde_json::json;

#[derive(Clone, Copy)]
enum Op {
    List,
    Get,
    Create,
    Update,
    Delete,
}

/// `<entity>.<op>` for every table the repository knows.
fn parse_method(method: &str) -> Option<(&'static TableDef, Op)> {
    let (entity, op) = method.split_once('.')?;
    let def = repo::table_for_entity(entity)?;
    let op = match op {
        "list" => Op::List,
        "get" => Op::Get,
        "create" => Op::Create,
        "update" => Op::Update,
        "delete" => Op::Delete,
        _ => return None,
    };
    Some((def, op))
}

fn handle_table_op(
    state: &mut AppState,
    req: &Request,
    def: &TableDef,
    op: Op,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    match op {
        Op::List => {
            let query = match repo::parse_list_query(def, &req.params) {
                Ok(q) => q,
                Err(e) => return repo_err(&req.id, e),
            };
            match repo::list(conn, def, &query) {
                Ok(page) => ok(&req.id, json!(page)),
                Err(e) => repo_err(&req.id, e),
            }
        }
        Op::Get => {
            let id = match required_str(req, "id") {
                Ok(v) => v,
                Err(resp) => return resp,
            };
            match repo::get(conn, def, &id) {
                Ok(row) => ok(&req.id, json!({ "row": row })),
                Err(e) => repo_err(&req.id, e),
            }
        }
        Op::Create => {
            let Some(values) = req.params.get("values") else {
                return err(&req.id, "bad_params", "missing values", None);
            };
            match repo::create(conn, def, values) {
                Ok(row) => {
                    state.data_changed();
                    ok(&req.id, json!({ "row": row }))
                }
                Err(e) => repo_err(&req.id, e),
            }
        }
        Op::Update => {
            let id = match required_str(req, "id") {
                Ok(v) => v,
                Err(resp) => return resp,
            };
            let Some(patch) = req.params.get("patch") else {
                return err(&req.id, "bad_params", "missing patch", None);
            };
            match repo::update(conn, def, &id, patch) {
                Ok(row) => {
                    state.data_changed();
                    ok(&req.id, json!({ "row": row }))
                }
                Err(e) => repo_err(&req.id, e),
            }
        }
        Op::Delete => {
            let id = match required_str(req, "id") {
                Ok(v) => v,
                Err(resp) => return resp,
            };
            match repo::delete(conn, def, &id) {
                Ok(()) => {
                    state.data_changed();
                    ok(&req.id, json!({ "ok": true, "id": id }))
                }
                Err(e) => repo_err(&req.id, e),
            }
        }
    }
}

fn handle_students_find_by_legajo(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let legajo = match required_str(req, "legajo") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match repo::find_student_by_legajo(conn, &legajo) {
        Ok(row) => ok(&req.id, json!({ "row": row })),
        Err(e) => repo_err(&req.id, e),
    }
}

/// Legajo-based login lookup: the student id and the email the identity
/// provider signs in with.
fn handle_auth_resolve_legajo(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let legajo = match required_str(req, "legajo") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let row = match repo::find_student_by_legajo(conn, &legajo) {
        Ok(Some(row)) => row,
        Ok(None) => {
            return err(
                &req.id,
                "not_found",
                "legajo not registered",
                Some(json!({ "legajo": legajo })),
            )
        }
        Err(e) => return repo_err(&req.id, e),
    };
    let correo = row
        .get("correo")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty());
    let Some(correo) = correo else {
        return err(
            &req.id,
            "no_email",
            "student has no email on file",
            Some(json!({ "legajo": legajo })),
        );
    };
    ok(
        &req.id,
        json!({
            "studentId": row.get("id").cloned().unwrap_or(serde_json::Value::Null),
            "legajo": legajo,
            "correo": correo,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.findByLegajo" => return Some(handle_students_find_by_legajo(state, req)),
        "auth.resolveLegajo" => return Some(handle_auth_resolve_legajo(state, req)),
        _ => {}
    }
    let (def, op) = parse_method(&req.method)?;
    Some(handle_table_op(state, req, def, op))
}
