use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode, OptionalExtension};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::normalize::for_comparison;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub struct RepoError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl RepoError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn db(code: &str, table: &str, e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref f, _) = e {
            if f.code == ErrorCode::ConstraintViolation {
                return RepoError::new("conflict", e.to_string())
                    .with_details(json!({ "table": table }));
            }
        }
        RepoError::new(code, e.to_string()).with_details(json!({ "table": table }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
}

#[derive(Debug)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn text(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Text,
    }
}

/// Shape of one store table as seen by the generic table client.
/// `id` and `created_at` are implicit on every table.
#[derive(Debug)]
pub struct TableDef {
    pub entity: &'static str,
    pub table: &'static str,
    pub columns: &'static [Column],
    pub required: &'static [&'static str],
    pub search: &'static [&'static str],
    pub default_sort: &'static str,
}

impl TableDef {
    fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn is_sortable(&self, name: &str) -> bool {
        name == "id" || name == "created_at" || self.column(name).is_some()
    }

    fn select_list(&self) -> String {
        let mut cols = vec!["id", "created_at"];
        cols.extend(self.columns.iter().map(|c| c.name));
        cols.join(", ")
    }
}

pub const STUDENTS: TableDef = TableDef {
    entity: "students",
    table: "estudiantes",
    columns: &[
        text("legajo"),
        text("nombre"),
        text("correo"),
        text("orientacion_elegida"),
        text("estado"),
        text("fecha_finalizacion"),
    ],
    required: &["legajo"],
    search: &["legajo", "nombre", "correo"],
    default_sort: "nombre",
};

pub const LAUNCHES: TableDef = TableDef {
    entity: "launches",
    table: "lanzamientos_pps",
    columns: &[
        text("nombre_pps"),
        text("fecha_inicio"),
        text("fecha_finalizacion"),
        text("orientacion"),
        Column {
            name: "cupos_disponibles",
            kind: ColumnKind::Integer,
        },
        text("estado_convocatoria"),
        text("estado_gestion"),
        text("fecha_relanzamiento"),
        text("notas_gestion"),
    ],
    required: &["nombre_pps"],
    search: &["nombre_pps", "orientacion"],
    default_sort: "fecha_inicio",
};

pub const CONVOCATORIAS: TableDef = TableDef {
    entity: "convocatorias",
    table: "convocatorias",
    columns: &[
        text("lanzamiento_id"),
        text("estudiante_id"),
        text("estado_inscripcion"),
        text("nombre_pps"),
        text("fecha_inicio"),
        text("orientacion"),
    ],
    required: &[],
    search: &["nombre_pps", "estado_inscripcion"],
    default_sort: "created_at",
};

pub const PRACTICES: TableDef = TableDef {
    entity: "practices",
    table: "practicas",
    columns: &[
        text("estudiante_id"),
        text("lanzamiento_id"),
        text("nombre_institucion"),
        Column {
            name: "horas_realizadas",
            kind: ColumnKind::Real,
        },
        text("fecha_inicio"),
        text("fecha_finalizacion"),
        text("estado"),
        text("especialidad"),
    ],
    required: &[],
    search: &["nombre_institucion", "especialidad", "estado"],
    default_sort: "fecha_inicio",
};

pub const FINALIZATIONS: TableDef = TableDef {
    entity: "finalizations",
    table: "finalizacion_pps",
    columns: &[text("estudiante_id"), text("fecha_solicitud"), text("estado")],
    required: &["estudiante_id"],
    search: &["estado"],
    default_sort: "fecha_solicitud",
};

pub const INSTITUTIONS: TableDef = TableDef {
    entity: "institutions",
    table: "instituciones",
    columns: &[text("nombre"), text("convenio_nuevo"), text("orientaciones")],
    required: &["nombre"],
    search: &["nombre", "orientaciones"],
    default_sort: "nombre",
};

pub const REQUESTS: TableDef = TableDef {
    entity: "requests",
    table: "solicitudes_pps",
    columns: &[
        text("estudiante_id"),
        text("nombre_alumno"),
        text("legajo"),
        text("nombre_institucion"),
        text("estado_seguimiento"),
        text("actualizacion"),
    ],
    required: &[],
    search: &["nombre_alumno", "legajo", "nombre_institucion"],
    default_sort: "created_at",
};

pub const TABLES: &[&TableDef] = &[
    &STUDENTS,
    &LAUNCHES,
    &CONVOCATORIAS,
    &PRACTICES,
    &FINALIZATIONS,
    &INSTITUTIONS,
    &REQUESTS,
];

pub fn table_for_entity(entity: &str) -> Option<&'static TableDef> {
    TABLES.iter().copied().find(|t| t.entity == entity)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub page: usize,
    pub page_size: usize,
    pub filters: Vec<(String, serde_json::Value)>,
    pub search: Option<String>,
    pub sort_by: String,
    pub sort_desc: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub rows: Vec<serde_json::Value>,
    pub total: i64,
    pub page: usize,
    pub page_size: usize,
}

pub fn parse_list_query(def: &TableDef, params: &serde_json::Value) -> Result<ListQuery, RepoError> {
    let page = match params.get("page") {
        None | Some(serde_json::Value::Null) => 1,
        Some(v) => match v.as_u64() {
            Some(n) if n >= 1 => usize::try_from(n).map_err(|_| page_out_of_range(v))?,
            _ => return Err(RepoError::new("bad_params", "page must be an integer >= 1")),
        },
    };
    let page_size = match params.get("pageSize") {
        None | Some(serde_json::Value::Null) => DEFAULT_PAGE_SIZE,
        Some(v) => match v.as_u64() {
            Some(n) if n >= 1 && n as usize <= MAX_PAGE_SIZE => n as usize,
            _ => {
                return Err(RepoError::new(
                    "bad_params",
                    format!("pageSize must be between 1 and {}", MAX_PAGE_SIZE),
                ))
            }
        },
    };
    page_offset(page, page_size)?;

    let mut filters = Vec::new();
    match params.get("filters") {
        None | Some(serde_json::Value::Null) => {}
        Some(serde_json::Value::Object(map)) => {
            for (k, v) in map {
                if !def.is_sortable(k) {
                    return Err(unknown_column(def, k));
                }
                if v.is_object() || v.is_array() {
                    return Err(RepoError::new(
                        "bad_params",
                        format!("filter {} must be a scalar or null", k),
                    ));
                }
                filters.push((k.clone(), v.clone()));
            }
        }
        Some(_) => return Err(RepoError::new("bad_params", "filters must be an object")),
    }

    let search = match params.get("search") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        Some(_) => return Err(RepoError::new("bad_params", "search must be string or null")),
    };

    let sort_by = match params.get("sortBy").and_then(|v| v.as_str()) {
        Some(s) if def.is_sortable(s) => s.to_string(),
        Some(s) => return Err(unknown_column(def, s)),
        None => def.default_sort.to_string(),
    };
    let sort_desc = match params.get("sortDir").and_then(|v| v.as_str()) {
        None | Some("asc") => false,
        Some("desc") => true,
        Some(other) => {
            return Err(RepoError::new("bad_params", "sortDir must be one of: asc, desc")
                .with_details(json!({ "sortDir": other })))
        }
    };

    Ok(ListQuery {
        page,
        page_size,
        filters,
        search,
        sort_by,
        sort_desc,
    })
}

fn page_out_of_range(v: &serde_json::Value) -> RepoError {
    RepoError::new("bad_params", "page is out of range").with_details(json!({ "page": v }))
}

/// Row offset of `page`, or `bad_params` when it does not fit an SQLite
/// integer.
fn page_offset(page: usize, page_size: usize) -> Result<i64, RepoError> {
    page.checked_sub(1)
        .and_then(|p| p.checked_mul(page_size))
        .and_then(|o| i64::try_from(o).ok())
        .ok_or_else(|| page_out_of_range(&json!(page)))
}

fn matches_search(def: &TableDef, row: &serde_json::Value, needle: &str) -> bool {
    def.search.iter().any(|c| {
        row.get(*c)
            .and_then(|v| v.as_str())
            .map(|text| for_comparison(text).contains(needle))
            .unwrap_or(false)
    })
}

pub fn list(conn: &Connection, def: &TableDef, query: &ListQuery) -> Result<Page, RepoError> {
    let offset = page_offset(query.page, query.page_size)?;
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    for (col, v) in &query.filters {
        if v.is_null() {
            clauses.push(format!("{} IS NULL", col));
        } else {
            clauses.push(format!("{} = ?", col));
            values.push(to_sql_value(def, col, v)?);
        }
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    let select_sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} {}, id",
        def.select_list(),
        def.table,
        where_sql,
        query.sort_by,
        if query.sort_desc { "DESC" } else { "ASC" }
    );

    // Search is accent and case insensitive, so it runs over the filtered
    // rows here instead of as a LIKE in SQL.
    let needle = query
        .search
        .as_deref()
        .map(for_comparison)
        .filter(|n| !n.is_empty());
    if let Some(needle) = needle {
        let matched: Vec<serde_json::Value> = query_rows(conn, def, &select_sql, &values)?
            .into_iter()
            .filter(|row| matches_search(def, row, &needle))
            .collect();
        let total = i64::try_from(matched.len()).unwrap_or(i64::MAX);
        let rows = matched
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(query.page_size)
            .collect();
        return Ok(Page {
            rows,
            total,
            page: query.page,
            page_size: query.page_size,
        });
    }

    let total: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM {}{}", def.table, where_sql),
            params_from_iter(values.iter()),
            |r| r.get(0),
        )
        .map_err(|e| RepoError::db("db_query_failed", def.table, e))?;

    let sql = format!("{} LIMIT ? OFFSET ?", select_sql);
    values.push(Value::Integer(i64::try_from(query.page_size).unwrap_or(i64::MAX)));
    values.push(Value::Integer(offset));
    let rows = query_rows(conn, def, &sql, &values)?;

    Ok(Page {
        rows,
        total,
        page: query.page,
        page_size: query.page_size,
    })
}

fn query_rows(
    conn: &Connection,
    def: &TableDef,
    sql: &str,
    values: &[Value],
) -> Result<Vec<serde_json::Value>, RepoError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| RepoError::db("db_query_failed", def.table, e))?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), |r| row_to_json(def, r))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| RepoError::db("db_query_failed", def.table, e))?;
    Ok(rows)
}

pub fn get(conn: &Connection, def: &TableDef, id: &str) -> Result<serde_json::Value, RepoError> {
    let sql = format!("SELECT {} FROM {} WHERE id = ?", def.select_list(), def.table);
    conn.query_row(&sql, [id], |r| row_to_json(def, r))
        .optional()
        .map_err(|e| RepoError::db("db_query_failed", def.table, e))?
        .ok_or_else(|| {
            RepoError::new("not_found", format!("{} not found", def.entity))
                .with_details(json!({ "id": id }))
        })
}

pub fn create(
    conn: &Connection,
    def: &TableDef,
    values: &serde_json::Value,
) -> Result<serde_json::Value, RepoError> {
    let Some(map) = values.as_object() else {
        return Err(RepoError::new("bad_params", "values must be an object"));
    };
    for req in def.required {
        let present = map
            .get(*req)
            .map(|v| match v {
                serde_json::Value::Null => false,
                serde_json::Value::String(s) => !s.trim().is_empty(),
                _ => true,
            })
            .unwrap_or(false);
        if !present {
            return Err(RepoError::new("bad_params", format!("missing {}", req)));
        }
    }

    let id = Uuid::new_v4().to_string();
    let created_at = match map.get("created_at").and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => chrono::Utc::now().to_rfc3339(),
    };

    let mut cols = vec!["id".to_string(), "created_at".to_string()];
    let mut vals = vec![Value::Text(id.clone()), Value::Text(created_at)];
    for (k, v) in map {
        if k == "id" || k == "created_at" {
            continue;
        }
        if def.column(k).is_none() {
            return Err(unknown_column(def, k));
        }
        cols.push(k.clone());
        vals.push(to_sql_value(def, k, v)?);
    }

    let placeholders = std::iter::repeat("?")
        .take(cols.len())
        .collect::<Vec<_>>()
        .join(",");
    let sql = format!(
        "INSERT INTO {}({}) VALUES({})",
        def.table,
        cols.join(", "),
        placeholders
    );
    conn.execute(&sql, params_from_iter(vals.iter()))
        .map_err(|e| RepoError::db("db_insert_failed", def.table, e))?;

    get(conn, def, &id)
}

pub fn update(
    conn: &Connection,
    def: &TableDef,
    id: &str,
    patch: &serde_json::Value,
) -> Result<serde_json::Value, RepoError> {
    let Some(map) = patch.as_object() else {
        return Err(RepoError::new("bad_params", "patch must be an object"));
    };
    let mut sets = Vec::new();
    let mut vals = Vec::new();
    for (k, v) in map {
        if k == "id" || k == "created_at" {
            return Err(RepoError::new("bad_params", format!("{} is read-only", k)));
        }
        if def.column(k).is_none() {
            return Err(unknown_column(def, k));
        }
        if def.required.contains(&k.as_str()) && v.as_str().map(|s| s.trim().is_empty()).unwrap_or(v.is_null()) {
            return Err(RepoError::new("bad_params", format!("{} must not be empty", k)));
        }
        sets.push(format!("{} = ?", k));
        vals.push(to_sql_value(def, k, v)?);
    }
    if sets.is_empty() {
        return Err(RepoError::new("bad_params", "patch must not be empty"));
    }
    vals.push(Value::Text(id.to_string()));

    let sql = format!("UPDATE {} SET {} WHERE id = ?", def.table, sets.join(", "));
    let changed = conn
        .execute(&sql, params_from_iter(vals.iter()))
        .map_err(|e| RepoError::db("db_update_failed", def.table, e))?;
    if changed == 0 {
        return Err(RepoError::new("not_found", format!("{} not found", def.entity))
            .with_details(json!({ "id": id })));
    }
    get(conn, def, id)
}

/// Linked rows in other tables are left in place; the aggregations treat
/// dangling links as orphans.
pub fn delete(conn: &Connection, def: &TableDef, id: &str) -> Result<(), RepoError> {
    let changed = conn
        .execute(&format!("DELETE FROM {} WHERE id = ?", def.table), [id])
        .map_err(|e| RepoError::db("db_delete_failed", def.table, e))?;
    if changed == 0 {
        return Err(RepoError::new("not_found", format!("{} not found", def.entity))
            .with_details(json!({ "id": id })));
    }
    Ok(())
}

pub fn find_student_by_legajo(
    conn: &Connection,
    legajo: &str,
) -> Result<Option<serde_json::Value>, RepoError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE legajo = ?",
        STUDENTS.select_list(),
        STUDENTS.table
    );
    conn.query_row(&sql, [legajo.trim()], |r| row_to_json(&STUDENTS, r))
        .optional()
        .map_err(|e| RepoError::db("db_query_failed", STUDENTS.table, e))
}

fn unknown_column(def: &TableDef, name: &str) -> RepoError {
    RepoError::new("bad_params", format!("unknown column: {}", name))
        .with_details(json!({ "table": def.table, "column": name }))
}

fn to_sql_value(def: &TableDef, col: &str, v: &serde_json::Value) -> Result<Value, RepoError> {
    let kind = match col {
        "id" | "created_at" => ColumnKind::Text,
        _ => def
            .column(col)
            .map(|c| c.kind)
            .ok_or_else(|| unknown_column(def, col))?,
    };
    let bad = || {
        RepoError::new("bad_params", format!("invalid value for {}", col))
            .with_details(json!({ "column": col, "value": v }))
    };
    Ok(match (kind, v) {
        (_, serde_json::Value::Null) => Value::Null,
        (ColumnKind::Text, serde_json::Value::String(s)) => Value::Text(s.clone()),
        (ColumnKind::Text, serde_json::Value::Number(n)) => Value::Text(n.to_string()),
        (ColumnKind::Text, serde_json::Value::Bool(b)) => Value::Text(b.to_string()),
        // Link columns migrated from the hosted store arrive as arrays.
        (ColumnKind::Text, serde_json::Value::Array(_)) => Value::Text(v.to_string()),
        (ColumnKind::Integer, serde_json::Value::Number(n)) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Integer(n.as_f64().ok_or_else(bad)?.round() as i64),
        },
        (ColumnKind::Integer, serde_json::Value::String(s)) => {
            Value::Integer(s.trim().parse::<i64>().map_err(|_| bad())?)
        }
        (ColumnKind::Real, serde_json::Value::Number(n)) => Value::Real(n.as_f64().ok_or_else(bad)?),
        (ColumnKind::Real, serde_json::Value::String(s)) => {
            Value::Real(s.trim().parse::<f64>().map_err(|_| bad())?)
        }
        _ => return Err(bad()),
    })
}

fn row_to_json(def: &TableDef, r: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    let mut out = serde_json::Map::new();
    let names = ["id", "created_at"]
        .into_iter()
        .chain(def.columns.iter().map(|c| c.name));
    for (i, name) in names.enumerate() {
        let v = match r.get_ref(i)? {
            ValueRef::Null => serde_json::Value::Null,
            ValueRef::Integer(n) => json!(n),
            ValueRef::Real(f) => json!(f),
            ValueRef::Text(t) => json!(String::from_utf8_lossy(t)),
            ValueRef::Blob(_) => serde_json::Value::Null,
        };
        out.insert(name.to_string(), v);
    }
    Ok(serde_json::Value::Object(out))
}
