use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "practicas.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS estudiantes(
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            legajo TEXT NOT NULL UNIQUE,
            nombre TEXT,
            correo TEXT,
            orientacion_elegida TEXT,
            estado TEXT,
            fecha_finalizacion TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_estudiantes_legajo ON estudiantes(legajo)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lanzamientos_pps(
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            nombre_pps TEXT,
            fecha_inicio TEXT,
            fecha_finalizacion TEXT,
            orientacion TEXT,
            cupos_disponibles INTEGER,
            estado_convocatoria TEXT,
            estado_gestion TEXT,
            fecha_relanzamiento TEXT,
            notas_gestion TEXT
        )",
        [],
    )?;
    ensure_lanzamientos_gestion_columns(&conn)?;

    // Link columns stay loose (no FOREIGN KEY): migrated rows may carry
    // array-shaped ids or point at records that no longer exist.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS convocatorias(
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            lanzamiento_id TEXT,
            estudiante_id TEXT,
            estado_inscripcion TEXT,
            nombre_pps TEXT,
            fecha_inicio TEXT,
            orientacion TEXT
        )",
        [],
    )?;
    ensure_convocatorias_snapshot_columns(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_convocatorias_estudiante ON convocatorias(estudiante_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_convocatorias_lanzamiento ON convocatorias(lanzamiento_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS practicas(
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            estudiante_id TEXT,
            lanzamiento_id TEXT,
            nombre_institucion TEXT,
            horas_realizadas REAL,
            fecha_inicio TEXT,
            fecha_finalizacion TEXT,
            estado TEXT,
            especialidad TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_practicas_estudiante ON practicas(estudiante_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS finalizacion_pps(
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            estudiante_id TEXT,
            fecha_solicitud TEXT,
            estado TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_finalizacion_estudiante ON finalizacion_pps(estudiante_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS instituciones(
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            nombre TEXT,
            convenio_nuevo TEXT,
            orientaciones TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS solicitudes_pps(
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            estudiante_id TEXT,
            nombre_alumno TEXT,
            legajo TEXT,
            nombre_institucion TEXT,
            estado_seguimiento TEXT,
            actualizacion TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_solicitudes_estado ON solicitudes_pps(estado_seguimiento)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_lanzamientos_gestion_columns(conn: &Connection) -> anyhow::Result<()> {
    // Workspaces created before the year-end reset existed lack these.
    if !table_has_column(conn, "lanzamientos_pps", "estado_gestion")? {
        conn.execute("ALTER TABLE lanzamientos_pps ADD COLUMN estado_gestion TEXT", [])?;
    }
    if !table_has_column(conn, "lanzamientos_pps", "fecha_relanzamiento")? {
        conn.execute(
            "ALTER TABLE lanzamientos_pps ADD COLUMN fecha_relanzamiento TEXT",
            [],
        )?;
    }
    if !table_has_column(conn, "lanzamientos_pps", "notas_gestion")? {
        conn.execute("ALTER TABLE lanzamientos_pps ADD COLUMN notas_gestion TEXT", [])?;
    }
    Ok(())
}

fn ensure_convocatorias_snapshot_columns(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "convocatorias", "nombre_pps")? {
        conn.execute("ALTER TABLE convocatorias ADD COLUMN nombre_pps TEXT", [])?;
    }
    if !table_has_column(conn, "convocatorias", "fecha_inicio")? {
        conn.execute("ALTER TABLE convocatorias ADD COLUMN fecha_inicio TEXT", [])?;
    }
    if !table_has_column(conn, "convocatorias", "orientacion")? {
        conn.execute("ALTER TABLE convocatorias ADD COLUMN orientacion TEXT", [])?;
    }
    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
