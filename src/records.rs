use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Student {
    pub id: String,
    pub created_at: Option<String>,
    pub legajo: String,
    pub nombre: Option<String>,
    pub correo: Option<String>,
    pub orientacion_elegida: Option<String>,
    pub estado: Option<String>,
    pub fecha_finalizacion: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Practice {
    pub id: String,
    pub created_at: Option<String>,
    pub estudiante_id: Option<String>,
    pub lanzamiento_id: Option<String>,
    pub nombre_institucion: Option<String>,
    pub horas_realizadas: Option<f64>,
    pub fecha_inicio: Option<String>,
    pub fecha_finalizacion: Option<String>,
    pub estado: Option<String>,
    pub especialidad: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Launch {
    pub id: String,
    pub created_at: Option<String>,
    pub nombre_pps: Option<String>,
    pub fecha_inicio: Option<String>,
    pub fecha_finalizacion: Option<String>,
    pub orientacion: Option<String>,
    pub cupos_disponibles: Option<i64>,
    pub estado_convocatoria: Option<String>,
    pub estado_gestion: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Convocatoria {
    pub id: String,
    pub created_at: Option<String>,
    pub lanzamiento_id: Option<String>,
    pub estudiante_id: Option<String>,
    pub estado_inscripcion: Option<String>,
    pub nombre_pps: Option<String>,
    pub fecha_inicio: Option<String>,
    pub orientacion: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FinalizationRequest {
    pub id: String,
    pub created_at: Option<String>,
    pub estudiante_id: Option<String>,
    pub fecha_solicitud: Option<String>,
    pub estado: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Institution {
    pub id: String,
    pub created_at: Option<String>,
    pub nombre: Option<String>,
    pub convenio_nuevo: Option<String>,
    pub orientaciones: Option<String>,
}

/// Self-managed PPS request (autogestión).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PpsRequest {
    pub id: String,
    pub created_at: Option<String>,
    pub estudiante_id: Option<String>,
    pub nombre_alumno: Option<String>,
    pub legajo: Option<String>,
    pub nombre_institucion: Option<String>,
    pub estado_seguimiento: Option<String>,
    pub actualizacion: Option<String>,
}

/// Everything the aggregations read, fetched in one pass.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub students: Vec<Student>,
    pub practices: Vec<Practice>,
    pub launches: Vec<Launch>,
    pub convocatorias: Vec<Convocatoria>,
    pub finalizations: Vec<FinalizationRequest>,
    pub institutions: Vec<Institution>,
    pub requests: Vec<PpsRequest>,
}

pub fn load_dataset(conn: &Connection) -> rusqlite::Result<Dataset> {
    Ok(Dataset {
        students: load_rows(
            conn,
            "SELECT id, created_at, legajo, nombre, correo, orientacion_elegida, estado, fecha_finalizacion
             FROM estudiantes ORDER BY rowid",
            |r| {
                Ok(Student {
                    id: r.get(0)?,
                    created_at: r.get(1)?,
                    legajo: r.get(2)?,
                    nombre: r.get(3)?,
                    correo: r.get(4)?,
                    orientacion_elegida: r.get(5)?,
                    estado: r.get(6)?,
                    fecha_finalizacion: r.get(7)?,
                })
            },
        )?,
        practices: load_rows(
            conn,
            "SELECT id, created_at, estudiante_id, lanzamiento_id, nombre_institucion, horas_realizadas,
                    fecha_inicio, fecha_finalizacion, estado, especialidad
             FROM practicas ORDER BY rowid",
            |r| {
                Ok(Practice {
                    id: r.get(0)?,
                    created_at: r.get(1)?,
                    estudiante_id: r.get(2)?,
                    lanzamiento_id: r.get(3)?,
                    nombre_institucion: r.get(4)?,
                    horas_realizadas: r.get(5)?,
                    fecha_inicio: r.get(6)?,
                    fecha_finalizacion: r.get(7)?,
                    estado: r.get(8)?,
                    especialidad: r.get(9)?,
                })
            },
        )?,
        launches: load_rows(
            conn,
            "SELECT id, created_at, nombre_pps, fecha_inicio, fecha_finalizacion, orientacion,
                    cupos_disponibles, estado_convocatoria, estado_gestion
             FROM lanzamientos_pps ORDER BY rowid",
            |r| {
                Ok(Launch {
                    id: r.get(0)?,
                    created_at: r.get(1)?,
                    nombre_pps: r.get(2)?,
                    fecha_inicio: r.get(3)?,
                    fecha_finalizacion: r.get(4)?,
                    orientacion: r.get(5)?,
                    cupos_disponibles: r.get(6)?,
                    estado_convocatoria: r.get(7)?,
                    estado_gestion: r.get(8)?,
                })
            },
        )?,
        convocatorias: load_rows(
            conn,
            "SELECT id, created_at, lanzamiento_id, estudiante_id, estado_inscripcion, nombre_pps,
                    fecha_inicio, orientacion
             FROM convocatorias ORDER BY rowid",
            |r| {
                Ok(Convocatoria {
                    id: r.get(0)?,
                    created_at: r.get(1)?,
                    lanzamiento_id: r.get(2)?,
                    estudiante_id: r.get(3)?,
                    estado_inscripcion: r.get(4)?,
                    nombre_pps: r.get(5)?,
                    fecha_inicio: r.get(6)?,
                    orientacion: r.get(7)?,
                })
            },
        )?,
        finalizations: load_rows(
            conn,
            "SELECT id, created_at, estudiante_id, fecha_solicitud, estado
             FROM finalizacion_pps ORDER BY rowid",
            |r| {
                Ok(FinalizationRequest {
                    id: r.get(0)?,
                    created_at: r.get(1)?,
                    estudiante_id: r.get(2)?,
                    fecha_solicitud: r.get(3)?,
                    estado: r.get(4)?,
                })
            },
        )?,
        institutions: load_rows(
            conn,
            "SELECT id, created_at, nombre, convenio_nuevo, orientaciones
             FROM instituciones ORDER BY rowid",
            |r| {
                Ok(Institution {
                    id: r.get(0)?,
                    created_at: r.get(1)?,
                    nombre: r.get(2)?,
                    convenio_nuevo: r.get(3)?,
                    orientaciones: r.get(4)?,
                })
            },
        )?,
        requests: load_rows(
            conn,
            "SELECT id, created_at, estudiante_id, nombre_alumno, legajo, nombre_institucion,
                    estado_seguimiento, actualizacion
             FROM solicitudes_pps ORDER BY rowid",
            |r| {
                Ok(PpsRequest {
                    id: r.get(0)?,
                    created_at: r.get(1)?,
                    estudiante_id: r.get(2)?,
                    nombre_alumno: r.get(3)?,
                    legajo: r.get(4)?,
                    nombre_institucion: r.get(5)?,
                    estado_seguimiento: r.get(6)?,
                    actualizacion: r.get(7)?,
                })
            },
        )?,
    })
}

fn load_rows<T, F>(conn: &Connection, sql: &str, map: F) -> rusqlite::Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], map)?;
    rows.collect()
}
