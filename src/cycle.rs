use rusqlite::Connection;
use serde::Serialize;

pub const ARCHIVED_REQUEST_STATUS: &str = "Archivado";
pub const PENDING_MANAGEMENT_STATUS: &str = "Pendiente de Gestión";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResetSummary {
    pub archived_requests: usize,
    pub reset_launches: usize,
}

/// Year-end reset: every request not yet archived is archived, and every
/// launch's management state goes back to pending with its relaunch date
/// and notes cleared. Both updates commit together or not at all.
pub fn reset_cycle(conn: &Connection) -> rusqlite::Result<ResetSummary> {
    let tx = conn.unchecked_transaction()?;
    let archived_requests = tx.execute(
        "UPDATE solicitudes_pps
         SET estado_seguimiento = ?1
         WHERE estado_seguimiento IS NOT ?1",
        [ARCHIVED_REQUEST_STATUS],
    )?;
    let reset_launches = tx.execute(
        "UPDATE lanzamientos_pps
         SET estado_gestion = ?1, fecha_relanzamiento = NULL, notas_gestion = NULL
         WHERE estado_gestion IS NOT ?1",
        [PENDING_MANAGEMENT_STATUS],
    )?;
    tx.commit()?;
    Ok(ResetSummary {
        archived_requests,
        reset_launches,
    })
}
