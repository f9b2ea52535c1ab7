use serde::{Deserialize, Serialize};

use crate::task::{Epoch, TaskIndex, TaskPhase};

pub type WorkerId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRequest {
    pub worker_id: WorkerId,
}

/// Reporte de un intento terminado.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionReport {
    pub worker_id: WorkerId,
    pub phase: TaskPhase,
    pub index: TaskIndex,
    pub epoch: Epoch,

    /// Map: R rutas (una por bucket, en orden). Reduce: la ruta del output final.
    pub output_manifest: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionStatus {
    Accepted,
    /// El intento fue reclamado (y quizás reasignado): su salida se descarta.
    Stale,
    /// La tarea ya estaba completada; el resultado final no cambia.
    AlreadyDone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub status: CompletionStatus,
}
