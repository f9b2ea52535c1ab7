use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{Epoch, TaskIndex, TaskPhase, TaskState};
use crate::worker::WorkerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPhase {
    Mapping,
    Reducing,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDoneResponse {
    pub done: bool,
}

/// Foto del estado del job, para el CLI y para debug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub phase: JobPhase,
    pub num_map_tasks: u32,
    pub num_reduce_tasks: u32,
    pub map_tasks_remaining: u32,
    pub reduce_tasks_remaining: u32,

    /// -------- Métricas del job --------
    /// tareas reclamadas por timeout
    pub reassignments: u64,
    /// reportes rechazados por epoch vieja
    pub stale_reports: u64,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    pub tasks: Vec<TaskSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub phase: TaskPhase,
    pub index: TaskIndex,
    pub state: TaskState,
    pub epoch: Epoch,
    pub assigned_worker: Option<WorkerId>,
}
