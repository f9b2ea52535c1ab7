// master/src/ledger.rs

use chrono::{DateTime, Utc};
use common::{
    Epoch, JobPhase, JobSnapshot, TaskIndex, TaskPhase, TaskSnapshot, TaskState, WorkerId,
};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("el job necesita al menos un bucket de reduce")]
    NoReduceBuckets,

    #[error("no existe la tarea {phase:?} #{index}")]
    UnknownTask { phase: TaskPhase, index: TaskIndex },

    #[error("manifest inválido para {phase:?} #{index}: se esperaban {expected} rutas, llegaron {got}")]
    BadManifest {
        phase: TaskPhase,
        index: TaskIndex,
        expected: usize,
        got: usize,
    },
}

/// Registro de una tarea dentro del ledger.
#[derive(Debug, Clone)]
pub struct Task {
    pub index: TaskIndex,
    pub phase: TaskPhase,
    pub state: TaskState,
    pub epoch: Epoch,
    // sólo válidos mientras state == InProgress
    pub assigned_worker: Option<WorkerId>,
    pub deadline: Option<SystemTime>,
    pub input_refs: Vec<String>,
    pub output_refs: Vec<String>,
}

impl Task {
    fn new(phase: TaskPhase, index: TaskIndex, input_refs: Vec<String>) -> Self {
        Self {
            index,
            phase,
            state: TaskState::Idle,
            epoch: 0,
            assigned_worker: None,
            deadline: None,
            input_refs,
            output_refs: Vec::new(),
        }
    }

    /// Idle -> InProgress. La epoch sube acá y sólo acá.
    pub(crate) fn start_attempt(&mut self, worker_id: &str, now: SystemTime, timeout: Duration) {
        debug_assert_eq!(self.state, TaskState::Idle);
        self.state = TaskState::InProgress;
        self.epoch += 1;
        self.assigned_worker = Some(worker_id.to_string());
        self.deadline = Some(now + timeout);
    }

    /// InProgress -> Idle por timeout. No toca la epoch: el próximo
    /// start_attempt la incrementa.
    pub(crate) fn reclaim(&mut self) {
        debug_assert_eq!(self.state, TaskState::InProgress);
        self.state = TaskState::Idle;
        self.assigned_worker = None;
        self.deadline = None;
    }

    /// InProgress -> Completed (terminal).
    pub(crate) fn complete(&mut self, output_refs: Vec<String>) {
        debug_assert_eq!(self.state, TaskState::InProgress);
        self.state = TaskState::Completed;
        self.assigned_worker = None;
        self.deadline = None;
        self.output_refs = output_refs;
    }

    pub(crate) fn is_expired(&self, now: SystemTime) -> bool {
        self.state == TaskState::InProgress && self.deadline.is_some_and(|d| now > d)
    }

    fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            phase: self.phase,
            index: self.index,
            state: self.state,
            epoch: self.epoch,
            assigned_worker: self.assigned_worker.clone(),
        }
    }
}

/// Registro autoritativo del job y de todas sus tareas.
///
/// No tiene locks propios: el dueño (ver `AppState`) lo guarda detrás de un
/// único Mutex y cada operación de lectura+escritura corre completa bajo ese lock.
#[derive(Debug)]
pub struct TaskLedger {
    pub(crate) num_reduce: u32,
    pub(crate) timeout: Duration,
    pub(crate) phase: JobPhase,
    pub(crate) map_tasks: Vec<Task>,
    pub(crate) reduce_tasks: Vec<Task>,
    pub(crate) map_remaining: u32,
    pub(crate) reduce_remaining: u32,

    // Métricas
    pub(crate) reassignments: u64,
    pub(crate) stale_reports: u64,
    pub(crate) submitted_at: DateTime<Utc>,
    pub(crate) finished_at: Option<DateTime<Utc>>,
}

impl TaskLedger {
    /// Crea el job: una tarea de map por split y `num_reduce` tareas de reduce.
    pub fn new(
        splits: Vec<String>,
        num_reduce: u32,
        timeout: Duration,
    ) -> Result<Self, LedgerError> {
        if num_reduce == 0 {
            return Err(LedgerError::NoReduceBuckets);
        }

        let map_tasks: Vec<Task> = splits
            .into_iter()
            .enumerate()
            .map(|(i, split)| Task::new(TaskPhase::Map, i as TaskIndex, vec![split]))
            .collect();

        // los inputs de cada reduce se van llenando a medida que completan los maps
        let reduce_tasks: Vec<Task> = (0..num_reduce)
            .map(|r| Task::new(TaskPhase::Reduce, r, Vec::new()))
            .collect();

        let map_remaining = map_tasks.len() as u32;

        // sin splits no hay nada que mapear: arrancamos directo en reduce
        let phase = if map_remaining == 0 {
            JobPhase::Reducing
        } else {
            JobPhase::Mapping
        };

        info!(
            "job creado: {} tareas de map, {} de reduce, timeout={:?}",
            map_remaining, num_reduce, timeout
        );

        Ok(Self {
            num_reduce,
            timeout,
            phase,
            map_tasks,
            reduce_tasks,
            map_remaining,
            reduce_remaining: num_reduce,
            reassignments: 0,
            stale_reports: 0,
            submitted_at: Utc::now(),
            finished_at: None,
        })
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn num_reduce(&self) -> u32 {
        self.num_reduce
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// IsJobDone
    pub fn is_done(&self) -> bool {
        self.phase == JobPhase::Done
    }

    pub fn map_remaining(&self) -> u32 {
        self.map_remaining
    }

    pub fn reduce_remaining(&self) -> u32 {
        self.reduce_remaining
    }

    pub fn tasks(&self, phase: TaskPhase) -> &[Task] {
        match phase {
            TaskPhase::Map => &self.map_tasks,
            TaskPhase::Reduce => &self.reduce_tasks,
        }
    }

    pub fn task(&self, phase: TaskPhase, index: TaskIndex) -> Option<&Task> {
        self.tasks(phase).get(index as usize)
    }

    pub(crate) fn tasks_mut(&mut self, phase: TaskPhase) -> &mut [Task] {
        match phase {
            TaskPhase::Map => &mut self.map_tasks,
            TaskPhase::Reduce => &mut self.reduce_tasks,
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            phase: self.phase,
            num_map_tasks: self.map_tasks.len() as u32,
            num_reduce_tasks: self.reduce_tasks.len() as u32,
            map_tasks_remaining: self.map_remaining,
            reduce_tasks_remaining: self.reduce_remaining,
            reassignments: self.reassignments,
            stale_reports: self.stale_reports,
            submitted_at: self.submitted_at,
            finished_at: self.finished_at,
            tasks: self
                .map_tasks
                .iter()
                .chain(self.reduce_tasks.iter())
                .map(Task::snapshot)
                .collect(),
        }
    }
}
