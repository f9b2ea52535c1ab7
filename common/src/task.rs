use serde::{Deserialize, Serialize};

/// Índice denso de una tarea dentro de su fase (0..M-1 o 0..R-1).
pub type TaskIndex = u32;

/// Contador de intentos: sube cada vez que una tarea pasa de Idle a InProgress.
pub type Epoch = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPhase {
    Map,
    Reduce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Idle,
    InProgress,
    Completed,
}

/// Lo que el worker necesita para ejecutar un intento concreto de una tarea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub phase: TaskPhase,
    pub index: TaskIndex,
    pub epoch: Epoch,

    /// Map: un único split de entrada.
    /// Reduce: un archivo intermedio por cada map completado.
    pub input_refs: Vec<String>,

    /// Cantidad de buckets de reduce (R) del job
    pub num_reduce: u32,
}

/// Respuesta del master a un pedido de trabajo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Assignment {
    MapWork(TaskDescriptor),
    ReduceWork(TaskDescriptor),
    /// Todo el trabajo pendiente está en vuelo; reintentar en un rato.
    Wait,
    /// El job terminó: el worker puede salir.
    AllDone,
}
