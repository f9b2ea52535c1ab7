// master/src/state.rs

use axum::http::StatusCode;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::error;

use crate::ledger::TaskLedger;

/// Estado compartido por todos los handlers.
///
/// Un único Mutex cubre el ledger entero: cada pedido de tarea y cada reporte
/// hace su búsqueda y su mutación bajo el mismo lock, sin I/O adentro.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Mutex<TaskLedger>>,
}

impl AppState {
    pub fn new(ledger: TaskLedger) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
        }
    }

    /// Lock del ledger para un handler HTTP; un lock envenenado es un 500.
    pub fn lock_ledger(&self) -> Result<MutexGuard<'_, TaskLedger>, StatusCode> {
        self.ledger.lock().map_err(|_| {
            error!("lock del ledger envenenado");
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }

    /// IsJobDone. `None` si el lock quedó envenenado: el ledger ya no es
    /// confiable y el master tiene que cortar.
    pub fn is_job_done(&self) -> Option<bool> {
        self.ledger.lock().ok().map(|l| l.is_done())
    }
}
