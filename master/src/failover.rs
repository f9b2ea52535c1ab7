use std::time::{Duration, SystemTime};

use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::state::AppState;

/// Loop de tolerancia a fallos: cada `interval` devuelve a la cola las
/// tareas cuyo worker no reportó antes del deadline.
///
/// Complementa el barrido que ya hace cada pedido de tarea; sirve para que
/// el snapshot refleje las reclamaciones aunque no haya workers pidiendo.
pub async fn run_failover_loop(state: AppState, interval: Duration) {
    loop {
        sleep(interval).await;

        match state.is_job_done() {
            Some(true) => {
                debug!("job terminado, cortando el failover loop");
                return;
            }
            Some(false) => {}
            None => {
                error!("lock del ledger envenenado, cortando el failover loop");
                return;
            }
        }

        if let Err(e) = sweep_once(&state) {
            warn!("error en failover sweep: {}", e);
        }
    }
}

/// Una pasada de chequeo. Retorna cuántas tareas se reclamaron.
pub fn sweep_once(state: &AppState) -> Result<usize, String> {
    let mut ledger = state.ledger.lock().map_err(|_| "lock ledger")?;
    let reclaimed = ledger.sweep_expired(SystemTime::now());
    if reclaimed > 0 {
        debug!("failover sweep: {} tareas reclamadas", reclaimed);
    }
    Ok(reclaimed)
}
