use anyhow::{bail, Context, Result};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use master::{failover, handlers, AppState, MasterConfig, TaskLedger};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("master=debug,tower_http=info")),
        )
        .init();

    let cfg = MasterConfig::from_env()?;
    let inputs = cfg.resolve_inputs()?;
    info!(
        "{} splits de entrada para {} (R={})",
        inputs.len(),
        cfg.input_glob,
        cfg.num_reduce
    );

    let ledger = TaskLedger::new(inputs, cfg.num_reduce, cfg.task_timeout)?;
    let state = AppState::new(ledger);

    // failover en segundo plano
    tokio::spawn(failover::run_failover_loop(
        state.clone(),
        cfg.sweep_interval,
    ));

    let app = handlers::build_router(state.clone());
    let state_after = state.clone();

    let listener = TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("no se pudo escuchar en {}", cfg.bind_addr))?;
    info!("master escuchando en {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_job_done(state, cfg.shutdown_grace))
        .await?;

    if state_after.is_job_done() != Some(true) {
        bail!("el ledger quedó inconsistente (lock envenenado), master saliendo");
    }

    info!("job terminado, master saliendo");
    Ok(())
}

/// Sondea IsJobDone; cuando da true espera `grace` y deja que el server corte.
/// Con el lock envenenado corta enseguida.
async fn wait_for_job_done(state: AppState, grace: Duration) {
    loop {
        match state.is_job_done() {
            Some(true) => break,
            Some(false) => {}
            None => {
                error!("lock del ledger envenenado, apagando el master");
                return;
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    info!("job terminado, sirviendo AllDone durante {:?} más", grace);
    tokio::time::sleep(grace).await;
}
