use anyhow::{bail, Result};
use common::{
    Assignment, CompletionReport, CompletionStatus, MapReduceApp, OutputStore, TaskDescriptor,
    TaskPhase,
};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::client::CoordinatorApi;
use crate::config::WorkerConfig;
use crate::executor::{self, TaskError};

/// Lo que hizo un worker hasta recibir AllDone.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerSummary {
    pub maps_accepted: u32,
    pub reduces_accepted: u32,
    /// intentos cuya salida se descartó (Stale / AlreadyDone)
    pub discarded: u32,
    /// intentos que fallaron localmente (input faltante, I/O)
    pub failed: u32,
}

pub struct Worker<C> {
    config: WorkerConfig,
    api: C,
    app: MapReduceApp,
    store: OutputStore,
}

impl<C: CoordinatorApi> Worker<C> {
    pub fn new(config: WorkerConfig, api: C, app: MapReduceApp) -> Self {
        let store = OutputStore::new(config.work_dir.clone());
        Self {
            config,
            api,
            app,
            store,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.worker_id
    }

    /// Loop principal: pide trabajo, lo ejecuta, lo reporta; termina con AllDone.
    ///
    /// Las fallas de transporte se reintentan con backoff. Sólo devuelve error
    /// si se configuró `max_connect_retries` y se agotaron. Sin ese límite, un
    /// worker que no llegó a ver AllDone antes de que el master se apagara
    /// queda reintentando hasta que lo maten.
    pub async fn run(&self) -> Result<WorkerSummary> {
        let mut summary = WorkerSummary::default();
        let mut backoff = self.new_backoff();

        info!("worker {} arrancando contra {}", self.id(), self.config.master_url);

        loop {
            let assignment = match self.api.request_assignment(self.id()).await {
                Ok(a) => {
                    backoff.reset();
                    a
                }
                Err(e) => {
                    self.wait_after_failure(&mut backoff, &e).await?;
                    continue;
                }
            };

            match assignment {
                Assignment::MapWork(task) => {
                    self.handle_task(TaskPhase::Map, task, &mut summary).await?
                }
                Assignment::ReduceWork(task) => {
                    self.handle_task(TaskPhase::Reduce, task, &mut summary).await?
                }
                Assignment::Wait => {
                    debug!("no hay tareas libres, esperando {:?}", self.config.wait_interval);
                    sleep(self.config.wait_interval).await;
                }
                Assignment::AllDone => {
                    info!("worker {} terminó: {:?}", self.id(), summary);
                    return Ok(summary);
                }
            }
        }
    }

    /// `phase` viene de la variante de la asignación y es la que decide qué
    /// se ejecuta; un descriptor que la contradiga se descarta sin reportar.
    async fn handle_task(
        &self,
        phase: TaskPhase,
        task: TaskDescriptor,
        summary: &mut WorkerSummary,
    ) -> Result<()> {
        let index = task.index;
        let epoch = task.epoch;
        info!(
            "tengo tarea {:?} #{} (epoch={}, {} inputs)",
            phase,
            index,
            epoch,
            task.input_refs.len()
        );

        if task.phase != phase {
            warn!(
                "asignación {:?} #{} con descriptor de fase {:?}, ignorándola",
                phase, index, task.phase
            );
            summary.failed += 1;
            return Ok(());
        }

        let output_manifest = match self.execute(phase, task).await {
            Ok(m) => m,
            Err(e) => {
                // no reportamos: la tarea queda en vuelo hasta que venza
                // y el master se la dé a otro
                warn!("error procesando {:?} #{}: {}", phase, index, e);
                summary.failed += 1;
                return Ok(());
            }
        };

        let report = CompletionReport {
            worker_id: self.id().to_string(),
            phase,
            index,
            epoch,
            output_manifest,
        };

        match self.report(&report).await? {
            Some(CompletionStatus::Accepted) => {
                info!("{:?} #{} aceptada por el master", phase, index);
                match phase {
                    TaskPhase::Map => summary.maps_accepted += 1,
                    TaskPhase::Reduce => summary.reduces_accepted += 1,
                }
            }
            Some(status @ (CompletionStatus::Stale | CompletionStatus::AlreadyDone)) => {
                info!(
                    "{:?} #{} (epoch={}) quedó {:?}, descartando salida",
                    phase, index, epoch, status
                );
                summary.discarded += 1;
            }
            None => summary.discarded += 1,
        }

        Ok(())
    }

    /// Corre la función de usuario y la escritura de archivos en un hilo
    /// de bloqueo.
    async fn execute(
        &self,
        phase: TaskPhase,
        task: TaskDescriptor,
    ) -> Result<Vec<String>, TaskError> {
        let app = self.app;
        let store = self.store.clone();

        tokio::task::spawn_blocking(move || match phase {
            TaskPhase::Map => executor::run_map(&app, &store, &task),
            TaskPhase::Reduce => executor::run_reduce(&app, &store, &task),
        })
        .await?
    }

    /// Reporta hasta obtener respuesta. `None` si el master rechazó el reporte.
    async fn report(&self, report: &CompletionReport) -> Result<Option<CompletionStatus>> {
        let mut backoff = self.new_backoff();
        loop {
            match self.api.report_completion(report).await {
                Ok(status) => return Ok(Some(status)),
                Err(e) if !e.is_transient() => {
                    warn!(
                        "el master rechazó el reporte de {:?} #{}: {}",
                        report.phase, report.index, e
                    );
                    return Ok(None);
                }
                Err(e) => self.wait_after_failure(&mut backoff, &e).await?,
            }
        }
    }

    async fn wait_after_failure(
        &self,
        backoff: &mut Backoff,
        err: &crate::client::TransportError,
    ) -> Result<()> {
        if let Some(max) = self.config.max_connect_retries {
            if backoff.attempts() >= max {
                bail!("master inalcanzable tras {} intentos: {}", max, err);
            }
        }

        let delay = backoff.next_delay();
        warn!("falla hablando con el master ({}), reintento en {:?}", err, delay);
        sleep(delay).await;
        Ok(())
    }

    fn new_backoff(&self) -> Backoff {
        Backoff::new(self.config.backoff_initial, self.config.backoff_max)
    }
}
