use chrono::Utc;
use common::{CompletionReport, CompletionStatus, JobPhase, TaskPhase, TaskState};
use tracing::{info, warn};

use crate::ledger::{LedgerError, TaskLedger};

impl TaskLedger {
    /// ReportCompletion: valida el reporte contra la epoch actual y, si
    /// corresponde, marca la tarea Completed y avanza la fase del job.
    ///
    /// Un `Err` es una falla de protocolo (tarea inexistente, manifest mal
    /// formado); en ese caso el ledger no se toca.
    pub fn report_completion(
        &mut self,
        report: &CompletionReport,
    ) -> Result<CompletionStatus, LedgerError> {
        let phase = report.phase;
        let index = report.index;
        let expected = match phase {
            TaskPhase::Map => self.num_reduce as usize,
            TaskPhase::Reduce => 1,
        };

        let task = self
            .tasks_mut(phase)
            .get_mut(index as usize)
            .ok_or(LedgerError::UnknownTask { phase, index })?;

        // Completed con otra epoch: era un intento reemplazado, no un duplicado
        let status = match task.state {
            TaskState::Completed if task.epoch == report.epoch => {
                Some(CompletionStatus::AlreadyDone)
            }
            TaskState::Completed => Some(CompletionStatus::Stale),
            TaskState::Idle => Some(CompletionStatus::Stale),
            TaskState::InProgress
                if task.epoch != report.epoch
                    || task.assigned_worker.as_deref() != Some(report.worker_id.as_str()) =>
            {
                Some(CompletionStatus::Stale)
            }
            TaskState::InProgress => None,
        };

        if let Some(status) = status {
            info!(
                "reporte ignorado de {} para {:?} #{} (epoch reportada={}, actual={}): {:?}",
                report.worker_id, phase, index, report.epoch, task.epoch, status
            );
            if status == CompletionStatus::Stale {
                self.stale_reports += 1;
            }
            return Ok(status);
        }

        if report.output_manifest.len() != expected {
            return Err(LedgerError::BadManifest {
                phase,
                index,
                expected,
                got: report.output_manifest.len(),
            });
        }

        task.complete(report.output_manifest.clone());
        info!(
            "tarea {:?} #{} completada por {} (epoch={})",
            phase, index, report.worker_id, report.epoch
        );

        match phase {
            TaskPhase::Map => {
                // publicar las particiones para cada reduce, dentro del mismo lock
                for (bucket, path) in report.output_manifest.iter().enumerate() {
                    self.reduce_tasks[bucket].input_refs.push(path.clone());
                }

                self.map_remaining -= 1;
                if self.map_remaining == 0 {
                    self.phase = JobPhase::Reducing;
                    info!("todos los maps completos, arrancando fase de reduce");
                }
            }
            TaskPhase::Reduce => {
                self.reduce_remaining -= 1;
                if self.reduce_remaining == 0 {
                    self.phase = JobPhase::Done;
                    self.finished_at = Some(Utc::now());
                    info!("todos los reduces completos, job terminado");
                }
            }
        }

        Ok(CompletionStatus::Accepted)
    }
}

/// Helper para los handlers: loguea las fallas de protocolo en un solo lugar.
pub(crate) fn log_protocol_fault(report: &CompletionReport, err: &LedgerError) {
    warn!(
        "reporte inválido de {} ({:?} #{} epoch={}): {}",
        report.worker_id, report.phase, report.index, report.epoch, err
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Assignment, TaskDescriptor};
    use std::time::{Duration, SystemTime};

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn ledger(maps: usize, reduces: u32) -> TaskLedger {
        let splits = (0..maps).map(|i| format!("in-{i}.txt")).collect();
        TaskLedger::new(splits, reduces, TIMEOUT).unwrap()
    }

    fn report_for(worker: &str, t: &TaskDescriptor) -> CompletionReport {
        let output_manifest = match t.phase {
            TaskPhase::Map => (0..t.num_reduce)
                .map(|r| format!("mr-{}-{}", t.index, r))
                .collect(),
            TaskPhase::Reduce => vec![format!("mr-out-{}", t.index)],
        };
        CompletionReport {
            worker_id: worker.to_string(),
            phase: t.phase,
            index: t.index,
            epoch: t.epoch,
            output_manifest,
        }
    }

    fn take_map(l: &mut TaskLedger, worker: &str, now: SystemTime) -> TaskDescriptor {
        match l.request_assignment(worker, now) {
            Assignment::MapWork(t) => t,
            other => panic!("esperaba MapWork, llegó {other:?}"),
        }
    }

    fn take_reduce(l: &mut TaskLedger, worker: &str, now: SystemTime) -> TaskDescriptor {
        match l.request_assignment(worker, now) {
            Assignment::ReduceWork(t) => t,
            other => panic!("esperaba ReduceWork, llegó {other:?}"),
        }
    }

    #[test]
    fn reporte_valido_es_accepted_y_descuenta() {
        let mut l = ledger(2, 2);
        let t = take_map(&mut l, "a", SystemTime::now());

        let status = l.report_completion(&report_for("a", &t)).unwrap();

        assert_eq!(status, CompletionStatus::Accepted);
        assert_eq!(l.map_remaining(), 1);
        let task = l.task(TaskPhase::Map, 0).unwrap();
        assert_eq!(task.state, TaskState::Completed);
        assert_eq!(task.output_refs, vec!["mr-0-0", "mr-0-1"]);
        assert!(task.assigned_worker.is_none());
    }

    #[test]
    fn reporte_duplicado_es_already_done() {
        let mut l = ledger(2, 1);
        let t = take_map(&mut l, "a", SystemTime::now());
        let report = report_for("a", &t);

        assert_eq!(l.report_completion(&report).unwrap(), CompletionStatus::Accepted);
        assert_eq!(
            l.report_completion(&report).unwrap(),
            CompletionStatus::AlreadyDone
        );
        assert_eq!(l.map_remaining(), 1);
        // la partición no se duplica en el reduce
        assert_eq!(l.task(TaskPhase::Reduce, 0).unwrap().input_refs.len(), 1);
    }

    #[test]
    fn reporte_de_tarea_reclamada_es_stale() {
        let mut l = ledger(1, 1);
        let t0 = SystemTime::now();
        let t = take_map(&mut l, "a", t0);

        l.sweep_expired(t0 + TIMEOUT + Duration::from_secs(1));

        assert_eq!(
            l.report_completion(&report_for("a", &t)).unwrap(),
            CompletionStatus::Stale
        );
        assert_eq!(l.map_remaining(), 1);
        assert_eq!(l.task(TaskPhase::Map, 0).unwrap().state, TaskState::Idle);
    }

    #[test]
    fn reporte_de_otro_worker_es_stale() {
        let mut l = ledger(1, 1);
        let t = take_map(&mut l, "a", SystemTime::now());

        assert_eq!(
            l.report_completion(&report_for("intruso", &t)).unwrap(),
            CompletionStatus::Stale
        );
        assert_eq!(
            l.task(TaskPhase::Map, 0).unwrap().state,
            TaskState::InProgress
        );
        assert_eq!(l.snapshot().stale_reports, 1);
    }

    /// A toma el map 0 (epoch 1), vence, B lo toma (epoch 2) y termina;
    /// el reporte tardío de A se rechaza sin tocar contadores ni outputs.
    #[test]
    fn reporte_tardio_tras_reasignacion_es_stale() {
        let mut l = ledger(1, 2);
        let t0 = SystemTime::now();

        let a = take_map(&mut l, "A", t0);
        assert_eq!(a.epoch, 1);

        let b = take_map(&mut l, "B", t0 + TIMEOUT + Duration::from_secs(1));
        assert_eq!(b.epoch, 2);

        assert_eq!(
            l.report_completion(&report_for("B", &b)).unwrap(),
            CompletionStatus::Accepted
        );
        assert_eq!(l.phase(), JobPhase::Reducing);

        let mut late = report_for("A", &a);
        late.output_manifest = vec!["otra-0".into(), "otra-1".into()];
        assert_eq!(
            l.report_completion(&late).unwrap(),
            CompletionStatus::Stale
        );

        assert_eq!(l.map_remaining(), 0);
        let task = l.task(TaskPhase::Map, 0).unwrap();
        assert_eq!(task.epoch, 2);
        assert_eq!(task.output_refs, vec!["mr-0-0", "mr-0-1"]);
        assert_eq!(
            l.task(TaskPhase::Reduce, 1).unwrap().input_refs,
            vec!["mr-0-1"]
        );
    }

    /// Igual que el anterior pero A reporta mientras B todavía está en vuelo.
    #[test]
    fn reporte_tardio_con_reemplazo_en_vuelo_es_stale() {
        let mut l = ledger(1, 1);
        let t0 = SystemTime::now();

        let a = take_map(&mut l, "A", t0);
        let b = take_map(&mut l, "B", t0 + TIMEOUT + Duration::from_secs(1));

        assert_eq!(
            l.report_completion(&report_for("A", &a)).unwrap(),
            CompletionStatus::Stale
        );
        assert_eq!(l.map_remaining(), 1);
        assert_eq!(
            l.report_completion(&report_for("B", &b)).unwrap(),
            CompletionStatus::Accepted
        );
        assert_eq!(l.map_remaining(), 0);
    }

    #[test]
    fn tarea_inexistente_es_error_sin_mutar() {
        let mut l = ledger(1, 1);
        let t = take_map(&mut l, "a", SystemTime::now());

        let mut bogus = report_for("a", &t);
        bogus.index = 7;

        assert_eq!(
            l.report_completion(&bogus).unwrap_err(),
            LedgerError::UnknownTask {
                phase: TaskPhase::Map,
                index: 7
            }
        );
        assert_eq!(l.map_remaining(), 1);
    }

    #[test]
    fn manifest_de_tamano_incorrecto_es_error_sin_mutar() {
        let mut l = ledger(1, 3);
        let t = take_map(&mut l, "a", SystemTime::now());

        let mut bad = report_for("a", &t);
        bad.output_manifest.pop();

        assert!(matches!(
            l.report_completion(&bad),
            Err(LedgerError::BadManifest {
                expected: 3,
                got: 2,
                ..
            })
        ));
        assert_eq!(
            l.task(TaskPhase::Map, 0).unwrap().state,
            TaskState::InProgress
        );
        assert!(l
            .tasks(TaskPhase::Reduce)
            .iter()
            .all(|t| t.input_refs.is_empty()));
    }

    /// 2 splits, R=2: el job no está terminado hasta que se aceptan los dos reduces.
    #[test]
    fn is_done_recien_con_todos_los_reduces() {
        let mut l = ledger(2, 2);
        let now = SystemTime::now();

        let m0 = take_map(&mut l, "a", now);
        let m1 = take_map(&mut l, "b", now);
        l.report_completion(&report_for("a", &m0)).unwrap();
        l.report_completion(&report_for("b", &m1)).unwrap();
        assert!(!l.is_done());

        let r0 = take_reduce(&mut l, "a", now);
        let r1 = take_reduce(&mut l, "b", now);
        assert_eq!(r0.input_refs, vec!["mr-0-0", "mr-1-0"]);
        assert_eq!(r1.input_refs, vec!["mr-0-1", "mr-1-1"]);

        l.report_completion(&report_for("a", &r0)).unwrap();
        assert!(!l.is_done());

        l.report_completion(&report_for("b", &r1)).unwrap();
        assert!(l.is_done());
        assert_eq!(l.reduce_remaining(), 0);
        assert!(l.snapshot().finished_at.is_some());
    }
}
