use common::{Assignment, JobPhase, TaskDescriptor, TaskPhase, TaskState};
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::ledger::TaskLedger;

impl TaskLedger {
    /// RequestAssignment: elige la próxima tarea para `worker_id`.
    ///
    /// Antes de asignar hace un barrido de vencidas, así el trabajo trabado
    /// vuelve a estar disponible aunque el failover de fondo no haya corrido.
    pub fn request_assignment(&mut self, worker_id: &str, now: SystemTime) -> Assignment {
        self.sweep_expired(now);

        match self.phase {
            JobPhase::Mapping => match self.start_next_idle(TaskPhase::Map, worker_id, now) {
                Some(task) => Assignment::MapWork(task),
                None => {
                    debug!(
                        "worker {} pidió tarea pero los {} maps pendientes están en vuelo",
                        worker_id, self.map_remaining
                    );
                    Assignment::Wait
                }
            },
            JobPhase::Reducing => {
                match self.start_next_idle(TaskPhase::Reduce, worker_id, now) {
                    Some(task) => Assignment::ReduceWork(task),
                    None => {
                        debug!(
                            "worker {} pidió tarea pero los {} reduces pendientes están en vuelo",
                            worker_id, self.reduce_remaining
                        );
                        Assignment::Wait
                    }
                }
            }
            JobPhase::Done => Assignment::AllDone,
        }
    }

    /// Busca la primera tarea Idle (índice más bajo) de la fase y la pone en vuelo.
    fn start_next_idle(
        &mut self,
        phase: TaskPhase,
        worker_id: &str,
        now: SystemTime,
    ) -> Option<TaskDescriptor> {
        let timeout = self.timeout;
        let num_reduce = self.num_reduce;

        let task = self
            .tasks_mut(phase)
            .iter_mut()
            .find(|t| t.state == TaskState::Idle)?;

        task.start_attempt(worker_id, now, timeout);

        info!(
            "asignando {:?} #{} (epoch={}) al worker {}",
            phase, task.index, task.epoch, worker_id
        );

        Some(TaskDescriptor {
            phase,
            index: task.index,
            epoch: task.epoch,
            input_refs: task.input_refs.clone(),
            num_reduce,
        })
    }

    /// Devuelve a Idle toda tarea en vuelo cuyo deadline ya pasó.
    /// Retorna cuántas se reclamaron.
    pub fn sweep_expired(&mut self, now: SystemTime) -> usize {
        let mut reclaimed = 0;

        for task in self
            .map_tasks
            .iter_mut()
            .chain(self.reduce_tasks.iter_mut())
        {
            if task.is_expired(now) {
                warn!(
                    "tarea {:?} #{} (epoch={}) del worker {} venció, vuelve a la cola",
                    task.phase,
                    task.index,
                    task.epoch,
                    task.assigned_worker.as_deref().unwrap_or("?")
                );
                task.reclaim();
                reclaimed += 1;
            }
        }

        self.reassignments += reclaimed as u64;
        reclaimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CompletionReport, CompletionStatus};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn ledger(maps: usize, reduces: u32) -> TaskLedger {
        let splits = (0..maps).map(|i| format!("in-{i}.txt")).collect();
        TaskLedger::new(splits, reduces, TIMEOUT).unwrap()
    }

    fn finish(l: &mut TaskLedger, worker: &str, t: &TaskDescriptor) -> CompletionStatus {
        let manifest = match t.phase {
            TaskPhase::Map => (0..t.num_reduce)
                .map(|r| format!("mr-{}-{}", t.index, r))
                .collect(),
            TaskPhase::Reduce => vec![format!("mr-out-{}", t.index)],
        };
        l.report_completion(&CompletionReport {
            worker_id: worker.to_string(),
            phase: t.phase,
            index: t.index,
            epoch: t.epoch,
            output_manifest: manifest,
        })
        .unwrap()
    }

    #[test]
    fn asigna_maps_en_orden_de_indice() {
        let mut l = ledger(3, 2);
        let now = SystemTime::now();

        for expected in 0..3 {
            match l.request_assignment("w", now) {
                Assignment::MapWork(t) => {
                    assert_eq!(t.index, expected);
                    assert_eq!(t.epoch, 1);
                    assert_eq!(t.num_reduce, 2);
                    assert_eq!(t.input_refs, vec![format!("in-{expected}.txt")]);
                }
                other => panic!("esperaba MapWork, llegó {other:?}"),
            }
        }

        // todos los maps en vuelo: no hay reduce todavía
        assert_eq!(l.request_assignment("w", now), Assignment::Wait);
    }

    #[test]
    fn ningun_reduce_sale_antes_de_terminar_todos_los_maps() {
        let mut l = ledger(2, 2);
        let now = SystemTime::now();

        let Assignment::MapWork(m0) = l.request_assignment("a", now) else {
            panic!("esperaba MapWork");
        };
        let Assignment::MapWork(m1) = l.request_assignment("b", now) else {
            panic!("esperaba MapWork");
        };

        assert_eq!(finish(&mut l, "a", &m0), CompletionStatus::Accepted);
        assert_eq!(l.phase(), JobPhase::Mapping);
        assert_eq!(l.request_assignment("c", now), Assignment::Wait);

        assert_eq!(finish(&mut l, "b", &m1), CompletionStatus::Accepted);
        assert_eq!(l.phase(), JobPhase::Reducing);

        match l.request_assignment("c", now) {
            Assignment::ReduceWork(r) => {
                assert_eq!(r.index, 0);
                assert_eq!(r.input_refs, vec!["mr-0-0", "mr-1-0"]);
            }
            other => panic!("esperaba ReduceWork, llegó {other:?}"),
        }
    }

    #[test]
    fn job_terminado_devuelve_all_done() {
        let mut l = ledger(1, 1);
        let now = SystemTime::now();

        let Assignment::MapWork(m) = l.request_assignment("w", now) else {
            panic!("esperaba MapWork");
        };
        finish(&mut l, "w", &m);
        let Assignment::ReduceWork(r) = l.request_assignment("w", now) else {
            panic!("esperaba ReduceWork");
        };
        finish(&mut l, "w", &r);

        assert!(l.is_done());
        assert_eq!(l.request_assignment("w", now), Assignment::AllDone);
        assert_eq!(l.request_assignment("otro", now), Assignment::AllDone);
    }

    #[test]
    fn sweep_reclama_solo_las_vencidas() {
        let mut l = ledger(2, 1);
        let t0 = SystemTime::now();

        l.request_assignment("a", t0);
        l.request_assignment("b", t0 + Duration::from_secs(8));

        // a vence en t0+10, b en t0+18
        assert_eq!(l.sweep_expired(t0 + Duration::from_secs(10)), 0);
        assert_eq!(l.sweep_expired(t0 + Duration::from_secs(11)), 1);

        let t = l.task(TaskPhase::Map, 0).unwrap();
        assert_eq!(t.state, TaskState::Idle);
        assert_eq!(t.epoch, 1);
        assert!(t.assigned_worker.is_none());
        assert_eq!(
            l.task(TaskPhase::Map, 1).unwrap().state,
            TaskState::InProgress
        );
        assert_eq!(l.snapshot().reassignments, 1);
    }

    #[test]
    fn tarea_vencida_se_reasigna_con_nueva_epoch() {
        let mut l = ledger(1, 1);
        let t0 = SystemTime::now();

        let Assignment::MapWork(first) = l.request_assignment("a", t0) else {
            panic!("esperaba MapWork");
        };
        assert_eq!(l.request_assignment("b", t0), Assignment::Wait);

        let later = t0 + TIMEOUT + Duration::from_secs(1);
        let Assignment::MapWork(second) = l.request_assignment("b", later) else {
            panic!("esperaba MapWork tras el timeout");
        };

        assert_eq!(second.index, first.index);
        assert_eq!(second.epoch, first.epoch + 1);
        assert_eq!(
            l.task(TaskPhase::Map, 0).unwrap().assigned_worker.as_deref(),
            Some("b")
        );
    }

    #[test]
    fn reduce_vencido_tambien_se_reclama() {
        let mut l = ledger(1, 1);
        let t0 = SystemTime::now();

        let Assignment::MapWork(m) = l.request_assignment("a", t0) else {
            panic!("esperaba MapWork");
        };
        finish(&mut l, "a", &m);
        let Assignment::ReduceWork(r1) = l.request_assignment("a", t0) else {
            panic!("esperaba ReduceWork");
        };

        let later = t0 + TIMEOUT + Duration::from_secs(1);
        let Assignment::ReduceWork(r2) = l.request_assignment("b", later) else {
            panic!("esperaba ReduceWork tras el timeout");
        };
        assert_eq!(r2.epoch, r1.epoch + 1);
        assert_eq!(r2.input_refs, r1.input_refs);
    }
}
