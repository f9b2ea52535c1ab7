//! Ejecución de un intento de map o de reduce. Todo es bloqueante: el loop
//! del worker lo corre en `spawn_blocking`, fuera de cualquier lock.

use common::{bucket, group_by_key, KeyValue, MapReduceApp, OutputStore, StorageError, TaskDescriptor};
use std::{fs, io, path::Path};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("input no disponible: {path}")]
    InputUnavailable {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("tarea de map sin split de entrada")]
    NoInput,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("la ejecución de la tarea terminó con panic o fue cancelada")]
    Join(#[from] tokio::task::JoinError),
}

/// Map: lee el split, corre la función de usuario, reparte los pares en R
/// buckets y publica cada uno. Devuelve el manifest (una ruta por bucket).
pub fn run_map(
    app: &MapReduceApp,
    store: &OutputStore,
    task: &TaskDescriptor,
) -> Result<Vec<String>, TaskError> {
    let input_path = task.input_refs.first().ok_or(TaskError::NoInput)?;
    let contents =
        fs::read_to_string(input_path).map_err(|source| TaskError::InputUnavailable {
            path: input_path.clone(),
            source,
        })?;

    let split_name = Path::new(input_path)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| input_path.clone());

    let pairs = (app.map)(&split_name, &contents);

    let num_reduce = task.num_reduce.max(1);
    let mut buckets: Vec<Vec<KeyValue>> = vec![Vec::new(); num_reduce as usize];
    for kv in pairs {
        let b = bucket(&kv.key, num_reduce) as usize;
        buckets[b].push(kv);
    }

    let mut manifest = Vec::with_capacity(buckets.len());
    for (b, pairs) in buckets.iter().enumerate() {
        let path = store.commit_partition(task.index, b as u32, pairs)?;
        manifest.push(path);
    }

    debug!(
        "map #{} (epoch={}) escribió {} particiones",
        task.index,
        task.epoch,
        manifest.len()
    );
    Ok(manifest)
}

/// Reduce: lee la partición de este bucket de cada map, agrupa por clave,
/// corre la función de usuario por clave y publica el output final.
pub fn run_reduce(
    app: &MapReduceApp,
    store: &OutputStore,
    task: &TaskDescriptor,
) -> Result<Vec<String>, TaskError> {
    let mut pairs = Vec::new();
    for path in &task.input_refs {
        pairs.extend(store.read_partition(path)?);
    }

    let rows: Vec<(String, String)> = group_by_key(pairs)
        .into_iter()
        .map(|(key, values)| {
            let out = (app.reduce)(&key, &values);
            (key, out)
        })
        .collect();

    let path = store.commit_output(task.index, &rows)?;

    debug!(
        "reduce #{} (epoch={}) escribió {} claves en {}",
        task.index,
        task.epoch,
        rows.len(),
        path
    );
    Ok(vec![path])
}
