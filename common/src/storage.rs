use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::engine::KeyValue;
use crate::task::TaskIndex;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("input no disponible: {path}")]
    Missing {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("partición corrupta en {path} (línea {line})")]
    Corrupt {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("no se pudo publicar {path}")]
    Persist {
        path: String,
        #[source]
        source: tempfile::PersistError,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Almacenamiento durable de archivos intermedios y de salida.
///
/// Toda escritura pasa por un archivo temporal en el mismo directorio y se
/// publica con un rename atómico: bajo el nombre final nunca se ve un archivo
/// a medio escribir, aunque dos intentos de la misma tarea compitan.
#[derive(Debug, Clone)]
pub struct OutputStore {
    root: PathBuf,
}

impl OutputStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// mr-<map>-<bucket>
    pub fn intermediate_path(&self, map_index: TaskIndex, bucket: u32) -> PathBuf {
        self.root.join(format!("mr-{}-{}", map_index, bucket))
    }

    /// mr-out-<bucket>
    pub fn output_path(&self, reduce_index: TaskIndex) -> PathBuf {
        self.root.join(format!("mr-out-{}", reduce_index))
    }

    /// Escribe un bucket de salida de map como JSONL y lo publica.
    pub fn commit_partition(
        &self,
        map_index: TaskIndex,
        bucket: u32,
        pairs: &[KeyValue],
    ) -> Result<String, StorageError> {
        let target = self.intermediate_path(map_index, bucket);
        self.commit_with(&target, |w| {
            for kv in pairs {
                serde_json::to_writer(&mut *w, kv)?;
                w.write_all(b"\n")?;
            }
            Ok(())
        })
    }

    /// Escribe el output final de un reduce ("clave,valor" por línea) y lo publica.
    pub fn commit_output(
        &self,
        reduce_index: TaskIndex,
        rows: &[(String, String)],
    ) -> Result<String, StorageError> {
        let target = self.output_path(reduce_index);
        self.commit_with(&target, |w| {
            for (key, value) in rows {
                writeln!(w, "{},{}", key, value)?;
            }
            Ok(())
        })
    }

    fn commit_with<F>(&self, target: &Path, write_body: F) -> Result<String, StorageError>
    where
        F: FnOnce(&mut BufWriter<&mut File>) -> io::Result<()>,
    {
        fs::create_dir_all(&self.root)?;

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            write_body(&mut writer)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;

        let path = target.to_string_lossy().to_string();
        tmp.persist(target).map_err(|source| StorageError::Persist {
            path: path.clone(),
            source,
        })?;

        debug!("publicado {}", path);
        Ok(path)
    }

    /// Lee un archivo intermedio (JSONL de pares clave/valor).
    pub fn read_partition(&self, path: &str) -> Result<Vec<KeyValue>, StorageError> {
        let file = File::open(path).map_err(|source| StorageError::Missing {
            path: path.to_string(),
            source,
        })?;
        let reader = BufReader::new(file);

        let mut out = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let kv: KeyValue =
                serde_json::from_str(&line).map_err(|source| StorageError::Corrupt {
                    path: path.to_string(),
                    line: n + 1,
                    source,
                })?;
            out.push(kv);
        }

        Ok(out)
    }
}
