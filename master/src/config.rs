use anyhow::{bail, Context, Result};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

use glob::glob;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_INPUT_GLOB: &str = "/data/input/*";
pub const DEFAULT_NUM_REDUCE: u32 = 10;
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 3;

/// Configuración del master, leída de variables de entorno.
#[derive(Debug, Clone)]
pub struct MasterConfig {
    pub bind_addr: String,
    /// Patrón de los splits de entrada, ej: "/data/input/*.txt"
    pub input_glob: String,
    pub num_reduce: u32,
    /// Mismo timeout para map y reduce
    pub task_timeout: Duration,
    pub sweep_interval: Duration,
    /// Cuánto seguimos sirviendo después de terminar el job,
    /// para que los workers alcancen a ver AllDone
    pub shutdown_grace: Duration,
}

impl MasterConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let num_reduce: u32 = parse_or(&lookup, "MR_NUM_REDUCE", DEFAULT_NUM_REDUCE)?;
        if num_reduce == 0 {
            bail!("MR_NUM_REDUCE tiene que ser >= 1");
        }

        Ok(Self {
            bind_addr: lookup("MR_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            input_glob: lookup("MR_INPUT_GLOB").unwrap_or_else(|| DEFAULT_INPUT_GLOB.to_string()),
            num_reduce,
            task_timeout: Duration::from_secs(parse_or(
                &lookup,
                "MR_TASK_TIMEOUT_SECS",
                DEFAULT_TASK_TIMEOUT_SECS,
            )?),
            sweep_interval: Duration::from_millis(parse_or(
                &lookup,
                "MR_SWEEP_INTERVAL_MS",
                DEFAULT_SWEEP_INTERVAL_MS,
            )?),
            shutdown_grace: Duration::from_secs(parse_or(
                &lookup,
                "MR_SHUTDOWN_GRACE_SECS",
                DEFAULT_SHUTDOWN_GRACE_SECS,
            )?),
        })
    }

    /// Archivos que matchean `input_glob`, ordenados por ruta para que
    /// los índices de map sean estables.
    pub fn resolve_inputs(&self) -> Result<Vec<String>> {
        let pattern = glob(&self.input_glob)
            .with_context(|| format!("patrón input_glob inválido: {}", self.input_glob))?;

        let mut paths: Vec<PathBuf> = pattern
            .flatten()
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        Ok(paths
            .into_iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("valor inválido para {}: {:?}", key, raw)),
        None => Ok(default),
    }
}
