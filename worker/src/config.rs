use anyhow::{Context, Result};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

pub const DEFAULT_MASTER_URL: &str = "http://localhost:8080";
pub const DEFAULT_WORK_DIR: &str = "/data/mr";
pub const DEFAULT_WAIT_MS: u64 = 500;
pub const DEFAULT_BACKOFF_INITIAL_MS: u64 = 200;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 5000;

/// Configuración del worker, leída de variables de entorno.
/// - En Docker usaremos: MASTER_URL=http://master:8080
/// - Si no está definida, usa http://localhost:8080 (para pruebas locales)
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub master_url: String,
    /// Directorio compartido donde viven los intermedios y los outputs
    pub work_dir: PathBuf,
    /// Cuánto dormir cuando el master responde Wait
    pub wait_interval: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    /// None = reintentar para siempre si el master no responde.
    /// El master se apaga MR_SHUTDOWN_GRACE_SECS después de terminar el job;
    /// un worker con un intento más largo que eso (p.ej. uno reclamado que
    /// siguió corriendo) no recibe AllDone y sin este límite no sale nunca.
    /// Para despliegues donde el worker tiene que terminar solo, setear
    /// MR_MAX_CONNECT_RETRIES.
    pub max_connect_retries: Option<u32>,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let worker_id = lookup("MR_WORKER_ID").unwrap_or_else(default_worker_id);

        let max_connect_retries = match lookup("MR_MAX_CONNECT_RETRIES") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u32>()
                    .with_context(|| format!("valor inválido para MR_MAX_CONNECT_RETRIES: {raw:?}"))?,
            ),
            None => None,
        };

        Ok(Self {
            worker_id,
            master_url: lookup("MASTER_URL").unwrap_or_else(|| DEFAULT_MASTER_URL.to_string()),
            work_dir: lookup("MR_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_DIR)),
            wait_interval: Duration::from_millis(parse_or(&lookup, "MR_WAIT_MS", DEFAULT_WAIT_MS)?),
            backoff_initial: Duration::from_millis(parse_or(
                &lookup,
                "MR_BACKOFF_INITIAL_MS",
                DEFAULT_BACKOFF_INITIAL_MS,
            )?),
            backoff_max: Duration::from_millis(parse_or(
                &lookup,
                "MR_BACKOFF_MAX_MS",
                DEFAULT_BACKOFF_MAX_MS,
            )?),
            max_connect_retries,
        })
    }
}

/// hostname + uuid corto, para distinguir varios workers en la misma máquina
fn default_worker_id() -> String {
    let host = hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", host, &suffix[..8])
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_sin_variables() {
        let cfg = WorkerConfig::from_lookup(|_| None).unwrap();

        assert_eq!(cfg.master_url, DEFAULT_MASTER_URL);
        assert_eq!(cfg.work_dir, PathBuf::from(DEFAULT_WORK_DIR));
        assert_eq!(cfg.wait_interval, Duration::from_millis(500));
        assert!(cfg.max_connect_retries.is_none());
        assert!(!cfg.worker_id.is_empty());
    }

    #[test]
    fn ids_por_defecto_distintos() {
        let a = WorkerConfig::from_lookup(|_| None).unwrap();
        let b = WorkerConfig::from_lookup(|_| None).unwrap();
        assert_ne!(a.worker_id, b.worker_id);
    }

    #[test]
    fn respeta_las_variables() {
        let cfg = WorkerConfig::from_lookup(|k| match k {
            "MR_WORKER_ID" => Some("w-7".into()),
            "MASTER_URL" => Some("http://master:8080".into()),
            "MR_MAX_CONNECT_RETRIES" => Some("5".into()),
            "MR_BACKOFF_MAX_MS" => Some("1000".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(cfg.worker_id, "w-7");
        assert_eq!(cfg.master_url, "http://master:8080");
        assert_eq!(cfg.max_connect_retries, Some(5));
        assert_eq!(cfg.backoff_max, Duration::from_secs(1));
    }

    #[test]
    fn rechaza_numeros_invalidos() {
        assert!(WorkerConfig::from_lookup(|k| (k == "MR_WAIT_MS").then(|| "x".into())).is_err());
        assert!(
            WorkerConfig::from_lookup(|k| (k == "MR_MAX_CONNECT_RETRIES").then(|| "-3".into()))
                .is_err()
        );
    }
}
