//! WordCount: la aplicación de ejemplo que corre el binario del worker.

use crate::engine::{KeyValue, MapReduceApp};

/// Limpia un token: sólo alfanumérico y '_', en minúscula.
fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_lowercase()
}

/// Emite `(palabra, "1")` por cada token no vacío del split.
pub fn wc_map(_split_name: &str, contents: &str) -> Vec<KeyValue> {
    contents
        .split_whitespace()
        .map(normalize)
        .filter(|w| !w.is_empty())
        .map(|w| KeyValue::new(w, "1"))
        .collect()
}

/// Cuenta las ocurrencias de una palabra.
pub fn wc_reduce(_key: &str, values: &[String]) -> String {
    values.len().to_string()
}

pub fn wordcount_app() -> MapReduceApp {
    MapReduceApp {
        map: wc_map,
        reduce: wc_reduce,
    }
}
