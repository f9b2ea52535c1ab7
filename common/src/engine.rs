use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Par clave/valor intermedio emitido por la función map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// map(nombre_split, contenido) -> pares intermedios
pub type MapFn = fn(&str, &str) -> Vec<KeyValue>;

/// reduce(clave, valores) -> valor final
pub type ReduceFn = fn(&str, &[String]) -> String;

/// Par de funciones de usuario que ejecuta un worker.
/// El engine las trata como cajas negras.
#[derive(Clone, Copy)]
pub struct MapReduceApp {
    pub map: MapFn,
    pub reduce: ReduceFn,
}

/// Agrupa los valores por clave, con las claves ordenadas.
/// El orden de los valores de una misma clave es el de llegada.
pub fn group_by_key<I>(pairs: I) -> BTreeMap<String, Vec<String>>
where
    I: IntoIterator<Item = KeyValue>,
{
    let mut acc: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for kv in pairs {
        acc.entry(kv.key).or_default().push(kv.value);
    }
    acc
}
