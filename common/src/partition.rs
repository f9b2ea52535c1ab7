//! Reparto de claves intermedias entre los R buckets de reduce.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a de 32 bits, sin el bit de signo.
///
/// No usamos `DefaultHasher`: su salida puede cambiar entre versiones de Rust,
/// y todos los workers (y todos los reinicios) tienen que coincidir.
fn stable_hash(key: &str) -> u32 {
    let mut h = FNV_OFFSET_BASIS;
    for b in key.as_bytes() {
        h ^= u32::from(*b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h & 0x7fff_ffff
}

/// Bucket de reduce para `key`, en `[0, num_reduce)`.
///
/// `num_reduce` tiene que ser >= 1; el master rechaza jobs con R = 0.
pub fn bucket(key: &str, num_reduce: u32) -> u32 {
    debug_assert!(num_reduce > 0, "num_reduce debe ser >= 1");
    stable_hash(key) % num_reduce.max(1)
}
