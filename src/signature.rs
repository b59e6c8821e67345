//! Signature Extractor: reads a byte window around an address and renders
//! it as a hex pattern plus a wildcard mask.

use log::debug;

use crate::backend::MemoryBackend;

/// A hex byte-signature window captured around an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub address: u64,
    pub start: u64,
    pub pattern: String,
    pub mask: String,
}

/// Captures `window` bytes centered on `address` (clamped so `start` never
/// underflows zero). Every byte in this extractor is exact — the mask is
/// reserved for future wildcarding and is always all `x`.
pub fn generate_signature(backend: &dyn MemoryBackend, address: u64, window: usize) -> Signature {
    let half = (window / 2) as u64;
    let start = address.saturating_sub(half);

    let data = match backend.read(start, window) {
        Ok(data) => data,
        Err(err) => {
            debug!("generate_signature: read failed at 0x{start:X}: {err}");
            Vec::new()
        }
    };

    let pattern = data.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" ");
    let mask = "x".repeat(data.len());

    Signature {
        address,
        start,
        pattern,
        mask,
    }
}
