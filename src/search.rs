//! Value Searcher: chunked scan of a region list for a packed byte pattern.

use log::debug;

use crate::backend::{MemoryBackend, MemoryRegion, DEFAULT_CHUNK_SIZE};
use crate::value::{self, ValueType};

/// Scans every region in `regions` for `target`'s `value_type`-packed
/// encoding, returning every address a match begins at.
///
/// A chunk straddling a match boundary is handled by overlapping chunks by
/// `pattern.len() - 1` bytes, so a match spanning the chunk boundary is
/// never missed. The overlap is exactly wide enough that consecutive
/// chunks' match ranges are contiguous rather than re-covering each other,
/// so no address is ever reported twice.
pub fn search_values(
    backend: &dyn MemoryBackend,
    regions: &[MemoryRegion],
    target: f64,
    value_type: ValueType,
) -> Vec<u64> {
    let pattern = value::pack(target, value_type);
    let mut found = Vec::new();

    for region in regions {
        let mut offset: u64 = 0;
        while offset < region.size {
            let to_read = DEFAULT_CHUNK_SIZE.min((region.size - offset) as usize);
            let address = region.base_address + offset;
            match backend.read(address, to_read) {
                Ok(data) => {
                    for idx in find_all(&data, &pattern) {
                        found.push(address + idx as u64);
                    }
                }
                Err(err) => {
                    debug!("search_values: skipping unreadable chunk at 0x{address:X}: {err}");
                }
            }
            let step = to_read as u64;
            offset += step.saturating_sub(pattern.len() as u64 - 1).max(1);
            if step < DEFAULT_CHUNK_SIZE as u64 {
                break;
            }
        }
    }

    debug!("search_values: {} match(es) across {} region(s)", found.len(), regions.len());
    found
}

/// Re-checks a previously found set of addresses against an expected value.
/// Returns, for each address, whether it still holds the expected value
/// (reads that fail are treated as `false`).
pub fn rescan(
    backend: &dyn MemoryBackend,
    addresses: &[u64],
    expected: f64,
    value_type: ValueType,
) -> Vec<(u64, bool)> {
    let expected_value = value::unpack(&value::pack(expected, value_type), value_type);
    addresses
        .iter()
        .map(|&addr| {
            let matches = backend
                .read(addr, value_type.size())
                .map(|bytes| value::unpack(&bytes, value_type).approx_eq(expected_value))
                .unwrap_or(false);
            (addr, matches)
        })
        .collect()
}

fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }
    let mut hits = Vec::new();
    let mut idx = 0;
    while idx + needle.len() <= haystack.len() {
        if &haystack[idx..idx + needle.len()] == needle {
            hits.push(idx);
        }
        idx += 1;
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;

    #[test]
    fn finds_known_float_value() {
        let backend = MockBackend::new();
        let regions = backend.enumerate_regions().unwrap();
        let hits = search_values(&backend, &regions, 3.14159, ValueType::Float32);
        assert!(hits.contains(&(crate::backend::mock::REGION1_BASE + crate::backend::mock::FLOAT_OFFSET)));
    }

    #[test]
    fn finds_no_hits_for_absent_value() {
        let backend = MockBackend::new();
        let regions = backend.enumerate_regions().unwrap();
        let hits = search_values(&backend, &regions, 42_424_242.0, ValueType::UInt32);
        assert!(hits.is_empty());
    }

    #[test]
    fn rescan_confirms_unchanged_value() {
        let backend = MockBackend::new();
        let addr = crate::backend::mock::REGION1_BASE + crate::backend::mock::UINT32_OFFSET;
        let results = rescan(&backend, &[addr], 123456.0, ValueType::UInt32);
        assert_eq!(results, vec![(addr, true)]);
    }

    #[test]
    fn rescan_detects_changed_value() {
        let backend = MockBackend::new();
        let addr = crate::backend::mock::REGION1_BASE + crate::backend::mock::UINT32_OFFSET;
        backend.write(addr, &value::pack(1.0, ValueType::UInt32)).unwrap();
        let results = rescan(&backend, &[addr], 123456.0, ValueType::UInt32);
        assert_eq!(results, vec![(addr, false)]);
    }

    /// A single region larger than `DEFAULT_CHUNK_SIZE`, so `search_values`
    /// must cross a chunk boundary to find a match that straddles it.
    struct BigRegionBackend {
        bytes: Vec<u8>,
    }

    impl crate::backend::MemoryBackend for BigRegionBackend {
        fn pointer_size(&self) -> usize {
            8
        }
        fn enumerate_regions(&self) -> crate::error::Result<Vec<MemoryRegion>> {
            Ok(vec![MemoryRegion {
                base_address: 0,
                size: self.bytes.len() as u64,
                protection: crate::backend::MemoryProtection::ReadWrite,
                state: crate::backend::MemoryState::Commit,
                region_type: crate::backend::MemoryType::Private,
                description: None,
            }])
        }
        fn read(&self, address: u64, size: usize) -> crate::error::Result<Vec<u8>> {
            let start = address as usize;
            let end = (start + size).min(self.bytes.len());
            Ok(self.bytes[start..end].to_vec())
        }
        fn write(&self, _address: u64, _bytes: &[u8]) -> crate::error::Result<()> {
            unimplemented!()
        }
        fn close(&self) {}
        fn modules(&self) -> &[crate::backend::ModuleInfo] {
            &[]
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[test]
    fn match_straddling_a_chunk_boundary_is_reported_once() {
        let mut bytes = vec![0u8; DEFAULT_CHUNK_SIZE * 2 + 64];
        // Place the pattern two bytes before the first chunk boundary so it
        // falls inside the overlap region re-read by the second chunk.
        let pattern = value::pack(123456.0, ValueType::UInt32);
        let match_offset = DEFAULT_CHUNK_SIZE - 2;
        bytes[match_offset..match_offset + pattern.len()].copy_from_slice(&pattern);

        let backend = BigRegionBackend { bytes };
        let regions = backend.enumerate_regions().unwrap();
        let hits = search_values(&backend, &regions, 123456.0, ValueType::UInt32);

        assert_eq!(hits, vec![match_offset as u64]);
    }
}
