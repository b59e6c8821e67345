//! Snapshot Engine: captures an address -> value map for a typed region scan.

use std::collections::HashMap;

use log::debug;

use crate::backend::{MemoryBackend, MemoryRegion};
use crate::value::{self, Value, ValueType};

/// A point-in-time capture of every `value_type`-aligned address within a
/// region list, keyed by address.
pub type Snapshot = HashMap<u64, Value>;

/// Captures `value_type`-sized, stride-aligned values from every region in
/// `regions`, reading in `chunk_size`-byte windows.
///
/// `chunk_size` is clamped to at least `value_type.size()` so a caller can't
/// configure a chunk too small to hold even one value.
pub fn take_snapshot(
    backend: &dyn MemoryBackend,
    regions: &[MemoryRegion],
    value_type: ValueType,
    chunk_size: usize,
) -> Snapshot {
    let chunk_size = chunk_size.max(value_type.size());
    let stride = value_type.size();
    let mut snapshot = Snapshot::new();

    for region in regions {
        let mut offset: u64 = 0;
        while offset < region.size {
            let to_read = chunk_size.min((region.size - offset) as usize);
            let address = region.base_address + offset;
            match backend.read(address, to_read) {
                Ok(data) => {
                    let usable = data.len() - (data.len() % stride);
                    let mut idx = 0;
                    while idx < usable {
                        let value = value::unpack(&data[idx..idx + stride], value_type);
                        snapshot.insert(address + idx as u64, value);
                        idx += stride;
                    }
                }
                Err(err) => {
                    debug!("take_snapshot: skipping unreadable chunk at 0x{address:X}: {err}");
                }
            }
            offset += to_read as u64;
        }
    }

    debug!("take_snapshot: captured {} address(es) across {} region(s)", snapshot.len(), regions.len());
    snapshot
}

/// Restricts a snapshot to addresses falling inside `regions`. Used when a
/// dynamic scan narrows its region set mid-run.
pub fn filter_snapshot_by_regions(snapshot: &Snapshot, regions: &[MemoryRegion]) -> Snapshot {
    if regions.is_empty() {
        return Snapshot::new();
    }
    snapshot
        .iter()
        .filter(|(&addr, _)| regions.iter().any(|r| r.contains_address(addr)))
        .map(|(&addr, &value)| (addr, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;

    #[test]
    fn snapshot_captures_known_static_values() {
        let backend = MockBackend::new();
        let regions = backend.enumerate_regions().unwrap();
        let snapshot = take_snapshot(&backend, &regions, ValueType::UInt32, 0x4000);
        let addr = crate::backend::mock::REGION1_BASE + crate::backend::mock::UINT32_OFFSET;
        assert_eq!(snapshot.get(&addr).unwrap().as_f64(), 123456.0);
    }

    #[test]
    fn filter_keeps_only_addresses_within_regions() {
        let backend = MockBackend::new();
        let all_regions = backend.enumerate_regions().unwrap();
        let snapshot = take_snapshot(&backend, &all_regions, ValueType::UInt32, 0x4000);
        let region1_only = vec![all_regions[0].clone()];
        let filtered = filter_snapshot_by_regions(&snapshot, &region1_only);
        assert!(filtered.keys().all(|&addr| region1_only[0].contains_address(addr)));
        assert!(filtered.len() < snapshot.len() || all_regions.len() == 1);
    }

    #[test]
    fn filter_with_no_regions_is_empty() {
        let backend = MockBackend::new();
        let regions = backend.enumerate_regions().unwrap();
        let snapshot = take_snapshot(&backend, &regions, ValueType::UInt32, 0x4000);
        assert!(filter_snapshot_by_regions(&snapshot, &[]).is_empty());
    }
}
