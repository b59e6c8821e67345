//! Reference Tracer: breadth-first search for pointer-sized little-endian
//! words that reference a target address, built up into bounded-depth
//! chains.

use std::collections::HashMap;

use log::{debug, warn};

use crate::backend::{MemoryBackend, MemoryRegion, DEFAULT_CHUNK_SIZE};

/// Hard cap on the total number of chains a trace will emit, to bound
/// pathological blow-up on cyclic pointer graphs — cycles are permitted and
/// otherwise produce unbounded repeated path extensions until the depth
/// bound runs out.
pub const MAX_CHAINS: usize = 10_000;

/// An ordered pointer chain `[a_k, ..., a_1, a_0]` where `a_0` is a seed and,
/// for every `i > 0`, the pointer-sized little-endian word at `a_i` equals
/// `a_{i-1}`.
pub type PointerChain = Vec<u64>;

/// Finds every address in `regions` holding a `pointer_size`-wide
/// little-endian word equal to `target`, scanning in `pointer_size`-aligned
/// strides within each chunk.
pub fn find_pointer_references(backend: &dyn MemoryBackend, regions: &[MemoryRegion], target: u64) -> Vec<u64> {
    let pointer_size = backend.pointer_size();
    let target_bytes = &target.to_le_bytes()[..pointer_size];
    let mut refs = Vec::new();

    for region in regions {
        if region.size < pointer_size as u64 {
            continue;
        }
        let mut offset: u64 = 0;
        while offset + pointer_size as u64 <= region.size {
            let to_read = DEFAULT_CHUNK_SIZE.min((region.size - offset) as usize);
            let address = region.base_address + offset;
            match backend.read(address, to_read) {
                Ok(data) => {
                    let mut idx = 0;
                    while idx + pointer_size <= data.len() {
                        if &data[idx..idx + pointer_size] == target_bytes {
                            refs.push(address + idx as u64);
                        }
                        idx += pointer_size;
                    }
                }
                Err(err) => {
                    debug!("find_pointer_references: skipping unreadable chunk at 0x{address:X}: {err}");
                }
            }
            offset += to_read as u64;
        }
    }

    refs
}

/// Builds pointer chains pointing (directly or transitively) at `seeds`, up
/// to `max_depth` hops.
pub fn trace_references(backend: &dyn MemoryBackend, regions: &[MemoryRegion], seeds: &[u64], max_depth: u32) -> Vec<PointerChain> {
    let mut chains: Vec<PointerChain> = Vec::new();
    let mut frontier: HashMap<u64, Vec<PointerChain>> =
        seeds.iter().map(|&seed| (seed, vec![vec![seed]])).collect();

    let mut depth = 0;
    while !frontier.is_empty() && depth < max_depth {
        let mut next_frontier: HashMap<u64, Vec<PointerChain>> = HashMap::new();

        for (&target, existing_paths) in frontier.iter() {
            let refs = find_pointer_references(backend, regions, target);
            for reference in refs {
                for path in existing_paths {
                    if chains.len() >= MAX_CHAINS {
                        warn!("trace_references: hit MAX_CHAINS ({MAX_CHAINS}) cap, truncating trace");
                        return chains;
                    }
                    let mut new_path = vec![reference];
                    new_path.extend_from_slice(path);
                    next_frontier.entry(reference).or_default().push(new_path.clone());
                    chains.push(new_path);
                }
            }
        }

        frontier = next_frontier;
        depth += 1;
    }

    chains
}
