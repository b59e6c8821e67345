//! Mock Backend: an in-memory harness implementing [`MemoryBackend`] without
//! touching a real process, for tests and demos. Lays out two regions, a
//! static float32 and a static uint32, a dynamic int32 that decays by a
//! fixed step on every advance, and a pair of uint64 pointers chaining
//! region1 -> region2 -> region1.

use std::cell::RefCell;

use crate::backend::{MemoryBackend, MemoryProtection, MemoryRegion, MemoryState, MemoryType, ModuleInfo};
use crate::error::{Error, Result};
use crate::value::{self, ValueType};

/// Base address of the mock's first region, sized 0x2000 bytes. Fixed so
/// scenario tests can assert on literal addresses.
pub const REGION1_BASE: u64 = 0x1000_0000;
pub const REGION1_SIZE: u64 = 0x2000;

/// Base address of the mock's second region, also sized 0x2000 bytes.
pub const REGION2_BASE: u64 = 0x2000_0000;
pub const REGION2_SIZE: u64 = 0x2000;

/// Offset of the static float32 `3.14159` within region1.
pub const FLOAT_OFFSET: u64 = 0x400;
/// Offset of the static uint32 `123456` within region1.
pub const UINT32_OFFSET: u64 = 0x800;
/// Offset of the dynamic int32 (starts at `30`, decays by `DYNAMIC_STEP` on
/// every [`MockBackend::advance_dynamic_value`] call) within region1.
pub const DYNAMIC_OFFSET: u64 = 0x900;
/// Per-step delta applied to the dynamic value.
pub const DYNAMIC_STEP: i64 = -1;

/// Offset of a uint64 pointer in region2 pointing at region1's float32.
pub const PTR_TO_FLOAT_OFFSET: u64 = 0x100;
/// Offset of a uint64 pointer in region2 pointing at `PTR_TO_FLOAT_OFFSET`'s
/// own address (a second hop in the chain, extending the seed's float32 ->
/// direct pointer -> indirect pointer path).
pub const PTR_SELF_OFFSET: u64 = 0x108;

struct MockState {
    region1: Vec<u8>,
    region2: Vec<u8>,
    dynamic_type: ValueType,
    dynamic_value: i64,
}

/// In-memory [`MemoryBackend`] with the fixed demo layout described above.
///
/// Interior mutability (`RefCell`) is needed because `write` and
/// `advance_dynamic_value` mutate backing buffers through a shared `&self`,
/// matching the trait's native-backend signature (a real process handle is
/// likewise mutated through shared references under the hood).
pub struct MockBackend {
    state: RefCell<MockState>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Builds the mock harness with its fixed demo layout.
    pub fn new() -> Self {
        let mut region1 = vec![0u8; REGION1_SIZE as usize];
        let mut region2 = vec![0u8; REGION2_SIZE as usize];

        write_at(&mut region1, FLOAT_OFFSET, &value::pack(3.14159, ValueType::Float32));
        write_at(&mut region1, UINT32_OFFSET, &value::pack(123456.0, ValueType::UInt32));
        write_at(&mut region1, DYNAMIC_OFFSET, &value::pack(30.0, ValueType::Int32));

        write_at(
            &mut region2,
            PTR_TO_FLOAT_OFFSET,
            &(REGION1_BASE + FLOAT_OFFSET).to_le_bytes(),
        );
        write_at(&mut region2, PTR_SELF_OFFSET, &(REGION2_BASE + 0x100).to_le_bytes());

        Self {
            state: RefCell::new(MockState {
                region1,
                region2,
                dynamic_type: ValueType::Int32,
                dynamic_value: 30,
            }),
        }
    }

    /// Advances the dynamic value by [`DYNAMIC_STEP`], but only when `kind`
    /// matches the dynamic value's declared type. An unrelated dynamic scan
    /// (say, scanning for `float32`s) must not perturb an `int32` counter it
    /// never touched.
    pub fn advance_dynamic_value(&self, kind: ValueType) {
        let mut state = self.state.borrow_mut();
        if state.dynamic_type != kind {
            return;
        }
        state.dynamic_value += DYNAMIC_STEP;
        let packed = value::pack(state.dynamic_value as f64, state.dynamic_type);
        write_at(&mut state.region1, DYNAMIC_OFFSET, &packed);
    }

    fn region_for(&self, address: u64) -> Option<(u64, usize)> {
        if address >= REGION1_BASE && address < REGION1_BASE + REGION1_SIZE {
            Some((REGION1_BASE, 0))
        } else if address >= REGION2_BASE && address < REGION2_BASE + REGION2_SIZE {
            Some((REGION2_BASE, 1))
        } else {
            None
        }
    }
}

fn write_at(buffer: &mut [u8], offset: u64, bytes: &[u8]) {
    let start = offset as usize;
    buffer[start..start + bytes.len()].copy_from_slice(bytes);
}

impl MemoryBackend for MockBackend {
    fn pointer_size(&self) -> usize {
        8
    }

    fn enumerate_regions(&self) -> Result<Vec<MemoryRegion>> {
        Ok(vec![
            MemoryRegion {
                base_address: REGION1_BASE,
                size: REGION1_SIZE,
                protection: MemoryProtection::ReadWrite,
                state: MemoryState::Commit,
                region_type: MemoryType::Private,
                description: Some("mock-region-1".to_string()),
            },
            MemoryRegion {
                base_address: REGION2_BASE,
                size: REGION2_SIZE,
                protection: MemoryProtection::ReadWrite,
                state: MemoryState::Commit,
                region_type: MemoryType::Private,
                description: Some("mock-region-2".to_string()),
            },
        ])
    }

    fn read(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let (base, which) = self.region_for(address).ok_or(Error::OutOfBounds { address })?;
        let offset = (address - base) as usize;
        let state = self.state.borrow();
        let source = if which == 0 { &state.region1 } else { &state.region2 };
        let end = (offset + size).min(source.len());
        if offset >= source.len() {
            return Err(Error::OutOfBounds { address });
        }
        Ok(source[offset..end].to_vec())
    }

    fn write(&self, address: u64, bytes: &[u8]) -> Result<()> {
        let (base, which) = self.region_for(address).ok_or(Error::WriteFailed { address })?;
        let offset = (address - base) as usize;
        let mut state = self.state.borrow_mut();
        let target = if which == 0 {
            &mut state.region1
        } else {
            &mut state.region2
        };
        if offset + bytes.len() > target.len() {
            return Err(Error::WriteFailed { address });
        }
        target[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn close(&self) {}

    fn modules(&self) -> &[ModuleInfo] {
        &[]
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_float_reads_back() {
        let backend = MockBackend::new();
        let bytes = backend.read(REGION1_BASE + FLOAT_OFFSET, 4).unwrap();
        let value = value::unpack(&bytes, ValueType::Float32);
        assert!(value.approx_eq(value::unpack(&value::pack(3.14159, ValueType::Float32), ValueType::Float32)));
    }

    #[test]
    fn pointer_chain_resolves() {
        let backend = MockBackend::new();
        let bytes = backend.read(REGION2_BASE + PTR_TO_FLOAT_OFFSET, 8).unwrap();
        let target = u64::from_le_bytes(bytes.try_into().unwrap());
        assert_eq!(target, REGION1_BASE + FLOAT_OFFSET);
    }

    #[test]
    fn dynamic_value_advances_only_for_matching_type() {
        let backend = MockBackend::new();
        backend.advance_dynamic_value(ValueType::Float32);
        let bytes = backend.read(REGION1_BASE + DYNAMIC_OFFSET, 4).unwrap();
        assert_eq!(i32::from_le_bytes(bytes.try_into().unwrap()), 30);

        backend.advance_dynamic_value(ValueType::Int32);
        let bytes = backend.read(REGION1_BASE + DYNAMIC_OFFSET, 4).unwrap();
        assert_eq!(i32::from_le_bytes(bytes.try_into().unwrap()), 29);
    }

    #[test]
    fn write_then_read_round_trips() {
        let backend = MockBackend::new();
        backend.write(REGION1_BASE + UINT32_OFFSET, &value::pack(999.0, ValueType::UInt32)).unwrap();
        let bytes = backend.read(REGION1_BASE + UINT32_OFFSET, 4).unwrap();
        assert_eq!(u32::from_le_bytes(bytes.try_into().unwrap()), 999);
    }

    #[test]
    fn out_of_bounds_address_errors() {
        let backend = MockBackend::new();
        assert!(backend.read(0xDEAD_0000, 4).is_err());
    }
}
