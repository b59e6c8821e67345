//! End-to-end scenarios run against the Mock Backend, checked against its
//! known fixed layout so each assertion can be verified against literal
//! addresses and values.

use meminspect::backend::mock::{self, MockBackend};
use meminspect::backend::MemoryBackend;
use meminspect::candidate::Trend;
use meminspect::dynamic::{self, RegionNarrower, StepSignal, TrendObserver};
use meminspect::value::{self, ValueType};
use meminspect::{patch, search, signature, trace};

/// A float32 `3.14159` at `region1 + 0x400` is the only hit when searching
/// float32 for that value.
#[test]
fn mock_exact_search_finds_the_single_known_address() {
    let backend = MockBackend::new();
    let regions = backend.enumerate_regions().unwrap();

    let hits = search::search_values(&backend, &regions, 3.14159, ValueType::Float32);

    assert_eq!(hits, vec![mock::REGION1_BASE + mock::FLOAT_OFFSET]);
    assert_eq!(mock::REGION1_BASE + mock::FLOAT_OFFSET, 0x1000_0400);
}

/// An int32 at `region1 + 0x900` starts at `30` and decays by `1` on every
/// step. Running a dynamic scan with `max_steps = 4`, observing `decrease`
/// every step, narrows to a small candidate set (<= 3) within at most 3
/// steps, and that set includes the decaying address.
#[test]
fn mock_dynamic_scan_narrows_to_decaying_candidate() {
    let backend = MockBackend::new();
    let regions = backend.enumerate_regions().unwrap();
    assert_eq!(mock::REGION1_BASE + mock::DYNAMIC_OFFSET, 0x1000_0900);

    struct AlwaysDecreasing<'a> {
        backend: &'a MockBackend,
        steps: u32,
    }
    impl TrendObserver for AlwaysDecreasing<'_> {
        fn await_step(&mut self, _step: u32) -> StepSignal {
            if self.steps == 0 {
                return StepSignal::Quit;
            }
            self.steps -= 1;
            self.backend.advance_dynamic_value(ValueType::Int32);
            StepSignal::Ready
        }
        fn observe_trend(&mut self) -> Option<Trend> {
            Some(Trend::Decreased)
        }
    }
    struct NeverNarrow;
    impl RegionNarrower for NeverNarrow {
        fn should_narrow(&mut self, _elapsed: std::time::Duration) -> bool {
            false
        }
        fn narrow_bounds(&mut self) -> (u64, u64) {
            (0, 0)
        }
    }

    let mut observer = AlwaysDecreasing { backend: &backend, steps: 4 };
    let mut narrower = NeverNarrow;

    let outcome = dynamic::run_dynamic_scan(&backend, regions, ValueType::Int32, 16384, 4, &mut observer, &mut narrower);

    assert!(outcome.steps_taken <= 3, "expected convergence within 3 steps, took {}", outcome.steps_taken);
    assert!(!outcome.addresses.is_empty());
    assert!(outcome.addresses.len() <= 3);
    assert!(outcome.addresses.contains(&(mock::REGION1_BASE + mock::DYNAMIC_OFFSET)));
}

/// region2 holds a uint64 pointer to region1's float32, and a second uint64
/// pointer to the first. Tracing from the float32's address at depth 2 finds
/// both the direct and indirect chains.
#[test]
fn pointer_chain_trace_finds_direct_and_indirect_chains() {
    let backend = MockBackend::new();
    let regions = backend.enumerate_regions().unwrap();

    let float_address = mock::REGION1_BASE + mock::FLOAT_OFFSET;
    let direct_pointer = mock::REGION2_BASE + mock::PTR_TO_FLOAT_OFFSET;
    let indirect_pointer = mock::REGION2_BASE + mock::PTR_SELF_OFFSET;

    assert_eq!(mock::REGION1_BASE, 0x1000_0000);
    assert_eq!(mock::REGION2_BASE, 0x2000_0000);
    assert_eq!(direct_pointer, 0x2000_0100);
    assert_eq!(indirect_pointer, 0x2000_0108);

    let chains = trace::trace_references(&backend, &regions, &[float_address], 2);

    assert!(chains.contains(&vec![direct_pointer, float_address]));
    assert!(chains.contains(&vec![indirect_pointer, direct_pointer, float_address]));
}

/// An 8-byte window centered on the float32's address clamps correctly and
/// yields an 8-byte hex pattern with an all-`x` mask.
#[test]
fn signature_window_around_known_float() {
    let backend = MockBackend::new();
    let address = mock::REGION1_BASE + mock::FLOAT_OFFSET;

    let sig = signature::generate_signature(&backend, address, 8);

    // start = address - window/2.
    assert_eq!(sig.start, address - 4);
    assert_eq!(sig.mask, "xxxxxxxx");
    assert_eq!(sig.pattern.split(' ').count(), 8);
    assert!(sig.pattern.chars().all(|c| c.is_ascii_hexdigit() || c == ' '));
}

/// After a search returns multiple addresses holding the same value,
/// mutating one so it no longer matches leaves exactly that address
/// `still_valid = false` on rescan; all others remain `true`.
#[test]
fn rescan_flags_only_the_mutated_address() {
    let backend = MockBackend::new();

    // Plant a second uint32 `123456` at a free offset in region1, alongside
    // the mock's existing static one, so the search returns more than one hit.
    let second_offset = 0xC00u64;
    backend
        .write(mock::REGION1_BASE + second_offset, &value::pack(123456.0, ValueType::UInt32))
        .unwrap();

    let regions = backend.enumerate_regions().unwrap();
    let hits = search::search_values(&backend, &regions, 123456.0, ValueType::UInt32);
    assert_eq!(hits.len(), 2);

    let mutated = mock::REGION1_BASE + second_offset;
    backend.write(mutated, &value::pack(1.0, ValueType::UInt32)).unwrap();

    let results = search::rescan(&backend, &hits, 123456.0, ValueType::UInt32);
    for (addr, valid) in results {
        if addr == mutated {
            assert!(!valid, "mutated address should no longer match");
        } else {
            assert!(valid, "untouched address should still match");
        }
    }
}

/// With `auto_threshold = 3` and 5 candidates, the precondition gate rejects
/// the batch entirely — no writes happen and memory is unchanged.
#[test]
fn write_gate_rejects_oversized_candidate_set_and_leaves_memory_untouched() {
    let backend = MockBackend::new();
    let addr = mock::REGION1_BASE + mock::UINT32_OFFSET;
    let before = backend.read(addr, 4).unwrap();

    let candidate_count = 5;
    let auto_threshold = 3;
    assert!(!patch::should_auto_patch(candidate_count, auto_threshold));

    // The gate is checked by the caller before any write is issued; since it
    // fails here, `batch_write` is never invoked and memory must be unchanged.
    let after = backend.read(addr, 4).unwrap();
    assert_eq!(before, after);
}
