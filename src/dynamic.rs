//! Dynamic Scan Controller: orchestrates the snapshot/trend/filter loop
//! until candidates collapse to a small set or the step budget runs out.
//!
//! Interactive prompts are modeled as collaborator traits the caller
//! implements (stdin for the CLI binary, scripted answers for tests) so the
//! controller itself never blocks on terminal I/O.

use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::backend::{MemoryBackend, MemoryRegion, RegionFilter};
use crate::candidate::{self, Trend};
use crate::snapshot::{self, Snapshot};
use crate::value::{Value, ValueType};

/// Snapshot duration at or above which the controller offers to narrow the
/// region set.
pub const SNAPSHOT_WARN: Duration = Duration::from_secs(6);

/// Whether the operator is ready for the next snapshot step, or wants to
/// stop the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepSignal {
    Ready,
    Quit,
}

/// Collaborator that advances the session between scan steps and supplies
/// the observed trend. The CLI binary implements this over stdin; tests
/// implement it over a scripted sequence of answers.
pub trait TrendObserver {
    /// Called once per step before the next snapshot is taken.
    fn await_step(&mut self, step: u32) -> StepSignal;

    /// Called once candidates or comparisons are available; asks how the
    /// watched value moved. Returning `None` quits the loop.
    fn observe_trend(&mut self) -> Option<Trend>;
}

/// Collaborator consulted when a snapshot pass is slow, to optionally
/// narrow the region set by address window.
pub trait RegionNarrower {
    /// Asked whether to narrow regions after a slow snapshot pass.
    fn should_narrow(&mut self, elapsed: Duration) -> bool;

    /// Supplies the new `[start, end)` bounds to narrow to.
    fn narrow_bounds(&mut self) -> (u64, u64);
}

/// Final outcome of a dynamic scan run.
#[derive(Debug, Clone)]
pub struct DynamicScanOutcome {
    pub addresses: Vec<u64>,
    pub values: Vec<(u64, Value)>,
    pub value_type: ValueType,
    pub regions: Vec<MemoryRegion>,
    pub steps_taken: u32,
}

impl DynamicScanOutcome {
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Converts to a `Result`, surfacing `Error::NoCandidates` when the run
    /// exhausted its step budget (or was quit) without a usable candidate
    /// set. Callers that want the dynamic scan to behave like any other
    /// fallible operation (e.g. before persisting a Scan Result) use this
    /// instead of checking `is_empty` by hand.
    pub fn into_result(self) -> crate::error::Result<Self> {
        if self.is_empty() {
            Err(crate::error::Error::NoCandidates)
        } else {
            Ok(self)
        }
    }
}

/// Runs the dynamic scan loop: alternating snapshots with trend prompts,
/// filtering the candidate set each round until it collapses to a handful
/// of addresses or the step budget runs out.
///
/// `max_steps == 0` means unbounded.
pub fn run_dynamic_scan<O, N>(
    backend: &dyn MemoryBackend,
    mut regions: Vec<MemoryRegion>,
    value_type: ValueType,
    chunk_size: usize,
    max_steps: u32,
    observer: &mut O,
    narrower: &mut N,
) -> DynamicScanOutcome
where
    O: TrendObserver,
    N: RegionNarrower,
{
    info!("dynamic scan: baseline snapshot over {} region(s)", regions.len());
    let mut previous = snapshot::take_snapshot(backend, &regions, value_type, chunk_size);
    let mut candidates: Option<Snapshot> = None;
    let mut step = 0u32;

    loop {
        if max_steps != 0 && step >= max_steps {
            info!("dynamic scan: reached max_steps ({max_steps})");
            candidates = None;
            break;
        }
        step += 1;
        debug!("dynamic scan: step {step}");

        match observer.await_step(step) {
            StepSignal::Quit => {
                candidates = None;
                break;
            }
            StepSignal::Ready => {}
        }

        let started = Instant::now();
        let mut current = snapshot::take_snapshot(backend, &regions, value_type, chunk_size);
        let elapsed = started.elapsed();

        if elapsed >= SNAPSHOT_WARN && narrower.should_narrow(elapsed) {
            let (start, end) = narrower.narrow_bounds();
            let filter = RegionFilter::new().with_address_window(start, end);
            regions = filter.apply(&regions);
            previous = snapshot::filter_snapshot_by_regions(&previous, &regions);
            current = snapshot::filter_snapshot_by_regions(&current, &regions);
            info!("dynamic scan: narrowed to {} region(s)", regions.len());
        }

        let comparisons = match &candidates {
            None => candidate::compare_snapshots(&previous, &current),
            Some(existing) => existing
                .iter()
                .filter_map(|(&addr, &old_value)| current.get(&addr).map(|&new_value| (addr, (old_value, new_value))))
                .collect(),
        };

        if comparisons.is_empty() {
            debug!("dynamic scan: no comparable addresses this step");
            previous = current;
            continue;
        }

        let trend = match observer.observe_trend() {
            None => {
                candidates = None;
                break;
            }
            Some(trend) => trend,
        };

        let filtered = candidate::filter_candidates(&comparisons, trend);
        let count = filtered.len();
        info!("dynamic scan: {count} candidate(s) remain after filtering");

        if count > 0 && count <= 3 {
            candidates = Some(filtered);
            break;
        }
        if count == 0 {
            debug!("dynamic scan: trend eliminated all candidates, restarting from current snapshot");
            candidates = None;
            previous = current;
            continue;
        }

        candidates = Some(filtered);
        previous = current;
    }

    let mut values: Vec<(u64, Value)> = candidates.unwrap_or_default().into_iter().collect();
    values.sort_by_key(|(addr, _)| *addr);
    let addresses = values.iter().map(|(addr, _)| *addr).collect();

    if step == 0 {
        warn!("dynamic scan: no steps were taken");
    }

    DynamicScanOutcome {
        addresses,
        values,
        value_type,
        regions,
        steps_taken: step,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;

    struct ScriptedObserver {
        steps_remaining: u32,
        trend: Trend,
    }

    impl TrendObserver for ScriptedObserver {
        fn await_step(&mut self, _step: u32) -> StepSignal {
            if self.steps_remaining == 0 {
                StepSignal::Quit
            } else {
                self.steps_remaining -= 1;
                StepSignal::Ready
            }
        }

        fn observe_trend(&mut self) -> Option<Trend> {
            Some(self.trend)
        }
    }

    struct NeverNarrow;
    impl RegionNarrower for NeverNarrow {
        fn should_narrow(&mut self, _elapsed: Duration) -> bool {
            false
        }
        fn narrow_bounds(&mut self) -> (u64, u64) {
            (0, 0)
        }
    }

    #[test]
    fn mock_dynamic_scan_narrows_to_decaying_value() {
        let backend = MockBackend::new();
        let regions = backend.enumerate_regions().unwrap();
        let mut observer = ScriptedObserver {
            steps_remaining: 4,
            trend: Trend::Decreased,
        };
        let mut narrower = NeverNarrow;

        // Drive the mock's decay manually between snapshot steps, exactly
        // as the CLI binary would via the backend handle it owns.
        let outcome = run_dynamic_scan_with_advance(
            &backend,
            regions,
            ValueType::Int32,
            16384,
            4,
            &mut observer,
            &mut narrower,
        );

        assert!(outcome.steps_taken <= 3);
        assert!(outcome.addresses.len() <= 3);
        assert!(outcome
            .addresses
            .contains(&(crate::backend::mock::REGION1_BASE + crate::backend::mock::DYNAMIC_OFFSET)));
    }

    /// Test-only wrapper that advances the mock's dynamic value before each
    /// snapshot, standing in for the CLI binary's `advance_mock_dynamic_value`
    /// call between steps.
    fn run_dynamic_scan_with_advance<O, N>(
        backend: &MockBackend,
        regions: Vec<MemoryRegion>,
        value_type: ValueType,
        chunk_size: usize,
        max_steps: u32,
        observer: &mut O,
        narrower: &mut N,
    ) -> DynamicScanOutcome
    where
        O: TrendObserver,
        N: RegionNarrower,
    {
        struct AdvancingObserver<'a, 'o, O> {
            backend: &'a MockBackend,
            value_type: ValueType,
            inner: &'o mut O,
        }
        impl<'a, 'o, O: TrendObserver> TrendObserver for AdvancingObserver<'a, 'o, O> {
            fn await_step(&mut self, step: u32) -> StepSignal {
                let signal = self.inner.await_step(step);
                if signal == StepSignal::Ready {
                    self.backend.advance_dynamic_value(self.value_type);
                }
                signal
            }
            fn observe_trend(&mut self) -> Option<Trend> {
                self.inner.observe_trend()
            }
        }

        let mut advancing = AdvancingObserver {
            backend,
            value_type,
            inner: observer,
        };
        run_dynamic_scan(backend, regions, value_type, chunk_size, max_steps, &mut advancing, narrower)
    }

    #[test]
    fn quitting_immediately_yields_empty_outcome() {
        let backend = MockBackend::new();
        let regions = backend.enumerate_regions().unwrap();
        let mut observer = ScriptedObserver {
            steps_remaining: 0,
            trend: Trend::Decreased,
        };
        let mut narrower = NeverNarrow;
        let outcome = run_dynamic_scan(&backend, regions, ValueType::Int32, 16384, 4, &mut observer, &mut narrower);
        assert!(outcome.is_empty());
        assert!(matches!(outcome.into_result(), Err(crate::error::Error::NoCandidates)));
    }
}
