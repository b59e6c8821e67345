//! Candidate Filter: differential comparison between two snapshots and
//! trend-based narrowing.

use std::collections::HashMap;

use crate::snapshot::Snapshot;
use crate::value::Value;

/// The direction a user observed the target value move in, between two
/// snapshot steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Increased,
    Decreased,
    Unchanged,
}

/// Addresses present in both snapshots, paired with their (old, new) values.
/// Iterates the smaller of the two maps — meaningless for correctness, just
/// avoids iterating the larger map when membership-testing the smaller one
/// would do.
pub fn compare_snapshots(previous: &Snapshot, current: &Snapshot) -> HashMap<u64, (Value, Value)> {
    let mut comparisons = HashMap::new();
    if previous.len() <= current.len() {
        for (&addr, &old_value) in previous {
            if let Some(&new_value) = current.get(&addr) {
                comparisons.insert(addr, (old_value, new_value));
            }
        }
    } else {
        for (&addr, &new_value) in current {
            if let Some(&old_value) = previous.get(&addr) {
                comparisons.insert(addr, (old_value, new_value));
            }
        }
    }
    comparisons
}

/// Keeps only the addresses whose (old, new) pair satisfies `trend`, mapping
/// surviving addresses to their new value.
pub fn filter_candidates(comparisons: &HashMap<u64, (Value, Value)>, trend: Trend) -> HashMap<u64, Value> {
    comparisons
        .iter()
        .filter_map(|(&addr, &(old_value, new_value))| {
            let keeps = match trend {
                Trend::Increased => new_value.gt(old_value),
                Trend::Decreased => new_value.lt(old_value),
                Trend::Unchanged => new_value.approx_eq(old_value),
            };
            keeps.then_some((addr, new_value))
        })
        .collect()
}
