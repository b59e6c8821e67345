//! Write & Enforcement: single/batch value writes with a confirmation gate,
//! verification read-back, a patch log line format, and a repeating
//! enforcement loop.

use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::backend::MemoryBackend;
use crate::error::{Error, Result};
use crate::timefmt;
use crate::value::{self, ValueType};

/// Literal phrase required before any non-dry-run write, kept as the CLI
/// collaborator's default prompt text. The core itself only checks a
/// boolean "consent recorded" flag so tests can set consent directly.
pub const CONFIRMATION_PHRASE: &str = "YES I OWN THIS COPY";

/// The outcome of one write attempt.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub address: u64,
    pub label: String,
    pub value: f64,
    pub value_type: ValueType,
    pub dry_run: bool,
    pub success: bool,
    pub verified: bool,
    pub error: Option<String>,
}

/// One line of the append-only patch log.
#[derive(Debug, Clone)]
pub struct PatchLogEntry {
    pub outcome: WriteOutcome,
    pub action: &'static str,
    pub reason: Option<&'static str>,
}

impl PatchLogEntry {
    /// Renders `key=value | key=value | ... | timestamp=...`, with the
    /// timestamp always appended last.
    pub fn to_log_line(&self) -> String {
        let outcome = &self.outcome;
        let parts = [
            format!("address={}", outcome.address),
            format!("label={}", outcome.label),
            format!("value={}", outcome.value),
            format!("value_type={}", outcome.value_type),
            format!("dry_run={}", outcome.dry_run),
            format!("success={}", outcome.success),
            format!("verified={}", outcome.verified),
            format!("error={}", outcome.error.as_deref().unwrap_or("None")),
            format!("action={}", self.action),
            format!("reason={}", self.reason.unwrap_or("None")),
            format!("timestamp={}", timefmt::now_iso8601_seconds()),
        ];
        parts.join(" | ")
    }
}

/// Whether a write has been consented to this session — carried as explicit
/// state, not a global.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteConsent {
    granted: bool,
}

impl WriteConsent {
    pub fn none() -> Self {
        Self { granted: false }
    }

    pub fn granted() -> Self {
        Self { granted: true }
    }

    /// Records consent after checking `phrase` against [`CONFIRMATION_PHRASE`].
    /// Returns whether consent was (now, or already) granted.
    pub fn try_confirm(&mut self, phrase: &str) -> bool {
        if self.granted {
            return true;
        }
        if phrase == CONFIRMATION_PHRASE {
            self.granted = true;
        }
        self.granted
    }

    pub fn is_granted(self) -> bool {
        self.granted
    }
}

/// Writes one value to one address.
///
/// `describe` labels the address (the Address Labeler); `dry_run` simulates
/// without touching memory; consent is required for any live (non-dry-run)
/// write and is checked via `consent.is_granted()` rather than prompting —
/// the CLI binary is responsible for populating `consent` before calling in.
pub fn write_value(
    backend: &dyn MemoryBackend,
    address: u64,
    value: f64,
    value_type: ValueType,
    describe: impl Fn(u64) -> String,
    dry_run: bool,
    consent: WriteConsent,
) -> WriteOutcome {
    let label = describe(address);
    let mut outcome = WriteOutcome {
        address,
        label: label.clone(),
        value,
        value_type,
        dry_run,
        success: false,
        verified: false,
        error: None,
    };

    if !dry_run && !consent.is_granted() {
        outcome.error = Some(Error::ConfirmationMissing.to_string());
        return outcome;
    }

    if dry_run {
        info!("[DRY RUN] would patch {label} -> {value} ({value_type})");
        outcome.success = true;
        return outcome;
    }

    let packed = value::pack(value, value_type);
    match backend.write(address, &packed) {
        Ok(()) => {
            outcome.success = true;
            match backend.read(address, value_type.size()) {
                Ok(bytes) => {
                    let readback = value::unpack(&bytes, value_type);
                    let target = value::unpack(&packed, value_type);
                    outcome.verified = readback.approx_eq(target);
                }
                Err(err) => {
                    warn!("write_value: verification read failed for {label}: {err}");
                }
            }
            info!("patched {label} -> {value} ({value_type}) | verified={}", outcome.verified);
        }
        Err(err) => {
            outcome.error = Some(err.to_string());
            warn!("patch failed for {label}: {err}");
        }
    }

    outcome
}

/// Applies `write_value` across every address in `addresses`, independently
/// — one failure does not abort the rest.
pub fn batch_write(
    backend: &dyn MemoryBackend,
    addresses: &[u64],
    value: f64,
    value_type: ValueType,
    describe: impl Fn(u64) -> String,
    dry_run: bool,
    consent: WriteConsent,
) -> Vec<WriteOutcome> {
    addresses
        .iter()
        .map(|&addr| write_value(backend, addr, value, value_type, &describe, dry_run, consent))
        .collect()
}

/// Precondition gate for autopatching: candidate count must be strictly
/// positive and within `auto_threshold` (threshold itself floored at 1).
pub fn should_auto_patch(candidate_count: usize, auto_threshold: u32) -> bool {
    let threshold = auto_threshold.max(1) as usize;
    candidate_count > 0 && candidate_count <= threshold
}

/// Runs `batch_write` repeatedly at `interval` until `keep_running` returns
/// `false`. `interval` is clamped to a 0.1s floor. Consent, once recorded,
/// is not re-prompted within the loop — the caller supplies an
/// already-resolved `consent`.
pub fn run_enforcement_loop(
    backend: &dyn MemoryBackend,
    addresses: &[u64],
    value: f64,
    value_type: ValueType,
    describe: impl Fn(u64) -> String,
    dry_run: bool,
    consent: WriteConsent,
    interval: Duration,
    mut keep_running: impl FnMut() -> bool,
    mut on_attempt: impl FnMut(&[WriteOutcome]),
) {
    let interval = interval.max(Duration::from_millis(100));
    info!("entering enforcement loop (interval={interval:?})");
    while keep_running() {
        let outcomes = batch_write(backend, addresses, value, value_type, &describe, dry_run, consent);
        on_attempt(&outcomes);
        thread::sleep(interval);
    }
    info!("enforcement loop stopped");
}
