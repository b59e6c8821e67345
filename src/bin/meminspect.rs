//! CLI glue binary: argument parsing, stdin-driven prompts, logging
//! initialization, and save/load. All actual memory inspection happens
//! through `meminspect`'s library API; this file never touches a
//! `MemoryBackend` method the library doesn't already expose.

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use clap::Parser;

use meminspect::backend::MemoryRegion;
use meminspect::candidate::Trend;
use meminspect::cli::CliArgs;
use meminspect::config::AddonConfig;
use meminspect::dynamic::{RegionNarrower, StepSignal, TrendObserver};
use meminspect::patch::{self, WriteConsent, CONFIRMATION_PHRASE};
use meminspect::session::{AddressRecord, ProcessDescriptor, ReferenceRecord, ScanMode, ScanResult, SignatureRecord};
use meminspect::value::ValueType;
use meminspect::{dynamic, search, signature, trace, ScanSession};

const LEGAL_BANNER: &str = "\
meminspect - offline process memory inspector.
For debugging and reverse engineering of software you own or are
authorized to test. Do not point this at processes you do not own.";

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let args = CliArgs::parse();
    init_logging();

    if let Some(load_path) = &args.load {
        return match load_and_display(load_path) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("error: {e}");
                1
            }
        };
    }

    println!("{LEGAL_BANNER}");

    if !args.mock && args.pid.is_none() {
        eprintln!("error: specify --pid <PID> or --mock");
        return 1;
    }

    let mut session = match build_session(&args) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    let regions = match session.enumerate_regions() {
        Ok(regions) => regions,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };
    log::info!("enumerated {} region(s)", regions.len());

    let (addresses, value, value_type, scan_mode, still_valid, current_values, dynamic_outcome) = if args.dynamic {
        match run_dynamic(&args, &session, regions.clone()) {
            Some(outcome) => {
                let current_values = outcome.values.iter().map(|&(_, v)| Some(v.as_f64())).collect();
                let still_valid = vec![None; outcome.addresses.len()];
                let dynamic_outcome = Some((outcome.values, outcome.value_type));
                (outcome.addresses, None, Some(outcome.value_type), ScanMode::Dynamic, still_valid, current_values, dynamic_outcome)
            }
            None => {
                println!("dynamic scan ended without a usable candidate set");
                (Vec::new(), None, None, ScanMode::Dynamic, Vec::new(), Vec::new(), None)
            }
        }
    } else {
        match run_manual(&args, &session, &regions) {
            Ok((addrs, val, ty, valid)) => {
                let current_values = vec![Some(val); addrs.len()];
                (addrs, Some(val), Some(ty), ScanMode::Manual, valid, current_values, None)
            }
            Err(e) => {
                eprintln!("error: {e}");
                return 1;
            }
        }
    };

    if addresses.is_empty() {
        println!("no addresses to report");
    } else {
        println!("{} address(es) found:", addresses.len());
        for (i, &addr) in addresses.iter().enumerate() {
            let valid_note = match still_valid.get(i).copied().flatten() {
                Some(true) => " [still valid]",
                Some(false) => " [no longer matches]",
                None => "",
            };
            println!("  {}{valid_note}", session.describe_address(addr));
        }
    }

    let references = match args.reference_depth {
        Some(depth) if depth > 0 && !addresses.is_empty() => {
            let chains = trace::trace_references(session.backend(), &regions, &addresses, depth);
            println!("{} pointer chain(s) found", chains.len());
            chains
                .into_iter()
                .map(|chain| ReferenceRecord {
                    chain: chain.into_iter().map(|a| session.describe_address(a)).collect(),
                })
                .collect()
        }
        _ => Vec::new(),
    };

    let signatures: Vec<SignatureRecord> = addresses
        .iter()
        .map(|&addr| {
            let sig = signature::generate_signature(session.backend(), addr, 32);
            SignatureRecord {
                address: sig.address,
                start: sig.start,
                pattern: sig.pattern,
                mask: sig.mask,
            }
        })
        .collect();

    if args.use_addon {
        run_addon_pipeline(&args, &mut session, &addresses, scan_mode, dynamic_outcome.as_ref());
    }

    let address_records: Vec<AddressRecord> = addresses
        .iter()
        .enumerate()
        .map(|(i, &addr)| AddressRecord {
            address: addr,
            label: session.describe_address(addr),
            still_valid: still_valid.get(i).copied().flatten(),
            current_value: current_values.get(i).copied().flatten(),
        })
        .collect();

    let result = ScanResult::new(
        ProcessDescriptor {
            pid: session.pid(),
            name: session.display_name().to_string(),
        },
        value,
        value_type,
        scan_mode,
        address_records,
        references,
        signatures,
    );

    if let Some(save_path) = &args.save {
        match result.to_json().and_then(|json| {
            std::fs::write(save_path, json).map_err(|e| meminspect::Error::InvalidInput(format!("cannot write {}: {e}", save_path.display())))
        }) {
            Ok(()) => println!("saved scan result to {}", save_path.display()),
            Err(e) => {
                eprintln!("error saving scan result: {e}");
                return 1;
            }
        }
    }

    0
}

fn init_logging() {
    use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
    let level = if cfg!(debug_assertions) { LevelFilter::Debug } else { LevelFilter::Info };
    let cfg = ConfigBuilder::new().set_time_format_rfc3339().build();
    match std::fs::File::create("meminspect.log") {
        Ok(file) => {
            let _ = WriteLogger::init(level, cfg, file);
            log::info!("logger initialized at level: {level:?}");
        }
        Err(e) => {
            let _ = WriteLogger::init(level, ConfigBuilder::new().build(), std::io::stderr());
            log::error!("failed to create meminspect.log: {e}");
        }
    }
}

fn build_session(args: &CliArgs) -> meminspect::Result<ScanSession> {
    if args.mock {
        Ok(ScanSession::mock())
    } else {
        let pid = args.pid.expect("checked by caller");
        ScanSession::native(pid, format!("pid-{pid}"))
    }
}

fn run_manual(
    args: &CliArgs,
    session: &ScanSession,
    regions: &[MemoryRegion],
) -> meminspect::Result<(Vec<u64>, f64, ValueType, Vec<Option<bool>>)> {
    let value = args.value.ok_or_else(|| meminspect::Error::InvalidInput("manual scan requires --value".to_string()))?;
    let value_type_token = args
        .value_type
        .as_deref()
        .ok_or_else(|| meminspect::Error::InvalidInput("manual scan requires --value-type".to_string()))?;
    let value_type = ValueType::parse(value_type_token)?;

    let addresses = search::search_values(session.backend(), regions, value, value_type);
    log::info!("manual search: {} match(es)", addresses.len());

    let still_valid = if args.allow_rescan && !addresses.is_empty() {
        let results = search::rescan(session.backend(), &addresses, value, value_type);
        results.into_iter().map(|(_, valid)| Some(valid)).collect()
    } else {
        vec![None; addresses.len()]
    };

    Ok((addresses, value, value_type, still_valid))
}

fn run_dynamic(args: &CliArgs, session: &ScanSession, regions: Vec<MemoryRegion>) -> Option<dynamic::DynamicScanOutcome> {
    let value_type_token = args.dynamic_type.as_deref()?;
    let value_type = ValueType::parse(value_type_token).ok()?;

    let mut observer = StdinTrendObserver { session, value_type };
    let mut narrower = StdinRegionNarrower;

    let outcome = dynamic::run_dynamic_scan(
        session.backend(),
        regions,
        value_type,
        args.chunk_size,
        args.max_steps,
        &mut observer,
        &mut narrower,
    );

    if outcome.is_empty() {
        None
    } else {
        Some(outcome)
    }
}

/// Advances the mock's scripted value (a no-op for native targets) and
/// prompts the operator for the observed trend over stdin.
struct StdinTrendObserver<'a> {
    session: &'a ScanSession,
    value_type: ValueType,
}

impl TrendObserver for StdinTrendObserver<'_> {
    fn await_step(&mut self, step: u32) -> StepSignal {
        let answer = prompt(&format!("step {step}: press Enter to take the next snapshot (q to quit): "));
        if answer.trim().eq_ignore_ascii_case("q") {
            return StepSignal::Quit;
        }
        self.session.advance_mock_dynamic(self.value_type);
        StepSignal::Ready
    }

    fn observe_trend(&mut self) -> Option<Trend> {
        loop {
            let answer = prompt("did the value increase, decrease, or stay the same? [i/d/s/q]: ");
            match answer.trim().to_ascii_lowercase().as_str() {
                "i" | "increase" | "increased" => return Some(Trend::Increased),
                "d" | "decrease" | "decreased" => return Some(Trend::Decreased),
                "s" | "same" | "unchanged" => return Some(Trend::Unchanged),
                "q" | "quit" => return None,
                _ => println!("please answer i, d, s, or q"),
            }
        }
    }
}

struct StdinRegionNarrower;

impl RegionNarrower for StdinRegionNarrower {
    fn should_narrow(&mut self, elapsed: Duration) -> bool {
        let answer = prompt(&format!("last snapshot took {:.1}s; narrow region window? [y/N]: ", elapsed.as_secs_f64()));
        answer.trim().eq_ignore_ascii_case("y")
    }

    fn narrow_bounds(&mut self) -> (u64, u64) {
        let start = prompt("start address (hex, no 0x prefix): ");
        let end = prompt("end address (hex, no 0x prefix): ");
        let start = u64::from_str_radix(start.trim(), 16).unwrap_or(0);
        let end = u64::from_str_radix(end.trim(), 16).unwrap_or(u64::MAX);
        (start, end)
    }
}

fn prompt(message: &str) -> String {
    print!("{message}");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().read_line(&mut line);
    line
}

/// Resolves the write/enforcement addon pipeline: dynamic-origin only,
/// candidate count within threshold, and a patch value+type available from
/// some source (explicit flag, addon config, or — absent either — the
/// dynamic scan's own first discovered value and value type).
fn run_addon_pipeline(
    args: &CliArgs,
    session: &mut ScanSession,
    addresses: &[u64],
    scan_mode: ScanMode,
    dynamic_outcome: Option<&(Vec<(u64, meminspect::Value)>, ValueType)>,
) {
    if scan_mode != ScanMode::Dynamic {
        println!("addon: skipped (manual scans yield a literal the user typed; enforcing it is a no-op)");
        return;
    }

    let config = match &args.addon_config {
        Some(path) => match AddonConfig::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("addon: failed to load config: {e}");
                return;
            }
        },
        None => AddonConfig::default(),
    };
    let log_path = config.log_path.clone();

    let patch_value = args
        .patch_value
        .or(config.patch_value)
        .or_else(|| dynamic_outcome.and_then(|(values, _)| values.first().map(|&(_, v)| v.as_f64())));
    let patch_type_token = args.patch_type.as_deref().or(config.patch_type.as_deref());
    let patch_type = match patch_type_token {
        Some(token) => match ValueType::parse(token) {
            Ok(ty) => Some(ty),
            Err(e) => {
                eprintln!("addon: skipped (invalid patch type: {e})");
                log_skip(&log_path, addresses, patch_value, None, "invalid_patch_type");
                return;
            }
        },
        None => dynamic_outcome.map(|(_, ty)| *ty),
    };

    let auto_threshold = args.auto_threshold.unwrap_or(config.auto_threshold);
    if !patch::should_auto_patch(addresses.len(), auto_threshold) {
        println!("addon: skipped (action=skip, reason=threshold, candidates={})", addresses.len());
        log_skip(&log_path, addresses, patch_value, patch_type, "threshold");
        return;
    }

    let patch_type = match patch_type {
        Some(ty) => ty,
        None => {
            eprintln!("addon: skipped (no patch type available)");
            log_skip(&log_path, addresses, patch_value, None, "no_patch_type");
            return;
        }
    };
    let patch_value = match patch_value {
        Some(v) => v,
        None => {
            eprintln!("addon: skipped (no patch value available)");
            log_skip(&log_path, addresses, None, Some(patch_type), "no_patch_value");
            return;
        }
    };

    let dry_run = args.resolve_dry_run(config.dry_run);
    if !dry_run {
        let phrase = prompt(&format!("type \"{CONFIRMATION_PHRASE}\" exactly to enable live writes: "));
        if !session.confirm_writes(phrase.trim()) {
            eprintln!("addon: skipped (action=skip, reason=confirmation_missing)");
            log_skip(&log_path, addresses, Some(patch_value), Some(patch_type), "confirmation_missing");
            return;
        }
    }
    let consent: WriteConsent = session.consent();

    let backend = session.backend();
    let describe = |addr: u64| meminspect::labeler::describe_address(addr, session.modules());
    let outcomes = patch::batch_write(backend, addresses, patch_value, patch_type, describe, dry_run, consent);

    for outcome in &outcomes {
        let entry = patch::PatchLogEntry {
            outcome: outcome.clone(),
            action: if dry_run { "dry_run" } else { "write" },
            reason: None,
        };
        let line = entry.to_log_line();
        println!("{line}");
        if let Some(path) = &log_path {
            append_log_line(path, &line);
        }
    }

    let interval = args.enforce_interval.unwrap_or(config.enforce_interval);
    if interval > 0.0 {
        println!("addon: entering enforcement loop (interval={interval}s); Ctrl+C to stop");
        let describe = |addr: u64| meminspect::labeler::describe_address(addr, session.modules());
        patch::run_enforcement_loop(
            backend,
            addresses,
            patch_value,
            patch_type,
            describe,
            dry_run,
            consent,
            Duration::from_secs_f64(interval),
            || true,
            |outcomes| {
                for outcome in outcomes {
                    let entry = patch::PatchLogEntry {
                        outcome: outcome.clone(),
                        action: if dry_run { "dry_run" } else { "write" },
                        reason: None,
                    };
                    println!("{}", entry.to_log_line());
                }
            },
        );
    }
}

fn append_log_line(path: &Path, line: &str) {
    use std::io::Write as _;
    if let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{line}");
    }
}

/// Persists one `action=skip` entry per address, the same way a completed
/// batch write persists one `action=write`/`dry_run` entry per address.
/// `value`/`value_type` are whatever was resolved before the skip occurred;
/// either may be unavailable, in which case a placeholder is recorded since
/// the line format has no field for "unknown".
fn log_skip(log_path: &Option<String>, addresses: &[u64], value: Option<f64>, value_type: Option<ValueType>, reason: &'static str) {
    let value_type = value_type.unwrap_or(ValueType::Int32);
    for &address in addresses {
        let outcome = patch::WriteOutcome {
            address,
            label: format!("0x{address:X}"),
            value: value.unwrap_or(0.0),
            value_type,
            dry_run: true,
            success: false,
            verified: false,
            error: None,
        };
        let entry = patch::PatchLogEntry {
            outcome,
            action: "skip",
            reason: Some(reason),
        };
        let line = entry.to_log_line();
        if let Some(path) = log_path {
            append_log_line(Path::new(path), &line);
        }
    }
}

fn load_and_display(path: &Path) -> meminspect::Result<()> {
    let text = std::fs::read_to_string(path).map_err(|e| meminspect::Error::InvalidInput(format!("cannot read {}: {e}", path.display())))?;
    let result = ScanResult::from_json(&text)?;
    println!("scan result for {} (pid {})", result.process.name, result.process.pid);
    println!("captured at {}", result.timestamp);
    println!("{} address(es), {} reference chain(s), {} signature(s)", result.addresses.len(), result.references.len(), result.signatures.len());
    for record in &result.addresses {
        println!("  {} ({})", record.label, record.address);
    }
    Ok(())
}
