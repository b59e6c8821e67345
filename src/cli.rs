//! CLI argument surface. This module owns argument parsing only — no I/O, no
//! core logic — the binary (`src/bin/meminspect.rs`) wires parsed args into
//! the library's collaborator traits.

use std::path::PathBuf;

use clap::Parser;

/// Offline process memory inspector: region enumeration, value search,
/// dynamic scanning, pointer tracing, and optional patch enforcement.
#[derive(Debug, Parser)]
#[command(name = "meminspect", version, about)]
pub struct CliArgs {
    /// Target process id to attach to.
    #[arg(long)]
    pub pid: Option<u32>,

    /// Use the in-memory Mock Backend instead of a real process.
    #[arg(long)]
    pub mock: bool,

    /// Numeric type for a manual search (int32, uint32, int64, uint64, float32, float64).
    #[arg(long = "value-type")]
    pub value_type: Option<String>,

    /// Literal value to search for (manual scan).
    #[arg(long)]
    pub value: Option<f64>,

    /// After a manual search, run one rescan pass with the same packed pattern.
    #[arg(long)]
    pub allow_rescan: bool,

    /// Run the dynamic snapshot/trend/filter scan instead of a manual search.
    #[arg(long)]
    pub dynamic: bool,

    /// Numeric type for a dynamic scan's snapshots.
    #[arg(long = "type")]
    pub dynamic_type: Option<String>,

    /// Maximum number of dynamic scan steps (0 = unbounded).
    #[arg(long, default_value_t = 10)]
    pub max_steps: u32,

    /// Chunk size in bytes for snapshot/search reads.
    #[arg(long, default_value_t = 16 * 1024)]
    pub chunk_size: usize,

    /// Maximum depth for pointer reference tracing. Omit to skip tracing.
    #[arg(long)]
    pub reference_depth: Option<u32>,

    /// Path to write the Scan Result JSON to.
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Path to load a previously saved Scan Result JSON from, for display only.
    #[arg(long)]
    pub load: Option<PathBuf>,

    /// Enable the write/enforcement addon pipeline.
    #[arg(long)]
    pub use_addon: bool,

    /// Explicit value to patch addresses to (overrides addon config).
    #[arg(long)]
    pub patch_value: Option<f64>,

    /// Explicit numeric type for the patch value (overrides addon config).
    #[arg(long)]
    pub patch_type: Option<String>,

    /// Upper bound on candidate count for which auto-writes are allowed (overrides addon config).
    #[arg(long)]
    pub auto_threshold: Option<u32>,

    /// Seconds between enforcement loop writes; 0 disables the loop (overrides addon config).
    #[arg(long)]
    pub enforce_interval: Option<f64>,

    /// Path to an Addon Configuration JSON file.
    #[arg(long)]
    pub addon_config: Option<PathBuf>,

    /// Force dry-run mode: log write intent without touching memory.
    #[arg(long, conflicts_with = "patch_live")]
    pub dry_run: bool,

    /// Force live writes (the mutually exclusive opposite of `--dry-run`).
    #[arg(long, conflicts_with = "dry_run")]
    pub patch_live: bool,
}

impl CliArgs {
    /// Resolves the effective dry-run mode: `--patch-live` forces `false`,
    /// `--dry-run` forces `true`, and absent either flag falls back to the
    /// addon config's default (or `true` if none is loaded).
    pub fn resolve_dry_run(&self, config_default: bool) -> bool {
        if self.patch_live {
            false
        } else if self.dry_run {
            true
        } else {
            config_default
        }
    }
}
