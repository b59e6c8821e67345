//! Error types shared across the memory inspection engine.

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Error kinds produced by the core. Chunk-granularity read failures inside
/// the searcher, snapshot engine, and reference tracer are swallowed and
/// never surface as one of these; everything else bubbles up to the caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("platform does not support native memory inspection")]
    UnsupportedPlatform,

    #[error("access denied opening target process")]
    AccessDenied,

    #[error("address 0x{address:X} is outside any known region")]
    OutOfBounds { address: u64 },

    #[error("failed to read memory at 0x{address:X}")]
    ReadFailed { address: u64 },

    #[error("failed to write memory at 0x{address:X}")]
    WriteFailed { address: u64 },

    #[error("unsupported value type: {0}")]
    UnsupportedType(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("write rejected: no confirmation recorded for this session")]
    ConfirmationMissing,

    #[error("dynamic scan exhausted its step budget without a usable candidate set")]
    NoCandidates,
}
