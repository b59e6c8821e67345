//! Offline inspector for the address space of a running process: region
//! enumeration, value search, snapshot-and-differential dynamic scanning,
//! pointer-reference tracing, byte-signature extraction, and optional
//! write/enforcement.
//!
//! The core never prompts, parses arguments, or touches a terminal — see
//! [`dynamic::TrendObserver`] and [`dynamic::RegionNarrower`] for the
//! collaborator traits a caller (the `meminspect` binary, or a test) must
//! supply. [`backend::mock::MockBackend`] exercises the whole pipeline
//! without a real target process.
//!
//! ```no_run
//! use meminspect::session::ScanSession;
//! use meminspect::value::ValueType;
//! use meminspect::search::search_values;
//!
//! let session = ScanSession::mock();
//! let regions = session.enumerate_regions().unwrap();
//! let hits = search_values(session.backend(), &regions, 3.14159, ValueType::Float32);
//! assert!(!hits.is_empty());
//! ```

pub mod backend;
pub mod candidate;
pub mod cli;
pub mod config;
pub mod dynamic;
pub mod error;
pub mod labeler;
pub mod patch;
pub mod search;
pub mod session;
pub mod signature;
pub mod snapshot;
pub mod timefmt;
pub mod trace;
pub mod value;

pub use crate::error::{Error, Result};
pub use crate::session::{ScanMode, ScanResult, ScanSession};
pub use crate::value::{Value, ValueType};
