//! `ScanSession`, the per-session handle to a target process, and the Scan
//! Result wire shapes it produces.

use serde::{Deserialize, Serialize};

use crate::backend::mock::MockBackend;
use crate::backend::{MemoryBackend, MemoryRegion, ModuleInfo};
#[cfg(windows)]
use crate::backend::windows::WindowsBackend;
use crate::error::{Error, Result};
use crate::labeler;
use crate::patch::WriteConsent;
use crate::timefmt;
use crate::value::ValueType;

/// The per-session handle to a target: owns the backend (native or mock),
/// process identity, pointer width, and the write-consent flag.
pub struct ScanSession {
    backend: Box<dyn MemoryBackend>,
    pid: u32,
    display_name: String,
    consent: WriteConsent,
}

impl ScanSession {
    /// Opens a native session against a running process. Windows-only; on any
    /// other platform this always fails with `UnsupportedPlatform`.
    #[cfg(windows)]
    pub fn native(pid: u32, display_name: impl Into<String>) -> Result<Self> {
        let backend = WindowsBackend::open(pid)?;
        Ok(Self {
            backend: Box::new(backend),
            pid,
            display_name: display_name.into(),
            consent: WriteConsent::none(),
        })
    }

    #[cfg(not(windows))]
    pub fn native(_pid: u32, _display_name: impl Into<String>) -> Result<Self> {
        Err(Error::UnsupportedPlatform)
    }

    /// Builds a session over the Mock Backend's fixed demo layout, for tests
    /// and offline demos. The literal `9999`/`"mock-process"` identity makes
    /// a saved Scan Result JSON from a mock run recognizable as such.
    pub fn mock() -> Self {
        Self {
            backend: Box::new(MockBackend::new()),
            pid: 9999,
            display_name: "mock-process".to_string(),
            consent: WriteConsent::none(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn pointer_size(&self) -> usize {
        self.backend.pointer_size()
    }

    pub fn backend(&self) -> &dyn MemoryBackend {
        self.backend.as_ref()
    }

    pub fn modules(&self) -> &[ModuleInfo] {
        self.backend.modules()
    }

    pub fn enumerate_regions(&self) -> Result<Vec<MemoryRegion>> {
        self.backend.enumerate_regions()
    }

    /// Renders `address` via the Address Labeler against this session's
    /// module list.
    pub fn describe_address(&self, address: u64) -> String {
        labeler::describe_address(address, self.modules())
    }

    pub fn consent(&self) -> WriteConsent {
        self.consent
    }

    /// Records consent for this session if `phrase` matches the confirmation
    /// phrase. Modelled as session state, not a global.
    pub fn confirm_writes(&mut self, phrase: &str) -> bool {
        self.consent.try_confirm(phrase)
    }

    pub fn grant_consent(&mut self) {
        self.consent = WriteConsent::granted();
    }

    /// Advances the Mock Backend's scripted dynamic value, if this session is
    /// backed by one; a no-op on native sessions. The CLI binary calls this
    /// between dynamic scan steps to drive the mock demo the same way a real
    /// process's own activity would change memory between snapshots.
    pub fn advance_mock_dynamic(&self, value_type: ValueType) {
        if let Some(mock) = self.backend.as_any().downcast_ref::<MockBackend>() {
            mock.advance_dynamic_value(value_type);
        }
    }

    pub fn process(&self) -> ProcessDescriptor {
        ProcessDescriptor {
            pid: self.pid,
            name: self.display_name.clone(),
        }
    }
}

/// `"manual"` or `"dynamic"`, the Scan Result's `scan_mode` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Manual,
    Dynamic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDescriptor {
    pub pid: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressRecord {
    pub address: u64,
    pub label: String,
    pub still_valid: Option<bool>,
    pub current_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub chain: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub address: u64,
    pub start: u64,
    pub pattern: String,
    pub mask: String,
}

/// Session output: the Scan Result JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub process: ProcessDescriptor,
    pub timestamp: String,
    pub value: Option<f64>,
    pub value_type: Option<String>,
    pub scan_mode: ScanMode,
    pub addresses: Vec<AddressRecord>,
    pub references: Vec<ReferenceRecord>,
    pub signatures: Vec<SignatureRecord>,
}

impl ScanResult {
    /// Builds a result stamped with the current time.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        process: ProcessDescriptor,
        value: Option<f64>,
        value_type: Option<ValueType>,
        scan_mode: ScanMode,
        addresses: Vec<AddressRecord>,
        references: Vec<ReferenceRecord>,
        signatures: Vec<SignatureRecord>,
    ) -> Self {
        Self {
            process,
            timestamp: timefmt::now_iso8601_z(),
            value,
            value_type: value_type.map(|t| t.token().to_string()),
            scan_mode,
            addresses,
            references,
            signatures,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidInput(format!("cannot serialize scan result: {e}")))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::InvalidInput(format!("malformed scan result: {e}")))
    }
}
