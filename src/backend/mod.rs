//! Platform Memory Access: region enumeration, chunked reads/writes, and the
//! trait both the native backend and the Mock Backend implement.

pub mod mock;
#[cfg(windows)]
pub mod windows;

use crate::error::Result;

/// A committed, readable extent of the target's virtual address space.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    pub base_address: u64,
    pub size: u64,
    pub protection: MemoryProtection,
    pub state: MemoryState,
    pub region_type: MemoryType,
    pub description: Option<String>,
}

impl MemoryRegion {
    pub fn end_address(&self) -> u64 {
        self.base_address + self.size
    }

    pub fn contains_address(&self, address: u64) -> bool {
        address >= self.base_address && address < self.end_address()
    }

    pub fn is_readable(&self) -> bool {
        matches!(
            self.protection,
            MemoryProtection::ReadOnly
                | MemoryProtection::ReadWrite
                | MemoryProtection::ExecuteRead
                | MemoryProtection::ExecuteReadWrite
                | MemoryProtection::WriteCopy
                | MemoryProtection::ExecuteWriteCopy
        )
    }

    pub fn is_writable(&self) -> bool {
        matches!(
            self.protection,
            MemoryProtection::ReadWrite
                | MemoryProtection::ExecuteReadWrite
                | MemoryProtection::WriteCopy
                | MemoryProtection::ExecuteWriteCopy
        )
    }
}

/// Protection flags, collapsed from the platform's raw page-protection bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryProtection {
    NoAccess,
    ReadOnly,
    ReadWrite,
    WriteCopy,
    Execute,
    ExecuteRead,
    ExecuteReadWrite,
    ExecuteWriteCopy,
}

/// Commit state of a region. Only `Commit` regions are ever returned by
/// `enumerate_regions` — `Free`/`Reserve` pages are filtered out before the
/// caller ever sees them, but the tag is kept on the type for completeness
/// and for tests that construct regions directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryState {
    Commit,
    Free,
    Reserve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryType {
    Image,
    Mapped,
    Private,
}

/// A loaded module (image), used only by the Address Labeler.
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub path: String,
    pub base_address: u64,
    pub size: u64,
}

/// Default chunk size for streamed reads (Value Searcher, Snapshot Engine,
/// Reference Tracer): 16 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// The contract region enumeration, reads, and writes are served through,
/// implemented by both the native backend and the Mock Backend.
pub trait MemoryBackend {
    /// Pointer width of the target, in bytes (4 or 8).
    fn pointer_size(&self) -> usize;

    /// Walks the address space from zero upward, returning every committed,
    /// non-guard, readable region.
    fn enumerate_regions(&self) -> Result<Vec<MemoryRegion>>;

    /// Reads up to `size` bytes starting at `address`. May return fewer
    /// bytes than requested if the platform reports a partial read; never
    /// returns more.
    fn read(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    /// Writes `bytes` starting at `address`. Partial writes are reported as
    /// `Error::WriteFailed`.
    fn write(&self, address: u64, bytes: &[u8]) -> Result<()>;

    /// Releases any native resources. Idempotent.
    fn close(&self);

    /// Loaded modules, sorted by base address. Empty for backends (like the
    /// Mock Backend) that don't model modules.
    fn modules(&self) -> &[ModuleInfo];

    /// Downcast hook so callers can reach backend-specific helpers (namely
    /// `MockBackend::advance_dynamic_value`) without the trait itself naming
    /// the mock. Real-target backends never need downcasting in practice.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Criteria for narrowing a region list, used by the Dynamic Scan
/// Controller's region-reduction step and reusable for ad-hoc filtering
/// elsewhere.
#[derive(Debug, Clone, Default)]
pub struct RegionFilter {
    pub min_size: Option<u64>,
    pub address_window: Option<(u64, u64)>,
    pub require_readable: bool,
    pub require_writable: bool,
}

impl RegionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_size(mut self, size: u64) -> Self {
        self.min_size = Some(size);
        self
    }

    /// Restricts to regions overlapping `[start, end)`.
    pub fn with_address_window(mut self, start: u64, end: u64) -> Self {
        self.address_window = Some((start, end));
        self
    }

    pub fn require_readable(mut self) -> Self {
        self.require_readable = true;
        self
    }

    pub fn require_writable(mut self) -> Self {
        self.require_writable = true;
        self
    }

    pub fn matches(&self, region: &MemoryRegion) -> bool {
        if let Some(min_size) = self.min_size {
            if region.size < min_size {
                return false;
            }
        }
        if let Some((start, end)) = self.address_window {
            if region.end_address() <= start || region.base_address >= end {
                return false;
            }
        }
        if self.require_readable && !region.is_readable() {
            return false;
        }
        if self.require_writable && !region.is_writable() {
            return false;
        }
        true
    }

    pub fn apply(&self, regions: &[MemoryRegion]) -> Vec<MemoryRegion> {
        regions.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(base: u64, size: u64) -> MemoryRegion {
        MemoryRegion {
            base_address: base,
            size,
            protection: MemoryProtection::ReadWrite,
            state: MemoryState::Commit,
            region_type: MemoryType::Private,
            description: None,
        }
    }

    #[test]
    fn region_contains_address() {
        let r = region(0x1000, 0x1000);
        assert!(r.contains_address(0x1500));
        assert!(!r.contains_address(0x2000));
        assert_eq!(r.end_address(), 0x2000);
    }

    #[test]
    fn address_window_filter_keeps_overlap() {
        let regions = vec![region(0x1000, 0x1000), region(0x5000, 0x1000)];
        let filter = RegionFilter::new().with_address_window(0x1800, 0x5800);
        let kept = filter.apply(&regions);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn address_window_filter_drops_disjoint() {
        let regions = vec![region(0x1000, 0x1000)];
        let filter = RegionFilter::new().with_address_window(0x5000, 0x6000);
        assert!(filter.apply(&regions).is_empty());
    }
}
