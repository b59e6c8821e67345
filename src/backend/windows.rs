//! Native Win32 memory backend: `VirtualQueryEx`-driven region walking,
//! `ReadProcessMemory`/`WriteProcessMemory` for I/O, and the
//! `MemoryProtection`/`MemoryState` `From<u32>` conversions.

use std::ptr::null_mut;

use windows::Win32::Foundation::{CloseHandle, HANDLE, HMODULE, INVALID_HANDLE_VALUE};
use windows::Win32::System::Diagnostics::Debug::{ReadProcessMemory, WriteProcessMemory};
use windows::Win32::System::Memory::{
    MEM_COMMIT, MEM_FREE, MEM_RESERVE, MEMORY_BASIC_INFORMATION, PAGE_EXECUTE, PAGE_EXECUTE_READ,
    PAGE_EXECUTE_READWRITE, PAGE_EXECUTE_WRITECOPY, PAGE_NOACCESS, PAGE_PROTECTION_FLAGS,
    PAGE_READONLY, PAGE_READWRITE, PAGE_TYPE, PAGE_WRITECOPY, VIRTUAL_ALLOCATION_TYPE,
    VirtualQueryEx,
};
use windows::Win32::System::ProcessStatus::{
    EnumProcessModules, GetModuleFileNameExW, GetModuleInformation, MODULEINFO,
};
use windows::Win32::System::Threading::{OpenProcess, PROCESS_ALL_ACCESS};

use crate::backend::{
    MemoryBackend, MemoryProtection, MemoryRegion, MemoryState, MemoryType, ModuleInfo,
};
use crate::error::{Error, Result};

impl From<PAGE_PROTECTION_FLAGS> for MemoryProtection {
    fn from(protection: PAGE_PROTECTION_FLAGS) -> Self {
        match protection.0 {
            x if x == PAGE_NOACCESS.0 => MemoryProtection::NoAccess,
            x if x == PAGE_READONLY.0 => MemoryProtection::ReadOnly,
            x if x == PAGE_READWRITE.0 => MemoryProtection::ReadWrite,
            x if x == PAGE_WRITECOPY.0 => MemoryProtection::WriteCopy,
            x if x == PAGE_EXECUTE.0 => MemoryProtection::Execute,
            x if x == PAGE_EXECUTE_READ.0 => MemoryProtection::ExecuteRead,
            x if x == PAGE_EXECUTE_READWRITE.0 => MemoryProtection::ExecuteReadWrite,
            x if x == PAGE_EXECUTE_WRITECOPY.0 => MemoryProtection::ExecuteWriteCopy,
            _ => MemoryProtection::NoAccess,
        }
    }
}

impl From<VIRTUAL_ALLOCATION_TYPE> for MemoryState {
    fn from(state: VIRTUAL_ALLOCATION_TYPE) -> Self {
        match state {
            x if x.0 == MEM_COMMIT.0 => MemoryState::Commit,
            x if x.0 == MEM_FREE.0 => MemoryState::Free,
            x if x.0 == MEM_RESERVE.0 => MemoryState::Reserve,
            _ => MemoryState::Free,
        }
    }
}

fn region_type(_ty: PAGE_TYPE) -> MemoryType {
    // MEM_IMAGE/MEM_MAPPED/MEM_PRIVATE distinctions aren't load-bearing for
    // any operation in this crate; callers only consult protection/state.
    MemoryType::Private
}

/// Native handle to a target process, opened with full access.
pub struct WindowsBackend {
    handle: HANDLE,
    pointer_size: usize,
    modules: Vec<ModuleInfo>,
}

impl WindowsBackend {
    pub fn open(pid: u32) -> Result<Self> {
        let handle = unsafe { OpenProcess(PROCESS_ALL_ACCESS, false, pid) }
            .map_err(|_| Error::AccessDenied)?;
        if handle == INVALID_HANDLE_VALUE || handle.is_invalid() {
            return Err(Error::AccessDenied);
        }
        let modules = enumerate_modules(handle).unwrap_or_default();
        Ok(Self {
            handle,
            pointer_size: std::mem::size_of::<usize>(),
            modules,
        })
    }
}

impl Drop for WindowsBackend {
    fn drop(&mut self) {
        self.close();
    }
}

impl MemoryBackend for WindowsBackend {
    fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    fn enumerate_regions(&self) -> Result<Vec<MemoryRegion>> {
        let mut regions = Vec::new();
        let mut address: u64 = 0;
        let max_address = match self.pointer_size {
            4 => u32::MAX as u64,
            _ => u64::MAX,
        };

        loop {
            let mut mbi = MEMORY_BASIC_INFORMATION {
                BaseAddress: null_mut(),
                AllocationBase: null_mut(),
                AllocationProtect: PAGE_PROTECTION_FLAGS(0),
                PartitionId: 0,
                RegionSize: 0,
                State: VIRTUAL_ALLOCATION_TYPE(0),
                Protect: PAGE_PROTECTION_FLAGS(0),
                Type: PAGE_TYPE(0),
            };

            let written = unsafe {
                VirtualQueryEx(
                    self.handle,
                    Some(address as *const _),
                    &mut mbi,
                    std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
                )
            };
            if written == 0 {
                break;
            }

            let base = mbi.BaseAddress as u64;
            let size = mbi.RegionSize as u64;

            if mbi.State == MEM_COMMIT {
                let protection = MemoryProtection::from(mbi.Protect);
                let guarded = mbi.Protect.0 & 0x100 != 0; // PAGE_GUARD
                if !guarded && protection != MemoryProtection::NoAccess {
                    regions.push(MemoryRegion {
                        base_address: base,
                        size,
                        protection,
                        state: MemoryState::from(mbi.State),
                        region_type: region_type(mbi.Type),
                        description: None,
                    });
                }
            }

            let next = base.saturating_add(size.max(1));
            if next <= address || next > max_address {
                break;
            }
            address = next;
        }

        Ok(regions)
    }

    fn read(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        let mut bytes_read = 0usize;
        let ok = unsafe {
            ReadProcessMemory(
                self.handle,
                address as *const _,
                buffer.as_mut_ptr() as *mut _,
                size,
                Some(&mut bytes_read),
            )
        };
        if ok.is_err() {
            return Err(Error::ReadFailed { address });
        }
        buffer.truncate(bytes_read);
        Ok(buffer)
    }

    fn write(&self, address: u64, bytes: &[u8]) -> Result<()> {
        let mut bytes_written = 0usize;
        let ok = unsafe {
            WriteProcessMemory(
                self.handle,
                address as *mut _,
                bytes.as_ptr() as *const _,
                bytes.len(),
                Some(&mut bytes_written),
            )
        };
        if ok.is_err() || bytes_written != bytes.len() {
            return Err(Error::WriteFailed { address });
        }
        Ok(())
    }

    fn close(&self) {
        if !self.handle.is_invalid() {
            unsafe {
                let _ = CloseHandle(self.handle);
            }
        }
    }

    fn modules(&self) -> &[ModuleInfo] {
        &self.modules
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

fn enumerate_modules(handle: HANDLE) -> Result<Vec<ModuleInfo>> {
    let mut needed = 0u32;
    let mut buf: Vec<HMODULE> = vec![HMODULE::default(); 256];
    unsafe {
        EnumProcessModules(
            handle,
            buf.as_mut_ptr(),
            (buf.len() * std::mem::size_of::<HMODULE>()) as u32,
            &mut needed,
        )
        .map_err(|_| Error::AccessDenied)?;
    }
    let count = (needed as usize / std::mem::size_of::<HMODULE>()).min(buf.len());
    buf.truncate(count);

    let mut modules = Vec::with_capacity(count);
    for module in buf {
        let mut info = MODULEINFO::default();
        if unsafe { GetModuleInformation(handle, module, &mut info, std::mem::size_of::<MODULEINFO>() as u32) }
            .is_err()
        {
            continue;
        }
        let mut name_buf = [0u16; 1024];
        let len = unsafe { GetModuleFileNameExW(Some(handle), Some(module), &mut name_buf) };
        if len == 0 {
            continue;
        }
        let path = String::from_utf16_lossy(&name_buf[..len as usize]);
        modules.push(ModuleInfo {
            path,
            base_address: info.lpBaseOfDll as u64,
            size: info.SizeOfImage as u64,
        });
    }
    modules.sort_by_key(|m| m.base_address);
    Ok(modules)
}
