//! Address Labeler: renders an address as `module+0xOFFSET` when it falls
//! inside a known module, or a bare hex address otherwise.

use crate::backend::ModuleInfo;

/// Renders `address` against `modules` (sorted by base address, as
/// [`crate::backend::MemoryBackend::modules`] guarantees) via binary search.
///
/// `partition_point` finds the last module whose base is `<= address`; that
/// candidate (if any) is then range-checked against its size.
pub fn describe_address(address: u64, modules: &[ModuleInfo]) -> String {
    let idx = modules.partition_point(|m| m.base_address <= address);
    if idx > 0 {
        let module = &modules[idx - 1];
        if address < module.base_address + module.size {
            let offset = address - module.base_address;
            let base_name = module_basename(&module.path);
            return format!("{base_name}+0x{offset:X}");
        }
    }
    format!("0x{address:X}")
}

fn module_basename(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(path: &str, base: u64, size: u64) -> ModuleInfo {
        ModuleInfo {
            path: path.to_string(),
            base_address: base,
            size,
        }
    }

    #[test]
    fn labels_inside_module_with_offset() {
        let modules = vec![module(r"C:\Games\demo\game.exe", 0x1000_0000, 0x1000)];
        assert_eq!(describe_address(0x1000_0100, &modules), "game.exe+0x100");
    }

    #[test]
    fn falls_back_to_hex_outside_any_module() {
        let modules = vec![module("libc.so", 0x7000_0000, 0x1000)];
        assert_eq!(describe_address(0x1234, &modules), "0x1234");
    }

    #[test]
    fn handles_forward_slash_paths() {
        let modules = vec![module("/usr/lib/libfoo.so", 0x500, 0x100)];
        assert_eq!(describe_address(0x510, &modules), "libfoo.so+0x10");
    }
}
