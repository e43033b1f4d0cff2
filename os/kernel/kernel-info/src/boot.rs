//! # Kernel Boot Information
//!
//! The kernel is loaded by a Multiboot (v1) compliant bootloader. On entry,
//! `EAX` holds [`MULTIBOOT_BOOTLOADER_MAGIC`] and `EBX` the physical address
//! of a [`MultibootInfo`] block.

use crate::mmap::{MemoryMap, MemoryMapError};
use bitfield_struct::bitfield;

/// Magic placed in the kernel image's Multiboot header.
pub const MULTIBOOT_HEADER_MAGIC: u32 = 0x1BAD_B002;

/// Magic a compliant bootloader leaves in `EAX`.
pub const MULTIBOOT_BOOTLOADER_MAGIC: u32 = 0x2BAD_B002;

/// Header flags: page-align modules (bit 0) and provide memory info (bit 1).
pub const MULTIBOOT_HEADER_FLAGS: u32 = 0x0000_0003;

/// Header checksum; magic, flags and checksum must sum to zero.
pub const MULTIBOOT_HEADER_CHECKSUM: u32 =
    0u32.wrapping_sub(MULTIBOOT_HEADER_MAGIC.wrapping_add(MULTIBOOT_HEADER_FLAGS));

/// Kernel entry function called from the assembly boot stub.
///
/// # ABI
/// `cdecl`, the arguments are pushed by the stub straight from `EAX`/`EBX`.
pub type KernelEntryFn = extern "C" fn(magic: u32, info: *const MultibootInfo) -> !;

/// Validity flags of a [`MultibootInfo`] block.
#[bitfield(u32)]
pub struct MultibootFlags {
    /// Bit 0: `mem_lower` / `mem_upper` are valid.
    pub memory: bool,
    /// Bit 1: `boot_device` is valid.
    pub boot_device: bool,
    /// Bit 2: `cmdline` is valid.
    pub cmdline: bool,
    /// Bit 3: `mods_*` are valid.
    pub modules: bool,
    /// Bit 4: a.out symbol table in `syms`.
    pub aout_syms: bool,
    /// Bit 5: ELF section header table in `syms`.
    pub elf_sections: bool,
    /// Bit 6: `mmap_length` / `mmap_addr` are valid.
    pub memory_map: bool,
    /// Bits 7–31: drives, config table, loader name, APM, VBE, framebuffer.
    #[bits(25)]
    pub other: u32,
}

/// Multiboot information block, as laid out by the bootloader.
///
/// Only the fields up to the memory map are modelled; the kernel does not use
/// anything past `mmap_addr`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MultibootInfo {
    pub flags: u32,
    pub mem_lower: u32,
    pub mem_upper: u32,
    pub boot_device: u32,
    pub cmdline: u32,
    pub mods_count: u32,
    pub mods_addr: u32,
    pub syms: [u32; 4],
    /// Length of the memory map buffer in **bytes**.
    pub mmap_length: u32,
    /// Physical address of the first memory map entry.
    pub mmap_addr: u32,
}

impl MultibootInfo {
    #[must_use]
    pub const fn flags(&self) -> MultibootFlags {
        MultibootFlags::from_bits(self.flags)
    }

    /// Borrow the memory map the bootloader provided.
    ///
    /// # Errors
    /// [`MemoryMapError::NotProvided`] if flag bit 6 is clear, or any
    /// validation error of [`MemoryMap::new`].
    ///
    /// # Safety
    /// `mmap_addr .. mmap_addr + mmap_length` must be readable for the
    /// lifetime `'a` (true while low memory is identity mapped).
    #[allow(unsafe_code)]
    pub unsafe fn memory_map<'a>(&self) -> Result<MemoryMap<'a>, MemoryMapError> {
        if !self.flags().memory_map() {
            return Err(MemoryMapError::NotProvided);
        }
        unsafe { MemoryMap::from_raw(self.mmap_addr as usize as *const u8, self.mmap_length as usize) }
    }
}

const _: () = {
    assert!(core::mem::offset_of!(MultibootInfo, mmap_length) == 44);
    assert!(core::mem::offset_of!(MultibootInfo, mmap_addr) == 48);
    assert!(
        MULTIBOOT_HEADER_MAGIC
            .wrapping_add(MULTIBOOT_HEADER_FLAGS)
            .wrapping_add(MULTIBOOT_HEADER_CHECKSUM)
            == 0
    );
};

#[cfg(test)]
mod tests {
    use super::*;

    fn info(flags: u32) -> MultibootInfo {
        MultibootInfo {
            flags,
            mem_lower: 0,
            mem_upper: 0,
            boot_device: 0,
            cmdline: 0,
            mods_count: 0,
            mods_addr: 0,
            syms: [0; 4],
            mmap_length: 0,
            mmap_addr: 0,
        }
    }

    #[test]
    fn memory_map_flag_is_bit_six() {
        assert!(info(1 << 6).flags().memory_map());
        assert!(!info(0x3F).flags().memory_map());
    }

    #[test]
    #[allow(unsafe_code)]
    fn missing_memory_map_is_reported() {
        let err = unsafe { info(0x1).memory_map() }.unwrap_err();
        assert_eq!(err, MemoryMapError::NotProvided);
    }
}
