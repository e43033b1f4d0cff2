//! # Memory Layout

use kernel_memory_addresses::PAGE_SIZE;

/// Where the bootloader places the kernel image in *physical* memory.
///
/// # Kernel Build
/// This information is sourced in the kernel's `build.rs` to configure
/// the linker.
pub const PHYS_LOAD: u64 = 0x0010_0000; // 1 MiB

/// Low memory identity mapped by `paging_init` before paging is switched on.
///
/// Code, stack, the paging structures and the default heap all live below
/// this boundary, so none of them can fault.
pub const IDENTITY_LOW_BYTES: u64 = 0x20_0000; // 2 MiB

/// Number of 4 KiB pages in the identity map; exactly one page table.
pub const IDENTITY_PAGES: u64 = IDENTITY_LOW_BYTES / PAGE_SIZE;

/// Page-directory-pointer table (loaded into CR3).
pub const PDPT_PHYS: u64 = 0x1000;

/// Page directory linked from `PDPT[0]`.
pub const PD_PHYS: u64 = 0x2000;

/// Page table holding the identity map, linked from `PD[0]`.
pub const PT_PHYS: u64 = 0x3000;

/// Spare page directory handed out by the fault handler.
pub const SCRATCH_PD_PHYS: u64 = 0x4000;

/// Spare page table handed out by the fault handler.
pub const SCRATCH_PT_PHYS: u64 = 0x5000;

/// Page-table frames carved off the top of the heap region for the fault
/// handler, after the two scratch frames. Each new table covers 2 MiB.
pub const TABLE_FRAMES: u64 = 64;

/// The size of the boot stack reserved in `.bss`.
pub const KERNEL_STACK_SIZE: usize = 16 * 1024;

const _: () = {
    assert!(KERNEL_STACK_SIZE.is_multiple_of(4096));
    assert!(IDENTITY_PAGES == 512);
    assert!(PDPT_PHYS.is_multiple_of(PAGE_SIZE));
    assert!(PD_PHYS == PDPT_PHYS + PAGE_SIZE);
    assert!(PT_PHYS == PD_PHYS + PAGE_SIZE);
    assert!(SCRATCH_PD_PHYS == PT_PHYS + PAGE_SIZE);
    assert!(SCRATCH_PT_PHYS == SCRATCH_PD_PHYS + PAGE_SIZE);
    assert!(SCRATCH_PT_PHYS + PAGE_SIZE <= PHYS_LOAD);
    assert!(PHYS_LOAD < IDENTITY_LOW_BYTES);
};
