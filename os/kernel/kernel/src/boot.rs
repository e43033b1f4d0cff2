//! # Multiboot entry
//!
//! GRUB (or QEMU's `-kernel`) finds [`MULTIBOOT_HEADER`] in the first 8 KiB
//! of the image and jumps to [`_start`] in 32-bit protected mode with paging
//! off, `EAX` = bootloader magic and `EBX` = physical address of the
//! `MultibootInfo` block. The stub switches to [`BOOT_STACK`] and calls
//! [`kernel_entry`](crate::kernel_entry).

use kernel_info::boot::{
    KernelEntryFn, MULTIBOOT_HEADER_CHECKSUM, MULTIBOOT_HEADER_FLAGS, MULTIBOOT_HEADER_MAGIC,
};
use kernel_info::memory::KERNEL_STACK_SIZE;

#[repr(C, align(4))]
pub struct MultibootHeader {
    magic: u32,
    flags: u32,
    checksum: u32,
}

#[used]
#[unsafe(link_section = ".multiboot")]
#[unsafe(no_mangle)]
pub static MULTIBOOT_HEADER: MultibootHeader = MultibootHeader {
    magic: MULTIBOOT_HEADER_MAGIC,
    flags: MULTIBOOT_HEADER_FLAGS,
    checksum: MULTIBOOT_HEADER_CHECKSUM,
};

/// 16-byte aligned stack
#[repr(align(16))]
struct Aligned<const N: usize>([u8; N]);

/// Boot stack, used for the lifetime of the kernel.
#[unsafe(link_section = ".bss.boot")]
#[unsafe(no_mangle)]
static mut BOOT_STACK: Aligned<KERNEL_STACK_SIZE> = Aligned([0; KERNEL_STACK_SIZE]);

/// The kernel entry point.
///
/// # Naked function & Stack
/// Naked so that no prologue touches the (undefined) loader stack before
/// `ESP` points at [`BOOT_STACK`].
#[unsafe(no_mangle)]
#[unsafe(naked)]
#[unsafe(link_section = ".text._start")]
pub extern "C" fn _start() -> ! {
    core::arch::naked_asm!(
        "cli",
        "lea esp, [{stack} + {stack_size}]",
        "and esp, -16",
        "xor ebp, ebp",
        // keep the call site 16-byte aligned after two pushes
        "sub esp, 8",
        // cdecl: kernel_entry(magic, info)
        "push ebx",
        "push eax",
        "call {entry}",
        "2:",
        "cli",
        "hlt",
        "jmp 2b",
        stack = sym BOOT_STACK,
        stack_size = const KERNEL_STACK_SIZE,
        entry = sym crate::kernel_entry,
    )
}

const _: KernelEntryFn = crate::kernel_entry;
const _: () = assert!(KERNEL_STACK_SIZE.is_multiple_of(16));
