//! # Kernel Entry Point
//!
//! A 32-bit Multiboot kernel. Boot order:
//!
//! 1. [`boot::_start`] switches to the boot stack and calls [`kernel_entry`].
//! 2. The debug-console logger comes up and the loader magic is checked.
//! 3. The memory map is logged. The usable memory after the kernel image is
//!    split into the global heap and a run of page-table frames.
//! 4. The IDT is loaded and [`paging::paging_init`] turns on PAE paging with
//!    the low 2 MiB identity mapped and vector 14 routed to the fault handler.
//! 5. The heap comes up.
//!
//! Host builds only compile the hardware-independent parts so they can be
//! unit tested.

#![cfg_attr(target_os = "none", no_std, no_main)]
#![allow(unsafe_code)]
#![cfg_attr(not(target_os = "none"), allow(dead_code))]

extern crate alloc;

#[cfg(all(target_os = "none", target_arch = "x86"))]
mod boot;
mod idt;
mod interrupts;
#[cfg(all(target_os = "none", target_arch = "x86"))]
mod memory;
#[cfg(all(target_os = "none", target_arch = "x86"))]
mod panic;
#[cfg(all(target_os = "none", target_arch = "x86"))]
mod paging;

#[cfg(all(target_os = "none", target_arch = "x86"))]
pub use entry::*;

#[cfg(all(target_os = "none", target_arch = "x86"))]
mod entry {
    use crate::{idt, memory, panic, paging};
    use alloc::vec::Vec;
    use kernel_info::boot::{MULTIBOOT_BOOTLOADER_MAGIC, MultibootInfo};
    use kernel_qemu::{DebugconLogger, qemu_trace};
    use log::{LevelFilter, info, warn};

    /// Addresses in three 2 MiB regions above the identity map, touched once
    /// each to exercise the page-fault path.
    const ON_DEMAND_ADDRS: [usize; 3] = [0x0040_0000, 0x0080_0000, 0x00C0_0000];

    static LOGGER: DebugconLogger = DebugconLogger::new(LevelFilter::Debug);

    /// Called by the boot stub on the boot stack.
    ///
    /// # Panics
    /// If the kernel was not started by a Multiboot loader.
    pub extern "C" fn kernel_entry(magic: u32, info: *const MultibootInfo) -> ! {
        qemu_trace!("Kernel reporting to QEMU!\n");
        if let Err(e) = LOGGER.install() {
            qemu_trace!("logger: {e}\n");
        }

        assert!(
            magic == MULTIBOOT_BOOTLOADER_MAGIC,
            "bad bootloader magic {magic:#010x}"
        );
        // SAFETY: a Multiboot loader passes a valid info block in low memory.
        let info = unsafe { &*info };

        let boot_memory = memory::memory_map(info).and_then(|map| {
            memory::log_memory_map(&map);
            memory::boot_memory(&map)
        });

        unsafe { idt::init_idt_once() };
        match boot_memory {
            Ok(boot) => {
                paging::paging_init(boot.tables);
                memory::try_heap_init(boot.heap);
            }
            Err(e) => {
                warn!("{e}; running without a heap");
                paging::paging_init(0..0);
            }
        }

        kernel_main()
    }

    fn kernel_main() -> ! {
        if memory::HEAP.stats().spaces > 0 {
            let squares: Vec<u32> = (0..64).map(|n| n * n).collect();
            info!(
                "alloc works: sum of squares = {}, {:?}",
                squares.iter().sum::<u32>(),
                memory::HEAP.stats()
            );
            drop(squares);
        }

        // Not identity mapped: the first write faults and gets a page.
        for addr in ON_DEMAND_ADDRS {
            let page = core::ptr::with_exposed_provenance_mut::<u32>(addr);
            unsafe {
                page.write_volatile(0xC0FF_EE00);
                info!("{addr:#010x} reads back {:#010x}", page.read_volatile());
            }
        }

        info!("Kernel idle");
        panic::halt()
    }
}

/// Hosted builds exist for the unit tests only.
#[cfg(not(target_os = "none"))]
fn main() {}
