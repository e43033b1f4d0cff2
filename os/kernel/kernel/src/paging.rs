//! # Paging bring-up and the page-fault handler
//!
//! [`paging_init`] builds the boot tables through [`PageTableManager`],
//! switches the CPU to PAE paging and routes vector 14 to
//! [`page_fault_handler`]. From then on, touching an address outside the
//! identity map installs a mapping for it and the faulting instruction is
//! retried.

use crate::interrupts::{TrapFrame, isr_register};
use core::ops::Range;
use kernel_registers::cr0::Cr0;
use kernel_registers::cr2::Cr2;
use kernel_registers::cr3::Cr3;
use kernel_registers::cr4::Cr4;
use kernel_registers::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use kernel_sync::SpinLock;
use kernel_vmem::{
    BumpFrameAlloc, IdentityBacking, IdentityMapper, PAGE_FAULT_VECTOR, PageFault, PageTableManager,
    PagingLayout, VirtualAddress,
};
use log::{debug, info};

/// The kernel's page-table manager: tables reached through the identity
/// map, new tables from the scratch frames and then the reserved frames,
/// and faulted pages backed by the frame of the same address.
type KernelPaging = PageTableManager<IdentityMapper, BumpFrameAlloc<2>, IdentityBacking>;

static PAGING: SpinLock<Option<KernelPaging>> = SpinLock::new(None);

/// Build the boot page tables and turn paging on.
///
/// `table_frames` is identity-mapped memory the fault handler may turn into
/// page tables once the two scratch frames are used.
///
/// # Panics
/// If called twice, or if vector 14 cannot be routed.
pub fn paging_init(table_frames: Range<u64>) {
    let layout = PagingLayout::BOOT;

    {
        let mut paging = PAGING.lock_irq();
        assert!(paging.is_none(), "paging_init called twice");

        // SAFETY: the layout frames are reserved below the kernel image and
        // `table_frames` is kept out of the heap. Both lie in the identity
        // map, which also holds with paging off.
        let mut manager = unsafe {
            PageTableManager::new(
                IdentityMapper,
                BumpFrameAlloc::new(layout.scratch_frames(), table_frames),
                IdentityBacking,
                layout,
            )
        };
        manager.init_tables();
        debug!("paging: {} table frames available", manager.frames().remaining());
        *paging = Some(manager);
    }

    // SAFETY: the tables identity-map code, stack and data, so execution
    // continues at the same addresses once CR0.PG is set.
    unsafe {
        Cr4::load_unsafe().with_pae(true).store_unsafe();
        Cr3::from_pdpt_phys(layout.pdpt).store_unsafe();
    }
    debug!("CR4.PAE set, CR3 = {:#010x}", Cr3::from_pdpt_phys(layout.pdpt).into_bits());

    if let Err(e) = isr_register(PAGE_FAULT_VECTOR, page_fault_handler) {
        panic!("{e}");
    }

    unsafe {
        Cr0::load_unsafe().with_pg_paging(true).store_unsafe();
    }
    info!(
        "Paging enabled: {} identity pages, PDPT at {}",
        layout.identity_pages, layout.pdpt
    );
}

/// The handler registered for vector 14.
///
/// # Panics
/// On a protection violation, when every table frame is used, or when the
/// fault hits while the page tables are being edited.
pub fn page_fault_handler(frame: &mut TrapFrame) {
    // SAFETY: CR2 still holds the faulting address; no other fault can run
    // in between because the gate masks interrupts.
    let cr2 = unsafe { Cr2::load_unsafe() };
    let fault = PageFault::from_raw(cr2.into_bits(), frame.error_code);

    let resolution = {
        let Some(mut paging) = PAGING.try_lock() else {
            panic!("{fault} while the page tables are locked ({frame})");
        };
        let Some(manager) = paging.as_mut() else {
            panic!("{fault} before paging_init ({frame})");
        };
        manager.dispatch(fault)
    };

    if resolution.requires_cr3_reload() {
        // PAE caches the PDPT entries at CR3 load.
        unsafe {
            Cr3::load_unsafe().store_unsafe();
        }
    } else {
        invalidate_page(resolution.page());
    }
}

/// Drop any stale TLB entry for `page`.
fn invalidate_page(page: VirtualAddress) {
    unsafe {
        core::arch::asm!(
            "invlpg [{}]",
            in(reg) page.as_u32(),
            options(nostack, preserves_flags)
        );
    }
}
