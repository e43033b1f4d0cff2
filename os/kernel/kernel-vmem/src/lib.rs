//! # Virtual Memory Support
//!
//! 32-bit x86 PAE paging for a small kernel: the page-table hierarchy, the
//! boot identity map, and on-demand mapping from page faults.
//!
//! ## What you get
//! - PAE entry types ([`PageEntryBits`], [`PdptEntry`]) plus a raw
//!   [`flags`] mask table.
//! - 4 KiB-aligned [`PageTable`] / [`PageDirectoryPointerTable`] wrappers and
//!   typed indices.
//! - [`PageFault`] / [`PageFaultError`] decoding of the #PF error code.
//! - The [`PageTableManager`] that builds the boot tables and resolves faults.
//! - A tiny allocator/mapper interface ([`FrameAlloc`], [`PhysMapper`]), the
//!   [`BumpFrameAlloc`] that feeds new page tables, and the [`PageBacking`]
//!   policy deciding which frame backs a faulted page.
//!
//! ## PAE Virtual Address → Physical Address Walk
//!
//! Each 32-bit linear address is divided into four fields:
//!
//! ```text
//! | 31‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  PDPT |   PD  |   PT  | Offset |
//! ```
//!
//! ```text
//!  CR3 → PDPT (4 entries) → PD (512) → PT (512) → 4 KiB page
//! ```
//!
//! | Level | Table | Entry | Description |
//! |:------|:------|:------|:------------|
//! | 1 | **PDPT** | **PDPTE** | One entry per GiB. Cached by the CPU when CR3 is loaded; only `P`, `PWT`, `PCD` are defined. |
//! | 2 | **PD** | **PDE** | Points to a page table (or maps 2 MiB with `PS=1`, unused here). |
//! | 3 | **PT** | **PTE** | Maps one 4 KiB page. |
//!
//! All entries are 64 bits wide, so the tables can reference physical memory
//! above 4 GiB even though linear addresses stay 32 bits.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

use core::ops::Range;

mod fault;
mod manager;
mod page_entry_bits;
mod page_table;

pub use crate::fault::{Conditions, PAGE_FAULT_VECTOR, PageFault, PageFaultError};
pub use crate::manager::{FaultError, FaultResolution, PageTableManager, PagingLayout};
pub use crate::page_entry_bits::{PageEntryBits, PdptEntry, flags};
pub use crate::page_table::{
    PDPT_ENTRIES, PageDirectoryPointerTable, PageTable, PdIndex, PdptIndex, PtIndex,
    TABLE_ENTRIES, split_indices,
};

pub use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, VirtualAddress, align_down, align_up};

/// Re-export constants as info module.
pub use kernel_info::memory as info;

/// Minimal frame allocator used to obtain **physical** 4 KiB frames
/// for page tables.
///
/// The implementation decides where frames come from (fixed scratch frames,
/// bitmap, etc.). Returned frames **must** be 4 KiB aligned.
///
/// Returns `None` on out-of-memory.
pub trait FrameAlloc {
    /// Allocate one 4 KiB *physical* frame for page tables. Must return page-aligned frames.
    fn alloc_4k(&mut self) -> Option<PhysicalAddress>;
}

/// Converts physical addresses to *temporarily* usable pointers in the current
/// virtual address space.
///
/// This kernel identity-maps the frames holding its paging structures, so the
/// production mapper is [`IdentityMapper`].
pub trait PhysMapper {
    /// Convert a *physical* address to a usable mutable reference.
    ///
    /// # Safety
    /// - `pa` must be mapped writable in the current address space and
    ///   addressable with the native pointer width.
    /// - The mapping must remain valid for `'a`.
    /// - Type `T` must match the bytes at `pa` (no aliasing UB).
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

/// Decides which physical frame backs a virtual page installed on fault.
///
/// This is the extension point for a real physical-frame allocator. The
/// kernel currently uses [`IdentityBacking`].
pub trait PageBacking {
    /// The frame to map at `page` (4 KiB aligned), or `None` if memory is
    /// exhausted.
    fn frame_for(&mut self, page: VirtualAddress) -> Option<PhysicalAddress>;
}

/// Maps every faulted page to the physical frame with the same address.
///
/// Physical exhaustion is not modelled: any page is "backed".
#[derive(Debug, Default, Copy, Clone)]
pub struct IdentityBacking;

impl PageBacking for IdentityBacking {
    #[inline]
    fn frame_for(&mut self, page: VirtualAddress) -> Option<PhysicalAddress> {
        Some(page.page_base().identity())
    }
}

/// Physical memory is reachable at the same virtual address.
#[derive(Debug, Default, Copy, Clone)]
pub struct IdentityMapper;

impl PhysMapper for IdentityMapper {
    #[inline]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let ptr = pa.as_identity_ptr::<T>();
        debug_assert!(ptr.is_some(), "{pa} is not addressable");
        // SAFETY: the caller guarantees `pa` is mapped and addressable.
        unsafe { &mut *ptr.unwrap_unchecked() }
    }
}

/// A fixed set of page-table frames, handed out in order and never returned.
#[derive(Debug, Clone)]
pub struct FramePool<const N: usize> {
    frames: [PhysicalAddress; N],
    next: usize,
}

impl<const N: usize> FramePool<N> {
    #[must_use]
    pub const fn new(frames: [PhysicalAddress; N]) -> Self {
        Self { frames, next: 0 }
    }

    /// Frames not yet handed out.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        N - self.next
    }
}

impl<const N: usize> FrameAlloc for FramePool<N> {
    fn alloc_4k(&mut self) -> Option<PhysicalAddress> {
        let frame = *self.frames.get(self.next)?;
        debug_assert!(frame.is_aligned_to(PAGE_SIZE));
        self.next += 1;
        Some(frame)
    }
}

/// Page-table frames for the fault handler: a fixed [`FramePool`] first,
/// then consecutive 4 KiB frames bumped out of a physical range.
///
/// The kernel seeds the pool with the scratch directory and table and the
/// range with usable memory taken from the memory map. Frames are never
/// returned.
#[derive(Debug, Clone)]
pub struct BumpFrameAlloc<const N: usize> {
    reserved: FramePool<N>,
    next: u64,
    end: u64,
}

impl<const N: usize> BumpFrameAlloc<N> {
    /// `range` is shrunk to whole frames; an empty range leaves only the
    /// reserved frames.
    #[must_use]
    pub fn new(reserved: [PhysicalAddress; N], range: Range<u64>) -> Self {
        let next = align_up(range.start, PAGE_SIZE);
        let end = align_down(range.end, PAGE_SIZE).max(next);
        Self {
            reserved: FramePool::new(reserved),
            next,
            end,
        }
    }

    /// Frames not yet handed out.
    #[must_use]
    pub fn remaining(&self) -> usize {
        let bumped = usize::try_from((self.end - self.next) / PAGE_SIZE).unwrap_or(usize::MAX);
        self.reserved.remaining().saturating_add(bumped)
    }
}

impl<const N: usize> FrameAlloc for BumpFrameAlloc<N> {
    fn alloc_4k(&mut self) -> Option<PhysicalAddress> {
        if let Some(frame) = self.reserved.alloc_4k() {
            return Some(frame);
        }
        if self.next + PAGE_SIZE > self.end {
            return None;
        }
        let frame = PhysicalAddress::new(self.next);
        self.next += PAGE_SIZE;
        Some(frame)
    }
}

/// Map a physical page table frame into the current virtual address space and
/// return a mutable reference to it.
///
/// # Safety
/// - `phys` must point to a valid 4 KiB page containing a page table.
/// - The mapping must be writable for mut access.
#[inline]
pub unsafe fn get_table<'a, M: PhysMapper>(m: &M, phys: PhysicalAddress) -> &'a mut PageTable {
    unsafe { m.phys_to_mut::<PageTable>(phys) }
}

/// Like [`get_table`], for the root table.
///
/// # Safety
/// See [`get_table`].
#[inline]
pub unsafe fn get_pdpt<'a, M: PhysMapper>(
    m: &M,
    phys: PhysicalAddress,
) -> &'a mut PageDirectoryPointerTable {
    unsafe { m.phys_to_mut::<PageDirectoryPointerTable>(phys) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_pool_hands_out_each_frame_once() {
        let mut pool = FramePool::new([PhysicalAddress::new(0x4000), PhysicalAddress::new(0x5000)]);
        assert_eq!(pool.remaining(), 2);
        assert_eq!(pool.alloc_4k(), Some(PhysicalAddress::new(0x4000)));
        assert_eq!(pool.alloc_4k(), Some(PhysicalAddress::new(0x5000)));
        assert_eq!(pool.alloc_4k(), None);
        assert_eq!(pool.remaining(), 0);
    }

    #[test]
    fn bump_alloc_uses_reserved_frames_first() {
        let mut frames = BumpFrameAlloc::new(
            [PhysicalAddress::new(0x4000), PhysicalAddress::new(0x5000)],
            0x0018_0800..0x0018_3000,
        );
        assert_eq!(frames.remaining(), 4);
        assert_eq!(frames.alloc_4k(), Some(PhysicalAddress::new(0x4000)));
        assert_eq!(frames.alloc_4k(), Some(PhysicalAddress::new(0x5000)));
        // The partial frame at the start of the range is skipped.
        assert_eq!(frames.alloc_4k(), Some(PhysicalAddress::new(0x0018_1000)));
        assert_eq!(frames.alloc_4k(), Some(PhysicalAddress::new(0x0018_2000)));
        assert_eq!(frames.alloc_4k(), None);
        assert_eq!(frames.remaining(), 0);
    }

    #[test]
    fn bump_alloc_with_empty_range_is_just_the_pool() {
        let mut frames = BumpFrameAlloc::new([PhysicalAddress::new(0x4000)], 0x9000..0x8000);
        assert_eq!(frames.remaining(), 1);
        assert!(frames.alloc_4k().is_some());
        assert_eq!(frames.alloc_4k(), None);
    }

    #[test]
    fn identity_backing_maps_page_to_itself() {
        let mut b = IdentityBacking;
        assert_eq!(
            b.frame_for(VirtualAddress::new(0x1234_5678)),
            Some(PhysicalAddress::new(0x1234_5000))
        );
    }
}
