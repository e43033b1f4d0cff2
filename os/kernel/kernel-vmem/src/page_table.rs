//! # PAE Paging Structures
//!
//! - [`PdptIndex`], [`PdIndex`], [`PtIndex`]: strongly typed indices for VA
//!   bits `[31:30]`, `[29:21]` and `[20:12]`.
//! - [`PageDirectoryPointerTable`]: the root, four [`PdptEntry`]s in a 4 KiB
//!   frame (only the first 32 bytes are used by the CPU).
//! - [`PageTable`]: 512 [`PageEntryBits`], 4 KiB-aligned. Serves as both
//!   page directory and page table since PAE gives them the same layout.
//!
//! Writes are plain stores; callers handle TLB maintenance and CR3 reloads.

use crate::{PageEntryBits, PdptEntry};
use kernel_memory_addresses::VirtualAddress;

/// Number of PDPT entries under PAE.
pub const PDPT_ENTRIES: usize = 4;

/// Number of entries in a page directory or page table.
pub const TABLE_ENTRIES: usize = 512;

/// Index into the PDPT (VA bits `[31:30]`), range `0..4`.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PdptIndex(u8);

/// Index into a page directory (VA bits `[29:21]`), range `0..512`.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PdIndex(u16);

/// Index into a page table (VA bits `[20:12]`), range `0..512`.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PtIndex(u16);

impl PdptIndex {
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self(va.pdpt_bits() as u8)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u8) -> Self {
        debug_assert!((v as usize) < PDPT_ENTRIES);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl PdIndex {
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self(va.pd_bits() as u16)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!((v as usize) < TABLE_ENTRIES);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl PtIndex {
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self(va.pt_bits() as u16)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!((v as usize) < TABLE_ENTRIES);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Split a virtual address into its three table indices.
#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (PdptIndex, PdIndex, PtIndex) {
    (PdptIndex::from(va), PdIndex::from(va), PtIndex::from(va))
}

/// The PDPT, padded to a full page so it can occupy its own frame.
#[doc(alias = "PDPT")]
#[repr(C, align(4096))]
pub struct PageDirectoryPointerTable {
    entries: [PdptEntry; PDPT_ENTRIES],
    _unused: [u64; TABLE_ENTRIES - PDPT_ENTRIES],
}

impl PageDirectoryPointerTable {
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PdptEntry::new(); PDPT_ENTRIES],
            _unused: [0; TABLE_ENTRIES - PDPT_ENTRIES],
        }
    }

    /// Clear the whole frame.
    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(PdptEntry::new());
        self._unused.fill(0);
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: PdptIndex) -> PdptEntry {
        self.entries[i.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, i: PdptIndex, e: PdptEntry) {
        self.entries[i.as_usize()] = e;
    }
}

/// A page directory or page table: 512 entries, 4 KiB-aligned.
#[doc(alias = "PT")]
#[doc(alias = "PD")]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageEntryBits; TABLE_ENTRIES],
}

impl PageTable {
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PageEntryBits::new(); TABLE_ENTRIES],
        }
    }

    /// Mark all entries not-present.
    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(PageEntryBits::new());
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: usize) -> PageEntryBits {
        self.entries[i]
    }

    #[inline]
    pub const fn set(&mut self, i: usize, e: PageEntryBits) {
        self.entries[i] = e;
    }

    #[inline]
    #[must_use]
    pub const fn pde(&self, i: PdIndex) -> PageEntryBits {
        self.get(i.as_usize())
    }

    #[inline]
    pub const fn set_pde(&mut self, i: PdIndex, e: PageEntryBits) {
        self.set(i.as_usize(), e);
    }

    #[inline]
    #[must_use]
    pub const fn pte(&self, i: PtIndex) -> PageEntryBits {
        self.get(i.as_usize())
    }

    #[inline]
    pub const fn set_pte(&mut self, i: PtIndex, e: PageEntryBits) {
        self.set(i.as_usize(), e);
    }

    /// Number of present entries.
    #[must_use]
    pub fn present_count(&self) -> usize {
        self.entries.iter().filter(|e| e.present()).count()
    }
}

const _: () = {
    assert!(size_of::<PageDirectoryPointerTable>() == 4096);
    assert!(size_of::<PageTable>() == 4096);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_ok() {
        let va = VirtualAddress::new(0xC123_4567);
        let (i3, i2, i1) = split_indices(va);
        assert_eq!(i3.as_usize(), 3);
        assert_eq!(i2.as_usize(), 0x009);
        assert_eq!(i1.as_usize(), 0x034);
    }

    #[test]
    fn identity_range_lives_in_first_directory_slot() {
        let (i3, i2, _) = split_indices(VirtualAddress::new(0x001F_FFFF));
        assert_eq!(i3.as_usize(), 0);
        assert_eq!(i2.as_usize(), 0);
        let (_, i2, i1) = split_indices(VirtualAddress::new(0x0020_0000));
        assert_eq!(i2.as_usize(), 1);
        assert_eq!(i1.as_usize(), 0);
    }
}
