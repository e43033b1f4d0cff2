//! # Physical Memory Map
//!
//! Reader for the Multiboot memory map. The bootloader hands over a packed
//! array of variable-sized entries:
//!
//! ```text
//! offset  size  field
//!      0     4  size   (bytes following this field, usually 20)
//!      4     8  base_addr
//!     12     8  length
//!     20     4  type   (1 = usable RAM)
//! ```
//!
//! The next entry starts at `offset + size + 4`. [`MemoryMap::new`] walks the
//! whole buffer once and rejects truncated or undersized entries, so the
//! [`regions`](MemoryMap::regions) iterator afterwards never reads out of
//! bounds.

use core::fmt;
use core::ops::Range;
use kernel_memory_addresses::{PAGE_SIZE, align_down, align_up};

/// Bytes of an entry following its `size` field: `base`, `length`, `type`.
const ENTRY_PAYLOAD: usize = 20;

/// Width of the leading `size` field.
const SIZE_FIELD: usize = 4;

/// Memory map problems detected at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MemoryMapError {
    #[error("the bootloader did not provide a memory map")]
    NotProvided,
    #[error("memory map entry at offset {offset} runs past the end of the map")]
    Truncated { offset: usize },
    #[error("memory map entry at offset {offset} declares {size} bytes, need at least 20")]
    EntryTooSmall { offset: usize, size: u32 },
    #[error("no usable region contains the kernel end at {kernel_end:#x}")]
    NoHeapRegion { kernel_end: u64 },
}

/// Type of a physical memory region, as reported by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Available RAM.
    Usable,
    Reserved,
    /// ACPI tables; usable once they have been parsed.
    AcpiReclaimable,
    /// ACPI non-volatile storage.
    AcpiNvs,
    /// Defective RAM.
    Defective,
    Other(u32),
}

impl RegionKind {
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Usable,
            2 => Self::Reserved,
            3 => Self::AcpiReclaimable,
            4 => Self::AcpiNvs,
            5 => Self::Defective,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub const fn as_raw(self) -> u32 {
        match self {
            Self::Usable => 1,
            Self::Reserved => 2,
            Self::AcpiReclaimable => 3,
            Self::AcpiNvs => 4,
            Self::Defective => 5,
            Self::Other(raw) => raw,
        }
    }
}

/// One entry of the memory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub base: u64,
    pub length: u64,
    pub kind: RegionKind,
}

impl MemoryRegion {
    /// Exclusive end address, saturating at `u64::MAX`.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base.saturating_add(self.length)
    }

    #[must_use]
    pub const fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.end()
    }

    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self.kind, RegionKind::Usable)
    }
}

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:08X}  {:>10}B Type {}",
            self.base,
            self.length,
            self.kind.as_raw()
        )
    }
}

/// A validated view of the bootloader's memory map.
#[derive(Debug, Clone, Copy)]
pub struct MemoryMap<'a> {
    bytes: &'a [u8],
}

impl<'a> MemoryMap<'a> {
    /// Validate `bytes` as a sequence of memory map entries.
    ///
    /// # Errors
    /// [`MemoryMapError::Truncated`] if an entry extends past the buffer, or
    /// [`MemoryMapError::EntryTooSmall`] if an entry's `size` cannot hold the
    /// base, length and type fields.
    pub fn new(bytes: &'a [u8]) -> Result<Self, MemoryMapError> {
        let mut offset = 0;
        while offset < bytes.len() {
            let size = read_u32(bytes, offset).ok_or(MemoryMapError::Truncated { offset })?;
            if (size as usize) < ENTRY_PAYLOAD {
                return Err(MemoryMapError::EntryTooSmall { offset, size });
            }
            let next = offset
                .checked_add(SIZE_FIELD + size as usize)
                .ok_or(MemoryMapError::Truncated { offset })?;
            if next > bytes.len() {
                return Err(MemoryMapError::Truncated { offset });
            }
            offset = next;
        }
        Ok(Self { bytes })
    }

    /// Build a map over raw memory handed over by the bootloader.
    ///
    /// # Errors
    /// See [`MemoryMap::new`].
    ///
    /// # Safety
    /// `ptr .. ptr + len` must be readable and unmodified for `'a`.
    #[allow(unsafe_code)]
    pub unsafe fn from_raw(ptr: *const u8, len: usize) -> Result<Self, MemoryMapError> {
        if ptr.is_null() || len == 0 {
            return Self::new(&[]);
        }
        let bytes = unsafe { core::slice::from_raw_parts(ptr, len) };
        Self::new(bytes)
    }

    /// Iterate over all regions in bootloader order.
    #[must_use]
    pub const fn regions(&self) -> Regions<'a> {
        Regions {
            bytes: self.bytes,
            offset: 0,
        }
    }

    /// Sum of the lengths of all [`RegionKind::Usable`] regions.
    #[must_use]
    pub fn total_usable_bytes(&self) -> u64 {
        self.regions()
            .filter(MemoryRegion::is_usable)
            .fold(0u64, |acc, r| acc.saturating_add(r.length))
    }

    /// The default kernel heap: from the page after `kernel_end` to the end of
    /// the usable region containing it, clipped to `limit`.
    ///
    /// The clip keeps the heap inside memory that is mapped before paging is
    /// enabled, so the allocator never raises a page fault.
    ///
    /// # Errors
    /// [`MemoryMapError::NoHeapRegion`] if no usable region contains
    /// `kernel_end` or nothing remains after alignment and clipping.
    pub fn heap_region(&self, kernel_end: u64, limit: u64) -> Result<Range<u64>, MemoryMapError> {
        let err = MemoryMapError::NoHeapRegion { kernel_end };
        let region = self
            .regions()
            .find(|r| r.is_usable() && r.contains(kernel_end))
            .ok_or(err)?;

        let start = align_up(kernel_end, PAGE_SIZE);
        let end = align_down(region.end().min(limit), PAGE_SIZE);
        if start >= end {
            return Err(err);
        }
        Ok(start..end)
    }
}

/// Split up to `frames` page-sized frames off the top of `heap`.
///
/// Returns `(heap, tables)`. The tables never take more than half of the
/// pages, so a small region still leaves a heap.
#[must_use]
pub fn split_table_frames(heap: Range<u64>, frames: u64) -> (Range<u64>, Range<u64>) {
    let pages = heap.end.saturating_sub(heap.start) / PAGE_SIZE;
    let split = heap.end - frames.min(pages / 2) * PAGE_SIZE;
    (heap.start..split, split..heap.end)
}

impl<'a> IntoIterator for &MemoryMap<'a> {
    type Item = MemoryRegion;
    type IntoIter = Regions<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions()
    }
}

impl fmt::Display for MemoryMap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for region in self.regions() {
            writeln!(f, "{region}")?;
        }
        Ok(())
    }
}

/// Iterator over the entries of a [`MemoryMap`].
#[derive(Debug, Clone)]
pub struct Regions<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl Iterator for Regions<'_> {
    type Item = MemoryRegion;

    fn next(&mut self) -> Option<Self::Item> {
        let at = self.offset;
        let size = read_u32(self.bytes, at)?;
        let base = read_u64(self.bytes, at + 4)?;
        let length = read_u64(self.bytes, at + 12)?;
        let kind = read_u32(self.bytes, at + 20)?;
        self.offset = at + SIZE_FIELD + size as usize;
        Some(MemoryRegion {
            base,
            length,
            kind: RegionKind::from_raw(kind),
        })
    }
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw = bytes.get(at..at.checked_add(4)?)?;
    raw.try_into().ok().map(u32::from_le_bytes)
}

fn read_u64(bytes: &[u8], at: usize) -> Option<u64> {
    let raw = bytes.get(at..at.checked_add(8)?)?;
    raw.try_into().ok().map(u64::from_le_bytes)
}
