use crate::{PAGE_SHIFT, PAGE_SIZE, PhysicalAddress};
use core::fmt;
use core::ptr::NonNull;

/// 32-bit linear (virtual) address.
///
/// Under PAE paging the address splits into three table indices and an
/// in-page offset:
///
/// ```text
/// | 31‒30 | 29‒21 | 20‒12 | 11‒0   |
/// |  PDPT |   PD  |   PT  | Offset |
/// ```
///
/// The index accessors return raw values; the paging crate wraps them into
/// per-level index types.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let va = VirtualAddress::new(0xC020_3ABC);
/// assert_eq!(va.pdpt_bits(), 3);
/// assert_eq!(va.pd_bits(), 1);
/// assert_eq!(va.pt_bits(), 3);
/// assert_eq!(va.page_offset(), 0xABC);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u32);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Build an address from a pointer.
    ///
    /// On targets with wider pointers only the low 32 bits are kept; the
    /// kernel this crate serves runs with a 32-bit linear address space.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize as u32)
    }

    #[inline]
    #[must_use]
    pub fn from_nonnull<T>(ptr: NonNull<T>) -> Self {
        Self::from_ptr(ptr.as_ptr())
    }

    /// Compose an address from its three table indices (offset zero).
    #[inline]
    #[must_use]
    pub const fn from_indices(pdpt: u32, pd: u32, pt: u32) -> Self {
        debug_assert!(pdpt < 4 && pd < 512 && pt < 512);
        Self((pdpt << 30) | (pd << 21) | (pt << PAGE_SHIFT))
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0 as u64
    }

    /// Page-directory-pointer-table index, bits `[31:30]`.
    #[inline]
    #[must_use]
    pub const fn pdpt_bits(self) -> u32 {
        (self.0 & 0xC000_0000) >> 30
    }

    /// Page-directory index, bits `[29:21]`.
    #[inline]
    #[must_use]
    pub const fn pd_bits(self) -> u32 {
        (self.0 & 0x3FE0_0000) >> 21
    }

    /// Page-table index, bits `[20:12]`.
    #[inline]
    #[must_use]
    pub const fn pt_bits(self) -> u32 {
        (self.0 & 0x001F_F000) >> PAGE_SHIFT
    }

    /// The base of the 4 KiB page containing this address.
    #[inline]
    #[must_use]
    pub const fn page_base(self) -> Self {
        Self(self.0 & !(PAGE_SIZE as u32 - 1))
    }

    #[inline]
    #[must_use]
    pub const fn page_offset(self) -> u32 {
        self.0 & (PAGE_SIZE as u32 - 1)
    }

    /// The physical address this virtual address has under an identity map.
    #[inline]
    #[must_use]
    pub const fn identity(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 as u64)
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:08X})", self.0)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for VirtualAddress {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_decomposition_round_trips() {
        let va = VirtualAddress::new(0x7FFF_F123);
        let back = VirtualAddress::from_indices(va.pdpt_bits(), va.pd_bits(), va.pt_bits());
        assert_eq!(back, va.page_base());
        assert_eq!(va.page_offset(), 0x123);
    }

    #[test]
    fn first_gigabyte_uses_pdpt_slot_zero() {
        assert_eq!(VirtualAddress::new(0x3FFF_FFFF).pdpt_bits(), 0);
        assert_eq!(VirtualAddress::new(0x4000_0000).pdpt_bits(), 1);
        assert_eq!(VirtualAddress::new(0xFFFF_FFFF).pdpt_bits(), 3);
    }

    #[test]
    fn identity_keeps_page_base() {
        let va = VirtualAddress::new(0x0040_1FFF);
        assert_eq!(va.page_base().identity(), PhysicalAddress::new(0x0040_1000));
    }
}
