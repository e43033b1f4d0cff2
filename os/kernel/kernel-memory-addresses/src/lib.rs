//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for the two address kinds a 32-bit PAE kernel deals
//! with:
//!
//! | Type | Width | Meaning |
//! |------|-------|---------|
//! | [`VirtualAddress`] | 32 bit | A linear address as seen by the CPU (and reported in `CR2`). |
//! | [`PhysicalAddress`] | 64 bit | A physical address as stored in PAE paging entries. |
//!
//! With PAE, page-table entries are 64 bits wide and can reference physical
//! memory above 4 GiB, while the linear address space stays 32 bits. Keeping
//! both as distinct types prevents passing one where the other is expected.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x4020_3123);
//! assert_eq!(va.page_base().as_u32(), 0x4020_3000);
//! assert_eq!(va.page_offset(), 0x123);
//!
//! // Identity-map the page: the physical frame has the same base.
//! let pa = va.page_base().identity();
//! assert_eq!(pa.as_u64(), 0x4020_3000);
//! assert!(pa.is_aligned_to(PAGE_SIZE));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

mod physical_address;
mod virtual_address;

pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;

/// Size of the base page (4 KiB) in bytes.
pub const PAGE_SIZE: u64 = 4096;

/// `log2(PAGE_SIZE)`; the number of in-page offset bits.
pub const PAGE_SHIFT: u32 = 12;

/// Align `x` down to the nearest multiple of `a`.
///
/// `a` must be a non-zero power of two.
///
/// ```rust
/// # use kernel_memory_addresses::align_down;
/// assert_eq!(align_down(4095, 4096), 0);
/// assert_eq!(align_down(8191, 4096), 4096);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_down(x: u64, a: u64) -> u64 {
    x & !(a - 1)
}

/// Align `x` up to the nearest multiple of `a`.
///
/// `a` must be a non-zero power of two and `x + a - 1` must not overflow.
///
/// ```rust
/// # use kernel_memory_addresses::align_up;
/// assert_eq!(align_up(1, 4096), 4096);
/// assert_eq!(align_up(4096, 4096), 4096);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_up(x: u64, a: u64) -> u64 {
    (x + a - 1) & !(a - 1)
}

const _: () = {
    assert!(1 << PAGE_SHIFT == PAGE_SIZE);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers() {
        assert_eq!(align_down(0x12345, 16), 0x12340);
        assert_eq!(align_up(0x12345, 16), 0x12350);
        assert_eq!(align_up(0, PAGE_SIZE), 0);
        assert_eq!(align_up(4097, PAGE_SIZE), 8192);
    }
}
