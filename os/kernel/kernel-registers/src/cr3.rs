use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// CR3: Page-Directory-Pointer-Table Base Register (32-bit PAE paging).
///
/// With `CR4.PAE = 1` outside long mode, CR3 holds the physical address of the
/// four-entry PDPT. The table only needs 32-byte alignment, so the base
/// occupies bits 5–31. Loading CR3 also makes the CPU cache the four PDPT
/// entries; any later PDPT change requires reloading CR3.
#[bitfield(u32)]
pub struct Cr3 {
    /// Bits 0–2: Ignored.
    #[bits(3)]
    _ignored0: u8,

    /// Bit 3 (PWT): Page-level Write-Through (ignored under PAE on most CPUs).
    pub pwt: bool,

    /// Bit 4 (PCD): Page-level Cache Disable (ignored under PAE on most CPUs).
    pub pcd: bool,

    /// Bits 5–31: PDPT physical base >> 5.
    #[bits(27)]
    pdpt_base_32: u32,
}

impl Cr3 {
    /// Create a `Cr3` value from a PDPT physical base address.
    ///
    /// `pdpt_phys` must be 32-byte aligned and below 4 GiB.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_pdpt_phys(pdpt_phys: PhysicalAddress) -> Self {
        debug_assert!(pdpt_phys.is_aligned_to(32), "PDPT base must be 32-byte aligned");
        debug_assert!(pdpt_phys.as_u64() <= u64::from(u32::MAX), "PDPT must live below 4 GiB");
        Self::new().with_pdpt_base_32((pdpt_phys.as_u64() >> 5) as u32)
    }

    /// Return the full physical address of the PDPT.
    #[must_use]
    pub fn pdpt_phys(&self) -> PhysicalAddress {
        PhysicalAddress::new(u64::from(self.pdpt_base_32()) << 5)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::LoadRegisterUnsafe for Cr3 {
    unsafe fn load_unsafe() -> Self {
        let cr3: u32;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr3)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::StoreRegisterUnsafe for Cr3 {
    unsafe fn store_unsafe(self) {
        let cr3 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) cr3, options(nostack, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdpt_base_is_stored_verbatim() {
        let cr3 = Cr3::from_pdpt_phys(PhysicalAddress::new(0x1000));
        assert_eq!(cr3.into_bits(), 0x1000);
        assert_eq!(cr3.pdpt_phys(), PhysicalAddress::new(0x1000));
        assert!(!cr3.pwt());
        assert!(!cr3.pcd());
    }

    #[test]
    fn thirty_two_byte_alignment_suffices() {
        let cr3 = Cr3::from_pdpt_phys(PhysicalAddress::new(0x0012_34E0));
        assert_eq!(cr3.pdpt_phys().as_u64(), 0x0012_34E0);
    }
}
