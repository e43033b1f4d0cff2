use bitfield_struct::bitfield;

/// CR4: Control Register 4 (32-bit protected mode).
///
/// Controls paging extensions, extended instruction state management, and
/// various protection features. Bits 23–31 are reserved.
#[bitfield(u32, order = Lsb)]
pub struct Cr4 {
    /// Bit 0 (VME): Virtual-8086 Mode Extensions.
    pub vme: bool,

    /// Bit 1 (PVI): Protected-Mode Virtual Interrupts.
    pub pvi: bool,

    /// Bit 2 (TSD): Time Stamp Disable.
    pub tsd: bool,

    /// Bit 3 (DE): Debugging Extensions.
    pub de: bool,

    /// Bit 4 (PSE): Page Size Extensions (4 MiB pages without PAE).
    pub pse: bool,

    /// Bit 5 (PAE): Physical Address Extension.
    ///
    /// Selects the three-level PDPT → PD → PT walk with 64-bit entries.
    pub pae: bool,

    /// Bit 6 (MCE): Machine-Check Enable.
    pub mce: bool,

    /// Bit 7 (PGE): Page Global Enable.
    pub pge: bool,

    /// Bit 8 (PCE): Performance-Monitoring Counter Enable.
    pub pce: bool,

    /// Bit 9 (OSFXSR): OS supports FXSAVE/FXRSTOR.
    pub osfxsr: bool,

    /// Bit 10 (OSXMMEXCPT): OS supports unmasked SIMD FP exceptions.
    pub osxmmexcpt: bool,

    /// Bit 11 (UMIP): User-Mode Instruction Prevention.
    pub umip: bool,

    /// Bit 12: Reserved in 32-bit mode (LA57 is long-mode only).
    #[bits(default = false)]
    _reserved_12: bool,

    /// Bit 13 (VMXE): VMX Enable.
    pub vmxe: bool,

    /// Bit 14 (SMXE): SMX Enable.
    pub smxe: bool,

    /// Bit 15: Reserved.
    #[bits(default = false)]
    _reserved_15: bool,

    /// Bit 16: FSGSBASE.
    pub fsgsbase: bool,

    /// Bit 17: PCIDE (long mode only, must stay 0 here).
    pub pcide: bool,

    /// Bit 18: OSXSAVE.
    pub osxsave: bool,

    /// Bit 19: Reserved.
    #[bits(default = false)]
    _reserved_19: bool,

    /// Bit 20 (SMEP): Supervisor Mode Execution Prevention.
    pub smep: bool,

    /// Bit 21 (SMAP): Supervisor Mode Access Prevention.
    pub smap: bool,

    /// Bit 22 (PKE): Protection Keys Enable.
    pub pke: bool,

    /// Bits 23–31: Reserved.
    #[bits(9, default = 0)]
    _reserved_23_31: u16,
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::LoadRegisterUnsafe for Cr4 {
    unsafe fn load_unsafe() -> Self {
        let cr4: u32;
        unsafe {
            core::arch::asm!("mov {}, cr4", out(reg) cr4, options(nomem, preserves_flags));
        }
        Self::from_bits(cr4)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::StoreRegisterUnsafe for Cr4 {
    unsafe fn store_unsafe(self) {
        let cr4 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr4, {}", in(reg) cr4, options(nomem, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pae_is_bit_five() {
        assert_eq!(Cr4::new().with_pae(true).into_bits(), 1 << 5);
        assert!(Cr4::from_bits(0x20).pae());
    }
}
