use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// Raw masks for the PAE entry bits, for code that works on plain `u64`s
/// (assembly stubs, dumps, tests).
///
/// | Bit(s) | Mask | Name | Page directory / table entry |
/// |--------|------|------|------------------------------|
/// | 0 | `0x001` | `PRESENT` | valid entry |
/// | 1 | `0x002` | `WRITABLE` | writes allowed |
/// | 2 | `0x004` | `USER` | CPL 3 may access |
/// | 3 | `0x008` | `WRITE_THROUGH` | PWT |
/// | 4 | `0x010` | `CACHE_DISABLE` | PCD |
/// | 5 | `0x020` | `ACCESSED` | set by CPU |
/// | 6 | `0x040` | `DIRTY` | set by CPU on write (leaf) |
/// | 7 | `0x080` | `PAGE_SIZE` | 2 MiB leaf in a PDE |
/// | 8 | `0x100` | `GLOBAL` | survives CR3 reload (leaf) |
/// | 12–51 | `ADDR_MASK` | frame | 4 KiB-aligned physical base |
/// | 63 | `NO_EXECUTE` | XD | needs `EFER.NXE` |
///
/// PDPT entries only define `PRESENT`, `WRITE_THROUGH` and `CACHE_DISABLE`;
/// every other low bit is reserved there and must stay clear.
pub mod flags {
    pub const PRESENT: u64 = 1 << 0;
    pub const WRITABLE: u64 = 1 << 1;
    pub const USER: u64 = 1 << 2;
    pub const WRITE_THROUGH: u64 = 1 << 3;
    pub const CACHE_DISABLE: u64 = 1 << 4;
    pub const ACCESSED: u64 = 1 << 5;
    pub const DIRTY: u64 = 1 << 6;
    pub const PAGE_SIZE: u64 = 1 << 7;
    pub const GLOBAL: u64 = 1 << 8;
    pub const NO_EXECUTE: u64 = 1 << 63;

    /// Physical frame bits `[51:12]`.
    pub const ADDR_MASK: u64 = 0x000F_FFFF_FFFF_F000;

    /// Bits a PDPT entry may carry besides the address.
    pub const PDPT_ALLOWED: u64 = PRESENT | WRITE_THROUGH | CACHE_DISABLE;
}

/// A 64-bit PAE page-directory or page-table entry.
///
/// Page directories and page tables share this layout under PAE. A PDE with
/// `large_page` set maps a 2 MiB page directly; this kernel only ever builds
/// PDEs that point to page tables.
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalAddress;
/// # use kernel_vmem::{PageEntryBits, flags};
/// let e = PageEntryBits::new_kernel_rw(PhysicalAddress::new(0x0040_3000));
/// assert!(e.present() && e.writable());
/// assert_eq!(e.into_bits(), 0x0040_3000 | flags::PRESENT | flags::WRITABLE);
/// ```
#[bitfield(u64)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Set by the CPU.
    pub accessed: bool,

    /// Dirty (D, bit 6). Set by the CPU on the first write through a leaf.
    pub dirty: bool,

    /// Page Size (PS, bit 7). In a PDE, maps a 2 MiB page; PAT in a PTE.
    pub large_page: bool,

    /// Global (G, bit 8). Leaf only.
    pub global_translation: bool,

    /// OS-available (bits 9..=11).
    #[bits(3)]
    pub os_available: u8,

    /// Physical address bits [51:12] (bits 12..=51).
    #[bits(40)]
    phys_addr_bits_51_12: u64,

    /// Reserved (bits 52..=62), must be zero under PAE.
    #[bits(11)]
    __reserved: u16,

    /// Execute Disable (XD, bit 63). Reserved unless `EFER.NXE` is set.
    pub no_execute: bool,
}

impl PageEntryBits {
    #[inline]
    pub const fn set_physical_address(&mut self, phys: PhysicalAddress) {
        self.set_phys_addr_bits_51_12(phys.as_u64() >> 12);
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.phys_addr_bits_51_12() << 12)
    }

    /// A present, writable, supervisor-only entry pointing at `phys`.
    ///
    /// Used both for leaf mappings and for PDEs linking a page table.
    #[inline]
    #[must_use]
    pub const fn new_kernel_rw(phys: PhysicalAddress) -> Self {
        let mut e = Self::new().with_present(true).with_writable(true);
        e.set_physical_address(phys);
        e
    }
}

/// A PAE page-directory-pointer-table entry.
///
/// Only four of these exist, one per GiB of linear address space. The CPU
/// loads all four into internal registers whenever CR3 is written, so a
/// change here only takes effect after CR3 is reloaded. `RW`/`US` do not
/// exist at this level; setting them raises a general-protection fault at
/// the next CR3 load.
#[bitfield(u64)]
pub struct PdptEntry {
    /// Present (bit 0).
    pub present: bool,

    /// Reserved (bits 1..=2).
    #[bits(2)]
    __reserved_1_2: u8,

    /// Page Write-Through (bit 3).
    pub write_through: bool,

    /// Page Cache Disable (bit 4).
    pub cache_disabled: bool,

    /// Reserved (bits 5..=8).
    #[bits(4)]
    __reserved_5_8: u8,

    /// OS-available (bits 9..=11).
    #[bits(3)]
    pub os_available: u8,

    /// Page directory physical address bits [51:12].
    #[bits(40)]
    phys_addr_bits_51_12: u64,

    /// Reserved (bits 52..=63).
    #[bits(12)]
    __reserved_52_63: u16,
}

impl PdptEntry {
    /// A present entry linking the page directory at `pd`.
    #[inline]
    #[must_use]
    pub const fn new_present(pd: PhysicalAddress) -> Self {
        Self::new()
            .with_present(true)
            .with_phys_addr_bits_51_12(pd.as_u64() >> 12)
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.phys_addr_bits_51_12() << 12)
    }
}
