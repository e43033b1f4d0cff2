//! # Page Table Manager
//!
//! Owns the PAE hierarchy the kernel runs on:
//!
//! ```text
//!  PDPT[0] ──► PD ──► PD[0] ──► PT (identity map of the first 2 MiB)
//!   │            └──► PD[n] ──► table from the frame allocator   (faults below 1 GiB)
//!   └ PDPT[k] ──► directory from the frame allocator ──► table from the frame allocator
//! ```
//!
//! [`init_tables`](PageTableManager::init_tables) builds the boot tables.
//! [`handle_fault`](PageTableManager::handle_fault) installs one 4 KiB leaf
//! per not-present fault. Every installation is a single-entry insert into a
//! table that is already reachable: missing levels are zeroed and filled
//! first, then linked with one final store. A fault taken while the manager
//! is mid-update therefore never sees a half-built level.

use crate::{
    FrameAlloc, PAGE_SIZE, PageBacking, PageDirectoryPointerTable, PageEntryBits, PageFault,
    PageFaultError, PageTable, PdptEntry, PhysMapper, PhysicalAddress, VirtualAddress, get_pdpt,
    get_table, info, split_indices,
};
use log::{debug, warn};

/// Physical placement of the paging structures.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PagingLayout {
    pub pdpt: PhysicalAddress,
    /// Directory linked from `PDPT[0]`.
    pub pd: PhysicalAddress,
    /// Identity-map table linked from `PD[0]`.
    pub pt: PhysicalAddress,
    pub scratch_pd: PhysicalAddress,
    pub scratch_pt: PhysicalAddress,
    /// Number of 4 KiB pages identity mapped from address 0. At most 512.
    pub identity_pages: u64,
}

impl PagingLayout {
    /// The fixed layout the kernel boots with.
    pub const BOOT: Self = Self {
        pdpt: PhysicalAddress::new(info::PDPT_PHYS),
        pd: PhysicalAddress::new(info::PD_PHYS),
        pt: PhysicalAddress::new(info::PT_PHYS),
        scratch_pd: PhysicalAddress::new(info::SCRATCH_PD_PHYS),
        scratch_pt: PhysicalAddress::new(info::SCRATCH_PT_PHYS),
        identity_pages: info::IDENTITY_PAGES,
    };

    /// The scratch frames, in the order the fault handler should use them.
    #[must_use]
    pub const fn scratch_frames(&self) -> [PhysicalAddress; 2] {
        [self.scratch_pd, self.scratch_pt]
    }
}

/// What a successfully handled fault did.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FaultResolution {
    /// A new leaf now maps `page` to `frame`.
    Mapped {
        page: VirtualAddress,
        frame: PhysicalAddress,
        /// A PDPT entry was written; CR3 must be reloaded before resuming.
        pdpt_changed: bool,
    },
    /// The leaf was already present; nothing was installed.
    AlreadyMapped { page: VirtualAddress },
}

impl FaultResolution {
    #[must_use]
    pub const fn requires_cr3_reload(&self) -> bool {
        matches!(self, Self::Mapped { pdpt_changed: true, .. })
    }

    #[must_use]
    pub const fn page(&self) -> VirtualAddress {
        match *self {
            Self::Mapped { page, .. } | Self::AlreadyMapped { page } => page,
        }
    }
}

/// Unrecoverable page-fault outcomes.
#[derive(Debug, Copy, Clone, thiserror::Error)]
pub enum FaultError {
    #[error("protection violation at {address} ({}): {}", .error.conditions(), .error.explain())]
    ProtectionViolation {
        address: VirtualAddress,
        error: PageFaultError,
    },
    #[error("no page-table frame left to map {address}")]
    OutOfTables { address: VirtualAddress },
    #[error("no physical frame backs page {page}")]
    NoBackingFrame { page: VirtualAddress },
}

/// Builds and extends the PAE hierarchy.
///
/// * `M` reaches table frames by physical address.
/// * `A` supplies frames for directories and tables created on fault.
/// * `B` picks the frame behind each faulted page.
pub struct PageTableManager<M, A, B> {
    mapper: M,
    frames: A,
    backing: B,
    layout: PagingLayout,
    /// A frame taken for a level that could not be completed.
    spare: Option<PhysicalAddress>,
    installed: usize,
}

impl<M: PhysMapper, A: FrameAlloc, B: PageBacking> PageTableManager<M, A, B> {
    /// # Safety
    /// Every frame in `layout` and every frame `frames` hands out must be
    /// 4 KiB of memory owned exclusively by this manager and writable
    /// through `mapper` for as long as the manager lives.
    pub const unsafe fn new(mapper: M, frames: A, backing: B, layout: PagingLayout) -> Self {
        Self {
            mapper,
            frames,
            backing,
            layout,
            spare: None,
            installed: 0,
        }
    }

    #[must_use]
    pub const fn layout(&self) -> &PagingLayout {
        &self.layout
    }

    #[must_use]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    #[must_use]
    pub const fn frames(&self) -> &A {
        &self.frames
    }

    /// Leaves installed by fault handling since construction.
    #[must_use]
    pub const fn installed_pages(&self) -> usize {
        self.installed
    }

    #[inline]
    unsafe fn pdpt<'a>(&self) -> &'a mut PageDirectoryPointerTable {
        unsafe { get_pdpt(&self.mapper, self.layout.pdpt) }
    }

    #[inline]
    unsafe fn table<'a>(&self, pa: PhysicalAddress) -> &'a mut PageTable {
        unsafe { get_table(&self.mapper, pa) }
    }

    /// Zero all five table frames and build the identity map.
    ///
    /// Afterwards `PDPT[0] → PD`, `PD[0] → PT`, and `PT[i]` maps page `i`
    /// onto itself for `i < identity_pages`. Every other address is
    /// not-present. Does not touch control registers.
    pub fn init_tables(&mut self) {
        let l = self.layout;
        let count = usize::try_from(l.identity_pages)
            .map_or(crate::TABLE_ENTRIES, |n| n.min(crate::TABLE_ENTRIES));

        // SAFETY: the frames are owned by this manager (see `new`).
        let (pdpt, pd, pt) = unsafe { (self.pdpt(), self.table(l.pd), self.table(l.pt)) };
        pdpt.zero();
        pd.zero();
        pt.zero();
        unsafe {
            self.table(l.scratch_pd).zero();
            self.table(l.scratch_pt).zero();
        }

        let mut frame = PhysicalAddress::zero();
        for i in 0..count {
            pt.set(i, PageEntryBits::new_kernel_rw(frame));
            frame = frame + PAGE_SIZE;
        }

        pd.set(0, PageEntryBits::new_kernel_rw(l.pt));
        pdpt.set(crate::PdptIndex::new(0), PdptEntry::new_present(l.pd));
        debug!(
            "paging: identity mapped {} pages, PDPT at {}",
            count, l.pdpt
        );
    }

    /// Walk the hierarchy for `va`.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let (i3, i2, i1) = split_indices(va);
        // SAFETY: only frames linked by this manager are visited.
        let pdpte = unsafe { self.pdpt() }.get(i3);
        if !pdpte.present() {
            return None;
        }

        let pde = unsafe { self.table(pdpte.physical_address()) }.pde(i2);
        if !pde.present() {
            return None;
        }
        if pde.large_page() {
            let offset = u64::from(va.as_u32() & 0x001F_FFFF);
            return Some(pde.physical_address() + offset);
        }

        let pte = unsafe { self.table(pde.physical_address()) }.pte(i1);
        pte.present()
            .then(|| pte.physical_address() + u64::from(va.page_offset()))
    }

    /// Resolve a page fault.
    ///
    /// Logs one diagnostic line. A not-present fault installs a
    /// `present | writable` leaf for the faulting page, linking a directory
    /// and/or table from the frame pool where the walk hits a gap. A second
    /// fault on an installed page reports [`FaultResolution::AlreadyMapped`].
    ///
    /// # Errors
    /// - [`FaultError::ProtectionViolation`] if the page was present.
    /// - [`FaultError::NoBackingFrame`] if the backing policy has no frame.
    /// - [`FaultError::OutOfTables`] if a level is missing and the frame
    ///   allocator is empty; no entry is written in that case and no frame
    ///   is lost.
    pub fn handle_fault(&mut self, fault: PageFault) -> Result<FaultResolution, FaultError> {
        warn!("{fault}");

        if fault.error.present() {
            return Err(FaultError::ProtectionViolation {
                address: fault.address,
                error: fault.error,
            });
        }

        let page = fault.address.page_base();
        let frame = self
            .backing
            .frame_for(page)
            .ok_or(FaultError::NoBackingFrame { page })?;
        debug_assert!(frame.is_aligned_to(PAGE_SIZE));

        self.install(page, frame)
    }

    /// [`handle_fault`](Self::handle_fault) for the interrupt path.
    ///
    /// # Panics
    /// On any [`FaultError`]; there is no way to resume the faulting code.
    pub fn dispatch(&mut self, fault: PageFault) -> FaultResolution {
        match self.handle_fault(fault) {
            Ok(resolution) => resolution,
            Err(e) => panic!("Page Fault: {e}"),
        }
    }

    fn install(
        &mut self,
        page: VirtualAddress,
        frame: PhysicalAddress,
    ) -> Result<FaultResolution, FaultError> {
        let (i3, i2, i1) = split_indices(page);
        let leaf = PageEntryBits::new_kernel_rw(frame);

        // SAFETY: the PDPT frame is owned by this manager (see `new`).
        let pdpt = unsafe { self.pdpt() };
        let pdpte = pdpt.get(i3);

        if !pdpte.present() {
            // Need a directory and a table. Take both before writing anything
            // so exhaustion leaves the hierarchy untouched.
            let pd_pa = self.alloc_table(page)?;
            let pt_pa = match self.alloc_table(page) {
                Ok(pa) => pa,
                Err(e) => {
                    self.spare = Some(pd_pa);
                    return Err(e);
                }
            };
            let (pd, pt) = unsafe { (self.table(pd_pa), self.table(pt_pa)) };
            pt.set_pte(i1, leaf);
            pd.set_pde(i2, PageEntryBits::new_kernel_rw(pt_pa));
            pdpt.set(i3, PdptEntry::new_present(pd_pa));
            return Ok(self.mapped(page, frame, true));
        }

        let pd = unsafe { self.table(pdpte.physical_address()) };
        let pde = pd.pde(i2);

        if !pde.present() {
            let pt_pa = self.alloc_table(page)?;
            let pt = unsafe { self.table(pt_pa) };
            pt.set_pte(i1, leaf);
            pd.set_pde(i2, PageEntryBits::new_kernel_rw(pt_pa));
            return Ok(self.mapped(page, frame, false));
        }

        let pt = unsafe { self.table(pde.physical_address()) };
        if pt.pte(i1).present() {
            debug!("paging: {page} already mapped");
            return Ok(FaultResolution::AlreadyMapped { page });
        }

        pt.set_pte(i1, leaf);
        Ok(self.mapped(page, frame, false))
    }

    /// Take a frame (the spare first) and clear it.
    fn alloc_table(&mut self, address: VirtualAddress) -> Result<PhysicalAddress, FaultError> {
        let pa = self
            .spare
            .take()
            .or_else(|| self.frames.alloc_4k())
            .ok_or(FaultError::OutOfTables { address })?;
        debug_assert!(pa.is_aligned_to(PAGE_SIZE));
        unsafe { self.table(pa) }.zero();
        debug!("paging: new table at {pa} for {address}");
        Ok(pa)
    }

    fn mapped(&mut self, page: VirtualAddress, frame: PhysicalAddress, pdpt_changed: bool) -> FaultResolution {
        self.installed += 1;
        debug!("paging: mapped {page} -> {frame}");
        FaultResolution::Mapped {
            page,
            frame,
            pdpt_changed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BumpFrameAlloc, FramePool, IdentityBacking, PdIndex, PdptIndex, PtIndex, flags};

    /// A 4 KiB-aligned raw frame. We use this as our "physical RAM" backing store in tests.
    #[repr(align(4096))]
    struct Aligned4K(#[allow(dead_code)] [u8; 4096]);

    /// A tiny in-memory "RAM" where physical address `n * 4096` is frame `n`.
    ///
    /// The frames are leaked once so every reference handed out is derived
    /// from the same raw pointer.
    struct TestPhys {
        base: *mut Aligned4K,
        len: usize,
    }

    impl TestPhys {
        fn with_frames(n: usize) -> Self {
            let mut v = Vec::with_capacity(n);
            for _ in 0..n {
                // Poison so tests notice frames that were not zeroed.
                v.push(Aligned4K([0xA5; 4096]));
            }
            let frames: &'static mut [Aligned4K] = Box::leak(v.into_boxed_slice());
            Self {
                base: frames.as_mut_ptr(),
                len: n,
            }
        }
    }

    impl PhysMapper for TestPhys {
        unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
            let idx = (pa.as_u64() >> 12) as usize;
            let off = (pa.as_u64() & 0xfff) as usize;
            // For page tables we expect offset==0; assert to catch misuse in the test.
            assert_eq!(off, 0);
            assert!(idx < self.len, "{pa} outside test RAM");
            unsafe { &mut *self.base.add(idx).cast::<T>() }
        }
    }

    /// A trivial **bump** allocator: always hands out the next 4 KiB frame.
    struct BumpAlloc {
        next: u64,
        end: u64,
    }

    impl FrameAlloc for BumpAlloc {
        fn alloc_4k(&mut self) -> Option<PhysicalAddress> {
            if self.next + 4096 > self.end {
                return None;
            }
            let p = self.next;
            self.next += 4096;
            Some(PhysicalAddress::new(p))
        }
    }

    /// Backs every page with a frame 16 MiB higher.
    struct OffsetBacking;

    impl PageBacking for OffsetBacking {
        fn frame_for(&mut self, page: VirtualAddress) -> Option<PhysicalAddress> {
            Some(page.identity() + 0x0100_0000)
        }
    }

    struct NoFrames;

    impl PageBacking for NoFrames {
        fn frame_for(&mut self, _page: VirtualAddress) -> Option<PhysicalAddress> {
            None
        }
    }

    type BootManager = PageTableManager<TestPhys, FramePool<2>, IdentityBacking>;

    fn boot_manager() -> BootManager {
        let layout = PagingLayout::BOOT;
        let pool = FramePool::new(layout.scratch_frames());
        let mut m = unsafe { PageTableManager::new(TestPhys::with_frames(8), pool, IdentityBacking, layout) };
        m.init_tables();
        m
    }

    fn not_present(addr: u32, write: bool) -> PageFault {
        PageFault::new(
            VirtualAddress::new(addr),
            PageFaultError::new().with_write(write),
        )
    }

    fn raw_pdpte<A: FrameAlloc, B: PageBacking>(m: &PageTableManager<TestPhys, A, B>, i: u8) -> u64 {
        unsafe { get_pdpt(m.mapper(), m.layout().pdpt) }
            .get(PdptIndex::new(i))
            .into_bits()
    }

    #[test]
    fn init_tables_identity_maps_low_memory() {
        let m = boot_manager();
        for addr in [0u32, 0x1000, 0x0010_0123, 0x001F_FFFF] {
            assert_eq!(
                m.translate(VirtualAddress::new(addr)),
                Some(PhysicalAddress::new(u64::from(addr)))
            );
        }
        assert_eq!(m.translate(VirtualAddress::new(0x0020_0000)), None);
        assert_eq!(m.translate(VirtualAddress::new(0x4000_0000)), None);

        assert_eq!(raw_pdpte(&m, 0), 0x2000 | flags::PRESENT);
        for i in 1..4 {
            assert_eq!(raw_pdpte(&m, i), 0);
        }

        let pd = unsafe { get_table(m.mapper(), m.layout().pd) };
        assert_eq!(pd.get(0).into_bits(), 0x3000 | flags::PRESENT | flags::WRITABLE);
        assert_eq!(pd.present_count(), 1);

        let pt = unsafe { get_table(m.mapper(), m.layout().pt) };
        assert_eq!(pt.present_count(), 512);
        assert_eq!(pt.get(511).into_bits(), 0x001F_F000 | flags::PRESENT | flags::WRITABLE);

        let scratch = unsafe { get_table(m.mapper(), m.layout().scratch_pt) };
        assert_eq!(scratch.present_count(), 0);
    }

    #[test]
    fn fault_in_first_gigabyte_links_scratch_table() {
        let mut m = boot_manager();
        let r = m.handle_fault(not_present(0x0040_1234, true)).unwrap();
        assert_eq!(
            r,
            FaultResolution::Mapped {
                page: VirtualAddress::new(0x0040_1000),
                frame: PhysicalAddress::new(0x0040_1000),
                pdpt_changed: false,
            }
        );
        assert!(!r.requires_cr3_reload());
        assert_eq!(
            m.translate(VirtualAddress::new(0x0040_1234)),
            Some(PhysicalAddress::new(0x0040_1234))
        );

        let pd = unsafe { get_table(m.mapper(), m.layout().pd) };
        let pde = pd.pde(PdIndex::new(2));
        assert!(pde.present() && pde.writable());
        assert_eq!(pde.physical_address(), m.layout().scratch_pd);
        assert_eq!(m.frames().remaining(), 1);
        assert_eq!(m.installed_pages(), 1);
    }

    #[test]
    fn fault_handling_is_idempotent() {
        let mut m = boot_manager();
        let va = 0x0060_0010;
        assert!(matches!(
            m.handle_fault(not_present(va, false)),
            Ok(FaultResolution::Mapped { .. })
        ));
        let again = m.handle_fault(not_present(va + 8, false)).unwrap();
        assert_eq!(
            again,
            FaultResolution::AlreadyMapped {
                page: VirtualAddress::new(0x0060_0000)
            }
        );
        assert_eq!(m.installed_pages(), 1);
        assert_eq!(m.frames().remaining(), 1);
    }

    #[test]
    fn neighbouring_pages_share_the_new_table() {
        let mut m = boot_manager();
        m.handle_fault(not_present(0x0040_0000, false)).unwrap();
        m.handle_fault(not_present(0x0040_5000, false)).unwrap();
        m.handle_fault(not_present(0x005F_F000, false)).unwrap();
        assert_eq!(m.installed_pages(), 3);
        assert_eq!(m.frames().remaining(), 1);

        let pt_pa = m.layout().scratch_pd;
        let pt = unsafe { get_table(m.mapper(), pt_pa) };
        assert_eq!(pt.present_count(), 3);
        assert!(pt.pte(PtIndex::new(5)).present());
    }

    #[test]
    fn fault_above_first_gigabyte_chains_directory_and_table() {
        let mut m = boot_manager();
        let r = m.handle_fault(not_present(0xC000_2ABC, true)).unwrap();
        assert!(r.requires_cr3_reload());
        assert_eq!(r.page(), VirtualAddress::new(0xC000_2000));
        assert_eq!(m.frames().remaining(), 0);

        // PDPT entries carry only the present bit.
        let pdpte = raw_pdpte(&m, 3);
        assert_eq!(pdpte & !flags::ADDR_MASK, flags::PRESENT);
        assert_eq!(pdpte & flags::ADDR_MASK, m.layout().scratch_pd.as_u64());

        assert_eq!(
            m.translate(VirtualAddress::new(0xC000_2ABC)),
            Some(PhysicalAddress::new(0xC000_2ABC))
        );
        // The identity map is unaffected.
        assert_eq!(
            m.translate(VirtualAddress::new(0x0000_5000)),
            Some(PhysicalAddress::new(0x5000))
        );
    }

    #[test]
    fn exhausted_pool_is_reported_without_partial_links() {
        let mut m = boot_manager();
        m.handle_fault(not_present(0x0040_0000, false)).unwrap();
        assert_eq!(m.frames().remaining(), 1);

        // A directory is available but the table is not.
        let err = m.handle_fault(not_present(0x8000_0000, false)).unwrap_err();
        assert!(matches!(err, FaultError::OutOfTables { .. }));
        assert_eq!(raw_pdpte(&m, 2), 0);
        assert_eq!(m.translate(VirtualAddress::new(0x8000_0000)), None);
        assert_eq!(m.installed_pages(), 1);

        // The directory frame taken for the failed fault is not lost.
        let r = m.handle_fault(not_present(0x0080_0000, false)).unwrap();
        assert!(!r.requires_cr3_reload());
        let pd = unsafe { get_table(m.mapper(), m.layout().pd) };
        assert_eq!(pd.pde(PdIndex::new(4)).physical_address(), m.layout().scratch_pt);
        assert_eq!(m.installed_pages(), 2);
    }

    #[test]
    fn table_frames_come_from_memory_after_the_scratch_frames() {
        let layout = PagingLayout::BOOT;
        // Frames 6..16 of the test RAM stand in for usable memory.
        let frames = BumpFrameAlloc::new(layout.scratch_frames(), 0x6000..0x1_0000);
        let mut m = unsafe { PageTableManager::new(TestPhys::with_frames(16), frames, IdentityBacking, layout) };
        m.init_tables();
        assert_eq!(m.frames().remaining(), 12);

        // Three 2 MiB regions in the first GiB, then two more gigabytes.
        for addr in [0x0040_0000, 0x0080_0000, 0x00C0_0000, 0x4000_0000, 0xC000_0000] {
            let r = m.handle_fault(not_present(addr, true)).unwrap();
            assert_eq!(r.page(), VirtualAddress::new(addr));
            assert_eq!(
                m.translate(VirtualAddress::new(addr + 0x10)),
                Some(PhysicalAddress::new(u64::from(addr) + 0x10))
            );
        }
        assert_eq!(m.installed_pages(), 5);
        assert_eq!(m.frames().remaining(), 5);

        let pd = unsafe { get_table(m.mapper(), m.layout().pd) };
        assert_eq!(pd.pde(PdIndex::new(2)).physical_address(), layout.scratch_pd);
        assert_eq!(pd.pde(PdIndex::new(4)).physical_address(), layout.scratch_pt);
        assert_eq!(pd.pde(PdIndex::new(6)).physical_address(), PhysicalAddress::new(0x6000));
        assert_eq!(raw_pdpte(&m, 1) & flags::ADDR_MASK, 0x7000);
        assert_eq!(raw_pdpte(&m, 3) & flags::ADDR_MASK, 0x9000);

        // Earlier mappings survive later ones.
        assert_eq!(
            m.translate(VirtualAddress::new(0x0040_0000)),
            Some(PhysicalAddress::new(0x0040_0000))
        );
    }

    #[test]
    fn protection_violation_is_an_error() {
        let mut m = boot_manager();
        let fault = PageFault::new(
            VirtualAddress::new(0x0010_0000),
            PageFaultError::new().with_present(true).with_write(true),
        );
        let err = m.handle_fault(fault).unwrap_err();
        assert!(matches!(err, FaultError::ProtectionViolation { .. }));
        assert_eq!(m.installed_pages(), 0);
    }

    #[test]
    #[should_panic(expected = "protection violation")]
    fn dispatch_panics_on_protection_violation() {
        let mut m = boot_manager();
        let fault = PageFault::from_raw(0x0010_0000, 0b011);
        let _ = m.dispatch(fault);
    }

    #[test]
    fn dispatch_returns_resolution() {
        let mut m = boot_manager();
        let r = m.dispatch(PageFault::from_raw(0x0020_0000, 0));
        assert_eq!(r.page(), VirtualAddress::new(0x0020_0000));
    }

    #[test]
    fn backing_policy_chooses_the_frame() {
        let layout = PagingLayout::BOOT;
        let phys = TestPhys::with_frames(64);
        let bump = BumpAlloc {
            next: 0x8000,
            end: 64 << 12,
        };
        let mut m = unsafe { PageTableManager::new(phys, bump, OffsetBacking, layout) };
        m.init_tables();

        let r = m.handle_fault(not_present(0x4000_0010, true)).unwrap();
        assert_eq!(
            r,
            FaultResolution::Mapped {
                page: VirtualAddress::new(0x4000_0000),
                frame: PhysicalAddress::new(0x4100_0000),
                pdpt_changed: true,
            }
        );
        assert_eq!(
            m.translate(VirtualAddress::new(0x4000_0010)),
            Some(PhysicalAddress::new(0x4100_0010))
        );
        // Tables came from the bump allocator, not the scratch frames.
        assert_eq!(m.frames().next, 0xA000);
    }

    #[test]
    fn missing_backing_frame_is_reported() {
        let layout = PagingLayout::BOOT;
        let pool = FramePool::new(layout.scratch_frames());
        let mut m = unsafe { PageTableManager::new(TestPhys::with_frames(8), pool, NoFrames, layout) };
        m.init_tables();
        let err = m.handle_fault(not_present(0x0040_0000, false)).unwrap_err();
        assert!(matches!(err, FaultError::NoBackingFrame { .. }));
        assert_eq!(m.frames().remaining(), 2);
    }

    #[test]
    fn error_messages_name_the_address() {
        let e = FaultError::OutOfTables {
            address: VirtualAddress::new(0x8000_0000),
        };
        assert_eq!(e.to_string(), "no page-table frame left to map 0x80000000");
    }
}
