//! The kernel heap: a [`LockedHeap`] serving `alloc`, placed in the free
//! memory after the kernel image. The top of that memory is set aside for
//! page tables created by the fault handler.

use core::ops::Range;
use kernel_alloc::{HeapError, LockedHeap};
use kernel_info::boot::MultibootInfo;
use kernel_info::memory::{IDENTITY_LOW_BYTES, TABLE_FRAMES};
use kernel_info::mmap::{MemoryMap, MemoryMapError, split_table_frames};
use log::{error, info};

#[global_allocator]
pub static HEAP: LockedHeap = LockedHeap::new();

unsafe extern "C" {
    /// First byte after the kernel image, placed by the linker script.
    static end_kernel: u8;
}

#[derive(Debug, Copy, Clone, thiserror::Error)]
pub enum HeapSetupError {
    #[error("heap range {start:#x}..{end:#x} is not addressable")]
    Unaddressable { start: u64, end: u64 },
    #[error("heap: {0}")]
    Heap(#[from] HeapError),
}

/// Identity-mapped memory after the kernel image, divided between the heap
/// and the page-table frames above it.
#[derive(Debug, Clone)]
pub struct BootMemory {
    pub heap: Range<u64>,
    pub tables: Range<u64>,
}

/// Log every region the boot loader reported.
pub fn log_memory_map(map: &MemoryMap<'_>) {
    info!("Memory map:");
    for region in map {
        info!("  {region}");
    }
    info!("Usable memory: {} KiB", map.total_usable_bytes() / 1024);
}

/// Read the boot loader's memory map.
///
/// # Errors
/// If the info block carries no map or the map is malformed.
pub fn memory_map(info: &MultibootInfo) -> Result<MemoryMap<'static>, MemoryMapError> {
    // SAFETY: the map lies in identity-mapped low memory that the kernel
    // never hands out.
    unsafe { info.memory_map() }
}

/// Place the heap and the page-table frames in the usable memory behind
/// the kernel image.
///
/// Both are clipped to the identity map, so neither the heap nor the fault
/// handler writing a new table can fault.
///
/// # Errors
/// If no usable region follows the kernel.
pub fn boot_memory(map: &MemoryMap<'_>) -> Result<BootMemory, MemoryMapError> {
    let kernel_end = (&raw const end_kernel).addr() as u64;
    let region = map.heap_region(kernel_end, IDENTITY_LOW_BYTES)?;
    let (heap, tables) = split_table_frames(region, TABLE_FRAMES);
    info!(
        "Page-table frames at {:#010x}..{:#010x}",
        tables.start, tables.end
    );
    Ok(BootMemory { heap, tables })
}

/// Hand `range` to the global heap.
///
/// # Errors
/// If the range is not addressable or the heap rejects it.
pub fn heap_init(range: Range<u64>) -> Result<(), HeapSetupError> {
    let unaddressable = HeapSetupError::Unaddressable {
        start: range.start,
        end: range.end,
    };
    let start = usize::try_from(range.start).map_err(|_| unaddressable)?;
    let end = usize::try_from(range.end).map_err(|_| unaddressable)?;

    // SAFETY: `boot_memory` placed the range in usable RAM after the kernel
    // image and below the identity limit, apart from the table frames.
    unsafe { HEAP.init_from_ranges(&[start, 0], &[end, 0]) }?;

    let stats = HEAP.stats();
    info!(
        "Heap at {start:#010x}..{end:#010x}: {} bytes free",
        stats.free_bytes()
    );
    Ok(())
}

/// [`heap_init`] that logs instead of failing; the kernel runs on without
/// `alloc` if there is no room.
pub fn try_heap_init(range: Range<u64>) {
    if let Err(e) = heap_init(range) {
        error!("No kernel heap: {e}");
    }
}
