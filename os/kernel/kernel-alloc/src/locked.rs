//! # Locked Heap
//!
//! The kernel-wide [`Heap`] behind a [`SpinLock`]. Every operation holds the
//! lock with interrupts masked, so an interrupt handler that allocates can
//! never observe a half-split or half-merged block chain.

use crate::block::UNIT_SIZE;
use crate::{Heap, HeapError, HeapStats};
use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};
use kernel_sync::SpinLock;
use log::error;

pub struct LockedHeap {
    inner: SpinLock<Heap<'static>>,
}

impl Default for LockedHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl LockedHeap {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: SpinLock::new(Heap::new()),
        }
    }

    /// See [`Heap::init`].
    ///
    /// # Errors
    /// As [`Heap::init`]; a second call reports [`HeapError::Cancelled`].
    pub fn init<I>(&self, spaces: I) -> Result<(), HeapError>
    where
        I: IntoIterator<Item = &'static mut [usize]>,
    {
        self.inner.lock_irq().init(spaces)
    }

    /// See [`Heap::init_from_ranges`].
    ///
    /// # Errors
    /// As [`Heap::init_from_ranges`].
    ///
    /// # Safety
    /// Every range must be writable memory reserved for the heap for the rest
    /// of the kernel's life.
    pub unsafe fn init_from_ranges(&self, starts: &[usize], ends: &[usize]) -> Result<(), HeapError> {
        unsafe { self.inner.lock_irq().init_from_ranges(starts, ends) }
    }

    pub fn malloc(&self, size: usize) -> Option<NonNull<u8>> {
        self.inner.lock_irq().malloc(size)
    }

    /// # Errors
    /// As [`Heap::free`].
    pub fn free(&self, ptr: NonNull<u8>) -> Result<(), HeapError> {
        self.inner.lock_irq().free(ptr)
    }

    #[must_use]
    pub fn stats(&self) -> HeapStats {
        self.inner.lock_irq().stats()
    }

    /// Run `f` on the heap under the lock.
    pub fn with_heap<R>(&self, f: impl FnOnce(&mut Heap<'static>) -> R) -> R {
        let mut heap = self.inner.lock_irq();
        f(&mut heap)
    }
}

/// Serves `alloc` collections. Alignments above one word are refused.
unsafe impl GlobalAlloc for LockedHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > UNIT_SIZE {
            error!("heap: alignment {} not supported", layout.align());
            return ptr::null_mut();
        }
        self.malloc(layout.size()).map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        if let Some(ptr) = NonNull::new(ptr)
            && let Err(e) = self.free(ptr)
        {
            error!("heap: dealloc: {e}");
        }
    }
}
