//! # First-fit block heap
//!
//! A [`Heap`] manages up to [`MAX_SPACES`] spaces. Each space is formatted
//! once by [`Heap::init`] and then carved into blocks by [`Heap::malloc`] and
//! merged back by [`Heap::free`]. See [`crate::block`] for the header layout.

use crate::block::{HEADER_UNITS, MAX_BLOCK_UNITS, UNIT_SIZE, units_for};
use crate::space::{BlockInfo, FIRST_BLOCK, MIN_SPACE_UNITS, Space};
use crate::HeapError;
use arrayvec::ArrayVec;
use core::ptr::NonNull;
use log::{debug, info};

/// Most spaces a heap can register.
pub const MAX_SPACES: usize = 8;

/// Counters of a [`Heap`], in units of [`UNIT_SIZE`] bytes.
///
/// `free_units + used_units == capacity_units` between operations. Block
/// headers count toward the block they describe.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct HeapStats {
    pub free_units: usize,
    pub used_units: usize,
    pub capacity_units: usize,
    pub spaces: usize,
}

impl HeapStats {
    #[must_use]
    pub const fn free_bytes(&self) -> usize {
        self.free_units * UNIT_SIZE
    }

    #[must_use]
    pub const fn used_bytes(&self) -> usize {
        self.used_units * UNIT_SIZE
    }
}

/// The heap proper. Independent instances are fine; the kernel wraps one in
/// a [`LockedHeap`](crate::LockedHeap).
pub struct Heap<'a> {
    spaces: ArrayVec<Space<'a>, MAX_SPACES>,
    free_units: usize,
    used_units: usize,
    capacity_units: usize,
}

impl Default for Heap<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Heap<'a> {
    /// An empty, uninitialized heap. Every allocation fails until
    /// [`init`](Self::init) succeeds.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            spaces: ArrayVec::new_const(),
            free_units: 0,
            used_units: 0,
            capacity_units: 0,
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        !self.spaces.is_empty()
    }

    /// Register the heap spaces, in chain order. One-shot.
    ///
    /// Each slice becomes a space: the space header, one free block covering
    /// the rest, and the zero sentinel. Nothing is written unless every
    /// slice is accepted.
    ///
    /// # Errors
    /// - [`HeapError::Cancelled`] if the heap is already initialized.
    /// - [`HeapError::NoSpaces`] for an empty list.
    /// - [`HeapError::TooManySpaces`] for more than [`MAX_SPACES`].
    /// - [`HeapError::InvalidRange`] for a slice too small to hold a block.
    /// - [`HeapError::SpaceTooLarge`] for a slice whose block would not fit
    ///   the size word.
    pub fn init<I>(&mut self, spaces: I) -> Result<(), HeapError>
    where
        I: IntoIterator<Item = &'a mut [usize]>,
    {
        if self.is_initialized() {
            return Err(HeapError::Cancelled);
        }

        let mut staged = ArrayVec::<&'a mut [usize], MAX_SPACES>::new();
        for words in spaces {
            let start = words.as_ptr().addr();
            if words.len() < MIN_SPACE_UNITS {
                return Err(HeapError::InvalidRange {
                    start,
                    end: start + words.len() * UNIT_SIZE,
                });
            }
            if words.len() - MIN_SPACE_UNITS > MAX_BLOCK_UNITS {
                return Err(HeapError::SpaceTooLarge { units: words.len() });
            }
            staged
                .try_push(words)
                .map_err(|_| HeapError::TooManySpaces { max: MAX_SPACES })?;
        }
        if staged.is_empty() {
            return Err(HeapError::NoSpaces);
        }

        let bases: ArrayVec<usize, MAX_SPACES> =
            staged.iter().map(|w| w.as_ptr().addr()).collect();
        for (i, words) in staged.into_iter().enumerate() {
            let mut space = Space::new(words);
            let units = space.format(bases.get(i + 1).copied().unwrap_or(0));
            debug!(
                "heap: space {i} at {:#x}..{:#x}, {units} units",
                space.base_addr(),
                space.end_addr()
            );
            self.free_units += units;
            self.capacity_units += units;
            self.spaces.push(space);
        }

        info!(
            "heap: {} spaces, {} bytes available",
            self.spaces.len(),
            self.free_units * UNIT_SIZE
        );
        Ok(())
    }

    /// Register heap spaces from zero-terminated lists of `[start, end)`
    /// addresses.
    ///
    /// Entries after the first zero in either list are ignored. Both
    /// addresses of a range must be word aligned, ranges must not overlap,
    /// and both lists must hold the same number of entries.
    ///
    /// # Errors
    /// As [`init`](Self::init); mismatched lists, misaligned, empty or
    /// overlapping ranges report [`HeapError::InvalidRange`].
    ///
    /// # Safety
    /// Every range must be writable memory that nothing else uses for the
    /// lifetime `'a`.
    pub unsafe fn init_from_ranges(
        &mut self,
        starts: &[usize],
        ends: &[usize],
    ) -> Result<(), HeapError> {
        if self.is_initialized() {
            return Err(HeapError::Cancelled);
        }

        let starts = zero_terminated(starts);
        let ends = zero_terminated(ends);
        if starts.len() != ends.len() {
            let i = starts.len().min(ends.len());
            return Err(HeapError::InvalidRange {
                start: starts.get(i).copied().unwrap_or(0),
                end: ends.get(i).copied().unwrap_or(0),
            });
        }
        if starts.len() > MAX_SPACES {
            return Err(HeapError::TooManySpaces { max: MAX_SPACES });
        }

        for (i, (&start, &end)) in starts.iter().zip(ends).enumerate() {
            let invalid = HeapError::InvalidRange { start, end };
            if end <= start || start % UNIT_SIZE != 0 || end % UNIT_SIZE != 0 {
                return Err(invalid);
            }
            let overlaps = starts
                .iter()
                .zip(ends)
                .take(i)
                .any(|(&s, &e)| start < e && s < end);
            if overlaps {
                return Err(invalid);
            }
        }

        let slices = starts.iter().zip(ends).map(|(&start, &end)| {
            let len = (end - start) / UNIT_SIZE;
            // SAFETY: the caller hands us exclusive, writable ranges; they
            // are aligned, non-empty and disjoint (checked above).
            unsafe {
                core::slice::from_raw_parts_mut(core::ptr::with_exposed_provenance_mut(start), len)
            }
        });
        self.init(slices)
    }

    /// Allocate `size` bytes, aligned to [`UNIT_SIZE`].
    ///
    /// First fit over all spaces in chain order. Returns `None` if no free
    /// block is large enough.
    pub fn malloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        let units = units_for(size)?;

        for space in &mut self.spaces {
            let Some(index) = space.find_free(units) else {
                continue;
            };

            let granted = space.take(index, units);
            self.free_units -= granted;
            self.used_units += granted;
            debug!(
                "heap: malloc({size}) -> {granted} units; Free = {} Used = {}",
                self.free_units, self.used_units
            );
            return Some(space.payload(index));
        }

        debug!("heap: malloc({size}) failed, {} units free", self.free_units);
        None
    }

    /// Return a block obtained from [`malloc`](Self::malloc) and merge it
    /// with free neighbours.
    ///
    /// # Errors
    /// - [`HeapError::ForeignPointer`] if `ptr` is not the payload of a
    ///   block of this heap.
    /// - [`HeapError::DoubleFree`] if that block is already free.
    pub fn free(&mut self, ptr: NonNull<u8>) -> Result<(), HeapError> {
        let addr = ptr.as_ptr().addr();
        let foreign = HeapError::ForeignPointer { ptr: addr };

        let space = self
            .spaces
            .iter_mut()
            .find(|s| s.contains(addr))
            .ok_or(foreign)?;
        let block = space.block_for_payload(addr).ok_or(foreign)?;
        if !block.used {
            return Err(HeapError::DoubleFree { ptr: addr });
        }

        let (freed, merged) = space.release(block.index);
        self.free_units += freed;
        self.used_units -= freed;
        debug!(
            "heap: free({addr:#x}) {freed} units, merged block {} units; Free = {} Used = {}",
            space.size(merged).units(),
            self.free_units,
            self.used_units
        );
        Ok(())
    }

    #[must_use]
    pub fn stats(&self) -> HeapStats {
        HeapStats {
            free_units: self.free_units,
            used_units: self.used_units,
            capacity_units: self.capacity_units,
            spaces: self.spaces.len(),
        }
    }

    /// Blocks of space `space` in address order; empty if there is no such
    /// space.
    pub fn blocks(&self, space: usize) -> impl Iterator<Item = BlockInfo> + '_ {
        self.spaces.get(space).into_iter().flat_map(Space::blocks)
    }

    /// Address of the first word of space `space`.
    #[must_use]
    pub fn space_base(&self, space: usize) -> Option<usize> {
        self.spaces.get(space).map(Space::base_addr)
    }

    /// Walk every space and verify the block chain against the counters.
    ///
    /// # Errors
    /// [`HeapError::Corrupt`] naming the first broken space and unit.
    pub fn check_invariants(&self) -> Result<(), HeapError> {
        let mut free = 0;
        let mut used = 0;
        let mut capacity = 0;

        for (i, space) in self.spaces.iter().enumerate() {
            let corrupt = |unit, reason| HeapError::Corrupt {
                space: i,
                unit,
                reason,
            };

            if space.total_units() != space.len() {
                return Err(corrupt(1, "space size word"));
            }
            let next_base = self.space_base(i + 1).unwrap_or(0);
            if space.next_space() != next_base {
                return Err(corrupt(0, "next-space link"));
            }
            let sentinel = space.sentinel();
            if space.prev_raw(sentinel) != 0 || !space.size(sentinel).is_sentinel() {
                return Err(corrupt(sentinel, "sentinel"));
            }

            let mut expected = FIRST_BLOCK;
            let mut prev: Option<BlockInfo> = None;
            for block in space.blocks() {
                if block.index != expected {
                    return Err(corrupt(block.index, "partition"));
                }
                let prev_ok = match prev {
                    None => space.prev_raw(block.index) == 0,
                    Some(p) => block.prev == Some(p.index),
                };
                if !prev_ok {
                    return Err(corrupt(block.index, "prev link"));
                }
                if prev.is_some_and(|p| !p.used) && !block.used {
                    return Err(corrupt(block.index, "adjacent free blocks"));
                }

                if block.used {
                    used += block.units;
                } else {
                    free += block.units;
                }
                expected = block.index + block.units;
                prev = Some(block);
            }
            if expected != sentinel {
                return Err(corrupt(expected, "partition"));
            }
            capacity += space.block_units();
        }

        let stats = self.stats();
        if (free, used, capacity) != (stats.free_units, stats.used_units, stats.capacity_units) {
            return Err(HeapError::Corrupt {
                space: self.spaces.len(),
                unit: 0,
                reason: "counters",
            });
        }
        debug_assert_eq!(free + used, capacity);
        Ok(())
    }
}

/// The prefix of `list` before its first zero.
fn zero_terminated(list: &[usize]) -> &[usize] {
    let len = list.iter().position(|&a| a == 0).unwrap_or(list.len());
    &list[..len]
}

const _: () = assert!(MIN_SPACE_UNITS > 2 * HEADER_UNITS);

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> Vec<usize> {
        vec![0xAAAA_usize; n]
    }

    #[test]
    fn uninitialized_heap_fails_allocations() {
        let mut heap = Heap::new();
        assert!(!heap.is_initialized());
        assert!(heap.malloc(8).is_none());
        assert_eq!(heap.stats(), HeapStats::default());
        assert!(heap.check_invariants().is_ok());
    }

    #[test]
    fn second_init_is_cancelled_and_changes_nothing() {
        let mut a = words(64);
        let mut b = words(64);
        let mut heap = Heap::new();
        heap.init([a.as_mut_slice()]).unwrap();
        let before = heap.stats();
        assert_eq!(heap.init([b.as_mut_slice()]), Err(HeapError::Cancelled));
        assert_eq!(heap.stats(), before);
        assert_eq!(heap.stats().spaces, 1);
    }

    #[test]
    fn rejects_bad_space_lists() {
        let mut tiny = words(MIN_SPACE_UNITS - 1);
        let mut many: Vec<Vec<usize>> = (0..=MAX_SPACES).map(|_| words(16)).collect();
        let mut heap = Heap::new();
        assert_eq!(heap.init(core::iter::empty()), Err(HeapError::NoSpaces));

        assert!(matches!(
            heap.init([tiny.as_mut_slice()]),
            Err(HeapError::InvalidRange { .. })
        ));

        assert_eq!(
            heap.init(many.iter_mut().map(Vec::as_mut_slice)),
            Err(HeapError::TooManySpaces { max: MAX_SPACES })
        );
        assert!(!heap.is_initialized());
    }

    #[test]
    fn spaces_are_chained_in_order() {
        let mut a = words(32);
        let mut b = words(48);
        let a_base = a.as_ptr().addr();
        let b_base = b.as_ptr().addr();

        let mut heap = Heap::new();
        heap.init([a.as_mut_slice(), b.as_mut_slice()]).unwrap();
        assert_eq!(heap.space_base(0), Some(a_base));
        assert_eq!(heap.space_base(1), Some(b_base));
        assert_eq!(heap.stats().capacity_units, (32 - 4) + (48 - 4));
        heap.check_invariants().unwrap();
        drop(heap);

        assert_eq!(a[0], b_base);
        assert_eq!(a[1], 32);
        assert_eq!(b[0], 0);
        assert_eq!(b[1], 48);
    }

    #[test]
    fn first_fit_spills_into_next_space() {
        let mut a = words(16);
        let mut b = words(64);
        let mut heap = Heap::new();
        heap.init([a.as_mut_slice(), b.as_mut_slice()]).unwrap();

        // Space 0 has a single 12-unit block.
        let small = heap.malloc(4 * UNIT_SIZE).unwrap();
        assert!(heap.blocks(0).next().unwrap().used);
        let big = heap.malloc(20 * UNIT_SIZE).unwrap();
        assert_eq!(
            heap.blocks(1).next().map(|b| (b.units, b.used)),
            Some((22, true))
        );
        assert_ne!(small, big);
        heap.check_invariants().unwrap();
    }

    #[test]
    fn free_rejects_foreign_and_interior_pointers() {
        let mut a = words(64);
        let mut heap = Heap::new();
        heap.init([a.as_mut_slice()]).unwrap();
        let p = heap.malloc(32).unwrap();

        let mut outside = 0_usize;
        let foreign = NonNull::from(&mut outside).cast::<u8>();
        assert!(matches!(heap.free(foreign), Err(HeapError::ForeignPointer { .. })));

        let interior = unsafe { p.add(UNIT_SIZE) };
        assert!(matches!(heap.free(interior), Err(HeapError::ForeignPointer { .. })));

        heap.free(p).unwrap();
        assert!(matches!(heap.free(p), Err(HeapError::DoubleFree { .. })));
        heap.check_invariants().unwrap();
    }

    #[test]
    fn invariant_check_finds_broken_links() {
        let mut a = words(64);
        let mut heap = Heap::new();
        heap.init([a.as_mut_slice()]).unwrap();
        heap.malloc(8).unwrap();
        heap.malloc(8).unwrap();
        heap.check_invariants().unwrap();

        let second = FIRST_BLOCK + units_for(8).unwrap();
        assert_eq!(heap.blocks(0).nth(1).map(|b| b.index), Some(second));
        heap.spaces[0].set_prev(second, None);
        assert!(matches!(
            heap.check_invariants(),
            Err(HeapError::Corrupt { reason: "prev link", .. })
        ));
    }
}
