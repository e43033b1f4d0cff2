//! One heap space: a contiguous run of words carved into blocks.
//!
//! ```text
//!  unit 0      1           2                                 len-2   len-1
//!  +-----------+-----------+--------+-----------+-----+------+-------+-------+
//!  | next addr | len units | header | payload   | ... |      |   0   |   0   |
//!  +-----------+-----------+--------+-----------+-----+------+-------+-------+
//!  \--- space header ----/ \------ blocks partition this range -----/ sentinel
//! ```
//!
//! All accessors take unit indices; block `prev` links are stored as
//! addresses so the memory reads the same as any other view of it, and are
//! converted back to indices on load.
//!
//! A space keeps a raw pointer to its first word and reads and writes every
//! header through it. Payload pointers are derived from that same pointer,
//! so they stay valid while the heap keeps editing headers around them.

use crate::block::{BlockSize, HEADER_UNITS, UNIT_SIZE};
use core::marker::PhantomData;
use core::ptr::NonNull;

/// Units of the space header (next-space address, total units).
pub const SPACE_HEADER_UNITS: usize = 2;

/// Index of the first block in every space.
pub const FIRST_BLOCK: usize = SPACE_HEADER_UNITS;

/// Smallest space: header, one block with one payload unit, sentinel.
pub const MIN_SPACE_UNITS: usize = SPACE_HEADER_UNITS + HEADER_UNITS + 1 + HEADER_UNITS;

/// A block as seen by [`Space::blocks`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BlockInfo {
    /// Unit index of the header within the space.
    pub index: usize,
    /// Size in units, header included.
    pub units: usize,
    pub used: bool,
    /// Unit index of the preceding block, if any.
    pub prev: Option<usize>,
}

pub struct Space<'a> {
    base: NonNull<usize>,
    len: usize,
    _words: PhantomData<&'a mut [usize]>,
}

// SAFETY: a space has exclusive access to its words, like the `&mut [usize]`
// it was built from.
unsafe impl Send for Space<'_> {}

impl<'a> Space<'a> {
    /// Take over `words` without touching them.
    pub fn new(words: &'a mut [usize]) -> Self {
        debug_assert!(words.len() >= MIN_SPACE_UNITS);
        Self {
            len: words.len(),
            base: NonNull::from(words).cast(),
            _words: PhantomData,
        }
    }

    /// Pointer to unit `index`.
    ///
    /// # Panics
    /// If `index` lies outside the space.
    #[inline]
    fn slot(&self, index: usize) -> NonNull<usize> {
        assert!(index < self.len, "unit {index} outside a {}-unit space", self.len);
        // SAFETY: in bounds of the range `new` took over.
        unsafe { self.base.add(index) }
    }

    #[inline]
    fn word(&self, index: usize) -> usize {
        // SAFETY: `slot` is in bounds, aligned and exclusively ours.
        unsafe { self.slot(index).read() }
    }

    #[inline]
    fn set_word(&mut self, index: usize, value: usize) {
        // SAFETY: as in `word`.
        unsafe { self.slot(index).write(value) }
    }

    /// Write the space header, one free block spanning the space, and the
    /// sentinel. Returns the unit count of that block.
    pub fn format(&mut self, next_space: usize) -> usize {
        self.set_word(0, next_space);
        self.set_word(1, self.len);

        let units = self.sentinel() - FIRST_BLOCK;
        self.set_prev(FIRST_BLOCK, None);
        self.set_size(FIRST_BLOCK, BlockSize::free(units));

        let sentinel = self.sentinel();
        self.set_word(sentinel, 0);
        self.set_word(sentinel + 1, 0);
        units
    }

    #[inline]
    pub fn base_addr(&self) -> usize {
        self.base.as_ptr().addr()
    }

    #[inline]
    pub fn end_addr(&self) -> usize {
        self.base_addr() + self.len * UNIT_SIZE
    }

    #[inline]
    pub fn next_space(&self) -> usize {
        self.word(0)
    }

    #[inline]
    pub fn total_units(&self) -> usize {
        self.word(1)
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        (self.base_addr()..self.end_addr()).contains(&addr)
    }

    /// Unit index of the zero header closing the space.
    #[inline]
    pub const fn sentinel(&self) -> usize {
        self.len - HEADER_UNITS
    }

    /// Units the blocks of this space partition.
    #[inline]
    pub const fn block_units(&self) -> usize {
        self.sentinel() - FIRST_BLOCK
    }

    #[inline]
    pub fn addr_of(&self, index: usize) -> usize {
        self.base_addr() + index * UNIT_SIZE
    }

    /// Unit index of `addr`, if it lies word-aligned inside this space.
    pub fn index_of(&self, addr: usize) -> Option<usize> {
        let offset = addr.checked_sub(self.base_addr())?;
        let index = offset / UNIT_SIZE;
        (offset % UNIT_SIZE == 0 && index < self.len).then_some(index)
    }

    #[inline]
    pub fn size(&self, index: usize) -> BlockSize {
        BlockSize::from_raw(self.word(index + 1))
    }

    #[inline]
    pub fn set_size(&mut self, index: usize, size: BlockSize) {
        self.set_word(index + 1, size.into_raw());
    }

    /// Predecessor of the block at `index`.
    ///
    /// A link that does not point into this space reads as `None`;
    /// [`Heap::check_invariants`](crate::Heap::check_invariants) reports it.
    #[inline]
    pub fn prev(&self, index: usize) -> Option<usize> {
        match self.word(index) {
            0 => None,
            addr => self.index_of(addr),
        }
    }

    /// The raw `prev_block` word, for corruption checks.
    #[inline]
    pub fn prev_raw(&self, index: usize) -> usize {
        self.word(index)
    }

    #[inline]
    pub fn set_prev(&mut self, index: usize, prev: Option<usize>) {
        let link = prev.map_or(0, |p| self.addr_of(p));
        self.set_word(index, link);
    }

    /// Index of the block after `index`, or `None` at the sentinel.
    #[inline]
    pub fn next(&self, index: usize) -> Option<usize> {
        let next = index + self.size(index).units();
        (next < self.sentinel()).then_some(next)
    }

    /// Walk the blocks in address order.
    ///
    /// Stops early if a size word would step outside the space.
    pub fn blocks(&self) -> Blocks<'_, 'a> {
        Blocks {
            space: self,
            next: Some(FIRST_BLOCK),
        }
    }

    /// First free block of at least `units`, in address order.
    pub fn find_free(&self, units: usize) -> Option<usize> {
        self.blocks()
            .find(|b| !b.used && b.units >= units)
            .map(|b| b.index)
    }

    /// Pointer to the payload of the block at `index`, valid for the whole
    /// block.
    pub fn payload(&mut self, index: usize) -> NonNull<u8> {
        self.slot(index + HEADER_UNITS).cast()
    }

    /// Mark the free block at `index` used, splitting off the tail if it can
    /// hold at least a header. Returns the units granted.
    pub fn take(&mut self, index: usize, units: usize) -> usize {
        let found = self.size(index);
        debug_assert!(!found.is_used() && found.units() >= units);

        let rest = found.units() - units;
        if rest < HEADER_UNITS {
            self.set_size(index, BlockSize::used(found.units()));
            return found.units();
        }

        let tail = index + units;
        self.set_size(index, BlockSize::used(units));
        self.set_prev(tail, Some(index));
        self.set_size(tail, BlockSize::free(rest));
        if let Some(after) = self.next(tail) {
            self.set_prev(after, Some(tail));
        }
        units
    }

    /// Mark the used block at `index` free and merge it with free
    /// neighbours. Returns the units released and the header index of the
    /// merged block.
    pub fn release(&mut self, index: usize) -> (usize, usize) {
        let freed = self.size(index).units();
        debug_assert!(self.size(index).is_used());
        self.set_size(index, BlockSize::free(freed));

        let mut start = index;
        if let Some(prev) = self.prev(index)
            && !self.size(prev).is_used()
        {
            let merged = self.size(prev).units() + freed;
            self.set_size(prev, BlockSize::free(merged));
            start = prev;
        }

        if let Some(next) = self.next(start)
            && !self.size(next).is_used()
        {
            let merged = self.size(start).units() + self.size(next).units();
            self.set_size(start, BlockSize::free(merged));
        }

        if let Some(after) = self.next(start) {
            self.set_prev(after, Some(start));
        }
        (freed, start)
    }

    /// Header index of the block whose payload starts at `addr`.
    ///
    /// Walks the chain so only real block boundaries match.
    pub fn block_for_payload(&self, addr: usize) -> Option<BlockInfo> {
        let header = self.index_of(addr)?.checked_sub(HEADER_UNITS)?;
        self.blocks().find(|b| b.index == header)
    }
}

pub struct Blocks<'s, 'a> {
    space: &'s Space<'a>,
    next: Option<usize>,
}

impl Iterator for Blocks<'_, '_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        let index = self.next?;
        let space = self.space;
        if index + HEADER_UNITS > space.sentinel() {
            self.next = None;
            return None;
        }

        let size = space.size(index);
        if size.units() < HEADER_UNITS || index + size.units() > space.sentinel() {
            // Corrupt size word; stop instead of walking off the space.
            self.next = None;
            return None;
        }

        self.next = space.next(index);
        Some(BlockInfo {
            index,
            units: size.units(),
            used: size.is_used(),
            prev: space.prev(index),
        })
    }
}
