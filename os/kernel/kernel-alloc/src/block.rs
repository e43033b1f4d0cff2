//! Block header encoding.
//!
//! Every block starts with a two-word header:
//!
//! ```text
//! +-------------------+-----------------------------+----------------
//! | prev_block (addr) | USED | size in units (incl.  |  payload ...
//! |  0 = first block  |  bit |  these two words)     |
//! +-------------------+-----------------------------+----------------
//! ^ header            ^ header + 1 unit              ^ header + HEADER_UNITS
//! ```
//!
//! One unit is one machine word, which is also the allocation alignment.

/// Bytes per allocation unit.
pub const UNIT_SIZE: usize = size_of::<usize>();

/// Units taken by a block header.
pub const HEADER_UNITS: usize = 2;

/// Top bit of the size word marks an allocated block.
pub const USED: usize = 1 << (usize::BITS - 1);

/// Largest size the size word can carry next to [`USED`].
pub const MAX_BLOCK_UNITS: usize = USED - 1;

/// Units a block needs to hold `size` payload bytes, header included.
///
/// Zero-byte requests still get one payload unit so every pointer handed out
/// is distinct. Returns `None` if the result would not fit the size word.
#[must_use]
pub const fn units_for(size: usize) -> Option<usize> {
    let payload = if size == 0 { 1 } else { size.div_ceil(UNIT_SIZE) };
    match payload.checked_add(HEADER_UNITS) {
        Some(units) if units <= MAX_BLOCK_UNITS => Some(units),
        _ => None,
    }
}

/// The `size_and_flag` word of a block header.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct BlockSize(usize);

impl BlockSize {
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn free(units: usize) -> Self {
        debug_assert!(units <= MAX_BLOCK_UNITS);
        Self(units)
    }

    #[inline]
    #[must_use]
    pub const fn used(units: usize) -> Self {
        debug_assert!(units <= MAX_BLOCK_UNITS);
        Self(units | USED)
    }

    #[inline]
    #[must_use]
    pub const fn into_raw(self) -> usize {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn units(self) -> usize {
        self.0 & !USED
    }

    #[inline]
    #[must_use]
    pub const fn is_used(self) -> bool {
        self.0 & USED != 0
    }

    /// The zero header that terminates a space.
    #[inline]
    #[must_use]
    pub const fn is_sentinel(self) -> bool {
        self.0 == 0
    }
}

impl core::fmt::Debug for BlockSize {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = if self.is_used() { "used" } else { "free" };
        write!(f, "{} units {state}", self.units())
    }
}

const _: () = {
    assert!(UNIT_SIZE.is_power_of_two());
    assert!(MAX_BLOCK_UNITS == usize::MAX >> 1);
};
