/// Errors reported by [`Heap`](crate::Heap) and [`LockedHeap`](crate::LockedHeap).
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum HeapError {
    /// The heap was already initialized; nothing was changed.
    #[error("heap already initialized")]
    Cancelled,
    #[error("no heap space given")]
    NoSpaces,
    #[error("more than {max} heap spaces given")]
    TooManySpaces { max: usize },
    /// A range is empty, misaligned, too small, or the start and end lists
    /// have different lengths.
    #[error("invalid heap range {start:#x}..{end:#x}")]
    InvalidRange { start: usize, end: usize },
    #[error("heap space of {units} units exceeds the block size limit")]
    SpaceTooLarge { units: usize },
    #[error("pointer {ptr:#x} was not handed out by this heap")]
    ForeignPointer { ptr: usize },
    #[error("pointer {ptr:#x} is already free")]
    DoubleFree { ptr: usize },
    /// [`Heap::check_invariants`](crate::Heap::check_invariants) found a
    /// broken block chain.
    #[error("heap space {space} corrupt at unit {unit}: {reason}")]
    Corrupt {
        space: usize,
        unit: usize,
        reason: &'static str,
    },
}
