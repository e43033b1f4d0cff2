//! # Kernel Heap
//!
//! A first-fit heap over one or more contiguous memory ranges ("spaces").
//! Every block carries a two-word header: a link to the previous block and
//! its size in words with the top bit marking it used. Allocation splits
//! oversized blocks; freeing merges with free neighbours on both sides.
//!
//! ```text
//!  space:  [next|units][hdr|payload ...][hdr|payload ...] ... [0|0]
//!                       ^ prev = 0       ^ prev = previous header
//! ```
//!
//! * [`Heap`]: the allocator as a plain value over `&mut [usize]` spaces;
//!   tests create as many as they like.
//! * [`LockedHeap`]: the kernel's instance behind an interrupt-masking
//!   spin lock, also usable as the `#[global_allocator]`.
//!
//! ## Example
//! ```rust
//! use kernel_alloc::Heap;
//!
//! let mut words = vec![0usize; 4096 / size_of::<usize>()];
//! let mut heap = Heap::new();
//! heap.init([words.as_mut_slice()]).unwrap();
//!
//! let p = heap.malloc(100).unwrap();
//! assert!(heap.malloc(4000).is_none());
//! heap.free(p).unwrap();
//! assert!(heap.malloc(4000).is_some());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod block;
mod error;
mod heap;
mod locked;
mod space;

pub use crate::error::HeapError;
pub use crate::heap::{Heap, HeapStats, MAX_SPACES};
pub use crate::locked::LockedHeap;
pub use crate::space::{BlockInfo, MIN_SPACE_UNITS};
