//! # Kernel synchronization primitives
//!
//! The kernel runs on a single core; the only concurrency hazard is an
//! interrupt handler preempting code that holds a lock. [`SpinLock`] provides
//! mutual exclusion, [`IrqGuard`] masks interrupts, and
//! [`SpinLock::lock_irq`] combines both for state that handlers also touch.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod spin_lock;

pub use irq::{IrqGuard, IrqSpinLockGuard};
pub use spin_lock::{SpinLock, SpinLockGuard};
