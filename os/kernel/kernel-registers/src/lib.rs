//! # Typed 32-bit x86 Control Registers
//!
//! Bit-level models of the control registers a PAE kernel touches while
//! bringing up paging and servicing page faults:
//!
//! | Register | Role |
//! |----------|------|
//! | [`cr0::Cr0`] | `PG` enables paging once the tables are in place. |
//! | [`cr2::Cr2`] | Linear address of the most recent page fault. |
//! | [`cr3::Cr3`] | Physical base of the PDPT (PAE format). |
//! | [`cr4::Cr4`] | `PAE` selects the three-level, 64-bit entry format. |
//!
//! Register access goes through [`LoadRegisterUnsafe`] / [`StoreRegisterUnsafe`]
//! and is only compiled for 32-bit x86 with the `asm` feature. The types
//! themselves are plain values and can be built and inspected anywhere.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "cr0")]
pub mod cr0;

#[cfg(feature = "cr2")]
pub mod cr2;

#[cfg(feature = "cr3")]
pub mod cr3;

#[cfg(feature = "cr4")]
pub mod cr4;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, writing a control register changes how every subsequent
    /// memory access is translated.
    unsafe fn store_unsafe(self);
}
