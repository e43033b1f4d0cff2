//! # Kernel Configuration and Boot Interface
//!
//! This crate defines the memory layout constants and boot interface contracts
//! shared by the kernel binary and its memory subsystems. It is the single
//! source of truth for where the paging structures live, how much low memory
//! is identity mapped, and how the bootloader hands over the physical memory
//! map.
//!
//! ## Architecture
//!
//! ### Boot Information ([`boot`])
//! The Multiboot (v1) handoff: the information block the bootloader leaves in
//! `EBX` and the magic value in `EAX`.
//!
//! ### Memory Map ([`mmap`])
//! A bounds-checked reader for the Multiboot memory map, usable-memory
//! accounting, and derivation of the default heap region.
//!
//! ### Memory Layout ([`memory`])
//! Compile-time placement of the kernel image and of the PAE paging
//! structures.
//!
//! ## Physical Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │  Real-mode IVT / BDA            │
//! PDPT_PHYS   ├─────────────────────────────────┤ 0x0000_1000
//!             │  PDPT, PD, PT,                  │
//!             │  scratch PD, scratch PT         │
//!             ├─────────────────────────────────┤ 0x0000_6000
//!             │  Low memory (BIOS, VGA)         │
//! PHYS_LOAD   ├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!             │  Kernel image (text, data, bss) │
//! end_kernel  ├─────────────────────────────────┤
//!             │  Kernel heap                    │
//!             ├─────────────────────────────────┤
//!             │  Page-table frames              │
//!             ├─────────────────────────────────┤ IDENTITY_LOW_BYTES (2 MiB)
//!             │  Mapped on demand by faults     │
//!             └─────────────────────────────────┘
//! ```
//!
//! ## Build Integration
//!
//! ```rust
//! // In build.rs
//! use kernel_info::memory::PHYS_LOAD;
//!
//! println!("cargo:rustc-link-arg=--defsym=PHYS_LOAD={:#x}", PHYS_LOAD);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
pub mod mmap;
