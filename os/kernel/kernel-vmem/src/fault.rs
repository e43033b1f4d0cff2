//! # Page-Fault Decoding
//!
//! The CPU pushes a 32-bit error code for vector 14 and latches the faulting
//! linear address in CR2. [`PageFault`] pairs the two.

use bitfield_struct::bitfield;
use core::fmt;
use kernel_memory_addresses::VirtualAddress;

/// Interrupt vector of the page-fault exception (#PF).
pub const PAGE_FAULT_VECTOR: u8 = 14;

/// Page-fault error code layout (32-bit protected mode).
///
/// Each bit describes the condition that caused the page fault.
/// Reference: Intel SDM Vol. 3A, §6.15 "Page-Fault Exception (#PF)".
#[bitfield(u32)]
pub struct PageFaultError {
    /// 0 = non-present page.
    /// 1 = protection violation (page present but access disallowed).
    pub present: bool, // bit 0

    /// 0 = read or execute.
    /// 1 = write access.
    pub write: bool, // bit 1

    /// 0 = supervisor (CPL 0–2).
    /// 1 = user mode (CPL 3).
    pub user: bool, // bit 2

    /// 1 = caused by reserved bit set in a paging structure.
    pub reserved_bit: bool, // bit 3

    /// 1 = instruction fetch (execute access).
    pub instruction_fetch: bool, // bit 4

    /// 1 = protection-key violation (if CR4.PKE=1).
    pub protection_key: bool, // bit 5

    /// 1 = shadow stack access (if CET-SS enabled).
    pub shadow_stack: bool, // bit 6

    #[bits(25)]
    __: u32, // reserved / ignored bits
}

impl PageFaultError {
    /// One-line summary of the most likely cause.
    #[must_use]
    pub const fn explain(&self) -> &'static str {
        if !self.present() {
            "Non-present page (not mapped yet)"
        } else if self.reserved_bit() {
            "Reserved bit set in a paging structure"
        } else if self.instruction_fetch() {
            if self.user() {
                "User-mode instruction fetch on protected page"
            } else {
                "Kernel instruction fetch on protected page"
            }
        } else if self.write() {
            "Write access to protected page"
        } else {
            "Read access to protected page"
        }
    }

    /// Displays the space-separated list of conditions that held, e.g.
    /// `not-present write user`.
    #[must_use]
    pub const fn conditions(self) -> Conditions {
        Conditions(self)
    }
}

/// [`Display`](fmt::Display) adapter returned by [`PageFaultError::conditions`].
#[derive(Copy, Clone)]
pub struct Conditions(PageFaultError);

impl fmt::Display for Conditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let e = self.0;
        let words = [
            (!e.present(), "not-present"),
            (e.present(), "protection"),
            (e.write(), "write"),
            (e.user(), "user"),
            (e.reserved_bit(), "reserved"),
            (e.instruction_fetch(), "fetch"),
        ];
        let mut first = true;
        for (held, word) in words {
            if held {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(word)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// A decoded page fault: where it happened and why.
#[derive(Copy, Clone, Debug)]
pub struct PageFault {
    pub address: VirtualAddress,
    pub error: PageFaultError,
}

impl PageFault {
    #[must_use]
    pub const fn new(address: VirtualAddress, error: PageFaultError) -> Self {
        Self { address, error }
    }

    /// Build from the raw CR2 value and pushed error code.
    #[must_use]
    pub const fn from_raw(cr2: u32, error_code: u32) -> Self {
        Self::new(VirtualAddress::new(cr2), PageFaultError::from_bits(error_code))
    }
}

impl fmt::Display for PageFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page Fault @ {} {}", self.address, self.error.conditions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_error_bits() {
        let e = PageFaultError::from_bits(0b0_1111);
        assert!(e.present());
        assert!(e.write());
        assert!(e.user());
        assert!(e.reserved_bit());
        assert!(!e.instruction_fetch());
    }

    #[test]
    fn diagnostic_lists_conditions_that_held() {
        let f = PageFault::from_raw(0x0040_1234, 0b0110);
        assert_eq!(f.to_string(), "Page Fault @ 0x00401234 not-present write user");

        let f = PageFault::from_raw(0xC000_0000, 0b1001);
        assert_eq!(f.to_string(), "Page Fault @ 0xC0000000 protection reserved");
    }

    #[test]
    fn explain_prefers_missing_mapping() {
        assert_eq!(
            PageFaultError::from_bits(0b10).explain(),
            "Non-present page (not mapped yet)"
        );
        assert_eq!(
            PageFaultError::from_bits(0b11).explain(),
            "Write access to protected page"
        );
    }
}
