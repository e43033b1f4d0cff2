//! # i386 Interrupt Descriptor Table (IDT) and ISR registry
//!
//! Minimal, `no_std`-friendly IDT for a 32-bit protected-mode kernel with a
//! fluent builder API:
//!
//! ```ignore
//! idt[usize::from(PAGE_FAULT_VECTOR)]
//!     .set_handler(offset)
//!     .present(true)
//!     .gate_interrupt();
//! ```
//!
//! Handlers are plain Rust functions registered per vector with
//! [`isr_register`]. The assembly entry stub of a vector saves the general
//! purpose registers into a [`TrapFrame`] and calls [`isr_dispatch`], which
//! looks the handler up and runs it.
//!
//! ## Acronyms
//! - **IDT** – *Interrupt Descriptor Table* (256 entries describing traps/IRQs)
//! - **ISR** – *Interrupt Service Routine*
//! - **DPL** – *Descriptor Privilege Level* (0=kernel … 3=user)
//! - **P** – *Present* bit (must be 1 for a valid gate)

#[cfg(all(target_os = "none", target_arch = "x86"))]
mod page_fault;

use bitfield_struct::bitfield;
use core::fmt;
use core::mem::size_of;
use core::ops::{Index, IndexMut};
use kernel_sync::SpinLock;
use log::debug;

/// Gates in a full table.
pub const IDT_ENTRIES: usize = 256;

// An i386 gate is 8 bytes; the table is 8-byte aligned.
const _: () = assert!(size_of::<IdtEntry>() == 8);
const _: () = assert!(align_of::<Idt>() == 8);

/// The attribute byte of a 32-bit gate: `| P | DPL(2) | S(0) | Type(4) |`.
#[bitfield(u8)]
pub struct IdtGateAttr {
    /// **Type** – 0xE = 32-bit *Interrupt gate*.
    #[bits(4)]
    pub typ: u8,

    /// **S** – System bit (must be `0` for interrupt/trap gates).
    #[bits(1)]
    pub s: bool,

    /// **DPL** – Descriptor Privilege Level (0..=3).
    #[bits(2)]
    pub dpl: u8,

    /// **P** – Present bit. Must be `1` for a valid entry.
    #[bits(1)]
    pub present: bool,
}

impl IdtGateAttr {
    /// An **Interrupt Gate** (type 0xE, S=0).
    #[inline]
    #[must_use]
    pub const fn interrupt_gate() -> Self {
        Self::new().with_typ(0xE).with_s(false)
    }
}

/// A 256-entry **Interrupt Descriptor Table**.
#[repr(C, align(8))]
pub struct Idt {
    entries: [IdtEntry; IDT_ENTRIES],
}

impl Default for Idt {
    fn default() -> Self {
        Self::new()
    }
}

impl Idt {
    /// A table with every gate **not present**.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [IdtEntry::MISSING; IDT_ENTRIES],
        }
    }

    /// Load this IDT into the CPU’s **IDTR** using `lidt`.
    ///
    /// # Safety
    /// Must be called at **CPL0**, and every present entry must reference
    /// valid handler code in an executable segment.
    #[cfg(all(target_os = "none", target_arch = "x86"))]
    #[inline]
    pub unsafe fn load(&'static self) {
        #[allow(clippy::cast_possible_truncation)]
        let idtr = Idtr {
            limit: (size_of::<Self>() - 1) as u16,
            base: core::ptr::from_ref(self).addr() as u32,
        };
        unsafe {
            core::arch::asm!("lidt [{}]", in(reg) &raw const idtr, options(nostack, preserves_flags, readonly));
        }
    }
}

impl Index<usize> for Idt {
    type Output = IdtEntry;
    fn index(&self, i: usize) -> &Self::Output {
        &self.entries[i]
    }
}

impl IndexMut<usize> for Idt {
    fn index_mut(&mut self, i: usize) -> &mut Self::Output {
        &mut self.entries[i]
    }
}

/// Operand format used by `lidt` (limit + base).
#[cfg(all(target_os = "none", target_arch = "x86"))]
#[repr(C, packed)]
struct Idtr {
    limit: u16,
    base: u32,
}

/// One **8-byte** i386 gate descriptor.
///
/// ```text
/// 63            48 47 46 45 44  43   40 39        32
/// +---------------+--+-----+--+-------+------------+
/// | offset[31:16] |P | DPL |S | type  |   zero     |
/// +---------------+--+-----+--+-------+------------+
/// 31            16 15                             0
/// +---------------+--------------------------------+
/// |   selector    |         offset[15:0]           |
/// +---------------+--------------------------------+
/// ```
#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IdtEntry {
    offset_lo: u16,
    selector: u16,
    zero: u8,
    attr: u8, // manipulated through IdtGateAttr
    offset_hi: u16,
}

impl IdtEntry {
    /// A zeroed, non-present entry.
    pub const MISSING: Self = Self {
        offset_lo: 0,
        selector: 0,
        zero: 0,
        attr: IdtGateAttr::new().into_bits(),
        offset_hi: 0,
    };

    /// Point this entry at the handler at linear address `offset` and return
    /// a fluent builder.
    ///
    /// The selector is the current CS and the DPL is 0. The entry is **not**
    /// marked present; call [`IdtEntryBuilder::present`] when you are ready.
    pub fn set_handler(&mut self, offset: u32) -> IdtEntryBuilder<'_> {
        let [b0, b1, b2, b3] = offset.to_le_bytes();
        self.offset_lo = u16::from_le_bytes([b0, b1]);
        self.offset_hi = u16::from_le_bytes([b2, b3]);
        self.selector = current_cs();
        self.zero = 0;
        self.attr = IdtGateAttr::interrupt_gate()
            .with_present(false)
            .with_dpl(0)
            .into_bits();

        IdtEntryBuilder { entry: self }
    }

    /// The handler's linear address.
    #[must_use]
    pub fn offset(&self) -> u32 {
        (u32::from(self.offset_hi) << 16) | u32::from(self.offset_lo)
    }

    #[must_use]
    pub const fn selector_bits(&self) -> u16 {
        self.selector
    }

    #[must_use]
    pub const fn attr(&self) -> IdtGateAttr {
        IdtGateAttr::from_bits(self.attr)
    }
}

/// Fluent builder for an [`IdtEntry`].
pub struct IdtEntryBuilder<'a> {
    entry: &'a mut IdtEntry,
}

impl IdtEntryBuilder<'_> {
    /// Set the **Present** bit.
    #[inline]
    #[must_use]
    pub const fn present(self, p: bool) -> Self {
        let bf = IdtGateAttr::from_bits(self.entry.attr).with_present(p);
        self.entry.attr = bf.into_bits();
        self
    }

    /// Make this an **Interrupt Gate**; `IF` is cleared on entry.
    #[inline]
    #[must_use]
    pub const fn gate_interrupt(self) -> Self {
        let bf = IdtGateAttr::from_bits(self.entry.attr)
            .with_typ(IdtGateAttr::interrupt_gate().typ())
            .with_s(false);
        self.entry.attr = bf.into_bits();
        self
    }
}

/// Read the current **CS** selector (used as a sensible default for entries).
#[cfg(all(target_os = "none", target_arch = "x86"))]
#[inline]
fn current_cs() -> u16 {
    let cs: u16;
    unsafe {
        core::arch::asm!("mov {0:x}, cs", out(reg) cs, options(nomem, nostack, preserves_flags));
    }
    cs
}

/// The flat kernel code selector a Multiboot loader leaves in CS.
#[cfg(not(all(target_os = "none", target_arch = "x86")))]
const fn current_cs() -> u16 {
    0x08
}

/// Register state saved by an entry stub.
///
/// Field order follows the stack from low to high addresses: `pushad`, the
/// vector pushed by the stub, then the error code and return frame pushed by
/// the CPU.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TrapFrame {
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub vector: u32,
    pub error_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
}

impl fmt::Display for TrapFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vector {} error {:#x} at {:#06x}:{:#010x} eflags {:#010x}",
            self.vector, self.error_code, self.cs, self.eip, self.eflags
        )
    }
}

/// A registered interrupt service routine.
pub type IsrHandler = fn(&mut TrapFrame);

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum InterruptError {
    #[error("vector {vector} has no entry stub")]
    NoStub { vector: u8 },
    #[error("unhandled interrupt: {0}")]
    Unhandled(TrapFrame),
    #[error("ISR table busy while dispatching vector {vector}")]
    Busy { vector: u32 },
}

/// Handlers by vector, looked up on every interrupt.
pub struct IsrTable {
    handlers: SpinLock<[Option<IsrHandler>; IDT_ENTRIES]>,
}

impl Default for IsrTable {
    fn default() -> Self {
        Self::new()
    }
}

impl IsrTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handlers: SpinLock::new([None; IDT_ENTRIES]),
        }
    }

    /// Install `handler` for `vector`, returning the one it replaces.
    pub fn register(&self, vector: u8, handler: IsrHandler) -> Option<IsrHandler> {
        self.handlers.lock_irq()[usize::from(vector)].replace(handler)
    }

    /// Run the handler registered for `frame.vector`.
    ///
    /// Never spins: an interrupt taken while the table is being updated
    /// reports [`InterruptError::Busy`] instead of deadlocking.
    ///
    /// # Errors
    /// [`InterruptError::Unhandled`] if no handler is registered.
    pub fn dispatch(&self, frame: &mut TrapFrame) -> Result<(), InterruptError> {
        let vector = frame.vector;
        let handler = {
            let table = self
                .handlers
                .try_lock()
                .ok_or(InterruptError::Busy { vector })?;
            usize::try_from(vector)
                .ok()
                .and_then(|v| table.get(v).copied().flatten())
        };
        let handler = handler.ok_or(InterruptError::Unhandled(*frame))?;
        handler(frame);
        Ok(())
    }
}

static ISRS: IsrTable = IsrTable::new();

/// Route `vector` to `handler` and mark its gate present.
///
/// # Errors
/// [`InterruptError::NoStub`] if the kernel has no entry stub for `vector`.
pub fn isr_register(vector: u8, handler: IsrHandler) -> Result<(), InterruptError> {
    let stub = entry_stub(vector).ok_or(InterruptError::NoStub { vector })?;
    if ISRS.register(vector, handler).is_some() {
        debug!("ISR for vector {vector} replaced");
    }
    crate::idt::idt_update_in_place(|idt| {
        let _ = idt[usize::from(vector)]
            .set_handler(stub)
            .present(true)
            .gate_interrupt();
    });
    debug!("ISR for vector {vector} installed, stub at {stub:#010x}");
    Ok(())
}

/// Common Rust entry of every stub.
///
/// # Panics
/// If the vector has no handler; there is nothing to return to.
pub fn isr_dispatch(frame: &mut TrapFrame) {
    if let Err(e) = ISRS.dispatch(frame) {
        panic!("{e}");
    }
}

#[cfg(all(target_os = "none", target_arch = "x86"))]
fn entry_stub(vector: u8) -> Option<u32> {
    match vector {
        kernel_vmem::PAGE_FAULT_VECTOR => u32::try_from(page_fault::page_fault_stub as usize).ok(),
        _ => None,
    }
}

#[cfg(not(all(target_os = "none", target_arch = "x86")))]
const fn entry_stub(_vector: u8) -> Option<u32> {
    None
}
