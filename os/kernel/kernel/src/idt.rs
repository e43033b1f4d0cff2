//! # The global Interrupt Descriptor Table
//!
//! One table for the single CPU, loaded once with [`init_idt_once`] and then
//! patched in place by [`idt_update_in_place`]. The `lidt` operand only holds
//! a pointer, so edits are seen by the CPU without reloading IDTR as long as
//! base and limit stay the same.
//!
//! ## Ordering checklist
//! 1. Multiboot leaves a flat GDT loaded; the gates reuse its code selector.
//! 2. [`init_idt_once`] (`lidt`).
//! 3. Register handlers with [`crate::interrupts::isr_register`].
//! 4. Only then touch memory that may fault.

use crate::interrupts::Idt;
use core::sync::atomic::{self, AtomicBool};
use kernel_sync::IrqGuard;

/// The global interrupt descriptor table.
static mut IDT: Idt = Idt::new();

static LOADED: AtomicBool = AtomicBool::new(false);

/// Load the (still empty) global IDT into the CPU.
///
/// # Safety
/// Must run at CPL0 before any vector can fire. Subsequent calls are ignored.
#[cfg(all(target_os = "none", target_arch = "x86"))]
pub unsafe fn init_idt_once() {
    if LOADED.swap(true, atomic::Ordering::AcqRel) {
        return;
    }
    #[allow(static_mut_refs)]
    unsafe {
        IDT.load();
    }
}

/// Whether [`init_idt_once`] has run.
pub fn is_loaded() -> bool {
    LOADED.load(atomic::Ordering::Acquire)
}

/// Update entries of the global IDT **in place**, without reloading `lidt`.
///
/// Interrupts are masked on this CPU while `f` runs, and a full fence
/// publishes the edit before they are restored.
pub fn idt_update_in_place<F: FnOnce(&mut Idt)>(f: F) {
    debug_assert!(is_loaded(), "IDT is not installed");
    let _irq = IrqGuard::new();
    // SAFETY: single CPU with interrupts masked; nothing else holds a reference.
    unsafe {
        f(&mut *(&raw mut IDT));
    }
    atomic::fence(atomic::Ordering::SeqCst);
}
