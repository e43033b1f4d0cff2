//! Entry stub for vector 14.
//!
//! The CPU pushes an error code for page faults, so the stub only adds the
//! vector before saving the general purpose registers.

use super::{TrapFrame, isr_dispatch};
use core::arch::naked_asm;
use kernel_vmem::PAGE_FAULT_VECTOR;

/// Builds a [`TrapFrame`] on the faulting stack and hands it to
/// [`isr_dispatch`]. Returning from the handler retries the faulting
/// instruction.
#[unsafe(naked)]
pub extern "C" fn page_fault_stub() {
    naked_asm!(
        "push {vector}",
        "pushad",
        "cld",
        // cdecl: one argument, a pointer to the frame we just built
        "push esp",
        "call {dispatch}",
        "add esp, 4",
        "popad",
        // drop vector and error code
        "add esp, 8",
        "iretd",
        vector = const PAGE_FAULT_VECTOR,
        dispatch = sym dispatch_frame,
    )
}

extern "C" fn dispatch_frame(frame: *mut TrapFrame) {
    // SAFETY: the stub passes the frame it just pushed on the current stack.
    let frame = unsafe { &mut *frame };
    isr_dispatch(frame);
}
