//! `Kernel Panic: <location>: <message>`, then stop the CPU.

use core::panic::PanicInfo;
use kernel_qemu::qemu_trace;
use kernel_sync::irq::cli_stop_interrupts;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    cli_stop_interrupts();

    // Raw port output: the logger or the heap may be what failed.
    match info.location() {
        Some(loc) => qemu_trace!(
            "Kernel Panic: {}:{}: {}\n",
            loc.file(),
            loc.line(),
            info.message()
        ),
        None => qemu_trace!("Kernel Panic: {}\n", info.message()),
    }

    halt()
}

/// Park the CPU with interrupts off.
pub fn halt() -> ! {
    loop {
        unsafe {
            core::arch::asm!("cli", "hlt", options(nomem, nostack));
        }
    }
}
