//! # QEMU Debug Console Output
//!
//! QEMU's `isa-debugcon` device forwards every byte written to I/O port
//! [`DEBUGCON_PORT`] to the host (`-debugcon stdio`). This crate exposes that
//! port as a [`fmt::Write`](core::fmt::Write) sink, an allocation-free
//! [`qemu_trace!`] macro, and [`DebugconLogger`], the kernel's `log` backend.
//!
//! ```text
//! log::info!(..) ──► DebugconLogger ──┐
//!                                     ├──► PortSink ──► out 0xE9 ──► host
//! qemu_trace!(..) ────────────────────┘
//! ```
//!
//! The port write only exists on bare-metal x86 builds with the `enabled`
//! feature. Everywhere else the sink swallows its input, so the crate can be
//! linked into host tests.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::{DebugconLogger, write_record};

/// The I/O port QEMU's debug console listens on by default.
pub const DEBUGCON_PORT: u16 = 0xE9;

#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt::{self, Write};

    /// A byte sink on an x86 I/O port.
    #[derive(Debug, Copy, Clone)]
    pub struct PortSink {
        port: u16,
    }

    impl PortSink {
        #[must_use]
        pub const fn new(port: u16) -> Self {
            Self { port }
        }

        #[must_use]
        pub const fn debugcon() -> Self {
            Self::new(crate::DEBUGCON_PORT)
        }

        #[inline]
        pub fn put(self, byte: u8) {
            #[cfg(all(feature = "enabled", target_os = "none", target_arch = "x86"))]
            unsafe {
                core::arch::asm!(
                    "out dx, al",
                    in("dx") self.port,
                    in("al") byte,
                    options(nomem, nostack, preserves_flags)
                );
            }
            #[cfg(not(all(feature = "enabled", target_os = "none", target_arch = "x86")))]
            let _ = (self.port, byte);
        }
    }

    impl Write for PortSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                self.put(b);
            }
            Ok(())
        }
    }

    #[doc(hidden)]
    #[inline]
    pub fn qemu_write(args: fmt::Arguments) {
        // Best effort; the sink never fails.
        let _ = PortSink::debugcon().write_fmt(args);
    }
}

/// `print!` to the debug console, without `log` and without allocating.
///
/// Usable before the logger is installed and from the panic handler.
#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}

#[cfg(test)]
mod tests {
    use super::qemu_fmt::PortSink;
    use core::fmt::Write;

    #[test]
    fn host_sink_accepts_output() {
        let mut sink = PortSink::debugcon();
        assert!(write!(sink, "Page Fault @ {:#010X}", 0x1000).is_ok());
        qemu_trace!("trace {}\n", 1);
    }
}
