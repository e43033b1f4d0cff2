use crate::qemu_fmt::PortSink;
use core::fmt::{self, Write};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log` backend writing one `[LEVEL] target: message` line per record to
/// the debug console.
pub struct DebugconLogger {
    max_level: LevelFilter,
    port: u16,
}

impl DebugconLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self {
            max_level,
            port: crate::DEBUGCON_PORT,
        }
    }

    /// Same, on another port (e.g. `0x402` for a relocated debugcon).
    #[must_use]
    pub const fn with_port(max_level: LevelFilter, port: u16) -> Self {
        Self { max_level, port }
    }

    /// Install `self` as the global logger. Call once during early init.
    ///
    /// # Errors
    /// If a logger is already installed.
    pub fn install(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }
}

/// Format `record` the way [`DebugconLogger`] prints it.
///
/// # Errors
/// Whatever `w` reports.
pub fn write_record(w: &mut impl Write, record: &Record<'_>) -> fmt::Result {
    writeln!(w, "[{}] {}: {}", record.level(), record.target(), record.args())
}

impl Log for DebugconLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = write_record(&mut PortSink::new(self.port), record);
    }

    fn flush(&self) {}
}
