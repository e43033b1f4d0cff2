use crate::{SpinLock, SpinLockGuard};
use core::ops::{Deref, DerefMut};

/// `IF`, bit 9 of `EFLAGS`.
const EFLAGS_IF: u32 = 1 << 9;

/// A spin lock guard that also keeps interrupts disabled while held.
///
/// Created via [`SpinLock::lock_irq`], it:
///
/// 1. saves the current interrupt state and disables interrupts, and
/// 2. acquires the underlying lock,
///
/// releasing them in reverse order on drop. This prevents an interrupt
/// handler from preempting the critical section and spinning forever on the
/// same lock.
///
/// # Examples
///
/// ```
/// use kernel_sync::SpinLock;
///
/// static COUNTER: SpinLock<u32> = SpinLock::new(0);
///
/// {
///     let mut g = COUNTER.lock_irq();
///     *g += 1;
/// }
/// assert_eq!(*COUNTER.lock(), 1);
/// ```
pub struct IrqSpinLockGuard<'a, T> {
    // Field order matters: the lock is released before interrupts return.
    guard: SpinLockGuard<'a, T>,
    _irq: IrqGuard,
}

impl<T> SpinLock<T> {
    /// Acquires the lock with interrupts disabled for the guard's lifetime.
    ///
    /// # Platform / Privilege
    ///
    /// On bare-metal x86 this issues `cli`/`sti` and requires ring 0. On any
    /// other target the interrupt part is a no-op.
    #[inline]
    #[must_use]
    pub fn lock_irq(&self) -> IrqSpinLockGuard<'_, T> {
        let irq = IrqGuard::new();
        let guard = self.lock();
        IrqSpinLockGuard { guard, _irq: irq }
    }
}

impl<T> Deref for IrqSpinLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for IrqSpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

/// Disables hardware interrupts (`cli`).
///
/// # Safety & Privilege
///
/// Must only be called in contexts where `cli` is permitted.
#[inline]
pub fn cli_stop_interrupts() {
    #[cfg(all(target_os = "none", target_arch = "x86"))]
    unsafe {
        core::arch::asm!("cli", options(nomem, nostack, preserves_flags));
    }
}

/// Enables hardware interrupts (`sti`).
///
/// # Safety & Privilege
///
/// Must only be called in contexts where `sti` is permitted. Typically used
/// to restore a previously disabled interrupt state.
#[inline]
pub fn sti_enable_interrupts() {
    #[cfg(all(target_os = "none", target_arch = "x86"))]
    unsafe {
        core::arch::asm!("sti", options(nomem, nostack, preserves_flags));
    }
}

/// Returns the current `EFLAGS` value (via `pushfd/pop`).
///
/// Hosted builds report interrupts as disabled.
#[inline]
#[must_use]
pub fn eflags() -> u32 {
    #[cfg(all(target_os = "none", target_arch = "x86"))]
    {
        let r: u32;
        unsafe { core::arch::asm!("pushfd; pop {}", out(reg) r, options(preserves_flags)) }
        r
    }
    #[cfg(not(all(target_os = "none", target_arch = "x86")))]
    {
        0
    }
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// `IrqGuard::new()` snapshots the `IF` bit. If interrupts were enabled, it
/// executes `cli`. On drop, it executes `sti` **only** if they were
/// previously enabled, so guards nest correctly.
pub struct IrqGuard {
    /// Whether interrupts were enabled (IF=1) when the guard was created.
    were_enabled: bool,
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqGuard {
    /// Disables interrupts if they are currently enabled and remembers the state.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let enabled = (eflags() & EFLAGS_IF) != 0;
        if enabled {
            cli_stop_interrupts();
        }
        Self {
            were_enabled: enabled,
        }
    }

    #[inline]
    #[must_use]
    pub const fn were_enabled(&self) -> bool {
        self.were_enabled
    }
}

impl Drop for IrqGuard {
    /// Restores interrupts (`sti`) only if they were previously enabled.
    fn drop(&mut self) {
        if self.were_enabled {
            sti_enable_interrupts();
        }
    }
}
