use kernel_sync::{IrqGuard, SpinLock};
use std::sync::Arc;
use std::thread;

/// State set up once at boot and then only touched by a fault handler.
struct Tables {
    installed: usize,
}

#[test]
fn one_shot_setup_under_lock_irq() {
    let slot: SpinLock<Option<Tables>> = SpinLock::new(None);
    {
        let mut s = slot.lock_irq();
        assert!(s.is_none());
        *s = Some(Tables { installed: 0 });
    }
    assert!(!slot.is_locked());
    assert!(slot.lock_irq().is_some());
}

#[test]
fn handler_refuses_a_lock_held_by_the_code_it_interrupted() {
    let slot = SpinLock::new(Some(Tables { installed: 0 }));

    let holder = slot.lock_irq();
    assert!(slot.is_locked());
    // The handler runs on the same core; spinning would never end.
    assert!(slot.try_lock().is_none());
    drop(holder);

    let mut handler = slot.try_lock().expect("lock is free again");
    if let Some(t) = handler.as_mut() {
        t.installed += 1;
    }
    drop(handler);
    assert_eq!(slot.lock().as_ref().map(|t| t.installed), Some(1));
}

#[test]
fn irq_guard_releases_the_lock_first() {
    let l = SpinLock::new(0_u32);
    let outer = IrqGuard::new();
    {
        let mut g = l.lock_irq();
        *g = 7;
    }
    // Interrupts are still masked by `outer`, but the lock is free.
    assert!(!l.is_locked());
    assert!(!outer.were_enabled());
    drop(outer);
    assert_eq!(l.with_lock(|v| *v), 7);
}

#[test]
fn nested_locks_unwind_in_reverse() {
    let heap = SpinLock::new(Vec::<usize>::new());
    let paging = SpinLock::new(0_usize);

    let mut h = heap.lock_irq();
    let mut p = paging.lock_irq();
    *p += 1;
    h.push(*p);
    drop(p);
    assert!(!paging.is_locked());
    assert!(heap.is_locked());
    drop(h);
    assert_eq!(heap.lock().as_slice(), &[1]);
}

#[test]
fn static_lock_serves_as_global_state() {
    static HEAP_WORDS: SpinLock<[usize; 8]> = SpinLock::new([0; 8]);

    HEAP_WORDS.lock_irq()[0] = 0x1000;
    HEAP_WORDS.with_lock(|w| w[1] = 8);
    assert_eq!(HEAP_WORDS.lock()[..2], [0x1000, 8]);
    assert!(!HEAP_WORDS.is_locked());
}

#[test]
fn lock_irq_excludes_other_threads() {
    let threads = 4;
    let rounds = 1_000;
    let log = Arc::new(SpinLock::new(Vec::with_capacity(threads * rounds)));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for i in 0..rounds {
                    let mut g = log.lock_irq();
                    // Two pushes per round must stay adjacent.
                    g.push((t, i));
                    g.push((t, i));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let log = log.lock();
    assert_eq!(log.len(), 2 * threads * rounds);
    assert!(log.chunks(2).all(|pair| pair[0] == pair[1]));
}
