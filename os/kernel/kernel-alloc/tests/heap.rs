use kernel_alloc::block::{HEADER_UNITS, UNIT_SIZE};
use kernel_alloc::{BlockInfo, Heap, HeapError, HeapStats};
use std::ptr::NonNull;

const SPACE_OVERHEAD: usize = 4; // space header + sentinel

fn words(n: usize) -> Vec<usize> {
    vec![0_usize; n]
}

/// `(units, used)` of every block in space 0.
fn layout(heap: &Heap<'_>) -> Vec<(usize, bool)> {
    heap.blocks(0).map(|b| (b.units, b.used)).collect()
}

fn blocks(heap: &Heap<'_>) -> Vec<BlockInfo> {
    heap.blocks(0).collect()
}

fn assert_consistent(heap: &Heap<'_>) {
    heap.check_invariants().unwrap();
    let s = heap.stats();
    assert_eq!(s.free_units + s.used_units, s.capacity_units);
}

#[test]
fn four_kib_space_scenario() {
    // [start, end) of 4096 bytes, handed over as zero-terminated lists.
    let mem = Box::leak(words(4096 / UNIT_SIZE).into_boxed_slice());
    let start = mem.as_mut_ptr().expose_provenance();
    let end = start + 4096;

    let mut heap = Heap::new();
    unsafe { heap.init_from_ranges(&[start, 0], &[end, 0]) }.unwrap();
    assert_consistent(&heap);

    let p = heap.malloc(100).unwrap();
    let addr = p.as_ptr().addr();
    assert!(addr >= start + (2 + HEADER_UNITS) * UNIT_SIZE);
    assert!(addr + 100 <= end);
    assert_eq!(addr % UNIT_SIZE, 0);

    assert!(heap.malloc(4000).is_none(), "header overhead leaves no room");
    assert_consistent(&heap);

    heap.free(p).unwrap();
    assert_eq!(layout(&heap), [(4096 / UNIT_SIZE - SPACE_OVERHEAD, false)]);

    let q = heap.malloc(4000).unwrap();
    assert!(q.as_ptr().addr() + 4000 <= end);
    assert_consistent(&heap);
}

#[test]
fn reinit_from_ranges_is_cancelled() {
    let a = Box::leak(words(128).into_boxed_slice());
    let b = Box::leak(words(128).into_boxed_slice());
    let (a0, a1) = (a.as_mut_ptr().expose_provenance(), a.as_mut_ptr().expose_provenance() + 128 * UNIT_SIZE);
    let (b0, b1) = (b.as_mut_ptr().expose_provenance(), b.as_mut_ptr().expose_provenance() + 128 * UNIT_SIZE);

    let mut heap = Heap::new();
    unsafe { heap.init_from_ranges(&[a0, 0], &[a1, 0]) }.unwrap();
    let before = heap.stats();
    let again = unsafe { heap.init_from_ranges(&[b0, 0], &[b1, 0]) };
    assert_eq!(again, Err(HeapError::Cancelled));
    assert_eq!(heap.stats(), before);
}

#[test]
fn ranges_are_validated_before_anything_is_written() {
    let a = Box::leak(words(64).into_boxed_slice());
    let a0 = a.as_mut_ptr().expose_provenance();
    let a1 = a0 + 64 * UNIT_SIZE;

    let mut heap = Heap::new();
    let overlapping = unsafe { heap.init_from_ranges(&[a0, a0 + UNIT_SIZE * 8, 0], &[a1, a1, 0]) };
    assert!(matches!(overlapping, Err(HeapError::InvalidRange { .. })));

    let misaligned = unsafe { heap.init_from_ranges(&[a0 + 1, 0], &[a1, 0]) };
    assert!(matches!(misaligned, Err(HeapError::InvalidRange { .. })));

    let reversed = unsafe { heap.init_from_ranges(&[a1, 0], &[a0, 0]) };
    assert!(matches!(reversed, Err(HeapError::InvalidRange { .. })));

    let unpaired = unsafe { heap.init_from_ranges(&[a0, 0], &[0]) };
    assert!(matches!(unpaired, Err(HeapError::InvalidRange { .. })));

    assert_eq!(unsafe { heap.init_from_ranges(&[0], &[0]) }, Err(HeapError::NoSpaces));

    assert!(!heap.is_initialized());
    assert!(a.iter().all(|&w| w == 0));
}

#[test]
fn split_leaves_linked_free_remainder() {
    let mut mem = words(64);
    let mut heap = Heap::new();
    heap.init([mem.as_mut_slice()]).unwrap();
    let total = 64 - SPACE_OVERHEAD;

    heap.malloc(3 * UNIT_SIZE).unwrap();
    let b = blocks(&heap);
    assert_eq!(b.len(), 2);
    assert_eq!((b[0].units, b[0].used, b[0].prev), (3 + HEADER_UNITS, true, None));
    assert_eq!(b[1].units, total - (3 + HEADER_UNITS));
    assert!(!b[1].used);
    assert_eq!(b[1].prev, Some(b[0].index));
    assert_eq!(b[1].index, b[0].index + b[0].units);
    assert_consistent(&heap);
}

#[test]
fn remainder_smaller_than_a_header_is_granted() {
    let mut mem = words(16);
    let mut heap = Heap::new();
    heap.init([mem.as_mut_slice()]).unwrap();
    let total = 16 - SPACE_OVERHEAD;

    // One unit short of the block: the leftover cannot hold a header.
    heap.malloc((total - HEADER_UNITS - 1) * UNIT_SIZE).unwrap();
    assert_eq!(layout(&heap), [(total, true)]);
    assert_eq!(heap.stats().used_units, total);
    assert_eq!(heap.stats().free_units, 0);
    assert!(heap.malloc(0).is_none());
    assert_consistent(&heap);
}

#[test]
fn remainder_of_exactly_a_header_is_split() {
    let mut mem = words(16);
    let mut heap = Heap::new();
    heap.init([mem.as_mut_slice()]).unwrap();
    let total = 16 - SPACE_OVERHEAD;

    heap.malloc((total - 2 * HEADER_UNITS) * UNIT_SIZE).unwrap();
    assert_eq!(layout(&heap), [(total - HEADER_UNITS, true), (HEADER_UNITS, false)]);
    assert_consistent(&heap);
}

#[test]
fn exact_fit_is_marked_used_in_place() {
    let mut mem = words(64);
    let mut heap = Heap::new();
    heap.init([mem.as_mut_slice()]).unwrap();

    let a = heap.malloc(4 * UNIT_SIZE).unwrap();
    let _b = heap.malloc(4 * UNIT_SIZE).unwrap();
    heap.free(a).unwrap();
    let before = layout(&heap);

    let again = heap.malloc(4 * UNIT_SIZE).unwrap();
    assert_eq!(again, a, "first fit reuses the hole");
    assert_eq!(layout(&heap).len(), before.len());
    assert_consistent(&heap);
}

/// Frees three adjacent 4-unit blocks in `order` and checks that exactly one
/// free block remains, correctly linked to the used blocks around it.
fn coalesce_in_order(order: [usize; 3]) {
    let mut mem = words(64);
    let mut heap = Heap::new();
    heap.init([mem.as_mut_slice()]).unwrap();
    let payload = (4 - HEADER_UNITS) * UNIT_SIZE;

    let before = heap.malloc(payload).unwrap();
    let abc = [
        heap.malloc(payload).unwrap(),
        heap.malloc(payload).unwrap(),
        heap.malloc(payload).unwrap(),
    ];
    let after = heap.malloc(payload).unwrap();
    assert_eq!(
        layout(&heap),
        [(4, true), (4, true), (4, true), (4, true), (4, true), (40, false)]
    );

    for i in order {
        heap.free(abc[i]).unwrap();
        assert_consistent(&heap);
    }

    let b = blocks(&heap);
    assert_eq!(
        b.iter().map(|b| (b.units, b.used)).collect::<Vec<_>>(),
        [(4, true), (12, false), (4, true), (40, false)],
        "order {order:?}"
    );
    assert_eq!(b[1].prev, Some(b[0].index));
    assert_eq!(b[2].prev, Some(b[1].index));
    assert_eq!(b[3].prev, Some(b[2].index));

    // The merged hole serves a request spanning all three blocks.
    let big = heap.malloc(payload * 3 + 2 * HEADER_UNITS * UNIT_SIZE).unwrap();
    assert_eq!(big, abc[0]);
    assert_consistent(&heap);

    heap.free(before).unwrap();
    heap.free(after).unwrap();
    heap.free(big).unwrap();
    assert_eq!(layout(&heap), [(60, false)]);
}

#[test]
fn coalescing_every_free_order() {
    for order in [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]] {
        coalesce_in_order(order);
    }
}

#[test]
fn freeing_everything_restores_a_single_block() {
    let mut a = words(96);
    let mut b = words(48);
    let mut heap = Heap::new();
    heap.init([a.as_mut_slice(), b.as_mut_slice()]).unwrap();
    let empty = heap.stats();

    let ptrs: Vec<NonNull<u8>> = (1..=12).filter_map(|n| heap.malloc(n * 3)).collect();
    assert_eq!(ptrs.len(), 12);
    assert_consistent(&heap);

    for p in ptrs.into_iter().rev() {
        heap.free(p).unwrap();
    }
    assert_eq!(heap.stats(), empty);
    assert_eq!(heap.blocks(0).count(), 1);
    assert_eq!(heap.blocks(1).count(), 1);
}

#[test]
fn counters_track_granted_units() {
    let mut mem = words(128);
    let mut heap = Heap::new();
    heap.init([mem.as_mut_slice()]).unwrap();
    let capacity = 128 - SPACE_OVERHEAD;
    assert_eq!(
        heap.stats(),
        HeapStats {
            free_units: capacity,
            used_units: 0,
            capacity_units: capacity,
            spaces: 1,
        }
    );

    let p = heap.malloc(10 * UNIT_SIZE).unwrap();
    assert_eq!(heap.stats().used_units, 10 + HEADER_UNITS);
    assert_eq!(heap.stats().free_units, capacity - 10 - HEADER_UNITS);
    assert_eq!(heap.stats().used_bytes(), (10 + HEADER_UNITS) * UNIT_SIZE);

    heap.free(p).unwrap();
    assert_eq!(heap.stats().used_units, 0);
    assert_eq!(heap.stats().free_bytes(), capacity * UNIT_SIZE);
}

/// Runs clean under Miri's default Stacked Borrows model: a payload stays
/// writable in full after later `malloc`/`free` calls edit the headers
/// around it.
#[test]
fn payload_stays_writable_across_heap_updates() {
    let mut mem = words(64);
    let mut heap = Heap::new();
    heap.init([mem.as_mut_slice()]).unwrap();

    let p = heap.malloc(32).unwrap();
    let q = heap.malloc(16).unwrap();
    heap.free(q).unwrap();

    unsafe { p.as_ptr().write_bytes(0xAB, 32) };
    let bytes = unsafe { std::slice::from_raw_parts(p.as_ptr(), 32) };
    assert!(bytes.iter().all(|&b| b == 0xAB));
    assert_consistent(&heap);

    heap.free(p).unwrap();
    assert_eq!(layout(&heap), [(64 - SPACE_OVERHEAD, false)]);
}

/// Small deterministic PRNG so the sequence is the same on every run.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, n: usize) -> usize {
        usize::try_from(self.next() % n as u64).unwrap()
    }
}

#[test]
fn random_workload_keeps_invariants_and_contents() {
    let mut mem = words(4096);
    let mut heap = Heap::new();
    heap.init([mem.as_mut_slice()]).unwrap();
    let empty = heap.stats();

    let mut rng = XorShift(0x2545_F491_4F6C_DD1D);
    let mut live: Vec<(NonNull<u8>, usize, u8)> = Vec::new();

    for step in 0..2_000 {
        if live.is_empty() || rng.below(3) != 0 {
            let size = rng.below(300);
            if let Some(p) = heap.malloc(size) {
                let tag = u8::try_from(step % 251).unwrap();
                unsafe { p.as_ptr().write_bytes(tag, size) };
                live.push((p, size, tag));
            }
        } else {
            let (p, size, tag) = live.swap_remove(rng.below(live.len()));
            let bytes = unsafe { std::slice::from_raw_parts(p.as_ptr(), size) };
            assert!(bytes.iter().all(|&b| b == tag), "block overwritten at step {step}");
            heap.free(p).unwrap();
        }
        assert_consistent(&heap);
    }

    for (p, _, _) in live.drain(..) {
        heap.free(p).unwrap();
    }
    assert_eq!(heap.stats(), empty);
    assert_eq!(heap.blocks(0).count(), 1);
}
