//! Stack allocator behaviour through the heap

use strata_memory::prelude::*;

fn top(heap: &Heap, id: AllocatorId) -> usize {
    match heap.strategy(id).expect("live allocator") {
        Strategy::Stack(stack) => stack.top(),
        other => panic!("expected a stack, got {}", other.kind()),
    }
}

fn stack(capacity: usize) -> (Heap, AllocatorId) {
    let mut heap = Heap::new(HeapConfig::debug());
    let id = heap
        .create_stack(capacity, StackConfig::debug(), None)
        .expect("create stack");
    (heap, id)
}

#[test]
fn test_blocks_are_contiguous_and_aligned() {
    let (mut heap, id) = stack(4 * KB);
    let base = heap.base_ptr(id).expect("base").addr().get();

    let a = heap.alloc(id, 10).expect("alloc");
    let b = heap.alloc(id, 100).expect("alloc");
    assert_eq!(a.ptr().addr().get(), base);
    assert_eq!(b.ptr().addr().get(), base + 16);
    assert_eq!(b.size(), 112);
    assert_eq!(b.ptr().addr().get() % MIN_ALIGN, 0);
    assert!(!a.overlaps(&b));
}

#[test]
fn test_out_of_order_free_leaves_cursor() {
    let (mut heap, id) = stack(4 * KB);
    let a = heap.alloc(id, 64).expect("alloc");
    let _b = heap.alloc(id, 64).expect("alloc");
    let before = top(&heap, id);

    heap.dealloc(id, a).expect("out-of-order free is not an error");
    assert_eq!(top(&heap, id), before);
}

#[test]
fn test_reverse_order_free_reclaims_everything() {
    let (mut heap, id) = stack(4 * KB);
    let _keep = heap.alloc(id, 32).expect("alloc");
    let start = top(&heap, id);

    let blocks: Vec<Block> = [16, 48, 200, 1]
        .into_iter()
        .map(|size| heap.alloc(id, size).expect("alloc"))
        .collect();
    for block in blocks.into_iter().rev() {
        heap.dealloc(id, block).expect("dealloc");
    }
    assert_eq!(top(&heap, id), start);
}

#[test]
fn test_exhaustion_then_reset() {
    let (mut heap, id) = stack(256);
    let mut live = Vec::new();
    while let Ok(block) = heap.alloc(id, 64) {
        live.push(block);
    }
    assert_eq!(live.len(), 4);

    let err = heap.alloc(id, 1).unwrap_err();
    assert!(matches!(err, AllocError::OutOfCapacity { kind: AllocatorKind::Stack, .. }));
    assert!(err.is_recoverable());

    heap.reset(id).expect("reset");
    assert_eq!(top(&heap, id), 0);
    assert!(heap.alloc(id, 256).is_ok());
}

#[test]
fn test_marker_rewind() {
    let (mut heap, id) = stack(KB);
    let _keep = heap.alloc(id, 32).expect("alloc");
    let marker = heap.stack_mark(id).expect("mark");
    for _ in 0..4 {
        let _scratch = heap.alloc(id, 64).expect("alloc");
    }
    heap.stack_rewind(id, marker).expect("rewind");
    assert_eq!(top(&heap, id), marker.position());

    heap.reset(id).expect("reset");
    assert_eq!(
        heap.stack_rewind(id, marker).unwrap_err().as_misuse(),
        Some(Misuse::MarkerAboveTop { position: 32, top: 0 })
    );
}

#[test]
fn test_rewind_invalidates_blocks_above_marker() {
    let (mut heap, id) = stack(KB);
    let a = heap.alloc(id, 64).expect("alloc A");
    let marker = heap.stack_mark(id).expect("mark");
    let b = heap.alloc(id, 64).expect("alloc B");
    heap.stack_rewind(id, marker).expect("rewind");
    let c = heap.alloc(id, 64).expect("alloc C");
    assert_eq!(c.ptr(), b.ptr());

    let refused = heap.dealloc(id, b).unwrap_err();
    assert_eq!(refused.error().as_misuse(), Some(Misuse::StaleBlock(id)));
    let b = refused.into_block();
    assert_eq!(heap.bytes(&b).unwrap_err().as_misuse(), Some(Misuse::StaleBlock(id)));
    assert_eq!(top(&heap, id), 128);

    let d = heap.alloc(id, 64).expect("alloc D");
    assert!(!d.overlaps(&c));
    assert!(!d.overlaps(&a));

    heap.bytes_mut(&a).expect("below the marker").fill(7);
    heap.dealloc(id, d).expect("dealloc D");
    heap.dealloc(id, c).expect("dealloc C");
    heap.dealloc(id, a).expect("dealloc A");
    assert_eq!(top(&heap, id), 0);
}

#[test]
fn test_debug_patterns_applied() {
    let (mut heap, id) = stack(KB);
    let block = heap.alloc(id, 32).expect("alloc");
    assert!(heap.bytes(&block).expect("bytes").iter().all(|&b| b == 0xCC));
    heap.dealloc(id, block).expect("dealloc");
}
