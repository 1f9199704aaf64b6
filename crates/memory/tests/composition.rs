//! Parent/child composition and lifecycle checks

use pretty_assertions::assert_eq;
use strata_memory::prelude::*;

fn heap() -> Heap {
    Heap::new(HeapConfig::production())
}

#[test]
fn test_child_region_is_carved_from_parent() {
    let mut heap = heap();
    let parent = heap.create_block(MB, BlockConfig::production(), None).expect("parent");
    let child = heap
        .create_pool(64, 100, PoolConfig::production(), Some(parent))
        .expect("child");

    assert_eq!(heap.parent(child).expect("parent"), Some(parent));
    assert_eq!(heap.children(parent).expect("children"), 1);
    assert_eq!(heap.usage(parent).expect("usage").used, 6400);

    let parent_base = heap.base_ptr(parent).expect("base").addr().get();
    let node = heap.alloc(child, 64).expect("alloc");
    let addr = node.ptr().addr().get();
    assert!(addr >= parent_base && addr + node.size() <= parent_base + MB);
    heap.dealloc(child, node).expect("dealloc");

    heap.destroy(child).expect("destroy child");
    assert_eq!(heap.children(parent).expect("children"), 0);
    assert_eq!(heap.free_extents(parent).expect("extents"), vec![Extent::new(0, MB)]);
}

#[test]
fn test_parent_with_children_cannot_be_reset_or_destroyed() {
    let mut heap = heap();
    let parent = heap.create_block(64 * KB, BlockConfig::production(), None).expect("parent");
    let child = heap
        .create_stack(4 * KB, StackConfig::production(), Some(parent))
        .expect("child");

    let live_children = Some(Misuse::LiveChildren { id: parent, children: 1 });
    assert_eq!(heap.destroy(parent).unwrap_err().as_misuse(), live_children);
    assert_eq!(heap.reset(parent).unwrap_err().as_misuse(), live_children);
    assert!(heap.is_live(parent));

    heap.destroy(child).expect("destroy child");
    heap.destroy(parent).expect("destroy parent");
    assert!(heap.is_empty());
}

#[test]
fn test_refused_child_region_leaves_child_alive() {
    let mut heap = heap();
    let config = BlockConfig::production().with_max_descriptors(4);
    let root = heap.create_block(2 * KB, config, None).expect("root");
    let child = heap
        .create_stack(KB, StackConfig::production(), Some(root))
        .expect("child");
    let mut blocks: Vec<Option<Block>> =
        (0..8).map(|_| Some(heap.alloc(root, 128).expect("alloc"))).collect();
    assert!(heap.alloc(root, 16).is_err());

    // Four holes, none touching the child's region, fill the table.
    for index in [1, 3, 5, 7] {
        let block = blocks[index].take().expect("live");
        heap.dealloc(root, block).expect("dealloc");
    }
    let extents = heap.free_extents(root).expect("extents");
    let usage = heap.usage(root).expect("usage");

    let err = heap.destroy(child).unwrap_err();
    assert_eq!(err, AllocError::DescriptorTableFull { capacity: 4 });
    assert!(heap.is_live(child));
    assert_eq!(heap.children(root).expect("children"), 1);
    assert_eq!(heap.free_extents(root).expect("extents"), extents);
    assert_eq!(heap.usage(root).expect("usage"), usage);
    let scratch = heap.alloc(child, 64).expect("child still allocates");
    heap.dealloc(child, scratch).expect("dealloc");

    // Once the hole next to the child is bridged, its region merges in.
    let bridge = blocks[0].take().expect("live");
    heap.dealloc(root, bridge).expect("merging free");
    heap.destroy(child).expect("destroy child");
    assert_eq!(heap.children(root).expect("children"), 0);
    assert_eq!(heap.usage(root).expect("usage").used, 3 * 128);
}

#[test]
fn test_child_too_large_for_parent() {
    let mut heap = heap();
    let parent = heap.create_stack(4 * KB, StackConfig::production(), None).expect("parent");
    let err = heap
        .create_block(8 * KB, BlockConfig::production(), Some(parent))
        .unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(heap.children(parent).expect("children"), 0);
    assert_eq!(heap.len(), 1);
}

#[test]
fn test_three_level_nesting() {
    let mut heap = heap();
    let root = heap.create_block(MB, BlockConfig::production(), None).expect("root");
    let frame = heap
        .create_stack(128 * KB, StackConfig::production(), Some(root))
        .expect("frame");
    let slots = heap
        .create_bitmapped_block(256, BitmappedConfig::production(), Some(frame))
        .expect("slots");

    let a = heap.alloc(slots, 300).expect("alloc");
    let b = heap.alloc(slots, 256).expect("alloc");
    assert!(!a.overlaps(&b));
    assert_eq!(heap.occupancy(slots).expect("mask"), 0b111);

    assert!(heap.destroy(frame).is_err());
    heap.destroy(slots).expect("destroy slots");
    assert_eq!(heap.usage(frame).expect("usage").used, 0);
    heap.destroy(frame).expect("destroy frame");
    assert_eq!(heap.usage(root).expect("usage").used, 0);
}

#[test]
fn test_destroyed_handle_is_rejected_everywhere() {
    let mut heap = heap();
    let id = heap.create_pool(32, 8, PoolConfig::production(), None).expect("create");
    let block = heap.alloc(id, 32).expect("alloc");
    heap.destroy(id).expect("destroy");

    let destroyed = Some(Misuse::Destroyed(id));
    assert_eq!(heap.alloc(id, 32).unwrap_err().as_misuse(), destroyed);
    assert_eq!(heap.dealloc(id, block).unwrap_err().error().as_misuse(), destroyed);
    assert_eq!(heap.reset(id).unwrap_err().as_misuse(), destroyed);
    assert_eq!(heap.destroy(id).unwrap_err().as_misuse(), destroyed);
    assert_eq!(heap.kind(id).unwrap_err().as_misuse(), destroyed);
    assert_eq!(
        heap.create_stack(KB, StackConfig::production(), Some(id))
            .unwrap_err()
            .as_misuse(),
        destroyed
    );
}

#[test]
fn test_handles_from_another_heap_are_unknown() {
    let mut first = heap();
    let mut second = heap();
    let _a = first.create_stack(KB, StackConfig::production(), None).expect("create");
    let b = first.create_stack(KB, StackConfig::production(), None).expect("create");
    let _c = second.create_stack(KB, StackConfig::production(), None).expect("create");

    assert_eq!(
        second.alloc(b, 16).unwrap_err().as_misuse(),
        Some(Misuse::UnknownAllocator(b))
    );
}

#[test]
fn test_block_from_same_slot_in_another_heap_is_foreign() {
    let mut first = heap();
    let mut second = heap();
    let a = first.create_stack(KB, StackConfig::production(), None).expect("create");
    let b = second.create_stack(KB, StackConfig::production(), None).expect("create");
    assert_eq!(a, b);

    let block = first.alloc(a, 16).expect("alloc");
    let err = second.dealloc(b, block).unwrap_err();
    assert_eq!(
        *err.error(),
        AllocError::InvariantViolation {
            kind: AllocatorKind::Stack,
            violation: Violation::ForeignBlock { owner: a },
        }
    );
}

#[test]
#[should_panic(expected = "belongs to allocator")]
fn test_strict_mode_panics_on_foreign_block() {
    let mut heap = Heap::new(HeapConfig::debug());
    let left = heap.create_block(4 * KB, BlockConfig::production(), None).expect("create");
    let right = heap.create_block(4 * KB, BlockConfig::production(), None).expect("create");
    let block = heap.alloc(left, 64).expect("alloc");
    let _ = heap.dealloc(right, block);
}

#[test]
fn test_heap_drop_releases_live_allocators() {
    let mut heap = heap();
    let root = heap.create_block(256 * KB, BlockConfig::production(), None).expect("root");
    let child = heap
        .create_pool(128, 64, PoolConfig::production(), Some(root))
        .expect("child");
    let _block = heap.alloc(child, 100).expect("alloc");
    drop(heap);
}
