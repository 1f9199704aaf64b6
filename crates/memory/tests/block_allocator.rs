//! Block allocator behaviour through the heap

use pretty_assertions::assert_eq;
use strata_memory::prelude::*;

fn block_heap(capacity: usize, config: BlockConfig) -> (Heap, AllocatorId) {
    let mut heap = Heap::new(HeapConfig::debug());
    let id = heap.create_block(capacity, config, None).expect("create block");
    (heap, id)
}

#[test]
fn test_first_fit_reuse_and_full_coalesce() {
    let (mut heap, id) = block_heap(MB, BlockConfig::debug());
    let base = heap.base_ptr(id).expect("base");

    let a = heap.alloc(id, 300 * KB).expect("alloc A");
    let b = heap.alloc(id, 300 * KB).expect("alloc B");
    let c = heap.alloc(id, 300 * KB).expect("alloc C");
    assert!(a.ptr() < b.ptr() && b.ptr() < c.ptr());
    assert_eq!(a.ptr(), base);

    let b_ptr = b.ptr();
    heap.dealloc(id, b).expect("free B");
    let d = heap.alloc(id, 300 * KB).expect("alloc D");
    assert_eq!(d.ptr(), b_ptr);

    heap.dealloc(id, a).expect("free A");
    heap.dealloc(id, d).expect("free D");
    heap.dealloc(id, c).expect("free C");

    assert_eq!(heap.free_extents(id).expect("extents"), vec![Extent::new(0, MB)]);
    assert_eq!(heap.base_ptr(id).expect("base"), base);
}

#[test]
fn test_every_free_order_coalesces() {
    let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
    for order in orders {
        let (mut heap, id) = block_heap(MB, BlockConfig::production());
        let mut blocks: Vec<Option<Block>> = (0..3)
            .map(|_| Some(heap.alloc(id, 300 * KB).expect("alloc")))
            .collect();
        for index in order {
            let block = blocks[index].take().expect("freed once");
            heap.dealloc(id, block).expect("dealloc");
        }
        assert_eq!(heap.free_extents(id).expect("extents"), vec![Extent::new(0, MB)]);
    }
}

#[test]
fn test_exhaustion_is_a_typed_error() {
    let (mut heap, id) = block_heap(4 * KB, BlockConfig::production());
    let _all = heap.alloc(id, 4 * KB).expect("alloc");
    let err = heap.alloc(id, 16).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Capacity);
    assert_eq!(heap.free_extents(id).expect("extents"), vec![]);
}

#[test]
fn test_fragmented_space_rejects_large_request() {
    let (mut heap, id) = block_heap(KB, BlockConfig::production());
    let blocks: Vec<Block> = (0..8).map(|_| heap.alloc(id, 128).expect("alloc")).collect();
    let mut kept = Vec::new();
    for (index, block) in blocks.into_iter().enumerate() {
        if index % 2 == 0 {
            heap.dealloc(id, block).expect("dealloc");
        } else {
            kept.push(block);
        }
    }
    assert_eq!(heap.usage(id).expect("usage").available, 512);
    assert!(matches!(
        heap.alloc(id, 256),
        Err(AllocError::OutOfCapacity { available: 512, .. })
    ));
    assert_eq!(heap.free_extents(id).expect("extents").len(), 4);
}

#[test]
fn test_full_descriptor_table_rejects_free_without_mutation() {
    let config = BlockConfig::production().with_max_descriptors(2);
    let (mut heap, id) = {
        let mut heap = Heap::new(HeapConfig::production());
        let id = heap.create_block(KB, config, None).expect("create");
        (heap, id)
    };
    let mut blocks: Vec<Option<Block>> =
        (0..8).map(|_| Some(heap.alloc(id, 128).expect("alloc"))).collect();

    // Two isolated holes fill the table; a third isolated free cannot be recorded.
    for index in [1, 3] {
        let block = blocks[index].take().expect("live");
        heap.dealloc(id, block).expect("dealloc");
    }
    let before = heap.free_extents(id).expect("extents");
    let third = blocks[5].take().expect("live");
    let refused = heap.dealloc(id, third).unwrap_err();
    assert_eq!(refused.error(), &AllocError::DescriptorTableFull { capacity: 2 });
    assert_eq!(refused.error().category(), ErrorCategory::Capacity);
    assert_eq!(heap.free_extents(id).expect("extents"), before);
    let third = refused.into_block();
    assert_eq!(heap.usage(id).expect("usage").used, 6 * 128);

    // A free that merges with a hole needs no new descriptor.
    let neighbour = blocks[2].take().expect("live");
    heap.dealloc(id, neighbour).expect("merging free");
    assert_eq!(
        heap.free_extents(id).expect("extents"),
        vec![Extent::new(128, 384)]
    );

    // The table has room again, so the refused block can be handed back.
    heap.dealloc(id, third).expect("retried free");
    assert_eq!(
        heap.free_extents(id).expect("extents"),
        vec![Extent::new(128, 384), Extent::new(640, 128)]
    );
}

#[test]
fn test_default_table_survives_worst_case_fragmentation() {
    let (mut heap, id) = block_heap(MB, BlockConfig::production());
    let mut blocks = Vec::new();
    while blocks.len() < 65_536 {
        match heap.alloc(id, 16) {
            Ok(block) => blocks.push(block),
            Err(err) => {
                assert_eq!(err.category(), ErrorCategory::Capacity);
                break;
            }
        }
    }
    assert_eq!(blocks.len(), MB / 16);

    let mut kept = Vec::new();
    for (index, block) in blocks.into_iter().enumerate() {
        if index % 2 == 0 {
            heap.dealloc(id, block).expect("isolated free fits the default table");
        } else {
            kept.push(block);
        }
    }
    assert_eq!(heap.usage(id).expect("usage").used, MB / 2);
    assert_eq!(heap.free_extents(id).expect("extents").len(), MB / 32);

    // Highest first, so each merge only shifts the tail of the table.
    for block in kept.into_iter().rev() {
        heap.dealloc(id, block).expect("merging free");
    }
    assert_eq!(heap.free_extents(id).expect("extents"), vec![Extent::new(0, MB)]);
}

#[test]
fn test_stats_record_rejections() {
    let (mut heap, id) = {
        let mut heap = Heap::new(HeapConfig::production());
        let config = BlockConfig::debug().with_max_descriptors(1);
        let id = heap.create_block(KB, config, None).expect("create");
        (heap, id)
    };
    let blocks: Vec<Block> = (0..4).map(|_| heap.alloc(id, 256).expect("alloc")).collect();
    let mut blocks = blocks.into_iter();
    let first = blocks.next().expect("block");
    let _second = blocks.next().expect("block");
    let third = blocks.next().expect("block");

    heap.dealloc(id, first).expect("dealloc");
    assert!(heap.dealloc(id, third).is_err());

    let stats = heap.stats(id).expect("stats").expect("tracked");
    assert_eq!(stats.rejected_deallocations, 1);
    assert_eq!(stats.deallocation_count, 1);
}
