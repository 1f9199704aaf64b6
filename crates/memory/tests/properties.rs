//! Property tests for allocator invariants under arbitrary alloc/free
//! sequences.

use proptest::prelude::*;
use strata_memory::prelude::{
    AllocatorId, BitmappedConfig, Block, BlockConfig, Extent, FreeListConfig, Heap, HeapConfig, KB,
    PoolConfig, StackConfig,
};

#[derive(Debug, Clone)]
enum Op {
    Alloc(usize),
    /// Frees the live block at this index (modulo the live count)
    Free(usize),
}

fn op_sequence(max_size: usize) -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        3 => (1..=max_size).prop_map(Op::Alloc),
        2 => any::<usize>().prop_map(Op::Free),
    ];
    proptest::collection::vec(op, 1..120)
}

fn assert_disjoint(live: &[Block]) {
    for (i, a) in live.iter().enumerate() {
        for b in &live[i + 1..] {
            assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
        }
    }
}

fn assert_sorted_and_merged(extents: &[Extent]) {
    for pair in extents.windows(2) {
        assert!(
            pair[0].end() < pair[1].offset,
            "descriptors {:?} and {:?} are unsorted or mergeable",
            pair[0],
            pair[1]
        );
    }
}

/// Runs `ops` against `id`, checking no two live blocks overlap after every step
fn run(heap: &mut Heap, id: AllocatorId, ops: &[Op], mut check: impl FnMut(&Heap)) {
    let mut live: Vec<Block> = Vec::new();
    for op in ops {
        match *op {
            Op::Alloc(size) => {
                if let Ok(block) = heap.alloc(id, size) {
                    assert!(block.size() >= size);
                    live.push(block);
                }
            }
            Op::Free(index) if !live.is_empty() => {
                let block = live.swap_remove(index % live.len());
                heap.dealloc(id, block).expect("live block frees cleanly");
            }
            Op::Free(_) => {}
        }
        assert_disjoint(&live);
        check(&*heap);
    }
    for block in live {
        heap.dealloc(id, block).expect("live block frees cleanly");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn block_descriptors_stay_sorted_and_merged(ops in op_sequence(8 * KB)) {
        let mut heap = Heap::new(HeapConfig::debug());
        let id = heap.create_block(64 * KB, BlockConfig::production(), None).expect("create");
        run(&mut heap, id, &ops, |heap| {
            assert_sorted_and_merged(&heap.free_extents(id).expect("extents"));
        });
        prop_assert_eq!(heap.free_extents(id).expect("extents"), vec![Extent::new(0, 64 * KB)]);
    }

    #[test]
    fn free_list_returns_everything_to_its_parent(ops in op_sequence(256)) {
        let mut heap = Heap::new(HeapConfig::debug());
        let parent = heap.create_block(64 * KB, BlockConfig::production(), None).expect("create");
        let list = heap
            .create_free_list(16, 128, FreeListConfig::debug(), parent)
            .expect("create");
        run(&mut heap, list, &ops, |heap| {
            assert_sorted_and_merged(&heap.free_extents(parent).expect("extents"));
        });
        heap.destroy(list).expect("destroy");
        prop_assert_eq!(heap.free_extents(parent).expect("extents"), vec![Extent::new(0, 64 * KB)]);
    }

    #[test]
    fn pool_blocks_never_overlap(ops in op_sequence(128)) {
        let mut heap = Heap::new(HeapConfig::debug());
        let id = heap.create_pool(128, 32, PoolConfig::production(), None).expect("create");
        run(&mut heap, id, &ops, |_| {});
        prop_assert_eq!(heap.usage(id).expect("usage").used, 0);
    }

    #[test]
    fn bitmapped_blocks_never_overlap(ops in op_sequence(16 * 64)) {
        let mut heap = Heap::new(HeapConfig::debug());
        let id = heap.create_bitmapped_block(64, BitmappedConfig::production(), None).expect("create");
        run(&mut heap, id, &ops, |heap| {
            let mask = heap.occupancy(id).expect("mask");
            let used = heap.usage(id).expect("usage").used;
            assert_eq!(mask.count_ones() as usize * 64, used);
        });
        prop_assert_eq!(heap.occupancy(id).expect("mask"), 0);
    }

    #[test]
    fn block_round_trip_restores_free_set(
        prefix in proptest::collection::vec(1usize..4 * KB, 0..12),
        size in 1usize..16 * KB,
    ) {
        let mut heap = Heap::new(HeapConfig::debug());
        let id = heap.create_block(64 * KB, BlockConfig::production(), None).expect("create");
        let mut held = Vec::new();
        for (i, bytes) in prefix.into_iter().enumerate() {
            let block = heap.alloc(id, bytes).expect("prefix fits");
            if i % 3 == 0 {
                heap.dealloc(id, block).expect("dealloc");
            } else {
                held.push(block);
            }
        }

        let before = heap.free_extents(id).expect("extents");
        if let Ok(block) = heap.alloc(id, size) {
            heap.dealloc(id, block).expect("dealloc");
        }
        prop_assert_eq!(heap.free_extents(id).expect("extents"), before);
    }

    #[test]
    fn bitmapped_round_trip_restores_mask(
        prefix in proptest::collection::vec(1usize..8 * 64, 0..6),
        size in 1usize..=64 * 64,
    ) {
        let mut heap = Heap::new(HeapConfig::debug());
        let id = heap.create_bitmapped_block(64, BitmappedConfig::production(), None).expect("create");
        let _held: Vec<Block> = prefix
            .into_iter()
            .filter_map(|bytes| heap.alloc(id, bytes).ok())
            .collect();

        let before = heap.occupancy(id).expect("mask");
        if let Ok(block) = heap.alloc(id, size) {
            heap.dealloc(id, block).expect("dealloc");
        }
        prop_assert_eq!(heap.occupancy(id).expect("mask"), before);
    }

    #[test]
    fn stack_reverse_order_free_restores_cursor(
        sizes in proptest::collection::vec(1usize..512, 1..24),
    ) {
        let mut heap = Heap::new(HeapConfig::debug());
        let id = heap.create_stack(16 * KB, StackConfig::production(), None).expect("create");
        let before = heap.usage(id).expect("usage").used;

        let blocks: Vec<Block> = sizes.iter().map(|&n| heap.alloc(id, n).expect("fits")).collect();
        assert_disjoint(&blocks);
        for block in blocks.into_iter().rev() {
            heap.dealloc(id, block).expect("dealloc");
        }
        prop_assert_eq!(heap.usage(id).expect("usage").used, before);
    }
}
