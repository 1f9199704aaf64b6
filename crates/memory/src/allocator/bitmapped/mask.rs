//! Bit-run helpers over a 64-bit occupancy mask.
//!
//! Bit `i` stands for block `i`; a run is `len` consecutive bits starting
//! at `start`, with `1 <= len` and `start + len <= 64`.

/// Blocks tracked by one mask
pub const BLOCKS: u32 = u64::BITS;

/// Mask with bits `start..start + len` set
#[inline]
pub const fn run_mask(start: u32, len: u32) -> u64 {
    debug_assert!(len >= 1 && start + len <= BLOCKS);
    if len == BLOCKS {
        u64::MAX
    } else {
        ((1u64 << len) - 1) << start
    }
}

/// Whether every bit of the run is set
#[inline]
pub const fn is_run_set(mask: u64, start: u32, len: u32) -> bool {
    let run = run_mask(start, len);
    mask & run == run
}

/// First start index of `len` consecutive clear bits.
///
/// When the window collides with occupied bits the scan resumes just past
/// the highest colliding bit, since no window starting at or below it can
/// be clear.
pub fn find_clear_run(mask: u64, len: u32) -> Option<u32> {
    if len == 0 || len > BLOCKS {
        return None;
    }
    let window = run_mask(0, len);
    let mut start = 0;
    while start + len <= BLOCKS {
        let hit = mask & (window << start);
        if hit == 0 {
            return Some(start);
        }
        start = BLOCKS - hit.leading_zeros();
    }
    None
}

/// Rounds a block count the way the allocator sizes runs.
///
/// Counts 1 to 4 are taken as is. Larger counts are decomposed greedily
/// against the markers 32, 16, 8, 4, 2, 1, which reaches every count up to
/// 63; a full mask is 64. Anything larger cannot be served and yields
/// `None`.
pub fn run_length(needed: usize) -> Option<u32> {
    const MARKERS: [usize; 6] = [32, 16, 8, 4, 2, 1];

    match needed {
        0 => return None,
        1..=4 => return Some(needed as u32),
        _ => {}
    }
    let mut current = 0;
    for marker in MARKERS {
        let candidate = current + marker;
        if candidate == needed {
            return Some(candidate as u32);
        }
        if candidate < needed {
            current = candidate;
        }
    }
    (needed == BLOCKS as usize).then_some(BLOCKS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mask_edges() {
        assert_eq!(run_mask(0, 1), 1);
        assert_eq!(run_mask(63, 1), 1 << 63);
        assert_eq!(run_mask(4, 4), 0xF0);
        assert_eq!(run_mask(0, 64), u64::MAX);
    }

    #[test]
    fn test_find_clear_run_skips_past_collisions() {
        assert_eq!(find_clear_run(0, 64), Some(0));
        assert_eq!(find_clear_run(0b1, 1), Some(1));
        assert_eq!(find_clear_run(0b1011, 2), Some(4));
        assert_eq!(find_clear_run(0x00FF_0000_0000_00FF, 8), Some(8));
        assert_eq!(find_clear_run(1 << 63, 63), Some(0));
        assert_eq!(find_clear_run(1, 64), None);
        assert_eq!(find_clear_run(u64::MAX, 1), None);
    }

    #[test]
    fn test_run_length_covers_every_count() {
        for needed in 1..=64 {
            assert_eq!(run_length(needed), Some(needed as u32), "count {needed}");
        }
        assert_eq!(run_length(0), None);
        assert_eq!(run_length(65), None);
        assert_eq!(run_length(128), None);
    }

    #[test]
    fn test_is_run_set() {
        let mask = run_mask(8, 8);
        assert!(is_run_set(mask, 8, 8));
        assert!(is_run_set(mask, 10, 2));
        assert!(!is_run_set(mask, 7, 2));
    }
}
