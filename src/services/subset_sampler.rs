//! Deterministic subset selection for aggregation prompts.

/// Pick `size` indices out of `0..total_items` as a rotation starting at `offset`.
///
/// When `size >= total_items` every index is returned in order. The offset may
/// be negative or larger than `total_items`; it is reduced modulo `total_items`.
pub fn sample(total_items: usize, size: usize, offset: i64) -> Vec<usize> {
    if size >= total_items {
        return (0..total_items).collect();
    }

    let total = total_items as i64;
    let start = offset.rem_euclid(total) as usize;
    (0..size).map(|i| (start + i) % total_items).collect()
}
