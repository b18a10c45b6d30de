use crate::event::Timestamped;

/// Binary search over entries sorted ascending by epoch.
///
/// Returns the index of the last entry with `epoch_ms <= target`, or `None`
/// when every entry is after `target` (or `entries` is empty). With repeated
/// timestamps the last of the run is returned, so `entries[i] <= target < entries[i + 1]`.
pub fn index_of<T: Timestamped>(entries: &[T], target: i64) -> Option<usize> {
    let (mut lo, mut hi) = (0usize, entries.len());
    // invariant: entries[..lo] <= target, entries[hi..] > target
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if entries[mid].epoch_ms() <= target {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo.checked_sub(1)
}

/// Index of the first entry with `epoch_ms >= target` (may be `entries.len()`).
pub fn first_at_or_after<T: Timestamped>(entries: &[T], target: i64) -> usize {
    match target.checked_sub(1) {
        Some(before) => index_of(entries, before).map_or(0, |i| i + 1),
        None => 0,
    }
}
