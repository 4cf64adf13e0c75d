//! Exam slicing
//!
//! A review batch of `T` exams is cut into `W` contiguous slices, one per
//! worker. Every slice but the last holds `ceil(T / W)` exams; the last
//! absorbs whatever remains. Both bounds of every slice are clamped to `T`,
//! so small batches leave the trailing workers with empty slices instead of
//! reading past the end.

/// Exams assigned to each non-last worker: `ceil(total / workers)`.
///
/// Returns 0 when there are no workers.
pub fn exams_per_worker(total: usize, workers: usize) -> usize {
    if workers == 0 {
        return 0;
    }
    total.div_ceil(workers)
}

/// Split `items` into exactly `workers` contiguous slices.
///
/// Slice `i` goes to worker rank `i + 1`. Concatenating the slices in order
/// reproduces `items`. Returns no slices when `workers` is 0.
pub fn slice_exams<T>(items: &[T], workers: usize) -> Vec<&[T]> {
    let total = items.len();
    let per_worker = exams_per_worker(total, workers);

    (0..workers)
        .map(|i| {
            let start = (i * per_worker).min(total);
            let end = if i == workers - 1 {
                total
            } else {
                (start + per_worker).min(total)
            };
            &items[start..end]
        })
        .collect()
}
