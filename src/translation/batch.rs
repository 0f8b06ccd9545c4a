/*!
 * Batch partitioning for subtitle translation.
 *
 * Pure functions that decide how a cue list is cut into fixed-size batches
 * and how many leading batches cover the initial playback window.
 */

use std::ops::Range;

use crate::subtitle_processor::Cue;

/// Number of batches needed to cover `len` items
pub fn batch_count(len: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    len.div_ceil(batch_size)
}

/// Number of leading batches needed to cover every cue starting within the window.
///
/// The first cue whose start time lies beyond `initial_window_secs` marks the
/// cut; when no such cue exists the whole list is covered. At least one batch
/// is always returned so playback never starts with nothing translated.
/// Cues are expected in ascending start-time order; unsorted input yields an
/// arbitrary but bounded count.
pub fn initial_batch_count(cues: &[Cue], batch_size: usize, initial_window_secs: f64) -> usize {
    if batch_size == 0 {
        return 0;
    }

    let cut = cues
        .iter()
        .position(|cue| cue.start_time > initial_window_secs)
        .unwrap_or(cues.len());

    cut.div_ceil(batch_size).max(1)
}

/// Index range of the batch `batch_index` over a list of `len` items
pub fn batch_range(batch_index: usize, batch_size: usize, len: usize) -> Range<usize> {
    let start = batch_index.saturating_mul(batch_size).min(len);
    let end = start.saturating_add(batch_size).min(len);
    start..end
}
