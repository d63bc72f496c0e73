//! Follow-the-bottom scrolling. A reader who has scrolled up to review
//! history keeps their place; only a viewport already near the bottom is
//! re-anchored when content grows.

/// Rows from the bottom within which the view still follows new content.
pub const FOLLOW_THRESHOLD: usize = 100;

/// Offset that puts the last row of content on the last viewport row.
pub fn bottom_offset(content_rows: usize, viewport_rows: usize) -> usize {
    content_rows.saturating_sub(viewport_rows)
}

/// Distance between the current offset and the bottom anchor.
pub fn distance_from_bottom(content_rows: usize, viewport_rows: usize, offset: usize) -> usize {
    bottom_offset(content_rows, viewport_rows).saturating_sub(offset)
}

/// Decide whether an append should re-anchor the viewport. Measured
/// against the pre-append geometry: returns the new bottom offset iff the
/// view was within [`FOLLOW_THRESHOLD`] of the bottom, `None` otherwise
/// (the viewport must not move).
pub fn maybe_scroll_to_bottom(
    pre_content_rows: usize,
    viewport_rows: usize,
    offset: usize,
    new_content_rows: usize
) -> Option<usize> {
    if distance_from_bottom(pre_content_rows, viewport_rows, offset) < FOLLOW_THRESHOLD {
        Some(bottom_offset(new_content_rows, viewport_rows))
    } else {
        None
    }
}
