//! Scroll offset → content segment mapping

/// Height of one content segment as a share of the viewport height
pub const SEGMENT_FRACTION: f32 = 0.8;

/// Index of the segment under `scroll_y`, clamped to `[0, count - 1]`.
/// Returns 0 when there are no segments.
pub fn segment_index(scroll_y: f32, viewport_height: f32, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    let segment_height = viewport_height * SEGMENT_FRACTION;
    if segment_height <= 0.0 || scroll_y <= 0.0 {
        return 0;
    }
    let index = (scroll_y / segment_height).floor() as usize;
    index.min(count - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_are_eighty_percent_of_viewport() {
        assert_eq!(segment_index(0.0, 1000.0, 4), 0);
        assert_eq!(segment_index(799.0, 1000.0, 4), 0);
        assert_eq!(segment_index(800.0, 1000.0, 4), 1);
        assert_eq!(segment_index(2400.0, 1000.0, 4), 3);
    }

    #[test]
    fn clamps_to_range() {
        assert_eq!(segment_index(-50.0, 1000.0, 4), 0);
        assert_eq!(segment_index(1e6, 1000.0, 4), 3);
        assert_eq!(segment_index(500.0, 1000.0, 0), 0);
        assert_eq!(segment_index(500.0, 0.0, 3), 0);
    }
}
