//! Row partitioning of the system arena.
//!
//! Each system handler receives a [`GridChunk`]: a mutable slice covering a
//! contiguous range of whole rows. The chunks are carved out of the arena
//! with `split_at_mut`, so no handler can reach a system outside its rows.

use std::ops::Range;

use crate::system::StarSystem;

/// Split `height` rows into `parts` contiguous ranges.
///
/// Sizes differ by at most one; the first `height % parts` ranges carry the
/// extra row. With more parts than rows the trailing ranges are empty.
#[must_use]
pub fn partition_rows(height: u32, parts: usize) -> Vec<Range<u32>> {
    let parts = parts.max(1) as u32;
    let base = height / parts;
    let extra = height % parts;

    let mut start = 0;
    (0..parts)
        .map(|i| {
            let len = base + u32::from(i < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Whole rows of systems owned by one worker.
#[derive(Debug)]
pub struct GridChunk<'a> {
    rows: Range<u32>,
    systems: &'a mut [StarSystem],
}

impl<'a> GridChunk<'a> {
    /// Rows covered.
    #[must_use]
    pub fn rows(&self) -> Range<u32> {
        self.rows.clone()
    }

    /// Systems in row-major order.
    pub fn systems_mut(&mut self) -> &mut [StarSystem] {
        &mut *self.systems
    }

    /// Give up the chunk, returning its slice.
    pub fn into_systems(self) -> &'a mut [StarSystem] {
        self.systems
    }
}

/// Carve `systems` (row-major, `width` per row) into one chunk per range.
///
/// `ranges` must be contiguous and start at row zero, as produced by
/// [`partition_rows`].
pub fn split_chunks<'a>(
    mut systems: &'a mut [StarSystem],
    width: u32,
    ranges: &[Range<u32>],
) -> Vec<GridChunk<'a>> {
    let mut chunks = Vec::with_capacity(ranges.len());
    for rows in ranges {
        let len = (((rows.end - rows.start) * width) as usize).min(systems.len());
        let (head, tail) = std::mem::take(&mut systems).split_at_mut(len);
        systems = tail;
        chunks.push(GridChunk {
            rows: rows.clone(),
            systems: head,
        });
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::galaxy::Galaxy;

    #[test]
    fn test_remainder_goes_to_first_chunks() {
        let sizes: Vec<u32> = partition_rows(10, 4).iter().map(|r| r.end - r.start).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2]);
    }

    #[test]
    fn test_more_parts_than_rows() {
        let ranges = partition_rows(2, 4);
        assert_eq!(ranges, vec![0..1, 1..2, 2..2, 2..2]);
    }

    #[test]
    fn test_chunks_cover_arena() {
        let mut galaxy = Galaxy::new(3, 5, 0);
        let ranges = partition_rows(5, 2);
        let chunks = split_chunks(&mut galaxy.systems, 3, &ranges);
        assert_eq!(chunks.len(), 2);
        let first = chunks.into_iter().map(GridChunk::into_systems).collect::<Vec<_>>();
        assert_eq!(first[0].len(), 9);
        assert_eq!(first[1].len(), 6);
        assert_eq!(first[1][0].position.y, 3);
    }
}
