//! Tiling arrangements. Pure functions from an area and a count to boxes.

use crate::{
    geometry::{self, Rect},
    workspace::LayoutMode,
};

/// Boxes for `count` tiled views in `area`, in collection order.
/// Floating leaves views alone and yields nothing.
pub fn arrange(mode: LayoutMode, area: Rect, count: usize) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }
    match mode {
        LayoutMode::Floating => Vec::new(),
        LayoutMode::Stack => stack(area, count),
        LayoutMode::Grid => grid(area, count),
        LayoutMode::Monocle => vec![area; count],
    }
}

fn stack(area: Rect, count: usize) -> Vec<Rect> {
    (0..count)
        .map(|index| {
            let (y, h) = geometry::split_evenly(area.size.h, count, index);
            geometry::rect(area.loc.x, area.loc.y + y, area.size.w, h)
        })
        .collect()
}

fn grid(area: Rect, count: usize) -> Vec<Rect> {
    let cols = (count as f64).sqrt().ceil() as usize;
    let rows = count.div_ceil(cols);

    (0..count)
        .map(|index| {
            let (x, w) = geometry::split_evenly(area.size.w, cols, index % cols);
            let (y, h) = geometry::split_evenly(area.size.h, rows, index / cols);
            geometry::rect(area.loc.x + x, area.loc.y + y, w, h)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::geometry::rect;

    #[test]
    fn stack_gives_remainder_to_last_band() {
        let boxes = arrange(LayoutMode::Stack, rect(0, 0, 1000, 310), 3);
        assert_eq!(
            boxes,
            vec![rect(0, 0, 1000, 103), rect(0, 103, 1000, 103), rect(0, 206, 1000, 104)]
        );
    }

    #[test]
    fn grid_of_five_is_three_by_two() {
        let boxes = arrange(LayoutMode::Grid, rect(0, 0, 900, 600), 5);
        assert_eq!(
            boxes,
            vec![
                rect(0, 0, 300, 300),
                rect(300, 0, 300, 300),
                rect(600, 0, 300, 300),
                rect(0, 300, 300, 300),
                rect(300, 300, 300, 300),
            ]
        );
    }

    #[test]
    fn grid_remainders_go_to_last_column_and_row() {
        let boxes = arrange(LayoutMode::Grid, rect(10, 20, 1001, 701), 4);
        assert_eq!(
            boxes,
            vec![
                rect(10, 20, 500, 350),
                rect(510, 20, 501, 350),
                rect(10, 370, 500, 351),
                rect(510, 370, 501, 351),
            ]
        );
    }

    #[test]
    fn monocle_and_floating() {
        let area = rect(0, 0, 800, 600);
        assert_eq!(arrange(LayoutMode::Monocle, area, 2), vec![area, area]);
        assert!(arrange(LayoutMode::Floating, area, 2).is_empty());
        assert!(arrange(LayoutMode::Stack, area, 0).is_empty());
    }
}
