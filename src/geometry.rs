//! Rectangle helpers shared by the layout engine, grabs and placement.

use smithay::utils::{Logical, Point, Rectangle, Size};

pub type Rect = Rectangle<i32, Logical>;

/// Smallest width and height a view box may be given.
pub const MIN_VIEW_SIZE: i32 = 64;

pub fn rect(x: i32, y: i32, w: i32, h: i32) -> Rect {
    Rectangle::new(Point::from((x, y)), Size::from((w, h)))
}

/// Raises width and height to [`MIN_VIEW_SIZE`].
pub fn clamp_min_size(geometry: Rect) -> Rect {
    rect(
        geometry.loc.x,
        geometry.loc.y,
        geometry.size.w.max(MIN_VIEW_SIZE),
        geometry.size.h.max(MIN_VIEW_SIZE),
    )
}

/// X11 configure requests carry 16-bit positions and unsigned 16-bit sizes.
pub fn clamp_legacy(geometry: Rect) -> Rect {
    rect(
        geometry.loc.x.clamp(i16::MIN as i32, i16::MAX as i32),
        geometry.loc.y.clamp(i16::MIN as i32, i16::MAX as i32),
        geometry.size.w.clamp(0, u16::MAX as i32),
        geometry.size.h.clamp(0, u16::MAX as i32),
    )
}

pub fn center(geometry: Rect) -> Point<i32, Logical> {
    Point::from((
        geometry.loc.x + geometry.size.w / 2,
        geometry.loc.y + geometry.size.h / 2,
    ))
}

/// Splits `total` into `parts` slices and returns `(offset, length)` of slice `index`.
/// The integer remainder goes to the last slice.
pub fn split_evenly(total: i32, parts: usize, index: usize) -> (i32, i32) {
    let parts = parts.max(1) as i32;
    let index = index as i32;
    let base = total / parts;
    let offset = base * index;
    if index == parts - 1 {
        (offset, total - offset)
    } else {
        (offset, base)
    }
}

/// Moves `geometry` so that it lies inside `area` where possible.
/// Boxes larger than the area are pinned to its top-left corner.
pub fn clamp_into(geometry: Rect, area: Rect) -> Rect {
    let max_x = area.loc.x + area.size.w - geometry.size.w;
    let max_y = area.loc.y + area.size.h - geometry.size.h;
    rect(
        geometry.loc.x.min(max_x).max(area.loc.x),
        geometry.loc.y.min(max_y).max(area.loc.y),
        geometry.size.w,
        geometry.size.h,
    )
}

/// Smallest rectangle covering every input rectangle.
pub fn bounding_box(rects: impl IntoIterator<Item = Rect>) -> Option<Rect> {
    rects.into_iter().reduce(|acc, next| acc.merge(next))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn min_size_floor() {
        assert_eq!(clamp_min_size(rect(5, 6, 10, 10)), rect(5, 6, 64, 64));
        assert_eq!(clamp_min_size(rect(0, 0, 300, 20)), rect(0, 0, 300, 64));
    }

    #[test]
    fn remainder_goes_to_last_slice() {
        let slices: Vec<_> = (0..3).map(|i| split_evenly(310, 3, i)).collect();
        assert_eq!(slices, vec![(0, 103), (103, 103), (206, 104)]);
    }

    #[test]
    fn legacy_clamp_limits_to_x11_ranges() {
        assert_eq!(
            clamp_legacy(rect(40_000, -40_000, 70_000, -3)),
            rect(32_767, -32_768, 65_535, 0)
        );
    }

    #[test]
    fn clamp_into_keeps_box_inside_area() {
        let area = rect(0, 0, 1000, 800);
        assert_eq!(clamp_into(rect(900, 700, 200, 200), area), rect(800, 600, 200, 200));
        assert_eq!(clamp_into(rect(-50, 10, 200, 200), area), rect(0, 10, 200, 200));
        assert_eq!(clamp_into(rect(10, 10, 2000, 200), area), rect(0, 10, 2000, 200));
    }

    #[test]
    fn bounding_box_of_two_outputs() {
        let outputs = [rect(0, 0, 1920, 1080), rect(1920, 0, 1280, 1024)];
        assert_eq!(bounding_box(outputs), Some(rect(0, 0, 3200, 1080)));
        assert_eq!(bounding_box(Vec::new()), None);
    }
}
