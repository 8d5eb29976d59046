//! Interactive move/resize state machine.

use bitflags::bitflags;
use smithay::utils::{Logical, Point};

use crate::{
    geometry::{self, Rect},
    view::ViewId,
};

bitflags! {
    /// Edges taking part in a resize. Bit values follow xdg_toplevel.resize_edge.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ResizeEdge: u32 {
        const TOP = 1;
        const BOTTOM = 2;
        const LEFT = 4;
        const RIGHT = 8;
    }
}

impl ResizeEdge {
    /// Edges nearest to `cursor`, picked by the quadrant of `geometry` it falls in.
    pub fn from_quadrant(geometry: Rect, cursor: Point<f64, Logical>) -> Self {
        let center = geometry::center(geometry).to_f64();
        let horizontal = if cursor.x < center.x {
            Self::LEFT
        } else {
            Self::RIGHT
        };
        let vertical = if cursor.y < center.y {
            Self::TOP
        } else {
            Self::BOTTOM
        };
        horizontal | vertical
    }

    /// Drops contradictory bits so at most one edge per axis is active.
    fn normalized(self) -> Self {
        let mut edges = self;
        if edges.contains(Self::TOP | Self::BOTTOM) {
            edges.remove(Self::BOTTOM);
        }
        if edges.contains(Self::LEFT | Self::RIGHT) {
            edges.remove(Self::RIGHT);
        }
        edges
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Grab {
    #[default]
    Idle,
    Moving {
        view: ViewId,
        /// Cursor position relative to the view origin at grab start.
        offset: Point<f64, Logical>,
    },
    Resizing {
        view: ViewId,
        edges: ResizeEdge,
        /// Cursor position relative to the grabbed border at grab start.
        offset: Point<f64, Logical>,
        origin: Rect,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GrabUpdate {
    Move(ViewId, Point<i32, Logical>),
    Resize(ViewId, Rect),
}

impl Grab {
    pub fn begin_move(view: ViewId, geometry: Rect, cursor: Point<f64, Logical>) -> Self {
        Self::Moving {
            view,
            offset: cursor - geometry.loc.to_f64(),
        }
    }

    pub fn begin_resize(
        view: ViewId,
        geometry: Rect,
        edges: ResizeEdge,
        cursor: Point<f64, Logical>,
    ) -> Self {
        let edges = edges.normalized();
        let mut border = geometry.loc;
        if edges.contains(ResizeEdge::RIGHT) {
            border.x += geometry.size.w;
        }
        if edges.contains(ResizeEdge::BOTTOM) {
            border.y += geometry.size.h;
        }

        Self::Resizing {
            view,
            edges,
            offset: cursor - border.to_f64(),
            origin: geometry,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn view(&self) -> Option<ViewId> {
        match self {
            Self::Idle => None,
            Self::Moving { view, .. } | Self::Resizing { view, .. } => Some(*view),
        }
    }

    /// Geometry change produced by moving the cursor to `cursor`.
    pub fn motion(&self, cursor: Point<f64, Logical>) -> Option<GrabUpdate> {
        match *self {
            Self::Idle => None,
            Self::Moving { view, offset } => {
                let location = cursor - offset;
                Some(GrabUpdate::Move(
                    view,
                    Point::from((location.x as i32, location.y as i32)),
                ))
            }
            Self::Resizing {
                view,
                edges,
                offset,
                origin,
            } => {
                let border = cursor - offset;
                let border_x = border.x as i32;
                let border_y = border.y as i32;

                let mut left = origin.loc.x;
                let mut right = origin.loc.x + origin.size.w;
                let mut top = origin.loc.y;
                let mut bottom = origin.loc.y + origin.size.h;

                if edges.contains(ResizeEdge::TOP) {
                    top = border_y;
                    if top >= bottom {
                        top = bottom - 1;
                    }
                } else if edges.contains(ResizeEdge::BOTTOM) {
                    bottom = border_y;
                    if bottom <= top {
                        bottom = top + 1;
                    }
                }

                if edges.contains(ResizeEdge::LEFT) {
                    left = border_x;
                    if left >= right {
                        left = right - 1;
                    }
                } else if edges.contains(ResizeEdge::RIGHT) {
                    right = border_x;
                    if right <= left {
                        right = left + 1;
                    }
                }

                Some(GrabUpdate::Resize(
                    view,
                    geometry::rect(left, top, right - left, bottom - top),
                ))
            }
        }
    }

    /// Button release ends any grab.
    pub fn release(&mut self) {
        *self = Self::Idle;
    }

    /// Ends the grab if it holds `view`. Returns whether it did.
    pub fn cancel_for(&mut self, view: ViewId) -> bool {
        if self.view() == Some(view) {
            *self = Self::Idle;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::geometry::rect;

    fn id() -> ViewId {
        ViewId::new(7)
    }

    #[test]
    fn top_left_resize_moves_only_those_edges() {
        let origin = rect(100, 100, 200, 150);
        let start = Point::from((103.0, 98.0));
        let grab = Grab::begin_resize(id(), origin, ResizeEdge::TOP | ResizeEdge::LEFT, start);

        let update = grab.motion(Point::from((123.0, 108.0)));
        assert_eq!(update, Some(GrabUpdate::Resize(id(), rect(120, 110, 180, 140))));
    }

    #[test]
    fn bottom_right_resize_grows_from_far_corner() {
        let origin = rect(0, 0, 100, 100);
        let grab = Grab::begin_resize(
            id(),
            origin,
            ResizeEdge::BOTTOM | ResizeEdge::RIGHT,
            Point::from((100.0, 100.0)),
        );
        let update = grab.motion(Point::from((150.0, 130.0)));
        assert_eq!(update, Some(GrabUpdate::Resize(id(), rect(0, 0, 150, 130))));
    }

    #[test]
    fn resize_never_inverts() {
        let origin = rect(100, 100, 200, 150);
        let grab = Grab::begin_resize(id(), origin, ResizeEdge::TOP | ResizeEdge::LEFT, Point::from((100.0, 100.0)));
        let update = grab.motion(Point::from((900.0, 900.0)));
        assert_eq!(update, Some(GrabUpdate::Resize(id(), rect(299, 249, 1, 1))));
    }

    #[test]
    fn move_keeps_cursor_offset() {
        let grab = Grab::begin_move(id(), rect(50, 60, 10, 10), Point::from((55.0, 70.0)));
        assert_eq!(
            grab.motion(Point::from((105.0, 80.0))),
            Some(GrabUpdate::Move(id(), Point::from((100, 70))))
        );
    }

    #[test]
    fn release_and_cancel_return_to_idle() {
        let mut grab = Grab::begin_move(id(), rect(0, 0, 10, 10), Point::from((0.0, 0.0)));
        assert!(!grab.cancel_for(ViewId::new(8)));
        assert_eq!(grab.view(), Some(id()));
        assert!(grab.cancel_for(id()));
        assert!(grab.is_idle());

        let mut grab = Grab::begin_resize(id(), rect(0, 0, 10, 10), ResizeEdge::LEFT, Point::from((0.0, 0.0)));
        grab.release();
        assert_eq!(grab, Grab::Idle);
        assert_eq!(grab.motion(Point::from((5.0, 5.0))), None);
    }

    #[test]
    fn quadrant_picks_nearest_edges() {
        let geometry = rect(0, 0, 100, 100);
        assert_eq!(
            ResizeEdge::from_quadrant(geometry, Point::from((10.0, 90.0))),
            ResizeEdge::LEFT | ResizeEdge::BOTTOM
        );
        assert_eq!(
            ResizeEdge::from_quadrant(geometry, Point::from((60.0, 40.0))),
            ResizeEdge::RIGHT | ResizeEdge::TOP
        );
    }
}
