use std::{fmt, str::FromStr};

use smithay::utils::{Logical, Point, Size};

use crate::geometry::{self, Rect};

const CASCADE_STEP: i32 = 32;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlacementMode {
    /// Same as `Center`.
    #[default]
    Auto,
    Center,
    Cascade,
}

impl fmt::Display for PlacementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Center => "center",
            Self::Cascade => "cascade",
        })
    }
}

impl FromStr for PlacementMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "center" => Ok(Self::Center),
            "cascade" => Ok(Self::Cascade),
            other => Err(format!("unknown placement mode: {other}")),
        }
    }
}

/// Initial positions for new floating views.
#[derive(Clone, Debug, Default)]
pub struct Placer {
    mode: PlacementMode,
    /// Cascade offset for the next view, relative to the output origin.
    next: Point<i32, Logical>,
}

impl Placer {
    pub fn new(mode: PlacementMode) -> Self {
        Self {
            mode,
            next: Point::from((0, 0)),
        }
    }

    pub fn mode(&self) -> PlacementMode {
        self.mode
    }

    /// Location for a view of `size` on an output covering `area`, or `None`
    /// when either is empty.
    pub fn place(&mut self, size: Size<i32, Logical>, area: Rect) -> Option<Point<i32, Logical>> {
        if size.w <= 0 || size.h <= 0 || area.size.w <= 0 || area.size.h <= 0 {
            return None;
        }

        let location = match self.mode {
            PlacementMode::Cascade => self.cascade(size, area),
            PlacementMode::Auto | PlacementMode::Center => Point::from((
                area.loc.x + (area.size.w - size.w) / 2,
                area.loc.y + (area.size.h - size.h) / 2,
            )),
        };

        Some(geometry::clamp_into(Rect::new(location, size), area).loc)
    }

    fn cascade(&mut self, size: Size<i32, Logical>, area: Rect) -> Point<i32, Logical> {
        let mut location = area.loc + self.next;
        let mut next = self.next + Point::from((CASCADE_STEP, CASCADE_STEP));

        if location.x + size.w > area.loc.x + area.size.w
            || location.y + size.h > area.loc.y + area.size.h
        {
            location = area.loc;
            next = Point::from((CASCADE_STEP, CASCADE_STEP));
        }

        self.next = next;
        location
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::geometry::rect;

    #[test]
    fn center_placement() {
        let mut placer = Placer::new(PlacementMode::Auto);
        let location = placer.place((400, 300).into(), rect(1920, 0, 1280, 1024));
        assert_eq!(location, Some(Point::from((1920 + 440, 362))));
    }

    #[test]
    fn oversized_views_are_pinned_to_the_origin() {
        let mut placer = Placer::new(PlacementMode::Center);
        let location = placer.place((2000, 300).into(), rect(0, 0, 1000, 1000));
        assert_eq!(location, Some(Point::from((0, 350))));
    }

    #[test]
    fn cascade_steps_and_wraps() {
        let mut placer = Placer::new(PlacementMode::Cascade);
        let area = rect(0, 0, 200, 200);
        let size = (100, 100).into();
        let placed: Vec<_> = (0..5).filter_map(|_| placer.place(size, area)).collect();
        assert_eq!(
            placed,
            vec![
                Point::from((0, 0)),
                Point::from((32, 32)),
                Point::from((64, 64)),
                Point::from((96, 96)),
                Point::from((0, 0)),
            ]
        );
    }

    #[test]
    fn empty_sizes_are_not_placed() {
        let mut placer = Placer::new(PlacementMode::Cascade);
        assert_eq!(placer.place((0, 100).into(), rect(0, 0, 100, 100)), None);
    }
}
