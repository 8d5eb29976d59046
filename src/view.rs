//! Views: one top-level application window, native or legacy (X11).

use std::fmt;

use smithay::utils::{Logical, Point};

use crate::geometry::{self, Rect};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

impl ViewId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewKind {
    /// xdg-shell toplevel.
    Native,
    /// Xwayland surface.
    Legacy,
}

/// The client-facing half of a view.
///
/// Implemented for `smithay::desktop::Window` by the compositor and by a
/// recording surface in tests. All calls are requests: the client answers
/// asynchronously, if at all.
pub trait ViewSurface: Clone + PartialEq + fmt::Debug {
    /// Ask the client to take on `geometry`. Native clients only look at the size.
    fn configure(&self, geometry: Rect);

    /// Position changed without a size change.
    fn relocate(&self, _geometry: Rect) {}

    fn set_activated(&self, activated: bool);

    fn set_fullscreen(&self, fullscreen: bool);

    fn set_maximized(&self, maximized: bool);

    fn close(&self);
}

/// Visual representation of a mapped view: its box in layout coordinates
/// and whether it is currently shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneNode {
    pub geometry: Rect,
    pub enabled: bool,
}

#[derive(Debug)]
pub struct View<S> {
    id: ViewId,
    kind: ViewKind,
    surface: S,
    scene: Option<SceneNode>,
    saved: Option<Rect>,
    pub workspace: usize,
    pub mapped: bool,
    pub force_floating: bool,
    pub fullscreen: bool,
    pub maximized: bool,
    /// Set once initial placement ran.
    pub placed: bool,
    pub title: String,
    pub app_id: String,
}

impl<S: ViewSurface> View<S> {
    pub fn new(id: ViewId, kind: ViewKind, surface: S, workspace: usize) -> Self {
        // Native toplevels get their scene node right away, legacy ones on association.
        let scene = match kind {
            ViewKind::Native => Some(SceneNode {
                geometry: geometry::rect(0, 0, 0, 0),
                enabled: false,
            }),
            ViewKind::Legacy => None,
        };

        Self {
            id,
            kind,
            surface,
            scene,
            saved: None,
            workspace,
            mapped: false,
            force_floating: false,
            fullscreen: false,
            maximized: false,
            placed: false,
            title: String::new(),
            app_id: String::new(),
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    /// The underlying surface, or `None` while a legacy surface is not associated.
    pub fn surface(&self) -> Option<&S> {
        self.scene.map(|_| &self.surface)
    }

    /// Backing surface regardless of association state.
    pub fn raw_surface(&self) -> &S {
        &self.surface
    }

    pub fn scene(&self) -> Option<&SceneNode> {
        self.scene.as_ref()
    }

    pub fn get_box(&self) -> crate::Result<Rect> {
        self.scene
            .map(|node| node.geometry)
            .ok_or(crate::CompositorError::NoGeometry(self.id))
    }

    /// Applies `geometry` (floored to the minimum size) and asks the client to
    /// resize. Returns `false` without a scene node.
    pub fn set_box(&mut self, geometry: Rect) -> bool {
        let mut geometry = geometry::clamp_min_size(geometry);
        if self.kind == ViewKind::Legacy {
            geometry = geometry::clamp_legacy(geometry);
        }

        let Some(node) = self.scene.as_mut() else {
            return false;
        };
        node.geometry = geometry;
        self.surface.configure(geometry);
        true
    }

    /// Moves the scene node without touching the size.
    pub fn set_position(&mut self, location: Point<i32, Logical>) -> bool {
        let Some(node) = self.scene.as_mut() else {
            return false;
        };
        node.geometry.loc = location;
        self.surface.relocate(node.geometry);
        true
    }

    /// Records the size the client actually committed.
    pub fn commit_size(&mut self, width: i32, height: i32) {
        if let Some(node) = self.scene.as_mut() {
            node.geometry.size = (width, height).into();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.scene.is_some_and(|node| node.enabled)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if let Some(node) = self.scene.as_mut() {
            node.enabled = enabled;
        }
    }

    pub fn is_tileable_candidate(&self) -> bool {
        self.scene.is_some()
            && self.mapped
            && !self.force_floating
            && !self.fullscreen
            && !self.maximized
    }

    pub fn is_resize_blocked(&self) -> bool {
        self.fullscreen || self.maximized
    }

    /// Legacy surfaces get their scene node once the X11 window is paired with a wl_surface.
    pub fn associate(&mut self, geometry: Rect) {
        self.scene = Some(SceneNode {
            geometry,
            enabled: false,
        });
    }

    pub fn dissociate(&mut self) {
        self.scene = None;
    }

    /// Takes a snapshot unless one is already held.
    pub fn save_geometry(&mut self) {
        if self.saved.is_none() {
            self.saved = self.scene.map(|node| node.geometry);
        }
    }

    pub fn take_saved_geometry(&mut self) -> Option<Rect> {
        self.saved.take()
    }

    pub fn saved_geometry(&self) -> Option<Rect> {
        self.saved
    }

    /// Puts the snapshot back exactly as taken and clears it.
    pub fn restore_saved_geometry(&mut self) -> bool {
        let Some(saved) = self.saved else {
            return false;
        };
        let Some(node) = self.scene.as_mut() else {
            return false;
        };
        node.geometry = saved;
        self.saved = None;
        self.surface.configure(saved);
        true
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Request {
        Configure(Rect),
        Relocate(Rect),
        Activated(bool),
        Fullscreen(bool),
        Maximized(bool),
        Close,
    }

    /// Records every request sent to the "client".
    #[derive(Clone, Debug, Default)]
    pub struct TestSurface {
        pub name: &'static str,
        pub requests: Rc<RefCell<Vec<Request>>>,
    }

    impl PartialEq for TestSurface {
        fn eq(&self, other: &Self) -> bool {
            Rc::ptr_eq(&self.requests, &other.requests)
        }
    }

    impl TestSurface {
        pub fn named(name: &'static str) -> Self {
            Self {
                name,
                requests: Rc::default(),
            }
        }

        pub fn take_requests(&self) -> Vec<Request> {
            std::mem::take(&mut *self.requests.borrow_mut())
        }

        pub fn is_activated(&self) -> bool {
            self.requests
                .borrow()
                .iter()
                .rev()
                .find_map(|request| match request {
                    Request::Activated(activated) => Some(*activated),
                    _ => None,
                })
                .unwrap_or(false)
        }

        fn push(&self, request: Request) {
            self.requests.borrow_mut().push(request);
        }
    }

    impl ViewSurface for TestSurface {
        fn configure(&self, geometry: Rect) {
            self.push(Request::Configure(geometry));
        }

        fn relocate(&self, geometry: Rect) {
            self.push(Request::Relocate(geometry));
        }

        fn set_activated(&self, activated: bool) {
            self.push(Request::Activated(activated));
        }

        fn set_fullscreen(&self, fullscreen: bool) {
            self.push(Request::Fullscreen(fullscreen));
        }

        fn set_maximized(&self, maximized: bool) {
            self.push(Request::Maximized(maximized));
        }

        fn close(&self) {
            self.push(Request::Close);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::testing::{Request, TestSurface};
    use super::*;
    use crate::geometry::rect;

    fn native() -> View<TestSurface> {
        View::new(ViewId::new(1), ViewKind::Native, TestSurface::named("a"), 1)
    }

    #[test]
    fn set_box_floors_to_minimum() {
        let mut view = native();
        assert!(view.set_box(rect(0, 0, 10, 10)));
        assert_eq!(view.get_box().unwrap(), rect(0, 0, 64, 64));
        assert_eq!(
            view.raw_surface().take_requests(),
            vec![Request::Configure(rect(0, 0, 64, 64))]
        );
    }

    #[test]
    fn tileable_requires_mapped_and_unconstrained() {
        let mut view = native();
        assert!(!view.is_tileable_candidate());
        view.mapped = true;
        assert!(view.is_tileable_candidate());
        view.maximized = true;
        assert!(!view.is_tileable_candidate());
        assert!(view.is_resize_blocked());
        view.maximized = false;
        view.force_floating = true;
        assert!(!view.is_tileable_candidate());
        assert!(!view.is_resize_blocked());
    }

    #[test]
    fn unassociated_legacy_view_has_no_geometry() {
        let mut view = View::new(ViewId::new(2), ViewKind::Legacy, TestSurface::named("x"), 1);
        assert!(view.get_box().is_err());
        assert!(view.surface().is_none());
        assert!(!view.set_box(rect(0, 0, 100, 100)));
        assert!(view.raw_surface().take_requests().is_empty());

        view.associate(rect(10, 20, 300, 200));
        assert_eq!(view.get_box().unwrap(), rect(10, 20, 300, 200));
        assert!(view.set_box(rect(70_000, 0, 100, 100)));
        assert_eq!(view.get_box().unwrap(), rect(32_767, 0, 100, 100));

        view.dissociate();
        assert!(view.get_box().is_err());
    }

    #[test]
    fn snapshot_is_taken_only_once() {
        let mut view = native();
        view.set_box(rect(10, 10, 200, 100));
        view.save_geometry();
        view.set_box(rect(0, 0, 1920, 1080));
        view.save_geometry();
        assert_eq!(view.take_saved_geometry(), Some(rect(10, 10, 200, 100)));
        assert_eq!(view.saved_geometry(), None);
    }
}
