//! Window management core: views, focus, grabs, workspaces and layout.
//!
//! `Desktop` knows nothing about Wayland. The compositor drives it from
//! protocol handlers and input events and mirrors the resulting scene state
//! into the smithay `Space`.

use smithay::utils::{Logical, Point};

use crate::{
    geometry::{self, Rect},
    grab::{Grab, GrabUpdate, ResizeEdge},
    layout,
    placement::{PlacementMode, Placer},
    rules::{self, WindowRule},
    view::{View, ViewId, ViewKind, ViewSurface},
    views::ViewCollection,
    workspace::{LayoutMode, WORKSPACE_COUNT, WorkspaceState},
};

#[derive(Clone, Debug)]
pub struct DesktopConfig {
    pub workspace_count: usize,
    pub layout_mode: LayoutMode,
    pub placement: PlacementMode,
    pub window_rules: Vec<WindowRule>,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            workspace_count: WORKSPACE_COUNT,
            layout_mode: LayoutMode::Floating,
            placement: PlacementMode::Auto,
            window_rules: Vec::new(),
        }
    }
}

/// A named output and its box in layout coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputArea {
    pub name: String,
    pub geometry: Rect,
}

/// What the client asked for before its first map.
#[derive(Clone, Debug, Default)]
pub struct MapRequest {
    pub title: String,
    pub app_id: String,
    pub fullscreen: bool,
    pub maximized: bool,
    /// Output named in a fullscreen request.
    pub output: Option<String>,
}

#[derive(Debug)]
pub struct Desktop<S> {
    views: ViewCollection<S>,
    /// Views whose surface exists but is not mapped.
    unmapped: Vec<View<S>>,
    workspaces: WorkspaceState,
    grab: Grab,
    focused: Option<ViewId>,
    outputs: Vec<OutputArea>,
    placer: Placer,
    rules: Vec<WindowRule>,
    next_id: u64,
}

impl<S: ViewSurface> Desktop<S> {
    pub fn new(config: DesktopConfig) -> Self {
        Self {
            views: ViewCollection::default(),
            unmapped: Vec::new(),
            workspaces: WorkspaceState::new(config.workspace_count, config.layout_mode),
            grab: Grab::Idle,
            focused: None,
            outputs: Vec::new(),
            placer: Placer::new(config.placement),
            rules: config.window_rules,
            next_id: 1,
        }
    }

    pub fn views(&self) -> &ViewCollection<S> {
        &self.views
    }

    pub fn workspaces(&self) -> &WorkspaceState {
        &self.workspaces
    }

    pub fn current_workspace(&self) -> usize {
        self.workspaces.current()
    }

    pub fn grab(&self) -> &Grab {
        &self.grab
    }

    pub fn focused(&self) -> Option<ViewId> {
        self.focused
    }

    pub fn focused_view(&self) -> Option<&View<S>> {
        self.focused.and_then(|id| self.views.get(id))
    }

    pub fn outputs(&self) -> &[OutputArea] {
        &self.outputs
    }

    pub fn view(&self, id: ViewId) -> Option<&View<S>> {
        self.views
            .get(id)
            .or_else(|| self.unmapped.iter().find(|view| view.id() == id))
    }

    pub fn view_mut(&mut self, id: ViewId) -> Option<&mut View<S>> {
        if self.views.contains(id) {
            return self.views.get_mut(id);
        }
        self.unmapped.iter_mut().find(|view| view.id() == id)
    }

    pub fn find_view(&self, surface: &S) -> Option<ViewId> {
        self.views
            .find_by_surface(surface)
            .or_else(|| self.unmapped.iter().find(|view| view.raw_surface() == surface))
            .map(View::id)
    }

    /// Every view, live ones first in collection order.
    pub fn all_views(&self) -> impl Iterator<Item = &View<S>> {
        self.views.iter().chain(self.unmapped.iter())
    }

    // Lifecycle

    /// Registers a new toplevel. It stays out of the collection until mapped.
    pub fn create_view(&mut self, kind: ViewKind, surface: S) -> ViewId {
        let id = ViewId::new(self.next_id);
        self.next_id += 1;
        self.unmapped
            .push(View::new(id, kind, surface, self.workspaces.current()));
        tracing::debug!(view = %id, ?kind, "view created");
        id
    }

    pub fn map_view(&mut self, id: ViewId, request: MapRequest) -> bool {
        let Some(index) = self.unmapped.iter().position(|view| view.id() == id) else {
            return false;
        };
        let mut view = self.unmapped.remove(index);
        let workspace_count = self.workspaces.count();

        view.mapped = true;
        view.title = request.title;
        view.app_id = request.app_id;
        if let Some(rule) = rules::first_match(&self.rules, &view.app_id, &view.title) {
            if let Some(workspace) = rule.workspace_in(workspace_count) {
                view.workspace = workspace;
            }
            if let Some(floating) = rule.floating {
                view.force_floating = floating;
            }
            tracing::debug!(view = %id, ?rule, "window rule applied");
        }

        let enabled = view.workspace == self.workspaces.current();
        view.set_enabled(enabled);
        tracing::info!(
            view = %id,
            app_id = %view.app_id,
            title = %view.title,
            workspace = view.workspace,
            floating = view.force_floating,
            "view mapped"
        );
        self.views.insert_front(view);

        if request.fullscreen {
            self.apply_fullscreen(id, true, request.output.as_deref());
        } else if request.maximized {
            self.apply_maximized(id, true);
        } else {
            self.place_if_needed(id);
        }

        self.focus(id);
        self.arrange();
        true
    }

    pub fn unmap_view(&mut self, id: ViewId) -> bool {
        if self.grab.cancel_for(id) {
            tracing::debug!(view = %id, "grab cancelled by unmap");
        }
        let Some(mut view) = self.views.remove(id) else {
            return false;
        };
        view.mapped = false;
        view.set_enabled(false);
        self.unmapped.push(view);
        tracing::info!(view = %id, "view unmapped");

        if self.focused == Some(id) {
            self.focused = None;
            if let Some(next) = self
                .views
                .next_in_workspace(self.workspaces.current(), None)
            {
                self.focus(next);
            }
        }
        self.arrange();
        true
    }

    /// Drops the view entirely, unmapping it first if needed.
    pub fn destroy_view(&mut self, id: ViewId) -> Option<View<S>> {
        self.unmap_view(id);
        let index = self.unmapped.iter().position(|view| view.id() == id)?;
        tracing::debug!(view = %id, "view destroyed");
        Some(self.unmapped.remove(index))
    }

    /// A legacy surface got its wl_surface.
    pub fn associate(&mut self, id: ViewId, geometry: Rect) {
        if let Some(view) = self.view_mut(id) {
            view.associate(geometry);
        }
    }

    pub fn dissociate(&mut self, id: ViewId) {
        self.unmap_view(id);
        if let Some(view) = self.view_mut(id) {
            view.dissociate();
        }
    }

    /// The client committed a new size. Initial placement happens on the
    /// first commit that carries a size.
    pub fn commit(&mut self, id: ViewId, width: i32, height: i32) {
        let Some(view) = self.view_mut(id) else {
            return;
        };
        view.commit_size(width, height);
        if view.mapped {
            self.place_if_needed(id);
        }
    }

    pub fn set_title(&mut self, id: ViewId, title: String) {
        if let Some(view) = self.view_mut(id) {
            view.title = title;
        }
    }

    pub fn set_app_id(&mut self, id: ViewId, app_id: String) {
        if let Some(view) = self.view_mut(id) {
            view.app_id = app_id;
        }
    }

    // Focus

    /// Moves focus to `id`. Returns `false` when nothing changed.
    pub fn focus(&mut self, id: ViewId) -> bool {
        if self.focused == Some(id) {
            return false;
        }
        let current = self.workspaces.current();
        if !self
            .views
            .get(id)
            .is_some_and(|view| view.workspace == current)
        {
            return false;
        }

        self.deactivate_focused();
        self.views.raise(id);
        if let Some(surface) = self.views.get(id).and_then(View::surface) {
            surface.set_activated(true);
        }
        self.focused = Some(id);
        tracing::debug!(view = %id, "focus changed");
        true
    }

    pub fn clear_focus(&mut self) {
        self.deactivate_focused();
        self.focused = None;
    }

    fn deactivate_focused(&mut self) {
        if let Some(previous) = self.focused.and_then(|id| self.views.get(id))
            && let Some(surface) = previous.surface()
        {
            surface.set_activated(false);
        }
    }

    pub fn next_in_workspace(&self) -> Option<ViewId> {
        self.views
            .next_in_workspace(self.workspaces.current(), self.focused)
    }

    pub fn prev_in_workspace(&self) -> Option<ViewId> {
        self.views
            .prev_in_workspace(self.workspaces.current(), self.focused)
    }

    pub fn focus_next(&mut self) -> bool {
        self.next_in_workspace().is_some_and(|id| self.focus(id))
    }

    pub fn focus_prev(&mut self) -> bool {
        self.prev_in_workspace().is_some_and(|id| self.focus(id))
    }

    pub fn close_focused(&self) {
        if let Some(surface) = self.focused_view().and_then(View::surface) {
            surface.close();
        }
    }

    pub fn close(&self, id: ViewId) {
        if let Some(surface) = self.view(id).and_then(View::surface) {
            surface.close();
        }
    }

    // Workspaces and layout

    pub fn switch_workspace(&mut self, workspace: usize) -> bool {
        if !self.workspaces.switch_to(workspace) {
            tracing::debug!(workspace, "ignoring switch to unknown workspace");
            return false;
        }

        for view in self.views.iter_mut() {
            let enabled = view.mapped && view.workspace == workspace;
            view.set_enabled(enabled);
        }

        match self.views.next_in_workspace(workspace, None) {
            Some(id) => {
                self.focus(id);
            }
            None => self.clear_focus(),
        }

        tracing::info!(workspace, layout = %self.workspaces.mode(), "switched workspace");
        self.arrange();
        true
    }

    pub fn move_focused_to_workspace(&mut self, workspace: usize) -> bool {
        if !self.workspaces.contains(workspace) {
            return false;
        }
        let current = self.workspaces.current();
        let Some(view) = self.focused.and_then(|id| self.views.get_mut(id)) else {
            return false;
        };

        view.workspace = workspace;
        let enabled = view.mapped && workspace == current;
        view.set_enabled(enabled);
        tracing::info!(view = %view.id(), workspace, "moved view to workspace");
        self.arrange();
        true
    }

    pub fn set_layout_mode(&mut self, mode: LayoutMode) {
        self.workspaces.set_mode(mode);
        tracing::info!(workspace = self.workspaces.current(), layout = %mode, "layout mode set");
        self.arrange();
    }

    pub fn cycle_layout_mode(&mut self) {
        self.set_layout_mode(self.workspaces.mode().cycle());
    }

    /// Re-tiles the current workspace on the center output.
    pub fn arrange(&mut self) {
        let mode = self.workspaces.mode();
        if mode == LayoutMode::Floating {
            return;
        }
        let Some(area) = self.center_output().map(|output| output.geometry) else {
            return;
        };
        if area.size.w <= 0 || area.size.h <= 0 {
            tracing::debug!(?area, "skipping arrange on an empty output");
            return;
        }

        let current = self.workspaces.current();
        let candidates: Vec<ViewId> = self
            .views
            .iter()
            .filter(|view| view.workspace == current && view.is_tileable_candidate())
            .map(View::id)
            .collect();

        let boxes = layout::arrange(mode, area, candidates.len());
        for (id, geometry) in candidates.into_iter().zip(boxes) {
            if let Some(view) = self.views.get_mut(id) {
                view.set_box(geometry);
            }
        }
    }

    // Maximize and fullscreen

    pub fn apply_maximized(&mut self, id: ViewId, maximized: bool) {
        let target = self.target_output(id, None).map(|output| output.geometry);
        let Some(view) = self.view_mut(id) else {
            return;
        };

        if maximized {
            if !view.maximized && !view.fullscreen {
                view.save_geometry();
            }
            if let Some(area) = target {
                view.set_box(area);
            }
        }

        view.maximized = maximized;
        view.raw_surface().set_maximized(maximized);

        if !maximized && !view.fullscreen {
            view.restore_saved_geometry();
        }
        self.arrange();
    }

    pub fn apply_fullscreen(&mut self, id: ViewId, fullscreen: bool, output: Option<&str>) {
        let target = self.target_output(id, output).map(|output| output.geometry);
        let Some(view) = self.view_mut(id) else {
            return;
        };

        if fullscreen {
            if !view.maximized && !view.fullscreen {
                view.save_geometry();
            }
            if let Some(area) = target {
                view.set_box(area);
            }
        }

        view.fullscreen = fullscreen;
        view.raw_surface().set_fullscreen(fullscreen);

        if !fullscreen && !view.maximized {
            view.restore_saved_geometry();
        }
        self.arrange();
    }

    // Keyboard driven geometry

    pub fn move_focused_by(&mut self, dx: i32, dy: i32) {
        let Some(view) = self.focused.and_then(|id| self.views.get_mut(id)) else {
            return;
        };
        if view.is_resize_blocked() {
            return;
        }
        let Ok(mut geometry) = view.get_box() else {
            return;
        };
        geometry.loc += Point::from((dx, dy));
        view.set_box(geometry);
    }

    pub fn resize_focused_by(&mut self, dw: i32, dh: i32, from_left: bool, from_top: bool) {
        let Some(view) = self.focused.and_then(|id| self.views.get_mut(id)) else {
            return;
        };
        if view.is_resize_blocked() {
            return;
        }
        let Ok(mut geometry) = view.get_box() else {
            return;
        };

        if from_left {
            geometry.loc.x += dw;
            geometry.size.w -= dw;
        } else {
            geometry.size.w += dw;
        }
        if from_top {
            geometry.loc.y += dh;
            geometry.size.h -= dh;
        } else {
            geometry.size.h += dh;
        }
        view.set_box(geometry);
    }

    // Interactive grabs

    pub fn begin_move(&mut self, id: ViewId, cursor: Point<f64, Logical>) -> bool {
        let Some(geometry) = self.grabbable_box(id) else {
            return false;
        };
        self.grab = Grab::begin_move(id, geometry, cursor);
        tracing::debug!(view = %id, "move grab started");
        true
    }

    /// Starts a resize. Without explicit edges they follow the cursor quadrant.
    pub fn begin_resize(
        &mut self,
        id: ViewId,
        edges: Option<ResizeEdge>,
        cursor: Point<f64, Logical>,
    ) -> bool {
        let Some(geometry) = self.grabbable_box(id) else {
            return false;
        };
        let edges = edges.unwrap_or_else(|| ResizeEdge::from_quadrant(geometry, cursor));
        if edges.is_empty() {
            return false;
        }
        self.grab = Grab::begin_resize(id, geometry, edges, cursor);
        tracing::debug!(view = %id, ?edges, "resize grab started");
        true
    }

    fn grabbable_box(&self, id: ViewId) -> Option<Rect> {
        self.views
            .get(id)
            .filter(|view| view.mapped)
            .and_then(|view| view.get_box().ok())
    }

    /// Feeds a cursor position to the active grab. Returns `true` if the
    /// motion was consumed.
    pub fn pointer_motion(&mut self, cursor: Point<f64, Logical>) -> bool {
        let Some(update) = self.grab.motion(cursor) else {
            return false;
        };
        match update {
            GrabUpdate::Move(id, location) => {
                if let Some(view) = self.views.get_mut(id) {
                    view.set_position(location);
                }
            }
            GrabUpdate::Resize(id, geometry) => {
                if let Some(view) = self.views.get_mut(id) {
                    view.set_box(geometry);
                }
            }
        }
        true
    }

    pub fn release_grab(&mut self) {
        if !self.grab.is_idle() {
            tracing::debug!(view = ?self.grab.view(), "grab released");
        }
        self.grab.release();
    }

    // Outputs and placement

    pub fn set_output(&mut self, name: &str, geometry: Rect) {
        match self.outputs.iter_mut().find(|output| output.name == name) {
            Some(output) => output.geometry = geometry,
            None => self.outputs.push(OutputArea {
                name: name.to_owned(),
                geometry,
            }),
        }
        self.arrange();
    }

    pub fn remove_output(&mut self, name: &str) {
        self.outputs.retain(|output| output.name != name);
        self.arrange();
    }

    /// Output containing the center of the whole layout, else the first one.
    pub fn center_output(&self) -> Option<&OutputArea> {
        let bounds = geometry::bounding_box(self.outputs.iter().map(|output| output.geometry))?;
        let center = geometry::center(bounds);
        self.outputs
            .iter()
            .find(|output| output.geometry.contains(center))
            .or_else(|| self.outputs.first())
    }

    /// Requested output if known, else the one under the view center, else the center output.
    pub fn target_output(&self, id: ViewId, requested: Option<&str>) -> Option<&OutputArea> {
        if let Some(name) = requested
            && let Some(output) = self.outputs.iter().find(|output| output.name == name)
        {
            return Some(output);
        }

        self.view(id)
            .and_then(|view| view.get_box().ok())
            .map(geometry::center)
            .and_then(|center| {
                self.outputs
                    .iter()
                    .find(|output| output.geometry.contains(center))
            })
            .or_else(|| self.center_output())
    }

    fn place_if_needed(&mut self, id: ViewId) {
        let area = self.target_output(id, None).map(|output| output.geometry);
        let placer = &mut self.placer;
        let Some(view) = self.views.get_mut(id) else {
            return;
        };
        if view.placed || view.fullscreen || view.maximized {
            return;
        }
        let (Some(area), Ok(geometry)) = (area, view.get_box()) else {
            return;
        };
        if let Some(location) = placer.place(geometry.size, area) {
            view.set_position(location);
            view.placed = true;
            tracing::debug!(view = %id, ?location, mode = %placer.mode(), "view placed");
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::{
        geometry::rect,
        rules::parse_rules,
        view::testing::{Request, TestSurface},
    };

    fn desktop(layout_mode: LayoutMode) -> Desktop<TestSurface> {
        let mut desktop = Desktop::new(DesktopConfig {
            layout_mode,
            ..DesktopConfig::default()
        });
        desktop.set_output("DP-1", rect(0, 0, 1000, 800));
        desktop
    }

    fn map(desktop: &mut Desktop<TestSurface>, name: &'static str) -> ViewId {
        let id = desktop.create_view(ViewKind::Native, TestSurface::named(name));
        desktop.commit(id, 300, 200);
        desktop.map_view(
            id,
            MapRequest {
                app_id: name.to_owned(),
                ..MapRequest::default()
            },
        );
        id
    }

    fn boxes(desktop: &Desktop<TestSurface>) -> Vec<(ViewId, Rect)> {
        desktop
            .views()
            .iter()
            .map(|view| (view.id(), view.get_box().unwrap()))
            .collect()
    }

    #[test]
    fn map_places_focuses_and_inserts_at_front() {
        let mut desktop = desktop(LayoutMode::Floating);
        let a = map(&mut desktop, "a");
        let b = map(&mut desktop, "b");

        assert_eq!(desktop.focused(), Some(b));
        let order: Vec<_> = desktop.views().iter().map(View::id).collect();
        assert_eq!(order, vec![b, a]);

        let view = desktop.view(a).unwrap();
        assert!(view.placed);
        assert!(view.is_enabled());
        assert_eq!(view.get_box().unwrap(), rect(350, 300, 300, 200));
        assert!(!view.raw_surface().is_activated());
        assert!(desktop.view(b).unwrap().raw_surface().is_activated());
    }

    #[test]
    fn window_rule_assigns_workspace_and_floating() {
        let mut desktop = Desktop::new(DesktopConfig {
            window_rules: parse_rules("app_id=foo,workspace=3,floating=true"),
            ..DesktopConfig::default()
        });
        desktop.set_output("DP-1", rect(0, 0, 1000, 800));
        let id = map(&mut desktop, "foo");

        let view = desktop.view(id).unwrap();
        assert_eq!(view.workspace, 3);
        assert!(view.force_floating);
        assert!(!view.is_enabled());
        // Not on the current workspace, so it cannot take focus.
        assert_eq!(desktop.focused(), None);
    }

    #[test]
    fn switch_workspace_toggles_visibility() {
        let mut desktop = desktop(LayoutMode::Floating);
        let a = map(&mut desktop, "a");
        let b = map(&mut desktop, "b");
        desktop.move_focused_to_workspace(5);
        let c = map(&mut desktop, "c");
        desktop.move_focused_to_workspace(5);

        assert!(desktop.switch_workspace(5));
        assert_eq!(desktop.current_workspace(), 5);
        for view in desktop.views().iter() {
            assert_eq!(view.is_enabled(), view.workspace == 5 && view.mapped, "{}", view.id());
        }
        assert!(!desktop.view(a).unwrap().is_enabled());
        assert!(desktop.view(b).unwrap().is_enabled());
        assert!(desktop.view(c).unwrap().is_enabled());
        assert_eq!(desktop.focused(), Some(c));

        assert!(desktop.switch_workspace(7));
        assert_eq!(desktop.focused(), None);
        assert!(!desktop.switch_workspace(10));
        assert_eq!(desktop.current_workspace(), 7);
    }

    #[test]
    fn stack_arrangement_is_idempotent() {
        let mut desktop = desktop(LayoutMode::Stack);
        for name in ["a", "b", "c"] {
            map(&mut desktop, name);
        }
        let first = boxes(&desktop);
        desktop.arrange();
        assert_eq!(boxes(&desktop), first);

        let heights: Vec<_> = first.iter().map(|(_, geometry)| geometry.size.h).collect();
        assert_eq!(heights, vec![266, 266, 268]);
    }

    #[test]
    fn arrange_skips_floating_and_maximized_views() {
        let mut desktop = desktop(LayoutMode::Floating);
        let a = map(&mut desktop, "a");
        let b = map(&mut desktop, "b");
        desktop.view_mut(b).unwrap().force_floating = true;
        let floating_box = desktop.view(b).unwrap().get_box().unwrap();

        desktop.set_layout_mode(LayoutMode::Monocle);
        assert_eq!(desktop.view(a).unwrap().get_box().unwrap(), rect(0, 0, 1000, 800));
        assert_eq!(desktop.view(b).unwrap().get_box().unwrap(), floating_box);
        assert_eq!(desktop.workspaces().mode(), LayoutMode::Monocle);

        desktop.cycle_layout_mode();
        assert_eq!(desktop.workspaces().mode(), LayoutMode::Floating);
    }

    #[test]
    fn maximize_round_trip_restores_box() {
        let mut desktop = desktop(LayoutMode::Floating);
        let id = map(&mut desktop, "a");
        let before = desktop.view(id).unwrap().get_box().unwrap();

        desktop.apply_maximized(id, true);
        let view = desktop.view(id).unwrap();
        assert!(view.maximized);
        assert_eq!(view.get_box().unwrap(), rect(0, 0, 1000, 800));

        desktop.apply_maximized(id, false);
        let view = desktop.view(id).unwrap();
        assert_eq!(view.get_box().unwrap(), before);
        assert_eq!(view.saved_geometry(), None);
    }

    #[test]
    fn overlapping_fullscreen_keeps_original_snapshot() {
        let mut desktop = desktop(LayoutMode::Floating);
        desktop.set_output("HDMI-A-1", rect(1000, 0, 1920, 1080));
        let id = map(&mut desktop, "a");
        let before = desktop.view(id).unwrap().get_box().unwrap();

        desktop.apply_maximized(id, true);
        desktop.apply_fullscreen(id, true, Some("HDMI-A-1"));
        assert_eq!(
            desktop.view(id).unwrap().get_box().unwrap(),
            rect(1000, 0, 1920, 1080)
        );

        // Still fullscreen: nothing restored yet.
        desktop.apply_maximized(id, false);
        assert_eq!(
            desktop.view(id).unwrap().get_box().unwrap(),
            rect(1000, 0, 1920, 1080)
        );

        desktop.apply_fullscreen(id, false, None);
        assert_eq!(desktop.view(id).unwrap().get_box().unwrap(), before);
    }

    #[test]
    fn resize_grab_via_desktop() {
        let mut desktop = desktop(LayoutMode::Floating);
        let id = map(&mut desktop, "a");
        desktop.view_mut(id).unwrap().set_box(rect(100, 100, 200, 150));

        assert!(desktop.begin_resize(id, Some(ResizeEdge::TOP | ResizeEdge::LEFT), Point::from((100.0, 100.0))));
        assert!(desktop.pointer_motion(Point::from((120.0, 110.0))));
        assert_eq!(desktop.view(id).unwrap().get_box().unwrap(), rect(120, 110, 180, 140));

        desktop.release_grab();
        assert!(desktop.grab().is_idle());
        assert!(!desktop.pointer_motion(Point::from((0.0, 0.0))));
    }

    #[test]
    fn unmap_cancels_grab_and_refocuses() {
        let mut desktop = desktop(LayoutMode::Floating);
        let a = map(&mut desktop, "a");
        let b = map(&mut desktop, "b");
        assert!(desktop.begin_move(b, Point::from((10.0, 10.0))));

        desktop.unmap_view(b);
        assert!(desktop.grab().is_idle());
        assert_eq!(desktop.focused(), Some(a));
        assert!(desktop.views().get(b).is_none());
        assert!(desktop.view(b).is_some());

        assert!(!desktop.begin_move(b, Point::from((0.0, 0.0))));
        assert!(desktop.destroy_view(b).is_some());
        assert!(desktop.view(b).is_none());
    }

    #[test]
    fn keyboard_nudges_respect_resize_block() {
        let mut desktop = desktop(LayoutMode::Floating);
        let id = map(&mut desktop, "a");
        desktop.view_mut(id).unwrap().set_box(rect(100, 100, 200, 150));

        desktop.move_focused_by(-32, 0);
        desktop.resize_focused_by(-32, 0, true, false);
        desktop.resize_focused_by(0, 32, false, false);
        assert_eq!(desktop.view(id).unwrap().get_box().unwrap(), rect(36, 100, 232, 182));

        desktop.apply_fullscreen(id, true, None);
        let fullscreen = desktop.view(id).unwrap().get_box().unwrap();
        desktop.move_focused_by(32, 32);
        assert_eq!(desktop.view(id).unwrap().get_box().unwrap(), fullscreen);
    }

    #[test]
    fn focus_ignores_hidden_views() {
        let mut desktop = desktop(LayoutMode::Floating);
        let a = map(&mut desktop, "a");
        let b = map(&mut desktop, "b");
        desktop.view_mut(a).unwrap().workspace = 2;

        assert!(!desktop.focus(a));
        assert!(!desktop.focus(b));
        assert_eq!(desktop.focused(), Some(b));

        desktop.view(b).unwrap().raw_surface().take_requests();
        desktop.close_focused();
        assert_eq!(
            desktop.view(b).unwrap().raw_surface().take_requests(),
            vec![Request::Close]
        );
    }

    #[test]
    fn focus_cycles_within_workspace() {
        let mut desktop = desktop(LayoutMode::Floating);
        let a = map(&mut desktop, "a");
        let b = map(&mut desktop, "b");
        let c = map(&mut desktop, "c");
        // Collection order is [c, b, a] with c focused.
        assert!(desktop.focus_next());
        assert_eq!(desktop.focused(), Some(b));
        // Focusing raised b: [b, c, a].
        assert!(desktop.focus_prev());
        assert_eq!(desktop.focused(), Some(a));
        assert!(desktop.focus(c));
    }

    #[test]
    fn legacy_view_needs_association() {
        let mut desktop = desktop(LayoutMode::Stack);
        let id = desktop.create_view(ViewKind::Legacy, TestSurface::named("x"));
        assert!(desktop.view(id).unwrap().get_box().is_err());

        desktop.associate(id, rect(10, 10, 400, 300));
        desktop.map_view(id, MapRequest::default());
        assert_eq!(desktop.view(id).unwrap().get_box().unwrap(), rect(0, 0, 1000, 800));

        desktop.dissociate(id);
        assert!(desktop.views().is_empty());
        assert!(desktop.view(id).unwrap().get_box().is_err());
    }

    #[test]
    fn arrange_leaves_boxes_alone_on_an_empty_output() {
        let mut desktop = desktop(LayoutMode::Floating);
        let a = map(&mut desktop, "a");
        let b = map(&mut desktop, "b");
        let before = boxes(&desktop);

        desktop.set_output("DP-1", rect(0, 0, 0, 0));
        desktop.set_layout_mode(LayoutMode::Stack);
        assert_eq!(boxes(&desktop), before);

        desktop.set_output("DP-1", rect(0, 0, 1000, 800));
        desktop.arrange();
        assert_eq!(desktop.view(b).unwrap().get_box().unwrap().size.w, 1000);
        assert_ne!(boxes(&desktop), before);
        assert!(desktop.view(a).unwrap().get_box().unwrap().size.h > 0);
    }

    #[test]
    fn activation_does_not_cross_workspaces() {
        let mut desktop = desktop(LayoutMode::Floating);
        let a = map(&mut desktop, "a");
        let b = map(&mut desktop, "b");
        assert!(desktop.move_focused_to_workspace(3));
        assert_eq!(desktop.view(b).unwrap().workspace, 3);
        assert!(desktop.focus(a));

        assert!(!desktop.focus(b));
        assert_eq!(desktop.current_workspace(), 1);
        assert_eq!(desktop.focused(), Some(a));
        assert!(!desktop.view(b).unwrap().is_enabled());
    }

    #[test]
    fn center_output_is_under_layout_center() {
        let mut desktop: Desktop<TestSurface> = Desktop::new(DesktopConfig::default());
        assert!(desktop.center_output().is_none());
        desktop.set_output("left", rect(0, 0, 1000, 800));
        desktop.set_output("middle", rect(1000, 0, 1000, 800));
        desktop.set_output("right", rect(2000, 0, 1000, 800));
        assert_eq!(desktop.center_output().unwrap().name, "middle");

        desktop.remove_output("middle");
        assert_eq!(desktop.center_output().unwrap().name, "left");
    }
}
