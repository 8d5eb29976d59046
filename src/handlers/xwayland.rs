use smithay::{
    delegate_xwayland_shell,
    desktop::Window,
    reexports::wayland_server::protocol::wl_surface::WlSurface,
    utils::{Logical, Rectangle},
    wayland::xwayland_shell::{XWaylandShellHandler, XWaylandShellState},
    xwayland::{
        X11Surface, X11Wm, XwmHandler,
        xwm::{Reorder, ResizeEdge as X11ResizeEdge, XwmId},
    },
};

use crate::{
    Kristal,
    desktop::MapRequest,
    grab::ResizeEdge,
    view::{View, ViewId, ViewKind},
    workspace::LayoutMode,
};

impl Kristal {
    fn view_for_x11(&self, window: &X11Surface) -> Option<ViewId> {
        self.desktop
            .all_views()
            .find(|view| view.raw_surface().x11_surface() == Some(window))
            .map(View::id)
    }

    fn mapped_x11_view(&self, window: &X11Surface) -> Option<ViewId> {
        self.view_for_x11(window)
            .filter(|id| self.desktop.view(*id).is_some_and(|view| view.mapped))
    }
}

fn resize_edges(edges: X11ResizeEdge) -> ResizeEdge {
    match edges {
        X11ResizeEdge::Top => ResizeEdge::TOP,
        X11ResizeEdge::Bottom => ResizeEdge::BOTTOM,
        X11ResizeEdge::Left => ResizeEdge::LEFT,
        X11ResizeEdge::Right => ResizeEdge::RIGHT,
        X11ResizeEdge::TopLeft => ResizeEdge::TOP | ResizeEdge::LEFT,
        X11ResizeEdge::TopRight => ResizeEdge::TOP | ResizeEdge::RIGHT,
        X11ResizeEdge::BottomLeft => ResizeEdge::BOTTOM | ResizeEdge::LEFT,
        X11ResizeEdge::BottomRight => ResizeEdge::BOTTOM | ResizeEdge::RIGHT,
    }
}

impl XWaylandShellHandler for Kristal {
    fn xwayland_shell_state(&mut self) -> &mut XWaylandShellState {
        &mut self.xwayland_shell_state
    }

    fn surface_associated(&mut self, _xwm: XwmId, _wl_surface: WlSurface, surface: X11Surface) {
        if surface.is_override_redirect() {
            return;
        }
        let Some(id) = self.view_for_x11(&surface) else {
            return;
        };

        tracing::debug!(view = %id, window = surface.window_id(), "X11 surface associated");
        self.desktop.associate(id, surface.geometry());
        self.desktop.map_view(
            id,
            MapRequest {
                title: surface.title(),
                app_id: surface.class(),
                fullscreen: surface.is_fullscreen(),
                maximized: surface.is_maximized(),
                output: None,
            },
        );
        self.refresh_desktop();
    }
}

delegate_xwayland_shell!(Kristal);

impl XwmHandler for Kristal {
    fn xwm_state(&mut self, _xwm: XwmId) -> &mut X11Wm {
        // Only called by the running window manager, which lives in `self.xwm`.
        match self.xwm.as_mut() {
            Some(xwm) => xwm,
            None => unreachable!("X11 event without a window manager"),
        }
    }

    fn new_window(&mut self, _xwm: XwmId, _window: X11Surface) {}

    fn new_override_redirect_window(&mut self, _xwm: XwmId, _window: X11Surface) {}

    fn map_window_request(&mut self, _xwm: XwmId, window: X11Surface) {
        if self.view_for_x11(&window).is_none() {
            self.desktop
                .create_view(ViewKind::Legacy, Window::new_x11_window(window.clone()));
        }
        if let Err(err) = window.set_mapped(true) {
            tracing::warn!(window = window.window_id(), "failed to map X11 window: {err}");
        }
    }

    fn mapped_override_redirect_window(&mut self, _xwm: XwmId, window: X11Surface) {
        let location = window.geometry().loc;
        self.space
            .map_element(Window::new_x11_window(window), location, false);
    }

    fn unmapped_window(&mut self, _xwm: XwmId, window: X11Surface) {
        if let Some(id) = self.view_for_x11(&window) {
            self.desktop.dissociate(id);
        }

        let unmanaged = self
            .space
            .elements()
            .find(|element| element.x11_surface() == Some(&window))
            .cloned();
        if let Some(element) = unmanaged {
            self.space.unmap_elem(&element);
        }

        if !window.is_override_redirect()
            && let Err(err) = window.set_mapped(false)
        {
            tracing::warn!(window = window.window_id(), "failed to unmap X11 window: {err}");
        }
        self.refresh_desktop();
    }

    fn destroyed_window(&mut self, _xwm: XwmId, window: X11Surface) {
        if let Some(id) = self.view_for_x11(&window) {
            self.desktop.dissociate(id);
            if let Some(view) = self.desktop.destroy_view(id) {
                self.space.unmap_elem(view.raw_surface());
            }
            self.refresh_desktop();
        }
    }

    fn configure_request(
        &mut self,
        _xwm: XwmId,
        window: X11Surface,
        x: Option<i32>,
        y: Option<i32>,
        w: Option<u32>,
        h: Option<u32>,
        _reorder: Option<Reorder>,
    ) {
        let id = self.view_for_x11(&window);
        let managed = id
            .and_then(|id| self.desktop.view(id))
            .filter(|view| view.mapped && view.get_box().is_ok());

        // Tiled, maximized and fullscreen windows keep the box they were given.
        if let Some(view) = managed
            && ((view.is_tileable_candidate()
                && self.desktop.workspaces().mode() != LayoutMode::Floating)
                || view.is_resize_blocked())
        {
            if let Ok(current) = view.get_box()
                && let Err(err) = window.configure(current)
            {
                tracing::warn!(window = window.window_id(), "failed to configure X11 window: {err}");
            }
            return;
        }

        let mut geometry = window.geometry();
        if let Some(x) = x {
            geometry.loc.x = x;
        }
        if let Some(y) = y {
            geometry.loc.y = y;
        }
        if let Some(w) = w {
            geometry.size.w = w as i32;
        }
        if let Some(h) = h {
            geometry.size.h = h as i32;
        }

        match id.filter(|_| managed.is_some()) {
            Some(id) => {
                if let Some(view) = self.desktop.view_mut(id) {
                    view.set_box(geometry);
                }
                self.refresh_desktop();
            }
            None => {
                if let Err(err) = window.configure(geometry) {
                    tracing::warn!(window = window.window_id(), "failed to configure X11 window: {err}");
                }
            }
        }
    }

    fn configure_notify(
        &mut self,
        _xwm: XwmId,
        window: X11Surface,
        geometry: Rectangle<i32, Logical>,
        _above: Option<u32>,
    ) {
        // Override-redirect windows place themselves.
        let element = self
            .space
            .elements()
            .find(|element| element.x11_surface() == Some(&window))
            .cloned();
        if let Some(element) = element
            && self.view_for_x11(&window).is_none()
        {
            self.space.map_element(element, geometry.loc, false);
        }
    }

    fn move_request(&mut self, _xwm: XwmId, window: X11Surface, _button: u32) {
        let Some(id) = self.mapped_x11_view(&window) else {
            return;
        };
        if self.desktop.focused() == Some(id) && self.desktop.begin_move(id, self.pointer_location)
        {
            self.refresh_desktop();
        }
    }

    fn resize_request(
        &mut self,
        _xwm: XwmId,
        window: X11Surface,
        _button: u32,
        edges: X11ResizeEdge,
    ) {
        let Some(id) = self.mapped_x11_view(&window) else {
            return;
        };
        if self.desktop.focused() == Some(id)
            && self
                .desktop
                .begin_resize(id, Some(resize_edges(edges)), self.pointer_location)
        {
            self.refresh_desktop();
        }
    }

    fn maximize_request(&mut self, _xwm: XwmId, window: X11Surface) {
        if let Some(id) = self.mapped_x11_view(&window) {
            self.desktop.apply_maximized(id, true);
            self.refresh_desktop();
        }
    }

    fn unmaximize_request(&mut self, _xwm: XwmId, window: X11Surface) {
        if let Some(id) = self.mapped_x11_view(&window) {
            self.desktop.apply_maximized(id, false);
            self.refresh_desktop();
        }
    }

    fn fullscreen_request(&mut self, _xwm: XwmId, window: X11Surface) {
        if let Some(id) = self.mapped_x11_view(&window) {
            self.desktop.apply_fullscreen(id, true, None);
            self.refresh_desktop();
        }
    }

    fn unfullscreen_request(&mut self, _xwm: XwmId, window: X11Surface) {
        if let Some(id) = self.mapped_x11_view(&window) {
            self.desktop.apply_fullscreen(id, false, None);
            self.refresh_desktop();
        }
    }
}
