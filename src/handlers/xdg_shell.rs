use smithay::{
    delegate_kde_decoration, delegate_xdg_decoration, delegate_xdg_shell,
    desktop::{
        PopupKeyboardGrab, PopupKind, PopupManager, PopupPointerGrab, PopupUngrabStrategy, Window,
        WindowSurfaceType, find_popup_root_surface, get_popup_toplevel_coords,
        layer_map_for_output,
    },
    input::{
        Seat,
        pointer::{Focus, GrabStartData as PointerGrabStartData},
    },
    output::Output,
    reexports::{
        wayland_protocols::xdg::{
            decoration::zv1::server::zxdg_toplevel_decoration_v1::Mode as DecorationMode,
            shell::server::xdg_toplevel,
        },
        wayland_protocols_misc::server_decoration::server::org_kde_kwin_server_decoration,
        wayland_server::{
            Resource, WEnum,
            protocol::{wl_output::WlOutput, wl_seat, wl_surface::WlSurface},
        },
    },
    utils::{Logical, Point, Serial},
    wayland::{
        compositor::with_states,
        shell::{
            kde::decoration::{KdeDecorationHandler, KdeDecorationState},
            xdg::{
                PopupSurface, PositionerState, ToplevelState, ToplevelSurface, XdgShellHandler,
                XdgShellState, XdgToplevelSurfaceData, XdgToplevelSurfaceRoleAttributes,
                decoration::XdgDecorationHandler,
            },
        },
    },
};

use crate::{
    Kristal,
    geometry::Rect,
    grab::ResizeEdge,
    view::{View, ViewId, ViewKind},
};

impl XdgShellHandler for Kristal {
    fn xdg_shell_state(&mut self) -> &mut XdgShellState {
        &mut self.xdg_shell_state
    }

    fn new_toplevel(&mut self, surface: ToplevelSurface) {
        surface.with_pending_state(|state| {
            state.decoration_mode = Some(DecorationMode::ClientSide);
        });
        let window = Window::new_wayland_window(surface);
        self.desktop.create_view(ViewKind::Native, window);
    }

    fn new_popup(&mut self, surface: PopupSurface, _positioner: PositionerState) {
        self.unconstrain_popup(&surface);
        if let Err(err) = self.popups.track_popup(PopupKind::Xdg(surface)) {
            tracing::warn!("error while tracking popup: {err:?}");
        }
    }

    fn grab(&mut self, surface: PopupSurface, seat: wl_seat::WlSeat, serial: Serial) {
        let Some(seat) = Seat::<Self>::from_resource(&seat) else {
            return;
        };
        let kind = PopupKind::Xdg(surface);
        let Ok(root) = find_popup_root_surface(&kind) else {
            return;
        };
        if self.view_for_surface(&root).is_none() && self.layer_popup_area(&root).is_none() {
            tracing::debug!("ignoring popup grab without a known parent");
            return;
        }

        let mut grab = match self.popups.grab_popup(root, kind, &seat, serial) {
            Ok(grab) => grab,
            Err(err) => {
                tracing::debug!("popup grab refused: {err:?}");
                return;
            }
        };
        let (Some(keyboard), Some(pointer)) = (seat.get_keyboard(), seat.get_pointer()) else {
            grab.ungrab(PopupUngrabStrategy::All);
            return;
        };

        let previous = grab.previous_serial();
        if grab_conflicts(
            keyboard.is_grabbed(),
            keyboard.has_grab(serial),
            previous.map(|s| keyboard.has_grab(s)),
        ) || grab_conflicts(
            pointer.is_grabbed(),
            pointer.has_grab(serial),
            previous.map(|s| pointer.has_grab(s)),
        ) {
            grab.ungrab(PopupUngrabStrategy::All);
            return;
        }

        keyboard.set_focus(self, grab.current_grab(), serial);
        keyboard.set_grab(self, PopupKeyboardGrab::new(&grab), serial);
        pointer.set_grab(self, PopupPointerGrab::new(&grab), serial, Focus::Keep);
    }

    fn reposition_request(
        &mut self,
        surface: PopupSurface,
        positioner: PositionerState,
        token: u32,
    ) {
        surface.with_pending_state(|state| {
            let geometry = positioner.get_geometry();
            state.geometry = geometry;
            state.positioner = positioner;
        });
        self.unconstrain_popup(&surface);
        surface.send_repositioned(token);
    }

    fn move_request(&mut self, surface: ToplevelSurface, seat: wl_seat::WlSeat, serial: Serial) {
        let Some(id) = self.grab_target(&surface, &seat, serial) else {
            return;
        };
        if self.desktop.begin_move(id, self.pointer_location) {
            self.refresh_desktop();
        }
    }

    fn resize_request(
        &mut self,
        surface: ToplevelSurface,
        seat: wl_seat::WlSeat,
        serial: Serial,
        edges: xdg_toplevel::ResizeEdge,
    ) {
        let Some(id) = self.grab_target(&surface, &seat, serial) else {
            return;
        };
        let edges = ResizeEdge::from_bits_truncate(u32::from(edges));
        if self
            .desktop
            .begin_resize(id, Some(edges), self.pointer_location)
        {
            self.refresh_desktop();
        }
    }

    fn maximize_request(&mut self, surface: ToplevelSurface) {
        match self.mapped_view(surface.wl_surface()) {
            Some(id) => {
                self.desktop.apply_maximized(id, true);
                self.refresh_desktop();
            }
            None => update_unmapped(&surface, |state| {
                state.states.set(xdg_toplevel::State::Maximized);
            }),
        }
    }

    fn unmaximize_request(&mut self, surface: ToplevelSurface) {
        match self.mapped_view(surface.wl_surface()) {
            Some(id) => {
                self.desktop.apply_maximized(id, false);
                self.refresh_desktop();
            }
            None => update_unmapped(&surface, |state| {
                state.states.unset(xdg_toplevel::State::Maximized);
            }),
        }
    }

    fn fullscreen_request(&mut self, surface: ToplevelSurface, output: Option<WlOutput>) {
        match self.mapped_view(surface.wl_surface()) {
            Some(id) => {
                let output = output
                    .as_ref()
                    .and_then(Output::from_resource)
                    .map(|output| output.name());
                self.desktop.apply_fullscreen(id, true, output.as_deref());
                self.refresh_desktop();
            }
            None => update_unmapped(&surface, |state| {
                state.states.set(xdg_toplevel::State::Fullscreen);
                state.fullscreen_output = output;
            }),
        }
    }

    fn unfullscreen_request(&mut self, surface: ToplevelSurface) {
        match self.mapped_view(surface.wl_surface()) {
            Some(id) => {
                self.desktop.apply_fullscreen(id, false, None);
                self.refresh_desktop();
            }
            None => update_unmapped(&surface, |state| {
                state.states.unset(xdg_toplevel::State::Fullscreen);
                state.fullscreen_output = None;
            }),
        }
    }

    fn title_changed(&mut self, surface: ToplevelSurface) {
        let Some(id) = self.view_for_surface(surface.wl_surface()) else {
            return;
        };
        let title = toplevel_role_string(surface.wl_surface(), |role| role.title.clone());
        self.desktop.set_title(id, title);
        self.refresh_foreign_toplevel();
    }

    fn app_id_changed(&mut self, surface: ToplevelSurface) {
        let Some(id) = self.view_for_surface(surface.wl_surface()) else {
            return;
        };
        let app_id = toplevel_role_string(surface.wl_surface(), |role| role.app_id.clone());
        self.desktop.set_app_id(id, app_id);
        self.refresh_foreign_toplevel();
    }

    fn toplevel_destroyed(&mut self, surface: ToplevelSurface) {
        if let Some(id) = self.view_for_surface(surface.wl_surface())
            && let Some(view) = self.desktop.destroy_view(id)
        {
            self.space.unmap_elem(view.raw_surface());
        }
        self.refresh_desktop();
    }
}

delegate_xdg_shell!(Kristal);

impl XdgDecorationHandler for Kristal {
    fn new_decoration(&mut self, toplevel: ToplevelSurface) {
        set_client_side(&toplevel);
    }

    fn request_mode(&mut self, toplevel: ToplevelSurface, mode: DecorationMode) {
        tracing::debug!(?mode, "client requested decoration mode, keeping client side");
        set_client_side(&toplevel);
    }

    fn unset_mode(&mut self, toplevel: ToplevelSurface) {
        set_client_side(&toplevel);
    }
}

delegate_xdg_decoration!(Kristal);

impl KdeDecorationHandler for Kristal {
    fn kde_decoration_state(&self) -> &KdeDecorationState {
        &self.kde_decoration_state
    }

    fn request_mode(
        &mut self,
        _surface: &WlSurface,
        decoration: &org_kde_kwin_server_decoration::OrgKdeKwinServerDecoration,
        mode: WEnum<org_kde_kwin_server_decoration::Mode>,
    ) {
        tracing::debug!(?mode, "kde_decoration: client requested mode, keeping client side");
        decoration.mode(org_kde_kwin_server_decoration::Mode::Client);
    }
}

delegate_kde_decoration!(Kristal);

/// Windows always draw their own decorations.
fn set_client_side(toplevel: &ToplevelSurface) {
    toplevel.with_pending_state(|state| {
        state.decoration_mode = Some(DecorationMode::ClientSide);
    });

    // The decoration object may be new, so the client needs a full configure.
    if toplevel.is_initial_configure_sent() {
        toplevel.send_configure();
    }
}

/// Requests against a not yet mapped toplevel only touch its pending state.
fn update_unmapped(surface: &ToplevelSurface, update: impl FnOnce(&mut ToplevelState)) {
    surface.with_pending_state(update);
    if surface.is_initial_configure_sent() {
        surface.send_pending_configure();
    }
}

fn toplevel_role_string(
    surface: &WlSurface,
    field: impl FnOnce(&XdgToplevelSurfaceRoleAttributes) -> Option<String>,
) -> String {
    with_states(surface, |states| {
        states
            .data_map
            .get::<XdgToplevelSurfaceData>()
            .and_then(|data| data.lock().ok())
            .and_then(|role| field(&role))
            .unwrap_or_default()
    })
}

fn check_grab(
    seat: &Seat<Kristal>,
    surface: &WlSurface,
    serial: Serial,
) -> Option<PointerGrabStartData<Kristal>> {
    let pointer = seat.get_pointer()?;

    // Check that this surface has a click grab.
    if !pointer.has_grab(serial) {
        return None;
    }

    let start_data = pointer.grab_start_data()?;

    let (focus, _) = start_data.focus.as_ref()?;
    // If the focus was for a different surface, ignore the request.
    if !focus.id().same_client_as(&surface.id()) {
        return None;
    }

    Some(start_data)
}

/// A popup grab may only replace an existing device grab that started from the same click or
/// from the parent popup's grab.
fn grab_conflicts(grabbed: bool, has_serial: bool, previous_matches: Option<bool>) -> bool {
    grabbed && !(has_serial || previous_matches.unwrap_or(true))
}

/// Should be called on `WlSurface::commit`
pub fn handle_commit(popups: &mut PopupManager, surface: &WlSurface) {
    popups.commit(surface);
    if let Some(PopupKind::Xdg(xdg)) = popups.find_popup(surface)
        && !xdg.is_initial_configure_sent()
        && let Err(err) = xdg.send_configure()
    {
        tracing::warn!("initial popup configure failed: {err}");
    }
}

impl Kristal {
    fn mapped_view(&self, surface: &WlSurface) -> Option<ViewId> {
        self.view_for_surface(surface)
            .filter(|id| self.desktop.view(*id).is_some_and(|view| view.mapped))
    }

    /// Interactive move and resize need a live click grab on the focused view.
    fn grab_target(
        &self,
        surface: &ToplevelSurface,
        seat: &wl_seat::WlSeat,
        serial: Serial,
    ) -> Option<ViewId> {
        let seat = Seat::<Self>::from_resource(seat)?;
        let wl_surface = surface.wl_surface();
        check_grab(&seat, wl_surface, serial)?;

        let id = self.view_for_surface(wl_surface)?;
        if self.desktop.focused() != Some(id) {
            tracing::debug!(view = %id, "ignoring grab request from unfocused view");
            return None;
        }
        Some(id)
    }

    pub fn unconstrain_popup(&self, popup: &PopupSurface) {
        let kind = PopupKind::Xdg(popup.clone());
        let Ok(root) = find_popup_root_surface(&kind) else {
            return;
        };
        let Some((parent_loc, area)) = self
            .view_popup_area(&root)
            .or_else(|| self.layer_popup_area(&root))
        else {
            return;
        };

        // The target geometry for the positioner should be relative to its parent's geometry, so
        // we will compute that here.
        let mut target = area;
        target.loc -= get_popup_toplevel_coords(&kind);
        target.loc -= parent_loc;

        popup.with_pending_state(|state| {
            state.geometry = state.positioner.get_unconstrained_geometry(target);
        });
    }

    fn view_popup_area(&self, root: &WlSurface) -> Option<(Point<i32, Logical>, Rect)> {
        let id = self.view_for_surface(root)?;
        let view_box = self.desktop.view(id).map(View::get_box)?.ok()?;
        let area = self.desktop.target_output(id, None)?.geometry;
        Some((view_box.loc, area))
    }

    fn layer_popup_area(&self, root: &WlSurface) -> Option<(Point<i32, Logical>, Rect)> {
        self.space.outputs().find_map(|output| {
            let output_geo = self.space.output_geometry(output)?;
            let layer_map = layer_map_for_output(output);
            let layer = layer_map.layer_for_surface(root, WindowSurfaceType::TOPLEVEL)?;
            let layer_geo = layer_map.layer_geometry(layer)?;
            Some((output_geo.loc + layer_geo.loc, output_geo))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::grab_conflicts;

    #[test]
    fn popup_grab_on_an_idle_device() {
        assert!(!grab_conflicts(false, false, None));
        assert!(!grab_conflicts(false, false, Some(false)));
    }

    #[test]
    fn popup_grab_from_the_grabbing_click() {
        assert!(!grab_conflicts(true, true, None));
        assert!(!grab_conflicts(true, true, Some(false)));
    }

    #[test]
    fn nested_popup_grab_follows_its_parent() {
        assert!(!grab_conflicts(true, false, Some(true)));
        assert!(grab_conflicts(true, false, Some(false)));
    }

    #[test]
    fn root_popup_grab_replaces_an_unrelated_device_grab() {
        // Without a previous popup grab there is no serial to match against.
        assert!(!grab_conflicts(true, false, None));
    }
}
