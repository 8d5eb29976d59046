mod compositor;
mod layer_shell;
mod xdg_shell;
#[cfg(feature = "xwayland")]
mod xwayland;

use smithay::{
    backend::{input::TabletToolDescriptor, renderer::ImportDma},
    delegate_data_device, delegate_dmabuf, delegate_drm_syncobj, delegate_fractional_scale,
    delegate_output, delegate_pointer_constraints, delegate_presentation,
    delegate_primary_selection, delegate_relative_pointer, delegate_seat, delegate_tablet_manager,
    delegate_viewporter, delegate_xdg_activation,
    input::{
        Seat, SeatHandler, SeatState,
        dnd::{DnDGrab, DndGrabHandler, GrabType},
        pointer::{CursorImageStatus, Focus, PointerHandle},
    },
    output::Output,
    reexports::wayland_server::{
        Resource,
        protocol::{wl_output::WlOutput, wl_surface::WlSurface},
    },
    utils::{Logical, Point},
    wayland::{
        compositor::with_states,
        dmabuf::{DmabufGlobal, DmabufHandler, DmabufState, ImportNotifier},
        drm_syncobj::{DrmSyncobjHandler, DrmSyncobjState},
        fractional_scale::{FractionalScaleHandler, with_fractional_scale},
        output::OutputHandler,
        pointer_constraints::{PointerConstraintsHandler, with_pointer_constraint},
        selection::{
            SelectionHandler,
            data_device::{
                DataDeviceHandler, DataDeviceState, WaylandDndGrabHandler, set_data_device_focus,
            },
            primary_selection::{
                PrimarySelectionHandler, PrimarySelectionState, set_primary_focus,
            },
        },
        tablet_manager::TabletSeatHandler,
        xdg_activation::{
            XdgActivationHandler, XdgActivationState, XdgActivationToken, XdgActivationTokenData,
        },
    },
};

use crate::{
    Kristal, delegate_foreign_toplevel, delegate_output_management,
    output::OutputChange,
    protocols::{
        foreign_toplevel::{self, ForeignToplevelHandler, ForeignToplevelManagerState},
        output_management::{OutputManagementHandler, OutputManagementState},
    },
    view::ViewId,
};

/// Activation tokens older than this are ignored.
const ACTIVATION_TOKEN_TIMEOUT_SECS: u64 = 10;

impl Kristal {
    /// Focuses a view on the current workspace. Views elsewhere are left alone.
    pub(crate) fn activate_view(&mut self, id: ViewId) {
        if self.desktop.focus(id) {
            self.refresh_desktop();
        } else {
            tracing::debug!(view = %id, "activation ignored");
        }
    }
}

impl SeatHandler for Kristal {
    type KeyboardFocus = WlSurface;
    type PointerFocus = WlSurface;
    type TouchFocus = WlSurface;

    fn seat_state(&mut self) -> &mut SeatState<Self> {
        &mut self.seat_state
    }

    fn focus_changed(&mut self, seat: &Seat<Self>, focused: Option<&WlSurface>) {
        let dh = &self.display_handle;
        let client = focused.and_then(|s| dh.get_client(s.id()).ok());
        set_data_device_focus(dh, seat, client.clone());
        set_primary_focus(dh, seat, client);
    }

    fn cursor_image(&mut self, _seat: &Seat<Self>, image: CursorImageStatus) {
        self.cursor_status = image;
    }
}

delegate_seat!(Kristal);
delegate_relative_pointer!(Kristal);

impl TabletSeatHandler for Kristal {
    fn tablet_tool_image(&mut self, _tool: &TabletToolDescriptor, image: CursorImageStatus) {
        self.cursor_status = image;
    }
}

delegate_tablet_manager!(Kristal);

impl SelectionHandler for Kristal {
    type SelectionUserData = ();
}

impl DataDeviceHandler for Kristal {
    fn data_device_state(&mut self) -> &mut DataDeviceState {
        &mut self.data_device_state
    }
}

impl DndGrabHandler for Kristal {}

impl WaylandDndGrabHandler for Kristal {
    fn dnd_requested<S: smithay::input::dnd::Source>(
        &mut self,
        source: S,
        _icon: Option<WlSurface>,
        seat: Seat<Self>,
        serial: smithay::utils::Serial,
        type_: GrabType,
    ) {
        match type_ {
            GrabType::Pointer => {
                let Some(ptr) = seat.get_pointer() else {
                    return;
                };
                let Some(start_data) = ptr.grab_start_data() else {
                    return;
                };

                let grab = DnDGrab::new_pointer(&self.display_handle, start_data, source, seat);
                ptr.set_grab(self, grab, serial, Focus::Keep);
            }
            GrabType::Touch => {
                tracing::debug!("ignoring touch drag-and-drop");
            }
        }
    }
}

delegate_data_device!(Kristal);

impl OutputHandler for Kristal {
    fn output_bound(&mut self, output: Output, wl_output: WlOutput) {
        tracing::info!(
            output = %output.name(),
            wl_output_version = wl_output.version(),
            "wl_output bound"
        );
        foreign_toplevel::on_output_bound(self, &output, &wl_output);
    }
}

delegate_output!(Kristal);

impl OutputManagementHandler for Kristal {
    fn output_management_state(&mut self) -> &mut OutputManagementState {
        &mut self.output_management_state
    }

    fn apply_output_configuration(&mut self, changes: Vec<OutputChange>, test: bool) -> bool {
        self.apply_output_changes(&changes, test)
    }
}

delegate_output_management!(Kristal);

impl FractionalScaleHandler for Kristal {
    fn new_fractional_scale(&mut self, surface: WlSurface) {
        let preferred_scale = self
            .space
            .outputs()
            .next()
            .map(|output| output.current_scale().fractional_scale())
            .unwrap_or(1.0);

        with_states(&surface, |states| {
            with_fractional_scale(states, |fractional_scale| {
                fractional_scale.set_preferred_scale(preferred_scale);
            });
        });
    }
}

delegate_fractional_scale!(Kristal);
delegate_viewporter!(Kristal);

impl PrimarySelectionHandler for Kristal {
    fn primary_selection_state(&mut self) -> &mut PrimarySelectionState {
        &mut self.primary_selection_state
    }
}
delegate_primary_selection!(Kristal);

impl XdgActivationHandler for Kristal {
    fn activation_state(&mut self) -> &mut XdgActivationState {
        &mut self.xdg_activation_state
    }

    fn request_activation(
        &mut self,
        token: XdgActivationToken,
        token_data: XdgActivationTokenData,
        surface: WlSurface,
    ) {
        if token_data.timestamp.elapsed().as_secs() < ACTIVATION_TOKEN_TIMEOUT_SECS {
            if let Some(id) = self.view_for_surface(&surface) {
                tracing::debug!(view = %id, "activation requested");
                self.activate_view(id);
            }
        } else {
            tracing::debug!("ignoring stale activation token");
        }
        self.xdg_activation_state.remove_token(&token);
    }
}

delegate_xdg_activation!(Kristal);

impl ForeignToplevelHandler for Kristal {
    fn foreign_toplevel_manager_state(&mut self) -> &mut ForeignToplevelManagerState {
        &mut self.foreign_toplevel_manager_state
    }

    fn activate(&mut self, id: ViewId) {
        self.activate_view(id);
    }

    fn close(&mut self, id: ViewId) {
        self.desktop.close(id);
    }

    fn set_fullscreen(&mut self, id: ViewId, wl_output: Option<WlOutput>) {
        let output = wl_output
            .as_ref()
            .and_then(Output::from_resource)
            .map(|output| output.name());
        self.desktop.apply_fullscreen(id, true, output.as_deref());
        self.refresh_desktop();
    }

    fn unset_fullscreen(&mut self, id: ViewId) {
        self.desktop.apply_fullscreen(id, false, None);
        self.refresh_desktop();
    }

    fn set_maximized(&mut self, id: ViewId) {
        self.desktop.apply_maximized(id, true);
        self.refresh_desktop();
    }

    fn unset_maximized(&mut self, id: ViewId) {
        self.desktop.apply_maximized(id, false);
        self.refresh_desktop();
    }
}

delegate_foreign_toplevel!(Kristal);

impl DmabufHandler for Kristal {
    fn dmabuf_state(&mut self) -> &mut DmabufState {
        self.dmabuf_state.get_or_insert_with(DmabufState::new)
    }

    fn dmabuf_imported(
        &mut self,
        _global: &DmabufGlobal,
        dmabuf: smithay::backend::allocator::dmabuf::Dmabuf,
        notifier: ImportNotifier,
    ) {
        if let Some(ref mut udev_data) = self.udev_data
            && udev_data
                .gpus
                .single_renderer(&udev_data.primary_gpu)
                .and_then(|mut renderer| renderer.import_dmabuf(&dmabuf, None))
                .is_ok()
        {
            if let Err(err) = notifier.successful::<Kristal>() {
                tracing::warn!("failed to announce imported dmabuf: {err:?}");
            }
            return;
        }
        notifier.failed();
    }
}

delegate_dmabuf!(Kristal);

impl DrmSyncobjHandler for Kristal {
    fn drm_syncobj_state(&mut self) -> Option<&mut DrmSyncobjState> {
        self.syncobj_state.as_mut()
    }
}

delegate_drm_syncobj!(Kristal);
delegate_presentation!(Kristal);

impl PointerConstraintsHandler for Kristal {
    fn new_constraint(&mut self, _surface: &WlSurface, _pointer: &PointerHandle<Self>) {
        self.maybe_activate_pointer_constraint();
    }

    fn cursor_position_hint(
        &mut self,
        surface: &WlSurface,
        pointer: &PointerHandle<Self>,
        location: Point<f64, Logical>,
    ) {
        let is_constraint_active = with_pointer_constraint(surface, pointer, |constraint| {
            constraint.is_some_and(|c| c.is_active())
        });
        if !is_constraint_active {
            return;
        }

        let Some((surface_under_pointer, origin)) = self.surface_under(self.pointer_location)
        else {
            return;
        };
        if surface_under_pointer != *surface {
            return;
        }

        let target = self.clamp_to_outputs(origin + location);
        pointer.set_location(target);
        self.pointer_location = target;
        crate::backend::udev::queue_redraw_all(self);
    }
}

delegate_pointer_constraints!(Kristal);
