use std::{
    borrow::Cow,
    ffi::OsString,
    os::unix::process::CommandExt,
    process::{Command, Stdio},
    sync::Arc,
    time::Instant,
};

use calloop::signals::{Signal, Signals};
use smithay::{
    desktop::{PopupManager, Space, Window, WindowSurfaceType, layer_map_for_output},
    input::{
        Seat, SeatState,
        keyboard::{KeyboardHandle, XkbConfig},
        pointer::{CursorImageStatus, PointerHandle},
    },
    reexports::{
        calloop::{Interest, LoopHandle, LoopSignal, Mode, PostAction, generic::Generic},
        wayland_protocols::xdg::shell::server::xdg_toplevel,
        wayland_protocols_misc::server_decoration::server::org_kde_kwin_server_decoration_manager::Mode as KdeDecorationsMode,
        wayland_server::{
            Display, DisplayHandle,
            backend::{ClientData, ClientId, DisconnectReason},
            protocol::wl_surface::WlSurface,
        },
    },
    utils::{Clock, Logical, Monotonic, Point, SERIAL_COUNTER},
    wayland::{
        compositor::{CompositorClientState, CompositorState},
        dmabuf::DmabufState,
        drm_syncobj::DrmSyncobjState,
        fractional_scale::FractionalScaleManagerState,
        output::OutputManagerState,
        pointer_constraints::{PointerConstraintsState, with_pointer_constraint},
        presentation::PresentationState,
        relative_pointer::RelativePointerManagerState,
        seat::WaylandFocus,
        selection::{data_device::DataDeviceState, primary_selection::PrimarySelectionState},
        shell::{
            kde::decoration::KdeDecorationState,
            wlr_layer::{Layer as WlrLayer, WlrLayerShellState},
            xdg::{XdgShellState, decoration::XdgDecorationState},
        },
        shm::ShmState,
        socket::ListeningSocketSource,
        tablet_manager::TabletManagerState,
        viewporter::ViewporterState,
        xdg_activation::XdgActivationState,
    },
};
#[cfg(feature = "xwayland")]
use smithay::{
    wayland::xwayland_shell::XWaylandShellState,
    xwayland::{X11Wm, XWayland, XWaylandEvent},
};

use crate::{
    CompositorError,
    config::Config,
    desktop::Desktop,
    geometry::{self, Rect},
    output::OutputLayout,
    protocols::{
        foreign_toplevel::ForeignToplevelManagerState, output_management::OutputManagementState,
    },
    view::{View, ViewId, ViewSurface},
};

pub struct Kristal {
    pub display_handle: DisplayHandle,
    pub loop_handle: LoopHandle<'static, Kristal>,
    pub loop_signal: LoopSignal,
    pub socket_name: OsString,
    pub start_time: Instant,

    pub config: Config,
    pub desktop: Desktop<Window>,
    pub space: Space<Window>,
    pub output_layout: OutputLayout,
    pub seat: Seat<Self>,
    pub pointer: PointerHandle<Self>,
    pub keyboard: KeyboardHandle<Self>,
    /// Last desktop focus pushed to the seat.
    synced_focus: Option<ViewId>,

    // smithay state
    pub compositor_state: CompositorState,
    pub xdg_shell_state: XdgShellState,
    pub xdg_decoration_state: XdgDecorationState,
    pub kde_decoration_state: KdeDecorationState,
    pub shm_state: ShmState,
    pub output_manager_state: OutputManagerState,
    pub data_device_state: DataDeviceState,
    pub seat_state: SeatState<Self>,
    pub popups: PopupManager,
    pub primary_selection_state: PrimarySelectionState,
    pub layer_shell_state: WlrLayerShellState,
    pub foreign_toplevel_manager_state: ForeignToplevelManagerState,
    pub output_management_state: OutputManagementState,
    pub viewporter_state: ViewporterState,
    pub fractional_scale_manager_state: FractionalScaleManagerState,
    pub pointer_constraints_state: PointerConstraintsState,
    pub relative_pointer_manager_state: RelativePointerManagerState,
    pub xdg_activation_state: XdgActivationState,
    pub presentation_state: PresentationState,
    pub tablet_manager_state: TabletManagerState,
    #[cfg(feature = "xwayland")]
    pub xwayland_shell_state: XWaylandShellState,

    pub pointer_location: Point<f64, Logical>,

    // DRM backend fields
    pub cursor_status: CursorImageStatus,
    pub clock: Clock<Monotonic>,
    pub dmabuf_state: Option<DmabufState>,
    pub syncobj_state: Option<DrmSyncobjState>,
    pub udev_data: Option<crate::backend::udev::UdevData>,

    #[cfg(feature = "xwayland")]
    pub xwm: Option<X11Wm>,
    #[cfg(feature = "xwayland")]
    pub xdisplay: Option<u32>,
}

impl Kristal {
    pub fn new(
        display: Display<Self>,
        loop_handle: LoopHandle<'static, Kristal>,
        loop_signal: LoopSignal,
        config: Config,
    ) -> Result<Self, CompositorError> {
        let start_time = Instant::now();
        let display_handle = display.handle();
        let clock = Clock::new();

        // State
        let compositor_state = CompositorState::new::<Self>(&display_handle);
        let xdg_shell_state = XdgShellState::new::<Self>(&display_handle);
        let xdg_decoration_state = XdgDecorationState::new::<Self>(&display_handle);
        let kde_decoration_state =
            KdeDecorationState::new::<Self>(&display_handle, KdeDecorationsMode::Client);
        let shm_state = ShmState::new::<Self>(&display_handle, vec![]);
        let output_manager_state = OutputManagerState::new_with_xdg_output::<Self>(&display_handle);
        let data_device_state = DataDeviceState::new::<Self>(&display_handle);
        let popups = PopupManager::default();
        let primary_selection_state = PrimarySelectionState::new::<Self>(&display_handle);
        let layer_shell_state = WlrLayerShellState::new::<Self>(&display_handle);
        let foreign_toplevel_manager_state =
            ForeignToplevelManagerState::new::<Self, _>(&display_handle, |_| true);
        let output_management_state =
            OutputManagementState::new::<Self, _>(&display_handle, |_| true);
        let viewporter_state = ViewporterState::new::<Self>(&display_handle);
        let fractional_scale_manager_state =
            FractionalScaleManagerState::new::<Self>(&display_handle);
        let pointer_constraints_state = PointerConstraintsState::new::<Self>(&display_handle);
        let relative_pointer_manager_state =
            RelativePointerManagerState::new::<Self>(&display_handle);
        let xdg_activation_state = XdgActivationState::new::<Self>(&display_handle);
        let presentation_state =
            PresentationState::new::<Self>(&display_handle, clock.id() as u32);
        let tablet_manager_state = TabletManagerState::new::<Self>(&display_handle);
        #[cfg(feature = "xwayland")]
        let xwayland_shell_state = XWaylandShellState::new::<Self>(&display_handle);

        let mut seat_state = SeatState::new();
        let mut seat = seat_state.new_wl_seat(&display_handle, "seat0");
        let keyboard = add_keyboard(&mut seat, &config)?;
        let pointer = seat.add_pointer();

        let socket_name = init_wayland_listener(display, &loop_handle)?;
        init_child_reaper(&loop_handle)?;

        config.log_summary();
        let desktop = Desktop::new(config.desktop());
        let output_layout = OutputLayout::new(config.output.clone());

        Ok(Self {
            display_handle,
            loop_handle,
            loop_signal,
            socket_name,
            start_time,

            config,
            desktop,
            space: Space::default(),
            output_layout,
            seat,
            pointer,
            keyboard,
            synced_focus: None,

            compositor_state,
            xdg_shell_state,
            xdg_decoration_state,
            kde_decoration_state,
            shm_state,
            output_manager_state,
            data_device_state,
            seat_state,
            popups,
            primary_selection_state,
            layer_shell_state,
            foreign_toplevel_manager_state,
            output_management_state,
            viewporter_state,
            fractional_scale_manager_state,
            pointer_constraints_state,
            relative_pointer_manager_state,
            xdg_activation_state,
            presentation_state,
            tablet_manager_state,
            #[cfg(feature = "xwayland")]
            xwayland_shell_state,

            pointer_location: Point::from((0.0, 0.0)),

            cursor_status: CursorImageStatus::default_named(),
            clock,
            dmabuf_state: None,
            syncobj_state: None,
            udev_data: None,

            #[cfg(feature = "xwayland")]
            xwm: None,
            #[cfg(feature = "xwayland")]
            xdisplay: None,
        })
    }

    /// Mirrors the desktop's scene into the smithay space, back to front.
    pub fn sync_space(&mut self) {
        for view in self.desktop.all_views() {
            if !view.is_enabled() && self.space.elements().any(|w| w == view.raw_surface()) {
                self.space.unmap_elem(view.raw_surface());
            }
        }

        let wanted: Vec<(Window, Point<i32, Logical>)> = self
            .desktop
            .views()
            .iter()
            .rev()
            .filter_map(|view| {
                let node = view.scene().filter(|node| node.enabled)?;
                Some((view.raw_surface().clone(), node.geometry.loc))
            })
            .collect();

        let current: Vec<(Window, Point<i32, Logical>)> = self
            .space
            .elements()
            .filter(|window| wanted.iter().any(|(candidate, _)| candidate == *window))
            .filter_map(|window| {
                let location = self.space.element_location(window)?;
                Some((window.clone(), location))
            })
            .collect();

        if current == wanted {
            return;
        }

        for (window, location) in wanted {
            self.space.map_element(window, location, false);
        }

        // Override-redirect windows stay above managed ones.
        let unmanaged: Vec<Window> = self
            .space
            .elements()
            .filter(|window| self.desktop.find_view(window).is_none())
            .cloned()
            .collect();
        for window in unmanaged {
            self.space.raise_element(&window, false);
        }
    }

    /// Pushes the desktop focus to the seat when it changed, or always with `force`.
    fn sync_focus(&mut self, force: bool) {
        let focused = self.desktop.focused();
        if focused == self.synced_focus && !force {
            return;
        }
        self.synced_focus = focused;

        let target = focused
            .and_then(|id| self.desktop.view(id))
            .and_then(View::surface)
            .and_then(|window| window.wl_surface().map(Cow::into_owned));

        // An open launcher keeps the keyboard when the last view goes away.
        if target.is_none() && self.keyboard_focus_is_layer() {
            return;
        }
        self.set_keyboard_focus(target);
    }

    /// Applies everything the desktop changed since the last call.
    pub fn refresh_desktop(&mut self) {
        self.sync_space();
        self.sync_focus(false);
        self.refresh_foreign_toplevel();
        crate::backend::udev::queue_redraw_all(self);
    }

    /// Hands the keyboard back to the focused view, e.g. after a layer surface let go.
    pub fn refocus_view(&mut self) {
        self.sync_space();
        self.sync_focus(true);
    }

    pub fn set_keyboard_focus(&mut self, target: Option<WlSurface>) {
        let serial = SERIAL_COUNTER.next_serial();
        let keyboard = self.keyboard.clone();

        if let Some(previous) = keyboard.current_focus()
            && Some(&previous) != target.as_ref()
        {
            with_pointer_constraint(&previous, &self.pointer, |constraint| {
                if let Some(constraint) = constraint {
                    constraint.deactivate();
                }
            });
        }

        keyboard.set_focus(self, target, serial);
        self.maybe_activate_pointer_constraint();
    }

    fn keyboard_focus_is_layer(&self) -> bool {
        let Some(focus) = self.keyboard.current_focus() else {
            return false;
        };
        self.space.outputs().any(|output| {
            layer_map_for_output(output)
                .layer_for_surface(&focus, WindowSurfaceType::TOPLEVEL)
                .is_some()
        })
    }

    pub fn view_for_surface(&self, surface: &WlSurface) -> Option<ViewId> {
        self.desktop
            .all_views()
            .find(|view| {
                view.raw_surface()
                    .wl_surface()
                    .is_some_and(|candidate| *candidate == *surface)
            })
            .map(View::id)
    }

    /// View whose window is topmost under `position`.
    pub fn view_under(&self, position: Point<f64, Logical>) -> Option<ViewId> {
        let (window, _) = self.space.element_under(position)?;
        self.desktop.find_view(window)
    }

    /// Topmost surface under `position`, with its origin in global coordinates.
    pub fn surface_under(
        &self,
        position: Point<f64, Logical>,
    ) -> Option<(WlSurface, Point<f64, Logical>)> {
        let (output, output_geo) = self.space.outputs().find_map(|output| {
            let geometry = self.space.output_geometry(output)?;
            geometry
                .to_f64()
                .contains(position)
                .then_some((output, geometry))
        })?;

        let layer_map = layer_map_for_output(output);
        let position_within_output = position - output_geo.loc.to_f64();

        let surface_on_layer = |layer: WlrLayer| {
            layer_map.layers_on(layer).rev().find_map(|layer_surface| {
                let layer_geo = layer_map.layer_geometry(layer_surface)?;
                layer_surface
                    .surface_under(
                        position_within_output - layer_geo.loc.to_f64(),
                        WindowSurfaceType::ALL,
                    )
                    .map(|(surface, local_pos)| {
                        (
                            surface,
                            output_geo.loc.to_f64() + layer_geo.loc.to_f64() + local_pos.to_f64(),
                        )
                    })
            })
        };

        surface_on_layer(WlrLayer::Overlay)
            .or_else(|| surface_on_layer(WlrLayer::Top))
            .or_else(|| {
                self.space
                    .element_under(position)
                    .and_then(|(window, location)| {
                        window
                            .surface_under(position - location.to_f64(), WindowSurfaceType::ALL)
                            .map(|(surface, local_pos)| (surface, (local_pos + location).to_f64()))
                    })
            })
            .or_else(|| surface_on_layer(WlrLayer::Bottom))
            .or_else(|| surface_on_layer(WlrLayer::Background))
    }

    /// Keeps `position` inside the union of all outputs.
    pub fn clamp_to_outputs(&self, position: Point<f64, Logical>) -> Point<f64, Logical> {
        let Some(bounds) = geometry::bounding_box(
            self.space
                .outputs()
                .filter_map(|output| self.space.output_geometry(output)),
        ) else {
            return position;
        };

        let max_x = (bounds.loc.x + bounds.size.w) as f64 - 1.0;
        let max_y = (bounds.loc.y + bounds.size.h) as f64 - 1.0;
        Point::from((
            position.x.clamp(bounds.loc.x as f64, max_x.max(bounds.loc.x as f64)),
            position.y.clamp(bounds.loc.y as f64, max_y.max(bounds.loc.y as f64)),
        ))
    }

    /// Activates a pending constraint of the focused surface if the pointer is inside its region.
    pub fn maybe_activate_pointer_constraint(&self) {
        let location = self.pointer_location;
        let Some((surface, surface_loc)) = self.surface_under(location) else {
            return;
        };
        if self.keyboard.current_focus().as_ref() != Some(&surface) {
            return;
        }

        with_pointer_constraint(&surface, &self.pointer, |constraint| {
            let Some(constraint) = constraint else {
                return;
            };
            if constraint.is_active() {
                return;
            }
            let point = (location - surface_loc).to_i32_round();
            if constraint
                .region()
                .is_none_or(|region| region.contains(point))
            {
                constraint.activate();
            }
        });
    }

    pub fn spawn_command(&self, command: &str) {
        let command = command.trim();
        if command.is_empty() {
            return;
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .env("WAYLAND_DISPLAY", &self.socket_name)
            .stdin(Stdio::null());
        #[cfg(feature = "xwayland")]
        if let Some(display) = self.xdisplay {
            cmd.env("DISPLAY", format!(":{display}"));
        }

        // SAFETY: the hook only calls sigprocmask, which is async-signal-safe.
        unsafe {
            cmd.pre_exec(unblock_signals);
        }

        match cmd.spawn() {
            Ok(child) => tracing::info!(pid = child.id(), command, "spawned command"),
            Err(err) => tracing::warn!(command, "failed to spawn command: {err}"),
        }
    }

    pub fn refresh_foreign_toplevel(&mut self) {
        crate::protocols::foreign_toplevel::refresh(self);
    }

    #[cfg(feature = "xwayland")]
    pub fn start_xwayland(&mut self) {
        let (xwayland, client) = match XWayland::spawn(
            &self.display_handle,
            None,
            std::iter::empty::<(String, String)>(),
            true,
            Stdio::null(),
            Stdio::null(),
            |_| (),
        ) {
            Ok(spawned) => spawned,
            Err(err) => {
                tracing::error!("failed to start Xwayland, continuing without X11 support: {err}");
                return;
            }
        };

        let result = self
            .loop_handle
            .insert_source(xwayland, move |event, _, state| match event {
                XWaylandEvent::Ready {
                    x11_socket,
                    display_number,
                } => {
                    match X11Wm::start_wm(state.loop_handle.clone(), x11_socket, client.clone()) {
                        Ok(wm) => {
                            tracing::info!(display = display_number, "Xwayland ready");
                            state.xwm = Some(wm);
                            state.xdisplay = Some(display_number);
                        }
                        Err(err) => tracing::error!("failed to attach X11 window manager: {err}"),
                    }
                }
                XWaylandEvent::Error => {
                    tracing::warn!("Xwayland crashed on startup");
                }
            });
        if let Err(err) = result {
            tracing::error!("failed to insert the Xwayland source into the event loop: {err}");
        }
    }
}

fn add_keyboard(seat: &mut Seat<Kristal>, config: &Config) -> Result<KeyboardHandle<Kristal>, CompositorError> {
    let xkb = &config.xkb;
    let xkb_config = XkbConfig {
        rules: xkb.rules.as_deref().unwrap_or_default(),
        model: xkb.model.as_deref().unwrap_or_default(),
        layout: xkb.layout.as_deref().unwrap_or_default(),
        variant: xkb.variant.as_deref().unwrap_or_default(),
        options: xkb.options.clone(),
    };

    match seat.add_keyboard(xkb_config, config.repeat_delay, config.repeat_rate) {
        Ok(keyboard) => Ok(keyboard),
        Err(err) => {
            tracing::warn!(?xkb, "Ignoring invalid keymap settings: {err}");
            seat.add_keyboard(XkbConfig::default(), config.repeat_delay, config.repeat_rate)
                .map_err(|err| CompositorError::Backend(format!("failed to add keyboard: {err}")))
        }
    }
}

pub fn init_wayland_listener(
    display: Display<Kristal>,
    loop_handle: &LoopHandle<'static, Kristal>,
) -> Result<OsString, CompositorError> {
    let listening_socket = ListeningSocketSource::new_auto()
        .map_err(|err| CompositorError::Backend(format!("failed to create socket: {err}")))?;
    let socket_name = listening_socket.socket_name().to_os_string();

    loop_handle
        .insert_source(listening_socket, move |client_stream, _, state| {
            if let Err(err) = state
                .display_handle
                .insert_client(client_stream, Arc::new(ClientState::default()))
            {
                tracing::warn!("failed to insert client: {err}");
            }
        })
        .map_err(|err| CompositorError::EventLoop(format!("failed to init wayland listener: {err}")))?;

    loop_handle
        .insert_source(
            Generic::new(display, Interest::READ, Mode::Level),
            move |_, display, state| {
                // Safety: we don't drop the display
                unsafe {
                    if let Err(err) = display.get_mut().dispatch_clients(state) {
                        tracing::warn!("failed to dispatch clients: {err}");
                    }
                }
                Ok(PostAction::Continue)
            },
        )
        .map_err(|err| {
            CompositorError::EventLoop(format!("failed to init display event source: {err}"))
        })?;

    tracing::info!(socket = ?socket_name, "listening on wayland socket");
    Ok(socket_name)
}

/// Reaps exited children so spawned commands never linger as zombies.
fn init_child_reaper(loop_handle: &LoopHandle<'static, Kristal>) -> Result<(), CompositorError> {
    let signals = Signals::new(&[Signal::SIGCHLD])
        .map_err(|err| CompositorError::EventLoop(format!("failed to watch SIGCHLD: {err}")))?;
    loop_handle
        .insert_source(signals, |_, _, _| loop {
            let mut status = 0;
            // SAFETY: plain waitpid on any child, never blocks.
            let pid = unsafe { libc::waitpid(-1, &mut status, libc::WNOHANG) };
            if pid <= 0 {
                break;
            }
            tracing::trace!(pid, status, "reaped child");
        })
        .map_err(|err| CompositorError::EventLoop(format!("failed to init SIGCHLD source: {err}")))?;
    Ok(())
}

/// The event loop blocks SIGCHLD; children must start with a clean mask.
fn unblock_signals() -> std::io::Result<()> {
    // SAFETY: sigset_t is plain data and is initialised by sigemptyset.
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        if libc::sigprocmask(libc::SIG_SETMASK, &set, std::ptr::null_mut()) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

#[derive(Default)]
pub struct ClientState {
    pub compositor_state: CompositorClientState,
}

impl ClientData for ClientState {
    fn initialized(&self, client_id: ClientId) {
        tracing::info!(?client_id, "wayland client initialized");
    }

    fn disconnected(&self, client_id: ClientId, reason: DisconnectReason) {
        tracing::info!(?client_id, ?reason, "wayland client disconnected");
    }
}

impl ViewSurface for Window {
    fn configure(&self, geometry: Rect) {
        if let Some(toplevel) = self.toplevel() {
            toplevel.with_pending_state(|state| {
                state.size = Some(geometry.size);
            });
            if toplevel.is_initial_configure_sent() {
                toplevel.send_pending_configure();
            }
        }

        #[cfg(feature = "xwayland")]
        if let Some(surface) = self.x11_surface()
            && let Err(err) = surface.configure(geometry)
        {
            tracing::warn!(window = surface.window_id(), "failed to configure X11 window: {err}");
        }
    }

    fn relocate(&self, _geometry: Rect) {
        #[cfg(feature = "xwayland")]
        if let Some(surface) = self.x11_surface()
            && let Err(err) = surface.configure(_geometry)
        {
            tracing::warn!(window = surface.window_id(), "failed to move X11 window: {err}");
        }
    }

    fn set_activated(&self, activated: bool) {
        if self.toplevel().is_some() {
            set_toplevel_state(self, xdg_toplevel::State::Activated, activated);
        }

        #[cfg(feature = "xwayland")]
        if let Some(surface) = self.x11_surface()
            && let Err(err) = surface.set_activated(activated)
        {
            tracing::warn!(window = surface.window_id(), "failed to activate X11 window: {err}");
        }
    }

    fn set_fullscreen(&self, fullscreen: bool) {
        if self.toplevel().is_some() {
            set_toplevel_state(self, xdg_toplevel::State::Fullscreen, fullscreen);
        }

        #[cfg(feature = "xwayland")]
        if let Some(surface) = self.x11_surface()
            && let Err(err) = surface.set_fullscreen(fullscreen)
        {
            tracing::warn!(window = surface.window_id(), "failed to fullscreen X11 window: {err}");
        }
    }

    fn set_maximized(&self, maximized: bool) {
        if self.toplevel().is_some() {
            set_toplevel_state(self, xdg_toplevel::State::Maximized, maximized);
        }

        #[cfg(feature = "xwayland")]
        if let Some(surface) = self.x11_surface()
            && let Err(err) = surface.set_maximized(maximized)
        {
            tracing::warn!(window = surface.window_id(), "failed to maximize X11 window: {err}");
        }
    }

    fn close(&self) {
        if let Some(toplevel) = self.toplevel() {
            toplevel.send_close();
        }

        #[cfg(feature = "xwayland")]
        if let Some(surface) = self.x11_surface()
            && let Err(err) = surface.close()
        {
            tracing::warn!(window = surface.window_id(), "failed to close X11 window: {err}");
        }
    }
}

fn set_toplevel_state(window: &Window, state: xdg_toplevel::State, enabled: bool) {
    let Some(toplevel) = window.toplevel() else {
        return;
    };
    let changed = toplevel.with_pending_state(|pending| {
        if enabled {
            pending.states.set(state)
        } else {
            pending.states.unset(state)
        }
    });
    if changed && toplevel.is_initial_configure_sent() {
        toplevel.send_pending_configure();
    }
}
