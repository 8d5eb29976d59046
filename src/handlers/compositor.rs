use std::sync::OnceLock;

use smithay::{
    backend::renderer::utils::{on_commit_buffer_handler, with_renderer_surface_state},
    delegate_compositor, delegate_shm,
    desktop::Window,
    output::Output,
    reexports::{
        calloop::Interest,
        wayland_protocols::xdg::shell::server::xdg_toplevel,
        wayland_server::{
            Client, Resource,
            protocol::{wl_buffer, wl_surface::WlSurface},
        },
    },
    wayland::{
        buffer::BufferHandler,
        compositor::{
            BufferAssignment, CompositorClientState, CompositorHandler, CompositorState,
            SurfaceAttributes, add_blocker, add_pre_commit_hook, get_parent, is_sync_subsurface,
            with_states,
        },
        dmabuf::get_dmabuf,
        drm_syncobj::DrmSyncobjCachedState,
        seat::WaylandFocus,
        shell::xdg::XdgToplevelSurfaceData,
        shm::{ShmHandler, ShmState},
    },
};
#[cfg(feature = "xwayland")]
use smithay::xwayland::{X11Wm, XWaylandClientData};

use crate::{
    Kristal,
    desktop::MapRequest,
    handlers::{layer_shell, xdg_shell},
    state::ClientState,
    view::{ViewId, ViewKind},
};

impl CompositorHandler for Kristal {
    fn compositor_state(&mut self) -> &mut CompositorState {
        &mut self.compositor_state
    }

    fn client_compositor_state<'a>(&self, client: &'a Client) -> &'a CompositorClientState {
        if let Some(state) = client.get_data::<ClientState>() {
            return &state.compositor_state;
        }
        #[cfg(feature = "xwayland")]
        if let Some(state) = client.get_data::<XWaylandClientData>() {
            return &state.compositor_state;
        }
        static FALLBACK: OnceLock<CompositorClientState> = OnceLock::new();
        FALLBACK.get_or_init(CompositorClientState::default)
    }

    fn new_surface(&mut self, surface: &WlSurface) {
        add_pre_commit_hook::<Self, _>(surface, move |state, _dh, surface| {
            let mut acquire_point = None;
            let maybe_dmabuf = with_states(surface, |surface_data| {
                acquire_point.clone_from(
                    &surface_data
                        .cached_state
                        .get::<DrmSyncobjCachedState>()
                        .pending()
                        .acquire_point,
                );
                surface_data
                    .cached_state
                    .get::<SurfaceAttributes>()
                    .pending()
                    .buffer
                    .as_ref()
                    .and_then(|assignment| match assignment {
                        BufferAssignment::NewBuffer(buffer) => get_dmabuf(buffer).cloned().ok(),
                        _ => None,
                    })
            });

            let Some(dmabuf) = maybe_dmabuf else {
                return;
            };

            if let Some(acquire_point) = acquire_point
                && let Ok((blocker, source)) = acquire_point.generate_blocker()
                && let Some(client) = surface.client()
            {
                let res = state.loop_handle.insert_source(source, move |_, _, data| {
                    let dh = data.display_handle.clone();
                    data.client_compositor_state(&client)
                        .blocker_cleared(data, &dh);
                    Ok(())
                });
                if res.is_ok() {
                    add_blocker(surface, blocker);
                    return;
                }
            }

            if let Ok((blocker, source)) = dmabuf.generate_blocker(Interest::READ)
                && let Some(client) = surface.client()
            {
                let res = state.loop_handle.insert_source(source, move |_, _, data| {
                    let dh = data.display_handle.clone();
                    data.client_compositor_state(&client)
                        .blocker_cleared(data, &dh);
                    Ok(())
                });
                if res.is_ok() {
                    add_blocker(surface, blocker);
                }
            }
        });
    }

    fn commit(&mut self, surface: &WlSurface) {
        #[cfg(feature = "xwayland")]
        X11Wm::commit_hook::<Self>(surface);

        on_commit_buffer_handler::<Self>(surface);

        // Pre-import the buffer on the primary GPU right away so the render
        // path does not block on it.
        crate::backend::udev::early_import(self, surface);

        if !is_sync_subsurface(surface) {
            let mut root = surface.clone();
            while let Some(parent) = get_parent(&root) {
                root = parent;
            }

            if let Some(id) = self.view_for_surface(&root) {
                if let Some(view) = self.desktop.view(id) {
                    view.raw_surface().on_commit();
                }
                if root == *surface {
                    self.commit_view(id);
                }
            }
        }

        xdg_shell::handle_commit(&mut self.popups, surface);

        if let Some(layer_focus) = layer_shell::handle_commit(
            &self.space,
            self.pointer_location,
            self.keyboard.current_focus().as_ref(),
            surface,
        ) {
            self.set_keyboard_focus(Some(layer_focus));
        }

        self.refresh_desktop();
    }
}

impl Kristal {
    /// Root surface commit of a view: first configure, map, unmap or a new size.
    fn commit_view(&mut self, id: ViewId) {
        let Some(view) = self.desktop.view(id) else {
            return;
        };
        let window = view.raw_surface().clone();
        let (kind, mapped) = (view.kind(), view.mapped);

        if let Some(toplevel) = window.toplevel()
            && !toplevel.is_initial_configure_sent()
        {
            toplevel.send_configure();
            return;
        }

        let has_buffer = window
            .wl_surface()
            .is_some_and(|surface| surface_has_buffer(&surface));
        let size = window.geometry().size;

        match (kind, mapped, has_buffer) {
            (ViewKind::Native, false, true) => {
                self.desktop.commit(id, size.w, size.h);
                self.desktop.map_view(id, map_request(&window));
            }
            (ViewKind::Native, true, false) => {
                self.desktop.unmap_view(id);
            }
            (_, true, true) => self.desktop.commit(id, size.w, size.h),
            _ => {}
        }
    }
}

fn surface_has_buffer(surface: &WlSurface) -> bool {
    with_renderer_surface_state(surface, |state| state.buffer().is_some()).unwrap_or(false)
}

/// Collects what an xdg toplevel asked for before its first buffer.
fn map_request(window: &Window) -> MapRequest {
    let Some(toplevel) = window.toplevel() else {
        return MapRequest::default();
    };

    let (title, app_id) = with_states(toplevel.wl_surface(), |states| {
        states
            .data_map
            .get::<XdgToplevelSurfaceData>()
            .and_then(|data| data.lock().ok())
            .map(|role| {
                (
                    role.title.clone().unwrap_or_default(),
                    role.app_id.clone().unwrap_or_default(),
                )
            })
            .unwrap_or_default()
    });

    let (fullscreen, maximized, fullscreen_output) = toplevel.with_pending_state(|state| {
        (
            state.states.contains(xdg_toplevel::State::Fullscreen),
            state.states.contains(xdg_toplevel::State::Maximized),
            state.fullscreen_output.clone(),
        )
    });

    MapRequest {
        title,
        app_id,
        fullscreen,
        maximized,
        output: fullscreen_output
            .as_ref()
            .and_then(Output::from_resource)
            .map(|output| output.name()),
    }
}

impl BufferHandler for Kristal {
    fn buffer_destroyed(&mut self, _buffer: &wl_buffer::WlBuffer) {}
}

impl ShmHandler for Kristal {
    fn shm_state(&self) -> &ShmState {
        &self.shm_state
    }
}

delegate_shm!(Kristal);
delegate_compositor!(Kristal);
