use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use smithay::{
    backend::{
        allocator::{
            Fourcc,
            gbm::{GbmAllocator, GbmBufferFlags, GbmDevice},
        },
        drm::{
            DrmDevice, DrmDeviceFd, DrmEvent, DrmEventMetadata, DrmEventTime, DrmNode, NodeType,
            compositor::{FrameFlags, PrimaryPlaneElement},
            exporter::gbm::GbmFramebufferExporter,
            output::{DrmOutput, DrmOutputManager, DrmOutputRenderElements},
        },
        egl::{EGLDevice, EGLDisplay},
        input::InputEvent,
        libinput::{LibinputInputBackend, LibinputSessionInterface},
        renderer::{
            ImportAll, ImportDma, ImportMem, ImportMemWl,
            element::{
                AsRenderElements, RenderElementStates, default_primary_scanout_output_compare,
                memory::MemoryRenderBuffer, surface::WaylandSurfaceRenderElement,
            },
            gles::GlesRenderer,
            multigpu::{GpuManager, MultiRenderer, gbm::GbmGlesBackend},
        },
        session::{Event as SessionEvent, Session, libseat::LibSeatSession},
        udev::{UdevBackend, UdevEvent, all_gpus, primary_gpu},
    },
    desktop::{
        layer_map_for_output,
        space::{SpaceRenderElements, space_render_elements},
        utils::{
            OutputPresentationFeedback, surface_presentation_feedback_flags_from_states,
            surface_primary_scanout_output, update_surface_primary_scanout_output,
        },
    },
    input::pointer::{CursorIcon, CursorImageAttributes, CursorImageStatus},
    output::{Mode as WlMode, Output, PhysicalProperties, Subpixel},
    reexports::{
        calloop::{
            EventLoop, LoopHandle, RegistrationToken,
            timer::{TimeoutAction, Timer},
        },
        drm::control::{Mode, ModeTypeFlags, connector, crtc},
        input::Libinput,
        rustix::fs::OFlags,
        wayland_protocols::wp::presentation_time::server::wp_presentation_feedback,
        wayland_server::{backend::GlobalId, protocol::wl_surface::WlSurface},
    },
    utils::{DeviceFd, IsAlive, Scale, Transform},
    wayland::{
        compositor,
        dmabuf::{DmabufFeedbackBuilder, DmabufState},
        drm_syncobj::{DrmSyncobjState, supports_syncobj_eventfd},
        presentation::Refresh,
    },
};
use smithay_drm_extras::{
    display_info,
    drm_scanner::{DrmScanEvent, DrmScanner},
};

use crate::{
    CompositorError, Kristal,
    cursor::{CursorThemeManager, PointerElement, PointerRenderElement},
    input::configure_libinput_device,
};

// Supported color formats for DRM output
const SUPPORTED_FORMATS: &[Fourcc] = &[Fourcc::Abgr8888, Fourcc::Argb8888];

const CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.1, 1.0];

// Type aliases for the renderer stack
type UdevRenderer<'a> = MultiRenderer<
    'a,
    'a,
    GbmGlesBackend<GlesRenderer, DrmDeviceFd>,
    GbmGlesBackend<GlesRenderer, DrmDeviceFd>,
>;

type GbmFbExporter = GbmFramebufferExporter<DrmDeviceFd>;

smithay::backend::renderer::element::render_elements! {
    pub UdevRenderElement<R, E> where R: ImportAll + ImportMem;
    Space=SpaceRenderElements<R, E>,
    Pointer=PointerRenderElement<R>,
}

/// Per-GPU device state
struct BackendData {
    surfaces: HashMap<crtc::Handle, SurfaceData>,
    drm_output_manager: DrmOutputManager<
        GbmAllocator<DrmDeviceFd>,
        GbmFbExporter,
        Option<OutputPresentationFeedback>,
        DrmDeviceFd,
    >,
    drm_scanner: DrmScanner,
    render_node: Option<DrmNode>,
    registration_token: RegistrationToken,
}

#[derive(Debug, Default)]
enum RedrawState {
    #[default]
    Idle,
    Queued,
    WaitingForVBlank { redraw_needed: bool },
    WaitingForEstimatedVBlank(RegistrationToken),
    WaitingForEstimatedVBlankAndQueued(RegistrationToken),
}

impl RedrawState {
    fn queue_redraw(self) -> Self {
        match self {
            RedrawState::Idle => RedrawState::Queued,
            RedrawState::WaitingForEstimatedVBlank(token) => {
                RedrawState::WaitingForEstimatedVBlankAndQueued(token)
            }
            value @ (RedrawState::Queued | RedrawState::WaitingForEstimatedVBlankAndQueued(_)) => {
                value
            }
            RedrawState::WaitingForVBlank { .. } => RedrawState::WaitingForVBlank {
                redraw_needed: true,
            },
        }
    }
}

/// Per-CRTC/output state
struct SurfaceData {
    output: Output,
    global: Option<GlobalId>,
    drm_output: DrmOutput<
        GbmAllocator<DrmDeviceFd>,
        GbmFbExporter,
        Option<OutputPresentationFeedback>,
        DrmDeviceFd,
    >,
    /// Connector modes, for switching through output configuration.
    modes: Vec<Mode>,
    redraw_state: RedrawState,
    frame_callback_sequence: u32,
}

impl Drop for SurfaceData {
    fn drop(&mut self) {
        self.output.leave_all();
    }
}

#[derive(Default)]
struct SurfaceFrameThrottlingState {
    last_sent_at: RefCell<Option<(Output, u32)>>,
}

/// DRM/udev backend data stored alongside the compositor state
pub struct UdevData {
    pub session: LibSeatSession,
    pub primary_gpu: DrmNode,
    pub gpus: GpuManager<GbmGlesBackend<GlesRenderer, DrmDeviceFd>>,
    cursor_theme: CursorThemeManager,
    pointer_images: Vec<(xcursor::parser::Image, MemoryRenderBuffer)>,
    backends: HashMap<DrmNode, BackendData>,
    queued_redraws: HashSet<(DrmNode, crtc::Handle)>,
}

/// Initialize the DRM/KMS backend
pub fn init_udev(event_loop: &mut EventLoop<Kristal>, state: &mut Kristal) -> crate::Result<()> {
    let (session, notifier) = LibSeatSession::new()
        .map_err(|e| CompositorError::Backend(format!("failed to create session: {e}")))?;

    let seat_name = session.seat();

    let primary_gpu = find_primary_gpu(&session)
        .ok_or_else(|| CompositorError::Backend("no GPU found".into()))?;
    tracing::info!(?primary_gpu, "Using primary GPU");

    let gpus = GpuManager::new(GbmGlesBackend::default())
        .map_err(|e| CompositorError::Backend(format!("failed to create GPU manager: {e}")))?;

    state.udev_data = Some(UdevData {
        session: session.clone(),
        primary_gpu,
        gpus,
        cursor_theme: CursorThemeManager::load(),
        pointer_images: Vec::new(),
        backends: HashMap::new(),
        queued_redraws: HashSet::new(),
    });

    let udev_backend = UdevBackend::new(&seat_name)
        .map_err(|e| CompositorError::Backend(format!("failed to create udev backend: {e}")))?;

    let loop_handle = state.loop_handle.clone();
    for (device_id, path) in udev_backend.device_list() {
        if let Ok(node) = DrmNode::from_dev_id(device_id)
            && let Err(e) = device_added(state, node, path, &loop_handle)
        {
            tracing::warn!(?node, "Failed to add device: {e}");
        }
    }

    setup_dmabuf(state)?;
    setup_syncobj(state);

    let mut libinput_context =
        Libinput::new_with_udev::<LibinputSessionInterface<LibSeatSession>>(session.clone().into());
    libinput_context
        .udev_assign_seat(&seat_name)
        .map_err(|_| CompositorError::Backend("failed to assign seat to libinput".into()))?;
    let libinput_backend = LibinputInputBackend::new(libinput_context.clone());

    event_loop
        .handle()
        .insert_source(libinput_backend, |mut event, _, state| {
            if let InputEvent::DeviceAdded { device } = &mut event {
                configure_libinput_device(device, &state.config.libinput);
            }
            state.handle_input_event(event);
        })
        .map_err(|e| CompositorError::Backend(format!("failed to insert libinput source: {e}")))?;

    event_loop
        .handle()
        .insert_source(notifier, move |event, _, state| {
            handle_session_event(state, event, &mut libinput_context);
        })
        .map_err(|e| CompositorError::Backend(format!("failed to insert session source: {e}")))?;

    event_loop
        .handle()
        .insert_source(udev_backend, move |event, _, state| match event {
            UdevEvent::Added { device_id, path } => {
                if let Ok(node) = DrmNode::from_dev_id(device_id) {
                    let loop_handle = state.loop_handle.clone();
                    match device_added(state, node, &path, &loop_handle) {
                        Ok(()) => setup_syncobj(state),
                        Err(e) => tracing::warn!(?node, "Failed to add device: {e}"),
                    }
                }
            }
            UdevEvent::Changed { device_id } => {
                if let Ok(node) = DrmNode::from_dev_id(device_id) {
                    device_changed(state, node);
                }
            }
            UdevEvent::Removed { device_id } => {
                if let Ok(node) = DrmNode::from_dev_id(device_id) {
                    device_removed(state, node);
                }
            }
        })
        .map_err(|e| CompositorError::Backend(format!("failed to insert udev source: {e}")))?;

    tracing::info!(socket = ?state.socket_name, "DRM/KMS backend initialized");
    Ok(())
}

/// Switches to virtual terminal `vt`. Only the DRM backend owns a session.
pub fn change_vt(state: &mut Kristal, vt: i32) {
    let Some(udev) = state.udev_data.as_mut() else {
        return;
    };
    tracing::info!(vt, "switching virtual terminal");
    if let Err(err) = udev.session.change_vt(vt) {
        tracing::warn!(vt, "failed to switch virtual terminal: {err}");
    }
}

/// Import buffers for a committed surface early, before the next render pass.
pub fn early_import(state: &mut Kristal, surface: &WlSurface) {
    let Some(udev) = state.udev_data.as_mut() else {
        return;
    };

    if let Err(err) = udev.gpus.early_import(udev.primary_gpu, surface) {
        tracing::debug!("early import failed: {err:?}");
    }
}

/// Queue all outputs for redraw on the next drain cycle.
pub fn queue_redraw_all(state: &mut Kristal) {
    let Some(udev) = state.udev_data.as_mut() else {
        return;
    };

    for (node, backend) in &mut udev.backends {
        for (crtc, surface) in &mut backend.surfaces {
            surface.redraw_state = std::mem::take(&mut surface.redraw_state).queue_redraw();
            udev.queued_redraws.insert((*node, *crtc));
        }
    }
}

/// Drain queued redraw requests and render each targeted output once.
pub fn drain_queued_redraws(state: &mut Kristal) {
    let queued = {
        let Some(udev) = state.udev_data.as_mut() else {
            return;
        };
        std::mem::take(&mut udev.queued_redraws)
    };

    for (node, crtc) in queued {
        render_surface(state, node, crtc);
    }
}

/// Switches the CRTC driving `output` to `mode`. Nested outputs cannot change mode.
pub fn change_mode(state: &mut Kristal, output: &Output, mode: WlMode) -> bool {
    let Some(udev) = state.udev_data.as_mut() else {
        return output.current_mode() == Some(mode);
    };
    let primary_gpu = udev.primary_gpu;
    let Some((render_node, node, crtc, surface)) =
        udev.backends.iter_mut().find_map(|(node, device)| {
            let render_node = device.render_node.unwrap_or(primary_gpu);
            device
                .surfaces
                .iter_mut()
                .find(|(_, surface)| &surface.output == output)
                .map(|(crtc, surface)| (render_node, *node, *crtc, surface))
        })
    else {
        return false;
    };
    let Some(drm_mode) = surface
        .modes
        .iter()
        .copied()
        .find(|candidate| WlMode::from(*candidate) == mode)
    else {
        tracing::warn!(output = %output.name(), ?mode, "mode not offered by connector");
        return false;
    };

    let mut renderer = match udev.gpus.single_renderer(&render_node) {
        Ok(renderer) => renderer,
        Err(err) => {
            tracing::error!("failed to get renderer for mode change: {err}");
            return false;
        }
    };
    let elements: DrmOutputRenderElements<
        UdevRenderer<'_>,
        SpaceRenderElements<UdevRenderer<'_>, WaylandSurfaceRenderElement<UdevRenderer<'_>>>,
    > = DrmOutputRenderElements::default();
    if let Err(err) = surface.drm_output.use_mode(drm_mode, &mut renderer, &elements) {
        tracing::warn!(output = %output.name(), ?mode, "failed to change mode: {err:?}");
        return false;
    }
    drop(renderer);

    output.change_current_state(Some(mode), None, None, None);
    surface.redraw_state = std::mem::take(&mut surface.redraw_state).queue_redraw();
    udev.queued_redraws.insert((node, crtc));
    tracing::info!(output = %output.name(), ?mode, "output mode changed");
    true
}

/// Find the primary GPU node
fn find_primary_gpu(session: &LibSeatSession) -> Option<DrmNode> {
    primary_gpu(session.seat())
        .ok()
        .flatten()
        .and_then(|path| DrmNode::from_path(path).ok())
        .and_then(|node| {
            node.node_with_type(NodeType::Render)
                .and_then(|n| n.ok())
                .or(Some(node))
        })
        .or_else(|| {
            all_gpus(session.seat()).ok().and_then(|gpus| {
                gpus.into_iter()
                    .find_map(|path| DrmNode::from_path(path).ok())
            })
        })
}

/// Set up DmabufState with default feedback from the primary GPU renderer
fn setup_dmabuf(state: &mut Kristal) -> crate::Result<()> {
    let Some(udev) = state.udev_data.as_mut() else {
        return Ok(());
    };
    let primary_gpu = udev.primary_gpu;

    let renderer = udev
        .gpus
        .single_renderer(&primary_gpu)
        .map_err(|e| CompositorError::Backend(format!("failed to get renderer: {e}")))?;

    state.shm_state.update_formats(renderer.shm_formats());

    let dmabuf_formats = renderer.dmabuf_formats();
    let default_feedback = DmabufFeedbackBuilder::new(primary_gpu.dev_id(), dmabuf_formats)
        .build()
        .map_err(|e| CompositorError::Backend(format!("failed to build dmabuf feedback: {e}")))?;

    let mut dmabuf_state = DmabufState::new();
    dmabuf_state
        .create_global_with_default_feedback::<Kristal>(&state.display_handle, &default_feedback);
    state.dmabuf_state = Some(dmabuf_state);

    Ok(())
}

/// Set up linux-drm-syncobj-v1 if the import device supports syncobj_eventfd.
fn setup_syncobj(state: &mut Kristal) {
    if state.syncobj_state.is_some() {
        return;
    }

    let import_device = {
        let Some(udev) = state.udev_data.as_ref() else {
            return;
        };

        // Prefer the primary node backend when available.
        let primary_node = udev
            .primary_gpu
            .node_with_type(NodeType::Primary)
            .and_then(|node| node.ok())
            .unwrap_or(udev.primary_gpu);

        udev.backends
            .get(&primary_node)
            .or_else(|| udev.backends.get(&udev.primary_gpu))
            .map(|backend| backend.drm_output_manager.device().device_fd().clone())
    };

    let Some(import_device) = import_device else {
        return;
    };

    if supports_syncobj_eventfd(&import_device) {
        let syncobj_state = DrmSyncobjState::new::<Kristal>(&state.display_handle, import_device);
        state.syncobj_state = Some(syncobj_state);
        tracing::info!("enabled linux-drm-syncobj protocol");
    } else {
        tracing::info!("linux-drm-syncobj unsupported by DRM import device");
    }
}

/// Handle a new DRM device being added
fn device_added(
    state: &mut Kristal,
    node: DrmNode,
    path: &Path,
    handle: &LoopHandle<'static, Kristal>,
) -> crate::Result<()> {
    let Some(udev) = state.udev_data.as_mut() else {
        return Ok(());
    };

    let fd = udev
        .session
        .open(
            path,
            OFlags::RDWR | OFlags::CLOEXEC | OFlags::NOCTTY | OFlags::NONBLOCK,
        )
        .map_err(|e| CompositorError::Backend(format!("failed to open DRM device: {e}")))?;
    let fd = DrmDeviceFd::new(DeviceFd::from(fd));

    let (drm, notifier) = DrmDevice::new(fd.clone(), true)
        .map_err(|e| CompositorError::Backend(format!("failed to create DRM device: {e}")))?;
    let gbm = GbmDevice::new(fd)
        .map_err(|e| CompositorError::Backend(format!("failed to create GBM device: {e}")))?;

    let registration_token = handle
        .insert_source(notifier, move |event, metadata, state| match event {
            DrmEvent::VBlank(crtc) => frame_finish(state, node, crtc, metadata),
            DrmEvent::Error(error) => tracing::error!(?error, "DRM error"),
        })
        .map_err(|e| CompositorError::Backend(format!("failed to insert DRM notifier: {e}")))?;

    // Try to get the render node via EGL
    let render_node = match unsafe { EGLDisplay::new(gbm.clone()) } {
        Ok(display) => {
            let rn = EGLDevice::device_for_display(&display)
                .ok()
                .and_then(|dev| dev.try_get_render_node().ok().flatten())
                .unwrap_or(node);
            match udev.gpus.as_mut().add_node(rn, gbm.clone()) {
                Ok(()) => Some(rn),
                Err(e) => {
                    tracing::warn!("Failed to add GPU node: {e}");
                    None
                }
            }
        }
        Err(e) => {
            tracing::warn!("Failed to create EGL display: {e}");
            None
        }
    };

    let allocator = GbmAllocator::new(
        gbm.clone(),
        GbmBufferFlags::RENDERING | GbmBufferFlags::SCANOUT,
    );
    let framebuffer_exporter = GbmFramebufferExporter::new(gbm.clone(), render_node.into());

    let render_formats = render_node
        .and_then(|rn| udev.gpus.single_renderer(&rn).ok())
        .map(|renderer| {
            renderer
                .as_ref()
                .egl_context()
                .dmabuf_render_formats()
                .clone()
        })
        .unwrap_or_default();

    let drm_output_manager = DrmOutputManager::new(
        drm,
        allocator,
        framebuffer_exporter,
        Some(gbm),
        SUPPORTED_FORMATS.iter().copied(),
        render_formats,
    );

    udev.backends.insert(
        node,
        BackendData {
            registration_token,
            drm_output_manager,
            drm_scanner: DrmScanner::new(),
            render_node,
            surfaces: HashMap::new(),
        },
    );

    device_changed(state, node);

    tracing::info!(?node, ?render_node, "DRM device added");
    Ok(())
}

/// Handle DRM device changes (connector hotplug)
fn device_changed(state: &mut Kristal, node: DrmNode) {
    let Some(device) = state
        .udev_data
        .as_mut()
        .and_then(|udev| udev.backends.get_mut(&node))
    else {
        return;
    };

    let scan_result = match device
        .drm_scanner
        .scan_connectors(device.drm_output_manager.device())
    {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(?node, "Failed to scan connectors: {e}");
            return;
        }
    };

    for event in scan_result {
        match event {
            DrmScanEvent::Connected {
                connector,
                crtc: Some(crtc),
            } => connector_connected(state, node, connector, crtc),
            DrmScanEvent::Disconnected {
                connector: _,
                crtc: Some(crtc),
            } => connector_disconnected(state, node, crtc),
            _ => {}
        }
    }
}

/// Handle a connector being connected
fn connector_connected(
    state: &mut Kristal,
    node: DrmNode,
    connector: connector::Info,
    crtc: crtc::Handle,
) {
    let output_name = format!(
        "{}-{}",
        connector.interface().as_str(),
        connector.interface_id()
    );

    let Some(mode_idx) = preferred_mode_index(connector.modes()) else {
        tracing::warn!(output = %output_name, "connector has no modes");
        return;
    };
    let drm_mode = connector.modes()[mode_idx];
    let wl_mode = WlMode::from(drm_mode);

    let plan = state.output_layout.add(&output_name, wl_mode.size);
    let enable = plan.enabled || state.space.outputs().next().is_none();
    if !plan.enabled {
        if enable {
            tracing::warn!(
                output = %output_name,
                "output is disabled, but no other outputs are active; keeping it enabled"
            );
        } else {
            tracing::info!(output = %output_name, "output is disabled; leaving it unmapped");
        }
    }

    let Some(udev) = state.udev_data.as_mut() else {
        return;
    };
    let Some(device) = udev.backends.get_mut(&node) else {
        return;
    };
    let render_node = device.render_node.unwrap_or(udev.primary_gpu);

    let display_info =
        display_info::for_connector(device.drm_output_manager.device(), connector.handle());
    let make = display_info
        .as_ref()
        .and_then(|info| info.make())
        .unwrap_or_else(|| "Unknown".into());
    let model = display_info
        .as_ref()
        .and_then(|info| info.model())
        .unwrap_or_else(|| "Unknown".into());
    let serial_number = display_info
        .as_ref()
        .and_then(|info| info.serial())
        .unwrap_or_else(|| "Unknown".into());

    tracing::info!(output = %output_name, %make, %model, %serial_number, "Connector connected");

    let phys_size = connector.size().unwrap_or((0, 0));
    let output = Output::new(
        output_name.clone(),
        PhysicalProperties {
            size: (phys_size.0 as i32, phys_size.1 as i32).into(),
            subpixel: Subpixel::Unknown,
            make,
            model,
            serial_number,
        },
    );
    let global = output.create_global::<Kristal>(&state.display_handle);
    for mode in connector.modes() {
        output.add_mode(WlMode::from(*mode));
    }
    output.set_preferred(wl_mode);
    output.change_current_state(Some(wl_mode), None, None, None);

    let mut renderer = match udev.gpus.single_renderer(&render_node) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Failed to get renderer for connector: {e}");
            state.display_handle.remove_global::<Kristal>(global);
            return;
        }
    };

    let drm_output = match device.drm_output_manager.lock().initialize_output::<
        _,
        SpaceRenderElements<UdevRenderer<'_>, WaylandSurfaceRenderElement<UdevRenderer<'_>>>,
    >(
        crtc,
        drm_mode,
        &[connector.handle()],
        &output,
        None,
        &mut renderer,
        &DrmOutputRenderElements::default(),
    ) {
        Ok(output) => output,
        Err(e) => {
            tracing::error!("Failed to initialize DRM output: {e:?}");
            drop(renderer);
            state.display_handle.remove_global::<Kristal>(global);
            return;
        }
    };
    drop(renderer);

    device.surfaces.insert(
        crtc,
        SurfaceData {
            output: output.clone(),
            global: Some(global),
            drm_output,
            modes: connector.modes().to_vec(),
            redraw_state: RedrawState::Queued,
            frame_callback_sequence: 0,
        },
    );

    if !enable {
        state.add_disabled_output(&output);
        return;
    }
    state.map_output(&output, &plan);

    tracing::info!(
        ?crtc,
        output = %output_name,
        mode = ?wl_mode,
        transform = ?plan.transform,
        scale = plan.scale,
        position_x = plan.position.x,
        position_y = plan.position.y,
        "Output initialized"
    );

    state.loop_handle.insert_idle(move |state| {
        render_surface(state, node, crtc);
    });
}

fn preferred_mode_index(modes: &[Mode]) -> Option<usize> {
    if modes.is_empty() {
        return None;
    }
    Some(
        modes
            .iter()
            .position(|mode| mode.mode_type().contains(ModeTypeFlags::PREFERRED))
            .unwrap_or(0),
    )
}

/// Handle a connector being disconnected
fn connector_disconnected(state: &mut Kristal, node: DrmNode, crtc: crtc::Handle) {
    let Some(mut surface_data) = state
        .udev_data
        .as_mut()
        .and_then(|udev| udev.backends.get_mut(&node))
        .and_then(|device| device.surfaces.remove(&crtc))
    else {
        return;
    };

    if let Some(global) = surface_data.global.take() {
        state.display_handle.remove_global::<Kristal>(global);
    }
    state.unmap_output(&surface_data.output);
    tracing::info!(?crtc, output = %surface_data.output.name(), "Connector disconnected, output removed");
}

/// Handle a DRM device being removed
fn device_removed(state: &mut Kristal, node: DrmNode) {
    let Some(device) = state
        .udev_data
        .as_mut()
        .and_then(|udev| udev.backends.remove(&node))
    else {
        return;
    };

    for (_crtc, mut surface_data) in device.surfaces {
        if let Some(global) = surface_data.global.take() {
            state.display_handle.remove_global::<Kristal>(global);
        }
        state.unmap_output(&surface_data.output);
    }
    state.loop_handle.remove(device.registration_token);
    tracing::info!(?node, "DRM device removed");
}

fn cursor_icon(status: &CursorImageStatus) -> CursorIcon {
    match status {
        CursorImageStatus::Named(icon) => *icon,
        _ => CursorIcon::Default,
    }
}

/// Render a surface for the given device and CRTC
fn render_surface(state: &mut Kristal, node: DrmNode, crtc: crtc::Handle) {
    let loop_handle = state.loop_handle.clone();

    let Some(udev) = state.udev_data.as_mut() else {
        return;
    };
    let Some(device) = udev.backends.get_mut(&node) else {
        return;
    };
    let Some(surface_data) = device.surfaces.get_mut(&crtc) else {
        return;
    };
    match std::mem::take(&mut surface_data.redraw_state) {
        RedrawState::Queued => {}
        RedrawState::WaitingForEstimatedVBlankAndQueued(token) => {
            loop_handle.remove(token);
        }
        other => {
            surface_data.redraw_state = other;
            return;
        }
    }
    let output = surface_data.output.clone();
    if state.space.output_geometry(&output).is_none() {
        // Disabled through output configuration.
        return;
    }

    let render_node = device.render_node.unwrap_or(udev.primary_gpu);
    let cursor_frame = udev.cursor_theme.image(
        cursor_icon(&state.cursor_status),
        output.current_scale().integer_scale().max(1) as u32,
        state.clock.now().into(),
    );
    let theme_hotspot = (cursor_frame.xhot as i32, cursor_frame.yhot as i32);
    let pointer_image = udev
        .pointer_images
        .iter()
        .find_map(|(image, buffer)| (image == &cursor_frame).then(|| buffer.clone()))
        .unwrap_or_else(|| {
            let buffer = MemoryRenderBuffer::from_slice(
                &cursor_frame.pixels_rgba,
                Fourcc::Argb8888,
                (cursor_frame.width as i32, cursor_frame.height as i32),
                1,
                Transform::Normal,
                None,
            );
            udev.pointer_images.push((cursor_frame, buffer.clone()));
            buffer
        });

    let mut renderer = match udev.gpus.single_renderer(&render_node) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Failed to get renderer: {e}");
            return;
        }
    };

    // Render order is front-to-back, so cursor elements must come first.
    let mut elements: Vec<
        UdevRenderElement<UdevRenderer<'_>, WaylandSurfaceRenderElement<UdevRenderer<'_>>>,
    > = Vec::new();

    if let Some(output_geo) = state.space.output_geometry(&output)
        && output_geo.to_f64().contains(state.pointer_location)
    {
        if let CursorImageStatus::Surface(ref surface) = state.cursor_status
            && !surface.alive()
        {
            state.cursor_status = CursorImageStatus::default_named();
        }

        let cursor_hotspot = if let CursorImageStatus::Surface(ref surface) = state.cursor_status {
            compositor::with_states(surface, |states| {
                states
                    .data_map
                    .get::<Mutex<CursorImageAttributes>>()
                    .and_then(|attrs| attrs.lock().ok().map(|attrs| attrs.hotspot))
                    .unwrap_or_default()
            })
        } else {
            theme_hotspot.into()
        };

        let scale = Scale::from(output.current_scale().fractional_scale());
        let cursor_pos = state.pointer_location - output_geo.loc.to_f64();

        let mut pointer_element = PointerElement::default();
        pointer_element.set_buffer(pointer_image);
        pointer_element.set_status(state.cursor_status.clone());

        let pointer_elements: Vec<PointerRenderElement<UdevRenderer<'_>>> = pointer_element
            .render_elements(
                &mut renderer,
                (cursor_pos - cursor_hotspot.to_f64())
                    .to_physical(scale)
                    .to_i32_round(),
                scale,
                1.0,
            );
        elements.extend(pointer_elements.into_iter().map(UdevRenderElement::from));
    }

    match space_render_elements(&mut renderer, [&state.space], &output, 1.0) {
        Ok(space_elements) => {
            elements.extend(space_elements.into_iter().map(UdevRenderElement::from));
        }
        Err(e) => tracing::warn!("Failed to collect render elements: {e:?}"),
    }

    let render_result = surface_data.drm_output.render_frame(
        &mut renderer,
        &elements,
        CLEAR_COLOR,
        FrameFlags::DEFAULT,
    );

    let result = match render_result {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Failed to render frame: {e:?}");
            surface_data.redraw_state = RedrawState::Queued;
            return;
        }
    };

    if result.needs_sync()
        && let PrimaryPlaneElement::Swapchain(ref element) = result.primary_element
        && let Err(err) = element.sync.wait()
    {
        tracing::warn!("error waiting for frame completion: {err:?}");
    }

    if result.is_empty {
        // No frame was submitted to KMS; emulate vblank timing for callbacks.
        drop(result);
        let frame_duration = output_refresh_interval(&output)
            .unwrap_or_else(|| Duration::from_micros(16_667));
        let token = loop_handle
            .insert_source(Timer::from_duration(frame_duration), move |_, _, state| {
                on_estimated_vblank_timer(state, node, crtc);
                TimeoutAction::Drop
            })
            .ok();
        surface_data.redraw_state = match token {
            Some(token) => RedrawState::WaitingForEstimatedVBlank(token),
            None => RedrawState::Idle,
        };
        return;
    }

    let render_element_states = result.states.clone();
    drop(result);
    drop(renderer);

    update_primary_scanout_output_for_output(state, &output, &render_element_states);
    let feedback = take_presentation_feedback_for_output(state, &output, &render_element_states);

    let Some(surface_data) = state
        .udev_data
        .as_mut()
        .and_then(|udev| udev.backends.get_mut(&node))
        .and_then(|device| device.surfaces.get_mut(&crtc))
    else {
        return;
    };

    match surface_data.drm_output.queue_frame(Some(feedback)) {
        Ok(()) => {
            surface_data.redraw_state = RedrawState::WaitingForVBlank {
                redraw_needed: false,
            };
            surface_data.frame_callback_sequence =
                surface_data.frame_callback_sequence.wrapping_add(1);
            let sequence = surface_data.frame_callback_sequence;
            send_frame_callbacks_for_output(state, &output, sequence);
        }
        Err(err) => {
            tracing::error!("Failed to queue frame: {err:?}");
            surface_data.redraw_state = RedrawState::Queued;
        }
    }
}

fn send_frame_callbacks_for_output(
    state: &mut Kristal,
    output: &Output,
    frame_callback_sequence: u32,
) {
    let should_send = |surface: &WlSurface, states: &compositor::SurfaceData| {
        if surface_primary_scanout_output(surface, states).as_ref() != Some(output) {
            return None;
        }

        let frame_throttling_state = states
            .data_map
            .get_or_insert(SurfaceFrameThrottlingState::default);
        let mut last_sent_at = frame_throttling_state.last_sent_at.borrow_mut();

        if let Some((last_output, last_sequence)) = &*last_sent_at
            && last_output == output
            && *last_sequence == frame_callback_sequence
        {
            return None;
        }

        *last_sent_at = Some((output.clone(), frame_callback_sequence));
        Some(output.clone())
    };

    let elapsed = state.start_time.elapsed();
    for window in state.space.elements() {
        if state.space.outputs_for_element(window).contains(output) {
            window.send_frame(output, elapsed, Some(Duration::ZERO), should_send);
        }
    }

    let layer_map = layer_map_for_output(output);
    for layer in layer_map.layers() {
        layer.send_frame(output, elapsed, Some(Duration::ZERO), should_send);
    }
}

fn take_presentation_feedback_for_output(
    state: &Kristal,
    output: &Output,
    render_element_states: &RenderElementStates,
) -> OutputPresentationFeedback {
    let mut output_presentation_feedback = OutputPresentationFeedback::new(output);

    for window in state.space.elements() {
        if state.space.outputs_for_element(window).contains(output) {
            window.take_presentation_feedback(
                &mut output_presentation_feedback,
                surface_primary_scanout_output,
                |surface, _| {
                    surface_presentation_feedback_flags_from_states(surface, render_element_states)
                },
            );
        }
    }

    let layer_map = layer_map_for_output(output);
    for layer in layer_map.layers() {
        layer.take_presentation_feedback(
            &mut output_presentation_feedback,
            surface_primary_scanout_output,
            |surface, _| {
                surface_presentation_feedback_flags_from_states(surface, render_element_states)
            },
        );
    }

    output_presentation_feedback
}

fn update_primary_scanout_output_for_output(
    state: &Kristal,
    output: &Output,
    render_element_states: &RenderElementStates,
) {
    for window in state.space.elements() {
        window.with_surfaces(|surface, states| {
            update_surface_primary_scanout_output(
                surface,
                output,
                states,
                render_element_states,
                default_primary_scanout_output_compare,
            );
        });
    }

    let layer_map = layer_map_for_output(output);
    for layer in layer_map.layers() {
        layer.with_surfaces(|surface, states| {
            update_surface_primary_scanout_output(
                surface,
                output,
                states,
                render_element_states,
                default_primary_scanout_output_compare,
            );
        });
    }
}

fn on_estimated_vblank_timer(state: &mut Kristal, node: DrmNode, crtc: crtc::Handle) {
    let Some(surface) = state
        .udev_data
        .as_mut()
        .and_then(|udev| udev.backends.get_mut(&node))
        .and_then(|device| device.surfaces.get_mut(&crtc))
    else {
        return;
    };

    surface.frame_callback_sequence = surface.frame_callback_sequence.wrapping_add(1);
    match std::mem::take(&mut surface.redraw_state) {
        RedrawState::WaitingForEstimatedVBlank(_) => {
            surface.redraw_state = RedrawState::Idle;
        }
        RedrawState::WaitingForEstimatedVBlankAndQueued(_) => {
            surface.redraw_state = RedrawState::Queued;
            state.loop_handle.insert_idle(move |state| {
                render_surface(state, node, crtc);
            });
            return;
        }
        other => {
            surface.redraw_state = other;
            return;
        }
    }

    let output = surface.output.clone();
    let sequence = surface.frame_callback_sequence;
    send_frame_callbacks_for_output(state, &output, sequence);
}

fn output_refresh_interval(output: &Output) -> Option<Duration> {
    output
        .current_mode()
        .filter(|mode| mode.refresh > 0)
        .map(|mode| Duration::from_secs_f64(1_000f64 / mode.refresh as f64))
}

/// Handle VBlank event (frame completion)
fn frame_finish(
    state: &mut Kristal,
    node: DrmNode,
    crtc: crtc::Handle,
    metadata: &mut Option<DrmEventMetadata>,
) {
    let now = state.clock.now();
    let Some(surface) = state
        .udev_data
        .as_mut()
        .and_then(|udev| udev.backends.get_mut(&node))
        .and_then(|device| device.surfaces.get_mut(&crtc))
    else {
        return;
    };

    let frame_duration =
        output_refresh_interval(&surface.output).unwrap_or_else(|| Duration::from_micros(16_667));
    let seq = metadata.as_ref().map(|meta| meta.sequence as u64).unwrap_or(0);
    let tp = metadata.as_ref().and_then(|meta| match meta.time {
        DrmEventTime::Monotonic(tp) if !tp.is_zero() => Some(tp),
        _ => None,
    });
    let (clock, flags) = match tp {
        Some(tp) => (
            tp.into(),
            wp_presentation_feedback::Kind::Vsync
                | wp_presentation_feedback::Kind::HwClock
                | wp_presentation_feedback::Kind::HwCompletion,
        ),
        None => (now, wp_presentation_feedback::Kind::Vsync),
    };

    match surface.drm_output.frame_submitted() {
        Ok(user_data) => {
            if let Some(mut output_feedback) = user_data.flatten() {
                output_feedback.presented(clock, Refresh::fixed(frame_duration), seq, flags);
            }
        }
        Err(e) => {
            tracing::error!("frame_submitted error: {e:?}");
            return;
        }
    }

    let redraw_needed = match std::mem::take(&mut surface.redraw_state) {
        RedrawState::WaitingForVBlank { redraw_needed } => redraw_needed,
        other => {
            tracing::warn!("unexpected redraw state at vblank: {other:?}");
            true
        }
    };
    if redraw_needed {
        surface.redraw_state = RedrawState::Queued;
        state.loop_handle.insert_idle(move |state| {
            render_surface(state, node, crtc);
        });
        return;
    }

    surface.redraw_state = RedrawState::Idle;
}

/// Handle session events (TTY switch)
fn handle_session_event(state: &mut Kristal, event: SessionEvent, libinput_context: &mut Libinput) {
    let Some(udev) = state.udev_data.as_mut() else {
        return;
    };

    match event {
        SessionEvent::PauseSession => {
            tracing::info!("Session paused (TTY switch away)");
            libinput_context.suspend();
            for backend in udev.backends.values_mut() {
                backend.drm_output_manager.pause();
            }
        }
        SessionEvent::ActivateSession => {
            tracing::info!("Session activated (TTY switch back)");
            if let Err(e) = libinput_context.resume() {
                tracing::error!("Failed to resume libinput: {e:?}");
            }

            for (node, backend) in udev.backends.iter_mut() {
                if let Err(e) = backend.drm_output_manager.lock().activate(false) {
                    tracing::error!(?node, "Failed to activate DRM backend: {e}");
                }
                for surface in backend.surfaces.values_mut() {
                    surface.redraw_state = RedrawState::Queued;
                }
            }

            let targets: Vec<(DrmNode, crtc::Handle)> = udev
                .backends
                .iter()
                .flat_map(|(node, backend)| backend.surfaces.keys().map(|crtc| (*node, *crtc)))
                .collect();
            for (node, crtc) in targets {
                state.loop_handle.insert_idle(move |state| {
                    render_surface(state, node, crtc);
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_redraw_waits_for_vblank() {
        assert!(matches!(RedrawState::Idle.queue_redraw(), RedrawState::Queued));
        assert!(matches!(
            RedrawState::WaitingForVBlank {
                redraw_needed: false
            }
            .queue_redraw(),
            RedrawState::WaitingForVBlank {
                redraw_needed: true
            }
        ));
        assert!(matches!(RedrawState::Queued.queue_redraw(), RedrawState::Queued));
    }
}
