use std::time::Duration;

use smithay::{
    backend::{
        renderer::{
            damage::OutputDamageTracker, element::surface::WaylandSurfaceRenderElement,
            gles::GlesRenderer,
        },
        winit::{self, WinitEvent, WinitGraphicsBackend},
    },
    desktop::{layer_map_for_output, space::render_output},
    output::{Mode, Output, PhysicalProperties, Subpixel},
    reexports::calloop::EventLoop,
    utils::Transform,
};

use crate::{CompositorError, Kristal};

const OUTPUT_NAME: &str = "winit";
const REFRESH: i32 = 60_000;
const CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.1, 1.0];

/// Runs the compositor inside a window on an existing session.
pub fn init_winit(event_loop: &mut EventLoop<Kristal>, state: &mut Kristal) -> crate::Result<()> {
    let (mut backend, winit_evt): (WinitGraphicsBackend<GlesRenderer>, _) = winit::init()
        .map_err(|e| CompositorError::Backend(format!("failed to init winit: {e:?}")))?;

    let output = Output::new(
        OUTPUT_NAME.to_string(),
        PhysicalProperties {
            size: (0, 0).into(),
            subpixel: Subpixel::Unknown,
            make: "Kristal".into(),
            model: "Winit".into(),
            serial_number: "Unknown".into(),
        },
    );
    let mode = Mode {
        size: backend.window_size(),
        refresh: REFRESH,
    };
    let _global = output.create_global::<Kristal>(&state.display_handle);
    output.set_preferred(mode);
    output.change_current_state(Some(mode), None, None, None);

    let mut plan = state.output_layout.add(OUTPUT_NAME, mode.size);
    // The GL framebuffer is upside down relative to the window.
    plan.transform = Transform::Flipped180;
    state.map_output(&output, &plan);

    let mut damage_tracker = OutputDamageTracker::from_output(&output);

    event_loop
        .handle()
        .insert_source(winit_evt, move |event, _, state| match event {
            WinitEvent::Resized { size, .. } => {
                let mode = Mode {
                    size,
                    refresh: REFRESH,
                };
                output.change_current_state(Some(mode), None, None, None);
                output.set_preferred(mode);
                state.output_layout.remove(OUTPUT_NAME);
                let mut plan = state.output_layout.add(OUTPUT_NAME, size);
                plan.transform = Transform::Flipped180;
                state.map_output(&output, &plan);
                tracing::debug!(?size, "winit window resized");
            }
            WinitEvent::CloseRequested => {
                tracing::info!("winit window closed");
                state.loop_signal.stop();
            }
            WinitEvent::Input(event) => state.handle_input_event(event),
            WinitEvent::Redraw => {
                render(state, &mut backend, &output, &mut damage_tracker);
                backend.window().request_redraw();
            }
            _ => {}
        })
        .map_err(|e| CompositorError::Backend(format!("failed to insert winit source: {e}")))?;

    tracing::info!(socket = ?state.socket_name, "winit backend initialized");
    Ok(())
}

fn render(
    state: &mut Kristal,
    backend: &mut WinitGraphicsBackend<GlesRenderer>,
    output: &Output,
    damage_tracker: &mut OutputDamageTracker,
) {
    let age = backend.buffer_age().unwrap_or(0);
    let rendered = match backend.bind() {
        Ok((renderer, mut framebuffer)) => {
            match render_output::<_, WaylandSurfaceRenderElement<GlesRenderer>, _, _>(
                output,
                renderer,
                &mut framebuffer,
                1.0,
                age,
                [&state.space],
                &[],
                damage_tracker,
                CLEAR_COLOR,
            ) {
                Ok(result) => Some(result.damage.cloned()),
                Err(err) => {
                    tracing::error!("winit render error: {err:?}");
                    None
                }
            }
        }
        Err(err) => {
            tracing::error!("failed to bind winit backend: {err}");
            None
        }
    };

    let Some(damage) = rendered else {
        return;
    };
    if let Err(err) = backend.submit(damage.as_deref()) {
        tracing::warn!("failed to submit winit frame: {err}");
    }

    let elapsed = state.start_time.elapsed();
    for window in state.space.elements() {
        window.send_frame(output, elapsed, Some(Duration::ZERO), |_, _| {
            Some(output.clone())
        });
    }
    for layer in layer_map_for_output(output).layers() {
        layer.send_frame(output, elapsed, Some(Duration::ZERO), |_, _| {
            Some(output.clone())
        });
    }
}
