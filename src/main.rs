use kristal::{CompositorError, Kristal, Result, config::Config};
use smithay::reexports::{calloop::EventLoop, wayland_server::Display};
use std::{backtrace::Backtrace, fs, path::PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    init_backtrace_defaults();
    init_logging()?;
    std::panic::set_hook(Box::new(|panic_info| {
        let backtrace = Backtrace::force_capture();
        tracing::error!("panic: {panic_info}\n{backtrace}");
        eprintln!("panic: {panic_info}\n{backtrace}");
    }));

    let args: Vec<String> = std::env::args().collect();
    let force_winit = args.iter().any(|a| a == "--winit");
    let force_drm = args.iter().any(|a| a == "--drm" || a == "--tty");

    if force_winit && force_drm {
        return Err(CompositorError::Backend(
            "cannot pass both --winit and --drm/--tty".to_owned(),
        ));
    }

    let config = Config::from_env();
    config.log_summary();

    let mut event_loop: EventLoop<Kristal> =
        EventLoop::try_new().map_err(|e| CompositorError::EventLoop(e.to_string()))?;

    let display = Display::new().map_err(|e| CompositorError::Backend(e.to_string()))?;
    let mut state = Kristal::new(
        display,
        event_loop.handle(),
        event_loop.get_signal(),
        config,
    )?;

    if force_winit || (!force_drm && is_nested()) {
        tracing::info!("Starting with Winit backend");
        kristal::backend::winit::init_winit(&mut event_loop, &mut state)?;
    } else {
        tracing::info!("Starting with DRM/KMS backend");
        kristal::backend::udev::init_udev(&mut event_loop, &mut state)?;
    }

    #[cfg(feature = "xwayland")]
    state.start_xwayland();

    // Spawn a command if provided (skip backend flags)
    let spawn_cmd = args.iter().skip(1).find(|a| !a.starts_with("--"));
    if let Some(cmd) = spawn_cmd {
        state.spawn_command(cmd);
    }

    // Present any redraws queued during backend initialization before entering the loop.
    kristal::backend::udev::drain_queued_redraws(&mut state);

    event_loop
        .run(None, &mut state, |state| {
            state.space.refresh();
            state.popups.cleanup();
            state.refresh_foreign_toplevel();

            kristal::backend::udev::drain_queued_redraws(state);

            if let Err(err) = state.display_handle.flush_clients() {
                tracing::warn!("failed to flush clients: {err}");
            }
        })
        .map_err(|e| CompositorError::EventLoop(e.to_string()))?;

    tracing::info!("event loop stopped, exiting");
    Ok(())
}

fn init_backtrace_defaults() {
    if std::env::var_os("RUST_BACKTRACE").is_none() {
        // Safety: called at startup before creating any threads.
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }
    if std::env::var_os("RUST_LIB_BACKTRACE").is_none() {
        // Safety: called at startup before creating any threads.
        unsafe { std::env::set_var("RUST_LIB_BACKTRACE", "0") };
    }
}

/// Check if we're running inside an existing display server
fn is_nested() -> bool {
    std::env::var("WAYLAND_DISPLAY").is_ok() || std::env::var("DISPLAY").is_ok()
}

const DEFAULT_LOG_FILTER: &str = concat!(
    "kristal=debug,",
    "kristal::backend::udev=debug,",
    "kristal::handlers=debug,",
    "smithay::backend::drm=info,",
    "smithay::backend::renderer::gles=error"
);

fn log_dir() -> PathBuf {
    std::env::var_os("XDG_STATE_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME")
                .filter(|dir| !dir.is_empty())
                .map(|home| PathBuf::from(home).join(".local/state"))
        })
        .map(|base| base.join("kristal"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn init_logging() -> Result<()> {
    let log_dir = log_dir();
    if let Err(err) = fs::create_dir_all(&log_dir) {
        eprintln!("failed to create log directory {}: {err}", log_dir.display());
        return Err(err.into());
    }

    let file_appender = tracing_appender::rolling::never(&log_dir, "kristal.log");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_appender),
        )
        .init();

    let log_file = log_dir.join("kristal.log");
    tracing::info!(path = %log_file.display(), "logging initialized");

    Ok(())
}
