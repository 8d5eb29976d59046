use std::collections::HashMap;
use std::path::PathBuf;

use kristal::{
    config::{Config, Direction, KeybindAction},
    output::OutputLayoutMode,
    placement::PlacementMode,
    rules::WindowRule,
    workspace::LayoutMode,
};
use pretty_assertions::assert_eq;
use smithay::{
    input::keyboard::{Keysym, ModifiersState},
    utils::Transform,
};

fn config_from(vars: &[(&str, &str)]) -> Config {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    Config::from_lookup(|key| vars.get(key).cloned())
}

fn alt() -> ModifiersState {
    ModifiersState {
        alt: true,
        ..Default::default()
    }
}

#[test_log::test]
fn empty_environment_gives_defaults() {
    let config = config_from(&[]);

    assert_eq!(config.terminal, "foot");
    assert_eq!(config.launcher, "fuzzel");
    assert_eq!(config.repeat_rate, 25);
    assert_eq!(config.repeat_delay, 600);
    assert_eq!(config.workspace_count, 9);
    assert_eq!(config.layout_mode, LayoutMode::Floating);
    assert_eq!(config.placement, PlacementMode::Auto);
    assert_eq!(config.output.scale, 1.0);
    assert_eq!(config.output.transform, Transform::Normal);
    assert_eq!(config.output.layout, OutputLayoutMode::Auto);
    assert_eq!(config.output.state_path, None);
    assert!(config.window_rules.is_empty());
    assert_eq!(
        config.keybindings.action_for(&alt(), Keysym::Return),
        Some(KeybindAction::Terminal)
    );
}

#[test_log::test]
fn reads_every_supported_variable() {
    let config = config_from(&[
        ("KRISTAL_TERMINAL", "alacritty"),
        ("KRISTAL_LAUNCHER", "wofi --show drun"),
        ("KRISTAL_KEY_REPEAT_RATE", "40"),
        ("KRISTAL_KEY_REPEAT_DELAY", "250"),
        ("KRISTAL_TAP_TO_CLICK", "Yes"),
        ("KRISTAL_NATURAL_SCROLL", "off"),
        ("KRISTAL_POINTER_ACCEL", "-0.5"),
        ("KRISTAL_OUTPUT_SCALE", "1.5"),
        ("KRISTAL_OUTPUT_TRANSFORM", "rotate-90"),
        ("KRISTAL_OUTPUT_LAYOUT", "vertical"),
        ("KRISTAL_OUTPUTS_STATE", "/tmp/kristal-outputs"),
        ("KRISTAL_WINDOW_PLACEMENT", "cascade"),
        ("KRISTAL_WINDOW_LAYOUT", "Grid"),
        ("KRISTAL_XKB_LAYOUT", "de"),
        ("KRISTAL_WINDOW_RULES", "app_id=mpv,floating=yes;title=Editor,workspace=2"),
    ]);

    assert_eq!(config.terminal, "alacritty");
    assert_eq!(config.launcher, "wofi --show drun");
    assert_eq!(config.repeat_rate, 40);
    assert_eq!(config.repeat_delay, 250);
    assert_eq!(config.libinput.tap_to_click, Some(true));
    assert_eq!(config.libinput.natural_scroll, Some(false));
    assert_eq!(config.libinput.pointer_accel, Some(-0.5));
    assert_eq!(config.output.scale, 1.5);
    assert_eq!(config.output.transform, Transform::_90);
    assert_eq!(config.output.layout, OutputLayoutMode::Vertical);
    assert_eq!(
        config.output.state_path,
        Some(PathBuf::from("/tmp/kristal-outputs"))
    );
    assert_eq!(config.placement, PlacementMode::Cascade);
    assert_eq!(config.layout_mode, LayoutMode::Grid);
    assert_eq!(config.xkb.layout.as_deref(), Some("de"));
    assert_eq!(config.xkb.variant, None);
    assert_eq!(
        config.window_rules,
        vec![
            WindowRule {
                app_id: Some("mpv".into()),
                title: None,
                workspace: None,
                floating: Some(true),
            },
            WindowRule {
                app_id: None,
                title: Some("Editor".into()),
                workspace: Some(2),
                floating: None,
            },
        ]
    );
}

#[test_log::test]
fn invalid_values_fall_back_to_defaults() {
    let config = config_from(&[
        ("KRISTAL_OUTPUT_SCALE", "-2"),
        ("KRISTAL_OUTPUT_TRANSFORM", "sideways"),
        ("KRISTAL_OUTPUT_LAYOUT", "diagonal"),
        ("KRISTAL_POINTER_ACCEL", "3"),
        ("KRISTAL_TAP_TO_CLICK", "maybe"),
        ("KRISTAL_WINDOW_LAYOUT", "spiral"),
        ("KRISTAL_WINDOW_PLACEMENT", "random"),
        ("KRISTAL_KEY_REPEAT_RATE", "fast"),
        ("KRISTAL_TERMINAL", "   "),
    ]);

    assert_eq!(config.output.scale, 1.0);
    assert_eq!(config.output.transform, Transform::Normal);
    assert_eq!(config.output.layout, OutputLayoutMode::Auto);
    assert_eq!(config.libinput.pointer_accel, None);
    assert_eq!(config.libinput.tap_to_click, None);
    assert_eq!(config.layout_mode, LayoutMode::Floating);
    assert_eq!(config.placement, PlacementMode::Auto);
    assert_eq!(config.repeat_rate, 25);
    assert_eq!(config.terminal, "foot");
}

#[test_log::test]
fn custom_bindings_replace_the_builtin_table() {
    let config = config_from(&[(
        "KRISTAL_BINDINGS",
        "Super+Enter=terminal; super+h=move-left ;Ctrl+Alt+Nope=quit;Super+3=move-ws3",
    )]);
    let logo = ModifiersState {
        logo: true,
        ..Default::default()
    };

    assert_eq!(config.keybindings.len(), 3);
    assert_eq!(
        config.keybindings.action_for(&logo, Keysym::Return),
        Some(KeybindAction::Terminal)
    );
    assert_eq!(
        config.keybindings.action_for(&logo, Keysym::h),
        Some(KeybindAction::Move(Direction::Left))
    );
    assert_eq!(
        config.keybindings.action_for(&logo, Keysym::_3),
        Some(KeybindAction::MoveToWorkspace(3))
    );
    // The built-in Alt+Return is gone.
    assert_eq!(config.keybindings.action_for(&alt(), Keysym::Return), None);
}

#[test_log::test]
fn unusable_bindings_keep_the_builtin_table() {
    let config = config_from(&[("KRISTAL_BINDINGS", "Alt=quit;Alt+Q=explode;nonsense")]);

    assert_eq!(
        config.keybindings.action_for(&alt(), Keysym::q),
        Some(KeybindAction::Close)
    );
    let alt_shift = ModifiersState {
        alt: true,
        shift: true,
        ..Default::default()
    };
    assert_eq!(
        config.keybindings.action_for(&alt_shift, Keysym::_4),
        Some(KeybindAction::MoveToWorkspace(4))
    );
}

#[test_log::test]
fn modifiers_match_exactly() {
    let config = config_from(&[]);
    let alt_ctrl = ModifiersState {
        alt: true,
        ctrl: true,
        ..Default::default()
    };

    assert_eq!(
        config.keybindings.action_for(&alt_ctrl, Keysym::Left),
        Some(KeybindAction::Resize(Direction::Left))
    );
    assert_eq!(
        config.keybindings.action_for(&alt(), Keysym::Left),
        None
    );
    let caps = ModifiersState {
        alt: true,
        caps_lock: true,
        ..Default::default()
    };
    assert_eq!(
        config.keybindings.action_for(&caps, Keysym::Escape),
        Some(KeybindAction::Quit)
    );
}
