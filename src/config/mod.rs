//! Runtime configuration, read once from `KRISTAL_*` environment variables.

pub mod keybind;

use std::path::PathBuf;

use smithay::utils::Transform;

use crate::{
    desktop::DesktopConfig,
    output::{self, OutputLayoutMode, OutputSettings},
    placement::PlacementMode,
    rules::{self, WindowRule},
    workspace::{LayoutMode, WORKSPACE_COUNT},
};
pub use keybind::{Direction, Keybind, KeybindAction, KeybindModifiers, Keybindings};

/// xkb names used to compile the keymap. `None` means xkb's default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XkbSettings {
    pub rules: Option<String>,
    pub model: Option<String>,
    pub layout: Option<String>,
    pub variant: Option<String>,
    pub options: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LibinputSettings {
    pub tap_to_click: Option<bool>,
    pub natural_scroll: Option<bool>,
    /// Pointer acceleration speed in `[-1, 1]`.
    pub pointer_accel: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub keybindings: Keybindings,
    pub window_rules: Vec<WindowRule>,
    pub terminal: String,
    pub launcher: String,
    pub xkb: XkbSettings,
    pub repeat_rate: i32,
    pub repeat_delay: i32,
    pub libinput: LibinputSettings,
    pub output: OutputSettings,
    pub placement: PlacementMode,
    pub layout_mode: LayoutMode,
    pub workspace_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keybindings: Keybindings::default(),
            window_rules: Vec::new(),
            terminal: "foot".to_owned(),
            launcher: "fuzzel".to_owned(),
            xkb: XkbSettings::default(),
            repeat_rate: 25,
            repeat_delay: 600,
            libinput: LibinputSettings::default(),
            output: OutputSettings::default(),
            placement: PlacementMode::Auto,
            layout_mode: LayoutMode::Floating,
            workspace_count: WORKSPACE_COUNT,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from `lookup`. Invalid values are logged and replaced by defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let output = OutputSettings {
            scale: get("KRISTAL_OUTPUT_SCALE").map_or(defaults.output.scale, |raw| {
                match raw.trim().parse::<f64>() {
                    Ok(scale) if scale > 0.0 && scale.is_finite() => scale,
                    _ => {
                        tracing::error!(value = %raw, "Ignoring invalid KRISTAL_OUTPUT_SCALE; expected a positive number");
                        1.0
                    }
                }
            }),
            transform: parse_or_default(
                get("KRISTAL_OUTPUT_TRANSFORM"),
                "KRISTAL_OUTPUT_TRANSFORM",
                |raw| output::parse_transform(raw).ok_or(()),
                Transform::Normal,
            ),
            layout: parse_or_default(
                get("KRISTAL_OUTPUT_LAYOUT"),
                "KRISTAL_OUTPUT_LAYOUT",
                |raw| raw.parse::<OutputLayoutMode>(),
                OutputLayoutMode::Auto,
            ),
            state_path: get("KRISTAL_OUTPUTS_STATE").map(PathBuf::from),
        };

        let layout_mode = parse_or_default(
            get("KRISTAL_WINDOW_LAYOUT"),
            "KRISTAL_WINDOW_LAYOUT",
            |raw| raw.parse::<LayoutMode>(),
            defaults.layout_mode,
        );

        let libinput = LibinputSettings {
            tap_to_click: get("KRISTAL_TAP_TO_CLICK")
                .and_then(|raw| parse_bool_logged("KRISTAL_TAP_TO_CLICK", &raw)),
            natural_scroll: get("KRISTAL_NATURAL_SCROLL")
                .and_then(|raw| parse_bool_logged("KRISTAL_NATURAL_SCROLL", &raw)),
            pointer_accel: get("KRISTAL_POINTER_ACCEL").and_then(|raw| {
                match raw.trim().parse::<f64>() {
                    Ok(accel) if (-1.0..=1.0).contains(&accel) => Some(accel),
                    _ => {
                        tracing::warn!(value = %raw, "Ignoring invalid KRISTAL_POINTER_ACCEL; expected -1..1");
                        None
                    }
                }
            }),
        };

        Self {
            keybindings: Keybindings::parse(get("KRISTAL_BINDINGS").as_deref()),
            window_rules: get("KRISTAL_WINDOW_RULES")
                .map(|raw| rules::parse_rules(&raw))
                .unwrap_or_default(),
            terminal: get("KRISTAL_TERMINAL").unwrap_or(defaults.terminal),
            launcher: get("KRISTAL_LAUNCHER").unwrap_or(defaults.launcher),
            xkb: XkbSettings {
                rules: get("KRISTAL_XKB_RULES"),
                model: get("KRISTAL_XKB_MODEL"),
                layout: get("KRISTAL_XKB_LAYOUT"),
                variant: get("KRISTAL_XKB_VARIANT"),
                options: get("KRISTAL_XKB_OPTIONS"),
            },
            repeat_rate: parse_positive(get("KRISTAL_KEY_REPEAT_RATE"), "KRISTAL_KEY_REPEAT_RATE", defaults.repeat_rate),
            repeat_delay: parse_positive(get("KRISTAL_KEY_REPEAT_DELAY"), "KRISTAL_KEY_REPEAT_DELAY", defaults.repeat_delay),
            libinput,
            output,
            placement: parse_or_default(
                get("KRISTAL_WINDOW_PLACEMENT"),
                "KRISTAL_WINDOW_PLACEMENT",
                |raw| raw.parse::<PlacementMode>(),
                defaults.placement,
            ),
            layout_mode,
            workspace_count: defaults.workspace_count,
        }
    }

    pub fn desktop(&self) -> DesktopConfig {
        DesktopConfig {
            workspace_count: self.workspace_count,
            layout_mode: self.layout_mode,
            placement: self.placement,
            window_rules: self.window_rules.clone(),
        }
    }

    pub fn log_summary(&self) {
        tracing::info!(
            keybindings = self.keybindings.len(),
            window_rules = self.window_rules.len(),
            terminal = %self.terminal,
            launcher = %self.launcher,
            placement = %self.placement,
            layout = %self.layout_mode,
            output_scale = self.output.scale,
            output_transform = ?self.output.transform,
            output_layout = %self.output.layout,
            outputs_state = ?self.output.state_path,
            "configuration loaded"
        );
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_bool_logged(key: &str, raw: &str) -> Option<bool> {
    let parsed = parse_bool(raw);
    if parsed.is_none() {
        tracing::warn!(value = %raw, "Ignoring invalid {key}; expected a boolean");
    }
    parsed
}

fn parse_positive(raw: Option<String>, key: &str, default: i32) -> i32 {
    parse_or_default(
        raw,
        key,
        |raw| match raw.trim().parse::<i32>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(()),
        },
        default,
    )
}

fn parse_or_default<T, E>(
    raw: Option<String>,
    key: &str,
    parse: impl FnOnce(&str) -> Result<T, E>,
    default: T,
) -> T {
    let Some(raw) = raw else {
        return default;
    };
    match parse(&raw) {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(value = %raw, "Ignoring invalid {key}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config(&[]);
        assert_eq!(config.terminal, "foot");
        assert_eq!(config.repeat_rate, 25);
        assert_eq!(config.repeat_delay, 600);
        assert_eq!(config.workspace_count, 9);
        assert_eq!(config.placement, PlacementMode::Auto);
        assert_eq!(config.layout_mode, LayoutMode::Floating);
        assert_eq!(config.output.transform, Transform::Normal);
        assert!(config.window_rules.is_empty());
    }

    #[test]
    fn reads_values() {
        let config = config(&[
            ("KRISTAL_TERMINAL", "alacritty"),
            ("KRISTAL_OUTPUT_SCALE", "1.5"),
            ("KRISTAL_OUTPUT_TRANSFORM", "rotate-270"),
            ("KRISTAL_OUTPUT_LAYOUT", "vertical"),
            ("KRISTAL_WINDOW_PLACEMENT", "cascade"),
            ("KRISTAL_WINDOW_LAYOUT", "stack"),
            ("KRISTAL_TAP_TO_CLICK", "on"),
            ("KRISTAL_POINTER_ACCEL", "-0.5"),
            ("KRISTAL_XKB_LAYOUT", "us,de"),
            ("KRISTAL_WINDOW_RULES", "app_id=mpv,floating=1"),
            ("KRISTAL_OUTPUTS_STATE", "/tmp/kristal-outputs"),
        ]);
        assert_eq!(config.terminal, "alacritty");
        assert_eq!(config.output.scale, 1.5);
        assert_eq!(config.output.transform, Transform::_270);
        assert_eq!(config.output.layout, OutputLayoutMode::Vertical);
        assert_eq!(config.output.state_path, Some(PathBuf::from("/tmp/kristal-outputs")));
        assert_eq!(config.placement, PlacementMode::Cascade);
        assert_eq!(config.layout_mode, LayoutMode::Stack);
        assert_eq!(config.libinput.tap_to_click, Some(true));
        assert_eq!(config.libinput.natural_scroll, None);
        assert_eq!(config.libinput.pointer_accel, Some(-0.5));
        assert_eq!(config.xkb.layout.as_deref(), Some("us,de"));
        assert_eq!(config.window_rules.len(), 1);
        assert_eq!(config.desktop().layout_mode, LayoutMode::Stack);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = config(&[
            ("KRISTAL_OUTPUT_SCALE", "-2"),
            ("KRISTAL_OUTPUT_TRANSFORM", "sideways"),
            ("KRISTAL_WINDOW_PLACEMENT", "random"),
            ("KRISTAL_KEY_REPEAT_RATE", "fast"),
            ("KRISTAL_NATURAL_SCROLL", "maybe"),
            ("KRISTAL_POINTER_ACCEL", "3"),
        ]);
        assert_eq!(config.output.scale, 1.0);
        assert_eq!(config.output.transform, Transform::Normal);
        assert_eq!(config.placement, PlacementMode::Auto);
        assert_eq!(config.repeat_rate, 25);
        assert_eq!(config.libinput.natural_scroll, None);
        assert_eq!(config.libinput.pointer_accel, None);
    }

    #[test]
    fn bool_spellings() {
        for raw in ["1", "TRUE", "yes", "On"] {
            assert_eq!(parse_bool(raw), Some(true), "{raw}");
        }
        for raw in ["0", "false", "No", "OFF"] {
            assert_eq!(parse_bool(raw), Some(false), "{raw}");
        }
        assert_eq!(parse_bool("2"), None);
    }
}
