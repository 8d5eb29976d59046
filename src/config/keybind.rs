//! Key bindings: `Mods+Key=action` entries separated by `;`.

use smithay::input::keyboard::{Keysym, ModifiersState, xkb};

use crate::{CompositorError, workspace::LayoutMode};

/// Size of a keyboard move/resize step.
pub const NUDGE_STEP: i32 = 32;

const DEFAULT_BINDINGS: &[&str] = &[
    "Alt+Escape=quit",
    "Alt+Return=terminal",
    "Alt+D=launcher",
    "Alt+Q=close",
    "Alt+F1=focus-next",
    "Alt+Tab=focus-next",
    "Alt+Shift+Tab=focus-prev",
    "Alt+Shift+Left=move-left",
    "Alt+Shift+Right=move-right",
    "Alt+Shift+Up=move-up",
    "Alt+Shift+Down=move-down",
    "Alt+Ctrl+Left=resize-left",
    "Alt+Ctrl+Right=resize-right",
    "Alt+Ctrl+Up=resize-up",
    "Alt+Ctrl+Down=resize-down",
    "Alt+Space=layout-cycle",
    "Alt+1=ws1",
    "Alt+2=ws2",
    "Alt+3=ws3",
    "Alt+4=ws4",
    "Alt+5=ws5",
    "Alt+6=ws6",
    "Alt+7=ws7",
    "Alt+8=ws8",
    "Alt+9=ws9",
    "Alt+Shift+1=move-ws1",
    "Alt+Shift+2=move-ws2",
    "Alt+Shift+3=move-ws3",
    "Alt+Shift+4=move-ws4",
    "Alt+Shift+5=move-ws5",
    "Alt+Shift+6=move-ws6",
    "Alt+Shift+7=move-ws7",
    "Alt+Shift+8=move-ws8",
    "Alt+Shift+9=move-ws9",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeybindAction {
    Quit,
    Terminal,
    Launcher,
    Close,
    FocusNext,
    FocusPrev,
    Move(Direction),
    Resize(Direction),
    Layout(LayoutMode),
    CycleLayout,
    SwitchWorkspace(usize),
    MoveToWorkspace(usize),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeybindModifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub logo: bool,
}

impl KeybindModifiers {
    /// Exact match over the four tracked modifiers. Caps and Num Lock are ignored.
    pub fn matches(self, modifiers: &ModifiersState) -> bool {
        self.shift == modifiers.shift
            && self.ctrl == modifiers.ctrl
            && self.alt == modifiers.alt
            && self.logo == modifiers.logo
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Keybind {
    pub modifiers: KeybindModifiers,
    pub keysym: Keysym,
    pub action: KeybindAction,
}

impl Keybind {
    pub fn matches(&self, modifiers: &ModifiersState, keysym: Keysym) -> bool {
        self.modifiers.matches(modifiers) && self.keysym == keysym
    }
}

#[derive(Clone, Debug)]
pub struct Keybindings {
    binds: Vec<Keybind>,
}

impl Default for Keybindings {
    fn default() -> Self {
        let binds = DEFAULT_BINDINGS
            .iter()
            .filter_map(|entry| parse_keybind(entry).ok())
            .collect();
        Self { binds }
    }
}

impl Keybindings {
    /// Parses a binding list, falling back to the built-in table when nothing parses.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
            return Self::default();
        };

        let binds: Vec<Keybind> = raw
            .split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| {
                parse_keybind(entry)
                    .map_err(|err| tracing::warn!("Ignoring invalid key binding: {err}"))
                    .ok()
            })
            .collect();

        if binds.is_empty() {
            tracing::warn!("no usable key bindings configured, using defaults");
            return Self::default();
        }
        Self { binds }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keybind> {
        self.binds.iter()
    }

    pub fn len(&self) -> usize {
        self.binds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binds.is_empty()
    }

    pub fn action_for(&self, modifiers: &ModifiersState, keysym: Keysym) -> Option<KeybindAction> {
        self.binds
            .iter()
            .find(|bind| bind.matches(modifiers, keysym))
            .map(|bind| bind.action)
    }
}

pub fn parse_keybind(entry: &str) -> Result<Keybind, CompositorError> {
    let (combo, action) = entry.split_once('=').ok_or_else(|| {
        CompositorError::Config(format!("`{entry}`: expected `Mods+Key=action`"))
    })?;
    let action = parse_action(action.trim())
        .ok_or_else(|| CompositorError::Config(format!("`{entry}`: unknown action `{}`", action.trim())))?;
    let (modifiers, keysym) = parse_combo(combo)?;

    Ok(Keybind {
        modifiers,
        keysym,
        action,
    })
}

fn parse_combo(combo: &str) -> Result<(KeybindModifiers, Keysym), CompositorError> {
    let mut modifiers = KeybindModifiers::default();
    let mut key: Option<&str> = None;

    for part in combo.split('+').map(str::trim).filter(|part| !part.is_empty()) {
        match part.to_ascii_lowercase().as_str() {
            "shift" => modifiers.shift = true,
            "ctrl" | "control" => modifiers.ctrl = true,
            "alt" | "mod1" => modifiers.alt = true,
            "super" | "logo" | "win" | "windows" | "mod4" => modifiers.logo = true,
            _ => key = Some(part),
        }
    }

    let key = key.ok_or_else(|| {
        CompositorError::Config(format!("key combo `{combo}` has no non-modifier key"))
    })?;
    let keysym = keysym_from_token(key)
        .ok_or_else(|| CompositorError::Config(format!("unknown key `{key}` in `{combo}`")))?;

    Ok((modifiers, keysym))
}

fn keysym_from_token(token: &str) -> Option<Keysym> {
    let name = match token.to_ascii_lowercase().as_str() {
        "enter" => "Return",
        "esc" => "Escape",
        _ => token,
    };
    let keysym = xkb::keysym_from_name(name, xkb::KEYSYM_CASE_INSENSITIVE);
    (keysym != Keysym::NoSymbol).then_some(keysym)
}

fn parse_action(raw: &str) -> Option<KeybindAction> {
    let action = raw.to_ascii_lowercase();
    let parsed = match action.as_str() {
        "quit" => KeybindAction::Quit,
        "terminal" => KeybindAction::Terminal,
        "launcher" => KeybindAction::Launcher,
        "close" => KeybindAction::Close,
        "focus-next" => KeybindAction::FocusNext,
        "focus-prev" => KeybindAction::FocusPrev,
        "move-left" => KeybindAction::Move(Direction::Left),
        "move-right" => KeybindAction::Move(Direction::Right),
        "move-up" => KeybindAction::Move(Direction::Up),
        "move-down" => KeybindAction::Move(Direction::Down),
        "resize-left" => KeybindAction::Resize(Direction::Left),
        "resize-right" => KeybindAction::Resize(Direction::Right),
        "resize-up" => KeybindAction::Resize(Direction::Up),
        "resize-down" => KeybindAction::Resize(Direction::Down),
        "layout-floating" => KeybindAction::Layout(LayoutMode::Floating),
        "layout-stack" => KeybindAction::Layout(LayoutMode::Stack),
        "layout-grid" => KeybindAction::Layout(LayoutMode::Grid),
        "layout-monocle" => KeybindAction::Layout(LayoutMode::Monocle),
        "layout-cycle" => KeybindAction::CycleLayout,
        other => {
            if let Some(workspace) = other.strip_prefix("move-ws") {
                return single_digit_workspace(workspace).map(KeybindAction::MoveToWorkspace);
            }
            if let Some(workspace) = other.strip_prefix("ws") {
                return single_digit_workspace(workspace).map(KeybindAction::SwitchWorkspace);
            }
            return None;
        }
    };
    Some(parsed)
}

fn single_digit_workspace(raw: &str) -> Option<usize> {
    match raw.as_bytes() {
        [digit @ b'1'..=b'9'] => Some(usize::from(digit - b'0')),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn mods(alt: bool, shift: bool, ctrl: bool) -> ModifiersState {
        ModifiersState {
            alt,
            shift,
            ctrl,
            ..ModifiersState::default()
        }
    }

    #[test]
    fn parses_entry() {
        let bind = parse_keybind("Super+Shift+Enter=terminal").unwrap();
        assert_eq!(
            bind,
            Keybind {
                modifiers: KeybindModifiers {
                    shift: true,
                    logo: true,
                    ..KeybindModifiers::default()
                },
                keysym: Keysym::Return,
                action: KeybindAction::Terminal,
            }
        );
    }

    #[test]
    fn parses_workspace_actions() {
        assert_eq!(parse_action("ws4"), Some(KeybindAction::SwitchWorkspace(4)));
        assert_eq!(parse_action("MOVE-WS9"), Some(KeybindAction::MoveToWorkspace(9)));
        assert_eq!(parse_action("ws0"), None);
        assert_eq!(parse_action("ws10"), None);
        assert_eq!(parse_action("layout-grid"), Some(KeybindAction::Layout(LayoutMode::Grid)));
    }

    #[test]
    fn rejects_bad_entries() {
        assert!(parse_keybind("Alt+D").is_err());
        assert!(parse_keybind("Alt+Shift=quit").is_err());
        assert!(parse_keybind("Alt+NotAKey=quit").is_err());
        assert!(parse_keybind("Alt+D=dance").is_err());
    }

    #[test]
    fn falls_back_to_defaults() {
        let defaults = Keybindings::default();
        assert_eq!(defaults.len(), DEFAULT_BINDINGS.len());
        assert_eq!(Keybindings::parse(None).len(), defaults.len());
        assert_eq!(Keybindings::parse(Some("nonsense;Alt=quit")).len(), defaults.len());

        let custom = Keybindings::parse(Some("Alt+Return=terminal; bogus ;Ctrl+Alt+X=quit"));
        assert_eq!(custom.len(), 2);
    }

    #[test]
    fn modifier_match_is_exact() {
        let binds = Keybindings::default();
        assert_eq!(
            binds.action_for(&mods(true, false, false), Keysym::Tab),
            Some(KeybindAction::FocusNext)
        );
        assert_eq!(
            binds.action_for(&mods(true, true, false), Keysym::Tab),
            Some(KeybindAction::FocusPrev)
        );
        assert_eq!(binds.action_for(&mods(true, true, true), Keysym::Tab), None);
        assert_eq!(
            binds.action_for(&mods(true, false, true), Keysym::Left),
            Some(KeybindAction::Resize(Direction::Left))
        );
        assert_eq!(
            binds.action_for(&mods(true, true, false), Keysym::_3),
            Some(KeybindAction::MoveToWorkspace(3))
        );
        assert_eq!(binds.action_for(&mods(false, false, false), Keysym::d), None);
        assert_eq!(
            binds.action_for(&mods(true, false, false), Keysym::d),
            Some(KeybindAction::Launcher)
        );
    }
}
