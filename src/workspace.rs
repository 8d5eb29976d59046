use std::{fmt, str::FromStr};

pub const WORKSPACE_COUNT: usize = 9;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LayoutMode {
    #[default]
    Floating,
    Stack,
    Grid,
    Monocle,
}

impl LayoutMode {
    pub fn cycle(self) -> Self {
        match self {
            Self::Floating => Self::Stack,
            Self::Stack => Self::Grid,
            Self::Grid => Self::Monocle,
            Self::Monocle => Self::Floating,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Floating => "floating",
            Self::Stack => "stack",
            Self::Grid => "grid",
            Self::Monocle => "monocle",
        }
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "floating" => Ok(Self::Floating),
            "stack" => Ok(Self::Stack),
            "grid" => Ok(Self::Grid),
            "monocle" => Ok(Self::Monocle),
            other => Err(format!("unknown layout mode: {other}")),
        }
    }
}

/// Current workspace plus the layout mode remembered for each workspace.
#[derive(Clone, Debug)]
pub struct WorkspaceState {
    current: usize,
    /// Live mode of the current workspace.
    mode: LayoutMode,
    remembered: Vec<LayoutMode>,
}

impl WorkspaceState {
    pub fn new(count: usize, default_mode: LayoutMode) -> Self {
        Self {
            current: 1,
            mode: default_mode,
            remembered: vec![default_mode; count.max(1)],
        }
    }

    pub fn count(&self) -> usize {
        self.remembered.len()
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn mode(&self) -> LayoutMode {
        self.mode
    }

    pub fn contains(&self, workspace: usize) -> bool {
        (1..=self.count()).contains(&workspace)
    }

    /// Switches to `workspace` and restores its layout mode. Out of range is ignored.
    pub fn switch_to(&mut self, workspace: usize) -> bool {
        if !self.contains(workspace) {
            return false;
        }
        self.current = workspace;
        self.mode = self.remembered[workspace - 1];
        true
    }

    pub fn set_mode(&mut self, mode: LayoutMode) {
        self.mode = mode;
        self.remembered[self.current - 1] = mode;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn cycle_visits_every_mode() {
        let mut mode = LayoutMode::Floating;
        let mut seen = Vec::new();
        for _ in 0..4 {
            mode = mode.cycle();
            seen.push(mode);
        }
        assert_eq!(
            seen,
            vec![LayoutMode::Stack, LayoutMode::Grid, LayoutMode::Monocle, LayoutMode::Floating]
        );
    }

    #[test]
    fn modes_are_remembered_per_workspace() {
        let mut state = WorkspaceState::new(WORKSPACE_COUNT, LayoutMode::Floating);
        state.set_mode(LayoutMode::Grid);
        assert!(state.switch_to(2));
        assert_eq!(state.mode(), LayoutMode::Floating);
        state.set_mode(LayoutMode::Monocle);
        assert!(state.switch_to(1));
        assert_eq!(state.mode(), LayoutMode::Grid);
    }

    #[test]
    fn out_of_range_switch_is_ignored() {
        let mut state = WorkspaceState::new(WORKSPACE_COUNT, LayoutMode::Stack);
        assert!(!state.switch_to(0));
        assert!(!state.switch_to(10));
        assert_eq!(state.current(), 1);
    }

    #[test]
    fn parses_mode_names() {
        assert_eq!(" Monocle ".parse::<LayoutMode>(), Ok(LayoutMode::Monocle));
        assert!("tiles".parse::<LayoutMode>().is_err());
    }
}
