//! Output arrangement and persistence.

pub mod state_file;

use std::{fmt, path::PathBuf, str::FromStr};

use smithay::{
    output::Mode,
    utils::{Logical, Physical, Point, Size, Transform},
};

use crate::{
    CompositorError,
    geometry::{self, Rect},
};
use state_file::SavedOutput;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputLayoutMode {
    /// Right of everything already placed.
    #[default]
    Auto,
    Horizontal,
    Vertical,
}

impl fmt::Display for OutputLayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
        })
    }
}

impl FromStr for OutputLayoutMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "horizontal" => Ok(Self::Horizontal),
            "vertical" => Ok(Self::Vertical),
            other => Err(format!("unknown output layout: {other}")),
        }
    }
}

pub fn parse_transform(raw: &str) -> Option<Transform> {
    let transform = match raw.trim().to_ascii_lowercase().as_str() {
        "normal" | "0" => Transform::Normal,
        "90" | "rotate-90" => Transform::_90,
        "180" | "rotate-180" => Transform::_180,
        "270" | "rotate-270" => Transform::_270,
        "flipped" => Transform::Flipped,
        "flipped-90" => Transform::Flipped90,
        "flipped-180" => Transform::Flipped180,
        "flipped-270" => Transform::Flipped270,
        _ => return None,
    };
    Some(transform)
}

/// wl_output transform enum value.
pub fn transform_to_wl(transform: Transform) -> u32 {
    match transform {
        Transform::Normal => 0,
        Transform::_90 => 1,
        Transform::_180 => 2,
        Transform::_270 => 3,
        Transform::Flipped => 4,
        Transform::Flipped90 => 5,
        Transform::Flipped180 => 6,
        Transform::Flipped270 => 7,
    }
}

pub fn transform_from_wl(value: u32) -> Transform {
    match value {
        1 => Transform::_90,
        2 => Transform::_180,
        3 => Transform::_270,
        4 => Transform::Flipped,
        5 => Transform::Flipped90,
        6 => Transform::Flipped180,
        7 => Transform::Flipped270,
        _ => Transform::Normal,
    }
}

/// How a newly connected output should be configured.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutputPlan {
    pub enabled: bool,
    pub scale: f64,
    pub transform: Transform,
    pub position: Point<i32, Logical>,
}

/// A requested change to one output. `None` fields keep their current value.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputChange {
    pub name: String,
    pub enabled: bool,
    pub mode: Option<Mode>,
    pub scale: Option<f64>,
    pub transform: Option<Transform>,
    pub position: Option<Point<i32, Logical>>,
}

impl OutputChange {
    pub fn disable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: false,
            mode: None,
            scale: None,
            transform: None,
            position: None,
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if let Some(scale) = self.scale
            && !(scale.is_finite() && scale > 0.0)
        {
            return Err(CompositorError::Config(format!(
                "output {}: invalid scale {scale}",
                self.name
            )));
        }
        if let Some(mode) = self.mode
            && (mode.size.w <= 0 || mode.size.h <= 0)
        {
            return Err(CompositorError::Config(format!(
                "output {}: invalid mode {}x{}",
                self.name, mode.size.w, mode.size.h
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
struct KnownOutput {
    name: String,
    plan: OutputPlan,
    size: Size<i32, Logical>,
}

impl KnownOutput {
    fn geometry(&self) -> Rect {
        Rect::new(self.plan.position, self.size)
    }
}

#[derive(Clone, Debug)]
pub struct OutputSettings {
    pub scale: f64,
    pub transform: Transform,
    pub layout: OutputLayoutMode,
    pub state_path: Option<PathBuf>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            scale: 1.0,
            transform: Transform::Normal,
            layout: OutputLayoutMode::Auto,
            state_path: None,
        }
    }
}

/// Places outputs in layout space and keeps the state file in sync.
#[derive(Debug)]
pub struct OutputLayout {
    settings: OutputSettings,
    outputs: Vec<KnownOutput>,
    next: Point<i32, Logical>,
}

impl OutputLayout {
    pub fn new(settings: OutputSettings) -> Self {
        Self {
            settings,
            outputs: Vec::new(),
            next: Point::from((0, 0)),
        }
    }

    /// Decides enablement, scale, transform and position for a new output and records it.
    pub fn add(&mut self, name: &str, mode_size: Size<i32, Physical>) -> OutputPlan {
        self.remove_entry(name);

        let saved = self.settings.state_path.as_deref().and_then(|path| {
            state_file::load(path, name)
                .map_err(|err| tracing::warn!("failed to load output state: {err:#}"))
                .ok()
                .flatten()
        });

        let plan = match saved {
            Some(saved) => {
                tracing::info!(output = name, ?saved, "restoring saved output state");
                OutputPlan {
                    enabled: saved.enabled,
                    scale: saved.scale,
                    transform: transform_from_wl(saved.transform),
                    position: Point::from((saved.x, saved.y)),
                }
            }
            None => {
                let scale = self.settings.scale;
                let transform = self.settings.transform;
                let size = logical_size(mode_size, scale, transform);
                let position = match self.settings.layout {
                    OutputLayoutMode::Horizontal => {
                        let position = Point::from((self.next.x, 0));
                        self.next.x += size.w;
                        position
                    }
                    OutputLayoutMode::Vertical => {
                        let position = Point::from((0, self.next.y));
                        self.next.y += size.h;
                        position
                    }
                    OutputLayoutMode::Auto => {
                        let right = geometry::bounding_box(
                            self.outputs
                                .iter()
                                .filter(|output| output.plan.enabled)
                                .map(KnownOutput::geometry),
                        )
                        .map_or(0, |bounds| bounds.loc.x + bounds.size.w);
                        Point::from((right, 0))
                    }
                };
                OutputPlan {
                    enabled: true,
                    scale,
                    transform,
                    position,
                }
            }
        };

        self.outputs.push(KnownOutput {
            name: name.to_owned(),
            plan,
            size: logical_size(mode_size, plan.scale, plan.transform),
        });
        self.save();
        plan
    }

    pub fn remove(&mut self, name: &str) {
        self.save();
        self.remove_entry(name);
    }

    /// Applies `change` to a connected output and persists the result.
    pub fn reconfigure(
        &mut self,
        change: &OutputChange,
        mode_size: Size<i32, Physical>,
    ) -> crate::Result<OutputPlan> {
        change.validate()?;
        let output = self
            .outputs
            .iter_mut()
            .find(|output| output.name == change.name)
            .ok_or_else(|| CompositorError::Config(format!("unknown output {}", change.name)))?;

        let plan = &mut output.plan;
        plan.enabled = change.enabled;
        if let Some(scale) = change.scale {
            plan.scale = scale;
        }
        if let Some(transform) = change.transform {
            plan.transform = transform;
        }
        if let Some(position) = change.position {
            plan.position = position;
        }
        output.size = logical_size(mode_size, plan.scale, plan.transform);

        let plan = output.plan;
        tracing::info!(output = %change.name, ?plan, "output reconfigured");
        self.save();
        Ok(plan)
    }

    pub fn plan(&self, name: &str) -> Option<OutputPlan> {
        self.outputs
            .iter()
            .find(|output| output.name == name)
            .map(|output| output.plan)
    }

    pub fn geometry(&self, name: &str) -> Option<Rect> {
        self.outputs
            .iter()
            .find(|output| output.name == name && output.plan.enabled)
            .map(KnownOutput::geometry)
    }

    fn remove_entry(&mut self, name: &str) {
        self.outputs.retain(|output| output.name != name);
    }

    /// Rewrites the state file. Entries of disconnected outputs are kept.
    fn save(&self) {
        let Some(path) = self.settings.state_path.as_deref() else {
            return;
        };
        let mut entries = state_file::load_all(path)
            .map_err(|err| tracing::warn!("failed to load output state: {err:#}"))
            .unwrap_or_default();
        entries.retain(|entry| !self.outputs.iter().any(|output| output.name == entry.name));
        entries.extend(self.outputs.iter().map(|output| SavedOutput {
            name: output.name.clone(),
            enabled: output.plan.enabled,
            scale: output.plan.scale,
            transform: transform_to_wl(output.plan.transform),
            x: output.plan.position.x,
            y: output.plan.position.y,
        }));

        if let Err(err) = state_file::save(path, &entries) {
            tracing::warn!("failed to save output state: {err:#}");
        }
    }
}

pub fn logical_size(
    mode_size: Size<i32, Physical>,
    scale: f64,
    transform: Transform,
) -> Size<i32, Logical> {
    transform
        .transform_size(mode_size)
        .to_f64()
        .to_logical(scale)
        .to_i32_round()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::geometry::rect;

    fn layout(mode: OutputLayoutMode) -> OutputLayout {
        OutputLayout::new(OutputSettings {
            layout: mode,
            ..OutputSettings::default()
        })
    }

    #[test]
    fn horizontal_and_vertical_placement() {
        let mut horizontal = layout(OutputLayoutMode::Horizontal);
        horizontal.add("A", (1920, 1080).into());
        let b = horizontal.add("B", (1280, 1024).into());
        assert_eq!(b.position, Point::from((1920, 0)));

        let mut vertical = layout(OutputLayoutMode::Vertical);
        vertical.add("A", (1920, 1080).into());
        let b = vertical.add("B", (1280, 1024).into());
        assert_eq!(b.position, Point::from((0, 1080)));
        assert_eq!(vertical.geometry("B"), Some(rect(0, 1080, 1280, 1024)));
    }

    #[test]
    fn auto_appends_to_the_right() {
        let mut auto = layout(OutputLayoutMode::Auto);
        auto.add("A", (1920, 1080).into());
        auto.add("B", (1280, 1024).into());
        auto.remove("A");
        let c = auto.add("C", (800, 600).into());
        assert_eq!(c.position, Point::from((3200, 0)));
    }

    #[test]
    fn scale_and_transform_shrink_logical_size() {
        assert_eq!(
            logical_size((2560, 1440).into(), 2.0, Transform::_90),
            Size::from((720, 1280))
        );
    }

    #[test]
    fn saved_state_wins_and_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs");
        std::fs::write(&path, "HDMI-A-1 1 2.000 1 -1080 0\nDP-1 0 1.000 0 0 0\n").unwrap();

        let mut layout = OutputLayout::new(OutputSettings {
            state_path: Some(path.clone()),
            ..OutputSettings::default()
        });
        let hdmi = layout.add("HDMI-A-1", (3840, 2160).into());
        assert_eq!(
            hdmi,
            OutputPlan {
                enabled: true,
                scale: 2.0,
                transform: Transform::_90,
                position: Point::from((-1080, 0)),
            }
        );
        let dp = layout.add("DP-1", (1920, 1080).into());
        assert!(!dp.enabled);
        assert_eq!(layout.geometry("DP-1"), None);

        layout.remove("HDMI-A-1");
        assert_eq!(layout.geometry("HDMI-A-1"), None);

        // Disconnected outputs keep their last state on disk.
        let mut entries = state_file::load_all(&path).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        let summary: Vec<_> = entries
            .iter()
            .map(|entry| (entry.name.as_str(), entry.enabled))
            .collect();
        assert_eq!(summary, vec![("DP-1", false), ("HDMI-A-1", true)]);
    }

    #[test]
    fn reconfigure_persists_scale_and_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs");
        let mut layout = OutputLayout::new(OutputSettings {
            state_path: Some(path.clone()),
            ..OutputSettings::default()
        });
        layout.add("DP-1", (1920, 1080).into());
        layout.add("DP-2", (1920, 1080).into());

        let change = OutputChange {
            name: "DP-2".into(),
            enabled: true,
            mode: None,
            scale: Some(2.0),
            transform: None,
            position: Some(Point::from((-960, 0))),
        };
        let plan = layout.reconfigure(&change, (1920, 1080).into()).unwrap();
        assert_eq!(plan.scale, 2.0);
        assert_eq!(plan.position, Point::from((-960, 0)));
        assert_eq!(layout.geometry("DP-2"), Some(rect(-960, 0, 960, 540)));

        let saved = state_file::load(&path, "DP-2").unwrap().unwrap();
        assert_eq!((saved.enabled, saved.scale, saved.x, saved.y), (true, 2.0, -960, 0));

        // A later connect restores the reconfigured state.
        let mut restarted = OutputLayout::new(OutputSettings {
            state_path: Some(path),
            ..OutputSettings::default()
        });
        let restored = restarted.add("DP-2", (1920, 1080).into());
        assert_eq!(restored, plan);
    }

    #[test]
    fn reconfigure_can_disable_and_rejects_bad_requests() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs");
        let mut layout = OutputLayout::new(OutputSettings {
            state_path: Some(path.clone()),
            ..OutputSettings::default()
        });
        layout.add("DP-1", (1920, 1080).into());

        let bad_scale = OutputChange {
            enabled: true,
            scale: Some(0.0),
            ..OutputChange::disable("DP-1")
        };
        assert!(layout.reconfigure(&bad_scale, (1920, 1080).into()).is_err());
        assert!(
            layout
                .reconfigure(&OutputChange::disable("HDMI-A-1"), (1920, 1080).into())
                .is_err()
        );
        assert_eq!(layout.plan("DP-1").map(|plan| plan.scale), Some(1.0));

        let plan = layout
            .reconfigure(&OutputChange::disable("DP-1"), (1920, 1080).into())
            .unwrap();
        assert!(!plan.enabled);
        assert_eq!(layout.geometry("DP-1"), None);
        assert!(!state_file::load(&path, "DP-1").unwrap().unwrap().enabled);
    }

    #[test]
    fn parses_transform_names() {
        assert_eq!(parse_transform("rotate-90"), Some(Transform::_90));
        assert_eq!(parse_transform("Flipped-270"), Some(Transform::Flipped270));
        assert_eq!(parse_transform("sideways"), None);
        for value in 0..8 {
            assert_eq!(transform_to_wl(transform_from_wl(value)), value);
        }
    }
}
