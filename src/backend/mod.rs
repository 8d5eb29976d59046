//! Session backends. `udev` drives real hardware, `winit` runs nested in a window.

pub mod udev;
pub mod winit;

use smithay::{
    desktop::layer_map_for_output,
    output::{Output, Scale as OutputScale},
};

use crate::{
    Kristal,
    geometry::Rect,
    output::{OutputChange, OutputPlan},
};

pub(crate) fn output_scale(scale: f64) -> OutputScale {
    let rounded = scale.round();
    if (scale - rounded).abs() < f64::EPSILON {
        OutputScale::Integer(rounded as i32)
    } else {
        OutputScale::Fractional(scale)
    }
}

impl Kristal {
    /// Applies a placement plan to an output and publishes it to the desktop.
    pub fn map_output(&mut self, output: &Output, plan: &OutputPlan) {
        output.change_current_state(
            None,
            Some(plan.transform),
            Some(output_scale(plan.scale)),
            Some(plan.position),
        );
        self.space.map_output(output, plan.position);
        layer_map_for_output(output).arrange();
        self.output_management_state.add_head(output);
        self.sync_output_area(output);
        self.refresh_output_management();
    }

    /// Announces a connected output that stays off until it is enabled through configuration.
    pub fn add_disabled_output(&mut self, output: &Output) {
        self.output_management_state.add_head(output);
        self.refresh_output_management();
    }

    /// Pushes the current layout-space box of `output` to the desktop.
    pub fn sync_output_area(&mut self, output: &Output) {
        let name = output.name();
        let geometry: Option<Rect> = self
            .output_layout
            .geometry(&name)
            .or_else(|| self.space.output_geometry(output));
        match geometry {
            Some(geometry) => {
                tracing::debug!(output = %name, ?geometry, "output area updated");
                self.desktop.set_output(&name, geometry);
                self.refresh_desktop();
            }
            None => tracing::warn!(output = %name, "output has no geometry"),
        }
    }

    /// Takes an output out of the layout while it stays connected.
    fn disable_output(&mut self, output: &Output) {
        let name = output.name();
        self.space.unmap_output(output);
        self.desktop.remove_output(&name);
        tracing::info!(output = %name, "output disabled");
        self.refresh_desktop();
    }

    pub fn unmap_output(&mut self, output: &Output) {
        let name = output.name();
        self.space.unmap_output(output);
        self.output_layout.remove(&name);
        self.desktop.remove_output(&name);
        self.output_management_state.remove_head(output);
        self.refresh_desktop();
        self.refresh_output_management();
    }

    pub fn refresh_output_management(&mut self) {
        crate::protocols::output_management::refresh(self);
    }

    /// Checks a whole output configuration and, unless `test` is set, applies it.
    pub fn apply_output_changes(&mut self, changes: &[OutputChange], test: bool) -> bool {
        for change in changes {
            let Some(output) = self.output_management_state.output(&change.name) else {
                tracing::warn!(output = %change.name, "configuration names an unknown output");
                return false;
            };
            if let Err(err) = change.validate() {
                tracing::warn!("rejecting output configuration: {err}");
                return false;
            }
            if let Some(mode) = change.mode
                && !output.modes().contains(&mode)
            {
                tracing::warn!(output = %change.name, ?mode, "rejecting unknown mode");
                return false;
            }
        }

        let enabled_after = self
            .output_management_state
            .outputs()
            .filter(|output| {
                let name = output.name();
                changes
                    .iter()
                    .find(|change| change.name == name)
                    .map_or(self.output_layout.geometry(&name).is_some(), |change| {
                        change.enabled
                    })
            })
            .count();
        if enabled_after == 0 {
            tracing::warn!("rejecting output configuration that disables every output");
            return false;
        }
        if test {
            return true;
        }

        let mut applied = true;
        for change in changes {
            let Some(output) = self.output_management_state.output(&change.name).cloned() else {
                continue;
            };
            if let Some(mode) = change.mode
                && output.current_mode() != Some(mode)
                && !udev::change_mode(self, &output, mode)
            {
                applied = false;
                continue;
            }

            let mode_size = output
                .current_mode()
                .map(|mode| mode.size)
                .unwrap_or_default();
            match self.output_layout.reconfigure(change, mode_size) {
                Ok(plan) if plan.enabled => self.map_output(&output, &plan),
                Ok(_) => self.disable_output(&output),
                Err(err) => {
                    tracing::warn!("failed to reconfigure output: {err}");
                    applied = false;
                }
            }
        }

        self.refresh_output_management();
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_scales_stay_integer() {
        assert!(matches!(output_scale(2.0), OutputScale::Integer(2)));
        assert!(matches!(output_scale(1.5), OutputScale::Fractional(s) if s == 1.5));
    }
}
