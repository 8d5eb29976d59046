use smithay::{
    backend::input::{
        AbsolutePositionEvent, Axis, AxisSource, ButtonState, Device, DeviceCapability, Event,
        InputBackend, InputEvent, KeyState, KeyboardKeyEvent, MouseButton, PointerAxisEvent,
        PointerButtonEvent, PointerMotionEvent, ProximityState, TabletToolButtonEvent,
        TabletToolEvent, TabletToolProximityEvent, TabletToolTipEvent, TabletToolTipState,
        TouchEvent,
    },
    desktop::layer_map_for_output,
    input::{
        keyboard::{FilterResult, Keysym, KeysymHandle, ModifiersState},
        pointer::{AxisFrame, ButtonEvent, MotionEvent, RelativeMotionEvent},
        touch::{DownEvent, UpEvent},
    },
    reexports::{input as libinput, wayland_server::protocol::wl_surface::WlSurface},
    utils::{Logical, Point, SERIAL_COUNTER},
    wayland::{
        pointer_constraints::{PointerConstraint, with_pointer_constraint},
        shell::wlr_layer::{KeyboardInteractivity, Layer as WlrLayer},
        tablet_manager::{TabletDescriptor, TabletSeatTrait},
    },
};

use crate::{
    config::{Direction, KeybindAction, LibinputSettings},
    state::Kristal,
};

/// Distance in logical pixels for keyboard move and resize.
const NUDGE: i32 = 32;

/// What an intercepted key press turns into once the keyboard is released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyAction {
    Bind(KeybindAction),
    SwitchVt(i32),
}

impl Kristal {
    pub fn handle_input_event<B: InputBackend>(&mut self, event: InputEvent<B>) {
        match event {
            InputEvent::Keyboard { event } => self.handle_keyboard_event::<B>(event),
            InputEvent::PointerMotion { event } => self.handle_pointer_motion::<B>(event),
            InputEvent::PointerMotionAbsolute { event } => {
                self.handle_pointer_motion_absolute::<B>(event)
            }
            InputEvent::PointerButton { event } => self.handle_pointer_button::<B>(event),
            InputEvent::PointerAxis { event } => self.handle_pointer_axis::<B>(event),
            InputEvent::TouchDown { event } => self.handle_touch_down::<B>(event),
            InputEvent::TouchUp { event } => self.handle_touch_up::<B>(event),
            InputEvent::TouchMotion { event } => self.handle_touch_motion::<B>(event),
            InputEvent::TouchFrame { .. } => {
                if let Some(touch) = self.seat.get_touch() {
                    touch.frame(self);
                }
            }
            InputEvent::TouchCancel { .. } => {
                if let Some(touch) = self.seat.get_touch() {
                    touch.cancel(self);
                }
            }
            InputEvent::TabletToolAxis { event } => self.handle_tablet_tool_axis::<B>(event),
            InputEvent::TabletToolProximity { event } => {
                self.handle_tablet_tool_proximity::<B>(event)
            }
            InputEvent::TabletToolTip { event } => self.handle_tablet_tool_tip::<B>(event),
            InputEvent::TabletToolButton { event } => {
                if let Some(tool) = self.seat.tablet_seat().get_tool(&event.tool()) {
                    tool.button(
                        event.button(),
                        event.button_state(),
                        SERIAL_COUNTER.next_serial(),
                        event.time_msec(),
                    );
                }
            }
            InputEvent::DeviceAdded { device } => {
                tracing::debug!(name = device.name(), "input device added");
                if device.has_capability(DeviceCapability::TabletTool) {
                    let dh = self.display_handle.clone();
                    self.seat
                        .tablet_seat()
                        .add_tablet::<Self>(&dh, &TabletDescriptor::from(&device));
                }
                if device.has_capability(DeviceCapability::Touch) && self.seat.get_touch().is_none()
                {
                    self.seat.add_touch();
                }
            }
            InputEvent::DeviceRemoved { device } => {
                tracing::debug!(name = device.name(), "input device removed");
                if device.has_capability(DeviceCapability::TabletTool) {
                    let tablet_seat = self.seat.tablet_seat();
                    tablet_seat.remove_tablet(&TabletDescriptor::from(&device));
                    if tablet_seat.count_tablets() == 0 {
                        tablet_seat.clear_tools();
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_keyboard_event<B: InputBackend>(&mut self, event: B::KeyboardKeyEvent) {
        let serial = SERIAL_COUNTER.next_serial();
        let time_msec = Event::time_msec(&event);
        let key_code = event.key_code();
        let key_state = event.state();
        let keyboard = self.keyboard.clone();

        // An exclusive layer (lock screen, launcher) swallows every key.
        if let Some(surface) = self.exclusive_layer() {
            if keyboard.current_focus().as_ref() != Some(&surface) {
                self.set_keyboard_focus(Some(surface));
            }
            keyboard.input::<(), _>(self, key_code, key_state, serial, time_msec, |_, _, _| {
                FilterResult::Forward
            });
            return;
        }

        let action = keyboard.input::<KeyAction, _>(
            self,
            key_code,
            key_state,
            serial,
            time_msec,
            |state, modifiers, handle| {
                if key_state != KeyState::Pressed {
                    return FilterResult::Forward;
                }
                match state.key_action(modifiers, &handle) {
                    Some(action) => FilterResult::Intercept(action),
                    None => FilterResult::Forward,
                }
            },
        );

        match action {
            Some(KeyAction::Bind(action)) => self.run_keybind_action(action),
            Some(KeyAction::SwitchVt(vt)) => crate::backend::udev::change_vt(self, vt),
            None => {}
        }
    }

    /// Tries every symbol the key produced, modified ones first, then the raw ones.
    fn key_action(&self, modifiers: &ModifiersState, handle: &KeysymHandle<'_>) -> Option<KeyAction> {
        let modified = handle.modified_syms();
        let raw = handle.raw_syms();

        if let Some(vt) = modified
            .iter()
            .chain(raw.iter())
            .find_map(|sym| vt_for_keysym(modifiers, *sym))
        {
            return Some(KeyAction::SwitchVt(vt));
        }

        modified
            .iter()
            .chain(raw.iter())
            .find_map(|sym| self.config.keybindings.action_for(modifiers, *sym))
            .map(KeyAction::Bind)
    }

    fn run_keybind_action(&mut self, action: KeybindAction) {
        tracing::debug!(?action, "key binding");
        match action {
            KeybindAction::Quit => {
                tracing::info!("quit requested");
                self.loop_signal.stop();
                return;
            }
            KeybindAction::Terminal => {
                let command = self.config.terminal.clone();
                self.spawn_command(&command);
            }
            KeybindAction::Launcher => {
                let command = self.config.launcher.clone();
                self.spawn_command(&command);
            }
            KeybindAction::Close => self.desktop.close_focused(),
            KeybindAction::FocusNext => {
                self.desktop.focus_next();
            }
            KeybindAction::FocusPrev => {
                self.desktop.focus_prev();
            }
            KeybindAction::Move(direction) => {
                let (dx, dy) = match direction {
                    Direction::Left => (-NUDGE, 0),
                    Direction::Right => (NUDGE, 0),
                    Direction::Up => (0, -NUDGE),
                    Direction::Down => (0, NUDGE),
                };
                self.desktop.move_focused_by(dx, dy);
            }
            KeybindAction::Resize(direction) => match direction {
                Direction::Left => self.desktop.resize_focused_by(-NUDGE, 0, true, false),
                Direction::Up => self.desktop.resize_focused_by(0, -NUDGE, false, true),
                Direction::Right => self.desktop.resize_focused_by(NUDGE, 0, false, false),
                Direction::Down => self.desktop.resize_focused_by(0, NUDGE, false, false),
            },
            KeybindAction::Layout(mode) => self.desktop.set_layout_mode(mode),
            KeybindAction::CycleLayout => self.desktop.cycle_layout_mode(),
            KeybindAction::SwitchWorkspace(workspace) => {
                self.desktop.switch_workspace(workspace);
            }
            KeybindAction::MoveToWorkspace(workspace) => {
                self.desktop.move_focused_to_workspace(workspace);
            }
        }
        self.refresh_desktop();
    }

    fn exclusive_layer(&self) -> Option<WlSurface> {
        self.space.outputs().find_map(|output| {
            let layers = layer_map_for_output(output);
            [WlrLayer::Overlay, WlrLayer::Top]
                .into_iter()
                .find_map(|layer_kind| {
                    layers.layers_on(layer_kind).find_map(|layer| {
                        let is_exclusive = layer.cached_state().keyboard_interactivity
                            == KeyboardInteractivity::Exclusive;
                        if !is_exclusive || layers.layer_geometry(layer).is_none() {
                            return None;
                        }
                        Some(layer.wl_surface().clone())
                    })
                })
        })
    }

    /// Focusable layer surface of one of `kinds` under `location`.
    fn layer_under(&self, kinds: &[WlrLayer], location: Point<f64, Logical>) -> Option<WlSurface> {
        let output = self.space.output_under(location).next()?;
        let output_geo = self.space.output_geometry(output)?;
        let layers = layer_map_for_output(output);
        let local = location - output_geo.loc.to_f64();

        kinds.iter().find_map(|kind| {
            let layer = layers.layer_under(*kind, local)?;
            layer
                .can_receive_keyboard_focus()
                .then(|| layer.wl_surface().clone())
        })
    }

    /// Moves keyboard focus to whatever a click at `location` hit.
    fn focus_at(&mut self, location: Point<f64, Logical>) {
        if let Some(layer) = self.layer_under(&[WlrLayer::Overlay, WlrLayer::Top], location) {
            self.set_keyboard_focus(Some(layer));
            return;
        }

        let hit = self
            .space
            .element_under(location)
            .map(|(window, _)| self.desktop.find_view(window));
        if let Some(view) = hit {
            // Override-redirect menus and tooltips never take focus.
            if let Some(id) = view {
                self.desktop.focus(id);
                self.refocus_view();
                self.refresh_desktop();
            }
            return;
        }

        self.desktop.clear_focus();
        self.refresh_desktop();
        let layer = self.layer_under(&[WlrLayer::Bottom, WlrLayer::Background], location);
        self.set_keyboard_focus(layer);
    }

    fn handle_pointer_motion<B: InputBackend>(&mut self, event: B::PointerMotionEvent) {
        let serial = SERIAL_COUNTER.next_serial();
        let pointer = self.pointer.clone();
        let mut location = self.pointer_location;

        if !self.desktop.grab().is_idle() {
            self.pointer_location = self.clamp_to_outputs(location + event.delta());
            if self.desktop.pointer_motion(self.pointer_location) {
                self.refresh_desktop();
            }
            pointer.motion(
                self,
                None,
                &MotionEvent {
                    location: self.pointer_location,
                    serial,
                    time: event.time_msec(),
                },
            );
            pointer.frame(self);
            return;
        }

        let under = self.surface_under(location);

        let mut pointer_locked = false;
        let mut pointer_confined = false;
        let mut confine_region = None;
        if let Some((surface, surface_loc)) = &under {
            with_pointer_constraint(surface, &pointer, |constraint| match constraint {
                Some(constraint) if constraint.is_active() => {
                    // Constraint does not apply if not within region
                    if !constraint
                        .region()
                        .is_none_or(|region| region.contains((location - *surface_loc).to_i32_round()))
                    {
                        return;
                    }
                    match &*constraint {
                        PointerConstraint::Locked(_) => pointer_locked = true,
                        PointerConstraint::Confined(confine) => {
                            pointer_confined = true;
                            confine_region = confine.region().cloned();
                        }
                    }
                }
                _ => {}
            });
        }

        pointer.relative_motion(
            self,
            under.clone(),
            &RelativeMotionEvent {
                delta: event.delta(),
                delta_unaccel: event.delta_unaccel(),
                utime: event.time(),
            },
        );

        if pointer_locked {
            pointer.frame(self);
            return;
        }

        location = self.clamp_to_outputs(location + event.delta());
        let new_under = self.surface_under(location);

        if pointer_confined && let Some((surface, surface_loc)) = &under {
            let left_surface = new_under.as_ref().map(|(new, _)| new) != Some(surface);
            let left_region = confine_region
                .as_ref()
                .is_some_and(|region| !region.contains((location - *surface_loc).to_i32_round()));
            if left_surface || left_region {
                pointer.frame(self);
                return;
            }
        }

        self.pointer_location = location;
        pointer.motion(
            self,
            new_under,
            &MotionEvent {
                location,
                serial,
                time: event.time_msec(),
            },
        );
        pointer.frame(self);

        self.maybe_activate_pointer_constraint();
        crate::backend::udev::queue_redraw_all(self);
    }

    fn handle_pointer_motion_absolute<B: InputBackend>(
        &mut self,
        event: B::PointerMotionAbsoluteEvent,
    ) {
        let Some(output_geo) = self
            .space
            .outputs()
            .next()
            .and_then(|output| self.space.output_geometry(output))
        else {
            return;
        };

        let location = event.position_transformed(output_geo.size) + output_geo.loc.to_f64();
        self.pointer_location = self.clamp_to_outputs(location);

        let serial = SERIAL_COUNTER.next_serial();
        let pointer = self.pointer.clone();

        let under = if self.desktop.grab().is_idle() {
            self.surface_under(self.pointer_location)
        } else {
            if self.desktop.pointer_motion(self.pointer_location) {
                self.refresh_desktop();
            }
            None
        };

        pointer.motion(
            self,
            under,
            &MotionEvent {
                location: self.pointer_location,
                serial,
                time: event.time_msec(),
            },
        );
        pointer.frame(self);
        self.maybe_activate_pointer_constraint();
    }

    fn handle_pointer_button<B: InputBackend>(&mut self, event: B::PointerButtonEvent) {
        let serial = SERIAL_COUNTER.next_serial();
        let button = event.button();
        let button_code = event.button_code();
        let button_state = event.state();
        let pointer = self.pointer.clone();

        // Keep pointer focus in sync with the cursor before sending the button, so
        // layer clients receive clicks even without a prior motion event.
        if !pointer.is_grabbed() && self.desktop.grab().is_idle() {
            let under = self.surface_under(self.pointer_location);
            pointer.motion(
                self,
                under,
                &MotionEvent {
                    location: self.pointer_location,
                    serial,
                    time: event.time_msec(),
                },
            );
            pointer.frame(self);
        }

        match button_state {
            ButtonState::Released => {
                if !self.desktop.grab().is_idle() {
                    self.desktop.release_grab();
                    self.refresh_desktop();
                }
            }
            ButtonState::Pressed => {
                if self.keyboard.modifier_state().alt
                    && !pointer.is_grabbed()
                    && let Some(id) = self.view_under(self.pointer_location)
                {
                    let started = match button {
                        Some(MouseButton::Left) => self.desktop.begin_move(id, self.pointer_location),
                        Some(MouseButton::Right) => {
                            self.desktop
                                .begin_resize(id, None, self.pointer_location)
                        }
                        _ => false,
                    };
                    if started {
                        self.refresh_desktop();
                        return;
                    }
                }

                if !pointer.is_grabbed() {
                    self.focus_at(self.pointer_location);
                }
            }
        }

        pointer.button(
            self,
            &ButtonEvent {
                button: button_code,
                state: button_state,
                serial,
                time: event.time_msec(),
            },
        );
        pointer.frame(self);
    }

    fn handle_pointer_axis<B: InputBackend>(&mut self, event: B::PointerAxisEvent) {
        // Like button events, keep pointer focus current so layer surfaces receive scroll.
        let pointer = self.pointer.clone();
        if !pointer.is_grabbed() && self.desktop.grab().is_idle() {
            let under = self.surface_under(self.pointer_location);
            pointer.motion(
                self,
                under,
                &MotionEvent {
                    location: self.pointer_location,
                    serial: SERIAL_COUNTER.next_serial(),
                    time: event.time_msec(),
                },
            );
            pointer.frame(self);
        }

        let horizontal_amount = event
            .amount(Axis::Horizontal)
            .unwrap_or_else(|| event.amount_v120(Axis::Horizontal).unwrap_or(0.0) * 3.0 / 120.0);
        let vertical_amount = event
            .amount(Axis::Vertical)
            .unwrap_or_else(|| event.amount_v120(Axis::Vertical).unwrap_or(0.0) * 3.0 / 120.0);
        let horizontal_amount_discrete = event.amount_v120(Axis::Horizontal);
        let vertical_amount_discrete = event.amount_v120(Axis::Vertical);

        let mut axis_frame = AxisFrame::new(event.time_msec()).source(event.source());

        if horizontal_amount != 0.0 {
            axis_frame = axis_frame.value(Axis::Horizontal, horizontal_amount);
            if let Some(discrete) = horizontal_amount_discrete {
                axis_frame = axis_frame.v120(Axis::Horizontal, discrete as i32);
            }
        }

        if vertical_amount != 0.0 {
            axis_frame = axis_frame.value(Axis::Vertical, vertical_amount);
            if let Some(discrete) = vertical_amount_discrete {
                axis_frame = axis_frame.v120(Axis::Vertical, discrete as i32);
            }
        }

        if event.source() == AxisSource::Finger {
            if event.amount(Axis::Horizontal) == Some(0.0) {
                axis_frame = axis_frame.stop(Axis::Horizontal);
            }
            if event.amount(Axis::Vertical) == Some(0.0) {
                axis_frame = axis_frame.stop(Axis::Vertical);
            }
        }

        pointer.axis(self, axis_frame);
        pointer.frame(self);
    }

    /// Maps an absolute device position onto the first output, honouring its transform.
    fn absolute_location<B: InputBackend, E: AbsolutePositionEvent<B>>(
        &self,
        event: &E,
    ) -> Option<Point<f64, Logical>> {
        let output = self.space.outputs().next()?;
        let output_geometry = self.space.output_geometry(output)?;

        let transform = output.current_transform();
        let size = transform.invert().transform_size(output_geometry.size);
        Some(
            transform.transform_point_in(event.position_transformed(size), &size.to_f64())
                + output_geometry.loc.to_f64(),
        )
    }

    fn handle_touch_down<B: InputBackend>(&mut self, event: B::TouchDownEvent) {
        let Some(touch) = self.seat.get_touch() else {
            return;
        };
        let Some(location) = self.absolute_location(&event) else {
            return;
        };

        let serial = SERIAL_COUNTER.next_serial();
        self.focus_at(location);

        let under = self.surface_under(location);
        touch.down(
            self,
            under,
            &DownEvent {
                slot: event.slot(),
                location,
                serial,
                time: event.time_msec(),
            },
        );
    }

    fn handle_touch_up<B: InputBackend>(&mut self, event: B::TouchUpEvent) {
        let Some(touch) = self.seat.get_touch() else {
            return;
        };
        touch.up(
            self,
            &UpEvent {
                slot: event.slot(),
                serial: SERIAL_COUNTER.next_serial(),
                time: event.time_msec(),
            },
        );
    }

    fn handle_touch_motion<B: InputBackend>(&mut self, event: B::TouchMotionEvent) {
        let Some(touch) = self.seat.get_touch() else {
            return;
        };
        let Some(location) = self.absolute_location(&event) else {
            return;
        };

        let under = self.surface_under(location);
        touch.motion(
            self,
            under,
            &smithay::input::touch::MotionEvent {
                slot: event.slot(),
                location,
                time: event.time_msec(),
            },
        );
    }

    fn handle_tablet_tool_axis<B: InputBackend>(&mut self, event: B::TabletToolAxisEvent) {
        let Some(location) = self.absolute_location(&event) else {
            return;
        };
        let tablet_seat = self.seat.tablet_seat();
        let pointer = self.pointer.clone();
        let under = self.surface_under(location);
        let tablet = tablet_seat.get_tablet(&TabletDescriptor::from(&event.device()));
        let tool = tablet_seat.get_tool(&event.tool());

        self.pointer_location = location;
        pointer.motion(
            self,
            under.clone(),
            &MotionEvent {
                location,
                serial: SERIAL_COUNTER.next_serial(),
                time: event.time_msec(),
            },
        );

        if let (Some(tablet), Some(tool)) = (tablet, tool) {
            if event.pressure_has_changed() {
                tool.pressure(event.pressure());
            }
            if event.distance_has_changed() {
                tool.distance(event.distance());
            }
            if event.tilt_has_changed() {
                tool.tilt(event.tilt());
            }
            if event.slider_has_changed() {
                tool.slider_position(event.slider_position());
            }
            if event.rotation_has_changed() {
                tool.rotation(event.rotation());
            }
            if event.wheel_has_changed() {
                tool.wheel(event.wheel_delta(), event.wheel_delta_discrete());
            }

            tool.motion(
                location,
                under,
                &tablet,
                SERIAL_COUNTER.next_serial(),
                event.time_msec(),
            );
        }

        pointer.frame(self);
    }

    fn handle_tablet_tool_proximity<B: InputBackend>(
        &mut self,
        event: B::TabletToolProximityEvent,
    ) {
        let Some(location) = self.absolute_location(&event) else {
            return;
        };
        let dh = self.display_handle.clone();
        let tablet_seat = self.seat.tablet_seat();
        let tool = event.tool();
        tablet_seat.add_tool::<Self>(self, &dh, &tool);

        let pointer = self.pointer.clone();
        let under = self.surface_under(location);
        let tablet = tablet_seat.get_tablet(&TabletDescriptor::from(&event.device()));
        let tool = tablet_seat.get_tool(&tool);

        self.pointer_location = location;
        pointer.motion(
            self,
            under.clone(),
            &MotionEvent {
                location,
                serial: SERIAL_COUNTER.next_serial(),
                time: event.time_msec(),
            },
        );
        pointer.frame(self);

        if let (Some(under), Some(tablet), Some(tool)) = (under, tablet, tool) {
            match event.state() {
                ProximityState::In => tool.proximity_in(
                    location,
                    under,
                    &tablet,
                    SERIAL_COUNTER.next_serial(),
                    event.time_msec(),
                ),
                ProximityState::Out => tool.proximity_out(event.time_msec()),
            }
        }
    }

    fn handle_tablet_tool_tip<B: InputBackend>(&mut self, event: B::TabletToolTipEvent) {
        let Some(tool) = self.seat.tablet_seat().get_tool(&event.tool()) else {
            return;
        };
        match event.tip_state() {
            TabletToolTipState::Down => {
                tool.tip_down(SERIAL_COUNTER.next_serial(), event.time_msec());
                self.focus_at(self.pointer_location);
            }
            TabletToolTipState::Up => tool.tip_up(event.time_msec()),
        }
    }
}

/// Ctrl+Alt+F1..F12, either as the keymap's XF86Switch_VT symbols or as plain function keys.
fn vt_for_keysym(modifiers: &ModifiersState, keysym: Keysym) -> Option<i32> {
    let raw = keysym.raw();
    let switch_first = Keysym::XF86_Switch_VT_1.raw();
    let switch_last = Keysym::XF86_Switch_VT_12.raw();
    if (switch_first..=switch_last).contains(&raw) {
        return Some((raw - switch_first + 1) as i32);
    }

    let first = Keysym::F1.raw();
    let last = Keysym::F12.raw();
    if modifiers.ctrl && modifiers.alt && (first..=last).contains(&raw) {
        return Some((raw - first + 1) as i32);
    }
    None
}

/// Applies the configured libinput options to a freshly added device.
pub fn configure_libinput_device(device: &mut libinput::Device, settings: &LibinputSettings) {
    if let Some(enabled) = settings.tap_to_click
        && device.config_tap_finger_count() > 0
        && let Err(err) = device.config_tap_set_enabled(enabled)
    {
        tracing::warn!(device = device.name(), "failed to set tap-to-click: {err:?}");
    }

    if let Some(enabled) = settings.natural_scroll
        && device.config_scroll_has_natural_scroll()
        && let Err(err) = device.config_scroll_set_natural_scroll_enabled(enabled)
    {
        tracing::warn!(device = device.name(), "failed to set natural scroll: {err:?}");
    }

    if let Some(speed) = settings.pointer_accel
        && device.config_accel_is_available()
        && let Err(err) = device.config_accel_set_speed(speed)
    {
        tracing::warn!(device = device.name(), "failed to set pointer acceleration: {err:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctrl_alt() -> ModifiersState {
        ModifiersState {
            ctrl: true,
            alt: true,
            ..Default::default()
        }
    }

    #[test]
    fn switch_vt_symbols_map_to_terminals() {
        let plain = ModifiersState::default();
        assert_eq!(vt_for_keysym(&plain, Keysym::XF86_Switch_VT_1), Some(1));
        assert_eq!(vt_for_keysym(&plain, Keysym::XF86_Switch_VT_12), Some(12));
    }

    #[test]
    fn function_keys_need_ctrl_and_alt() {
        assert_eq!(vt_for_keysym(&ctrl_alt(), Keysym::F3), Some(3));
        assert_eq!(vt_for_keysym(&ModifiersState::default(), Keysym::F3), None);
        assert_eq!(vt_for_keysym(&ctrl_alt(), Keysym::Return), None);
    }
}
