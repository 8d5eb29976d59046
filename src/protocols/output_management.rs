//! wlr-output-management: lets tools like wlr-randr and kanshi list and reconfigure outputs.

use std::collections::HashMap;
use std::sync::Mutex;

use smithay::output::{Mode, Output};
use smithay::reexports::wayland_protocols_wlr::output_management::v1::server::{
    zwlr_output_configuration_head_v1, zwlr_output_configuration_v1, zwlr_output_head_v1,
    zwlr_output_manager_v1, zwlr_output_mode_v1,
};
use smithay::reexports::wayland_server::backend::ClientId;
use smithay::reexports::wayland_server::protocol::wl_output;
use smithay::reexports::wayland_server::{
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource, WEnum,
};
use smithay::utils::{Logical, Point, Transform};

use crate::{
    Kristal,
    output::{OutputChange, transform_from_wl, transform_to_wl},
};

use zwlr_output_configuration_head_v1::ZwlrOutputConfigurationHeadV1;
use zwlr_output_configuration_v1::ZwlrOutputConfigurationV1;
use zwlr_output_head_v1::ZwlrOutputHeadV1;
use zwlr_output_manager_v1::ZwlrOutputManagerV1;
use zwlr_output_mode_v1::ZwlrOutputModeV1;

const VERSION: u32 = 2;

pub struct OutputManagementState {
    display: DisplayHandle,
    serial: u32,
    instances: Vec<ZwlrOutputManagerV1>,
    heads: HashMap<String, HeadData>,
}

pub trait OutputManagementHandler {
    fn output_management_state(&mut self) -> &mut OutputManagementState;
    /// Returns whether the configuration was accepted (and applied unless `test` is set).
    fn apply_output_configuration(&mut self, changes: Vec<OutputChange>, test: bool) -> bool;
}

/// Everything a head advertises. Compared with the last sent snapshot to find changes.
#[derive(Clone, Debug, PartialEq)]
struct HeadSnapshot {
    enabled: bool,
    modes: Vec<Mode>,
    current_mode: Option<Mode>,
    preferred_mode: Option<Mode>,
    position: Point<i32, Logical>,
    transform: Transform,
    scale: f64,
}

impl HeadSnapshot {
    fn of(output: &Output, enabled: bool) -> Self {
        Self {
            enabled,
            modes: output.modes(),
            current_mode: output.current_mode(),
            preferred_mode: output.preferred_mode(),
            position: output.current_location(),
            transform: output.current_transform(),
            scale: output.current_scale().fractional_scale(),
        }
    }
}

struct HeadData {
    output: Output,
    snapshot: Option<HeadSnapshot>,
    instances: Vec<HeadInstance>,
}

struct HeadInstance {
    head: ZwlrOutputHeadV1,
    modes: Vec<(ZwlrOutputModeV1, Mode)>,
}

pub struct OutputManagementGlobalData {
    filter: Box<dyn for<'c> Fn(&'c Client) -> bool + Send + Sync>,
}

/// Heads named by a configuration object. `None` marks a disabled head.
#[derive(Default)]
struct PendingConfiguration {
    serial: u32,
    used: bool,
    heads: Vec<(String, Option<ZwlrOutputConfigurationHeadV1>)>,
}

impl PendingConfiguration {
    fn configures(&self, name: &str) -> bool {
        self.heads.iter().any(|(configured, _)| configured == name)
    }

    fn changes(&self) -> Vec<OutputChange> {
        self.heads
            .iter()
            .map(|(name, head)| {
                let pending = head
                    .as_ref()
                    .and_then(|head| head.data::<ConfigurationHeadData>())
                    .and_then(|data| data.pending.lock().ok().map(|pending| pending.clone()));
                match (head, pending) {
                    (Some(_), Some(pending)) => pending.into_change(name),
                    (Some(_), None) => PendingHead::default().into_change(name),
                    (None, _) => OutputChange::disable(name.as_str()),
                }
            })
            .collect()
    }
}

pub struct ConfigurationData {
    inner: Mutex<PendingConfiguration>,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct PendingHead {
    mode: Option<Mode>,
    scale: Option<f64>,
    transform: Option<Transform>,
    position: Option<Point<i32, Logical>>,
}

impl PendingHead {
    fn into_change(self, name: &str) -> OutputChange {
        OutputChange {
            name: name.to_owned(),
            enabled: true,
            mode: self.mode,
            scale: self.scale,
            transform: self.transform,
            position: self.position,
        }
    }
}

pub struct ConfigurationHeadData {
    pending: Mutex<PendingHead>,
}

impl OutputManagementState {
    pub fn new<D, F>(display: &DisplayHandle, filter: F) -> Self
    where
        D: GlobalDispatch<ZwlrOutputManagerV1, OutputManagementGlobalData>,
        D: Dispatch<ZwlrOutputManagerV1, ()>,
        D: 'static,
        F: for<'c> Fn(&'c Client) -> bool + Send + Sync + 'static,
    {
        let global_data = OutputManagementGlobalData {
            filter: Box::new(filter),
        };
        display.create_global::<D, ZwlrOutputManagerV1, _>(VERSION, global_data);
        Self {
            display: display.clone(),
            serial: 0,
            instances: Vec::new(),
            heads: HashMap::new(),
        }
    }

    /// Starts tracking `output`. Clients learn about it on the next [`refresh`].
    pub fn add_head(&mut self, output: &Output) {
        self.heads.entry(output.name()).or_insert_with(|| HeadData {
            output: output.clone(),
            snapshot: None,
            instances: Vec::new(),
        });
    }

    pub fn remove_head(&mut self, output: &Output) {
        let Some(data) = self.heads.remove(&output.name()) else {
            return;
        };
        for instance in data.instances {
            instance.finish();
        }
        self.done();
    }

    pub fn output(&self, name: &str) -> Option<&Output> {
        self.heads.get(name).map(|data| &data.output)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Output> {
        self.heads.values().map(|data| &data.output)
    }

    fn update(&mut self, snapshots: Vec<(String, HeadSnapshot)>) {
        let mut changed = false;
        for (name, snapshot) in snapshots {
            let Some(data) = self.heads.get_mut(&name) else {
                continue;
            };
            if data.snapshot.as_ref() == Some(&snapshot) {
                continue;
            }
            changed = true;

            match data.snapshot.take() {
                None => {
                    for manager in &self.instances {
                        if let Some(client) = manager.client() {
                            data.add_instance::<Kristal>(&self.display, &client, manager, &snapshot);
                        }
                    }
                }
                Some(previous) => {
                    for instance in &mut data.instances {
                        instance.send_changes::<Kristal>(&self.display, &previous, &snapshot);
                    }
                }
            }
            data.snapshot = Some(snapshot);
        }

        if changed {
            self.done();
        }
    }

    fn done(&mut self) {
        self.serial = self.serial.wrapping_add(1);
        for manager in &self.instances {
            manager.done(self.serial);
        }
    }
}

/// Sends every head whose state changed since the last call, followed by `done`.
pub fn refresh(state: &mut Kristal) {
    let snapshots: Vec<(String, HeadSnapshot)> = state
        .output_management_state
        .heads
        .values()
        .map(|data| {
            let name = data.output.name();
            let enabled = state
                .output_layout
                .geometry(&name)
                .or_else(|| state.space.output_geometry(&data.output))
                .is_some();
            let snapshot = HeadSnapshot::of(&data.output, enabled);
            (name, snapshot)
        })
        .collect();

    state.output_management_state.update(snapshots);
}

impl HeadData {
    fn add_instance<D>(
        &mut self,
        handle: &DisplayHandle,
        client: &Client,
        manager: &ZwlrOutputManagerV1,
        snapshot: &HeadSnapshot,
    ) where
        D: Dispatch<ZwlrOutputHeadV1, String>,
        D: Dispatch<ZwlrOutputModeV1, Mode>,
        D: 'static,
    {
        let name = self.output.name();
        let head = match client.create_resource::<ZwlrOutputHeadV1, _, D>(
            handle,
            manager.version(),
            name.clone(),
        ) {
            Ok(head) => head,
            Err(err) => {
                tracing::warn!("failed to create output head: {err}");
                return;
            }
        };
        manager.head(&head);

        let properties = self.output.physical_properties();
        head.name(name.clone());
        head.description(format!("{} {} ({name})", properties.make, properties.model));
        if properties.size.w > 0 && properties.size.h > 0 {
            head.physical_size(properties.size.w, properties.size.h);
        }

        let mut instance = HeadInstance {
            head,
            modes: Vec::new(),
        };
        instance.advertise_modes::<D>(handle, client, snapshot);
        instance.head.enabled(i32::from(snapshot.enabled));
        if snapshot.enabled {
            instance.send_current(snapshot);
        }
        if instance.head.version() >= 2 {
            instance.head.make(properties.make);
            instance.head.model(properties.model);
            instance.head.serial_number(properties.serial_number);
        }

        self.instances.push(instance);
    }
}

impl HeadInstance {
    fn advertise_modes<D>(&mut self, handle: &DisplayHandle, client: &Client, snapshot: &HeadSnapshot)
    where
        D: Dispatch<ZwlrOutputModeV1, Mode>,
        D: 'static,
    {
        for mode in &snapshot.modes {
            let wl_mode = match client.create_resource::<ZwlrOutputModeV1, _, D>(
                handle,
                self.head.version(),
                *mode,
            ) {
                Ok(wl_mode) => wl_mode,
                Err(err) => {
                    tracing::warn!("failed to create output mode: {err}");
                    continue;
                }
            };
            self.head.mode(&wl_mode);
            wl_mode.size(mode.size.w, mode.size.h);
            if mode.refresh > 0 {
                wl_mode.refresh(mode.refresh);
            }
            if snapshot.preferred_mode == Some(*mode) {
                wl_mode.preferred();
            }
            self.modes.push((wl_mode, *mode));
        }
    }

    fn send_current(&self, snapshot: &HeadSnapshot) {
        if let Some(current) = snapshot.current_mode
            && let Some((wl_mode, _)) = self.modes.iter().find(|(_, mode)| *mode == current)
        {
            self.head.current_mode(wl_mode);
        }
        self.head.position(snapshot.position.x, snapshot.position.y);
        self.head.transform(wl_transform(snapshot.transform));
        self.head.scale(snapshot.scale);
    }

    fn send_changes<D>(&mut self, handle: &DisplayHandle, previous: &HeadSnapshot, next: &HeadSnapshot)
    where
        D: Dispatch<ZwlrOutputModeV1, Mode>,
        D: 'static,
    {
        if previous.modes != next.modes || previous.preferred_mode != next.preferred_mode {
            for (wl_mode, _) in self.modes.drain(..) {
                wl_mode.finished();
            }
            if let Some(client) = self.head.client() {
                self.advertise_modes::<D>(handle, &client, next);
            }
        }
        if previous.enabled != next.enabled {
            self.head.enabled(i32::from(next.enabled));
        }
        if next.enabled {
            self.send_current(next);
        }
    }

    fn finish(self) {
        for (wl_mode, _) in self.modes {
            wl_mode.finished();
        }
        self.head.finished();
    }
}

fn wl_transform(transform: Transform) -> wl_output::Transform {
    wl_output::Transform::try_from(transform_to_wl(transform)).unwrap_or(wl_output::Transform::Normal)
}

fn set_once<T>(resource: &ZwlrOutputConfigurationHeadV1, slot: &mut Option<T>, value: T, what: &str) {
    if slot.is_some() {
        resource.post_error(
            zwlr_output_configuration_head_v1::Error::AlreadySet,
            format!("{what} already set"),
        );
        return;
    }
    *slot = Some(value);
}

impl<D> GlobalDispatch<ZwlrOutputManagerV1, OutputManagementGlobalData, D>
    for OutputManagementState
where
    D: GlobalDispatch<ZwlrOutputManagerV1, OutputManagementGlobalData>,
    D: Dispatch<ZwlrOutputManagerV1, ()>,
    D: Dispatch<ZwlrOutputHeadV1, String>,
    D: Dispatch<ZwlrOutputModeV1, Mode>,
    D: OutputManagementHandler,
{
    fn bind(
        state: &mut D,
        handle: &DisplayHandle,
        client: &Client,
        resource: New<ZwlrOutputManagerV1>,
        _global_data: &OutputManagementGlobalData,
        data_init: &mut DataInit<'_, D>,
    ) {
        let manager = data_init.init(resource, ());

        let protocol_state = state.output_management_state();
        for data in protocol_state.heads.values_mut() {
            if let Some(snapshot) = data.snapshot.clone() {
                data.add_instance::<D>(handle, client, &manager, &snapshot);
            }
        }
        manager.done(protocol_state.serial);

        protocol_state.instances.push(manager);
    }

    fn can_view(client: Client, global_data: &OutputManagementGlobalData) -> bool {
        (global_data.filter)(&client)
    }
}

impl<D> Dispatch<ZwlrOutputManagerV1, (), D> for OutputManagementState
where
    D: Dispatch<ZwlrOutputManagerV1, ()>,
    D: Dispatch<ZwlrOutputConfigurationV1, ConfigurationData>,
    D: OutputManagementHandler,
{
    fn request(
        state: &mut D,
        _client: &Client,
        resource: &ZwlrOutputManagerV1,
        request: <ZwlrOutputManagerV1 as Resource>::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            zwlr_output_manager_v1::Request::CreateConfiguration { id, serial } => {
                data_init.init(
                    id,
                    ConfigurationData {
                        inner: Mutex::new(PendingConfiguration {
                            serial,
                            ..PendingConfiguration::default()
                        }),
                    },
                );
            }
            zwlr_output_manager_v1::Request::Stop => {
                resource.finished();
                state
                    .output_management_state()
                    .instances
                    .retain(|instance| instance != resource);
            }
            _ => {}
        }
    }

    fn destroyed(state: &mut D, _client: ClientId, resource: &ZwlrOutputManagerV1, _data: &()) {
        state
            .output_management_state()
            .instances
            .retain(|instance| instance != resource);
    }
}

impl<D> Dispatch<ZwlrOutputHeadV1, String, D> for OutputManagementState
where
    D: Dispatch<ZwlrOutputHeadV1, String>,
    D: OutputManagementHandler,
{
    fn request(
        _state: &mut D,
        _client: &Client,
        _resource: &ZwlrOutputHeadV1,
        _request: <ZwlrOutputHeadV1 as Resource>::Request,
        _data: &String,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
    }

    fn destroyed(state: &mut D, _client: ClientId, resource: &ZwlrOutputHeadV1, name: &String) {
        if let Some(data) = state.output_management_state().heads.get_mut(name) {
            data.instances.retain(|instance| &instance.head != resource);
        }
    }
}

impl<D> Dispatch<ZwlrOutputModeV1, Mode, D> for OutputManagementState
where
    D: Dispatch<ZwlrOutputModeV1, Mode>,
    D: OutputManagementHandler,
{
    fn request(
        _state: &mut D,
        _client: &Client,
        _resource: &ZwlrOutputModeV1,
        _request: <ZwlrOutputModeV1 as Resource>::Request,
        _data: &Mode,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
    }
}

impl<D> Dispatch<ZwlrOutputConfigurationV1, ConfigurationData, D> for OutputManagementState
where
    D: Dispatch<ZwlrOutputConfigurationV1, ConfigurationData>,
    D: Dispatch<ZwlrOutputConfigurationHeadV1, ConfigurationHeadData>,
    D: OutputManagementHandler,
{
    fn request(
        state: &mut D,
        _client: &Client,
        resource: &ZwlrOutputConfigurationV1,
        request: <ZwlrOutputConfigurationV1 as Resource>::Request,
        data: &ConfigurationData,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, D>,
    ) {
        let Ok(mut pending) = data.inner.lock() else {
            return;
        };

        match request {
            zwlr_output_configuration_v1::Request::EnableHead { id, head } => {
                let config_head = data_init.init(
                    id,
                    ConfigurationHeadData {
                        pending: Mutex::new(PendingHead::default()),
                    },
                );
                let name = head.data::<String>().cloned().unwrap_or_default();
                if let Some(error) = claim_error(&pending, &name) {
                    resource.post_error(error, format!("cannot configure head {name}"));
                    return;
                }
                pending.heads.push((name, Some(config_head)));
            }
            zwlr_output_configuration_v1::Request::DisableHead { head } => {
                let name = head.data::<String>().cloned().unwrap_or_default();
                if let Some(error) = claim_error(&pending, &name) {
                    resource.post_error(error, format!("cannot configure head {name}"));
                    return;
                }
                pending.heads.push((name, None));
            }
            zwlr_output_configuration_v1::Request::Apply => {
                drop(pending);
                finish_configuration(state, resource, data, false);
            }
            zwlr_output_configuration_v1::Request::Test => {
                drop(pending);
                finish_configuration(state, resource, data, true);
            }
            _ => {}
        }
    }
}

fn finish_configuration<D: OutputManagementHandler>(
    state: &mut D,
    resource: &ZwlrOutputConfigurationV1,
    data: &ConfigurationData,
    test: bool,
) {
    let (serial, changes) = {
        let Ok(mut pending) = data.inner.lock() else {
            return;
        };
        if pending.used {
            resource.post_error(
                zwlr_output_configuration_v1::Error::AlreadyUsed,
                "configuration already applied or tested",
            );
            return;
        }
        pending.used = true;
        (pending.serial, pending.changes())
    };

    if serial != state.output_management_state().serial {
        tracing::debug!("cancelling outdated output configuration");
        resource.cancelled();
        return;
    }
    if state.apply_output_configuration(changes, test) {
        resource.succeeded();
    } else {
        resource.failed();
    }
}

fn claim_error(
    pending: &PendingConfiguration,
    name: &str,
) -> Option<zwlr_output_configuration_v1::Error> {
    if pending.used {
        Some(zwlr_output_configuration_v1::Error::AlreadyUsed)
    } else if pending.configures(name) {
        Some(zwlr_output_configuration_v1::Error::AlreadyConfiguredHead)
    } else {
        None
    }
}

impl<D> Dispatch<ZwlrOutputConfigurationHeadV1, ConfigurationHeadData, D> for OutputManagementState
where
    D: Dispatch<ZwlrOutputConfigurationHeadV1, ConfigurationHeadData>,
    D: OutputManagementHandler,
{
    fn request(
        _state: &mut D,
        _client: &Client,
        resource: &ZwlrOutputConfigurationHeadV1,
        request: <ZwlrOutputConfigurationHeadV1 as Resource>::Request,
        data: &ConfigurationHeadData,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        let Ok(mut pending) = data.pending.lock() else {
            return;
        };

        match request {
            zwlr_output_configuration_head_v1::Request::SetMode { mode } => {
                match mode.data::<Mode>() {
                    Some(mode) => set_once(resource, &mut pending.mode, *mode, "mode"),
                    None => resource.post_error(
                        zwlr_output_configuration_head_v1::Error::InvalidMode,
                        "unknown mode",
                    ),
                }
            }
            zwlr_output_configuration_head_v1::Request::SetCustomMode {
                width,
                height,
                refresh,
            } => {
                if width <= 0 || height <= 0 || refresh < 0 {
                    resource.post_error(
                        zwlr_output_configuration_head_v1::Error::InvalidCustomMode,
                        format!("invalid custom mode {width}x{height}@{refresh}"),
                    );
                    return;
                }
                let mode = Mode {
                    size: (width, height).into(),
                    refresh,
                };
                set_once(resource, &mut pending.mode, mode, "mode");
            }
            zwlr_output_configuration_head_v1::Request::SetPosition { x, y } => {
                set_once(resource, &mut pending.position, Point::from((x, y)), "position");
            }
            zwlr_output_configuration_head_v1::Request::SetTransform { transform } => {
                match transform {
                    WEnum::Value(transform) => set_once(
                        resource,
                        &mut pending.transform,
                        transform_from_wl(u32::from(transform)),
                        "transform",
                    ),
                    WEnum::Unknown(value) => resource.post_error(
                        zwlr_output_configuration_head_v1::Error::InvalidTransform,
                        format!("invalid transform {value}"),
                    ),
                }
            }
            zwlr_output_configuration_head_v1::Request::SetScale { scale } => {
                if !(scale.is_finite() && scale > 0.0) {
                    resource.post_error(
                        zwlr_output_configuration_head_v1::Error::InvalidScale,
                        format!("invalid scale {scale}"),
                    );
                    return;
                }
                set_once(resource, &mut pending.scale, scale, "scale");
            }
            _ => {}
        }
    }
}

#[macro_export]
macro_rules! delegate_output_management {
    ($(@<$( $lt:tt $( : $clt:tt $(+ $dlt:tt )* )? ),+>)? $ty: ty) => {
        smithay::reexports::wayland_server::delegate_global_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            smithay::reexports::wayland_protocols_wlr::output_management::v1::server::zwlr_output_manager_v1::ZwlrOutputManagerV1: $crate::protocols::output_management::OutputManagementGlobalData
        ] => $crate::protocols::output_management::OutputManagementState);
        smithay::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            smithay::reexports::wayland_protocols_wlr::output_management::v1::server::zwlr_output_manager_v1::ZwlrOutputManagerV1: ()
        ] => $crate::protocols::output_management::OutputManagementState);
        smithay::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            smithay::reexports::wayland_protocols_wlr::output_management::v1::server::zwlr_output_head_v1::ZwlrOutputHeadV1: String
        ] => $crate::protocols::output_management::OutputManagementState);
        smithay::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            smithay::reexports::wayland_protocols_wlr::output_management::v1::server::zwlr_output_mode_v1::ZwlrOutputModeV1: smithay::output::Mode
        ] => $crate::protocols::output_management::OutputManagementState);
        smithay::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            smithay::reexports::wayland_protocols_wlr::output_management::v1::server::zwlr_output_configuration_v1::ZwlrOutputConfigurationV1: $crate::protocols::output_management::ConfigurationData
        ] => $crate::protocols::output_management::OutputManagementState);
        smithay::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            smithay::reexports::wayland_protocols_wlr::output_management::v1::server::zwlr_output_configuration_head_v1::ZwlrOutputConfigurationHeadV1: $crate::protocols::output_management::ConfigurationHeadData
        ] => $crate::protocols::output_management::OutputManagementState);
    };
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn mode(w: i32, h: i32) -> Mode {
        Mode {
            size: (w, h).into(),
            refresh: 60_000,
        }
    }

    #[test]
    fn disabled_and_enabled_heads_become_changes() {
        let pending = PendingConfiguration {
            serial: 4,
            used: false,
            heads: vec![("HDMI-A-1".into(), None)],
        };
        assert!(pending.configures("HDMI-A-1"));
        assert!(!pending.configures("DP-1"));
        assert_eq!(
            pending.changes(),
            vec![OutputChange::disable("HDMI-A-1")]
        );

        let head = PendingHead {
            mode: Some(mode(2560, 1440)),
            scale: Some(1.5),
            transform: None,
            position: Some(Point::from((1920, 0))),
        };
        assert_eq!(
            head.into_change("DP-1"),
            OutputChange {
                name: "DP-1".into(),
                enabled: true,
                mode: Some(mode(2560, 1440)),
                scale: Some(1.5),
                transform: None,
                position: Some(Point::from((1920, 0))),
            }
        );
    }

    #[test]
    fn heads_are_claimed_once_per_configuration() {
        let mut pending = PendingConfiguration::default();
        assert!(claim_error(&pending, "DP-1").is_none());
        pending.heads.push(("DP-1".into(), None));
        assert!(matches!(
            claim_error(&pending, "DP-1"),
            Some(zwlr_output_configuration_v1::Error::AlreadyConfiguredHead)
        ));
        pending.used = true;
        assert!(matches!(
            claim_error(&pending, "DP-2"),
            Some(zwlr_output_configuration_v1::Error::AlreadyUsed)
        ));
    }

    #[test]
    fn transforms_map_onto_wl_output() {
        assert_eq!(wl_transform(Transform::_90), wl_output::Transform::_90);
        assert_eq!(
            wl_transform(Transform::Flipped180),
            wl_output::Transform::Flipped180
        );
        assert_eq!(wl_transform(Transform::Normal), wl_output::Transform::Normal);
    }
}
