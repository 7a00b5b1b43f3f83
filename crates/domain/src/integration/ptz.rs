//! VISCA pan/tilt/zoom cameras.
//!
//! Timeline values are normalised (`-1.0..=1.0` speeds, `0.0..=1.0` zoom)
//! and quantised here to the camera's native ranges, so two timelines that
//! differ below one speed step produce equal states.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{
    ActionDefinition, ActionEffect, ActionError, ActionRegistry, Integration, Tracked, changed,
    parse_payload, relevant_objects,
};
use crate::command::{Command, CommandContext};
use crate::driver::{DeviceType, ExecutionMode};
use crate::error::DomainError;
use crate::status::{StatusCatalog, StatusCode, StatusDetail, context_map, private};
use crate::timeline::{DeviceTimelineState, Mappings};

pub const MAX_PAN_SPEED: i8 = 0x18;
pub const MAX_TILT_SPEED: i8 = 0x17;
pub const MAX_ZOOM_SPEED: i8 = 7;
pub const MAX_FOCUS_SPEED: i8 = 7;
pub const MAX_ZOOM_POSITION: u16 = 0x4000;

pub struct PtzDevice;

fn default_tcp_port() -> u16 {
    5678
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_address() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PtzTransport {
    Tcp {
        host: String,
        #[serde(default = "default_tcp_port")]
        port: u16,
    },
    Serial {
        port: String,
        #[serde(default = "default_baud_rate", rename = "baudRate", alias = "baudrate")]
        baud_rate: u32,
    },
}

impl std::fmt::Display for PtzTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "{}:{}", host, port),
            Self::Serial { port, baud_rate } => write!(f, "{}@{}", port, baud_rate),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PtzOptions {
    pub transport: PtzTransport,
    /// Camera address on the VISCA bus, 1..=7
    #[serde(default = "default_address")]
    pub address: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FocusMode {
    Auto,
    Manual,
}

/// Timeline content of a PTZ layer
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PtzContent {
    Power { on: bool },
    Preset { preset: u8 },
    PanTiltSpeed { pan: f64, tilt: f64 },
    ZoomSpeed { speed: f64 },
    /// Absolute zoom, 0 wide to 1 tele
    Zoom { position: f64 },
    FocusMode { mode: FocusMode },
    FocusSpeed { speed: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PanTilt {
    pub pan: i8,
    pub tilt: i8,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PtzState {
    pub power: Option<Tracked<bool>>,
    pub preset: Option<Tracked<u8>>,
    pub pan_tilt: Option<Tracked<PanTilt>>,
    pub zoom_speed: Option<Tracked<i8>>,
    pub zoom_position: Option<Tracked<u16>>,
    pub focus_mode: Option<Tracked<FocusMode>>,
    pub focus_speed: Option<Tracked<i8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PtzQuery {
    Power,
    FocusMode,
    ZoomPosition,
    PanTiltPosition,
}

impl PtzQuery {
    pub const ALL: [PtzQuery; 4] = [
        Self::Power,
        Self::FocusMode,
        Self::ZoomPosition,
        Self::PanTiltPosition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::FocusMode => "focusMode",
            Self::ZoomPosition => "zoomPosition",
            Self::PanTiltPosition => "panTiltPosition",
        }
    }
}

/// Speeds are signed: negative is left/down/wide/near, 0 stops
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PtzCommand {
    Power { on: bool },
    RecallPreset { preset: u8 },
    StorePreset { preset: u8 },
    Home,
    PanTilt { pan: i8, tilt: i8 },
    ZoomSpeed { speed: i8 },
    ZoomPosition { position: u16 },
    FocusMode { mode: FocusMode },
    FocusSpeed { speed: i8 },
    Inquire { query: PtzQuery },
}

/// PTZ-specific status codes
#[derive(Debug, Clone, PartialEq)]
pub enum PtzStatus {
    Disconnected {
        device_name: String,
        target: String,
        reason: String,
    },
}

impl private::Sealed for PtzStatus {}

impl StatusCatalog for PtzStatus {
    fn code(&self) -> &'static str {
        match self {
            Self::Disconnected { .. } => "PTZ_DISCONNECTED",
        }
    }

    fn severity(&self) -> StatusCode {
        match self {
            Self::Disconnected { .. } => StatusCode::Bad,
        }
    }

    fn default_template(&self) -> &'static str {
        match self {
            Self::Disconnected { .. } => "{{deviceName}} disconnected from {{target}}: {{reason}}",
        }
    }

    fn context(&self) -> Map<String, Value> {
        match self {
            Self::Disconnected {
                device_name,
                target,
                reason,
            } => context_map(json!({
                "deviceName": device_name,
                "target": target,
                "reason": reason,
            })),
        }
    }
}

/// Map `-1.0..=1.0` onto `-max..=max`
fn quantize_speed(value: f64, max: i8) -> i8 {
    if !value.is_finite() {
        return 0;
    }
    let max = f64::from(max);
    (value.clamp(-1.0, 1.0) * max).round() as i8
}

fn quantize_zoom(position: f64) -> u16 {
    if !position.is_finite() {
        return 0;
    }
    (position.clamp(0.0, 1.0) * f64::from(MAX_ZOOM_POSITION)).round() as u16
}

const MANIFEST: &[ActionDefinition] = &[
    ActionDefinition {
        id: "resyncState",
        name: "Resync state",
        has_payload: false,
    },
    ActionDefinition {
        id: "recallPreset",
        name: "Recall preset",
        has_payload: true,
    },
    ActionDefinition {
        id: "storePreset",
        name: "Store preset",
        has_payload: true,
    },
    ActionDefinition {
        id: "home",
        name: "Home position",
        has_payload: false,
    },
    ActionDefinition {
        id: "queryState",
        name: "Query camera state",
        has_payload: false,
    },
];

#[derive(Debug, Deserialize)]
struct PresetPayload {
    preset: u8,
}

fn action_command(action: &str, command: PtzCommand) -> Command<PtzCommand> {
    Command::new(command, CommandContext::internal(format!("action:{}", action)))
}

fn recall_preset(
    _options: &PtzOptions,
    payload: Option<&Value>,
) -> Result<ActionEffect<PtzCommand>, ActionError> {
    let PresetPayload { preset } = parse_payload("recallPreset", payload)?;
    Ok(ActionEffect::Enqueue(vec![action_command(
        "recallPreset",
        PtzCommand::RecallPreset { preset },
    )]))
}

fn store_preset(
    _options: &PtzOptions,
    payload: Option<&Value>,
) -> Result<ActionEffect<PtzCommand>, ActionError> {
    let PresetPayload { preset } = parse_payload("storePreset", payload)?;
    Ok(ActionEffect::Enqueue(vec![action_command(
        "storePreset",
        PtzCommand::StorePreset { preset },
    )]))
}

fn home(
    _options: &PtzOptions,
    _payload: Option<&Value>,
) -> Result<ActionEffect<PtzCommand>, ActionError> {
    Ok(ActionEffect::Enqueue(vec![action_command(
        "home",
        PtzCommand::Home,
    )]))
}

fn query_state(
    _options: &PtzOptions,
    _payload: Option<&Value>,
) -> Result<ActionEffect<PtzCommand>, ActionError> {
    Ok(ActionEffect::Enqueue(
        PtzQuery::ALL
            .iter()
            .map(|query| action_command("queryState", PtzCommand::Inquire { query: *query }))
            .collect(),
    ))
}

/// Emit a command when a speed field changed; a removed speed stops the axis
fn speed_command<T: Copy + PartialEq>(
    old: &Option<Tracked<T>>,
    new: &Option<Tracked<T>>,
    stopped: T,
    make: impl Fn(T) -> PtzCommand,
) -> Option<Command<PtzCommand>> {
    if !changed(old.as_ref(), new.as_ref()) {
        return None;
    }
    match (old, new) {
        (_, Some(tracked)) => Some(Command::new(make(tracked.value), tracked.context.clone())),
        (Some(previous), None) if previous.value != stopped => {
            Some(Command::new(make(stopped), previous.context.clone()))
        }
        _ => None,
    }
}

/// Emit a command only when a value is set and differs
fn value_command<T: Copy + PartialEq>(
    old: &Option<Tracked<T>>,
    new: &Option<Tracked<T>>,
    make: impl Fn(T) -> PtzCommand,
) -> Option<Command<PtzCommand>> {
    match new {
        Some(tracked) if changed(old.as_ref(), Some(tracked)) => {
            Some(Command::new(make(tracked.value), tracked.context.clone()))
        }
        _ => None,
    }
}

impl Integration for PtzDevice {
    type Options = PtzOptions;
    type State = PtzState;
    type Command = PtzCommand;

    const DEVICE_TYPE: DeviceType = DeviceType::Ptz;

    fn device_name(device_id: &str, _options: &Self::Options) -> String {
        format!("PTZ {}", device_id)
    }

    fn execution_mode(_options: &Self::Options) -> ExecutionMode {
        ExecutionMode::Sequential
    }

    fn validate_options(options: &Self::Options) -> Result<(), DomainError> {
        if !(1..=7).contains(&options.address) {
            return Err(DomainError::InvalidConfiguration(format!(
                "ptz address must be 1..=7, got {}",
                options.address
            )));
        }
        match &options.transport {
            PtzTransport::Tcp { host, .. } if host.trim().is_empty() => Err(
                DomainError::InvalidConfiguration("ptz tcp host is empty".into()),
            ),
            PtzTransport::Serial { port, .. } if port.trim().is_empty() => Err(
                DomainError::InvalidConfiguration("ptz serial port is empty".into()),
            ),
            _ => Ok(()),
        }
    }

    fn build_state(timeline: &DeviceTimelineState, mappings: &Mappings) -> Self::State {
        let mut state = PtzState::default();
        for object in relevant_objects::<Self>(timeline, mappings) {
            let Ok(content) = object.object.content.parse::<PtzContent>() else {
                continue;
            };
            // First object wins per field; objects arrive strongest first
            match content {
                PtzContent::Power { on } => {
                    state
                        .power
                        .get_or_insert_with(|| Tracked::from_object(on, object));
                }
                PtzContent::Preset { preset } => {
                    state
                        .preset
                        .get_or_insert_with(|| Tracked::from_object(preset, object));
                }
                PtzContent::PanTiltSpeed { pan, tilt } => {
                    let value = PanTilt {
                        pan: quantize_speed(pan, MAX_PAN_SPEED),
                        tilt: quantize_speed(tilt, MAX_TILT_SPEED),
                    };
                    state
                        .pan_tilt
                        .get_or_insert_with(|| Tracked::from_object(value, object));
                }
                PtzContent::ZoomSpeed { speed } => {
                    let value = quantize_speed(speed, MAX_ZOOM_SPEED);
                    state
                        .zoom_speed
                        .get_or_insert_with(|| Tracked::from_object(value, object));
                }
                PtzContent::Zoom { position } => {
                    let value = quantize_zoom(position);
                    state
                        .zoom_position
                        .get_or_insert_with(|| Tracked::from_object(value, object));
                }
                PtzContent::FocusMode { mode } => {
                    state
                        .focus_mode
                        .get_or_insert_with(|| Tracked::from_object(mode, object));
                }
                PtzContent::FocusSpeed { speed } => {
                    let value = quantize_speed(speed, MAX_FOCUS_SPEED);
                    state
                        .focus_speed
                        .get_or_insert_with(|| Tracked::from_object(value, object));
                }
            }
        }
        state
    }

    fn diff_states(old: &Self::State, new: &Self::State) -> Vec<Command<Self::Command>> {
        let power = value_command(&old.power, &new.power, |on| PtzCommand::Power { on });
        let (power_on, power_off) = match power {
            Some(cmd) if matches!(cmd.content(), PtzCommand::Power { on: true }) => {
                (Some(cmd), None)
            }
            other => (None, other),
        };

        let stop_pan_tilt = PanTilt { pan: 0, tilt: 0 };

        [
            power_on,
            value_command(&old.preset, &new.preset, |preset| {
                PtzCommand::RecallPreset { preset }
            }),
            value_command(&old.zoom_position, &new.zoom_position, |position| {
                PtzCommand::ZoomPosition { position }
            }),
            value_command(&old.focus_mode, &new.focus_mode, |mode| {
                PtzCommand::FocusMode { mode }
            }),
            speed_command(&old.focus_speed, &new.focus_speed, 0, |speed| {
                PtzCommand::FocusSpeed { speed }
            }),
            speed_command(&old.zoom_speed, &new.zoom_speed, 0, |speed| {
                PtzCommand::ZoomSpeed { speed }
            }),
            speed_command(&old.pan_tilt, &new.pan_tilt, stop_pan_tilt, |pt| {
                PtzCommand::PanTilt {
                    pan: pt.pan,
                    tilt: pt.tilt,
                }
            }),
            power_off,
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn disconnected_status(
        device_id: &str,
        options: &Self::Options,
        reason: Option<&str>,
    ) -> Option<StatusDetail> {
        Some(StatusDetail::new(PtzStatus::Disconnected {
            device_name: Self::device_name(device_id, options),
            target: options.transport.to_string(),
            reason: reason.unwrap_or("not connected").to_string(),
        }))
    }

    fn describe(command: &Self::Command) -> String {
        match command {
            PtzCommand::Power { on: true } => "power on".into(),
            PtzCommand::Power { on: false } => "power off".into(),
            PtzCommand::RecallPreset { preset } => format!("recall preset {}", preset),
            PtzCommand::StorePreset { preset } => format!("store preset {}", preset),
            PtzCommand::Home => "home".into(),
            PtzCommand::PanTilt { pan, tilt } => format!("pan/tilt {}/{}", pan, tilt),
            PtzCommand::ZoomSpeed { speed } => format!("zoom speed {}", speed),
            PtzCommand::ZoomPosition { position } => format!("zoom to {:#06x}", position),
            PtzCommand::FocusMode { mode } => format!("focus mode {:?}", mode).to_lowercase(),
            PtzCommand::FocusSpeed { speed } => format!("focus speed {}", speed),
            PtzCommand::Inquire { query } => format!("inquire {}", query.as_str()),
        }
    }

    fn action_manifest() -> &'static [ActionDefinition] {
        MANIFEST
    }

    fn actions() -> ActionRegistry<Self> {
        ActionRegistry::with_common()
            .register("recallPreset", recall_preset)
            .register("storePreset", store_preset)
            .register("home", home)
            .register("queryState", query_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::parse_options;
    use crate::timeline::{
        Enable, Instance, Mapping, ResolvedObject, TimelineContent, TimelineObject,
    };

    fn mappings() -> Mappings {
        let mut mappings = Mappings::new();
        mappings.insert("cam1".into(), Mapping::new(DeviceType::Ptz, "ptz0"));
        mappings.insert("cam1_move".into(), Mapping::new(DeviceType::Ptz, "ptz0"));
        mappings
    }

    fn object(id: &str, layer: &str, content: Value) -> ResolvedObject {
        ResolvedObject::new(
            TimelineObject::new(
                id,
                layer,
                TimelineContent::new(DeviceType::Ptz, content),
                Enable::new(0, None),
            ),
            Instance { start: 0, end: None },
        )
    }

    fn build(objects: Vec<ResolvedObject>) -> PtzState {
        PtzDevice::build_state(&DeviceTimelineState::new(0, objects), &mappings())
    }

    fn contents(commands: &[Command<PtzCommand>]) -> Vec<PtzCommand> {
        commands.iter().map(|c| c.content().clone()).collect()
    }

    #[test]
    fn test_options_defaults() {
        let options =
            parse_options::<PtzDevice>(&json!({"transport": {"type": "tcp", "host": "10.0.0.5"}}))
                .unwrap();
        assert_eq!(options.address, 1);
        assert_eq!(
            options.transport,
            PtzTransport::Tcp {
                host: "10.0.0.5".into(),
                port: 5678
            }
        );

        let serial = parse_options::<PtzDevice>(
            &json!({"transport": {"type": "serial", "port": "/dev/ttyUSB0"}, "address": 2}),
        )
        .unwrap();
        assert_eq!(
            serial.transport,
            PtzTransport::Serial {
                port: "/dev/ttyUSB0".into(),
                baud_rate: 9600
            }
        );
    }

    #[test]
    fn test_address_validation() {
        let mut options =
            parse_options::<PtzDevice>(&json!({"transport": {"type": "tcp", "host": "cam"}}))
                .unwrap();
        options.address = 8;
        assert!(PtzDevice::validate_options(&options).is_err());
        options.address = 7;
        assert!(PtzDevice::validate_options(&options).is_ok());
    }

    #[test]
    fn test_quantization() {
        assert_eq!(quantize_speed(1.0, MAX_PAN_SPEED), 24);
        assert_eq!(quantize_speed(-2.0, MAX_PAN_SPEED), -24);
        assert_eq!(quantize_speed(0.5, MAX_ZOOM_SPEED), 4);
        assert_eq!(quantize_speed(f64::NAN, MAX_ZOOM_SPEED), 0);
        assert_eq!(quantize_zoom(1.0), MAX_ZOOM_POSITION);
        assert_eq!(quantize_zoom(-0.5), 0);
    }

    #[test]
    fn test_diff_from_empty_orders_commands() {
        let new = build(vec![
            object("move", "cam1_move", json!({"type": "panTiltSpeed", "pan": 0.5, "tilt": 0.0})),
            object("p", "cam1", json!({"type": "preset", "preset": 5})),
            object("pw", "cam1", json!({"type": "power", "on": true})),
            object("z", "cam1", json!({"type": "zoom", "position": 0.5})),
        ]);

        let commands = PtzDevice::diff_states(&PtzState::default(), &new);
        assert_eq!(
            contents(&commands),
            vec![
                PtzCommand::Power { on: true },
                PtzCommand::RecallPreset { preset: 5 },
                PtzCommand::ZoomPosition { position: 0x2000 },
                PtzCommand::PanTilt { pan: 12, tilt: 0 },
            ]
        );
        assert_eq!(commands[1].context().object_ids, vec!["p"]);
        assert_eq!(commands[1].context().layer, "cam1");
    }

    #[test]
    fn test_power_off_is_last() {
        let old = build(vec![
            object("pw", "cam1", json!({"type": "power", "on": true})),
            object("zs", "cam1_move", json!({"type": "zoomSpeed", "speed": 1.0})),
        ]);
        let new = build(vec![object("pw2", "cam1", json!({"type": "power", "on": false}))]);

        let commands = PtzDevice::diff_states(&old, &new);
        assert_eq!(
            contents(&commands),
            vec![
                PtzCommand::ZoomSpeed { speed: 0 },
                PtzCommand::Power { on: false },
            ]
        );
        // The stop carries the origin of the motion it ends
        assert_eq!(commands[0].context().object_ids, vec!["zs"]);
    }

    #[test]
    fn test_removed_preset_sends_nothing() {
        let old = build(vec![object("p", "cam1", json!({"type": "preset", "preset": 1}))]);
        let new = build(vec![]);
        assert!(PtzDevice::diff_states(&old, &new).is_empty());
    }

    #[test]
    fn test_diff_is_idempotent_and_deterministic() {
        let state = build(vec![
            object("p", "cam1", json!({"type": "preset", "preset": 2})),
            object("f", "cam1", json!({"type": "focusMode", "mode": "manual"})),
            object("fs", "cam1_move", json!({"type": "focusSpeed", "speed": -1.0})),
        ]);
        assert!(PtzDevice::diff_states(&state, &state).is_empty());

        let empty = PtzState::default();
        assert_eq!(
            PtzDevice::diff_states(&empty, &state),
            PtzDevice::diff_states(&empty, &state)
        );
    }

    #[test]
    fn test_higher_priority_object_wins() {
        let low = object("low", "cam1", json!({"type": "preset", "preset": 1}));
        let mut high = object("high", "cam1_move", json!({"type": "preset", "preset": 9}));
        high.object.priority = 10;

        let state = build(vec![low, high]);
        let preset = state.preset.unwrap();
        assert_eq!(preset.value, 9);
        assert_eq!(preset.context.object_ids, vec!["high"]);
    }

    #[test]
    fn test_sub_step_change_is_no_change() {
        let a = build(vec![object("m", "cam1_move", json!({"type": "zoomSpeed", "speed": 0.5}))]);
        let b = build(vec![object("m", "cam1_move", json!({"type": "zoomSpeed", "speed": 0.51}))]);
        assert!(PtzDevice::diff_states(&a, &b).is_empty());
    }

    #[test]
    fn test_query_state_action_enqueues_all_inquiries() {
        let options =
            parse_options::<PtzDevice>(&json!({"transport": {"type": "tcp", "host": "cam"}}))
                .unwrap();
        let effect = PtzDevice::actions()
            .execute("queryState", &options, None)
            .unwrap();
        match effect {
            ActionEffect::Enqueue(commands) => {
                assert_eq!(commands.len(), PtzQuery::ALL.len());
                assert!(commands[0].context().object_ids.is_empty());
            }
            other => panic!("unexpected effect {:?}", other),
        }
    }

    #[test]
    fn test_recall_preset_requires_payload() {
        let options =
            parse_options::<PtzDevice>(&json!({"transport": {"type": "tcp", "host": "cam"}}))
                .unwrap();
        let err = PtzDevice::actions()
            .execute("recallPreset", &options, None)
            .unwrap_err();
        assert_eq!(err, ActionError::MissingPayload("recallPreset".into()));
    }

    #[test]
    fn test_disconnected_status() {
        let options =
            parse_options::<PtzDevice>(&json!({"transport": {"type": "tcp", "host": "cam"}}))
                .unwrap();
        let detail = PtzDevice::disconnected_status("ptz0", &options, Some("refused")).unwrap();
        assert_eq!(detail.code, "PTZ_DISCONNECTED");
        assert_eq!(detail.severity(), StatusCode::Bad);
        assert_eq!(
            detail.message(),
            "PTZ ptz0 disconnected from cam:5678: refused"
        );
    }
}
