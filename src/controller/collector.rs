use crate::mapping::{ButtonMapping, KeyCode, Sample, TILT_LIMIT};
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use statum::{machine, state};
use std::sync::mpsc as std_mpsc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Full scale of the pedal axes on the wire
pub const PEDAL_MAX: f32 = 255.0;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

// Collector settings
#[derive(Clone, Debug)]
pub struct CollectorSettings {
    pub deadzone: f32,
    pub invert_tilt: bool,
    pub mapping: ButtonMapping,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            deadzone: 0.05,
            invert_tilt: false,
            mapping: ButtonMapping::default(),
        }
    }
}

// Collector errors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to initialize collector: {0}")]
    InitializationError(String),

    #[error("Failed to spawn collector thread: {0}")]
    ThreadError(String),
}

/// Control function a gamepad event drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    ShiftUp,
    ShiftDown,
    Handbrake,
}

/// Key a physical gamepad button stands for; bumpers are TL and TR
pub fn key_for_button(button: Button) -> Option<KeyCode> {
    match button {
        Button::LeftTrigger => Some(KeyCode::Tl),
        Button::RightTrigger => Some(KeyCode::Tr),
        Button::South => Some(KeyCode::South),
        Button::East => Some(KeyCode::East),
        Button::West => Some(KeyCode::West),
        Button::North => Some(KeyCode::North),
        _ => None,
    }
}

/// Resolves a button through the configured mapping
///
/// The clutch key has no control of its own; its bit follows the shifts.
pub fn map_button(button: Button, mapping: &ButtonMapping) -> Option<Control> {
    let key = key_for_button(button)?;

    if key == mapping.shift_up {
        Some(Control::ShiftUp)
    } else if key == mapping.shift_down {
        Some(Control::ShiftDown)
    } else if key == mapping.handbrake {
        Some(Control::Handbrake)
    } else {
        None
    }
}

pub fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        // Rescale the value to the range outside the deadzone
        let sign = if value < 0.0 { -1.0 } else { 1.0 };
        sign * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}

/// Gamepad event reduced to what the controls care about
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Button { control: Control, pressed: bool },
    /// Raw trigger travel 0..=1
    Brake(f32),
    /// Raw trigger travel 0..=1
    Throttle(f32),
    /// Raw stick deflection -1..=1
    Tilt(f32),
}

impl InputEvent {
    pub fn from_gilrs(event: EventType, mapping: &ButtonMapping) -> Option<Self> {
        match event {
            EventType::ButtonPressed(button, _) => map_button(button, mapping).map(|control| {
                InputEvent::Button {
                    control,
                    pressed: true,
                }
            }),
            EventType::ButtonReleased(button, _) => map_button(button, mapping).map(|control| {
                InputEvent::Button {
                    control,
                    pressed: false,
                }
            }),
            EventType::ButtonChanged(Button::LeftTrigger2, value, _)
            | EventType::AxisChanged(Axis::LeftZ, value, _) => Some(InputEvent::Brake(value)),
            EventType::ButtonChanged(Button::RightTrigger2, value, _)
            | EventType::AxisChanged(Axis::RightZ, value, _) => Some(InputEvent::Throttle(value)),
            EventType::AxisChanged(Axis::LeftStickX, value, _) => Some(InputEvent::Tilt(value)),
            _ => None,
        }
    }

    /// Applies the event to the input snapshot, scaling analog values to wire units
    pub fn apply(self, snapshot: &mut Sample, settings: &CollectorSettings) {
        let pedal =
            |value: f32| apply_deadzone(value.clamp(0.0, 1.0), settings.deadzone) * PEDAL_MAX;

        match self {
            InputEvent::Button { control, pressed } => match control {
                Control::ShiftUp => snapshot.shift_up = pressed,
                Control::ShiftDown => snapshot.shift_down = pressed,
                Control::Handbrake => snapshot.handbrake = pressed,
            },
            InputEvent::Brake(value) => snapshot.brake = pedal(value),
            InputEvent::Throttle(value) => snapshot.throttle = pedal(value),
            InputEvent::Tilt(value) => {
                let tilt = apply_deadzone(value.clamp(-1.0, 1.0), settings.deadzone) * TILT_LIMIT;
                snapshot.tilt = if settings.invert_tilt { -tilt } else { tilt };
            }
        }
    }
}

// Define collector states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
pub struct EventCollector<S: CollectionState> {
    gilrs: Gilrs,
    active_gamepad: Option<GamepadId>,
    settings: CollectorSettings,
    snapshot: Sample,
    sender: watch::Sender<Sample>,
}

impl EventCollector<Initializing> {
    pub fn create(
        settings: CollectorSettings,
        sender: watch::Sender<Sample>,
    ) -> Result<Self, CollectorError> {
        debug!("Creating Event Collector with settings: {:?}", settings);

        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(CollectorError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(gilrs, None, settings, Sample::default(), sender))
    }

    // Select the first connected gamepad and transition to Collecting state
    pub fn initialize(mut self) -> EventCollector<Collecting> {
        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();

        if gamepads.is_empty() {
            warn!("No gamepad connected, waiting for one to appear");
        } else {
            info!("Found {} gamepads:", gamepads.len());
            for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
                info!("  [{}] ID: {}, Name: {}", idx, id, gamepad.name());
            }
            let (id, gamepad) = &gamepads[0];
            self.active_gamepad = Some(*id);
            info!("Selected gamepad: {} ({})", gamepad.name(), id);
        }

        self.transition()
    }
}

impl EventCollector<Collecting> {
    /// Drains pending gamepad events; returns whether the snapshot changed
    pub fn collect_pending(&mut self) -> bool {
        let mut changed = false;

        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected if self.active_gamepad.is_none() => {
                    info!("Gamepad {} connected, selecting it", id);
                    self.active_gamepad = Some(id);
                    continue;
                }
                EventType::Disconnected if self.active_gamepad == Some(id) => {
                    warn!("Active gamepad {} disconnected, releasing all controls", id);
                    self.active_gamepad = None;
                    self.snapshot = Sample::default();
                    changed = true;
                    continue;
                }
                _ => {}
            }

            if self.active_gamepad != Some(id) {
                debug!("Skipping event from non-active gamepad: {:?}", id);
                continue;
            }

            if let Some(input) = InputEvent::from_gilrs(event, &self.settings.mapping) {
                input.apply(&mut self.snapshot, &self.settings);
                debug!("Input changed: {:?}", self.snapshot);
                changed = true;
            }
        }

        changed
    }

    /// Polls until every receiver of the snapshot is gone
    pub fn run_collection_loop(&mut self) {
        info!("Starting Event Collector loop");

        while !self.sender.is_closed() {
            if self.collect_pending() {
                self.sender.send_replace(self.snapshot);
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        info!("All input subscribers gone, stopping Event Collector");
    }
}

/// Handle to the collector thread
pub struct CollectorHandle {
    thread: std::thread::JoinHandle<()>,
}

impl CollectorHandle {
    /// Starts gamepad collection on a dedicated thread
    ///
    /// Blocks until gilrs is initialised so setup failures reach the caller.
    pub fn spawn(
        settings: CollectorSettings,
        sender: watch::Sender<Sample>,
    ) -> Result<Self, CollectorError> {
        info!("Spawning Event Collector with settings: {:?}", settings);
        let (ready_tx, ready_rx) = std_mpsc::channel();

        let thread = std::thread::Builder::new()
            .name("gamepad-collector".to_string())
            .spawn(move || {
                let collector = match EventCollector::create(settings, sender) {
                    Ok(collector) => {
                        let _ = ready_tx.send(Ok(()));
                        collector
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                collector.initialize().run_collection_loop();
            })
            .map_err(|e| CollectorError::ThreadError(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|e| CollectorError::ThreadError(e.to_string()))??;

        info!("Event Collector successfully started");
        Ok(Self { thread })
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CollectorSettings {
        CollectorSettings {
            deadzone: 0.1,
            invert_tilt: false,
            mapping: ButtonMapping::default(),
        }
    }

    #[test]
    fn deadzone_rescales_remaining_travel() {
        assert_eq!(apply_deadzone(0.05, 0.1), 0.0);
        assert_eq!(apply_deadzone(1.0, 0.1), 1.0);
        assert!((apply_deadzone(-0.55, 0.1) + 0.5).abs() < 1e-6);
    }

    #[test]
    fn default_mapping_follows_key_codes() {
        let mapping = ButtonMapping::default();
        assert_eq!(
            map_button(Button::LeftTrigger, &mapping),
            Some(Control::ShiftUp)
        );
        assert_eq!(
            map_button(Button::RightTrigger, &mapping),
            Some(Control::ShiftDown)
        );
        assert_eq!(map_button(Button::East, &mapping), Some(Control::Handbrake));
        // clutch key and unmapped keys drive nothing
        assert_eq!(map_button(Button::West, &mapping), None);
        assert_eq!(map_button(Button::South, &mapping), None);
        assert_eq!(map_button(Button::Start, &mapping), None);
    }

    #[test]
    fn remapped_keys_move_the_controls() {
        let mapping = ButtonMapping {
            shift_up: KeyCode::North,
            shift_down: KeyCode::South,
            handbrake: KeyCode::Tl,
            ..ButtonMapping::default()
        };
        assert_eq!(map_button(Button::North, &mapping), Some(Control::ShiftUp));
        assert_eq!(map_button(Button::South, &mapping), Some(Control::ShiftDown));
        assert_eq!(
            map_button(Button::LeftTrigger, &mapping),
            Some(Control::Handbrake)
        );
        assert_eq!(map_button(Button::RightTrigger, &mapping), None);
    }

    #[test]
    fn pressed_key_sets_its_configured_bit() {
        let mapping = ButtonMapping::default();
        let mut snapshot = Sample::default();
        let control = map_button(Button::East, &mapping).unwrap();
        InputEvent::Button {
            control,
            pressed: true,
        }
        .apply(&mut snapshot, &settings());

        let byte =
            mapping.buttons_byte(snapshot.shift_up, snapshot.shift_down, snapshot.handbrake);
        assert_eq!(byte, KeyCode::East.bit());
    }

    #[test]
    fn trigger_values_scale_to_pedal_range() {
        let mut snapshot = Sample::default();
        InputEvent::Throttle(1.0).apply(&mut snapshot, &settings());
        assert_eq!(snapshot.throttle, PEDAL_MAX);

        InputEvent::Brake(1.7).apply(&mut snapshot, &settings());
        assert_eq!(snapshot.brake, PEDAL_MAX);

        InputEvent::Brake(0.02).apply(&mut snapshot, &settings());
        assert_eq!(snapshot.brake, 0.0);
    }

    #[test]
    fn stick_drives_tilt_within_limit() {
        let mut snapshot = Sample::default();
        InputEvent::Tilt(-1.0).apply(&mut snapshot, &settings());
        assert_eq!(snapshot.tilt, -TILT_LIMIT);

        let inverted = CollectorSettings {
            invert_tilt: true,
            ..settings()
        };
        InputEvent::Tilt(1.0).apply(&mut snapshot, &inverted);
        assert_eq!(snapshot.tilt, -TILT_LIMIT);
    }

    #[test]
    fn press_and_release_toggle_buttons() {
        let mut snapshot = Sample::default();
        let press = |pressed| InputEvent::Button {
            control: Control::ShiftUp,
            pressed,
        };

        press(true).apply(&mut snapshot, &settings());
        assert!(snapshot.shift_up);
        assert!(!snapshot.shift_down);

        press(false).apply(&mut snapshot, &settings());
        assert!(!snapshot.shift_up);
    }
}
