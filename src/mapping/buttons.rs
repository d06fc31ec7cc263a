//! Button offsets inside the DATA frame's `buttons` byte

use serde::{Deserialize, Serialize};
use std::fmt;

/// Gamepad key a function is reported as, with its bit offset on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyCode {
    /// Left bumper
    Tl,
    /// Right bumper
    Tr,
    South,
    East,
    West,
    North,
}

impl KeyCode {
    pub fn offset(self) -> u8 {
        match self {
            KeyCode::Tl => 0,
            KeyCode::Tr => 1,
            KeyCode::South => 4,
            KeyCode::East => 5,
            KeyCode::West => 6,
            KeyCode::North => 7,
        }
    }

    pub fn bit(self) -> u8 {
        1 << self.offset()
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyCode::Tl => "TL",
            KeyCode::Tr => "TR",
            KeyCode::South => "SOUTH",
            KeyCode::East => "EAST",
            KeyCode::West => "WEST",
            KeyCode::North => "NORTH",
        };
        write!(f, "{} (bit {})", name, self.offset())
    }
}

/// Which key each control function is reported as
///
/// With `auto_clutch` the clutch bit is set together with every shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonMapping {
    pub auto_clutch: bool,
    pub shift_up: KeyCode,
    pub shift_down: KeyCode,
    pub clutch: KeyCode,
    pub handbrake: KeyCode,
}

impl Default for ButtonMapping {
    fn default() -> Self {
        Self {
            auto_clutch: true,
            shift_up: KeyCode::Tl,
            shift_down: KeyCode::Tr,
            clutch: KeyCode::West,
            handbrake: KeyCode::East,
        }
    }
}

impl ButtonMapping {
    /// Builds the `buttons` byte for the given pressed functions
    pub fn buttons_byte(&self, shift_up: bool, shift_down: bool, handbrake: bool) -> u8 {
        let mut buttons = 0u8;

        if shift_up {
            if self.auto_clutch {
                buttons |= self.clutch.bit();
            }
            buttons |= self.shift_up.bit();
        }

        if shift_down {
            if self.auto_clutch {
                buttons |= self.clutch.bit();
            }
            buttons |= self.shift_down.bit();
        }

        if handbrake {
            buttons |= self.handbrake.bit();
        }

        buttons
    }
}
