//! Input State
//!
//! The input driver is polled once per frame into an `InputState`. Buttons
//! are packed into a bit set; `InputTracker` derives press edges by comparing
//! against the previous frame.

use std::fmt;
use std::str::FromStr;

use glam::Vec2;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::math::rotate_yaw;

/// Stick deflection below this is treated as released.
pub const STICK_DEADZONE: f32 = 0.15;

/// Unknown input mode string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown input mode: {0}")]
pub struct UnknownInputMode(pub String);

/// Device family driving aim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum InputMode {
    /// Keyboard and mouse; aim follows the cursor.
    #[default]
    Keyboard,
    /// Gamepad; aim follows the right stick.
    Gamepad,
}

impl InputMode {
    /// Storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            InputMode::Keyboard => "keyboard",
            InputMode::Gamepad => "gamepad",
        }
    }
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputMode {
    type Err = UnknownInputMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keyboard" => Ok(InputMode::Keyboard),
            "gamepad" => Ok(InputMode::Gamepad),
            _ => Err(UnknownInputMode(s.to_string())),
        }
    }
}

/// Polled input for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InputState {
    /// Left stick / WASD: x right, y up (away from the camera).
    pub move_axis: Vec2,

    /// Held buttons (packed bits):
    /// - Bit 0: Jump
    /// - Bit 1: Sprint
    /// - Bit 2: Levitate
    /// - Bit 3: Fire firebolt
    /// - Bit 4: Fire mortar
    /// - Bit 5: Melee
    /// - Bit 6: Heal
    /// - Bit 7: Swap character
    /// - Bit 8: Pause
    pub buttons: u16,

    /// Right stick deflection (gamepad aim).
    pub right_stick: Vec2,

    /// Cursor projected onto the ground plane (x, z).
    pub cursor: Option<Vec2>,

    /// Camera yaw in radians.
    pub camera_yaw: f32,

    /// Device family.
    pub mode: InputMode,
}

impl InputState {
    /// Jump button.
    pub const JUMP: u16 = 0x001;
    /// Sprint button.
    pub const SPRINT: u16 = 0x002;
    /// Levitate button.
    pub const LEVITATE: u16 = 0x004;
    /// Firebolt button.
    pub const FIRE: u16 = 0x008;
    /// Mortar button.
    pub const MORTAR: u16 = 0x010;
    /// Melee button.
    pub const MELEE: u16 = 0x020;
    /// Heal button.
    pub const HEAL: u16 = 0x040;
    /// Swap character button.
    pub const SWAP: u16 = 0x080;
    /// Pause button.
    pub const PAUSE: u16 = 0x100;

    /// No input.
    pub const fn new() -> Self {
        Self {
            move_axis: Vec2::ZERO,
            buttons: 0,
            right_stick: Vec2::ZERO,
            cursor: None,
            camera_yaw: 0.0,
            mode: InputMode::Keyboard,
        }
    }

    /// Input with a movement axis.
    pub fn with_movement(x: f32, y: f32) -> Self {
        Self {
            move_axis: Vec2::new(x, y),
            ..Self::new()
        }
    }

    /// Is a button held?
    #[inline]
    pub fn held(&self, button: u16) -> bool {
        self.buttons & button != 0
    }

    /// Set or clear a button.
    #[inline]
    pub fn set(&mut self, button: u16, pressed: bool) {
        if pressed {
            self.buttons |= button;
        } else {
            self.buttons &= !button;
        }
    }

    /// Builder form of `set`.
    pub fn with(mut self, button: u16) -> Self {
        self.set(button, true);
        self
    }

    /// Any movement beyond the deadzone?
    #[inline]
    pub fn has_movement(&self) -> bool {
        self.move_axis.length() > STICK_DEADZONE
    }

    /// Camera-relative world movement direction (x, z), length ≤ 1.
    pub fn move_direction(&self) -> Vec2 {
        if !self.has_movement() {
            return Vec2::ZERO;
        }
        // Up on the stick moves away from the camera (-z)
        let local = Vec2::new(self.move_axis.x, -self.move_axis.y).clamp_length_max(1.0);
        rotate_yaw(local, self.camera_yaw)
    }

    /// Right stick deflection, zero inside the deadzone.
    pub fn aim_stick(&self) -> Option<Vec2> {
        let len = self.right_stick.length();
        (len > STICK_DEADZONE).then_some(self.right_stick.clamp_length_max(1.0))
    }
}

/// Input for one frame plus buttons newly pressed this frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PolledInput {
    /// Current state.
    pub state: InputState,
    /// Buttons that went down this frame.
    pub pressed: u16,
}

impl PolledInput {
    /// Was the button pressed this frame?
    #[inline]
    pub fn just_pressed(&self, button: u16) -> bool {
        self.pressed & button != 0
    }

    /// Is the button held?
    #[inline]
    pub fn held(&self, button: u16) -> bool {
        self.state.held(button)
    }
}

/// Derives press edges between frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct InputTracker {
    previous: u16,
}

impl InputTracker {
    /// New tracker with nothing held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare against the previous frame.
    pub fn poll(&mut self, state: InputState) -> PolledInput {
        let pressed = state.buttons & !self.previous;
        self.previous = state.buttons;
        PolledInput { state, pressed }
    }

    /// Forget held buttons (e.g. after a pause).
    pub fn reset(&mut self) {
        self.previous = 0;
    }
}
