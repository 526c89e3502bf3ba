//! Keyboard toggles and mouse interaction.
//!
//! Keys map to [`SceneAction`]s; mouse buttons are tracked as a bit set so
//! motion can rotate (left) or scale (middle) the cube while rotate mode is off.

use bitflags::bitflags;
use glfw::{Key, MouseButton};

/// A keyboard command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneAction {
    /// Switch between the vertex-only and the vertex+index draw path
    ToggleIndexBuffer,
    /// Switch lighting on/off
    ToggleLighting,
    /// Cycle the display mode 0 -> 1 -> 0
    CycleMode,
    /// Freeze/unfreeze the rotation animation
    TogglePause,
    /// Switch between automatic rotation and mouse interaction
    ToggleRotate,
    /// Switch verbose per-frame logging
    ToggleVerbose,
    /// Leave the event loop
    Exit,
}

impl SceneAction {
    /// Map a pressed key, `None` for keys without a binding
    pub fn from_key(key: Key) -> Option<Self> {
        let action = match key {
            Key::I => Self::ToggleIndexBuffer,
            Key::L => Self::ToggleLighting,
            Key::M => Self::CycleMode,
            Key::P => Self::TogglePause,
            Key::R => Self::ToggleRotate,
            Key::V => Self::ToggleVerbose,
            Key::Q | Key::Escape => Self::Exit,
            other => {
                log::warn!("Unknown key: {:?}", other);
                return None;
            }
        };
        Some(action)
    }
}

bitflags! {
    /// Mouse buttons currently held
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MouseButtons: u32 {
        /// Left button, rotates
        const LEFT = 4;
        /// Middle button, scales
        const MIDDLE = 2;
        /// Right button, unused
        const RIGHT = 1;
    }
}

impl MouseButtons {
    /// Bit for a GLFW button; buttons beyond the first three map to nothing
    pub fn from_glfw(button: MouseButton) -> Self {
        match button {
            MouseButton::Button1 => Self::LEFT,
            MouseButton::Button2 => Self::RIGHT,
            MouseButton::Button3 => Self::MIDDLE,
            other => {
                log::warn!("Unknown mouse button: {:?}", other);
                Self::empty()
            }
        }
    }
}

/// Cursor movement since the last event, with the buttons held during it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseDelta {
    /// Horizontal motion in whole pixels
    pub dx: i32,
    /// Vertical motion in whole pixels
    pub dy: i32,
    /// Buttons down while moving
    pub buttons: MouseButtons,
}

/// Held buttons and the last cursor position, truncated to whole pixels
#[derive(Debug, Clone, Copy, Default)]
pub struct MouseTracker {
    buttons: MouseButtons,
    x: i32,
    y: i32,
}

impl MouseTracker {
    /// Button down: remember where and set its bit
    pub fn press(&mut self, button: MouseButtons, x: f64, y: f64) {
        self.x = x as i32;
        self.y = y as i32;
        self.buttons |= button;
    }

    /// Button up: clear its bit
    pub fn release(&mut self, button: MouseButtons) {
        self.buttons &= !button;
    }

    /// Cursor moved: report the delta and make the new position current
    pub fn motion(&mut self, x: f64, y: f64) -> MouseDelta {
        let (x, y) = (x as i32, y as i32);
        let delta = MouseDelta {
            dx: x - self.x,
            dy: y - self.y,
            buttons: self.buttons,
        };
        self.x = x;
        self.y = y;
        delta
    }

    /// Buttons currently held
    pub fn buttons(&self) -> MouseButtons {
        self.buttons
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bindings() {
        assert_eq!(SceneAction::from_key(Key::I), Some(SceneAction::ToggleIndexBuffer));
        assert_eq!(SceneAction::from_key(Key::L), Some(SceneAction::ToggleLighting));
        assert_eq!(SceneAction::from_key(Key::M), Some(SceneAction::CycleMode));
        assert_eq!(SceneAction::from_key(Key::P), Some(SceneAction::TogglePause));
        assert_eq!(SceneAction::from_key(Key::R), Some(SceneAction::ToggleRotate));
        assert_eq!(SceneAction::from_key(Key::V), Some(SceneAction::ToggleVerbose));
        assert_eq!(SceneAction::from_key(Key::Q), Some(SceneAction::Exit));
        assert_eq!(SceneAction::from_key(Key::Escape), Some(SceneAction::Exit));
        assert_eq!(SceneAction::from_key(Key::Z), None);
    }

    #[test]
    fn test_button_bits() {
        assert_eq!(MouseButtons::LEFT.bits(), 4);
        assert_eq!(MouseButtons::MIDDLE.bits(), 2);
        assert_eq!(MouseButtons::RIGHT.bits(), 1);
        assert_eq!(MouseButtons::from_glfw(MouseButton::Button1), MouseButtons::LEFT);
        assert_eq!(MouseButtons::from_glfw(MouseButton::Button3), MouseButtons::MIDDLE);
        assert!(MouseButtons::from_glfw(MouseButton::Button5).is_empty());
    }

    #[test]
    fn test_press_motion_release() {
        let mut mouse = MouseTracker::default();
        mouse.press(MouseButtons::LEFT, 10.7, 20.2);
        let delta = mouse.motion(15.0, 18.0);
        assert_eq!((delta.dx, delta.dy), (5, -2));
        assert_eq!(delta.buttons, MouseButtons::LEFT);

        mouse.release(MouseButtons::LEFT);
        let delta = mouse.motion(16.0, 18.0);
        assert_eq!((delta.dx, delta.dy), (1, 0));
        assert!(delta.buttons.is_empty());
    }

    #[test]
    fn test_buttons_combine() {
        let mut mouse = MouseTracker::default();
        mouse.press(MouseButtons::LEFT, 0.0, 0.0);
        mouse.press(MouseButtons::MIDDLE, 0.0, 0.0);
        assert_eq!(mouse.buttons(), MouseButtons::LEFT | MouseButtons::MIDDLE);
        mouse.release(MouseButtons::LEFT);
        assert_eq!(mouse.buttons(), MouseButtons::MIDDLE);
    }
}
