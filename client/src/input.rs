//! Keyboard and mouse handling: movement keys and the text placement prompt

use macroquad::prelude::*;
use shared::Controls;

/// Longest text a player can type into the prompt
pub const MAX_TEXT_LEN: usize = 40;

/// A text the player asked to place at a point.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub content: String,
}

/// What the frame loop needs from one frame of input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameInput {
    pub controls: Controls,
    pub placement: Option<Placement>,
    /// True while the prompt is open; the local player is frozen meanwhile.
    pub typing: bool,
}

/// Typing prompt state, independent of the windowing backend.
#[derive(Debug, Clone, Default)]
pub struct TextEntry {
    active: bool,
    buffer: String,
}

impl TextEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn begin(&mut self) {
        self.active = true;
    }

    pub fn push(&mut self, c: char) {
        if self.active && !c.is_control() && self.buffer.chars().count() < MAX_TEXT_LEN {
            self.buffer.push(c);
        }
    }

    pub fn backspace(&mut self) {
        self.buffer.pop();
    }

    pub fn cancel(&mut self) {
        self.active = false;
        self.buffer.clear();
    }

    /// Closes the prompt and returns the typed text placed at `(x, y)`.
    /// Whitespace-only input keeps the prompt open.
    pub fn submit(&mut self, x: f32, y: f32) -> Option<Placement> {
        if !self.active || self.buffer.trim().is_empty() {
            return None;
        }
        self.active = false;
        Some(Placement {
            x,
            y,
            content: std::mem::take(&mut self.buffer),
        })
    }
}

pub struct InputManager {
    entry: TextEntry,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            entry: TextEntry::new(),
        }
    }

    /// The text typed so far, while the prompt is open.
    pub fn typing_buffer(&self) -> Option<&str> {
        self.entry.is_active().then(|| self.entry.buffer())
    }

    /// Samples the keyboard and mouse for this frame.
    ///
    /// T or Enter opens the prompt. While it is open, typed characters go
    /// to the buffer, Escape closes it, and a left click submits the text at
    /// the cursor.
    pub fn update(&mut self) -> FrameInput {
        if self.entry.is_active() {
            return self.update_typing();
        }

        if is_key_pressed(KeyCode::T) || is_key_pressed(KeyCode::Enter) {
            // Swallow the key that opened the prompt.
            while get_char_pressed().is_some() {}
            self.entry.begin();
            return FrameInput {
                typing: true,
                ..FrameInput::default()
            };
        }

        FrameInput {
            controls: Controls {
                left: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
                right: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
                jump: is_key_pressed(KeyCode::W)
                    || is_key_pressed(KeyCode::Up)
                    || is_key_pressed(KeyCode::Space),
            },
            placement: None,
            typing: false,
        }
    }

    fn update_typing(&mut self) -> FrameInput {
        while let Some(c) = get_char_pressed() {
            self.entry.push(c);
        }
        if is_key_pressed(KeyCode::Backspace) {
            self.entry.backspace();
        }
        if is_key_pressed(KeyCode::Escape) {
            self.entry.cancel();
        }

        let placement = if is_mouse_button_pressed(MouseButton::Left) {
            let (x, y) = mouse_position();
            self.entry.submit(x, y)
        } else {
            None
        };

        FrameInput {
            controls: Controls::default(),
            placement,
            typing: self.entry.is_active(),
        }
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_manager_creation() {
        let input_manager = InputManager::new();
        assert!(input_manager.typing_buffer().is_none());
    }

    #[test]
    fn test_entry_ignores_keys_until_opened() {
        let mut entry = TextEntry::new();
        entry.push('a');
        assert_eq!(entry.buffer(), "");

        entry.begin();
        entry.push('a');
        entry.push('\u{8}');
        entry.push('b');
        assert_eq!(entry.buffer(), "ab");

        entry.backspace();
        assert_eq!(entry.buffer(), "a");
    }

    #[test]
    fn test_entry_submit() {
        let mut entry = TextEntry::new();
        entry.begin();
        assert_eq!(entry.submit(1.0, 2.0), None);
        entry.push(' ');
        assert_eq!(entry.submit(1.0, 2.0), None);
        assert!(entry.is_active());

        entry.push('h');
        entry.push('i');
        assert_eq!(
            entry.submit(10.0, 20.0),
            Some(Placement {
                x: 10.0,
                y: 20.0,
                content: " hi".to_string()
            })
        );
        assert!(!entry.is_active());
        assert_eq!(entry.buffer(), "");
    }

    #[test]
    fn test_entry_cancel_and_length_cap() {
        let mut entry = TextEntry::new();
        entry.begin();
        for _ in 0..(MAX_TEXT_LEN + 10) {
            entry.push('x');
        }
        assert_eq!(entry.buffer().len(), MAX_TEXT_LEN);

        entry.cancel();
        assert!(!entry.is_active());
        assert_eq!(entry.buffer(), "");
    }
}
