//! Input & event surface (component J): a per-window FIFO queue of pointer and
//! keyboard events, drained at the start of each update tick.

use std::collections::VecDeque;

use winit::event::MouseButton;
use winit::keyboard::KeyCode;

/// Normalized window-space coordinates in `[0, 1] x [0, 1]`, origin top-left.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NormalizedPosition {
    pub x: f32,
    pub y: f32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum InputSource {
    Mouse(MouseButton),
    Key(KeyCode),
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    Press { source: InputSource, position: NormalizedPosition },
    Release { source: InputSource, position: NormalizedPosition },
    Move { position: NormalizedPosition },
}

/// A FIFO queue of input events for one window. No coalescing: every event
/// pushed is observed exactly once, in push order.
#[derive(Debug, Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
    window_size: (u32, u32),
    cursor_position: NormalizedPosition,
}

impl InputQueue {
    pub fn new(window_size: (u32, u32)) -> Self {
        Self {
            events: VecDeque::new(),
            window_size,
            cursor_position: NormalizedPosition { x: 0.0, y: 0.0 },
        }
    }

    pub fn set_window_size(&mut self, size: (u32, u32)) {
        self.window_size = size;
    }

    fn normalize(&self, x: f64, y: f64) -> NormalizedPosition {
        let (w, h) = self.window_size;
        NormalizedPosition {
            x: if w > 0 { (x as f32) / (w as f32) } else { 0.0 },
            y: if h > 0 { (y as f32) / (h as f32) } else { 0.0 },
        }
    }

    pub fn push_cursor_moved(&mut self, x: f64, y: f64) {
        self.cursor_position = self.normalize(x, y);
        self.events.push_back(InputEvent::Move { position: self.cursor_position });
    }

    pub fn push_mouse_button(&mut self, button: MouseButton, pressed: bool) {
        let position = self.cursor_position;
        let source = InputSource::Mouse(button);
        self.events.push_back(if pressed {
            InputEvent::Press { source, position }
        } else {
            InputEvent::Release { source, position }
        });
    }

    pub fn push_key(&mut self, key: KeyCode, pressed: bool) {
        let position = self.cursor_position;
        let source = InputSource::Key(key);
        self.events.push_back(if pressed {
            InputEvent::Press { source, position }
        } else {
            InputEvent::Release { source, position }
        });
    }

    /// Drains every event queued since the last drain, in FIFO order.
    pub fn drain(&mut self) -> Vec<InputEvent> {
        self.events.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_drain_in_fifo_order() {
        let mut queue = InputQueue::new((200, 100));
        queue.push_cursor_moved(100.0, 50.0);
        queue.push_mouse_button(MouseButton::Left, true);
        queue.push_mouse_button(MouseButton::Left, false);

        let drained = queue.drain();
        assert_eq!(drained.len(), 3);
        assert!(matches!(drained[0], InputEvent::Move { .. }));
        assert!(matches!(drained[1], InputEvent::Press { .. }));
        assert!(matches!(drained[2], InputEvent::Release { .. }));
        assert!(queue.is_empty());
    }

    #[test]
    fn cursor_position_normalizes_against_window_size() {
        let mut queue = InputQueue::new((200, 100));
        queue.push_cursor_moved(100.0, 50.0);
        match queue.drain().remove(0) {
            InputEvent::Move { position } => {
                assert!((position.x - 0.5).abs() < 1e-6);
                assert!((position.y - 0.5).abs() < 1e-6);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
