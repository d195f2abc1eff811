//! Mouse event vocabulary.
//!
//! Positions carry both cell and (optionally) pixel coordinates because the
//! SGR-pixels encoding reports pixels while everything else reports cells;
//! conversions between the two need the window size.

use std::time::{Duration, Instant};

use crate::Size;
use crate::key::Modifiers;

bitflags::bitflags! {
    /// Mouse buttons as a flag set. Scroll "buttons" are wheel detents.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct MouseButton: u32 {
        const LEFT = 1 << 0;
        const MIDDLE = 1 << 1;
        const RIGHT = 1 << 2;
        const SCROLL_UP = 1 << 3;
        const SCROLL_DOWN = 1 << 4;
        const SCROLL_LEFT = 1 << 5;
        const SCROLL_RIGHT = 1 << 6;
        const BUTTON_8 = 1 << 7;
        const BUTTON_9 = 1 << 8;
        const BUTTON_10 = 1 << 9;
        const BUTTON_11 = 1 << 10;
    }
}

impl MouseButton {
    pub const VERTICAL_SCROLL: MouseButton =
        MouseButton::SCROLL_UP.union(MouseButton::SCROLL_DOWN);
    pub const HORIZONTAL_SCROLL: MouseButton =
        MouseButton::SCROLL_LEFT.union(MouseButton::SCROLL_RIGHT);
}

/// Which mouse events a child has subscribed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MouseProtocol {
    #[default]
    None,
    /// Presses only, buttons 0-2 (DECSET 9).
    X10,
    /// Press and release (DECSET 1000).
    VT200,
    /// Press, release, and motion with a button held (DECSET 1002).
    BtnEvent,
    /// Everything (DECSET 1003).
    AnyEvent,
}

/// How subscribed events are framed on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MouseEncoding {
    #[default]
    X10,
    Utf8,
    Urxvt,
    Sgr,
    SgrPixels,
}

/// DECSET 1007: synthesize arrow keys for wheel events in the alternate
/// screen when no mouse protocol is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AlternateScrollMode {
    #[default]
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseCoordinate {
    x: u32,
    y: u32,
}

impl MouseCoordinate {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }
}

/// A position in cells, with the original pixel position when the encoding
/// carried one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MousePosition {
    cells: MouseCoordinate,
    pixels: Option<MouseCoordinate>,
}

impl MousePosition {
    pub fn new(cells: MouseCoordinate, pixels: Option<MouseCoordinate>) -> Self {
        Self { cells, pixels }
    }

    /// Derive the cell position from pixel coordinates.
    pub fn from_pixels(pixels: MouseCoordinate, size: &Size) -> Self {
        if size.rows == 0 || size.cols == 0 || size.xpixels == 0 || size.ypixels == 0 {
            return Self {
                cells: MouseCoordinate::default(),
                pixels: Some(pixels),
            };
        }
        let cells = MouseCoordinate::new(
            pixels.x() * size.cols / size.xpixels,
            pixels.y() * size.rows / size.ypixels,
        );
        Self {
            cells,
            pixels: Some(pixels),
        }
    }

    pub fn in_cells(&self) -> MouseCoordinate {
        self.cells
    }

    pub fn in_pixels(&self) -> Option<MouseCoordinate> {
        self.pixels
    }

    /// Pixel coordinates, inferred as the middle of the cell when the event
    /// did not carry any.
    pub fn in_pixels_with_fallback(&self, size: &Size) -> MouseCoordinate {
        if let Some(pixels) = self.pixels {
            return pixels;
        }
        if size.rows == 0 || size.cols == 0 {
            return MouseCoordinate::default();
        }
        MouseCoordinate::new(
            (self.cells.x() * size.xpixels + size.xpixels / 2) / size.cols,
            (self.cells.y() * size.ypixels + size.ypixels / 2) / size.rows,
        )
    }

    /// Translate by a (possibly negative) cell offset, clamping at zero.
    pub fn translate(&self, dx: i64, dy: i64, size: &Size) -> MousePosition {
        let clamp = |value: u32, delta: i64| -> u32 {
            (i64::from(value) + delta).max(0) as u32
        };
        let cells = MouseCoordinate::new(clamp(self.cells.x(), dx), clamp(self.cells.y(), dy));
        let pixels = self.pixels.map(|pixels| {
            let cell_width = if size.cols == 0 {
                0
            } else {
                size.xpixels / size.cols
            };
            let cell_height = if size.rows == 0 {
                0
            } else {
                size.ypixels / size.rows
            };
            MouseCoordinate::new(
                clamp(pixels.x(), dx * i64::from(cell_width)),
                clamp(pixels.y(), dy * i64::from(cell_height)),
            )
        });
        MousePosition { cells, pixels }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MouseEventType {
    #[default]
    Press = 1,
    Move = 2,
    Release = 3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseEvent {
    pub kind: MouseEventType,
    pub button: MouseButton,
    pub position: MousePosition,
    pub modifiers: Modifiers,
}

impl MouseEvent {
    pub fn press(button: MouseButton, position: MousePosition) -> MouseEvent {
        MouseEvent {
            kind: MouseEventType::Press,
            button,
            position,
            modifiers: Modifiers::empty(),
        }
    }

    pub fn is_vertical_scroll(&self) -> bool {
        self.button.intersects(MouseButton::VERTICAL_SCROLL)
    }
}

/// Counts consecutive clicks of the same button within a time threshold,
/// driving word and line selection.
#[derive(Debug)]
pub struct MouseClickTracker {
    threshold: Duration,
    max_clicks: u32,
    prev: Option<ClickState>,
}

#[derive(Debug)]
struct ClickState {
    last_button: MouseButton,
    time: Instant,
    consecutive_clicks: u32,
}

impl Default for MouseClickTracker {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), 3)
    }
}

impl MouseClickTracker {
    pub fn new(threshold: Duration, max_clicks: u32) -> Self {
        Self {
            threshold,
            max_clicks,
            prev: None,
        }
    }

    /// Returns the click count for press events (1 = single, 2 = double,
    /// ...) and 0 for everything else.
    pub fn track(&mut self, event: &MouseEvent, now: Instant) -> u32 {
        match event.kind {
            MouseEventType::Press => {
                let renew = match &self.prev {
                    Some(prev) => {
                        prev.last_button != event.button || now > prev.time + self.threshold
                    }
                    None => true,
                };
                if renew {
                    self.prev = Some(ClickState {
                        last_button: event.button,
                        time: now,
                        consecutive_clicks: 1,
                    });
                    return 1;
                }
                let prev = self.prev.as_mut().unwrap();
                prev.time = now;
                let count = 1 + (prev.consecutive_clicks % self.max_clicks);
                prev.consecutive_clicks += 1;
                count
            }
            MouseEventType::Move | MouseEventType::Release => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_to_cell_conversion() {
        let size = Size::with_pixels(24, 80, 800, 480);
        let position = MousePosition::from_pixels(MouseCoordinate::new(400, 240), &size);
        assert_eq!(position.in_cells(), MouseCoordinate::new(40, 12));
    }

    #[test]
    fn pixel_fallback_is_cell_center() {
        let size = Size::with_pixels(10, 10, 100, 100);
        let position = MousePosition::new(MouseCoordinate::new(3, 4), None);
        assert_eq!(
            position.in_pixels_with_fallback(&size),
            MouseCoordinate::new(35, 45)
        );
    }

    #[test]
    fn click_tracking() {
        let mut tracker = MouseClickTracker::new(Duration::from_millis(100), 3);
        let event = MouseEvent::press(MouseButton::LEFT, MousePosition::default());
        let t0 = Instant::now();
        assert_eq!(tracker.track(&event, t0), 1);
        assert_eq!(tracker.track(&event, t0 + Duration::from_millis(10)), 2);
        assert_eq!(tracker.track(&event, t0 + Duration::from_millis(20)), 3);
        // Wraps back to a single click.
        assert_eq!(tracker.track(&event, t0 + Duration::from_millis(30)), 1);
        // Timeout resets.
        assert_eq!(tracker.track(&event, t0 + Duration::from_millis(500)), 1);
    }
}
