//! Gesture model: the commands a viewer sends and the strokes the OS receives.
//!
//! A [`GestureCommand`] is what arrives over the control surface.  A
//! [`Gesture`] is the dispatchable description of the same touch: a path of
//! points, a start delay and a duration, exactly what the platform's gesture
//! API consumes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Time a tap keeps the finger down.
pub const TAP_DURATION_MS: u64 = 50;

/// Time a swipe takes to travel from its start to its end point.
pub const SWIPE_DURATION_MS: u64 = 300;

/// A position in screen coordinates (physical pixels, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Remote touch command, consumed once by the input injector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GestureCommand {
    Tap { x: f32, y: f32 },
    Swipe { x1: f32, y1: f32, x2: f32, y2: f32, duration_ms: u32 },
}

/// One finger's movement within a gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    /// Points visited in order.  A single point means the finger does not move.
    pub path: Vec<Point>,
    /// Delay from gesture start until the finger goes down.
    pub start_delay: Duration,
    /// Time from finger down to finger up.
    pub duration: Duration,
}

/// A complete gesture ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Gesture {
    pub strokes: Vec<Stroke>,
}

impl Gesture {
    /// A stationary touch at `at` held for `duration`.
    pub fn tap(at: Point, duration: Duration) -> Self {
        Self::single(Stroke {
            path: vec![at],
            start_delay: Duration::ZERO,
            duration,
        })
    }

    /// A straight-line drag from `from` to `to` over `duration`.
    pub fn line(from: Point, to: Point, duration: Duration) -> Self {
        Self::single(Stroke {
            path: vec![from, to],
            start_delay: Duration::ZERO,
            duration,
        })
    }

    fn single(stroke: Stroke) -> Self {
        Self { strokes: vec![stroke] }
    }

    /// End time of the last stroke, relative to gesture start.
    pub fn total_duration(&self) -> Duration {
        self.strokes
            .iter()
            .map(|s| s.start_delay + s.duration)
            .max()
            .unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_is_single_stroke_with_one_point() {
        let g = Gesture::tap(Point::new(10.0, 20.0), Duration::from_millis(TAP_DURATION_MS));
        assert_eq!(g.strokes.len(), 1);
        assert_eq!(g.strokes[0].path, vec![Point::new(10.0, 20.0)]);
        assert_eq!(g.total_duration(), Duration::from_millis(50));
    }

    #[test]
    fn test_line_is_single_stroke_with_two_points() {
        let g = Gesture::line(
            Point::new(0.0, 0.0),
            Point::new(0.0, 500.0),
            Duration::from_millis(SWIPE_DURATION_MS),
        );
        assert_eq!(g.strokes.len(), 1);
        assert_eq!(g.strokes[0].path.len(), 2);
        assert_eq!(g.strokes[0].start_delay, Duration::ZERO);
        assert_eq!(g.total_duration(), Duration::from_millis(300));
    }

    #[test]
    fn test_point_with_nan_is_not_finite() {
        assert!(!Point::new(f32::NAN, 1.0).is_finite());
        assert!(!Point::new(1.0, f32::INFINITY).is_finite());
        assert!(Point::new(100.5, 200.5).is_finite());
    }
}
