//! Frame annotation.
//!
//! `annotate` turns one frame's detections into an `Overlay`: an ordered draw list that a
//! `Canvas` renders in place onto the display buffer. Keeping the plan separate from the
//! pixels lets the loop log and test exactly what is drawn.

use anyhow::Result;

use crate::detect::Detection;

pub const HELMET_LABEL: &str = "Helmet";
pub const WARNING_TEXT: &str = "NO HELMET DETECTED";

/// Vertical gap between a rectangle's top edge and its label baseline.
pub const LABEL_OFFSET: i32 = 10;

const COUNT_ORIGIN: Point = Point { x: 10, y: 30 };
const WARNING_ORIGIN: Point = Point { x: 10, y: 60 };
const STROKE: i32 = 2;
const LABEL_SCALE: f64 = 0.7;
const COUNT_SCALE: f64 = 0.8;
const WARNING_SCALE: f64 = 0.7;

/// 8-bit BGR color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub b: u8,
    pub g: u8,
    pub r: u8,
}

impl Color {
    pub const GREEN: Color = Color { b: 0, g: 255, r: 0 };
    pub const RED: Color = Color { b: 0, g: 0, r: 255 };
}

/// Pixel position; text origins are the bottom-left of the first glyph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Rectangle {
        bounds: Detection,
        color: Color,
        thickness: i32,
    },
    Text {
        text: String,
        origin: Point,
        scale: f64,
        color: Color,
        thickness: i32,
    },
}

/// Drawing surface for an `Overlay`.
pub trait Canvas {
    fn rectangle(&mut self, bounds: &Detection, color: Color, thickness: i32) -> Result<()>;

    fn text(&mut self, text: &str, origin: Point, scale: f64, color: Color, thickness: i32)
        -> Result<()>;
}

/// Everything drawn on one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    helmet_count: usize,
    shapes: Vec<Shape>,
}

impl Overlay {
    pub fn helmet_count(&self) -> usize {
        self.helmet_count
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Text items in draw order.
    pub fn texts(&self) -> impl Iterator<Item = (&str, Point)> {
        self.shapes.iter().filter_map(|shape| match shape {
            Shape::Text { text, origin, .. } => Some((text.as_str(), *origin)),
            Shape::Rectangle { .. } => None,
        })
    }

    pub fn shows_warning(&self) -> bool {
        self.texts().any(|(text, _)| text == WARNING_TEXT)
    }

    /// Draw every shape, in order, onto `canvas`.
    pub fn render<C: Canvas + ?Sized>(&self, canvas: &mut C) -> Result<()> {
        for shape in &self.shapes {
            match shape {
                Shape::Rectangle {
                    bounds,
                    color,
                    thickness,
                } => canvas.rectangle(bounds, *color, *thickness)?,
                Shape::Text {
                    text,
                    origin,
                    scale,
                    color,
                    thickness,
                } => canvas.text(text, *origin, *scale, *color, *thickness)?,
            }
        }
        Ok(())
    }
}

/// Where a detection's label goes: left-aligned, just above the top edge.
///
/// Near the top of the frame this can be negative; the renderer clips it.
pub fn label_origin(detection: &Detection) -> Point {
    Point {
        x: detection.x,
        y: detection.y - LABEL_OFFSET,
    }
}

pub fn count_text(count: usize) -> String {
    format!("Helmets: {}", count)
}

/// Build the overlay for one frame's detections.
pub fn annotate(detections: &[Detection]) -> Overlay {
    let mut shapes = Vec::with_capacity(detections.len() * 2 + 2);
    for detection in detections {
        shapes.push(Shape::Rectangle {
            bounds: *detection,
            color: Color::GREEN,
            thickness: STROKE,
        });
        shapes.push(Shape::Text {
            text: HELMET_LABEL.to_string(),
            origin: label_origin(detection),
            scale: LABEL_SCALE,
            color: Color::GREEN,
            thickness: STROKE,
        });
    }

    shapes.push(Shape::Text {
        text: count_text(detections.len()),
        origin: COUNT_ORIGIN,
        scale: COUNT_SCALE,
        color: Color::RED,
        thickness: STROKE,
    });
    if detections.is_empty() {
        shapes.push(Shape::Text {
            text: WARNING_TEXT.to_string(),
            origin: WARNING_ORIGIN,
            scale: WARNING_SCALE,
            color: Color::RED,
            thickness: STROKE,
        });
    }

    Overlay {
        helmet_count: detections.len(),
        shapes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl Canvas for Recorder {
        fn rectangle(&mut self, bounds: &Detection, _color: Color, _thickness: i32) -> Result<()> {
            self.calls.push(format!("rect {},{}", bounds.x, bounds.y));
            Ok(())
        }

        fn text(
            &mut self,
            text: &str,
            origin: Point,
            _scale: f64,
            _color: Color,
            _thickness: i32,
        ) -> Result<()> {
            self.calls.push(format!("text {} @{},{}", text, origin.x, origin.y));
            Ok(())
        }
    }

    #[test]
    fn empty_frame_gets_count_and_warning() {
        let overlay = annotate(&[]);
        assert_eq!(overlay.helmet_count(), 0);
        assert!(overlay.shows_warning());
        let texts: Vec<_> = overlay.texts().collect();
        assert_eq!(
            texts,
            vec![
                ("Helmets: 0", Point { x: 10, y: 30 }),
                (WARNING_TEXT, Point { x: 10, y: 60 }),
            ]
        );
    }

    #[test]
    fn detections_suppress_warning_and_match_count() {
        for n in 1..5 {
            let detections: Vec<_> = (0..n)
                .map(|i| Detection::new(i * 60, 40, 55, 55))
                .collect();
            let overlay = annotate(&detections);
            assert!(!overlay.shows_warning());
            assert_eq!(overlay.helmet_count(), detections.len());
            let count_line = count_text(detections.len());
            assert!(overlay.texts().any(|(text, _)| text == count_line));
        }
    }

    #[test]
    fn label_sits_above_rectangle() {
        let detection = Detection::new(120, 80, 64, 64);
        let overlay = annotate(&[detection]);
        let label = overlay
            .texts()
            .find(|(text, _)| *text == HELMET_LABEL)
            .map(|(_, origin)| origin)
            .unwrap();
        assert_eq!(label, Point { x: 120, y: 70 });
        assert!(overlay.shapes().contains(&Shape::Rectangle {
            bounds: detection,
            color: Color::GREEN,
            thickness: 2,
        }));
    }

    #[test]
    fn render_preserves_draw_order() {
        let overlay = annotate(&[Detection::new(5, 15, 50, 50)]);
        let mut canvas = Recorder::default();
        overlay.render(&mut canvas).unwrap();
        assert_eq!(
            canvas.calls,
            vec!["rect 5,15", "text Helmet @5,5", "text Helmets: 1 @10,30"]
        );
    }
}
