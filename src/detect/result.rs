/// Axis-aligned detection rectangle in frame-pixel coordinates.
///
/// Detections carry no score and no identity; presence in the result list is the signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Detection {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Detection {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// True when the rectangle lies inside a `width` x `height` frame.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.width >= 0
            && self.height >= 0
            && self.right() as i64 <= width as i64
            && self.bottom() as i64 <= height as i64
    }
}

/// Size bound for the multi-scale search, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl WindowSize {
    pub const fn square(side: u32) -> Self {
        Self {
            width: side,
            height: side,
        }
    }

    pub fn contains(&self, other: &WindowSize) -> bool {
        other.width <= self.width && other.height <= self.height
    }
}
