use crate::foundation::error::{SpriteFrameError, SpriteFrameResult};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Global frame index on a timeline (0-based).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Half-open frame span `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    /// First frame covered.
    pub start: FrameIndex,
    /// One past the last frame covered.
    pub end: FrameIndex, // exclusive
}

impl FrameRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: FrameIndex, end: FrameIndex) -> SpriteFrameResult<Self> {
        if start.0 > end.0 {
            return Err(SpriteFrameError::validation(
                "FrameRange start must be <= end",
            ));
        }
        Ok(Self { start, end })
    }

    /// Range starting at `start` and spanning `duration` frames (saturating).
    pub fn from_start_duration(start: u64, duration: u64) -> Self {
        Self {
            start: FrameIndex(start),
            end: FrameIndex(start.saturating_add(duration)),
        }
    }

    /// Number of frames covered.
    pub fn len_frames(self) -> u64 {
        self.end.0.saturating_sub(self.start.0)
    }

    /// Whether the range covers no frames.
    pub fn is_empty(self) -> bool {
        self.start.0 == self.end.0
    }

    /// Whether `f` lies in `[start, end)`.
    pub fn contains(self, f: FrameIndex) -> bool {
        self.start.0 <= f.0 && f.0 < self.end.0
    }
}

/// Pixel-space location of one sprite inside the atlas bitmap.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct SpriteRect {
    /// Left edge in atlas pixels.
    pub x: i64,
    /// Top edge in atlas pixels.
    pub y: i64,
    /// Region width in atlas pixels.
    pub w: i64,
    /// Region height in atlas pixels.
    pub h: i64,
    /// Region is stored rotated 90° clockwise inside the atlas.
    #[serde(default)]
    pub rotated: bool,
}

impl SpriteRect {
    /// Unrotated rectangle.
    pub fn new(x: i64, y: i64, w: i64, h: i64) -> Self {
        Self {
            x,
            y,
            w,
            h,
            rotated: false,
        }
    }

    /// Mark the region as stored rotated inside the atlas.
    pub fn with_rotated(mut self, rotated: bool) -> Self {
        self.rotated = rotated;
        self
    }

    /// Whether the region covers no pixels.
    pub fn is_empty(self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    /// Local-space rectangle `(0, 0, w, h)` that a draw command paints.
    pub fn local_bounds(self) -> Rect {
        Rect::new(0.0, 0.0, self.w as f64, self.h as f64)
    }

    /// Transform that turns the stored region upright.
    ///
    /// Identity for unrotated regions. Rotated regions are turned back 90° counter-clockwise and
    /// shifted so the upright sprite occupies `(0, 0, h, w)`.
    pub fn orientation(self) -> Affine {
        if !self.rotated {
            return Affine::IDENTITY;
        }
        Affine::translate(Vec2::new(0.0, self.w as f64))
            * Affine::rotate(-std::f64::consts::FRAC_PI_2)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
