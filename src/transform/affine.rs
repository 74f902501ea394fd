//! Affine transform helpers.
//!
//! [`Affine`] coefficients are `[a, b, c, d, tx, ty]`, i.e. the matrix
//!
//! ```text
//! | a  c  tx |
//! | b  d  ty |
//! ```

use std::f64::consts::TAU;

use crate::foundation::core::{Affine, Point, Vec2};

/// `parent ∘ child`: the child transform is applied first.
#[inline]
pub fn compose(parent: Affine, child: Affine) -> Affine {
    parent * child
}

/// The identity transform.
#[inline]
pub fn identity() -> Affine {
    Affine::IDENTITY
}

/// Map a point through `t`.
#[inline]
pub fn apply(t: Affine, p: Point) -> Point {
    t * p
}

/// Build a transform from the 2D-relevant entries of a row-major 4×4 matrix.
///
/// Linear terms come from indices 0, 1, 4, 5 and translation from 12, 13. Missing entries fall
/// back to the identity matrix.
pub fn from_matrix3d(m: &[f64]) -> Affine {
    let at = |i: usize, default: f64| m.get(i).copied().unwrap_or(default);
    Affine::new([
        at(0, 1.0),
        at(1, 0.0),
        at(4, 0.0),
        at(5, 1.0),
        at(12, 0.0),
        at(13, 0.0),
    ])
}

/// Build `T(position) · R(rotation) · S(scale)`.
pub fn from_decomposed(position: Vec2, rotation: f64, scale: Vec2) -> Affine {
    Affine::translate(position)
        * Affine::rotate(rotation_to_radians(rotation))
        * Affine::scale_non_uniform(scale.x, scale.y)
}

/// Interpret a rotation value, treating magnitudes above one full turn as degrees.
pub fn rotation_to_radians(rotation: f64) -> f64 {
    if rotation.abs() > TAU {
        rotation.to_radians()
    } else {
        rotation
    }
}

/// Same linear part, translation rounded to the nearest pixel.
pub fn round_translation(t: Affine) -> Affine {
    let tr = t.translation();
    t.with_translation(Vec2::new(tr.x.round(), tr.y.round()))
}

/// Drop rotation/scale and keep only where `t` places the local origin.
pub fn origin_only(t: Affine) -> Affine {
    Affine::translate(t.translation())
}

/// Translate `t` so that `origin` maps to `(0, 0)` afterwards.
pub fn shift_origin(t: Affine, origin: Point) -> Affine {
    Affine::translate(Vec2::new(-origin.x, -origin.y)) * t
}

/// Whether every coefficient is finite.
pub fn is_finite(t: Affine) -> bool {
    t.as_coeffs().iter().all(|c| c.is_finite())
}

#[cfg(test)]
#[path = "../../tests/unit/transform/affine.rs"]
mod tests;
