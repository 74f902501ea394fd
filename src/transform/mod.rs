//! Affine transform helpers shared by the resolver and the compositor.

pub mod affine;
