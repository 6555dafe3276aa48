use std::f32::consts::{PI, TAU};

use glam::Vec2;

/// Unit vector the player walks along when pressing forward at `yaw`.
pub(crate) fn forward_from_yaw(yaw: f32) -> Vec2 {
    Vec2::new(-yaw.sin(), -yaw.cos())
}

pub(crate) fn right_from_yaw(yaw: f32) -> Vec2 {
    Vec2::new(yaw.cos(), -yaw.sin())
}

/// Inverse of [`forward_from_yaw`].
pub(crate) fn yaw_toward(offset: Vec2) -> f32 {
    (-offset.x).atan2(-offset.y)
}

/// Heading of a model whose front faces +z, as used for the adversary.
pub(super) fn facing_toward(direction: Vec2) -> f32 {
    direction.x.atan2(direction.y)
}

/// Wraps into `[-PI, PI)`.
pub(super) fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}
