//! Small math helpers shared by the simulation.

use glam::{Vec2, Vec3};
use std::f32::consts::{PI, TAU};

/// Linear interpolation.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Wrap an angle into `(-PI, PI]`.
#[inline]
pub fn wrap_angle(angle: f32) -> f32 {
    let mut a = angle % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}

/// Interpolate between two angles along the shortest arc.
#[inline]
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    let delta = wrap_angle(to - from);
    wrap_angle(from + delta * t)
}

/// Project a 3D position onto the XZ plane.
#[inline]
pub fn xz(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

/// Horizontal (XZ) distance between two points.
#[inline]
pub fn distance_xz(a: Vec3, b: Vec3) -> f32 {
    xz(a).distance(xz(b))
}

/// Rotate a 2D vector (x, z) by a yaw angle around the vertical axis.
#[inline]
pub fn rotate_yaw(v: Vec2, yaw: f32) -> Vec2 {
    let (sin, cos) = yaw.sin_cos();
    Vec2::new(v.x * cos + v.y * sin, -v.x * sin + v.y * cos)
}
