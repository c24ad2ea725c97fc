// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! OpenGL conventions for view and projection matrices.
//!
//! The eye space looks down the negative z axis,
//! and normalized device coordinates are in `[-1, 1]^3`.

use crate::misc::type_aliases::{Float, Mat4, Vec3};

/// View matrix of a camera at `eye` looking at `center`.
#[rustfmt::skip]
pub fn look_at(eye: &Vec3, center: &Vec3, up: &Vec3) -> Mat4 {
    let f = (center - eye).normalize();
    let s = f.cross(&up.normalize()).normalize();
    let u = s.cross(&f);
    Mat4::new(
         s.x,  s.y,  s.z, -s.dot(eye),
         u.x,  u.y,  u.z, -u.dot(eye),
        -f.x, -f.y, -f.z,  f.dot(eye),
         0.0,  0.0,  0.0,  1.0,
    )
}

/// View matrix of a camera given its camera-to-world pose.
///
/// The camera looks along its local z axis and its local x axis points right.
pub fn view_from_pose(camera_to_world: &Mat4) -> Mat4 {
    let rotation = camera_to_world.fixed_view::<3, 3>(0, 0);
    let direction = rotation * Vec3::z();
    let right = rotation * Vec3::x();
    let up = right.cross(&direction);
    let eye: Vec3 = camera_to_world.fixed_view::<3, 1>(0, 3).into_owned();
    let center = eye + direction;
    look_at(&eye, &center, &up)
}

/// Transform a depth buffer value in `[0, 1]` back into a linear distance to the camera.
pub fn linear_depth(window_depth: Float, near: Float, far: Float) -> Float {
    let z_ndc = 2.0 * window_depth - 1.0;
    (2.0 * far * near) / (far + near + z_ndc * (near - far))
}

// TESTS #############################################################
