// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Type aliases for common types used all over the code base.

use nalgebra as na;

/// At the moment, the library is focused on f32 computation.
pub type Float = f32;

/// A point with two Float coordinates.
pub type Point2 = na::Point2<Float>;
/// A point with three Float coordinates.
pub type Point3 = na::Point3<Float>;

/// A vector with three Float coordinates.
pub type Vec3 = na::Vector3<Float>;
/// A vector with four Float coordinates (homogeneous / clip space).
pub type Vec4 = na::Vector4<Float>;

/// A 4x4 matrix of Floats.
pub type Mat4 = na::Matrix4<Float>;

/// An 8-bits RGB pixel, as stored in color and label matrices.
pub type Rgb8 = (u8, u8, u8);
