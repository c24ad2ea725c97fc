// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Camera intrinsics and the projections used by the rasterizer.

use crate::misc::type_aliases::{Float, Mat4, Point2, Point3};

/// Intrinsic parameters of a pinhole camera, with the size of its images.
#[derive(PartialEq, Debug, Clone)]
pub struct Intrinsics {
    /// Principal point (cx, cy) in pixels.
    pub principal_point: (Float, Float),
    /// Focal lengths (fx, fy) in pixels.
    pub focal: (Float, Float),
    pub width: usize,
    pub height: usize,
}

impl Intrinsics {
    /// Intrinsics of the same camera with a field of view enlarged by `scale`.
    ///
    /// The image size does not change. The normal view then occupies exactly
    /// the centered `width / scale` by `height / scale` region of the enlarged view.
    pub fn fov_scaled(&self, scale: Float) -> Intrinsics {
        let (cx, cy) = self.principal_point;
        let (fx, fy) = self.focal;
        let half_w = self.width as Float / 2.0;
        let half_h = self.height as Float / 2.0;
        Intrinsics {
            principal_point: (half_w + (cx - half_w) / scale, half_h + (cy - half_h) / scale),
            focal: (fx / scale, fy / scale),
            width: self.width,
            height: self.height,
        }
    }

    /// OpenGL projection matrix mapping eye space to clip space.
    /// Clipping planes must satisfy `0 < near < far`.
    #[rustfmt::skip]
    pub fn projection(&self, near: Float, far: Float) -> Mat4 {
        let (cx, cy) = self.principal_point;
        let (fx, fy) = self.focal;
        let w = self.width as Float;
        let h = self.height as Float;
        Mat4::new(
            2.0 * fx / w, 0.0,          -(2.0 * cx / w - 1.0),    0.0,
            0.0,          2.0 * fy / h, -(2.0 * cy / h - 1.0),    0.0,
            0.0,          0.0,          -(far + near) / (far - near), -2.0 * far * near / (far - near),
            0.0,          0.0,          -1.0,                     0.0,
        )
    }

    /// Pixel coordinates of a point expressed in the camera frame (z forward).
    pub fn project(&self, point: &Point3) -> Point2 {
        let (cx, cy) = self.principal_point;
        let (fx, fy) = self.focal;
        Point2::new(fx * point.x / point.z + cx, fy * point.y / point.z + cy)
    }
}

// TESTS #############################################################
