// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Visualization helpers.

use image::RgbImage;
use nalgebra::DMatrix;

use crate::core::frame::{BoundingBox, BoundingBoxes};
use crate::core::registry::Registry;
use crate::misc::interop;
use crate::misc::type_aliases::Rgb8;

/// Create an RGB image of the rendered colors with the bounding box
/// of each known instance drawn in its render color.
///
/// Boxes are drawn inside their bounds, `thickness` pixels wide.
pub fn bounding_boxes_on_image(
    color: &DMatrix<Rgb8>,
    boxes: &BoundingBoxes,
    registry: &Registry,
    thickness: usize,
) -> RgbImage {
    let mut canvas = color.clone();
    for (id, bbox) in boxes {
        if let Some(instance_color) = registry.color(*id) {
            draw_box(&mut canvas, bbox, instance_color.rgb(), thickness);
        }
    }
    interop::rgb_from_matrix(&canvas)
}

fn draw_box(canvas: &mut DMatrix<Rgb8>, bbox: &BoundingBox, rgb: Rgb8, thickness: usize) {
    let (nrows, ncols) = canvas.shape();
    let max_x = bbox.max_x.min(ncols.saturating_sub(1));
    let max_y = bbox.max_y.min(nrows.saturating_sub(1));
    for y in bbox.min_y..=max_y {
        for x in bbox.min_x..=max_x {
            let on_border = x < bbox.min_x + thickness
                || x + thickness > bbox.max_x
                || y < bbox.min_y + thickness
                || y + thickness > bbox.max_y;
            if on_border {
                canvas[(y, x)] = rgb;
            }
        }
    }
}

// TESTS #############################################################
