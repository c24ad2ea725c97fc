// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per frame buffers and results.

use nalgebra::DMatrix;
use std::collections::BTreeMap;

use crate::core::registry::InstanceId;
use crate::misc::type_aliases::{Float, Rgb8};

/// Axis aligned rectangle in pixel coordinates of the rendered images,
/// `x` is the column and `y` the row. Bounds are inclusive.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct BoundingBox {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl BoundingBox {
    /// Box of a single pixel.
    pub fn at(x: usize, y: usize) -> BoundingBox {
        BoundingBox {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    /// Grow the box to include a pixel.
    pub fn extend(&mut self, x: usize, y: usize) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        self.min_x <= x && x <= self.max_x && self.min_y <= y && y <= self.max_y
    }
}

/// Pixel counts of an instance in two renders, and their ratio.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct VisibilityEntry {
    pub measured: usize,
    pub reference: usize,
    pub ratio: Float,
}

impl VisibilityEntry {
    /// Only valid if the instance is seen in both renders.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(measured: usize, reference: usize) -> Option<VisibilityEntry> {
        if measured > 0 && reference > 0 {
            Some(VisibilityEntry {
                measured,
                reference,
                ratio: measured as Float / reference as Float,
            })
        } else {
            None
        }
    }

    /// Fully visible, neither truncated nor occluded.
    pub fn neutral() -> VisibilityEntry {
        VisibilityEntry {
            measured: 0,
            reference: 0,
            ratio: 1.0,
        }
    }
}

impl Default for VisibilityEntry {
    fn default() -> Self {
        Self::neutral()
    }
}

pub type BoundingBoxes = BTreeMap<InstanceId, BoundingBox>;
pub type VisibilityMap = BTreeMap<InstanceId, VisibilityEntry>;

/// Buffers and results of the frame being rendered.
///
/// Images of the last rendered frame stay available until they are replaced,
/// result maps are emptied at the end of every frame.
#[derive(Clone, Debug, Default)]
pub struct FrameState {
    pub color: Option<DMatrix<Rgb8>>,
    pub depth: Option<DMatrix<u16>>,
    /// Colors of the label render.
    pub labels: Option<DMatrix<Rgb8>>,
    /// Instance id of each pixel, 0 for the background.
    pub instances: Option<DMatrix<InstanceId>>,
    pub bounding_boxes: BoundingBoxes,
    pub truncation: VisibilityMap,
    pub occlusion: VisibilityMap,
}

impl FrameState {
    /// Forget every image and result.
    pub fn reset(&mut self) {
        *self = FrameState::default();
    }

    /// Move out the results of the frame, leaving empty maps.
    pub fn take_results(&mut self) -> (BoundingBoxes, VisibilityMap, VisibilityMap) {
        (
            std::mem::take(&mut self.bounding_boxes),
            std::mem::take(&mut self.truncation),
            std::mem::take(&mut self.occlusion),
        )
    }
}

// TESTS #############################################################
