// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Drawable geometry.
//!
//! Every model (full labeled scene, textured scene, isolated instance)
//! is the same kind of data: a list of triangle batches.
//! Variants are obtained by filtering faces when building the batches.

use image::RgbImage;
use std::rc::Rc;

use crate::core::color::PackedRgb;
use crate::misc::type_aliases::{Point2, Point3, Rgb8};

/// Indexed triangles sharing the same material.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    pub positions: Vec<Point3>,
    /// Per vertex colors. Empty or of the same length as `positions`.
    pub colors: Vec<Rgb8>,
    /// Per vertex texture coordinates. Empty or of the same length as `positions`.
    pub tex_coords: Vec<Point2>,
    pub triangles: Vec<[u32; 3]>,
    /// Diffuse texture, sampled with `tex_coords`.
    pub texture: Option<Rc<RgbImage>>,
    /// Solid color used for every face in label passes.
    /// Faces use their vertex colors when this is `None`.
    pub instance_color: Option<PackedRgb>,
}

impl Batch {
    /// A batch with positions and triangles only.
    pub fn new(positions: Vec<Point3>, triangles: Vec<[u32; 3]>) -> Batch {
        Batch {
            positions,
            triangles,
            ..Batch::default()
        }
    }

    pub fn with_colors(mut self, colors: Vec<Rgb8>) -> Batch {
        self.colors = colors;
        self
    }

    pub fn with_instance_color(mut self, color: PackedRgb) -> Batch {
        self.instance_color = Some(color);
        self
    }

    /// Color of a vertex, if the batch has vertex colors.
    pub fn vertex_color(&self, index: u32) -> Option<Rgb8> {
        self.colors.get(index as usize).cloned()
    }

    /// Keep only faces touching at least one vertex of exactly this color.
    ///
    /// Vertices are all kept since faces reference them by index.
    /// A batch without vertex colors keeps all its faces if its instance color matches,
    /// and none otherwise.
    pub fn retain_color(&self, color: PackedRgb) -> Batch {
        let triangles = if self.colors.is_empty() {
            if self.instance_color == Some(color) {
                self.triangles.clone()
            } else {
                Vec::new()
            }
        } else {
            self.triangles
                .iter()
                .filter(|face| {
                    face.iter().any(|&v| {
                        self.vertex_color(v).map(PackedRgb::from) == Some(color)
                    })
                })
                .cloned()
                .collect()
        };
        Batch {
            triangles,
            ..self.clone()
        }
    }

    pub fn nb_triangles(&self) -> usize {
        self.triangles.len()
    }
}

/// A full renderable model.
#[derive(Clone, Debug, Default)]
pub struct Model {
    pub batches: Vec<Batch>,
}

impl Model {
    pub fn new(batches: Vec<Batch>) -> Model {
        Model { batches }
    }

    /// Model containing only the geometry of one instance.
    /// Empty batches are dropped.
    pub fn isolate(&self, color: PackedRgb) -> Model {
        Model {
            batches: self
                .batches
                .iter()
                .map(|batch| batch.retain_color(color))
                .filter(|batch| !batch.triangles.is_empty())
                .collect(),
        }
    }

    /// True if there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.batches.iter().all(|batch| batch.triangles.is_empty())
    }

    pub fn nb_triangles(&self) -> usize {
        self.batches.iter().map(Batch::nb_triangles).sum()
    }
}

// TESTS #############################################################
