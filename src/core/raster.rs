// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Off-screen rasterization of models into color, depth and instance buffers.
//!
//! The rasterizer follows OpenGL conventions so that its output matches
//! what a GPU would produce with the same matrices:
//!   * triangles are clipped against the near plane in clip space,
//!   * depth is stored in `[0, 1]` and tested with "less",
//!   * pixel centers are sampled at half-integer coordinates with a top-left fill rule,
//!   * attributes are interpolated with perspective correction.
//!
//! Every draw is immediately followed by a read back,
//! and a single `Rasterizer` owns its buffers,
//! so reads never observe a partially drawn frame.

use image::RgbImage;
use nalgebra::{DMatrix, Scalar};

use crate::core::color::PackedRgb;
use crate::core::mesh::{Batch, Model};
use crate::core::registry::{InstanceId, Registry};
use crate::math::projection;
use crate::misc::error::{Error, Result};
use crate::misc::type_aliases::{Float, Mat4, Point2, Rgb8, Vec3, Vec4};

/// Color of faces without texture nor vertex colors.
const DEFAULT_SURFACE: Rgb8 = (200, 200, 200);

/// Orientation of the matrices read back from the off-screen buffers.
///
/// It applies identically to color, depth, label and instance buffers.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Orientation {
    /// Rows go from top to bottom of the rendered view.
    Upright,
    /// The upright image rotated by 90° clockwise (legacy 3RScan convention).
    RotatedClockwise,
}

/// Result of a shaded render.
#[derive(Clone, Debug)]
pub struct ColorDepth {
    pub color: DMatrix<Rgb8>,
    /// Distance to the camera plane, scaled by the depth scale (millimeters by default).
    pub depth: DMatrix<u16>,
}

/// Result of a label render.
#[derive(Clone, Debug)]
pub struct LabelImages {
    /// Raw colors of the label buffer.
    pub colors: DMatrix<Rgb8>,
    /// Decoded instance ids, 0 for the background or unknown colors.
    pub instances: DMatrix<InstanceId>,
}

/// Software off-screen framebuffer.
pub struct Rasterizer {
    width: usize,
    height: usize,
    orientation: Orientation,
    near: Float,
    far: Float,
    depth_scale: Float,
    background: Rgb8,
    color: Vec<Rgb8>,
    depth: Vec<Float>,
    covered: Vec<bool>,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Shading {
    /// Texture or vertex colors.
    Material,
    /// One flat, unlit color per face.
    Label,
}

/// Vertex after the model-view-projection transform.
#[derive(Copy, Clone, Debug)]
struct ClipVertex {
    clip: Vec4,
    color: Vec3,
    uv: Point2,
}

/// Vertex in window coordinates, y axis pointing down.
#[derive(Copy, Clone, Debug)]
struct ScreenVertex {
    x: Float,
    y: Float,
    z: Float,
    inv_w: Float,
    color: Vec3,
    uv: Point2,
}

impl Rasterizer {
    /// Allocate the off-screen buffers.
    pub fn new(width: usize, height: usize) -> Result<Rasterizer> {
        if width == 0 || height == 0 {
            return Err(Error::EmptyViewport { width, height });
        }
        let size = width * height;
        Ok(Rasterizer {
            width,
            height,
            orientation: Orientation::Upright,
            near: 0.1,
            far: 10.0,
            depth_scale: 1000.0,
            background: (12, 12, 12),
            color: vec![(0, 0, 0); size],
            depth: vec![1.0; size],
            covered: vec![false; size],
        })
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Rasterizer {
        self.orientation = orientation;
        self
    }

    /// Near and far planes used to linearize depth values.
    /// They must be the same as the ones of the projection matrices.
    pub fn with_planes(mut self, near: Float, far: Float) -> Rasterizer {
        self.near = near;
        self.far = far;
        self
    }

    pub fn with_depth_scale(mut self, depth_scale: Float) -> Rasterizer {
        self.depth_scale = depth_scale;
        self
    }

    pub fn with_background(mut self, background: Rgb8) -> Rasterizer {
        self.background = background;
        self
    }

    /// Render a model with its materials and read back color and depth.
    pub fn render(&mut self, model: &Model, view: &Mat4, projection: &Mat4) -> ColorDepth {
        self.clear();
        self.draw(model, &(projection * view), Shading::Material);
        ColorDepth {
            color: self.read_color(),
            depth: self.read_depth(),
        }
    }

    /// Render a model with flat label colors and decode instance ids.
    ///
    /// Returns `Error::NotReady` if there is no geometry or no instance color to decode.
    pub fn render_labels(
        &mut self,
        model: &Model,
        registry: &Registry,
        view: &Mat4,
        projection: &Mat4,
    ) -> Result<LabelImages> {
        if model.is_empty() || registry.is_empty() {
            return Err(Error::NotReady);
        }
        self.clear();
        self.draw(model, &(projection * view), Shading::Label);
        Ok(LabelImages {
            colors: self.read_color(),
            instances: self.read_instances(registry),
        })
    }

    fn clear(&mut self) {
        let background = self.background;
        self.color.iter_mut().for_each(|c| *c = background);
        self.depth.iter_mut().for_each(|d| *d = 1.0);
        self.covered.iter_mut().for_each(|c| *c = false);
    }

    fn draw(&mut self, model: &Model, mvp: &Mat4, shading: Shading) {
        for batch in &model.batches {
            self.draw_batch(batch, mvp, shading);
        }
    }

    fn draw_batch(&mut self, batch: &Batch, mvp: &Mat4, shading: Shading) {
        let texture = match shading {
            Shading::Material if batch.tex_coords.len() == batch.positions.len() => {
                batch.texture.as_deref()
            }
            _ => None,
        };
        let clip_vertices: Vec<ClipVertex> = batch
            .positions
            .iter()
            .enumerate()
            .map(|(i, p)| ClipVertex {
                clip: mvp * Vec4::new(p.x, p.y, p.z, 1.0),
                color: to_vec3(batch.colors.get(i).cloned().unwrap_or(DEFAULT_SURFACE)),
                uv: batch.tex_coords.get(i).cloned().unwrap_or_else(Point2::origin),
            })
            .collect();
        for face in &batch.triangles {
            let corners = [
                clip_vertices[face[0] as usize],
                clip_vertices[face[1] as usize],
                clip_vertices[face[2] as usize],
            ];
            let flat = match shading {
                Shading::Label => Some(label_color(batch, face)),
                Shading::Material => None,
            };
            let polygon = clip_near(&corners);
            if polygon.len() < 3 {
                continue;
            }
            let screen: Vec<ScreenVertex> = polygon.iter().map(|v| self.to_screen(v)).collect();
            for i in 1..(screen.len() - 1) {
                self.fill_triangle([screen[0], screen[i], screen[i + 1]], flat, texture);
            }
        }
    }

    /// Perspective division and viewport transform.
    /// Rows increase downward, which also performs the read back vertical flip.
    fn to_screen(&self, v: &ClipVertex) -> ScreenVertex {
        let inv_w = 1.0 / v.clip.w;
        let x_ndc = v.clip.x * inv_w;
        let y_ndc = v.clip.y * inv_w;
        let z_ndc = v.clip.z * inv_w;
        ScreenVertex {
            x: (x_ndc + 1.0) * 0.5 * self.width as Float,
            y: (1.0 - y_ndc) * 0.5 * self.height as Float,
            z: (z_ndc + 1.0) * 0.5,
            inv_w,
            color: v.color,
            uv: v.uv,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    fn fill_triangle(
        &mut self,
        vertices: [ScreenVertex; 3],
        flat: Option<Rgb8>,
        texture: Option<&RgbImage>,
    ) {
        let [v0, mut v1, mut v2] = vertices;
        let mut area = edge(&v0, &v1, v2.x, v2.y);
        if area == 0.0 || !area.is_finite() {
            return;
        }
        if area < 0.0 {
            std::mem::swap(&mut v1, &mut v2);
            area = -area;
        }
        let owns = [top_left(&v1, &v2), top_left(&v2, &v0), top_left(&v0, &v1)];

        // Pixel bounding box, clamped to the viewport.
        let min_x = v0.x.min(v1.x).min(v2.x).floor().max(0.0);
        let min_y = v0.y.min(v1.y).min(v2.y).floor().max(0.0);
        let max_x = v0.x.max(v1.x).max(v2.x).ceil().min(self.width as Float - 1.0);
        let max_y = v0.y.max(v1.y).max(v2.y).ceil().min(self.height as Float - 1.0);
        if min_x > max_x || min_y > max_y {
            return;
        }

        for row in (min_y as usize)..=(max_y as usize) {
            let py = row as Float + 0.5;
            for col in (min_x as usize)..=(max_x as usize) {
                let px = col as Float + 0.5;
                let w = [edge(&v1, &v2, px, py), edge(&v2, &v0, px, py), edge(&v0, &v1, px, py)];
                let inside = w
                    .iter()
                    .zip(owns.iter())
                    .all(|(&wi, &own)| wi > 0.0 || (wi == 0.0 && own));
                if !inside {
                    continue;
                }
                let b = [w[0] / area, w[1] / area, w[2] / area];
                let z = b[0] * v0.z + b[1] * v1.z + b[2] * v2.z;
                let idx = row * self.width + col;
                if z < 0.0 || z > 1.0 || z >= self.depth[idx] {
                    continue;
                }
                let color = match flat {
                    Some(color) => color,
                    None => {
                        // Perspective correct weights.
                        let pw = [b[0] * v0.inv_w, b[1] * v1.inv_w, b[2] * v2.inv_w];
                        let sum = pw[0] + pw[1] + pw[2];
                        let pw = [pw[0] / sum, pw[1] / sum, pw[2] / sum];
                        match texture {
                            Some(tex) => {
                                let uv = v0.uv.coords * pw[0] + v1.uv.coords * pw[1] + v2.uv.coords * pw[2];
                                sample_nearest(tex, uv.x, uv.y)
                            }
                            None => from_vec3(v0.color * pw[0] + v1.color * pw[1] + v2.color * pw[2]),
                        }
                    }
                };
                self.depth[idx] = z;
                self.color[idx] = color;
                self.covered[idx] = true;
            }
        }
    }

    // Read back ###################################################

    fn read_color(&self) -> DMatrix<Rgb8> {
        self.orient(&self.color)
    }

    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    fn read_depth(&self) -> DMatrix<u16> {
        let depth_mm: Vec<u16> = self
            .depth
            .iter()
            .map(|&d| {
                let z = projection::linear_depth(d, self.near, self.far) * self.depth_scale;
                z.round().max(0.0).min(Float::from(u16::MAX)) as u16
            })
            .collect();
        self.orient(&depth_mm)
    }

    fn read_instances(&self, registry: &Registry) -> DMatrix<InstanceId> {
        let ids: Vec<InstanceId> = self
            .color
            .iter()
            .zip(self.covered.iter())
            .map(|(&color, &covered)| {
                if covered {
                    registry.decode(PackedRgb::from(color)).unwrap_or(0)
                } else {
                    0
                }
            })
            .collect();
        self.orient(&ids)
    }

    /// Build a matrix from a row major buffer, applying the output orientation.
    fn orient<T: Scalar + Copy>(&self, buffer: &[T]) -> DMatrix<T> {
        let (w, h) = (self.width, self.height);
        match self.orientation {
            Orientation::Upright => DMatrix::from_row_slice(h, w, buffer),
            Orientation::RotatedClockwise => DMatrix::from_fn(w, h, |r, c| buffer[(h - 1 - c) * w + r]),
        }
    }
}

// HELPERS ###########################################################

/// Edge function: positive when `(px, py)` is on the interior side of `a -> b`
/// for a triangle with positive area.
///
/// Endpoints are visited in a canonical order so that `edge(b, a)` is exactly `-edge(a, b)`,
/// otherwise rounding could leave gaps between triangles sharing an edge.
fn edge(a: &ScreenVertex, b: &ScreenVertex, px: Float, py: Float) -> Float {
    let raw = |a: &ScreenVertex, b: &ScreenVertex| (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x);
    if (a.x, a.y) <= (b.x, b.y) {
        raw(a, b)
    } else {
        -raw(b, a)
    }
}

/// Pixels exactly on an edge belong to the triangle only for left and top edges,
/// so that pixels on an edge shared by two triangles are drawn once.
fn top_left(a: &ScreenVertex, b: &ScreenVertex) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    -dy > 0.0 || (dy == 0.0 && dx > 0.0)
}

/// Clip a triangle against the near plane (z >= -w in clip space).
fn clip_near(corners: &[ClipVertex; 3]) -> Vec<ClipVertex> {
    let dist = |v: &ClipVertex| v.clip.z + v.clip.w;
    let mut polygon = Vec::with_capacity(4);
    for i in 0..3 {
        let current = &corners[i];
        let next = &corners[(i + 1) % 3];
        let (d_current, d_next) = (dist(current), dist(next));
        if d_current >= 0.0 {
            polygon.push(*current);
        }
        if (d_current >= 0.0) != (d_next >= 0.0) {
            let t = d_current / (d_current - d_next);
            polygon.push(ClipVertex {
                clip: current.clip + (next.clip - current.clip) * t,
                color: current.color + (next.color - current.color) * t,
                uv: current.uv + (next.uv - current.uv) * t,
            });
        }
    }
    polygon
}

/// Flat color of a face in label passes.
/// The batch instance color wins, then the color of the first vertex.
fn label_color(batch: &Batch, face: &[u32; 3]) -> Rgb8 {
    batch
        .instance_color
        .map(PackedRgb::rgb)
        .or_else(|| batch.vertex_color(face[0]))
        .unwrap_or(DEFAULT_SURFACE)
}

/// Nearest texel, with repeat wrapping. Texture rows start at the top of the image
/// while `v` grows upward.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn sample_nearest(texture: &RgbImage, u: Float, v: Float) -> Rgb8 {
    let (tw, th) = texture.dimensions();
    let u = u - u.floor();
    let v = v - v.floor();
    let x = ((u * tw as Float) as u32).min(tw.saturating_sub(1));
    let y = (((1.0 - v) * th as Float) as u32).min(th.saturating_sub(1));
    let p = texture.get_pixel(x, y);
    (p[0], p[1], p[2])
}

fn to_vec3((r, g, b): Rgb8) -> Vec3 {
    Vec3::new(Float::from(r), Float::from(g), Float::from(b))
}

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn from_vec3(v: Vec3) -> Rgb8 {
    let channel = |x: Float| x.round().max(0.0).min(255.0) as u8;
    (channel(v.x), channel(v.y), channel(v.z))
}

// TESTS #############################################################
