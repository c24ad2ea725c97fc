// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Render every frame of a posed sequence and compute visibility of its instances.
//!
//! The scene is provided by a `SceneSource` and results are handed to a `FrameSink`,
//! so the renderer itself never touches the file system.

use nalgebra::DMatrix;

use crate::core::{
    camera::Intrinsics,
    color::PackedRgb,
    frame::{BoundingBoxes, FrameState, VisibilityMap},
    mesh::Model,
    raster::{Orientation, Rasterizer},
    registry::{Instance, InstanceId, Registry},
    visibility,
};
use crate::math::projection;
use crate::misc::error::{Error, Result};
use crate::misc::type_aliases::{Float, Mat4, Rgb8};

/// Everything the renderer needs to know about a scan.
pub trait SceneSource {
    /// Camera intrinsics and image size.
    fn intrinsics(&self) -> Result<Intrinsics>;
    /// Model with one distinct vertex color per instance.
    fn label_model(&self) -> Result<Model>;
    /// Model with textures or realistic vertex colors.
    fn textured_model(&self) -> Result<Model>;
    /// Instances of the scan with their render colors.
    fn instances(&self) -> Result<Vec<Instance>>;
    /// Camera-to-world pose of a frame, `None` after the last frame.
    fn camera_pose(&self, frame_id: usize) -> Result<Option<Mat4>>;
}

/// Destination of the rendered frames.
pub trait FrameSink {
    /// Persist the requested outputs of a frame.
    /// Visibility maps of `frame` are already reconciled.
    fn write(&mut self, frame_id: usize, outputs: &Outputs, frame: &FrameState) -> Result<()>;
}

/// Outputs that can be requested for each frame.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Outputs {
    pub color: bool,
    pub depth: bool,
    /// Label colors and decoded instance images.
    pub labels: bool,
    pub bounding_boxes: bool,
    pub truncation: bool,
    pub occlusion: bool,
}

impl Outputs {
    pub fn all() -> Outputs {
        Outputs {
            color: true,
            depth: true,
            labels: true,
            bounding_boxes: true,
            truncation: true,
            occlusion: true,
        }
    }

    /// Bounding boxes and visibility, without any image.
    pub fn visibility_only() -> Outputs {
        Outputs {
            color: false,
            depth: false,
            labels: false,
            ..Outputs::all()
        }
    }

    fn shaded(&self) -> bool {
        self.color || self.depth
    }

    fn visibility(&self) -> bool {
        self.truncation || self.occlusion
    }
}

impl Default for Outputs {
    fn default() -> Self {
        Outputs::all()
    }
}

/// Configuration of the Renderer.
#[derive(Clone, Debug)]
pub struct Config {
    /// Near clipping plane, in meters.
    pub near: Float,
    /// Far clipping plane, in meters. Also the depth of the background.
    pub far: Float,
    /// Factor by which the field of view is enlarged to compute truncation.
    pub fov_scale: Float,
    /// Orientation of every output image.
    pub orientation: Orientation,
    /// Scale of the 16 bit depth images, 1000.0 for millimeters.
    pub depth_scale: Float,
    /// Clear color of the color images.
    pub background: Rgb8,
    /// Outputs rendered for each frame.
    pub outputs: Outputs,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            near: 0.1,
            far: 10.0,
            fov_scale: 2.0,
            orientation: Orientation::RotatedClockwise,
            depth_scale: 1000.0,
            background: (12, 12, 12),
            outputs: Outputs::all(),
        }
    }
}

/// Results of one frame, moved out of the frame state once the frame is written.
#[derive(Clone, PartialEq, Debug)]
pub struct FrameSummary {
    pub frame_id: usize,
    pub bounding_boxes: BoundingBoxes,
    pub truncation: VisibilityMap,
    pub occlusion: VisibilityMap,
}

/// Sequence driver.
/// Can only be constructed by initialization from a `Config`.
pub struct Renderer<W> {
    config: Config,
    intrinsics: Intrinsics,
    projection: Mat4,
    fov_projection: Option<Mat4>,
    raster: Rasterizer,
    label_model: Model,
    textured_model: Model,
    /// One label model per instance, with only its own geometry.
    isolated: Option<Vec<(InstanceId, Model)>>,
    registry: Registry,
    poses: Vec<Mat4>,
    cursor: usize,
    frame: FrameState,
    sink: W,
}

impl Config {
    /// Check clipping planes and field of view scale, NaN values included.
    pub fn validate(&self) -> Result<()> {
        let planes_ok = self.near > 0.0 && self.far > self.near && self.far.is_finite();
        if !planes_ok {
            return Err(Error::InvalidConfig(format!(
                "clipping planes must satisfy 0 < near < far, got near {} and far {}",
                self.near, self.far
            )));
        }
        if !(1.0..Float::INFINITY).contains(&self.fov_scale) {
            return Err(Error::InvalidConfig(format!(
                "fov_scale must be a finite number at least 1, got {}",
                self.fov_scale
            )));
        }
        Ok(())
    }

    /// Load everything needed to render the requested outputs of a scan.
    ///
    /// An invalid configuration, missing intrinsics or missing models are fatal.
    /// Missing instances metadata only leaves the registry empty,
    /// in which case bounding boxes and visibility maps stay empty.
    pub fn init<S: SceneSource, W: FrameSink>(self, scene: &S, sink: W) -> Result<Renderer<W>> {
        self.validate()?;
        let intrinsics = scene.intrinsics()?;
        log::info!(
            "Intrinsics: focal {:?}, principal point {:?}, {}x{}",
            intrinsics.focal,
            intrinsics.principal_point,
            intrinsics.width,
            intrinsics.height
        );
        let projection = intrinsics.projection(self.near, self.far);
        let fov_projection = if self.outputs.truncation {
            Some(intrinsics.fov_scaled(self.fov_scale).projection(self.near, self.far))
        } else {
            None
        };
        let raster = Rasterizer::new(intrinsics.width, intrinsics.height)?
            .with_orientation(self.orientation)
            .with_planes(self.near, self.far)
            .with_depth_scale(self.depth_scale)
            .with_background(self.background);

        let label_model = scene.label_model()?;
        log::info!("Label model: {} triangles", label_model.nb_triangles());
        let textured_model = if self.outputs.shaded() {
            let model = scene.textured_model()?;
            log::info!("Textured model: {} triangles", model.nb_triangles());
            model
        } else {
            Model::default()
        };

        let registry = match scene.instances() {
            Ok(instances) => Registry::new(instances)?,
            Err(err) => {
                log::warn!("No instance metadata, visibility will be empty: {}", err);
                Registry::default()
            }
        };
        log::info!("{} instances", registry.len());

        let isolated = if self.outputs.occlusion {
            let models: Vec<_> = registry
                .iter()
                .map(|instance| (instance.id, label_model.isolate(instance.color)))
                .collect();
            log::info!("{} isolated instance models", models.len());
            Some(models)
        } else {
            None
        };

        let mut poses = Vec::new();
        while let Some(pose) = scene.camera_pose(poses.len())? {
            poses.push(pose);
        }
        log::info!("{} camera poses", poses.len());

        Ok(Renderer {
            config: self,
            intrinsics,
            projection,
            fov_projection,
            raster,
            label_model,
            textured_model,
            isolated,
            registry,
            poses,
            cursor: 0,
            frame: FrameState::default(),
            sink,
        })
    }
} // impl Config

impl<W: FrameSink> Renderer<W> {
    /// Render all frames, starting from the first one.
    /// Returns the number of frames rendered.
    pub fn render_all_frames(&mut self) -> Result<usize> {
        self.cursor = 0;
        let mut count = 0;
        while self.render_next()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Render the frame at the cursor with the configured outputs and advance the cursor.
    /// Returns `None` once every frame is rendered.
    pub fn render_next(&mut self) -> Result<Option<FrameSummary>> {
        if self.cursor >= self.poses.len() {
            return Ok(None);
        }
        let outputs = self.config.outputs;
        let summary = self.render_frame(self.cursor, &outputs)?;
        self.cursor += 1;
        Ok(Some(summary))
    }

    /// Move the cursor used by `render_next`.
    pub fn set_frame(&mut self, frame_id: usize) -> Result<()> {
        if frame_id >= self.poses.len() {
            return Err(Error::FrameOutOfRange(frame_id));
        }
        self.cursor = frame_id;
        Ok(())
    }

    /// Render one frame and write it to the sink.
    ///
    /// The label pass is always rendered since bounding boxes depend on it.
    /// Result maps are moved into the returned summary,
    /// images stay available through the accessors until the next frame.
    pub fn render_frame(&mut self, frame_id: usize, outputs: &Outputs) -> Result<FrameSummary> {
        let pose = self
            .poses
            .get(frame_id)
            .ok_or(Error::FrameOutOfRange(frame_id))?;
        let view = projection::view_from_pose(pose);
        self.frame.reset();
        log::info!("Rendering frame {}", frame_id);

        // Label pass.
        match self
            .raster
            .render_labels(&self.label_model, &self.registry, &view, &self.projection)
        {
            Ok(labels) => {
                self.frame.bounding_boxes = visibility::bounding_boxes(&labels.instances);
                self.frame.labels = Some(labels.colors);
                self.frame.instances = Some(labels.instances);
            }
            Err(Error::NotReady) => log::debug!("Frame {}: nothing to label", frame_id),
            Err(err) => return Err(err),
        }

        // Color and depth pass.
        if outputs.shaded() {
            let model = if self.textured_model.is_empty() {
                &self.label_model
            } else {
                &self.textured_model
            };
            let shaded = self.raster.render(model, &view, &self.projection);
            self.frame.color = Some(shaded.color);
            self.frame.depth = Some(shaded.depth);
        }

        if outputs.truncation {
            self.truncation(frame_id, &view)?;
        }
        if outputs.occlusion {
            self.occlusion(frame_id, &view)?;
        }
        if outputs.visibility() {
            visibility::reconcile(&mut self.frame.truncation, &mut self.frame.occlusion);
        }

        self.sink.write(frame_id, outputs, &self.frame)?;
        let (bounding_boxes, truncation, occlusion) = self.frame.take_results();
        Ok(FrameSummary {
            frame_id,
            bounding_boxes,
            truncation,
            occlusion,
        })
    }

    fn truncation(&mut self, frame_id: usize, view: &Mat4) -> Result<()> {
        let fov_projection = self.fov_projection.ok_or(Error::NotPrepared("truncation"))?;
        match self
            .raster
            .render_labels(&self.label_model, &self.registry, view, &fov_projection)
        {
            Ok(enlarged) => {
                self.frame.truncation = visibility::truncation(&enlarged.instances, self.config.fov_scale);
                log::debug!("Frame {}: {} truncated instances", frame_id, self.frame.truncation.len());
                Ok(())
            }
            Err(Error::NotReady) => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn occlusion(&mut self, frame_id: usize, view: &Mat4) -> Result<()> {
        let isolated = self.isolated.as_ref().ok_or(Error::NotPrepared("occlusion"))?;
        let scene = match &self.frame.instances {
            Some(scene) => scene,
            None => return Ok(()),
        };
        let visible = visibility::instance_histogram(scene);
        for (id, model) in isolated {
            // Instances absent from the scene render have no valid entry.
            if model.is_empty() || !visible.contains_key(id) {
                continue;
            }
            let alone = self
                .raster
                .render_labels(model, &self.registry, view, &self.projection)?;
            if let Some(entry) = visibility::occlusion(scene, &alone.instances, *id) {
                self.frame.occlusion.insert(*id, entry);
            }
        }
        log::debug!("Frame {}: {} occluded instances", frame_id, self.frame.occlusion.len());
        Ok(())
    }

    // Accessors ###################################################

    /// Color image of the last rendered frame.
    pub fn color(&self) -> Option<&DMatrix<Rgb8>> {
        self.frame.color.as_ref()
    }

    /// Depth image of the last rendered frame.
    pub fn depth(&self) -> Option<&DMatrix<u16>> {
        self.frame.depth.as_ref()
    }

    /// Label colors of the last rendered frame.
    pub fn labels(&self) -> Option<&DMatrix<Rgb8>> {
        self.frame.labels.as_ref()
    }

    /// Instance ids of the last rendered frame.
    pub fn instances(&self) -> Option<&DMatrix<InstanceId>> {
        self.frame.instances.as_ref()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Label of an instance of the scan.
    pub fn instance_label(&self, id: InstanceId) -> Option<&str> {
        self.registry.label(id)
    }

    /// Render color of an instance of the scan.
    pub fn instance_color(&self, id: InstanceId) -> Option<PackedRgb> {
        self.registry.color(id)
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    pub fn nb_frames(&self) -> usize {
        self.poses.len()
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn into_sink(self) -> W {
        self.sink
    }
} // impl Renderer

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use crate::core::frame::{BoundingBox, VisibilityEntry};
    use quickcheck_macros;
    use crate::core::mesh::Batch;
    use crate::misc::type_aliases::Point3;

    const RED: u32 = 0xff0000;
    const GREEN: u32 = 0x00ff00;

    // Quad facing the camera at depth z, with vertex colors like a labels ply.
    fn quad(x: (Float, Float), y: (Float, Float), z: Float, color: u32) -> Batch {
        let positions = vec![
            Point3::new(x.0, y.0, z),
            Point3::new(x.1, y.0, z),
            Point3::new(x.1, y.1, z),
            Point3::new(x.0, y.1, z),
        ];
        Batch::new(positions, vec![[0, 1, 2], [0, 2, 3]])
            .with_colors(vec![PackedRgb::from_hex(color).rgb(); 4])
    }

    fn rect(half_x: Float, half_y: Float, z: Float, color: u32) -> Batch {
        quad((-half_x, half_x), (-half_y, half_y), z, color)
    }

    /// Instance A (red) at depth `z_a` and instance B (green) at depth `z_b`.
    /// At depths 2 and 4, A exactly hides B in the normal view
    /// and B is larger than A so it is partly visible in the enlarged view.
    fn stacked(z_a: Float, z_b: Float) -> Vec<Batch> {
        vec![rect(1.2, 1.0, z_a, RED), rect(3.0, 3.0, z_b, GREEN)]
    }

    /// A is split by a thin vertical slit, in front of B.
    /// The slit falls between two pixel centers of the normal view,
    /// but on a pixel center of the enlarged view, in its centered crop.
    fn behind_slit() -> Vec<Batch> {
        vec![
            quad((-3.0, -0.8875), (-3.0, 3.0), 2.0, RED),
            quad((-0.8625, 3.0), (-3.0, 3.0), 2.0, RED),
            rect(5.0, 5.0, 4.0, GREEN),
        ]
    }

    struct Scene {
        nb_frames: usize,
        with_metadata: bool,
        batches: Vec<Batch>,
    }

    impl SceneSource for Scene {
        fn intrinsics(&self) -> Result<Intrinsics> {
            Ok(Intrinsics {
                principal_point: (8.0, 6.0),
                focal: (16.0, 16.0),
                width: 16,
                height: 12,
            })
        }

        fn label_model(&self) -> Result<Model> {
            Ok(Model::new(self.batches.clone()))
        }

        fn textured_model(&self) -> Result<Model> {
            Ok(Model::default())
        }

        fn instances(&self) -> Result<Vec<Instance>> {
            if !self.with_metadata {
                return Err(Error::parse("objects.json", "missing"));
            }
            Ok(vec![
                Instance {
                    id: 1,
                    label: "wall".to_string(),
                    color: PackedRgb::from_hex(RED),
                },
                Instance {
                    id: 2,
                    label: "cabinet".to_string(),
                    color: PackedRgb::from_hex(GREEN),
                },
            ])
        }

        fn camera_pose(&self, frame_id: usize) -> Result<Option<Mat4>> {
            Ok(if frame_id < self.nb_frames {
                Some(Mat4::identity())
            } else {
                None
            })
        }
    }

    #[derive(Default)]
    struct Collector {
        frames: Vec<(usize, FrameSummary)>,
        with_color: usize,
    }

    impl FrameSink for Collector {
        fn write(&mut self, frame_id: usize, _outputs: &Outputs, frame: &FrameState) -> Result<()> {
            if frame.color.is_some() {
                self.with_color += 1;
            }
            self.frames.push((
                frame_id,
                FrameSummary {
                    frame_id,
                    bounding_boxes: frame.bounding_boxes.clone(),
                    truncation: frame.truncation.clone(),
                    occlusion: frame.occlusion.clone(),
                },
            ));
            Ok(())
        }
    }

    fn scene(nb_frames: usize, batches: Vec<Batch>) -> Scene {
        Scene {
            nb_frames,
            with_metadata: true,
            batches,
        }
    }

    fn renderer(nb_frames: usize, config: Config) -> Renderer<Collector> {
        let scene = scene(nb_frames, stacked(2.0, 4.0));
        config.init(&scene, Collector::default()).unwrap()
    }

    #[test]
    fn all_frames_are_written_in_order() {
        let mut renderer = renderer(3, Config::default());
        assert_eq!(renderer.nb_frames(), 3);
        assert_eq!(renderer.render_all_frames().unwrap(), 3);
        let ids: Vec<usize> = renderer.sink().frames.iter().map(|f| f.0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(renderer.render_next().unwrap().is_none());
    }

    #[test]
    fn occluded_instance_is_reconciled() {
        let mut renderer = renderer(1, Config::default());
        let summary = renderer.render_next().unwrap().unwrap();

        // A covers the whole normal view and nothing hides it.
        let a = summary.occlusion[&1];
        assert_eq!((a.measured, a.reference), (16 * 12, 16 * 12));
        assert_eq!(a.ratio, 1.0);

        // Rotated output: 16 rows and 12 columns.
        assert_eq!(
            summary.bounding_boxes[&1],
            BoundingBox {
                min_x: 0,
                min_y: 0,
                max_x: 11,
                max_y: 15
            }
        );
        assert!(!summary.bounding_boxes.contains_key(&2));

        // In the enlarged view A covers 10x8 pixels, the 8x6 crop being inside.
        let t = summary.truncation[&1];
        assert_eq!((t.measured, t.reference), (48, 80));

        // B is hidden in the normal view, so in none of the raw maps.
        assert!(summary.truncation.keys().eq(summary.occlusion.keys()));
        assert!(!summary.occlusion.contains_key(&2));
    }

    #[test]
    fn rendering_is_idempotent() {
        let mut renderer = renderer(2, Config::default());
        let outputs = Outputs::all();
        let first = renderer.render_frame(1, &outputs).unwrap();
        let second = renderer.render_frame(1, &outputs).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn results_are_cleared_but_images_kept() {
        let mut renderer = renderer(1, Config::default());
        renderer.render_frame(0, &Outputs::all()).unwrap();
        assert!(renderer.frame.bounding_boxes.is_empty());
        assert!(renderer.frame.truncation.is_empty() && renderer.frame.occlusion.is_empty());
        assert_eq!(renderer.instances().map(|m| m.shape()), Some((16, 12)));
        assert_eq!(renderer.color().map(|m| m.shape()), Some((16, 12)));
        assert!(renderer.depth().is_some() && renderer.labels().is_some());
        assert_eq!(renderer.instance_label(2), Some("cabinet"));
    }

    #[test]
    fn only_visibility_skips_images() {
        let config = Config {
            outputs: Outputs::visibility_only(),
            ..Config::default()
        };
        let mut renderer = renderer(2, config);
        renderer.render_all_frames().unwrap();
        assert_eq!(renderer.sink().with_color, 0);
        assert!(renderer.color().is_none());
        assert_eq!(renderer.sink().frames[1].1.occlusion[&1].ratio, 1.0);
    }

    #[test]
    fn missing_metadata_gives_empty_results() {
        let scene = Scene {
            nb_frames: 1,
            with_metadata: false,
            batches: stacked(2.0, 4.0),
        };
        let mut renderer = Config::default().init(&scene, Collector::default()).unwrap();
        assert!(renderer.registry().is_empty());
        let summary = renderer.render_next().unwrap().unwrap();
        assert!(summary.bounding_boxes.is_empty());
        assert!(summary.truncation.is_empty() && summary.occlusion.is_empty());
        assert!(renderer.color().is_some());
        assert!(renderer.instances().is_none());
    }

    #[test]
    fn unprepared_outputs_and_missing_frames_are_errors() {
        let config = Config {
            outputs: Outputs {
                truncation: false,
                occlusion: false,
                ..Outputs::all()
            },
            ..Config::default()
        };
        let mut renderer = renderer(1, config);
        assert!(matches!(
            renderer.render_frame(0, &Outputs::all()),
            Err(Error::NotPrepared("truncation"))
        ));
        assert!(matches!(renderer.set_frame(1), Err(Error::FrameOutOfRange(1))));
        assert!(matches!(
            renderer.render_frame(5, &Outputs::all()),
            Err(Error::FrameOutOfRange(5))
        ));
        // Without visibility, maps are left empty.
        let summary = renderer.render_next().unwrap().unwrap();
        assert!(summary.truncation.is_empty() && summary.occlusion.is_empty());
        assert_eq!(summary.bounding_boxes.len(), 1);
    }

    #[test]
    fn visibility_does_not_depend_on_orientation() {
        let upright = Config {
            orientation: Orientation::Upright,
            ..Config::default()
        };
        let mut straight = renderer(1, upright);
        let mut rotated = renderer(1, Config::default());
        let a = straight.render_next().unwrap().unwrap();
        let b = rotated.render_next().unwrap().unwrap();
        assert_eq!(a.truncation, b.truncation);
        assert_eq!(a.occlusion, b.occlusion);
        assert_eq!(straight.instances().map(|m| m.shape()), Some((12, 16)));
        assert_eq!(
            a.bounding_boxes[&1],
            BoundingBox {
                min_x: 0,
                min_y: 0,
                max_x: 15,
                max_y: 11
            }
        );
    }

    #[test]
    fn instance_hidden_in_normal_view_gets_neutral_occlusion() {
        let scene = scene(1, behind_slit());
        let mut renderer = Config::default().init(&scene, Collector::default()).unwrap();
        let summary = renderer.render_next().unwrap().unwrap();

        // B is only seen through the slit, one pixel wide in the enlarged view.
        assert!(!summary.bounding_boxes.contains_key(&2));
        let t = summary.truncation[&2];
        assert_eq!((t.measured, t.reference), (6, 12));
        assert_eq!(t.ratio, 0.5);
        assert_eq!(summary.occlusion[&2], VisibilityEntry::neutral());

        let a = summary.occlusion[&1];
        assert_eq!((a.measured, a.reference, a.ratio), (16 * 12, 16 * 12, 1.0));
        assert_eq!(summary.truncation[&1].measured, 48 - 6);
        assert!(summary.truncation.keys().eq(summary.occlusion.keys()));
    }

    #[test]
    fn invalid_config_is_an_error() {
        let invalid = |config: Config| {
            let scene = scene(1, stacked(2.0, 4.0));
            matches!(
                config.init(&scene, Collector::default()),
                Err(Error::InvalidConfig(_))
            )
        };
        let default = Config::default;
        assert!(invalid(Config {
            fov_scale: 0.5,
            ..default()
        }));
        assert!(invalid(Config {
            fov_scale: Float::NAN,
            ..default()
        }));
        assert!(invalid(Config {
            near: 10.0,
            far: 1.0,
            ..default()
        }));
        assert!(invalid(Config {
            near: 1.0,
            far: 1.0,
            ..default()
        }));
        assert!(invalid(Config {
            near: 0.0,
            ..default()
        }));
        assert!(invalid(Config {
            far: Float::NAN,
            ..default()
        }));
        assert!(default().validate().is_ok());
    }

    // PROPERTY TESTS ################################################

    #[quickcheck_macros::quickcheck]
    fn rendered_ratios_in_unit_interval(a: u8, b: u8) -> bool {
        let depth = |x: u8| 1.0 + Float::from(x % 60) * 0.1;
        let (z_a, z_b) = (depth(a), depth(b));
        let scene = scene(1, stacked(z_a, z_b));
        let mut renderer = Config::default().init(&scene, Collector::default()).unwrap();
        let summary = renderer.render_next().unwrap().unwrap();
        let in_unit = |map: &VisibilityMap| map.values().all(|e| e.ratio > 0.0 && e.ratio <= 1.0);
        // Nothing can occlude the nearest instance.
        let nearest = if z_a < z_b { 1 } else { 2 };
        let nearest_ok = z_a == z_b
            || summary
                .occlusion
                .get(&nearest)
                .map_or(true, |e| e.measured == e.reference && e.ratio == 1.0);
        in_unit(&summary.truncation) && in_unit(&summary.occlusion) && nearest_ok
    }
}
