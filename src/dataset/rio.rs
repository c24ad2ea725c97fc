// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper functions to handle scans of the 3RScan dataset.
//!
//! A dataset directory contains `objects.json` and one directory per scan:
//!
//! ```text
//! <data>/objects.json
//! <data>/<scan>/labels.instances.annotated.ply
//! <data>/<scan>/mesh.refined.obj
//! <data>/<scan>/sequence/_info.txt
//! <data>/<scan>/sequence/frame-000000.pose.txt
//! ```

use itertools::Itertools;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::{
    camera::Intrinsics,
    color::PackedRgb,
    frame::{BoundingBoxes, FrameState, VisibilityMap},
    mesh::Model,
    registry::{Instance, InstanceId},
    renderer::{FrameSink, Outputs, SceneSource},
};
use crate::dataset::{obj, ply};
use crate::misc::error::{Error, Result};
use crate::misc::{helper, interop};
use crate::misc::type_aliases::Mat4;

/// Instances metadata of every scan.
pub const OBJECTS_FILE: &str = "objects.json";
/// Model with one color per instance.
pub const LABELS_MODEL: &str = "labels.instances.annotated.ply";
/// Textured model.
pub const TEXTURED_MODEL: &str = "mesh.refined.obj";
/// Directory of the camera sequence inside a scan.
pub const SEQUENCE_DIR: &str = "sequence";
/// Intrinsics file inside the sequence directory.
pub const INFO_FILE: &str = "_info.txt";
pub const POSE_SUFFIX: &str = ".pose.txt";

pub const COLOR_SUFFIX: &str = ".rendered.color.jpg";
pub const DEPTH_SUFFIX: &str = ".rendered.depth.png";
pub const LABELS_SUFFIX: &str = ".rendered.labels.png";
pub const INSTANCES_SUFFIX: &str = ".rendered.instances.png";
pub const BOUNDING_BOXES_SUFFIX: &str = ".bb.txt";
pub const VISIBILITY_SUFFIX: &str = ".visibility.txt";
/// Color image with instance bounding boxes drawn over it.
pub const BOXES_IMAGE_SUFFIX: &str = ".rendered.bb.jpg";

/// `frame-000042` for frame 42.
pub fn frame_name(frame_id: usize) -> String {
    format!("frame-{:06}", frame_id)
}

// METADATA ##########################################################

#[derive(Deserialize, Debug)]
struct ObjectsFile {
    scans: Vec<ScanObjects>,
}

#[derive(Deserialize, Debug)]
struct ScanObjects {
    scan: String,
    #[serde(default)]
    objects: Vec<ObjectEntry>,
}

#[derive(Deserialize, Debug)]
struct ObjectEntry {
    id: String,
    #[serde(default)]
    label: String,
    ply_color: String,
}

/// Instances of one scan listed in the content of an `objects.json` file.
pub fn instances_from_json<P: AsRef<Path>>(content: &str, scan_id: &str, path: P) -> Result<Vec<Instance>> {
    let path = path.as_ref();
    let file: ObjectsFile = serde_json::from_str(content).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let scan = file
        .scans
        .into_iter()
        .find(|s| s.scan == scan_id)
        .ok_or_else(|| Error::parse(path, format!("scan {} is not listed", scan_id)))?;
    scan.objects
        .into_iter()
        .map(|object| -> Result<Instance> {
            let id: InstanceId = object
                .id
                .parse()
                .map_err(|_| Error::InvalidInstanceId(object.id.clone()))?;
            let color: PackedRgb = object.ply_color.parse().map_err(|msg| Error::parse(path, msg))?;
            Ok(Instance {
                id,
                label: object.label,
                color,
            })
        })
        .collect()
}

// SCAN ##############################################################

/// A scan of the dataset, read lazily from disk.
#[derive(Clone, Debug)]
pub struct Scan {
    data_path: PathBuf,
    scan_id: String,
}

impl Scan {
    pub fn new<P: Into<PathBuf>>(data_path: P, scan_id: &str) -> Scan {
        Scan {
            data_path: data_path.into(),
            scan_id: scan_id.to_string(),
        }
    }

    pub fn scan_dir(&self) -> PathBuf {
        self.data_path.join(&self.scan_id)
    }

    pub fn sequence_dir(&self) -> PathBuf {
        self.scan_dir().join(SEQUENCE_DIR)
    }

    pub fn pose_path(&self, frame_id: usize) -> PathBuf {
        self.sequence_dir()
            .join(format!("{}{}", frame_name(frame_id), POSE_SUFFIX))
    }
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

impl SceneSource for Scan {
    fn intrinsics(&self) -> Result<Intrinsics> {
        let path = self.sequence_dir().join(INFO_FILE);
        parse::info(&read_text(&path)?).map_err(|msg| Error::parse(&path, msg))
    }

    fn label_model(&self) -> Result<Model> {
        let path = self.scan_dir().join(LABELS_MODEL);
        if !path.exists() {
            return Err(Error::MissingModel(path));
        }
        ply::load(&path, None)
    }

    /// The textured model is optional, the label model is shaded instead.
    fn textured_model(&self) -> Result<Model> {
        let path = self.scan_dir().join(TEXTURED_MODEL);
        if !path.exists() {
            log::warn!("No textured model at {}", path.display());
            return Ok(Model::default());
        }
        obj::load(&path)
    }

    fn instances(&self) -> Result<Vec<Instance>> {
        let path = self.data_path.join(OBJECTS_FILE);
        instances_from_json(&read_text(&path)?, &self.scan_id, &path)
    }

    fn camera_pose(&self, frame_id: usize) -> Result<Option<Mat4>> {
        let path = self.pose_path(frame_id);
        if !path.exists() {
            return Ok(None);
        }
        parse::pose(&read_text(&path)?)
            .map(Some)
            .map_err(|msg| Error::parse(&path, msg))
    }
}

// OUTPUT ############################################################

/// Directory where rendered frames are written.
#[derive(Clone, Debug)]
pub struct OutputDir {
    path: PathBuf,
}

impl OutputDir {
    /// Create the directory if needed.
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<OutputDir> {
        let path = path.into();
        std::fs::create_dir_all(&path).map_err(|e| Error::io(&path, e))?;
        Ok(OutputDir { path })
    }

    /// Path of an output file of a frame.
    pub fn file(&self, frame_id: usize, suffix: &str) -> PathBuf {
        self.path.join(format!("{}{}", frame_name(frame_id), suffix))
    }
}

impl FrameSink for OutputDir {
    fn write(&mut self, frame_id: usize, outputs: &Outputs, frame: &FrameState) -> Result<()> {
        if let (true, Some(color)) = (outputs.color, &frame.color) {
            let path = self.file(frame_id, COLOR_SUFFIX);
            interop::rgb_from_matrix(color)
                .save(&path)
                .map_err(|source| Error::Image { path, source })?;
        }
        if let (true, Some(depth)) = (outputs.depth, &frame.depth) {
            let path = self.file(frame_id, DEPTH_SUFFIX);
            helper::write_png_16bits(&path, depth).map_err(|source| Error::Png { path, source })?;
        }
        if outputs.labels {
            if let Some(labels) = &frame.labels {
                let path = self.file(frame_id, LABELS_SUFFIX);
                interop::rgb_from_matrix(labels)
                    .save(&path)
                    .map_err(|source| Error::Image { path, source })?;
            }
            if let Some(instances) = &frame.instances {
                let path = self.file(frame_id, INSTANCES_SUFFIX);
                helper::write_png_16bits(&path, instances).map_err(|source| Error::Png { path, source })?;
            }
        }
        if outputs.bounding_boxes {
            let path = self.file(frame_id, BOUNDING_BOXES_SUFFIX);
            let text = format_bounding_boxes(&frame.bounding_boxes);
            std::fs::write(&path, text).map_err(|e| Error::io(&path, e))?;
        }
        if outputs.truncation || outputs.occlusion {
            let path = self.file(frame_id, VISIBILITY_SUFFIX);
            let text = format_visibility(&frame.truncation, &frame.occlusion);
            std::fs::write(&path, text).map_err(|e| Error::io(&path, e))?;
        }
        log::debug!("Frame {} written to {}", frame_id, self.path.display());
        Ok(())
    }
}

/// `id min_x min_y max_x max_y` lines.
pub fn format_bounding_boxes(boxes: &BoundingBoxes) -> String {
    boxes
        .iter()
        .map(|(id, b)| format!("{} {} {} {} {}\n", id, b.min_x, b.min_y, b.max_x, b.max_y))
        .join("")
}

/// `id trunc_measured trunc_reference trunc_ratio occ_measured occ_reference occ_ratio` lines.
///
/// Maps are expected to be reconciled, the neutral entry is used otherwise.
pub fn format_visibility(truncation: &VisibilityMap, occlusion: &VisibilityMap) -> String {
    truncation
        .keys()
        .chain(occlusion.keys())
        .unique()
        .sorted()
        .map(|id| {
            let t = truncation.get(id).cloned().unwrap_or_default();
            let o = occlusion.get(id).cloned().unwrap_or_default();
            format!(
                "{} {} {} {} {} {} {}\n",
                id, t.measured, t.reference, t.ratio, o.measured, o.reference, o.ratio
            )
        })
        .join("")
}

/// Parse text files of a scan sequence.
pub mod parse {
    use super::*;
    use crate::misc::type_aliases::Float;
    use nom::{
        bytes::complete::{tag, take_while1},
        character::complete::{multispace0, not_line_ending, space0, space1},
        multi::{count, separated_list1},
        number::complete::float,
        sequence::{delimited, preceded, separated_pair},
        IResult,
    };

    /// Parse a pose file: 16 numbers of a row major camera-to-world matrix.
    pub fn pose(content: &str) -> std::result::Result<Mat4, String> {
        let values: IResult<&str, Vec<Float>> = count(preceded(multispace0, float), 16)(content);
        match values {
            Ok((rest, values)) if rest.trim().is_empty() => Ok(Mat4::from_row_slice(&values)),
            Ok(_) => Err("more than 16 values".to_string()),
            Err(_) => Err("expected 16 numbers".to_string()),
        }
    }

    /// Parse an `_info.txt` file into the color camera intrinsics.
    pub fn info(content: &str) -> std::result::Result<Intrinsics, String> {
        let mut width = None;
        let mut height = None;
        let mut matrix = None;
        for line in content.lines() {
            let (key, value) = match key_value(line.trim()) {
                Ok((_, pair)) => pair,
                Err(_) => continue,
            };
            match key {
                "m_colorWidth" => width = Some(parse_size(value)?),
                "m_colorHeight" => height = Some(parse_size(value)?),
                "m_calibrationColorIntrinsic" => {
                    let values: IResult<&str, Vec<Float>> = separated_list1(space1, float)(value.trim());
                    match values {
                        Ok((_, values)) if values.len() >= 7 => matrix = Some(values),
                        _ => return Err(format!("invalid color intrinsics: {}", value)),
                    }
                }
                _ => (),
            }
        }
        let m = matrix.ok_or_else(|| "missing m_calibrationColorIntrinsic".to_string())?;
        Ok(Intrinsics {
            principal_point: (m[2], m[6]),
            focal: (m[0], m[5]),
            width: width.ok_or_else(|| "missing m_colorWidth".to_string())?,
            height: height.ok_or_else(|| "missing m_colorHeight".to_string())?,
        })
    }

    fn key_value(input: &str) -> IResult<&str, (&str, &str)> {
        separated_pair(
            take_while1(|c: char| c.is_alphanumeric() || c == '_'),
            delimited(space0, tag("="), space0),
            not_line_ending,
        )(input)
    }

    fn parse_size(value: &str) -> std::result::Result<usize, String> {
        value
            .trim()
            .parse()
            .map_err(|_| format!("invalid image size: {}", value))
    }
}

// TESTS #############################################################
