// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Loader of textured Wavefront OBJ meshes.
//!
//! One batch is created per material, with the diffuse color (`Kd`)
//! as vertex colors and the diffuse texture (`map_Kd`) if any.

use image::RgbImage;
use std::{collections::HashMap, path::Path, rc::Rc};

use crate::core::mesh::{Batch, Model};
use crate::misc::error::{Error, Result};
use crate::misc::type_aliases::{Float, Point2, Point3, Rgb8};

/// Diffuse properties of a material.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Material {
    pub diffuse: Option<Rgb8>,
    pub texture_file: Option<String>,
}

/// Load an OBJ file, its material library and textures.
///
/// A missing material library or texture only removes the corresponding colors.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Model> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let mesh = parse::obj(&content).map_err(|msg| Error::parse(path, msg))?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut materials = HashMap::new();
    for library in &mesh.libraries {
        let library_path = dir.join(library);
        match std::fs::read_to_string(&library_path) {
            Ok(text) => materials.extend(parse::mtl(&text)),
            Err(err) => log::warn!("Material library {}: {}", library_path.display(), err),
        }
    }

    let mut textures: HashMap<String, Rc<RgbImage>> = HashMap::new();
    for material in materials.values() {
        if let Some(file) = &material.texture_file {
            if textures.contains_key(file) {
                continue;
            }
            let texture_path = dir.join(file);
            match image::open(&texture_path) {
                Ok(img) => {
                    textures.insert(file.clone(), Rc::new(img.to_rgb8()));
                }
                Err(err) => log::warn!("Texture {}: {}", texture_path.display(), err),
            }
        }
    }

    let batches = mesh.batches(&materials, &textures);
    log::debug!("{}: {} batches", path.display(), batches.len());
    Ok(Model::new(batches))
}

/// Raw content of an OBJ file.
#[derive(Debug, Default)]
pub struct ObjMesh {
    pub positions: Vec<Point3>,
    pub colors: Vec<Rgb8>,
    pub tex_coords: Vec<Point2>,
    pub libraries: Vec<String>,
    /// Faces grouped by material, in order of first use.
    pub groups: Vec<FaceGroup>,
}

/// Faces of one material. Corners are 0-based (position, texture coordinate) indices.
#[derive(Debug, Default, PartialEq)]
pub struct FaceGroup {
    pub material: Option<String>,
    pub faces: Vec<Vec<(usize, Option<usize>)>>,
}

impl ObjMesh {
    /// Build one batch per face group.
    /// Corners with the same position and texture coordinate share a vertex.
    #[allow(clippy::cast_possible_truncation)]
    pub fn batches(
        &self,
        materials: &HashMap<String, Material>,
        textures: &HashMap<String, Rc<RgbImage>>,
    ) -> Vec<Batch> {
        let has_colors = !self.colors.is_empty() && self.colors.len() == self.positions.len();
        let mut batches = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            let material = group.material.as_ref().and_then(|name| materials.get(name));
            let mut index: HashMap<(usize, Option<usize>), u32> = HashMap::new();
            let mut corners = Vec::new();
            let mut triangles = Vec::new();
            for face in &group.faces {
                let ids: Vec<u32> = face
                    .iter()
                    .map(|&corner| {
                        *index.entry(corner).or_insert_with(|| {
                            corners.push(corner);
                            (corners.len() - 1) as u32
                        })
                    })
                    .collect();
                for i in 1..ids.len().saturating_sub(1) {
                    triangles.push([ids[0], ids[i], ids[i + 1]]);
                }
            }
            let positions = corners.iter().map(|&(v, _)| self.positions[v]).collect();
            let mut batch = Batch::new(positions, triangles);
            if has_colors {
                batch.colors = corners.iter().map(|&(v, _)| self.colors[v]).collect();
            } else if let Some(diffuse) = material.and_then(|m| m.diffuse) {
                batch.colors = vec![diffuse; corners.len()];
            }
            let texture = material
                .and_then(|m| m.texture_file.as_ref())
                .and_then(|file| textures.get(file));
            if let Some(texture) = texture {
                if corners.iter().all(|(_, vt)| vt.is_some()) {
                    batch.tex_coords = corners
                        .iter()
                        .filter_map(|&(_, vt)| vt.map(|t| self.tex_coords[t]))
                        .collect();
                    batch.texture = Some(Rc::clone(texture));
                }
            }
            batches.push(batch);
        }
        batches
    }
}

/// Parse OBJ and MTL files.
pub mod parse {
    use super::*;
    use nom::{
        branch::alt,
        bytes::complete::tag,
        character::complete::{char, i64 as integer, not_line_ending, space0, space1},
        combinator::{map, opt},
        multi::separated_list1,
        number::complete::float,
        sequence::{pair, preceded},
        IResult,
    };

    enum Line<'a> {
        Vertex(Vec<Float>),
        TexCoord(Vec<Float>),
        Face(Vec<(i64, Option<i64>)>),
        MtlLib(&'a str),
        UseMtl(&'a str),
    }

    /// Parse the content of an OBJ file.
    /// Unsupported statements (normals, groups, lines, ...) are ignored.
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    pub fn obj(content: &str) -> std::result::Result<ObjMesh, String> {
        let mut mesh = ObjMesh::default();
        let mut group_of: HashMap<Option<String>, usize> = HashMap::new();
        let mut current: Option<String> = None;
        for (line_number, line) in content.lines().enumerate() {
            let line = line.trim();
            let parsed = match statement(line) {
                Ok((_, parsed)) => parsed,
                Err(_) => continue,
            };
            match parsed {
                Line::Vertex(values) => {
                    if values.len() < 3 {
                        return Err(format!("line {}: vertex needs 3 coordinates", line_number + 1));
                    }
                    mesh.positions.push(Point3::new(values[0], values[1], values[2]));
                    if values.len() >= 6 {
                        let channel = |x: Float| (x * 255.0).round().max(0.0).min(255.0) as u8;
                        mesh.colors.push((channel(values[3]), channel(values[4]), channel(values[5])));
                    }
                }
                Line::TexCoord(values) => {
                    let v = values.get(1).cloned().unwrap_or(0.0);
                    mesh.tex_coords.push(Point2::new(values[0], v));
                }
                Line::Face(corners) => {
                    let resolve = |i: i64, len: usize| -> Option<usize> {
                        let resolved = if i < 0 { len as i64 + i } else { i - 1 };
                        if resolved >= 0 && (resolved as usize) < len {
                            Some(resolved as usize)
                        } else {
                            None
                        }
                    };
                    let mut face = Vec::with_capacity(corners.len());
                    for (v, vt) in corners {
                        let v = resolve(v, mesh.positions.len())
                            .ok_or_else(|| format!("line {}: invalid vertex index", line_number + 1))?;
                        let vt = match vt {
                            Some(t) => Some(
                                resolve(t, mesh.tex_coords.len())
                                    .ok_or_else(|| format!("line {}: invalid texture index", line_number + 1))?,
                            ),
                            None => None,
                        };
                        face.push((v, vt));
                    }
                    let next_group = mesh.groups.len();
                    let group = *group_of.entry(current.clone()).or_insert(next_group);
                    if group == next_group {
                        mesh.groups.push(FaceGroup {
                            material: current.clone(),
                            faces: Vec::new(),
                        });
                    }
                    mesh.groups[group].faces.push(face);
                }
                Line::MtlLib(name) => mesh.libraries.push(name.to_string()),
                Line::UseMtl(name) => current = Some(name.to_string()),
            }
        }
        Ok(mesh)
    }

    /// Parse the content of an MTL file into named materials.
    pub fn mtl(content: &str) -> HashMap<String, Material> {
        let mut materials = HashMap::new();
        let mut current: Option<(String, Material)> = None;
        for line in content.lines().map(str::trim) {
            if let Ok((_, name)) = keyword("newmtl")(line) {
                if let Some((done, material)) = current.take() {
                    materials.insert(done, material);
                }
                current = Some((name.to_string(), Material::default()));
            } else if let Some((_, material)) = current.as_mut() {
                if let Ok((_, rgb)) = diffuse(line) {
                    material.diffuse = Some(rgb);
                } else if let Ok((_, file)) = keyword("map_Kd")(line) {
                    // Options such as -s or -o are not supported, the file is the last word.
                    material.texture_file = file.split_whitespace().last().map(str::to_string);
                }
            }
        }
        if let Some((done, material)) = current {
            materials.insert(done, material);
        }
        materials
    }

    fn statement(input: &str) -> IResult<&str, Line> {
        alt((
            map(numbers("v"), Line::Vertex),
            map(numbers("vt"), Line::TexCoord),
            map(face, Line::Face),
            map(keyword("mtllib"), Line::MtlLib),
            map(keyword("usemtl"), Line::UseMtl),
        ))(input)
    }

    fn numbers<'a>(name: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, Vec<Float>> {
        preceded(pair(tag(name), space1), separated_list1(space1, float))
    }

    fn keyword<'a>(name: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
        map(preceded(pair(tag(name), space1), not_line_ending), str::trim)
    }

    fn face(input: &str) -> IResult<&str, Vec<(i64, Option<i64>)>> {
        preceded(pair(tag("f"), space1), separated_list1(space1, face_corner))(input)
    }

    /// `v`, `v/vt`, `v//vn` or `v/vt/vn`.
    fn face_corner(input: &str) -> IResult<&str, (i64, Option<i64>)> {
        let (input, v) = integer(input)?;
        let (input, vt) = opt(preceded(char('/'), opt(integer)))(input)?;
        let (input, _) = opt(preceded(char('/'), integer))(input)?;
        Ok((input, (v, vt.flatten())))
    }

    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    fn diffuse(input: &str) -> IResult<&str, Rgb8> {
        let (input, _) = pair(tag("Kd"), space1)(input)?;
        let (input, r) = float(input)?;
        let (input, g) = preceded(space0, float)(input)?;
        let (input, b) = preceded(space0, float)(input)?;
        let channel = |x: Float| (x * 255.0).round().max(0.0).min(255.0) as u8;
        Ok((input, (channel(r), channel(g), channel(b))))
    }
}

// TESTS #############################################################
