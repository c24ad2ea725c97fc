// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Loader of PLY meshes with per vertex colors, like the labeled scans.
//!
//! Supports the ascii, binary little endian and binary big endian formats.
//! Polygons are triangulated as fans.

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use std::{io::Cursor, marker::PhantomData, path::Path};

use crate::core::color::PackedRgb;
use crate::core::mesh::{Batch, Model};
use crate::misc::error::{Error, Result};
use crate::misc::type_aliases::{Float, Point3, Rgb8};

/// Load a PLY file into a model with a single batch.
///
/// With a `filter` color, only faces touching a vertex of exactly this color are kept.
pub fn load<P: AsRef<Path>>(path: P, filter: Option<PackedRgb>) -> Result<Model> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    let batch = parse(&bytes).map_err(|msg| Error::parse(path, msg))?;
    log::debug!(
        "{}: {} vertices, {} triangles",
        path.display(),
        batch.positions.len(),
        batch.nb_triangles()
    );
    let batch = match filter {
        Some(color) => batch.retain_color(color),
        None => batch,
    };
    Ok(Model::new(vec![batch]))
}

/// Parse the content of a PLY file.
pub fn parse(bytes: &[u8]) -> std::result::Result<Batch, String> {
    let (header, body) = split_header(bytes)?;
    let header = Header::parse(header)?;
    match header.format {
        Format::Ascii => {
            let text = std::str::from_utf8(body).map_err(|_| "ascii body is not utf8".to_string())?;
            read_body(&header, &mut AsciiValues(text.split_whitespace()))
        }
        Format::BinaryLittleEndian => {
            read_body(&header, &mut BinaryValues::<LittleEndian>::new(body))
        }
        Format::BinaryBigEndian => read_body(&header, &mut BinaryValues::<BigEndian>::new(body)),
    }
}

// HEADER ############################################################

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Format {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Scalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

#[derive(Clone, PartialEq, Eq, Debug)]
enum Property {
    Scalar(Scalar, String),
    List(Scalar, Scalar, String),
}

#[derive(Clone, PartialEq, Eq, Debug)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<Property>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
struct Header {
    format: Format,
    elements: Vec<Element>,
}

fn split_header(bytes: &[u8]) -> std::result::Result<(&str, &[u8]), String> {
    const END: &[u8] = b"end_header";
    let end = bytes
        .windows(END.len())
        .position(|w| w == END)
        .ok_or_else(|| "no end_header".to_string())?;
    // The body starts after the end of the end_header line.
    let body_start = bytes[end..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|p| end + p + 1)
        .unwrap_or(bytes.len());
    let header = std::str::from_utf8(&bytes[..end]).map_err(|_| "header is not utf8".to_string())?;
    Ok((header, &bytes[body_start..]))
}

impl Scalar {
    fn from_name(name: &str) -> std::result::Result<Scalar, String> {
        match name {
            "char" | "int8" => Ok(Scalar::I8),
            "uchar" | "uint8" => Ok(Scalar::U8),
            "short" | "int16" => Ok(Scalar::I16),
            "ushort" | "uint16" => Ok(Scalar::U16),
            "int" | "int32" => Ok(Scalar::I32),
            "uint" | "uint32" => Ok(Scalar::U32),
            "float" | "float32" => Ok(Scalar::F32),
            "double" | "float64" => Ok(Scalar::F64),
            _ => Err(format!("unknown property type {}", name)),
        }
    }
}

impl Header {
    fn parse(text: &str) -> std::result::Result<Header, String> {
        let mut lines = text.lines().map(str::trim);
        if lines.next() != Some("ply") {
            return Err("missing ply magic".to_string());
        }
        let mut format = None;
        let mut elements: Vec<Element> = Vec::new();
        for line in lines {
            let words: Vec<&str> = line.split_whitespace().collect();
            match words.as_slice() {
                ["format", "ascii", _] => format = Some(Format::Ascii),
                ["format", "binary_little_endian", _] => format = Some(Format::BinaryLittleEndian),
                ["format", "binary_big_endian", _] => format = Some(Format::BinaryBigEndian),
                ["element", name, count] => elements.push(Element {
                    name: name.to_string(),
                    count: count.parse().map_err(|_| format!("invalid element count {}", count))?,
                    properties: Vec::new(),
                }),
                ["property", "list", count_type, item_type, name] => {
                    let property = Property::List(
                        Scalar::from_name(count_type)?,
                        Scalar::from_name(item_type)?,
                        name.to_string(),
                    );
                    last_element(&mut elements)?.properties.push(property);
                }
                ["property", scalar, name] => {
                    let property = Property::Scalar(Scalar::from_name(scalar)?, name.to_string());
                    last_element(&mut elements)?.properties.push(property);
                }
                ["comment", ..] | ["obj_info", ..] | [] => (),
                _ => return Err(format!("unexpected header line: {}", line)),
            }
        }
        Ok(Header {
            format: format.ok_or_else(|| "missing format".to_string())?,
            elements,
        })
    }
}

fn last_element(elements: &mut Vec<Element>) -> std::result::Result<&mut Element, String> {
    elements
        .last_mut()
        .ok_or_else(|| "property before any element".to_string())
}

// BODY ##############################################################

/// Source of the successive numbers of the body.
trait Values {
    fn next(&mut self, scalar: Scalar) -> std::result::Result<f64, String>;
}

struct AsciiValues<'a>(std::str::SplitWhitespace<'a>);

impl<'a> Values for AsciiValues<'a> {
    fn next(&mut self, _scalar: Scalar) -> std::result::Result<f64, String> {
        let word = self.0.next().ok_or_else(|| "unexpected end of body".to_string())?;
        word.parse().map_err(|_| format!("invalid number {}", word))
    }
}

struct BinaryValues<'a, B> {
    cursor: Cursor<&'a [u8]>,
    order: PhantomData<B>,
}

impl<'a, B: ByteOrder> BinaryValues<'a, B> {
    fn new(body: &'a [u8]) -> Self {
        BinaryValues {
            cursor: Cursor::new(body),
            order: PhantomData,
        }
    }
}

impl<'a, B: ByteOrder> Values for BinaryValues<'a, B> {
    fn next(&mut self, scalar: Scalar) -> std::result::Result<f64, String> {
        let c = &mut self.cursor;
        let value = match scalar {
            Scalar::I8 => c.read_i8().map(f64::from),
            Scalar::U8 => c.read_u8().map(f64::from),
            Scalar::I16 => c.read_i16::<B>().map(f64::from),
            Scalar::U16 => c.read_u16::<B>().map(f64::from),
            Scalar::I32 => c.read_i32::<B>().map(f64::from),
            Scalar::U32 => c.read_u32::<B>().map(f64::from),
            Scalar::F32 => c.read_f32::<B>().map(f64::from),
            Scalar::F64 => c.read_f64::<B>(),
        };
        value.map_err(|_| "unexpected end of body".to_string())
    }
}

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn read_body<V: Values>(header: &Header, values: &mut V) -> std::result::Result<Batch, String> {
    let mut positions = Vec::new();
    let mut colors = Vec::new();
    let mut triangles = Vec::new();
    for element in &header.elements {
        match element.name.as_str() {
            "vertex" => {
                positions.reserve(element.count);
                for _ in 0..element.count {
                    let mut xyz = [0.0; 3];
                    let mut rgb = [None; 3];
                    for property in &element.properties {
                        match property {
                            Property::Scalar(scalar, name) => {
                                let value = values.next(*scalar)?;
                                match name.as_str() {
                                    "x" => xyz[0] = value,
                                    "y" => xyz[1] = value,
                                    "z" => xyz[2] = value,
                                    "red" | "r" => rgb[0] = Some(value),
                                    "green" | "g" => rgb[1] = Some(value),
                                    "blue" | "b" => rgb[2] = Some(value),
                                    _ => (),
                                }
                            }
                            Property::List(count_type, item_type, _) => skip_list(values, *count_type, *item_type)?,
                        }
                    }
                    positions.push(Point3::new(xyz[0] as Float, xyz[1] as Float, xyz[2] as Float));
                    if let [Some(r), Some(g), Some(b)] = rgb {
                        colors.push(to_rgb8(r, g, b));
                    }
                }
            }
            "face" => {
                triangles.reserve(element.count);
                for _ in 0..element.count {
                    for property in &element.properties {
                        match property {
                            Property::List(count_type, item_type, name)
                                if name == "vertex_indices" || name == "vertex_index" =>
                            {
                                let n = values.next(*count_type)? as usize;
                                let mut polygon = Vec::with_capacity(n);
                                for _ in 0..n {
                                    polygon.push(values.next(*item_type)? as u32);
                                }
                                for i in 1..n.saturating_sub(1) {
                                    triangles.push([polygon[0], polygon[i], polygon[i + 1]]);
                                }
                            }
                            Property::List(count_type, item_type, _) => skip_list(values, *count_type, *item_type)?,
                            Property::Scalar(scalar, _) => {
                                values.next(*scalar)?;
                            }
                        }
                    }
                }
            }
            _ => {
                for _ in 0..element.count {
                    for property in &element.properties {
                        match property {
                            Property::Scalar(scalar, _) => {
                                values.next(*scalar)?;
                            }
                            Property::List(count_type, item_type, _) => skip_list(values, *count_type, *item_type)?,
                        }
                    }
                }
            }
        }
    }
    if !colors.is_empty() && colors.len() != positions.len() {
        return Err("only some vertices have colors".to_string());
    }
    let nb_vertices = positions.len();
    if let Some(face) = triangles.iter().find(|f| f.iter().any(|&v| v as usize >= nb_vertices)) {
        return Err(format!("face {:?} refers to a missing vertex", face));
    }
    Ok(Batch::new(positions, triangles).with_colors(colors))
}

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn skip_list<V: Values>(values: &mut V, count_type: Scalar, item_type: Scalar) -> std::result::Result<(), String> {
    let n = values.next(count_type)? as usize;
    for _ in 0..n {
        values.next(item_type)?;
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn to_rgb8(r: f64, g: f64, b: f64) -> Rgb8 {
    let channel = |x: f64| x.round().max(0.0).min(255.0) as u8;
    (channel(r), channel(g), channel(b))
}

// TESTS #############################################################
