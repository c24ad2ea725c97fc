// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Miscellaneous helper functions that didn't fit elsewhere.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use nalgebra::DMatrix;
use std::{
    fs::File,
    io::{BufWriter, Cursor},
    path::Path,
};

/// Write a 16 bit gray png image (depth or instance ids) to a file.
#[allow(clippy::cast_possible_truncation)]
pub fn write_png_16bits<P: AsRef<Path>>(
    file_path: P,
    mat: &DMatrix<u16>,
) -> Result<(), png::EncodingError> {
    let (nb_rows, nb_cols) = mat.shape();
    let file = File::create(file_path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), nb_cols as u32, nb_rows as u32);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Sixteen);
    let mut writer = encoder.write_header()?;

    // Png samples are big endian, in row major order.
    let mut buffer = Vec::with_capacity(2 * nb_rows * nb_cols);
    for row in mat.row_iter() {
        for &value in row.iter() {
            buffer.write_u16::<BigEndian>(value)?;
        }
    }
    writer.write_image_data(&buffer)?;
    Ok(())
}

/// Read a 16 bit gray png image from a file.
pub fn read_png_16bits<P: AsRef<Path>>(file_path: P) -> Result<DMatrix<u16>, png::DecodingError> {
    let img_file = File::open(file_path)?;
    let mut decoder = png::Decoder::new(img_file);
    // Use the IDENTITY transformation because by default
    // it will use STRIP_16 which only keep 8 bits.
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder.read_info()?;
    let mut buffer = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buffer)?;

    // Transform buffer into 16 bits slice.
    let (width, height) = (info.width as usize, info.height as usize);
    let mut buffer_u16 = vec![0; width * height];
    let mut buffer_cursor = Cursor::new(buffer);
    buffer_cursor.read_u16_into::<BigEndian>(&mut buffer_u16)?;
    Ok(DMatrix::from_row_slice(height, width, &buffer_u16))
}

// TESTS #############################################################
