// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Interoperability conversions between the image and matrix types.

use image::{Rgb, RgbImage};
use nalgebra::DMatrix;

use crate::misc::type_aliases::Rgb8;

/// Convert an `(u8,u8,u8)` matrix into an `RgbImage`.
/// Inverse operation of `matrix_from_rgb_image`.
///
/// Performs a transposition to accomodate for the
/// column major matrix into the row major image.
#[allow(clippy::cast_possible_truncation)]
pub fn rgb_from_matrix(mat: &DMatrix<Rgb8>) -> RgbImage {
    let (nb_rows, nb_cols) = mat.shape();
    let mut img_buf = RgbImage::new(nb_cols as u32, nb_rows as u32);
    for (x, y, pixel) in img_buf.enumerate_pixels_mut() {
        let (r, g, b) = mat[(y as usize, x as usize)];
        *pixel = Rgb([r, g, b]);
    }
    img_buf
}

/// Convert an `RgbImage` into an `(u8,u8,u8)` matrix.
pub fn matrix_from_rgb_image(img: &RgbImage) -> DMatrix<Rgb8> {
    let (width, height) = img.dimensions();
    DMatrix::from_fn(height as usize, width as usize, |r, c| {
        let p = img.get_pixel(c as u32, r as u32);
        (p[0], p[1], p[2])
    })
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn rows_become_image_lines() {
        let mat = DMatrix::from_row_slice(1, 2, &[(1, 2, 3), (4, 5, 6)]);
        let img = rgb_from_matrix(&mat);
        assert_eq!(img.dimensions(), (2, 1));
        assert_eq!(img.get_pixel(1, 0), &Rgb([4, 5, 6]));
        assert_eq!(matrix_from_rgb_image(&img), mat);
    }
}
