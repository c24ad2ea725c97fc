// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Bounding boxes, truncation and occlusion of instances from label renders.
//!
//! Every function here works on decoded instance id matrices,
//! indexed `(row, column)` with 0 for pixels not belonging to any instance.
//! All images given to the same function must share the same orientation.

use nalgebra::DMatrix;
use std::collections::BTreeMap;

use crate::core::frame::{BoundingBox, BoundingBoxes, VisibilityEntry, VisibilityMap};
use crate::core::registry::InstanceId;
use crate::misc::type_aliases::Float;

/// Tightest box around the pixels of each instance present in the image.
pub fn bounding_boxes(instances: &DMatrix<InstanceId>) -> BoundingBoxes {
    let mut boxes = BoundingBoxes::new();
    // Column major traversal, like the matrix storage.
    for (col, column) in instances.column_iter().enumerate() {
        for (row, &id) in column.iter().enumerate() {
            if id != 0 {
                boxes
                    .entry(id)
                    .and_modify(|bbox| bbox.extend(col, row))
                    .or_insert_with(|| BoundingBox::at(col, row));
            }
        }
    }
    boxes
}

/// Number of pixels of each instance present in the image.
pub fn instance_histogram(instances: &DMatrix<InstanceId>) -> BTreeMap<InstanceId, usize> {
    let mut histogram = BTreeMap::new();
    for &id in instances.iter().filter(|&&id| id != 0) {
        *histogram.entry(id).or_insert(0) += 1;
    }
    histogram
}

/// Rectangular region of an image: top left corner and size.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Region {
    pub row: usize,
    pub col: usize,
    pub nrows: usize,
    pub ncols: usize,
}

/// Region of an image rendered with a field of view enlarged by `scale`
/// that shows the same thing as the image with the normal field of view.
///
/// It is the centered `nrows / scale` by `ncols / scale` region,
/// which is valid for both orientations since a rotation keeps it centered.
/// `scale` is expected to be at least 1, smaller values give the whole image.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_precision_loss)]
pub fn crop_region(shape: (usize, usize), scale: Float) -> Region {
    let (nrows, ncols) = shape;
    let crop = |n: usize| ((n as Float / scale).round() as usize).min(n);
    let (crop_rows, crop_cols) = (crop(nrows), crop(ncols));
    Region {
        row: (nrows - crop_rows) / 2,
        col: (ncols - crop_cols) / 2,
        nrows: crop_rows,
        ncols: crop_cols,
    }
}

/// Truncation entries of every instance seen in an enlarged field of view render.
///
/// The measured count is the number of pixels inside the crop region
/// corresponding to the normal field of view, the reference is the full enlarged image.
/// Instances outside the crop region are omitted.
pub fn truncation(enlarged: &DMatrix<InstanceId>, scale: Float) -> VisibilityMap {
    let region = crop_region(enlarged.shape(), scale);
    let cropped = enlarged.view((region.row, region.col), (region.nrows, region.ncols));
    let mut measured = BTreeMap::new();
    for &id in cropped.iter().filter(|&&id| id != 0) {
        *measured.entry(id).or_insert(0) += 1;
    }
    instance_histogram(enlarged)
        .into_iter()
        .filter_map(|(id, reference)| {
            let inside = measured.get(&id).cloned().unwrap_or(0);
            VisibilityEntry::new(inside, reference).map(|entry| (id, entry))
        })
        .collect()
}

/// Occlusion entry of one instance.
///
/// `scene` is the render with every object, `isolated` the render
/// containing only this instance, both with the same pose and projection.
/// `None` if the instance is not seen in one of them.
pub fn occlusion(
    scene: &DMatrix<InstanceId>,
    isolated: &DMatrix<InstanceId>,
    id: InstanceId,
) -> Option<VisibilityEntry> {
    let count = |m: &DMatrix<InstanceId>| m.iter().filter(|&&x| x == id).count();
    VisibilityEntry::new(count(scene), count(isolated))
}

/// Make both maps have the same instances.
/// An instance missing from one map gets the neutral entry there.
pub fn reconcile(truncation: &mut VisibilityMap, occlusion: &mut VisibilityMap) {
    for id in occlusion.keys() {
        truncation.entry(*id).or_insert_with(VisibilityEntry::neutral);
    }
    for id in truncation.keys() {
        occlusion.entry(*id).or_insert_with(VisibilityEntry::neutral);
    }
    assert_eq!(
        truncation.len(),
        occlusion.len(),
        "reconciled visibility maps differ"
    );
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use quickcheck_macros;

    fn ids(nrows: usize, ncols: usize, rows: &[&[InstanceId]]) -> DMatrix<InstanceId> {
        let flat: Vec<_> = rows.iter().flat_map(|r| r.iter().cloned()).collect();
        DMatrix::from_row_slice(nrows, ncols, &flat)
    }

    #[test]
    fn boxes_are_tight() {
        #[rustfmt::skip]
        let image = ids(4, 5, &[
            &[0, 0, 0, 0, 0],
            &[0, 3, 3, 0, 0],
            &[0, 0, 3, 0, 7],
            &[0, 0, 0, 0, 0],
        ]);
        let boxes = bounding_boxes(&image);
        assert_eq!(boxes.len(), 2);
        assert_eq!(
            boxes[&3],
            BoundingBox {
                min_x: 1,
                min_y: 1,
                max_x: 2,
                max_y: 2
            }
        );
        assert_eq!(boxes[&7], BoundingBox::at(4, 2));
    }

    #[test]
    fn no_box_for_background_only() {
        let image = DMatrix::from_element(3, 3, 0);
        assert!(bounding_boxes(&image).is_empty());
        assert!(instance_histogram(&image).is_empty());
    }

    #[test]
    fn crop_is_centered() {
        assert_eq!(
            crop_region((480, 640), 2.0),
            Region {
                row: 120,
                col: 160,
                nrows: 240,
                ncols: 320
            }
        );
        assert_eq!(
            crop_region((640, 480), 2.0),
            Region {
                row: 160,
                col: 120,
                nrows: 320,
                ncols: 240
            }
        );
        assert_eq!(
            crop_region((10, 10), 1.0),
            Region {
                row: 0,
                col: 0,
                nrows: 10,
                ncols: 10
            }
        );
    }

    #[test]
    fn truncation_of_inside_and_cut_instances() {
        // 8x8 enlarged image with scale 2: the crop is rows/cols 2..6.
        let mut image = DMatrix::from_element(8, 8, 0);
        // Instance 1 fully inside the crop.
        image[(3, 3)] = 1;
        image[(4, 4)] = 1;
        // Instance 2: 2 pixels inside, 2 outside.
        image[(2, 5)] = 2;
        image[(3, 5)] = 2;
        image[(2, 6)] = 2;
        image[(3, 7)] = 2;
        // Instance 3 fully outside.
        image[(0, 0)] = 3;
        let map = truncation(&image, 2.0);
        assert_eq!(map.len(), 2);
        assert_eq!(map[&1], VisibilityEntry::new(2, 2).unwrap());
        assert_eq!(map[&1].ratio, 1.0);
        assert_eq!(map[&2].measured, 2);
        assert_eq!(map[&2].reference, 4);
        assert_eq!(map[&2].ratio, 0.5);
        assert!(!map.contains_key(&3));
    }

    #[test]
    fn occlusion_ratio() {
        #[rustfmt::skip]
        let scene = ids(2, 3, &[
            &[1, 1, 2],
            &[2, 2, 2],
        ]);
        #[rustfmt::skip]
        let isolated_1 = ids(2, 3, &[
            &[1, 1, 1],
            &[1, 0, 0],
        ]);
        let entry = occlusion(&scene, &isolated_1, 1).unwrap();
        assert_eq!((entry.measured, entry.reference), (2, 4));
        assert_eq!(entry.ratio, 0.5);
        // Not visible in the scene at all.
        let isolated_5 = DMatrix::from_element(2, 3, 5);
        assert_eq!(occlusion(&scene, &isolated_5, 5), None);
    }

    #[test]
    fn reconcile_fills_both_sides() {
        let mut truncation = VisibilityMap::new();
        let mut occlusion = VisibilityMap::new();
        truncation.insert(1, VisibilityEntry::new(1, 2).unwrap());
        occlusion.insert(2, VisibilityEntry::new(3, 3).unwrap());
        reconcile(&mut truncation, &mut occlusion);
        assert_eq!(truncation[&2], VisibilityEntry::neutral());
        assert_eq!(occlusion[&1], VisibilityEntry::neutral());
        assert_eq!(truncation[&1].ratio, 0.5);
        assert!(truncation.keys().eq(occlusion.keys()));
    }

    #[test]
    fn fully_hidden_instance_gets_neutral_occlusion() {
        // A (1) fills the scene render and hides B (2) which only shows when rendered alone.
        let scene = DMatrix::from_element(4, 4, 1);
        let alone_a = DMatrix::from_element(4, 4, 1);
        let mut alone_b = DMatrix::from_element(4, 4, 0);
        alone_b[(1, 1)] = 2;
        alone_b[(1, 2)] = 2;
        let mut occlusion_map = VisibilityMap::new();
        for (id, alone) in [(1, &alone_a), (2, &alone_b)] {
            if let Some(entry) = occlusion(&scene, alone, id) {
                occlusion_map.insert(id, entry);
            }
        }
        assert_eq!(occlusion_map[&1], VisibilityEntry::new(16, 16).unwrap());
        assert_eq!(occlusion_map[&1].ratio, 1.0);
        assert!(!occlusion_map.contains_key(&2));

        // B is seen by the enlarged field of view.
        let mut enlarged = DMatrix::from_element(8, 8, 0);
        enlarged[(3, 3)] = 2;
        enlarged[(0, 0)] = 2;
        let mut truncation_map = truncation(&enlarged, 2.0);
        reconcile(&mut truncation_map, &mut occlusion_map);
        assert_eq!(occlusion_map[&2], VisibilityEntry::neutral());
        assert_eq!(truncation_map[&1], VisibilityEntry::neutral());
        assert_eq!(truncation_map[&2].ratio, 0.5);
    }

    #[test]
    fn reconcile_with_one_empty_map() {
        let mut truncation = VisibilityMap::new();
        let mut occlusion = VisibilityMap::new();
        occlusion.insert(4, VisibilityEntry::new(1, 1).unwrap());
        reconcile(&mut truncation, &mut occlusion);
        assert_eq!(truncation.len(), 1);
        assert_eq!(truncation[&4], VisibilityEntry::neutral());
    }

    // PROPERTY TESTS ################################################

    fn gen_image(pixels: &[u8]) -> DMatrix<InstanceId> {
        let ncols = 7;
        let nrows = (pixels.len() / ncols).max(1);
        DMatrix::from_fn(nrows, ncols, |r, c| {
            pixels.get(r * ncols + c).map(|&p| InstanceId::from(p % 4)).unwrap_or(0)
        })
    }

    #[quickcheck_macros::quickcheck]
    fn boxes_contain_all_pixels_tightly(pixels: Vec<u8>) -> bool {
        let image = gen_image(&pixels);
        let boxes = bounding_boxes(&image);
        let mut ok = true;
        for (id, bbox) in &boxes {
            let pixels: Vec<(usize, usize)> = (0..image.nrows())
                .flat_map(|r| (0..image.ncols()).map(move |c| (r, c)))
                .filter(|&(r, c)| image[(r, c)] == *id)
                .collect();
            ok &= pixels.iter().all(|&(r, c)| bbox.contains(c, r));
            ok &= pixels.iter().map(|p| p.1).min() == Some(bbox.min_x);
            ok &= pixels.iter().map(|p| p.1).max() == Some(bbox.max_x);
            ok &= pixels.iter().map(|p| p.0).min() == Some(bbox.min_y);
            ok &= pixels.iter().map(|p| p.0).max() == Some(bbox.max_y);
        }
        ok && boxes.len() == instance_histogram(&image).len()
    }

    #[quickcheck_macros::quickcheck]
    fn truncation_ratio_in_unit_interval(pixels: Vec<u8>, s: u8) -> bool {
        let scale = 1.0 + Float::from(s) / 32.0;
        truncation(&gen_image(&pixels), scale)
            .values()
            .all(|e| e.ratio > 0.0 && e.ratio <= 1.0 && e.measured <= e.reference)
    }

    #[quickcheck_macros::quickcheck]
    fn reconciled_keys_are_equal(a: Vec<(u16, u8, u8)>, b: Vec<(u16, u8, u8)>) -> bool {
        let to_map = |v: Vec<(u16, u8, u8)>| -> VisibilityMap {
            v.into_iter()
                .filter_map(|(id, m, r)| {
                    VisibilityEntry::new(usize::from(m.min(r)), usize::from(r)).map(|e| (id, e))
                })
                .collect()
        };
        let (mut truncation, mut occlusion) = (to_map(a), to_map(b));
        reconcile(&mut truncation, &mut occlusion);
        truncation.keys().eq(occlusion.keys())
    }
}
