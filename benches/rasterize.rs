// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rio_renderer::core::camera::Intrinsics;
use rio_renderer::core::color::PackedRgb;
use rio_renderer::core::mesh::{Batch, Model};
use rio_renderer::core::raster::{Orientation, Rasterizer};
use rio_renderer::core::registry::{Instance, Registry};
use rio_renderer::core::visibility;
use rio_renderer::math::projection;
use rio_renderer::misc::type_aliases::{Float, Mat4, Point3};

/// Grid of small quads at increasing depth, one instance per row.
fn grid(nb_rows: u16, nb_cols: u16) -> (Model, Registry) {
    let mut positions = Vec::new();
    let mut colors = Vec::new();
    let mut triangles = Vec::new();
    let mut instances = Vec::new();
    for row in 0..nb_rows {
        let color = PackedRgb::from_rgb(10 + row as u8, 0, 100);
        instances.push(Instance {
            id: row + 1,
            label: format!("row {}", row),
            color,
        });
        for col in 0..nb_cols {
            let x = Float::from(col) * 0.1 - 1.6;
            let y = Float::from(row) * 0.1 - 1.2;
            let z = 2.0 + Float::from(row + col) * 0.01;
            let first = positions.len() as u32;
            positions.extend_from_slice(&[
                Point3::new(x, y, z),
                Point3::new(x + 0.12, y, z),
                Point3::new(x + 0.12, y + 0.12, z),
                Point3::new(x, y + 0.12, z),
            ]);
            colors.extend_from_slice(&[color.rgb(); 4]);
            triangles.push([first, first + 1, first + 2]);
            triangles.push([first, first + 2, first + 3]);
        }
    }
    let batch = Batch::new(positions, triangles).with_colors(colors);
    let registry = Registry::new(instances).expect("distinct colors");
    (Model::new(vec![batch]), registry)
}

fn criterion_benchmark(c: &mut Criterion) {
    let intrinsics = Intrinsics {
        principal_point: (480.0, 270.0),
        focal: (756.0, 756.0),
        width: 960,
        height: 540,
    };
    let (model, registry) = grid(24, 32);
    let view = projection::view_from_pose(&Mat4::identity());
    let projection = intrinsics.projection(0.1, 10.0);
    let mut raster = Rasterizer::new(intrinsics.width, intrinsics.height)
        .expect("valid size")
        .with_orientation(Orientation::RotatedClockwise);

    c.bench_function("Label pass and bounding boxes", |b| {
        b.iter(|| {
            let labels = raster
                .render_labels(black_box(&model), &registry, &view, &projection)
                .expect("labels");
            visibility::bounding_boxes(&labels.instances)
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
