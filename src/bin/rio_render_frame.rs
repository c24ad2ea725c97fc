// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{env, error::Error, path::PathBuf};

use rio_renderer::core::renderer::{Config, Outputs};
use rio_renderer::dataset::rio::{OutputDir, Scan, BOXES_IMAGE_SUFFIX};
use rio_renderer::misc::view;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    if let Err(error) = my_run(&args) {
        eprintln!("{}", error);
        std::process::exit(1);
    }
}

const USAGE: &str = "Usage: ./rio_render_frame data_path scan_id output_path frame_id";

const BOX_THICKNESS: usize = 3;

fn my_run(args: &[String]) -> Result<(), Box<dyn Error>> {
    // Check that the arguments are correct.
    let valid_args = check_args(args)?;

    // Render the requested frame with every output.
    let scan = Scan::new(&valid_args.data_path, &valid_args.scan_id);
    let output = OutputDir::new(&valid_args.output_path)?;
    let mut renderer = Config::default().init(&scan, output)?;
    let summary = renderer.render_frame(valid_args.frame_id, &Outputs::all())?;
    for (id, bbox) in &summary.bounding_boxes {
        log::info!(
            "{} ({}): {:?}",
            id,
            renderer.instance_label(*id).unwrap_or("unknown"),
            bbox
        );
    }

    // Draw the bounding boxes over the color image.
    if let Some(color) = renderer.color() {
        let boxes_image =
            view::bounding_boxes_on_image(color, &summary.bounding_boxes, renderer.registry(), BOX_THICKNESS);
        let path = renderer.sink().file(valid_args.frame_id, BOXES_IMAGE_SUFFIX);
        boxes_image.save(&path)?;
        log::info!("Bounding boxes drawn in {}", path.display());
    }
    Ok(())
}

struct Args {
    data_path: PathBuf,
    scan_id: String,
    output_path: PathBuf,
    frame_id: usize,
}

/// Verify that command line arguments are correct.
fn check_args(args: &[String]) -> Result<Args, String> {
    match args {
        [_, data, scan, output, frame] => {
            let frame_id = frame.parse::<usize>().map_err(|_| {
                eprintln!("{}", USAGE);
                format!("Invalid frame_id: {}", frame)
            })?;
            let data_path = PathBuf::from(data);
            if !data_path.is_dir() {
                eprintln!("{}", USAGE);
                return Err(format!("The data directory does not exist: {}", data_path.display()));
            }
            Ok(Args {
                data_path,
                scan_id: scan.clone(),
                output_path: PathBuf::from(output),
                frame_id,
            })
        }
        _ => {
            eprintln!("{}", USAGE);
            Err("Wrong number of arguments".to_string())
        }
    }
}
