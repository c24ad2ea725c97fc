// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{env, error::Error, path::PathBuf};

use rio_renderer::core::renderer::{Config, Outputs};
use rio_renderer::dataset::rio::{OutputDir, Scan};
use rio_renderer::misc::type_aliases::Float;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    if let Err(error) = my_run(&args) {
        eprintln!("{}", error);
        std::process::exit(1);
    }
}

const USAGE: &str = "Usage: ./rio_render data_path scan_id output_path [only_visibility fov_scale]";

fn my_run(args: &[String]) -> Result<(), Box<dyn Error>> {
    // Check that the arguments are correct.
    let valid_args = check_args(args)?;

    // Setup rendering configuration.
    let outputs = if valid_args.only_visibility {
        Outputs::visibility_only()
    } else {
        Outputs::all()
    };
    let config = Config {
        fov_scale: valid_args.fov_scale,
        outputs,
        ..Config::default()
    };

    // Load the scan and render every frame of its sequence.
    let scan = Scan::new(&valid_args.data_path, &valid_args.scan_id);
    let output = OutputDir::new(&valid_args.output_path)?;
    let mut renderer = config.init(&scan, output)?;
    let nb_frames = renderer.render_all_frames()?;
    log::info!(
        "Rendered {} frames of {} into {}",
        nb_frames,
        valid_args.scan_id,
        valid_args.output_path.display()
    );
    Ok(())
}

struct Args {
    data_path: PathBuf,
    scan_id: String,
    output_path: PathBuf,
    only_visibility: bool,
    fov_scale: Float,
}

/// Verify that command line arguments are correct.
fn check_args(args: &[String]) -> Result<Args, String> {
    let (data_path, scan_id, output_path, only_visibility, fov_scale) = match args {
        [_, data, scan, output] => (data, scan, output, false, 2.0),
        [_, data, scan, output, only, scale] => {
            let only_visibility = only.parse::<u8>().map(|x| x != 0).map_err(|_| {
                eprintln!("{}", USAGE);
                format!("only_visibility must be 0 or 1, got {}", only)
            })?;
            let fov_scale = scale.parse::<Float>().map_err(|_| {
                eprintln!("{}", USAGE);
                format!("Invalid fov_scale: {}", scale)
            })?;
            (data, scan, output, only_visibility, fov_scale)
        }
        _ => {
            eprintln!("{}", USAGE);
            return Err("Wrong number of arguments".to_string());
        }
    };
    if !(1.0..Float::INFINITY).contains(&fov_scale) {
        return Err(format!("fov_scale must be at least 1, got {}", fov_scale));
    }
    let data_path = PathBuf::from(data_path);
    if !data_path.is_dir() {
        eprintln!("{}", USAGE);
        return Err(format!("The data directory does not exist: {}", data_path.display()));
    }
    Ok(Args {
        data_path,
        scan_id: scan_id.clone(),
        output_path: PathBuf::from(output_path),
        only_visibility,
        fov_scale,
    })
}

// TESTS #############################################################
