// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Offline rendering of labeled 3D scans.
//!
//! For every posed frame of a scan, the label model is rasterized
//! to get per instance bounding boxes, truncation and occlusion ratios.

pub mod core;
pub mod dataset;
pub mod math;
pub mod misc;
