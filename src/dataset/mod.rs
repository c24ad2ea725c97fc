// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Loading scans and models from disk, and writing rendered frames.

pub mod obj;
pub mod ply;
pub mod rio;
