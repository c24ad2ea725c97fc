// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type shared by the whole crate.

use std::{io, path::PathBuf};

use crate::core::color::PackedRgb;

/// Result alias with the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while loading a scan, rendering it or writing results.
///
/// Every variant touching the file system carries the path of the file involved.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading or writing a file failed.
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Decoding or encoding an image failed.
    #[error("{}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    /// Encoding a 16 bits png failed.
    #[error("{}: {source}", .path.display())]
    Png {
        path: PathBuf,
        #[source]
        source: png::EncodingError,
    },
    /// Scene metadata is not valid json.
    #[error("{}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// A text or model file has an unexpected content.
    #[error("{}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    /// Two instances of a scan share the same render color.
    #[error("render color {0} is used by two instances")]
    DuplicateColor(PackedRgb),
    /// The same instance id is listed twice.
    #[error("instance {0} is listed twice")]
    DuplicateInstance(u16),
    /// Instance ids must be in `1..=u16::MAX`, 0 is the background.
    #[error("invalid instance id: {0:?}")]
    InvalidInstanceId(String),
    /// Off-screen buffers cannot be created with a zero width or height.
    #[error("cannot render into a {width}x{height} buffer")]
    EmptyViewport { width: usize, height: usize },
    /// Clipping planes or field of view scale cannot be used for rendering.
    #[error("invalid renderer configuration: {0}")]
    InvalidConfig(String),
    /// A model required by the requested outputs could not be loaded.
    #[error("model could not be loaded: {}", .0.display())]
    MissingModel(PathBuf),
    /// No camera pose exists for this frame.
    #[error("no camera pose for frame {0}")]
    FrameOutOfRange(usize),
    /// Label geometry or instance registry are not available for this scan.
    #[error("label geometry or instance colors are not loaded")]
    NotReady,
    /// An output was requested that the renderer was not initialized for.
    #[error("renderer was not initialized for {0}")]
    NotPrepared(&'static str),
}

impl Error {
    /// Wrap an io error with the path of the file involved.
    pub fn io<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a parsing error for a given file.
    pub fn parse<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use std::error::Error as _;

    #[test]
    fn file_errors_show_their_path_and_source() {
        let err = Error::io("scan/_info.txt", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.to_string(), "scan/_info.txt: gone");
        assert!(err.source().is_some());
        let err = Error::parse("scan/frame-000000.pose.txt", "expected 16 numbers");
        assert_eq!(err.to_string(), "scan/frame-000000.pose.txt: expected 16 numbers");
        assert!(err.source().is_none());
    }

    #[test]
    fn other_errors_are_readable() {
        let err = Error::DuplicateColor(PackedRgb::from_hex(0xaec7e8));
        assert_eq!(err.to_string(), "render color #aec7e8 is used by two instances");
        assert_eq!(Error::FrameOutOfRange(3).to_string(), "no camera pose for frame 3");
        assert_eq!(
            Error::EmptyViewport { width: 0, height: 4 }.to_string(),
            "cannot render into a 0x4 buffer"
        );
    }
}
