// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! 24 bits packed RGB colors, used as keys to identify instances in label renders.

use std::{fmt, str::FromStr};

use crate::misc::type_aliases::Rgb8;

/// A color packed as `0xRRGGBB`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct PackedRgb(u32);

impl PackedRgb {
    /// Pack three 8 bits channels.
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        PackedRgb((u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b))
    }

    /// Only the 24 lower bits are kept.
    pub fn from_hex(hex: u32) -> Self {
        PackedRgb(hex & 0x00ff_ffff)
    }

    pub fn hex(self) -> u32 {
        self.0
    }

    /// Unpack into `(r, g, b)`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn rgb(self) -> Rgb8 {
        (
            ((self.0 >> 16) & 0xff) as u8,
            ((self.0 >> 8) & 0xff) as u8,
            (self.0 & 0xff) as u8,
        )
    }
}

impl From<Rgb8> for PackedRgb {
    fn from((r, g, b): Rgb8) -> Self {
        PackedRgb::from_rgb(r, g, b)
    }
}

/// Written as `#rrggbb`, the format of the `ply_color` field in scene metadata.
impl fmt::Display for PackedRgb {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

/// Parse `#rrggbb` (the leading `#` is optional).
impl FromStr for PackedRgb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("expected 6 hexadecimal digits in {:?}", s));
        }
        u32::from_str_radix(digits, 16)
            .map(PackedRgb)
            .map_err(|e| format!("{:?}: {}", s, e))
    }
}

// TESTS #############################################################
