//! Colour-response profile selection.

use std::fmt;

use crate::{Error, Result};

/// Input colour profile applied before the RGB to XYZ projection.
///
/// The numeric index is what configuration files and the remote encode
/// protocol carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColourLut {
    /// IEC 61966-2-1 sRGB.
    #[default]
    Srgb,
    /// ITU-R BT.709.
    Rec709,
}

impl ColourLut {
    /// Number of profiles.
    pub const COUNT: usize = 2;

    /// All profiles, indexed by [`ColourLut::index`].
    pub const ALL: [ColourLut; Self::COUNT] = [ColourLut::Srgb, ColourLut::Rec709];

    /// Table index.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::Srgb => 0,
            Self::Rec709 => 1,
        }
    }

    /// Looks a profile up by table index.
    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or_else(|| Error::invalid_parameter(format!("unknown colour LUT index {index}")))
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Srgb => "sRGB",
            Self::Rec709 => "Rec. 709",
        }
    }
}

impl fmt::Display for ColourLut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
