//! RGB to XYZ projection.

use dcpenc_core::ColourLut;

/// Row-major 3x3 matrix.
pub type Matrix3 = [[f64; 3]; 3];

/// Linear sRGB / Rec.709 primaries (D65) to CIE XYZ.
pub const REC709_TO_XYZ: Matrix3 = [
    [0.4124564, 0.3575761, 0.1804375],
    [0.2126729, 0.7151522, 0.0721750],
    [0.0193339, 0.1191920, 0.9503041],
];

/// Matrix for a colour profile. sRGB and Rec.709 share primaries.
#[inline]
pub fn rgb_to_xyz_matrix(lut: ColourLut) -> &'static Matrix3 {
    match lut {
        ColourLut::Srgb | ColourLut::Rec709 => &REC709_TO_XYZ,
    }
}

/// Multiplies one row by `rgb`, accumulating left to right.
#[inline]
pub fn dot(row: &[f64; 3], rgb: [f64; 3]) -> f64 {
    rgb[0] * row[0] + rgb[1] * row[1] + rgb[2] * row[2]
}
