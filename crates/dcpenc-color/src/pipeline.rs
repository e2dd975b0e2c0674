//! RGB24 to 12-bit DCI X'Y'Z'.
//!
//! Per pixel:
//!
//! 1. each 8-bit channel is expanded through the profile's input gamma table
//!    at index `byte << 4`
//! 2. the linear triple is projected with [`rgb_to_xyz_matrix`]
//! 3. each component is scaled by `48 / 52.37` (DCI companding) and by 4095
//! 4. the value is truncated toward zero, clamped to `0..=4095` and looked up
//!    in the DCI output gamma table

use dcpenc_core::{ColourLut, Error, Image, PixelFormat, Result, Size};
use tracing::trace;

use crate::lut::{input_tables, output_table, LUT_MAX};
use crate::matrix::{dot, rgb_to_xyz_matrix};

/// Peak white luminance of the DCI reference projector, cd/m^2.
pub const DCI_PEAK_LUMINANCE: f64 = 48.0;

/// Normalising luminance of the DCI X'Y'Z' encoding, cd/m^2.
pub const DCI_NORMALISING_LUMINANCE: f64 = 52.37;

/// DCI companding coefficient.
pub const DCI_COEFFICIENT: f64 = DCI_PEAK_LUMINANCE / DCI_NORMALISING_LUMINANCE;

/// Companded, truncated 12-bit XYZ indices for one pixel, before output gamma.
pub fn xyz_indices(rgb: [u8; 3], lut: ColourLut) -> [usize; 3] {
    let table = input_tables().get(lut);
    let linear = rgb.map(|c| table[(c as usize) << 4]);
    rgb_to_xyz_matrix(lut).map(|row| {
        let d = dot(&row, linear) * DCI_COEFFICIENT * LUT_MAX as f64;
        // Truncation toward zero; negative values clamp to black
        (d as i64).clamp(0, LUT_MAX as i64) as usize
    })
}

/// Converts one RGB pixel to 12-bit X'Y'Z'.
///
/// # Example
///
/// ```rust
/// use dcpenc_color::rgb_to_xyz;
/// use dcpenc_core::ColourLut;
///
/// assert_eq!(rgb_to_xyz([0, 0, 0], ColourLut::Srgb), [0, 0, 0]);
/// assert_eq!(rgb_to_xyz([255, 255, 255], ColourLut::Srgb), [3871, 3947, 4078]);
/// ```
#[inline]
pub fn rgb_to_xyz(rgb: [u8; 3], lut: ColourLut) -> [i32; 3] {
    let out = output_table();
    xyz_indices(rgb, lut).map(|i| out[i] as i32)
}

/// Three 12-bit component planes, tightly packed, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XyzFrame {
    size: Size,
    components: [Vec<i32>; 3],
}

impl XyzFrame {
    /// Frame size.
    #[inline]
    pub fn size(&self) -> Size {
        self.size
    }

    /// Component `c` (0 = X, 1 = Y, 2 = Z).
    #[inline]
    pub fn component(&self, c: usize) -> &[i32] {
        &self.components[c]
    }

    /// All three components.
    #[inline]
    pub fn components(&self) -> &[Vec<i32>; 3] {
        &self.components
    }

    /// X'Y'Z' triple at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [i32; 3] {
        let i = y as usize * self.size.width as usize + x as usize;
        [self.components[0][i], self.components[1][i], self.components[2][i]]
    }
}

/// Converts a whole RGB24 image.
pub fn convert_frame(image: &Image, lut: ColourLut) -> Result<XyzFrame> {
    if image.pixel_format() != PixelFormat::Rgb24 {
        return Err(Error::invalid_parameter(format!(
            "colour conversion needs rgb24 input, got {}",
            image.pixel_format()
        )));
    }
    let size = image.size();
    let w = size.width as usize;
    trace!(size = %size, lut = %lut, "converting frame to XYZ");

    let mut components: [Vec<i32>; 3] = Default::default();
    for c in components.iter_mut() {
        c.reserve_exact(size.area());
    }

    let plane = image.plane(0);
    for y in 0..size.height as usize {
        for px in plane.line(y)[..w * 3].chunks_exact(3) {
            let xyz = rgb_to_xyz([px[0], px[1], px[2]], lut);
            for (c, v) in components.iter_mut().zip(xyz) {
                c.push(v);
            }
        }
    }

    Ok(XyzFrame { size, components })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_black() {
        for lut in ColourLut::ALL {
            assert_eq!(xyz_indices([0, 0, 0], lut), [0, 0, 0]);
            assert_eq!(rgb_to_xyz([0, 0, 0], lut), [0, 0, 0]);
        }
    }

    #[test]
    fn test_white() {
        assert_eq!(xyz_indices([255, 255, 255], ColourLut::Srgb), [3537, 3722, 4052]);
        assert_eq!(rgb_to_xyz([255, 255, 255], ColourLut::Srgb), [3871, 3947, 4078]);
        assert_eq!(xyz_indices([255, 255, 255], ColourLut::Rec709), [3541, 3725, 4056]);
        assert_eq!(rgb_to_xyz([255, 255, 255], ColourLut::Rec709), [3872, 3949, 4080]);
    }

    #[test]
    fn test_golden_pixels() {
        let cases = [
            ([128, 64, 200], ColourLut::Srgb, [787, 462, 2081], [2172, 1769, 3156]),
            ([128, 64, 200], ColourLut::Rec709, [920, 582, 2232], [2306, 1934, 3243]),
            ([255, 0, 0], ColourLut::Srgb, [1535, 791, 71], [2808, 2176, 861]),
            ([255, 0, 0], ColourLut::Rec709, [1536, 792, 72], [2808, 2177, 866]),
            ([16, 235, 128], ColourLut::Srgb, [1258, 2273, 1132], [2601, 3265, 2497]),
            ([16, 235, 128], ColourLut::Rec709, [1327, 2341, 1304], [2655, 3303, 2637]),
        ];
        for (rgb, lut, indices, xyz) in cases {
            assert_eq!(xyz_indices(rgb, lut), indices, "{rgb:?} {lut}");
            assert_eq!(rgb_to_xyz(rgb, lut), xyz, "{rgb:?} {lut}");
        }
    }

    #[test]
    fn test_deterministic() {
        let a = rgb_to_xyz([17, 99, 201], ColourLut::Rec709);
        for _ in 0..4 {
            assert_eq!(rgb_to_xyz([17, 99, 201], ColourLut::Rec709), a);
        }
    }

    #[test]
    fn test_convert_frame() {
        let img = Image::solid_rgb(Size::new(4, 3), [128, 64, 200]).unwrap();
        let xyz = convert_frame(&img, ColourLut::Srgb).unwrap();
        assert_eq!(xyz.size(), Size::new(4, 3));
        assert_eq!(xyz.component(1).len(), 12);
        assert_eq!(xyz.pixel(3, 2), [2172, 1769, 3156]);
    }

    #[test]
    fn test_convert_frame_padded_stride() {
        let mut data = vec![0u8; 2 * 8];
        data[..3].copy_from_slice(&[255, 255, 255]);
        data[3..6].copy_from_slice(&[255, 0, 0]);
        data[6..8].copy_from_slice(&[99, 99]);
        let img = Image::from_planes(PixelFormat::Rgb24, Size::new(2, 2), vec![(8, data)]).unwrap();
        let xyz = convert_frame(&img, ColourLut::Srgb).unwrap();
        assert_eq!(xyz.pixel(0, 0), [3871, 3947, 4078]);
        assert_eq!(xyz.pixel(1, 0), [2808, 2176, 861]);
        assert_eq!(xyz.pixel(0, 1), [0, 0, 0]);
    }

    #[test]
    fn test_rejects_yuv() {
        let img = Image::new(PixelFormat::Yuv420p, Size::new(2, 2)).unwrap();
        assert!(convert_frame(&img, ColourLut::Srgb).unwrap_err().is_invalid_parameter());
    }
}
