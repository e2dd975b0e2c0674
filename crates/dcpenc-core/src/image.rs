//! Decoded frame buffers.
//!
//! An [`Image`] is a set of planes, each a contiguous byte buffer with an
//! explicit stride (`line_size`) and line count. Packed formats have one
//! plane; planar YUV formats have three, with chroma planes subsampled as
//! the [`PixelFormat`] dictates.
//!
//! The byte layout is exactly what goes on the wire for a remote encode:
//! plane `i` contributes `line_size(i) * lines(i)` bytes.
//!
//! # Example
//!
//! ```rust
//! use dcpenc_core::{Image, PixelFormat, Size};
//!
//! let img = Image::new(PixelFormat::Yuv420p, Size::new(64, 32)).unwrap();
//! assert_eq!(img.components(), 3);
//! assert_eq!(img.lines(0), 32);
//! assert_eq!(img.lines(1), 16);
//! assert_eq!(img.line_size(1), 32);
//! ```

use std::fmt;

use tracing::trace;

use crate::scaler::{self, Scaler};
use crate::{Error, Result};

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Size {
    /// Creates a new size.
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels.
    #[inline]
    pub const fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Returns `true` if either dimension is zero.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel layouts accepted as encoder input.
///
/// Discriminants follow the FFmpeg `AVPixelFormat` numbering, which is
/// what the remote encode protocol carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Planar Y'CbCr 4:2:0, 8 bits per sample.
    Yuv420p,
    /// Packed RGB, 8 bits per channel.
    Rgb24,
    /// Packed BGR, 8 bits per channel.
    Bgr24,
    /// Planar Y'CbCr 4:2:2, 8 bits per sample.
    Yuv422p,
    /// Planar Y'CbCr 4:4:4, 8 bits per sample.
    Yuv444p,
}

impl PixelFormat {
    /// FFmpeg pixel format number.
    pub const fn ffmpeg_id(self) -> i32 {
        match self {
            Self::Yuv420p => 0,
            Self::Rgb24 => 2,
            Self::Bgr24 => 3,
            Self::Yuv422p => 4,
            Self::Yuv444p => 5,
        }
    }

    /// Looks up a format by FFmpeg pixel format number.
    pub fn from_ffmpeg_id(id: i32) -> Result<Self> {
        match id {
            0 => Ok(Self::Yuv420p),
            2 => Ok(Self::Rgb24),
            3 => Ok(Self::Bgr24),
            4 => Ok(Self::Yuv422p),
            5 => Ok(Self::Yuv444p),
            other => Err(Error::invalid_parameter(format!(
                "unsupported pixel format {other}"
            ))),
        }
    }

    /// Number of planes.
    pub const fn planes(self) -> usize {
        match self {
            Self::Rgb24 | Self::Bgr24 => 1,
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p => 3,
        }
    }

    /// Bytes per pixel within a plane.
    pub const fn bytes_per_pixel(self, _plane: usize) -> usize {
        match self {
            Self::Rgb24 | Self::Bgr24 => 3,
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p => 1,
        }
    }

    /// Horizontal and vertical subsampling shift of a plane.
    pub const fn subsampling(self, plane: usize) -> (u32, u32) {
        if plane == 0 {
            return (0, 0);
        }
        match self {
            Self::Yuv420p => (1, 1),
            Self::Yuv422p => (1, 0),
            _ => (0, 0),
        }
    }

    /// Returns `true` for Y'CbCr formats.
    pub const fn is_yuv(self) -> bool {
        matches!(self, Self::Yuv420p | Self::Yuv422p | Self::Yuv444p)
    }

    /// Pixel width of a plane for an image of `size`.
    pub const fn plane_width(self, plane: usize, size: Size) -> usize {
        let (xs, _) = self.subsampling(plane);
        (size.width as usize).div_ceil(1 << xs)
    }

    /// Number of lines in a plane for an image of `size`.
    pub const fn plane_lines(self, plane: usize, size: Size) -> usize {
        let (_, ys) = self.subsampling(plane);
        (size.height as usize).div_ceil(1 << ys)
    }

    /// Minimum stride of a plane, in bytes.
    pub const fn min_line_size(self, plane: usize, size: Size) -> usize {
        self.plane_width(plane, size) * self.bytes_per_pixel(plane)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Yuv420p => "yuv420p",
            Self::Rgb24 => "rgb24",
            Self::Bgr24 => "bgr24",
            Self::Yuv422p => "yuv422p",
            Self::Yuv444p => "yuv444p",
        };
        f.write_str(name)
    }
}

/// One plane of pixel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    data: Vec<u8>,
    line_size: usize,
    lines: usize,
}

impl Plane {
    /// Raw bytes, `line_size * lines` long.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Stride in bytes.
    #[inline]
    pub fn line_size(&self) -> usize {
        self.line_size
    }

    /// Number of lines.
    #[inline]
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// One line, including any stride padding.
    #[inline]
    pub fn line(&self, y: usize) -> &[u8] {
        &self.data[y * self.line_size..(y + 1) * self.line_size]
    }

    /// One line, mutable.
    #[inline]
    pub fn line_mut(&mut self, y: usize) -> &mut [u8] {
        &mut self.data[y * self.line_size..(y + 1) * self.line_size]
    }
}

/// A decoded frame: size, pixel format and planes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    size: Size,
    format: PixelFormat,
    planes: Vec<Plane>,
}

impl Image {
    /// Allocates a zeroed image with tightly packed lines.
    pub fn new(format: PixelFormat, size: Size) -> Result<Self> {
        check_size(size)?;
        let planes = (0..format.planes())
            .map(|i| {
                let line_size = format.min_line_size(i, size);
                let lines = format.plane_lines(i, size);
                Plane {
                    data: vec![0; line_size * lines],
                    line_size,
                    lines,
                }
            })
            .collect();
        Ok(Self {
            size,
            format,
            planes,
        })
    }

    /// Builds an image from `(line_size, bytes)` pairs, one per plane.
    ///
    /// Each plane must be exactly `line_size * lines` bytes and its stride
    /// must hold at least one full row of pixels.
    pub fn from_planes(
        format: PixelFormat,
        size: Size,
        planes: Vec<(usize, Vec<u8>)>,
    ) -> Result<Self> {
        check_size(size)?;
        if planes.len() != format.planes() {
            return Err(Error::invalid_parameter(format!(
                "{format} needs {} planes, got {}",
                format.planes(),
                planes.len()
            )));
        }

        let planes = planes
            .into_iter()
            .enumerate()
            .map(|(i, (line_size, data))| {
                let min = format.min_line_size(i, size);
                let lines = format.plane_lines(i, size);
                if line_size < min {
                    return Err(Error::invalid_parameter(format!(
                        "plane {i}: line size {line_size} is less than minimum {min}"
                    )));
                }
                if data.len() != line_size * lines {
                    return Err(Error::invalid_parameter(format!(
                        "plane {i}: expected {} bytes, got {}",
                        line_size * lines,
                        data.len()
                    )));
                }
                Ok(Plane {
                    data,
                    line_size,
                    lines,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            size,
            format,
            planes,
        })
    }

    /// Wraps tightly packed RGB24 bytes.
    pub fn from_rgb24(size: Size, data: Vec<u8>) -> Result<Self> {
        let line_size = size.width as usize * 3;
        Self::from_planes(PixelFormat::Rgb24, size, vec![(line_size, data)])
    }

    /// Creates an RGB24 image filled with one colour.
    pub fn solid_rgb(size: Size, rgb: [u8; 3]) -> Result<Self> {
        let data = rgb.repeat(size.area());
        Self::from_rgb24(size, data)
    }

    /// Image size in pixels.
    #[inline]
    pub fn size(&self) -> Size {
        self.size
    }

    /// Pixel format.
    #[inline]
    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    /// Number of planes.
    #[inline]
    pub fn components(&self) -> usize {
        self.planes.len()
    }

    /// Stride of plane `i` in bytes.
    #[inline]
    pub fn line_size(&self, i: usize) -> usize {
        self.planes[i].line_size
    }

    /// Line count of plane `i`.
    #[inline]
    pub fn lines(&self, i: usize) -> usize {
        self.planes[i].lines
    }

    /// Plane `i`.
    #[inline]
    pub fn plane(&self, i: usize) -> &Plane {
        &self.planes[i]
    }

    /// Plane `i`, mutable.
    #[inline]
    pub fn plane_mut(&mut self, i: usize) -> &mut Plane {
        &mut self.planes[i]
    }

    /// All planes in order.
    #[inline]
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Converts to interleaved RGB `f32` in `[0, 255]`, stride padding dropped.
    pub fn to_rgb_f32(&self) -> Vec<f32> {
        let w = self.size.width as usize;
        let h = self.size.height as usize;
        let mut out = Vec::with_capacity(w * h * 3);

        match self.format {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => {
                let swap = self.format == PixelFormat::Bgr24;
                let plane = &self.planes[0];
                for y in 0..h {
                    for px in plane.line(y)[..w * 3].chunks_exact(3) {
                        let (r, b) = if swap { (px[2], px[0]) } else { (px[0], px[2]) };
                        out.extend_from_slice(&[r as f32, px[1] as f32, b as f32]);
                    }
                }
            }
            PixelFormat::Yuv420p | PixelFormat::Yuv422p | PixelFormat::Yuv444p => {
                let (xs, ys) = self.format.subsampling(1);
                for y in 0..h {
                    let luma = self.planes[0].line(y);
                    let cb = self.planes[1].line(y >> ys);
                    let cr = self.planes[2].line(y >> ys);
                    for x in 0..w {
                        out.extend_from_slice(&yuv_to_rgb(luma[x], cb[x >> xs], cr[x >> xs]));
                    }
                }
            }
        }

        out
    }

    /// Scales into `out` (which includes `padding` black columns on each
    /// side) and converts to packed RGB24.
    ///
    /// The picture is resampled to `out.width - 2 * padding` by `out.height`.
    /// When no resampling is needed and the source is already RGB24 the
    /// bytes are copied unchanged.
    pub fn scale_and_convert_to_rgb(&self, out: Size, padding: u32, scaler: Scaler) -> Result<Image> {
        check_size(out)?;
        let inner_w = out
            .width
            .checked_sub(padding.saturating_mul(2))
            .filter(|w| *w > 0)
            .ok_or_else(|| {
                Error::invalid_parameter(format!(
                    "padding {padding} leaves no picture in output width {}",
                    out.width
                ))
            })?;
        let inner = Size::new(inner_w, out.height);
        trace!(from = %self.size, to = %inner, padding, scaler = scaler.id(), "scale_and_convert_to_rgb");

        let mut result = Image::new(PixelFormat::Rgb24, out)?;
        let row_offset = padding as usize * 3;
        let row_len = inner_w as usize * 3;

        if inner == self.size && self.format == PixelFormat::Rgb24 {
            for y in 0..out.height as usize {
                let src = &self.planes[0].line(y)[..row_len];
                result.planes[0].line_mut(y)[row_offset..row_offset + row_len].copy_from_slice(src);
            }
            return Ok(result);
        }

        let rgb = self.to_rgb_f32();
        let scaled = if inner == self.size {
            rgb
        } else {
            scaler::resample(
                &rgb,
                self.size.width as usize,
                self.size.height as usize,
                3,
                inner.width as usize,
                inner.height as usize,
                scaler,
            )?
        };

        for y in 0..out.height as usize {
            let src = &scaled[y * row_len..(y + 1) * row_len];
            let dst = &mut result.planes[0].line_mut(y)[row_offset..row_offset + row_len];
            for (d, s) in dst.iter_mut().zip(src) {
                *d = quantize(*s);
            }
        }

        Ok(result)
    }
}

fn check_size(size: Size) -> Result<()> {
    if size.is_empty() {
        return Err(Error::invalid_parameter(format!("image size {size} is empty")));
    }
    Ok(())
}

#[inline]
fn quantize(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// BT.601 limited-range Y'CbCr to R'G'B' in `[0, 255]`.
#[inline]
fn yuv_to_rgb(y: u8, cb: u8, cr: u8) -> [f32; 3] {
    let y = 1.164 * (y as f32 - 16.0);
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;
    [
        (y + 1.596 * cr).clamp(0.0, 255.0),
        (y - 0.392 * cb - 0.813 * cr).clamp(0.0, 255.0),
        (y + 2.017 * cb).clamp(0.0, 255.0),
    ]
}
