//! Resampling filters used to fit source frames to the DCP container.
//!
//! Each [`Scaler`] has a stable string id which is what the remote encode
//! protocol carries, so the server resamples with the same kernel the
//! client asked for.
//!
//! # Filters
//!
//! | Id | Kernel | Support |
//! |----|--------|---------|
//! | `point` | nearest neighbour | 0.5 |
//! | `area` | box | 0.5 |
//! | `bilinear` | triangle | 1 |
//! | `fastbicubic` | Catmull-Rom | 2 |
//! | `bicubic` | Mitchell-Netravali | 2 |
//! | `lanczos` | Lanczos-3 | 3 |

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Resampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scaler {
    /// Nearest neighbour.
    Point,
    /// Box average; good for large downscales.
    Area,
    /// Triangle filter.
    Bilinear,
    /// Catmull-Rom cubic (sharper, may ring).
    FastBicubic,
    /// Mitchell-Netravali cubic.
    #[default]
    Bicubic,
    /// Lanczos with three lobes.
    Lanczos,
}

impl Scaler {
    /// All scalers, in id order.
    pub const ALL: [Scaler; 6] = [
        Scaler::Point,
        Scaler::Area,
        Scaler::Bilinear,
        Scaler::FastBicubic,
        Scaler::Bicubic,
        Scaler::Lanczos,
    ];

    /// Wire id.
    pub const fn id(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Area => "area",
            Self::Bilinear => "bilinear",
            Self::FastBicubic => "fastbicubic",
            Self::Bicubic => "bicubic",
            Self::Lanczos => "lanczos",
        }
    }

    /// Looks a scaler up by wire id.
    pub fn from_id(id: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.id() == id)
            .ok_or_else(|| Error::invalid_parameter(format!("unknown scaler '{id}'")))
    }

    /// Kernel support radius.
    #[inline]
    pub fn support(self) -> f32 {
        match self {
            Self::Point | Self::Area => 0.5,
            Self::Bilinear => 1.0,
            Self::FastBicubic | Self::Bicubic => 2.0,
            Self::Lanczos => 3.0,
        }
    }

    /// Kernel weight at distance `x`.
    #[inline]
    pub fn weight(self, x: f32) -> f32 {
        let ax = x.abs();
        match self {
            Self::Point => {
                if ax < 0.5 { 1.0 } else { 0.0 }
            }
            Self::Area => {
                if ax <= 0.5 { 1.0 } else { 0.0 }
            }
            Self::Bilinear => (1.0 - ax).max(0.0),
            Self::FastBicubic => BcSpline::new(0.0, 0.5).at(ax),
            Self::Bicubic => BcSpline::new(1.0 / 3.0, 1.0 / 3.0).at(ax),
            Self::Lanczos => lanczos(ax, 3.0),
        }
    }
}

impl fmt::Display for Scaler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Scaler {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_id(s)
    }
}

/// Piecewise cubic in `|x|` from the BC-spline family.
///
/// Coefficients are lowest order first; `near` covers `[0, 1)` and `far`
/// covers `[1, 2)`. B = 0, C = 0.5 is Catmull-Rom; B = C = 1/3 is
/// Mitchell-Netravali.
struct BcSpline {
    near: [f32; 4],
    far: [f32; 4],
}

impl BcSpline {
    fn new(b: f32, c: f32) -> Self {
        Self {
            near: [
                (6.0 - 2.0 * b) / 6.0,
                0.0,
                (12.0 * b + 6.0 * c - 18.0) / 6.0,
                (12.0 - 9.0 * b - 6.0 * c) / 6.0,
            ],
            far: [
                (8.0 * b + 24.0 * c) / 6.0,
                -(12.0 * b + 48.0 * c) / 6.0,
                (6.0 * b + 30.0 * c) / 6.0,
                -(b + 6.0 * c) / 6.0,
            ],
        }
    }

    fn at(&self, ax: f32) -> f32 {
        let segment = match ax {
            t if t < 1.0 => &self.near,
            t if t < 2.0 => &self.far,
            _ => return 0.0,
        };
        segment.iter().rev().fold(0.0, |acc, k| acc * ax + k)
    }
}

/// Normalized sinc, `sin(pi x) / (pi x)`.
#[inline]
fn sinc(x: f32) -> f32 {
    if x.abs() < 1e-8 {
        return 1.0;
    }
    let t = std::f32::consts::PI * x;
    t.sin() / t
}

/// Sinc windowed by a sinc stretched over `lobes`.
#[inline]
fn lanczos(ax: f32, lobes: f32) -> f32 {
    if ax < lobes { sinc(ax) * sinc(ax / lobes) } else { 0.0 }
}

/// Contributions of source samples to one destination sample.
struct Contribution {
    first: usize,
    weights: Vec<f32>,
}

/// Precomputes normalized filter taps for one axis.
fn contributions(src_len: usize, dst_len: usize, scaler: Scaler) -> Vec<Contribution> {
    let scale = src_len as f32 / dst_len as f32;
    let stretch = scale.max(1.0);
    let support = scaler.support() * stretch;

    (0..dst_len)
        .map(|d| {
            let center = (d as f32 + 0.5) * scale - 0.5;
            let first = ((center - support).floor() as isize).max(0) as usize;
            let last = ((center + support).ceil() as isize).clamp(0, src_len as isize - 1) as usize;
            let first = first.min(last);

            let mut weights: Vec<f32> = (first..=last)
                .map(|s| scaler.weight((s as f32 - center) / stretch))
                .collect();
            let sum: f32 = weights.iter().sum();
            if sum > 0.0 {
                weights.iter_mut().for_each(|w| *w /= sum);
            } else {
                // Kernel fell between samples; take the nearest one.
                let nearest = center.round().clamp(0.0, (src_len - 1) as f32) as usize;
                return Contribution {
                    first: nearest,
                    weights: vec![1.0],
                };
            }
            Contribution { first, weights }
        })
        .collect()
}

/// Separable two-pass resample of interleaved `f32` samples.
///
/// # Example
///
/// ```rust
/// use dcpenc_core::scaler::{resample, Scaler};
///
/// let src = vec![0.5f32; 16 * 16 * 3];
/// let dst = resample(&src, 16, 16, 3, 32, 8, Scaler::Bilinear).unwrap();
/// assert_eq!(dst.len(), 32 * 8 * 3);
/// ```
pub fn resample(
    src: &[f32],
    src_w: usize,
    src_h: usize,
    channels: usize,
    dst_w: usize,
    dst_h: usize,
    scaler: Scaler,
) -> Result<Vec<f32>> {
    let expected = src_w * src_h * channels;
    if src.len() != expected || expected == 0 {
        return Err(Error::invalid_parameter(format!(
            "resample: expected {expected} samples, got {}",
            src.len()
        )));
    }
    if dst_w == 0 || dst_h == 0 {
        return Err(Error::invalid_parameter("resample: destination size must be > 0"));
    }

    // Horizontal pass
    let taps = contributions(src_w, dst_w, scaler);
    let mut temp = vec![0.0f32; dst_w * src_h * channels];
    for y in 0..src_h {
        let row = &src[y * src_w * channels..(y + 1) * src_w * channels];
        for (x, tap) in taps.iter().enumerate() {
            let out = &mut temp[(y * dst_w + x) * channels..(y * dst_w + x + 1) * channels];
            for (k, w) in tap.weights.iter().enumerate() {
                let s = &row[(tap.first + k) * channels..(tap.first + k + 1) * channels];
                for c in 0..channels {
                    out[c] += s[c] * w;
                }
            }
        }
    }

    // Vertical pass
    let taps = contributions(src_h, dst_h, scaler);
    let row_len = dst_w * channels;
    let mut dst = vec![0.0f32; row_len * dst_h];
    for (y, tap) in taps.iter().enumerate() {
        let out = &mut dst[y * row_len..(y + 1) * row_len];
        for (k, w) in tap.weights.iter().enumerate() {
            let sy = tap.first + k;
            let s = &temp[sy * row_len..(sy + 1) * row_len];
            for (o, v) in out.iter_mut().zip(s) {
                *o += v * w;
            }
        }
    }

    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ids_roundtrip() {
        for s in Scaler::ALL {
            assert_eq!(Scaler::from_id(s.id()).unwrap(), s);
        }
        assert!(Scaler::from_id("gauss").is_err());
    }

    #[test]
    fn test_weights_at_center() {
        for s in Scaler::ALL {
            assert!(s.weight(0.0) > 0.0, "{s}");
        }
        assert_relative_eq!(Scaler::Bilinear.weight(0.5), 0.5);
        assert_relative_eq!(Scaler::FastBicubic.weight(1.0), 0.0);
        assert_eq!(Scaler::Lanczos.weight(3.5), 0.0);
    }

    #[test]
    fn test_cubic_kernels() {
        // Catmull-Rom interpolates; Mitchell-Netravali does not.
        assert_relative_eq!(Scaler::FastBicubic.weight(0.0), 1.0);
        assert_relative_eq!(Scaler::FastBicubic.weight(0.5), 0.5625);
        assert_relative_eq!(Scaler::FastBicubic.weight(-1.5), -0.0625);
        assert_relative_eq!(Scaler::Bicubic.weight(0.0), 8.0 / 9.0, epsilon = 1e-6);
        assert_relative_eq!(Scaler::Bicubic.weight(1.0), 1.0 / 18.0, epsilon = 1e-6);
        assert_eq!(Scaler::Bicubic.weight(2.0), 0.0);
        for s in [Scaler::FastBicubic, Scaler::Bicubic] {
            assert_relative_eq!(s.weight(0.999_99), s.weight(1.0), epsilon = 1e-4);
        }
        assert_relative_eq!(Scaler::Lanczos.weight(1.0), 0.0, epsilon = 1e-6);
        assert_relative_eq!(Scaler::Lanczos.weight(0.5), 0.607_927, epsilon = 1e-5);
    }

    #[test]
    fn test_constant_preserved() {
        let src = vec![0.25f32; 9 * 7 * 3];
        for s in Scaler::ALL {
            let dst = resample(&src, 9, 7, 3, 20, 3, s).unwrap();
            for v in dst {
                assert_relative_eq!(v, 0.25, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_point_downscale_picks_samples() {
        let src: Vec<f32> = (0..4).map(|v| v as f32).collect();
        let dst = resample(&src, 4, 1, 1, 2, 1, Scaler::Point).unwrap();
        assert_eq!(dst.len(), 2);
        assert!(dst[0] < dst[1]);
    }

    #[test]
    fn test_bad_input() {
        assert!(resample(&[0.0; 5], 2, 2, 1, 4, 4, Scaler::Bilinear).is_err());
        assert!(resample(&[0.0; 4], 2, 2, 1, 0, 4, Scaler::Bilinear).is_err());
    }
}
