//! Codec parameter derivation.
//!
//! [`CodecParameters::build`] turns a frame rate and a bandwidth budget
//! into the rate-control targets and the fixed cinema coding layout the
//! J2K encoder is configured with. It is a pure function: parameters are
//! rebuilt for every job and never cached.
//!
//! # Example
//!
//! ```rust
//! use dcpenc_core::CodecParameters;
//!
//! let p = CodecParameters::build(24.0, 125_000_000, 1998, 1080, 12).unwrap();
//! assert_eq!(p.max_cs_len, 651_041);
//! assert_eq!(p.max_comp_size, 520_833);
//! ```

use crate::{Error, Result};

/// Ratio between the whole-codestream budget and the per-component budget.
pub const COMPONENT_SIZE_RATIO: f64 = 1.25;

/// Sample precision delivered to the codec for DCI XYZ.
pub const DCI_PRECISION: u32 = 12;

/// Order in which packets are laid out in the codestream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progression {
    /// Component, position, resolution, layer (required by DCI).
    Cprl,
}

/// Wavelet transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wavelet {
    /// Irreversible 9-7 (lossy).
    Irreversible97,
}

/// Codestream profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Digital cinema 2K.
    Cinema2k,
}

/// Rounds a frame rate to the integer rate used for rate control.
///
/// Halves round to even. Rates that round to zero, negative rates and
/// non-finite values are rejected.
pub fn round_frame_rate(frame_rate: f32) -> Result<u32> {
    if !frame_rate.is_finite() {
        return Err(Error::invalid_parameter(format!("frame rate {frame_rate} is not finite")));
    }
    let rounded = frame_rate.round_ties_even();
    if rounded <= 0.0 {
        return Err(Error::invalid_parameter(format!(
            "frame rate {frame_rate} rounds to {rounded}"
        )));
    }
    Ok(rounded as u32)
}

/// Derived, read-only J2K encoder parameters for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodecParameters {
    /// Integer frame rate used for rate control
    pub frames_per_second: u32,
    /// Bandwidth budget in bits per second
    pub bandwidth: u64,
    /// Image width (single tile covers the whole frame)
    pub width: u32,
    /// Image height
    pub height: u32,
    /// Bits per component
    pub precision: u32,
    /// Maximum codestream length in bytes
    pub max_cs_len: u32,
    /// Maximum size of one component in bytes
    pub max_comp_size: u32,
    /// Compression ratio for the single quality layer
    pub rate: f32,
    /// Code-block width and height
    pub code_block: (u32, u32),
    /// Packet progression order
    pub progression: Progression,
    /// Wavelet transform
    pub wavelet: Wavelet,
    /// Multi-component transform across the three components
    pub mct: bool,
    /// Codestream profile
    pub profile: Profile,
}

impl CodecParameters {
    /// Derives parameters from frame rate, bandwidth and output geometry.
    ///
    /// `max_cs_len` is `bandwidth / 8 / fps` and `max_comp_size` is that
    /// quotient divided by [`COMPONENT_SIZE_RATIO`], both truncated toward
    /// zero.
    pub fn build(
        frame_rate: f32,
        bandwidth: u64,
        width: u32,
        height: u32,
        precision: u32,
    ) -> Result<Self> {
        let frames_per_second = round_frame_rate(frame_rate)?;
        if bandwidth == 0 {
            return Err(Error::invalid_parameter("bandwidth must be positive"));
        }
        if width == 0 || height == 0 {
            return Err(Error::invalid_parameter(format!(
                "image size {width}x{height} is empty"
            )));
        }
        if precision == 0 || precision > 16 {
            return Err(Error::invalid_parameter(format!("precision {precision} out of range")));
        }

        let bytes_per_frame = bandwidth as f64 / 8.0 / frames_per_second as f64;
        let max_cs_len = bytes_per_frame as u32;
        let max_comp_size = (bytes_per_frame / COMPONENT_SIZE_RATIO) as u32;
        if max_cs_len == 0 {
            return Err(Error::invalid_parameter(format!(
                "bandwidth {bandwidth} leaves no bytes per frame at {frames_per_second} fps"
            )));
        }

        let raw_bits = 3.0 * width as f64 * height as f64 * precision as f64;
        let rate = (raw_bits / (max_cs_len as f64 * 8.0)) as f32;

        Ok(Self {
            frames_per_second,
            bandwidth,
            width,
            height,
            precision,
            max_cs_len,
            max_comp_size,
            rate,
            code_block: (32, 32),
            progression: Progression::Cprl,
            wavelet: Wavelet::Irreversible97,
            mct: true,
            profile: Profile::Cinema2k,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reference_budget() {
        let p = CodecParameters::build(24.0, 125_000_000, 1998, 1080, 12).unwrap();
        assert_eq!(p.frames_per_second, 24);
        assert_eq!(p.max_cs_len, 651_041);
        assert_eq!(p.max_comp_size, 520_833);
        assert_eq!(p.code_block, (32, 32));
        assert_eq!(p.progression, Progression::Cprl);
        assert!(p.mct);
        let expected = 3.0 * 1998.0 * 1080.0 * 12.0 / (651_041.0 * 8.0);
        assert_relative_eq!(p.rate, expected as f32, epsilon = 1e-4);
    }

    #[test]
    fn test_pure() {
        let a = CodecParameters::build(25.0, 250_000_000, 2048, 858, 12).unwrap();
        let b = CodecParameters::build(25.0, 250_000_000, 2048, 858, 12).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.max_cs_len, 1_250_000);
        assert_eq!(a.max_comp_size, 1_000_000);
    }

    #[test]
    fn test_zero_frame_rate() {
        let err = CodecParameters::build(0.0, 125_000_000, 2048, 1080, 12).unwrap_err();
        assert!(err.is_invalid_parameter());
        assert!(CodecParameters::build(0.4, 125_000_000, 2048, 1080, 12).is_err());
        assert!(CodecParameters::build(-24.0, 125_000_000, 2048, 1080, 12).is_err());
        assert!(CodecParameters::build(f32::NAN, 125_000_000, 2048, 1080, 12).is_err());
    }

    #[test]
    fn test_zero_bandwidth() {
        let err = CodecParameters::build(24.0, 0, 2048, 1080, 12).unwrap_err();
        assert!(err.is_invalid_parameter());
        assert!(CodecParameters::build(24.0, 100, 2048, 1080, 12).is_err());
    }

    #[test]
    fn test_frame_rate_rounding() {
        assert_eq!(round_frame_rate(23.976).unwrap(), 24);
        assert_eq!(round_frame_rate(29.97).unwrap(), 30);
        assert_eq!(round_frame_rate(24.5).unwrap(), 24);
        assert_eq!(round_frame_rate(25.5).unwrap(), 26);
    }
}
