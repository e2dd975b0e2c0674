//! Frame jobs: one input image plus everything needed to encode it.
//!
//! A [`FrameJob`] is immutable once built and yields exactly one encoded
//! frame, whether it is encoded locally or shipped to a server.
//!
//! # Example
//!
//! ```rust
//! use dcpenc_core::{ColourLut, FrameJob, Image, Size};
//!
//! let image = Image::solid_rgb(Size::new(64, 32), [255, 0, 0]).unwrap();
//! let job = FrameJob::builder(image, Size::new(64, 32), 7)
//!     .frame_rate(24.0)
//!     .colour_lut(ColourLut::Rec709)
//!     .build()
//!     .unwrap();
//! assert_eq!(job.frame(), 7);
//! assert_eq!(job.frames_per_second(), 24);
//! ```

use tracing::trace;

use crate::config::DEFAULT_J2K_BANDWIDTH;
use crate::params::{self, CodecParameters, DCI_PRECISION};
use crate::{ColourLut, Config, Error, Image, Result, Scaler, Size};

/// Everything needed to encode one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameJob {
    image: Image,
    out_size: Size,
    padding: u32,
    scaler: Scaler,
    frame: u32,
    frames_per_second: u32,
    post_process: Option<String>,
    colour_lut: ColourLut,
    bandwidth: u64,
}

impl FrameJob {
    /// Starts a job for `image`, to be encoded at `out_size` as frame `frame`.
    pub fn builder(image: Image, out_size: Size, frame: u32) -> FrameJobBuilder {
        FrameJobBuilder {
            image,
            out_size,
            frame,
            padding: 0,
            scaler: Scaler::default(),
            frame_rate: 24.0,
            post_process: None,
            colour_lut: ColourLut::default(),
            bandwidth: DEFAULT_J2K_BANDWIDTH,
        }
    }

    /// Input image.
    #[inline]
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Output size, padding included.
    #[inline]
    pub fn out_size(&self) -> Size {
        self.out_size
    }

    /// Black columns added on each side of the picture.
    #[inline]
    pub fn padding(&self) -> u32 {
        self.padding
    }

    /// Resampling filter.
    #[inline]
    pub fn scaler(&self) -> Scaler {
        self.scaler
    }

    /// Frame index.
    #[inline]
    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Integer frame rate.
    #[inline]
    pub fn frames_per_second(&self) -> u32 {
        self.frames_per_second
    }

    /// Post-process filter chain, if any.
    #[inline]
    pub fn post_process(&self) -> Option<&str> {
        self.post_process.as_deref()
    }

    /// Input colour profile.
    #[inline]
    pub fn colour_lut(&self) -> ColourLut {
        self.colour_lut
    }

    /// Bandwidth target in bits per second.
    #[inline]
    pub fn bandwidth(&self) -> u64 {
        self.bandwidth
    }

    /// Derives codec parameters for this job's output frame.
    pub fn codec_parameters(&self) -> Result<CodecParameters> {
        CodecParameters::build(
            self.frames_per_second as f32,
            self.bandwidth,
            self.out_size.width,
            self.out_size.height,
            DCI_PRECISION,
        )
    }

    /// Runs post-processing then scaling, giving the RGB24 frame to encode.
    pub fn prepare_rgb(&self) -> Result<Image> {
        let processed;
        let source = match &self.post_process {
            Some(spec) => {
                processed = self.image.post_process(spec)?;
                &processed
            }
            None => &self.image,
        };
        source.scale_and_convert_to_rgb(self.out_size, self.padding, self.scaler)
    }
}

/// Builder for [`FrameJob`]. Validation happens in [`FrameJobBuilder::build`].
#[derive(Debug, Clone)]
pub struct FrameJobBuilder {
    image: Image,
    out_size: Size,
    frame: u32,
    padding: u32,
    scaler: Scaler,
    frame_rate: f32,
    post_process: Option<String>,
    colour_lut: ColourLut,
    bandwidth: u64,
}

impl FrameJobBuilder {
    /// Takes colour LUT and bandwidth from a configuration.
    ///
    /// Fails if the configured LUT index is unknown.
    pub fn config(mut self, config: &Config) -> Result<Self> {
        self.colour_lut = config.colour_lut()?;
        self.bandwidth = config.j2k_bandwidth;
        Ok(self)
    }

    /// Black padding columns on each side.
    pub fn padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    /// Resampling filter.
    pub fn scaler(mut self, scaler: Scaler) -> Self {
        self.scaler = scaler;
        self
    }

    /// Source frame rate; rounded to an integer, ties to even.
    pub fn frame_rate(mut self, frame_rate: f32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Post-process chain. Empty strings and `"none"` mean no processing.
    pub fn post_process(mut self, spec: Option<impl Into<String>>) -> Self {
        self.post_process = spec
            .map(Into::into)
            .filter(|s: &String| !s.trim().is_empty() && s != "none");
        self
    }

    /// Colour profile.
    pub fn colour_lut(mut self, lut: ColourLut) -> Self {
        self.colour_lut = lut;
        self
    }

    /// Bandwidth target in bits per second.
    pub fn bandwidth(mut self, bandwidth: u64) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    /// Validates and freezes the job.
    pub fn build(self) -> Result<FrameJob> {
        let frames_per_second = params::round_frame_rate(self.frame_rate)?;
        if self.out_size.is_empty() {
            return Err(Error::invalid_parameter(format!(
                "output size {} is empty",
                self.out_size
            )));
        }
        if self.padding.saturating_mul(2) >= self.out_size.width {
            return Err(Error::invalid_parameter(format!(
                "padding {} leaves no picture in output width {}",
                self.padding, self.out_size.width
            )));
        }
        if self.bandwidth == 0 {
            return Err(Error::invalid_parameter("bandwidth must be positive"));
        }
        if let Some(spec) = &self.post_process {
            crate::postprocess::parse(spec)?;
        }

        trace!(
            frame = self.frame,
            input = %self.image.size(),
            output = %self.out_size,
            fps = frames_per_second,
            "frame job built"
        );

        Ok(FrameJob {
            image: self.image,
            out_size: self.out_size,
            padding: self.padding,
            scaler: self.scaler,
            frame: self.frame,
            frames_per_second,
            post_process: self.post_process,
            colour_lut: self.colour_lut,
            bandwidth: self.bandwidth,
        })
    }
}
