//! # dcpenc-j2k
//!
//! Local JPEG2000 encoding of single frames for digital cinema.
//!
//! The codec is OpenJPEG, configured for the 2K cinema profile: one tile,
//! 32x32 code blocks, CPRL progression, the irreversible 9-7 wavelet with
//! the multi-component transform, and a single quality layer sized from the
//! job's bandwidth.
//!
//! # Usage
//!
//! ```rust,no_run
//! use dcpenc_core::{FrameJob, Image, Size};
//! use dcpenc_j2k::encode_locally;
//!
//! # fn main() -> dcpenc_core::Result<()> {
//! let image = Image::solid_rgb(Size::new(1998, 1080), [128, 128, 128])?;
//! let job = FrameJob::builder(image, Size::new(1998, 1080), 0).build()?;
//! let j2c = encode_locally(&job)?;
//! j2c.write(std::path::Path::new("/tmp/j2c"), job.frame())?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod container;
pub mod encoder;

pub use encoder::{compress, encode_locally};
