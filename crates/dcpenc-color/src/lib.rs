//! # dcpenc-color
//!
//! Bit-reproducible conversion of 8-bit RGB to 12-bit DCI X'Y'Z'.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`transfer`] | sRGB / Rec.709 decoding and DCI encoding curves |
//! | [`matrix`] | RGB to XYZ projection |
//! | [`lut`] | process-wide 4096-entry tables |
//! | [`pipeline`] | per-pixel and per-frame conversion |
//!
//! # Usage
//!
//! ```rust
//! use dcpenc_color::convert_frame;
//! use dcpenc_core::{ColourLut, Image, Size};
//!
//! let img = Image::solid_rgb(Size::new(8, 8), [255, 0, 0]).unwrap();
//! let xyz = convert_frame(&img, ColourLut::Srgb).unwrap();
//! assert_eq!(xyz.pixel(0, 0), [2808, 2176, 861]);
//! ```

#![warn(missing_docs)]

pub mod lut;
pub mod matrix;
pub mod pipeline;
pub mod transfer;

pub use pipeline::{convert_frame, rgb_to_xyz, xyz_indices, XyzFrame};
