//! # dcpenc-core
//!
//! Core types for cinema JPEG2000 frame encoding.
//!
//! Every other dcpenc crate builds on the types here:
//!
//! - [`Image`], [`PixelFormat`], [`Plane`], [`Size`] - decoded frames with
//!   per-plane stride and line count
//! - [`Scaler`] and [`postprocess`] - fitting a frame to the output container
//! - [`FrameJob`] - one immutable unit of encode work
//! - [`CodecParameters`] - rate-control targets and the fixed cinema layout
//! - [`ColourLut`] - input colour profile selection
//! - [`Config`], [`ServerDescriptor`] - encoder settings and remote servers
//! - [`Error`], [`Result`] - failure classification shared by all crates
//!
//! ## Crate Structure
//!
//! ```text
//! dcpenc-core (this crate)
//!    ^
//!    +-- dcpenc-color (RGB -> 12-bit XYZ)
//!    +-- dcpenc-io (socket transport, encoded frames)
//!    +-- dcpenc-j2k (local OpenJPEG encoder)
//!    +-- dcpenc-dist (remote client, encode server)
//!    +-- dcpenc-cli
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod colour;
pub mod config;
pub mod error;
pub mod image;
pub mod job;
pub mod params;
pub mod postprocess;
pub mod scaler;
pub mod server;

pub use colour::ColourLut;
pub use config::Config;
pub use error::{Error, Result};
pub use image::{Image, PixelFormat, Plane, Size};
pub use job::{FrameJob, FrameJobBuilder};
pub use params::CodecParameters;
pub use scaler::Scaler;
pub use server::ServerDescriptor;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        CodecParameters, ColourLut, Config, Error, FrameJob, Image, PixelFormat, Result, Scaler,
        ServerDescriptor, Size,
    };
}
