//! # dcpenc-dist
//!
//! Distributed encoding: frames shipped to encode servers over TCP, and the
//! server that encodes them.
//!
//! | Item | Role |
//! |------|------|
//! | [`EncodeRequest`] | request header, with the plane layout that follows it |
//! | [`encode_remotely`] | client side of one request |
//! | [`EncodeServer`] | listener running requests on a worker pool |
//! | [`FrameEncoder`] | one entry point for local or remote encoding |
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use dcpenc_core::{FrameJob, Image, ServerDescriptor, Size};
//! use dcpenc_dist::FrameEncoder;
//!
//! # fn main() -> dcpenc_core::Result<()> {
//! let image = Image::solid_rgb(Size::new(1998, 1080), [0, 0, 0])?;
//! let job = FrameJob::builder(image, Size::new(1998, 1080), 0).build()?;
//! let server = ServerDescriptor::parse("render1:6192", 6192)?;
//! let encoder = FrameEncoder::remote(server, Duration::from_secs(30));
//! let j2c = encoder.encode(&job)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod dispatch;
pub mod protocol;
pub mod server;

pub use client::encode_remotely;
pub use dispatch::FrameEncoder;
pub use protocol::EncodeRequest;
pub use server::{serve_connection, EncodeServer};
