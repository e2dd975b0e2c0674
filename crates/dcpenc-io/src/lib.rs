//! # dcpenc-io
//!
//! Byte movement for the encoder: the deadline-bounded [`Socket`] every
//! protocol step goes through, and [`EncodedData`], one finished codestream
//! that can be published to disk or forwarded to a peer.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::time::Duration;
//! use dcpenc_io::{EncodedData, Socket};
//!
//! # fn main() -> dcpenc_core::Result<()> {
//! let mut socket = Socket::connect("render1", 6192, Duration::from_secs(30))?;
//! let frame = EncodedData::receive(&mut socket, Duration::from_secs(30))?;
//! frame.write(Path::new("/tmp/j2c"), 42)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod encoded;
pub mod socket;

pub use encoded::{frame_path, EncodedData, Origin};
pub use socket::Socket;
