//! Error types shared by every dcpenc crate.
//!
//! A single [`Error`] enum classifies every failure a frame job can hit.
//! All of them are terminal for the job that raised them: nothing in the
//! library retries, callers decide whether to try again elsewhere.
//!
//! # Categories
//!
//! - **Encoding**: [`Encode`](Error::Encode) - codec container or compression failure
//! - **Network**: [`Network`](Error::Network), [`Timeout`](Error::Timeout),
//!   [`Protocol`](Error::Protocol) - any stage of a remote exchange
//! - **Output**: [`WriteFile`](Error::WriteFile) - publishing an encoded frame
//! - **Parameters**: [`InvalidParameter`](Error::InvalidParameter)
//!
//! # Usage
//!
//! ```rust
//! use dcpenc_core::{Error, Result};
//!
//! fn frames_per_second(fps: u32) -> Result<u32> {
//!     if fps == 0 {
//!         return Err(Error::invalid_parameter("frame rate must be positive"));
//!     }
//!     Ok(fps)
//! }
//!
//! assert!(frames_per_second(0).unwrap_err().is_invalid_parameter());
//! ```

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while preparing, encoding, shipping or publishing a frame.
#[derive(Debug, Error)]
pub enum Error {
    /// The J2K codec could not build its image container or failed to compress.
    #[error("frame {frame}: J2K encoding failed: {reason}")]
    Encode {
        /// Frame index of the failing job
        frame: u32,
        /// What the codec reported
        reason: String,
    },

    /// Connect, write or read failure while talking to a peer.
    #[error("network error with {peer}: {reason}")]
    Network {
        /// Remote address (or `host:port` as configured)
        peer: String,
        /// Stage and cause
        reason: String,
    },

    /// A socket operation did not complete before its deadline.
    #[error("network timeout with {peer}: {operation} did not complete within {}s", .after.as_secs_f32())]
    Timeout {
        /// Remote address
        peer: String,
        /// Operation that timed out
        operation: String,
        /// Timeout that elapsed
        after: Duration,
    },

    /// A peer sent a malformed request or response header.
    #[error("protocol error with {peer}: {reason}")]
    Protocol {
        /// Remote address
        peer: String,
        /// What was wrong with the message
        reason: String,
    },

    /// The temporary frame file could not be created, written or renamed.
    #[error("cannot write {} (error {code}): {source}", .path.display())]
    WriteFile {
        /// File that failed
        path: PathBuf,
        /// OS error code, or 0 if none was reported
        code: i32,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A job or codec parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Plain I/O error outside the categories above.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Creates an [`Error::Encode`] error.
    #[inline]
    pub fn encode(frame: u32, reason: impl Into<String>) -> Self {
        Self::Encode {
            frame,
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::Network`] error.
    #[inline]
    pub fn network(peer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            peer: peer.into(),
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::Timeout`] error.
    #[inline]
    pub fn timeout(peer: impl Into<String>, operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            peer: peer.into(),
            operation: operation.into(),
            after,
        }
    }

    /// Creates an [`Error::Protocol`] error.
    #[inline]
    pub fn protocol(peer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Protocol {
            peer: peer.into(),
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::WriteFile`] error from the failing path and I/O error.
    pub fn write_file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::WriteFile {
            path: path.into(),
            code: source.raw_os_error().unwrap_or(0),
            source,
        }
    }

    /// Creates an [`Error::InvalidParameter`] error.
    #[inline]
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Prefixes network-class errors with the protocol stage they happened in.
    ///
    /// Other variants are returned unchanged.
    pub fn in_stage(self, stage: &str) -> Self {
        match self {
            Self::Network { peer, reason } => Self::Network {
                peer,
                reason: format!("{stage}: {reason}"),
            },
            Self::Timeout {
                peer,
                operation,
                after,
            } => Self::Timeout {
                peer,
                operation: format!("{stage} ({operation})"),
                after,
            },
            Self::Protocol { peer, reason } => Self::Protocol {
                peer,
                reason: format!("{stage}: {reason}"),
            },
            other => other,
        }
    }

    /// Returns `true` for every failure of a remote exchange
    /// (connection, timeout, or malformed message).
    #[inline]
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::Protocol { .. }
        )
    }

    /// Returns `true` if this is a timeout.
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if this is a codec failure.
    #[inline]
    pub fn is_encode(&self) -> bool {
        matches!(self, Self::Encode { .. })
    }

    /// Returns `true` if this is a frame publishing failure.
    #[inline]
    pub fn is_write_file(&self) -> bool {
        matches!(self, Self::WriteFile { .. })
    }

    /// Returns `true` if this is a parameter validation failure.
    #[inline]
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, Self::InvalidParameter(_))
    }
}
