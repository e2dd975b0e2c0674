//! Choosing where a frame is encoded.

use std::fmt;
use std::time::Duration;

use dcpenc_core::{FrameJob, Result, ServerDescriptor};
use dcpenc_io::EncodedData;

use crate::client::encode_remotely;

/// Where frames are encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEncoder {
    /// On the calling thread.
    Local,
    /// On an encode server.
    Remote {
        /// Server to use.
        server: ServerDescriptor,
        /// Per-step socket timeout.
        timeout: Duration,
    },
}

impl FrameEncoder {
    /// Remote encoder for `server`.
    pub fn remote(server: ServerDescriptor, timeout: Duration) -> Self {
        Self::Remote { server, timeout }
    }

    /// Returns `true` for [`FrameEncoder::Remote`].
    #[inline]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Encodes one frame.
    pub fn encode(&self, job: &FrameJob) -> Result<EncodedData> {
        match self {
            Self::Local => dcpenc_j2k::encode_locally(job),
            Self::Remote { server, timeout } => encode_remotely(job, server, *timeout),
        }
    }
}

impl fmt::Display for FrameEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote { server, .. } => write!(f, "remote {server}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcpenc_core::{Image, Size};
    use dcpenc_io::Origin;

    #[test]
    fn test_local_dispatch() {
        let image = Image::solid_rgb(Size::new(128, 64), [10, 20, 30]).unwrap();
        let job = FrameJob::builder(image, Size::new(128, 64), 0).build().unwrap();
        let encoded = FrameEncoder::Local.encode(&job).unwrap();
        assert_eq!(encoded.origin(), Origin::Local);
        assert!(!encoded.is_empty());
    }

    #[test]
    fn test_display() {
        let remote = FrameEncoder::remote(ServerDescriptor::new("::1", 7000), Duration::from_secs(1));
        assert!(remote.is_remote());
        assert_eq!(remote.to_string(), "remote [::1]:7000");
        assert_eq!(FrameEncoder::Local.to_string(), "local");
    }
}
