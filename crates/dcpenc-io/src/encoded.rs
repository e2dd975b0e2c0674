//! Encoded J2K frames.
//!
//! An [`EncodedData`] owns one codestream. Where the bytes came from decides
//! how they are held: a buffer handed over by the local codec, or a buffer
//! allocated for exactly the length a remote server announced. Both expose
//! the same interface and free their storage on drop.
//!
//! # Wire format
//!
//! ```text
//! <ASCII decimal length> NUL <length bytes>
//! ```

use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dcpenc_core::{Error, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::socket::Socket;

/// Longest accepted length header, terminator included.
pub const MAX_LENGTH_HEADER: usize = 32;

/// Largest codestream accepted from a peer.
pub const MAX_ENCODED_LEN: usize = 256 * 1024 * 1024;

/// Extension of published frames.
pub const FRAME_EXTENSION: &str = "j2c";

/// Where an [`EncodedData`] buffer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Produced by the local codec.
    Local,
    /// Received from a remote encode server.
    Remote,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("locally"),
            Self::Remote => f.write_str("remotely"),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
enum Storage {
    Codec(Vec<u8>),
    Received(Box<[u8]>),
}

/// One encoded frame.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedData {
    storage: Storage,
}

impl fmt::Debug for EncodedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedData")
            .field("origin", &self.origin())
            .field("len", &self.len())
            .finish()
    }
}

impl EncodedData {
    /// Takes ownership of a codestream produced by the local codec.
    pub fn from_codec(bytes: Vec<u8>) -> Self {
        Self {
            storage: Storage::Codec(bytes),
        }
    }

    /// Wraps a buffer received from a peer.
    pub fn from_received(bytes: Box<[u8]>) -> Self {
        Self {
            storage: Storage::Received(bytes),
        }
    }

    /// Reads a length header and exactly that many bytes from `socket`.
    pub fn receive(socket: &mut Socket, timeout: Duration) -> Result<Self> {
        let header = socket
            .read_indefinite(0, MAX_LENGTH_HEADER, timeout)
            .map_err(|e| e.in_stage("reading length"))?;
        let len = parse_length(socket.peer(), &header)?;

        let mut buf = vec![0u8; len].into_boxed_slice();
        socket
            .read_definite_into(&mut buf, timeout)
            .map_err(|e| e.in_stage("reading encoded data"))?;
        debug!(peer = socket.peer(), bytes = len, "received encoded frame");
        Ok(Self::from_received(buf))
    }

    /// Sends the length header followed by the bytes.
    pub fn send(&self, socket: &mut Socket, timeout: Duration) -> Result<()> {
        let header = format!("{}\0", self.len());
        socket
            .write(header.as_bytes(), timeout)
            .map_err(|e| e.in_stage("sending length"))?;
        socket
            .write(self.data(), timeout)
            .map_err(|e| e.in_stage("sending encoded data"))?;
        trace!(peer = socket.peer(), bytes = self.len(), "sent encoded frame");
        Ok(())
    }

    /// The codestream.
    #[inline]
    pub fn data(&self) -> &[u8] {
        match &self.storage {
            Storage::Codec(v) => v.as_slice(),
            Storage::Received(b) => &b[..],
        }
    }

    /// Number of valid bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Returns `true` if there are no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Where the bytes came from.
    #[inline]
    pub fn origin(&self) -> Origin {
        match self.storage {
            Storage::Codec(_) => Origin::Local,
            Storage::Received(_) => Origin::Remote,
        }
    }

    /// Releases the bytes.
    pub fn into_vec(self) -> Vec<u8> {
        match self.storage {
            Storage::Codec(v) => v,
            Storage::Received(b) => b.into_vec(),
        }
    }

    /// SHA-256 of the codestream as lowercase hex.
    pub fn digest(&self) -> String {
        format!("{:x}", Sha256::digest(self.data()))
    }

    /// Publishes the frame as `<dir>/<8-digit frame>.j2c`.
    ///
    /// The bytes go to `<name>.j2c.tmp` first, which is flushed to disk and
    /// renamed over the final name, so the final file is never truncated.
    pub fn write(&self, dir: &Path, frame: u32) -> Result<PathBuf> {
        let path = frame_path(dir, frame);
        let tmp = path.with_extension(format!("{FRAME_EXTENSION}.tmp"));

        let mut file = File::create(&tmp).map_err(|e| Error::write_file(&tmp, e))?;
        file.write_all(self.data())
            .map_err(|e| Error::write_file(&tmp, e))?;
        file.sync_all().map_err(|e| Error::write_file(&tmp, e))?;
        drop(file);

        fs::rename(&tmp, &path).map_err(|e| Error::write_file(&path, e))?;
        debug!(frame, path = %path.display(), bytes = self.len(), "wrote frame");
        trace!(frame, sha256 = %self.digest(), "frame digest");
        Ok(path)
    }
}

/// Published path of `frame` inside `dir`.
pub fn frame_path(dir: &Path, frame: u32) -> PathBuf {
    dir.join(format!("{frame:08}.{FRAME_EXTENSION}"))
}

fn parse_length(peer: &str, header: &[u8]) -> Result<usize> {
    let bad = || Error::protocol(peer, format!("bad length '{}'", String::from_utf8_lossy(header)));
    if header.is_empty() || !header.iter().all(u8::is_ascii_digit) {
        return Err(bad());
    }
    let len = header
        .iter()
        .try_fold(0usize, |n, &d| n.checked_mul(10)?.checked_add(usize::from(d - b'0')))
        .ok_or_else(bad)?;
    if len > MAX_ENCODED_LEN {
        return Err(Error::protocol(peer, format!("length {len} exceeds {MAX_ENCODED_LEN}")));
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variants_share_interface() {
        let local = EncodedData::from_codec(vec![1, 2, 3]);
        let remote = EncodedData::from_received(vec![1, 2, 3].into_boxed_slice());
        assert_eq!(local.data(), remote.data());
        assert_eq!(local.origin(), Origin::Local);
        assert_eq!(remote.origin(), Origin::Remote);
        assert_eq!(remote.len(), 3);
        assert_eq!(local.digest(), remote.digest());
        assert_eq!(remote.into_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn test_digest() {
        let data = EncodedData::from_codec(b"abc".to_vec());
        assert_eq!(
            data.digest(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_frame_path() {
        let p = frame_path(Path::new("/out"), 42);
        assert_eq!(p, Path::new("/out/00000042.j2c"));
    }

    #[test]
    fn test_write_publishes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let data = EncodedData::from_codec(vec![7; 1000]);
        let path = data.write(dir.path(), 3).unwrap();
        assert_eq!(path, dir.path().join("00000003.j2c"));
        assert_eq!(fs::read(&path).unwrap(), vec![7; 1000]);
        assert!(!dir.path().join("00000003.j2c.tmp").exists());
    }

    #[test]
    fn test_write_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        EncodedData::from_codec(vec![1; 10]).write(dir.path(), 0).unwrap();
        EncodedData::from_codec(vec![2; 4]).write(dir.path(), 0).unwrap();
        assert_eq!(fs::read(frame_path(dir.path(), 0)).unwrap(), vec![2; 4]);
    }

    #[test]
    fn test_write_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = EncodedData::from_codec(vec![0]).write(&missing, 1).unwrap_err();
        match err {
            Error::WriteFile { path, code, .. } => {
                assert!(path.ends_with("00000001.j2c.tmp"));
                assert_ne!(code, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!frame_path(&missing, 1).exists());
    }

    #[test]
    fn test_parse_length() {
        assert_eq!(parse_length("p", b"5").unwrap(), 5);
        assert_eq!(parse_length("p", b"0").unwrap(), 0);
        assert!(parse_length("p", b"-1").unwrap_err().is_network());
        assert!(parse_length("p", b"x").is_err());
        assert!(parse_length("p", b"999999999999").is_err());
        assert!(parse_length("p", b"99999999999999999999999").is_err());
        let malformed: [&[u8]; 6] = [b" 5", b"5 ", b"+5", b"", b"5\r", &[0xff]];
        for header in malformed {
            let err = parse_length("p", header).unwrap_err();
            assert!(matches!(err, Error::Protocol { .. }), "{err}");
        }
        assert_eq!(parse_length("p", b"007").unwrap(), 7);
    }
}
