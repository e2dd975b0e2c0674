//! Blocking TCP transport with a wall-clock deadline per operation.
//!
//! Every call takes its own timeout and fails with a network-class
//! [`Error`] if it cannot finish in time or the peer closes early. A
//! partially filled buffer is never reported as complete.
//!
//! Bytes read past a delimiter by [`Socket::read_indefinite`] are kept and
//! served first by the next read.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use dcpenc_core::{Error, Result};
use tracing::{debug, trace};

/// Size of each chunk pulled from the kernel when scanning for a delimiter.
const READ_CHUNK: usize = 4096;

/// A connected TCP stream.
#[derive(Debug)]
pub struct Socket {
    stream: TcpStream,
    peer: String,
    pending: Vec<u8>,
}

impl Socket {
    /// Connects to `host:port`, trying every resolved address until one
    /// accepts or `timeout` has elapsed overall.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let peer = format!("{host}:{port}");
        let deadline = Instant::now() + timeout;

        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| Error::network(&peer, format!("cannot resolve: {e}")))?
            .collect();
        if addrs.is_empty() {
            return Err(Error::network(&peer, "no addresses resolved"));
        }

        let mut last_error = None;
        for addr in addrs {
            let remaining = remaining(deadline, &peer, "connect", timeout)?;
            trace!(peer = %peer, %addr, "connecting");
            match TcpStream::connect_timeout(&addr, remaining) {
                Ok(stream) => {
                    debug!(peer = %peer, %addr, "connected");
                    return Self::with_peer(stream, peer);
                }
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) if is_timeout(&e) => Err(Error::timeout(peer, "connect", timeout)),
            Some(e) => Err(Error::network(peer, format!("connect: {e}"))),
            None => Err(Error::timeout(peer, "connect", timeout)),
        }
    }

    /// Wraps an accepted stream.
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown peer".to_string());
        Self::with_peer(stream, peer)
    }

    fn with_peer(stream: TcpStream, peer: String) -> Result<Self> {
        stream
            .set_nodelay(true)
            .map_err(|e| Error::network(&peer, format!("set_nodelay: {e}")))?;
        Ok(Self {
            stream,
            peer,
            pending: Vec::new(),
        })
    }

    /// Remote address, for messages.
    #[inline]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Writes all of `data`, retrying partial writes until done or the
    /// deadline passes.
    pub fn write(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut written = 0;
        while written < data.len() {
            let remaining = remaining(deadline, &self.peer, "write", timeout)?;
            self.stream
                .set_write_timeout(Some(remaining))
                .map_err(|e| Error::network(&self.peer, format!("write: {e}")))?;
            match self.stream.write(&data[written..]) {
                Ok(0) => return Err(Error::network(&self.peer, "write: connection closed")),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if is_timeout(&e) => {
                    return Err(Error::timeout(&self.peer, "write", timeout));
                }
                Err(e) => return Err(Error::network(&self.peer, format!("write: {e}"))),
            }
        }
        trace!(peer = %self.peer, bytes = data.len(), "wrote");
        Ok(())
    }

    /// Reads until `delimiter` and returns the bytes before it.
    ///
    /// `max` bounds the message including the delimiter; a peer that sends
    /// more without a delimiter gets a protocol error.
    pub fn read_indefinite(&mut self, delimiter: u8, max: usize, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut scanned = 0;
        loop {
            let limit = self.pending.len().min(max);
            if let Some(pos) = self.pending[scanned..limit].iter().position(|b| *b == delimiter) {
                let end = scanned + pos;
                let mut message: Vec<u8> = self.pending.drain(..=end).collect();
                message.pop();
                return Ok(message);
            }
            if self.pending.len() >= max {
                return Err(Error::protocol(
                    &self.peer,
                    format!("no delimiter within {max} bytes"),
                ));
            }
            scanned = limit;

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.read_some(&mut chunk, deadline, "read_indefinite", timeout)?;
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }

    /// Reads exactly `len` bytes.
    pub fn read_definite(&mut self, len: usize, timeout: Duration) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_definite_into(&mut buf, timeout)?;
        Ok(buf)
    }

    /// Fills `buf` completely.
    pub fn read_definite_into(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let buffered = self.pending.len().min(buf.len());
        buf[..buffered].copy_from_slice(&self.pending[..buffered]);
        self.pending.drain(..buffered);

        let mut filled = buffered;
        while filled < buf.len() {
            filled += self.read_some(&mut buf[filled..], deadline, "read_definite", timeout)?;
        }
        trace!(peer = %self.peer, bytes = buf.len(), "read");
        Ok(())
    }

    /// One successful `read` of at least one byte.
    fn read_some(
        &mut self,
        buf: &mut [u8],
        deadline: Instant,
        operation: &str,
        timeout: Duration,
    ) -> Result<usize> {
        loop {
            let remaining = remaining(deadline, &self.peer, operation, timeout)?;
            self.stream
                .set_read_timeout(Some(remaining))
                .map_err(|e| Error::network(&self.peer, format!("{operation}: {e}")))?;
            match self.stream.read(buf) {
                Ok(0) => {
                    return Err(Error::network(
                        &self.peer,
                        format!("{operation}: connection closed by peer"),
                    ));
                }
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if is_timeout(&e) => {
                    return Err(Error::timeout(&self.peer, operation, timeout));
                }
                Err(e) => return Err(Error::network(&self.peer, format!("{operation}: {e}"))),
            }
        }
    }

    /// Shuts down the write half so the peer sees end of stream.
    pub fn shutdown_write(&self) -> Result<()> {
        self.stream
            .shutdown(Shutdown::Write)
            .map_err(|e| Error::network(&self.peer, format!("shutdown: {e}")))
    }
}

fn remaining(deadline: Instant, peer: &str, operation: &str, timeout: Duration) -> Result<Duration> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        return Err(Error::timeout(peer, operation, timeout));
    }
    Ok(left)
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
