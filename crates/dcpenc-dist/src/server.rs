//! Encode server.
//!
//! Listens for encode requests, runs each one through the local encoder on
//! a rayon pool and sends the codestream back on the same connection. A
//! request that cannot be parsed or encoded is logged and its connection
//! dropped; the client sees that as a network error.

use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use dcpenc_core::{Error, Result};
use dcpenc_io::Socket;
use rayon::ThreadPool;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, trace, warn};

use crate::protocol::{EncodeRequest, MAX_HEADER_LEN};

/// A listening encode server.
pub struct EncodeServer {
    listener: TcpListener,
    pool: ThreadPool,
    timeout: Duration,
}

impl EncodeServer {
    /// Binds to `addr` with `threads` encode workers (0 picks one per core).
    pub fn bind<A: ToSocketAddrs>(addr: A, threads: usize, timeout: Duration) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("dcpenc-server-{i}"))
            .build()
            .map_err(|e| Error::invalid_parameter(format!("cannot start worker pool: {e}")))?;
        let server = Self {
            listener,
            pool,
            timeout,
        };
        info!(
            addr = %server.local_addr()?,
            threads = server.pool.current_num_threads(),
            "encode server listening"
        );
        Ok(server)
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves connections until the listener fails.
    pub fn run(&self) -> Result<()> {
        loop {
            self.accept_one()?;
        }
    }

    /// Accepts one connection and queues it on the pool.
    pub fn accept_one(&self) -> Result<()> {
        let (stream, addr) = self.listener.accept()?;
        debug!(%addr, "accepted connection");
        let timeout = self.timeout;
        self.pool.spawn(move || {
            let socket = match Socket::from_stream(stream) {
                Ok(socket) => socket,
                Err(e) => {
                    warn!(%addr, "cannot set up connection: {e}");
                    return;
                }
            };
            let served = panic::catch_unwind(AssertUnwindSafe(|| handle(socket, timeout)));
            if served.is_err() {
                error!(%addr, "request handler panicked, dropping connection");
            }
        });
        Ok(())
    }
}

fn handle(socket: Socket, timeout: Duration) {
    let peer = socket.peer().to_string();
    match serve_connection(socket, timeout) {
        Ok(frame) => debug!(peer = %peer, frame, "request complete"),
        Err(e @ Error::Protocol { .. }) => warn!(peer = %peer, "malformed request, dropping connection: {e}"),
        Err(e) if e.is_network() => warn!(peer = %peer, "connection failed: {e}"),
        Err(e) => error!(peer = %peer, "encode failed, dropping connection: {e}"),
    }
}

/// Runs one request on `socket`: header, planes, encode, reply.
///
/// Returns the frame index served.
pub fn serve_connection(mut socket: Socket, timeout: Duration) -> Result<u32> {
    let header = socket
        .read_indefinite(0, MAX_HEADER_LEN, timeout)
        .map_err(|e| e.in_stage("reading request"))?;
    let request = EncodeRequest::parse(socket.peer(), &header)?;
    let frame = request.frame;
    debug!(peer = socket.peer(), header = %request, "encode request");

    let mut planes = Vec::with_capacity(request.line_sizes.len());
    let lengths = request
        .plane_lengths()
        .map_err(|e| Error::protocol(socket.peer(), e.to_string()))?;
    for (i, len) in lengths.into_iter().enumerate() {
        let plane = socket
            .read_definite(len, timeout)
            .map_err(|e| e.in_stage(&format!("reading plane {i}")))?;
        if tracing::enabled!(tracing::Level::TRACE) {
            let digest = format!("{:x}", Sha256::digest(&plane));
            trace!(frame, plane = i, bytes = len, sha256 = %digest, "received plane");
        }
        planes.push(plane);
    }

    let job = request.into_job(planes)?;
    let encoded = dcpenc_j2k::encode_locally(&job)?;
    encoded.send(&mut socket, timeout)?;
    info!("Encoded frame {frame} for {}", socket.peer());
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::encode_remotely;
    use dcpenc_core::{FrameJob, Image, ServerDescriptor, Size};
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::thread;

    fn start(threads: usize) -> (ServerDescriptor, thread::JoinHandle<()>) {
        let server = EncodeServer::bind("127.0.0.1:0", threads, Duration::from_secs(10)).unwrap();
        let port = server.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            server.accept_one().unwrap();
        });
        (ServerDescriptor::new("127.0.0.1", port), handle)
    }

    #[test]
    fn test_remote_matches_local() {
        let pixels: Vec<u8> = (0..128 * 64 * 3).map(|i| (i % 251) as u8).collect();
        let image = Image::from_rgb24(Size::new(128, 64), pixels).unwrap();
        let job = FrameJob::builder(image, Size::new(128, 64), 4).build().unwrap();

        let (server, handle) = start(1);
        let remote = encode_remotely(&job, &server, Duration::from_secs(30)).unwrap();
        handle.join().unwrap();

        let local = dcpenc_j2k::encode_locally(&job).unwrap();
        assert_eq!(remote.data(), local.data());
    }

    #[test]
    fn test_malformed_header_drops_connection() {
        let (server, handle) = start(1);
        let mut stream = TcpStream::connect((server.host.as_str(), server.port)).unwrap();
        stream.write_all(b"hello\0").unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).unwrap();
        assert!(reply.is_empty());
        handle.join().unwrap();
    }

    #[test]
    fn test_serve_connection_reports_protocol_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream.write_all(b"encode 1 2 3\0").unwrap();
            let mut sink = Vec::new();
            let _ = stream.read_to_end(&mut sink);
        });
        let (stream, _) = listener.accept().unwrap();
        let socket = Socket::from_stream(stream).unwrap();
        let err = serve_connection(socket, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }), "{err}");
        client.join().unwrap();
    }

    #[test]
    fn test_oversized_requests_leave_server_running() {
        let server = EncodeServer::bind("127.0.0.1:0", 1, Duration::from_secs(10)).unwrap();
        let port = server.local_addr().unwrap().port();
        let accept = thread::spawn(move || {
            for _ in 0..3 {
                server.accept_one().unwrap();
            }
        });

        for header in [
            &b"encode 4 2 2 8 4 0 bicubic 0 24 none 0 250000000 18446744073709551615\0"[..],
            &b"encode 4 2 2 8 4 0 bicubic 0 24 none 0 250000000 4000000000000\0"[..],
        ] {
            let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
            stream.write_all(header).unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(10)))
                .unwrap();
            let mut reply = Vec::new();
            let _ = stream.read_to_end(&mut reply);
            assert!(reply.is_empty());
        }

        let image = Image::solid_rgb(Size::new(128, 64), [90, 30, 200]).unwrap();
        let job = FrameJob::builder(image, Size::new(128, 64), 8).build().unwrap();
        let descriptor = ServerDescriptor::new("127.0.0.1", port);
        let remote = encode_remotely(&job, &descriptor, Duration::from_secs(30)).unwrap();
        accept.join().unwrap();
        assert_eq!(remote.data(), dcpenc_j2k::encode_locally(&job).unwrap().data());
    }
}
