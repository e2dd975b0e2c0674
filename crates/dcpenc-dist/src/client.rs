//! Remote encode client.

use std::time::Duration;

use dcpenc_core::{FrameJob, Result, ServerDescriptor};
use dcpenc_io::{EncodedData, Socket};
use sha2::{Digest, Sha256};
use tracing::{debug, info, trace};

use crate::protocol::EncodeRequest;

/// Encodes `job` on `server` and returns the received codestream.
///
/// One connection per job; any failure along the way is a network-class
/// error and nothing is retried. `timeout` bounds every socket step
/// separately.
pub fn encode_remotely(
    job: &FrameJob,
    server: &ServerDescriptor,
    timeout: Duration,
) -> Result<EncodedData> {
    let frame = job.frame();
    let request = EncodeRequest::from_job(job);
    debug!(frame, server = %server, header = %request, "sending frame for remote encode");

    let mut socket = Socket::connect(&server.host, server.port, timeout)
        .map_err(|e| e.in_stage("connecting"))?;

    socket
        .write(&request.to_wire(), timeout)
        .map_err(|e| e.in_stage("sending request"))?;

    for (i, plane) in job.image().planes().iter().enumerate() {
        if tracing::enabled!(tracing::Level::TRACE) {
            let digest = format!("{:x}", Sha256::digest(plane.data()));
            trace!(frame, plane = i, bytes = plane.data().len(), sha256 = %digest, "sending plane");
        }
        socket
            .write(plane.data(), timeout)
            .map_err(|e| e.in_stage(&format!("sending plane {i}")))?;
    }

    let encoded = EncodedData::receive(&mut socket, timeout)?;
    trace!(frame, sha256 = %encoded.digest(), "received payload");
    info!("Finished remotely-encoded frame {frame}");
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcpenc_core::{Image, Size};
    use dcpenc_io::Origin;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn job() -> FrameJob {
        let image = Image::solid_rgb(Size::new(4, 2), [9, 8, 7]).unwrap();
        FrameJob::builder(image, Size::new(4, 2), 12).build().unwrap()
    }

    /// Accepts one connection, swallows the request, then replies with `reply`.
    fn fake_server(reply: &'static [u8]) -> (ServerDescriptor, thread::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let expected = EncodeRequest::from_job(&job()).to_wire().len() + 24;
            let mut received = vec![0u8; expected];
            stream.read_exact(&mut received).unwrap();
            stream.write_all(reply).unwrap();
            received
        });
        (ServerDescriptor::new("127.0.0.1", port), handle)
    }

    #[test]
    fn test_receives_announced_bytes() {
        let (server, handle) = fake_server(b"5\0abcde");
        let encoded = encode_remotely(&job(), &server, Duration::from_secs(5)).unwrap();
        assert_eq!(encoded.data(), b"abcde");
        assert_eq!(encoded.origin(), Origin::Remote);

        let received = handle.join().unwrap();
        let header_len = received.iter().position(|b| *b == 0).unwrap();
        assert_eq!(
            &received[..header_len],
            b"encode 4 2 2 4 2 0 bicubic 12 24 none 0 250000000 12"
        );
        assert_eq!(&received[header_len + 1..], [9, 8, 7].repeat(8).as_slice());
    }

    #[test]
    fn test_short_payload_is_network_error() {
        let (server, handle) = fake_server(b"5\0abc");
        let err = encode_remotely(&job(), &server, Duration::from_secs(5)).unwrap_err();
        assert!(err.is_network(), "{err}");
        handle.join().unwrap();
    }

    #[test]
    fn test_bad_length_is_network_error() {
        let (server, handle) = fake_server(b"five\0");
        let err = encode_remotely(&job(), &server, Duration::from_secs(5)).unwrap_err();
        assert!(err.is_network(), "{err}");
        handle.join().unwrap();
    }

    #[test]
    fn test_connection_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let server = ServerDescriptor::new("127.0.0.1", port);
        let err = encode_remotely(&job(), &server, Duration::from_secs(2)).unwrap_err();
        assert!(err.is_network(), "{err}");
    }
}
