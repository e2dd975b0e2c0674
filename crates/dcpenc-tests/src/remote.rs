//! Remote encoding against fake and real servers.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use dcpenc_core::{ColourLut, FrameJob, Image, PixelFormat, Scaler, ServerDescriptor, Size};
use dcpenc_dist::{EncodeRequest, EncodeServer, FrameEncoder};
use dcpenc_io::Origin;

const TIMEOUT: Duration = Duration::from_secs(10);

/// What a fake server saw of one request.
struct Received {
    header: String,
    planes: Vec<Vec<u8>>,
}

/// Reads one request the way a server would: header up to NUL, then the
/// plane lengths the header announces.
fn read_request(stream: &mut BufReader<TcpStream>) -> Received {
    let mut header = Vec::new();
    stream.read_until(0, &mut header).unwrap();
    assert_eq!(header.pop(), Some(0));
    let request = EncodeRequest::parse("client", &header).unwrap();
    let planes = request
        .plane_lengths()
        .unwrap()
        .into_iter()
        .map(|len| {
            let mut plane = vec![0u8; len];
            stream.read_exact(&mut plane).unwrap();
            plane
        })
        .collect();
    Received {
        header: String::from_utf8(header).unwrap(),
        planes,
    }
}

/// Serves one connection: records the request, then runs `reply`.
fn fake_server<F>(reply: F) -> (ServerDescriptor, thread::JoinHandle<Received>)
where
    F: FnOnce(&mut TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);
        let received = read_request(&mut reader);
        reply(reader.get_mut());
        received
    });
    (ServerDescriptor::new("127.0.0.1", port), handle)
}

fn yuv_job() -> FrameJob {
    let size = Size::new(8, 4);
    let planes = vec![
        (16, (0..64).collect::<Vec<u8>>()),
        (8, vec![100; 16]),
        (8, vec![150; 16]),
    ];
    let image = Image::from_planes(PixelFormat::Yuv420p, size, planes).unwrap();
    FrameJob::builder(image, Size::new(16, 8), 42)
        .padding(2)
        .scaler(Scaler::Area)
        .frame_rate(25.0)
        .post_process(Some("dr"))
        .colour_lut(ColourLut::Rec709)
        .bandwidth(125_000_000)
        .build()
        .unwrap()
}

#[test]
fn test_echo_payload_and_exact_request() {
    let payload: Vec<u8> = (0..10_000u32).map(|i| (i * 7) as u8).collect();
    let reply = payload.clone();
    let (server, handle) = fake_server(move |s| {
        s.write_all(format!("{}\0", reply.len()).as_bytes()).unwrap();
        s.write_all(&reply).unwrap();
    });

    let job = yuv_job();
    let encoded = FrameEncoder::remote(server, TIMEOUT).encode(&job).unwrap();
    assert_eq!(encoded.origin(), Origin::Remote);
    assert_eq!(encoded.data(), payload.as_slice());

    let received = handle.join().unwrap();
    assert_eq!(
        received.header,
        "encode 8 4 0 16 8 2 area 42 25 dr 1 125000000 16 8 8"
    );
    let sent: Vec<Vec<u8>> = job.image().planes().iter().map(|p| p.data().to_vec()).collect();
    assert_eq!(received.planes, sent);
}

#[test]
fn test_exact_length_reply() {
    let (server, handle) = fake_server(|s| s.write_all(b"5\0hello").unwrap());
    let encoded = FrameEncoder::remote(server, TIMEOUT).encode(&yuv_job()).unwrap();
    assert_eq!(encoded.data(), b"hello");
    assert_eq!(encoded.len(), 5);
    handle.join().unwrap();
}

#[test]
fn test_truncated_reply_is_network_error() {
    let (server, handle) = fake_server(|s| s.write_all(b"5\0hel").unwrap());
    let err = FrameEncoder::remote(server, TIMEOUT)
        .encode(&yuv_job())
        .unwrap_err();
    assert!(err.is_network(), "{err}");
    assert!(!err.is_timeout());
    handle.join().unwrap();
}

#[test]
fn test_silent_server_times_out() {
    let (release, wait) = mpsc::channel::<()>();
    let (server, handle) = fake_server(move |_| {
        let _ = wait.recv_timeout(Duration::from_secs(10));
    });
    let err = FrameEncoder::remote(server, Duration::from_millis(300))
        .encode(&yuv_job())
        .unwrap_err();
    assert!(err.is_timeout(), "{err}");
    assert!(err.is_network());
    release.send(()).unwrap();
    handle.join().unwrap();
}

#[test]
fn test_real_server_matches_local() {
    let server = EncodeServer::bind("127.0.0.1:0", 2, TIMEOUT).unwrap();
    let port = server.local_addr().unwrap().port();
    let accept = thread::spawn(move || {
        for _ in 0..3 {
            server.accept_one().unwrap();
        }
    });
    let descriptor = ServerDescriptor::new("127.0.0.1", port);

    // A malformed request is dropped without taking the server down.
    let mut bad = TcpStream::connect(("127.0.0.1", port)).unwrap();
    bad.write_all(b"encode nonsense\0").unwrap();
    let mut reply = Vec::new();
    bad.read_to_end(&mut reply).unwrap();
    assert!(reply.is_empty());

    for (lut, frame) in [(ColourLut::Srgb, 0), (ColourLut::Rec709, 1)] {
        let pixels: Vec<u8> = (0..128 * 64 * 3).map(|i| (i % 253) as u8).collect();
        let image = Image::from_rgb24(Size::new(128, 64), pixels).unwrap();
        let job = FrameJob::builder(image, Size::new(128, 64), frame)
            .colour_lut(lut)
            .build()
            .unwrap();

        let remote = FrameEncoder::remote(descriptor.clone(), TIMEOUT)
            .encode(&job)
            .unwrap();
        let local = FrameEncoder::Local.encode(&job).unwrap();
        assert_eq!(remote.origin(), Origin::Remote);
        assert_eq!(remote.digest(), local.digest());
    }
    accept.join().unwrap();
}
