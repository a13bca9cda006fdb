//! End-to-end tests over real TCP sockets against a fully started appliance
//! with a simulated tuner and a test-tone capture.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use webradio_audio::{PoolConfig, ToneCapture};
use webradio_core::Band;
use webradio_server::{HostNetwork, Running, ServerConfig, Supervisor, TracingLed};
use webradio_si4730::Si4730Builder;
use webradio_test_harness::SimulatedTuner;

const WAV_HEADER_LEN: usize = 44;

async fn start(root: &Path, slots: usize) -> (Running<TracingLed>, SimulatedTuner) {
    std::fs::write(root.join("index.html"), "<html>web radio</html>").unwrap();
    std::fs::create_dir_all(root.join("js")).unwrap();
    std::fs::write(root.join("js").join("WebRadio.js"), "// app").unwrap();

    let sim = SimulatedTuner::new()
        .with_station(Band::Fm, 8810, 45, 25)
        .with_station(Band::Fm, 9990, 40, 20)
        .with_weak_station(Band::Fm, 10110)
        .with_station(Band::Am, 1010, 35, 15);
    let driver = Si4730Builder::new()
        .stc_poll_interval(Duration::from_micros(100))
        .build(sim.clone())
        .await
        .unwrap();

    let config = ServerConfig {
        bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
        audio_port: 0,
        control_port: 0,
        web_root: root.to_path_buf(),
        pool: PoolConfig { slots, depth: 16 },
        ..ServerConfig::default()
    };
    let supervisor = Supervisor::new(
        config,
        HostNetwork::new(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        TracingLed::default(),
    );
    let running = supervisor
        .start(driver, ToneCapture::default(), CancellationToken::new())
        .await
        .unwrap();
    (running, sim)
}

async fn request(addr: SocketAddr, req: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(req.as_bytes()).await.unwrap();
    let mut out = String::new();
    stream.read_to_string(&mut out).await.unwrap();
    out
}

#[tokio::test]
async fn tune_in_range_returns_204_with_location() {
    let dir = tempfile::tempdir().unwrap();
    let (running, sim) = start(dir.path(), 1).await;

    let out = request(running.control_addr(), "PATCH /tune/fm/9990 HTTP/1.1\r\nHost: radio\r\n\r\n").await;
    assert_eq!(out, "HTTP/1.0 204 No Content\r\nContent-Location: /tune/fm/9990\r\n\r\n");
    assert_eq!(sim.frequency(), 9990);

    let out = request(running.control_addr(), "PATCH /tune/am/1010 HTTP/1.1\r\n\r\n").await;
    assert!(out.starts_with("HTTP/1.0 204 No Content\r\n"));
    assert_eq!(sim.function(), Some(Band::Am));

    running.shutdown().await.unwrap();
}

#[tokio::test]
async fn tune_out_of_range_is_400_and_leaves_radio_alone() {
    let dir = tempfile::tempdir().unwrap();
    let (running, sim) = start(dir.path(), 1).await;
    request(running.control_addr(), "PATCH /tune/fm/9990 HTTP/1.0\r\n\r\n").await;
    sim.clear_log();

    let out = request(running.control_addr(), "PATCH /tune/fm/999999 HTTP/1.0\r\n\r\n").await;
    assert_eq!(out, "HTTP/1.0 400 Bad Request\r\n\r\n");
    assert!(sim.commands().is_empty());
    assert_eq!(
        running.radio().status().await.unwrap().tuned,
        Some((Band::Fm, 9990))
    );

    running.shutdown().await.unwrap();
}

#[tokio::test]
async fn static_files() {
    let dir = tempfile::tempdir().unwrap();
    let (running, _sim) = start(dir.path(), 1).await;
    let addr = running.control_addr();

    assert_eq!(
        request(addr, "GET / HTTP/1.0\r\n\r\n").await,
        "HTTP/1.0 200 OK\r\nContent-type: text/html\r\n\r\n<html>web radio</html>"
    );
    assert_eq!(
        request(addr, "GET /index.html HTTP/1.0\r\n\r\n").await,
        "HTTP/1.0 200 OK\r\nContent-type: text/html\r\n\r\n<html>web radio</html>"
    );
    assert_eq!(
        request(addr, "GET /js/WebRadio.js HTTP/1.0\r\n\r\n").await,
        "HTTP/1.0 200 OK\r\nContent-type: text/javascript\r\n\r\n// app"
    );
    assert_eq!(
        request(addr, "GET /nonexistent.file HTTP/1.0\r\n\r\n").await,
        "HTTP/1.0 400 Bad Request\r\n\r\n"
    );

    running.shutdown().await.unwrap();
}

#[tokio::test]
async fn scan_xml_lists_strong_stations_fm_first() {
    let dir = tempfile::tempdir().unwrap();
    let (running, _sim) = start(dir.path(), 1).await;

    let out = request(running.control_addr(), "GET /scan.xml HTTP/1.0\r\n\r\n").await;
    let (head, body) = out.split_once("\r\n\r\n").unwrap();
    assert_eq!(
        head,
        "HTTP/1.0 200 OK\r\nAccess-Control-Allow-Origin: *\r\nContent-type: text/xml"
    );
    assert_eq!(
        body,
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\r\n\
         <station-list>\r\n\
         <station>\r\n<name>88.1 FM</name>\r\n<url>tune/fm/8810</url>\r\n</station>\r\n\
         <station>\r\n<name>99.9 FM</name>\r\n<url>tune/fm/9990</url>\r\n</station>\r\n\
         <station>\r\n<name>1010 AM</name>\r\n<url>tune/am/1010</url>\r\n</station>\r\n\
         </station-list>\r\n"
    );
    assert_eq!(std::fs::read_to_string(dir.path().join("stations.xml")).unwrap(), body);

    running.shutdown().await.unwrap();
}

#[tokio::test]
async fn audio_stream_and_capacity() {
    let dir = tempfile::tempdir().unwrap();
    let (running, _sim) = start(dir.path(), 1).await;
    let addr = running.audio_addr();

    let mut listener = TcpStream::connect(addr).await.unwrap();
    listener.write_all(b"GET /audio.wav HTTP/1.0\r\n\r\n").await.unwrap();
    let head = b"HTTP/1.0 200 OK\r\nAccess-Control-Allow-Origin: *\r\nContent-type: audio/wav\r\n\r\n";
    let mut buf = vec![0u8; head.len() + WAV_HEADER_LEN + 100];
    listener.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf[..head.len()], head);
    assert_eq!(&buf[head.len()..head.len() + 4], b"RIFF");
    assert_eq!(&buf[head.len() + 8..head.len() + 12], b"WAVE");

    // One slot: the next listener is refused.
    let out = request(addr, "GET /audio.wav HTTP/1.0\r\n\r\n").await;
    assert_eq!(
        out,
        "HTTP/1.0 503 Service Unavailable\r\nAccess-Control-Allow-Origin: *\r\n\r\n"
    );

    // Hanging up frees the slot for the next listener.
    drop(listener);
    let mut next = None;
    for _ in 0..100 {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /audio.wav HTTP/1.0\r\n\r\n").await.unwrap();
        let mut status = [0u8; 12];
        stream.read_exact(&mut status).await.unwrap();
        if &status == b"HTTP/1.0 200" {
            next = Some(stream);
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(next.is_some(), "slot never freed");

    running.shutdown().await.unwrap();
}

#[tokio::test]
async fn audio_wrong_path_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let (running, _sim) = start(dir.path(), 1).await;
    assert_eq!(
        request(running.audio_addr(), "GET /index.html HTTP/1.0\r\n\r\n").await,
        "HTTP/1.0 400 Bad Request\r\n\r\n"
    );
    running.shutdown().await.unwrap();
}
