//! Probe socket tests against real loopback listeners

use hostscope::intelligence::{ServiceDetector, UNKNOWN_VERSION};
use hostscope::network::socket::MAX_BANNER_BYTES;
use hostscope::network::{PortResult, PortState, ProbeMode, Prober, TcpProber};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn prober(connect_ms: u64, banner_ms: u64) -> TcpProber {
    TcpProber::new(Duration::from_millis(connect_ms), Duration::from_millis(banner_ms))
}

/// Listener that writes `banner` to every client and then closes
async fn banner_server(banner: &'static [u8]) -> u16 {
    let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let _ = stream.write_all(banner).await;
            // drain the client's trigger so the close is a FIN, not a reset
            let mut buf = [0u8; 64];
            let _ = tokio::time::timeout(Duration::from_millis(500), stream.read(&mut buf)).await;
        }
    });
    port
}

/// Listener that accepts and then stays silent with the connection open
async fn silent_server() -> u16 {
    let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                let _ = stream.read(&mut buf).await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });
    port
}

/// Listener that writes `banner` and then aborts the connection with a reset
async fn resetting_server(banner: &'static [u8]) -> u16 {
    let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let _ = stream.write_all(banner).await;
            // wait for the trigger so the reset reaches a reader, not the trigger write
            let mut buf = [0u8; 64];
            let _ = tokio::time::timeout(Duration::from_millis(500), stream.read(&mut buf)).await;
            // zero linger turns the close into an RST
            #[allow(deprecated)]
            let _ = stream.set_linger(Some(Duration::ZERO));
            drop(stream);
        }
    });
    port
}

async fn closed_port() -> u16 {
    let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_connect_only_open_port() {
    let port = silent_server().await;
    let outcome = prober(1000, 1000).probe(LOCALHOST, port, ProbeMode::ConnectOnly).await;

    assert!(outcome.reachable);
    assert!(!outcome.has_banner());
}

#[tokio::test]
async fn test_refused_connect_is_unreachable() {
    let port = closed_port().await;
    let outcome = prober(1000, 1000).probe(LOCALHOST, port, ProbeMode::ConnectOnly).await;
    assert!(!outcome.reachable);
}

#[tokio::test]
async fn test_banner_capture() {
    let port = banner_server(b"SSH-2.0-OpenSSH_7.2p2 Ubuntu-4ubuntu2.8\r\n").await;
    let outcome = prober(1000, 2000).probe(LOCALHOST, port, ProbeMode::CaptureBanner).await;

    assert!(outcome.reachable);
    let banner = String::from_utf8_lossy(&outcome.banner);
    assert!(banner.starts_with("SSH-2.0-OpenSSH_7.2p2"));
}

#[tokio::test]
async fn test_reset_during_capture_discards_banner() {
    let port = resetting_server(b"SSH-2.0-OpenSSH_7.2\r\n").await;
    let outcome = prober(1000, 2000).probe(LOCALHOST, port, ProbeMode::CaptureBanner).await;

    assert!(!outcome.reachable);
    assert!(!outcome.has_banner());
}

#[tokio::test]
async fn test_reset_during_capture_yields_unknown_service() {
    let port = resetting_server(b"SSH-2.0-OpenSSH_7.2\r\n").await;
    let detector = ServiceDetector::new(Arc::new(prober(1000, 2000)));

    let record = detector
        .detect(LOCALHOST, &PortResult::new(port, PortState::Open))
        .await;
    assert_eq!(record.version, UNKNOWN_VERSION);
    assert!(record.raw_banner.is_none());
}

#[tokio::test]
async fn test_silent_peer_bounded_by_banner_timeout() {
    let port = silent_server().await;
    let start = Instant::now();
    let outcome = prober(1000, 200).probe(LOCALHOST, port, ProbeMode::CaptureBanner).await;

    assert!(outcome.reachable);
    assert!(outcome.banner.is_empty());
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_banner_capped() {
    static BIG: [u8; 100 * 1024] = [b'A'; 100 * 1024];

    let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let _ = stream.write_all(&BIG).await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    });

    let outcome = prober(1000, 2000).probe(LOCALHOST, port, ProbeMode::CaptureBanner).await;
    assert_eq!(outcome.banner.len(), MAX_BANNER_BYTES);
}

#[tokio::test]
async fn test_unroutable_connect_bounded_by_timeout() {
    // TEST-NET-1: either times out or fails fast, never hangs
    let target = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));
    let start = Instant::now();
    let outcome = prober(300, 1000).probe(target, 80, ProbeMode::ConnectOnly).await;

    assert!(!outcome.reachable);
    assert!(start.elapsed() < Duration::from_secs(2));
}
