//! TCP probe socket: one bounded connect, optionally followed by a banner read

use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};

use super::{ProbeMode, ProbeOutcome};

/// Largest banner kept per probe
pub const MAX_BANNER_BYTES: usize = 64 * 1024;

/// Trigger sent to services that wait for the client to speak first
const BANNER_TRIGGER: &[u8] = b"\r\n";

/// A single bounded-duration network operation against one (host, port) pair.
///
/// Implementations must resolve every failure into the returned outcome.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, addr: IpAddr, port: u16, mode: ProbeMode) -> ProbeOutcome;
}

/// TCP connect prober with separate connect and banner-capture budgets
#[derive(Debug, Clone)]
pub struct TcpProber {
    connect_timeout: Duration,
    banner_timeout: Duration,
}

impl TcpProber {
    pub fn new(connect_timeout: Duration, banner_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            banner_timeout,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn banner_timeout(&self) -> Duration {
        self.banner_timeout
    }

    async fn connect(&self, addr: SocketAddr) -> Option<TcpStream> {
        match timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Some(stream),
            Ok(Err(e)) => {
                log::trace!("connect {} failed: {}", addr, e);
                None
            }
            Err(_) => {
                log::trace!("connect {} timed out after {:?}", addr, self.connect_timeout);
                None
            }
        }
    }

    /// Read until the peer closes or the capture window elapses.
    ///
    /// A read error (such as a reset) discards anything already received.
    async fn capture(&self, stream: &mut TcpStream) -> Option<Vec<u8>> {
        let mut banner = Vec::new();
        let mut buf = [0u8; 4096];
        let deadline = Instant::now() + self.banner_timeout;

        if let Err(e) = stream.write_all(BANNER_TRIGGER).await {
            log::trace!("banner trigger write failed: {}", e);
        }

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            match timeout(remaining, stream.read(&mut buf)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    let room = MAX_BANNER_BYTES - banner.len();
                    banner.extend_from_slice(&buf[..n.min(room)]);
                    if banner.len() >= MAX_BANNER_BYTES {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    log::trace!("banner read failed after {} bytes: {}", banner.len(), e);
                    return None;
                }
                Err(_) => break,
            }
        }

        Some(banner)
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, addr: IpAddr, port: u16, mode: ProbeMode) -> ProbeOutcome {
        let socket_addr = SocketAddr::new(addr, port);

        // The stream is dropped (and the socket closed) on every path out of this block.
        let Some(mut stream) = self.connect(socket_addr).await else {
            return ProbeOutcome::unreachable();
        };

        match mode {
            ProbeMode::ConnectOnly => ProbeOutcome::reachable(),
            ProbeMode::CaptureBanner => match self.capture(&mut stream).await {
                Some(banner) => {
                    let _ = stream.shutdown().await;
                    ProbeOutcome::with_banner(banner)
                }
                None => ProbeOutcome::unreachable(),
            },
        }
    }
}
