//! Network module: probe primitives, the well-known-port table and the
//! host-info / liveness / WHOIS collaborators

pub mod icmp;
pub mod protocol;
pub mod resolver;
pub mod socket;
pub mod whois;

use serde::{Deserialize, Serialize};

pub use socket::{Prober, TcpProber};

/// What a single probe does after the TCP handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeMode {
    /// Connect and close immediately
    ConnectOnly,
    /// Connect, send a line terminator, and collect whatever the peer sends
    CaptureBanner,
}

/// Outcome of one probe. Failures are values here, never errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub reachable: bool,
    pub banner: Vec<u8>,
}

impl ProbeOutcome {
    /// Connect failed, or the banner read errored
    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn reachable() -> Self {
        Self {
            reachable: true,
            banner: Vec::new(),
        }
    }

    pub fn with_banner(banner: Vec<u8>) -> Self {
        Self {
            reachable: true,
            banner,
        }
    }

    pub fn has_banner(&self) -> bool {
        !self.banner.is_empty()
    }
}

/// Port state enumeration. Refused, reset and timed-out connects are all `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortState {
    Open,
    Closed,
}

impl std::fmt::Display for PortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortState::Open => write!(f, "open"),
            PortState::Closed => write!(f, "closed"),
        }
    }
}

/// Scan result for a single port, produced once by the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortResult {
    pub port: u16,
    pub state: PortState,
    pub service: Option<String>,
}

impl PortResult {
    pub fn new(port: u16, state: PortState) -> Self {
        Self {
            port,
            state,
            service: None,
        }
    }

    pub fn with_service(mut self, service: String) -> Self {
        self.service = Some(service);
        self
    }

    pub fn is_open(&self) -> bool {
        self.state == PortState::Open
    }
}
