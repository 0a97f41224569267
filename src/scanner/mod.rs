//! Scanner module: scan scheduling, session orchestration and the result aggregate

pub mod engine;
pub mod session;

use crate::intelligence::{Finding, ServiceRecord};
use crate::network::icmp::LivenessInfo;
use crate::network::resolver::HostInfo;
use crate::network::PortResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

pub use engine::ScanScheduler;
pub use session::{ScanSession, SessionEvent, Stage};

/// Scan target, fixed at session start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    host: String,
    resolved_addresses: Vec<String>,
}

impl Target {
    pub fn new(host: String, resolved_addresses: Vec<String>) -> Self {
        Self {
            host,
            resolved_addresses,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn resolved_addresses(&self) -> &[String] {
        &self.resolved_addresses
    }
}

/// Information supplied by the external collaborators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub ping: Option<LivenessInfo>,
    pub whois: Option<serde_json::Value>,
}

/// Scan statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub ports_scanned: usize,
    pub open: usize,
    pub closed: usize,
    pub batches: usize,
    pub duration_ms: u64,
}

/// Complete scan result. Built by the session, then handed over unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub target: Target,
    pub timestamp: DateTime<Utc>,
    pub host_info: HostInfo,
    /// Open ports only, in port-spec order
    pub open_ports: Vec<PortResult>,
    /// One record per open port, same order
    pub services: Vec<ServiceRecord>,
    pub vulnerabilities: Vec<Finding>,
    pub network_info: NetworkInfo,
    pub stats: ScanStats,
}

impl ScanResult {
    pub fn new(target: Target, host_info: HostInfo) -> Self {
        Self {
            target,
            timestamp: Utc::now(),
            host_info,
            open_ports: Vec::new(),
            services: Vec::new(),
            vulnerabilities: Vec::new(),
            network_info: NetworkInfo::default(),
            stats: ScanStats::default(),
        }
    }

    pub fn open_port_numbers(&self) -> Vec<u16> {
        self.open_ports.iter().map(|p| p.port).collect()
    }

    pub fn service_for(&self, port: u16) -> Option<&ServiceRecord> {
        self.services.iter().find(|s| s.port == port)
    }
}

/// Consecutive slice of the port sequence probed together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanBatch {
    pub ports: Vec<u16>,
    pub target: IpAddr,
    pub batch_id: usize,
}

impl ScanBatch {
    pub fn new(ports: Vec<u16>, target: IpAddr, batch_id: usize) -> Self {
        Self {
            ports,
            target,
            batch_id,
        }
    }

    pub fn size(&self) -> usize {
        self.ports.len()
    }
}

/// Split ports into consecutive batches of at most `batch_size` (clamped to 1).
pub fn create_batches(ports: &[u16], target: IpAddr, batch_size: usize) -> Vec<ScanBatch> {
    ports
        .chunks(batch_size.max(1))
        .enumerate()
        .map(|(id, chunk)| ScanBatch::new(chunk.to_vec(), target, id))
        .collect()
}

/// Elapsed milliseconds, saturating at `u64::MAX`
pub(crate) fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
