//! Per-port service detection: banner capture followed by banner parsing
//!
//! Detection runs one open port at a time. Worst-case latency is therefore
//! `open ports x banner timeout`, accepted in exchange for keeping deep
//! inspection separate from the wide connect sweep.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use super::banner::{BannerParser, UNKNOWN_VERSION};
use crate::network::protocol::ServiceDatabase;
use crate::network::{PortResult, ProbeMode, Prober};

/// Service fingerprint for one open port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub port: u16,
    /// Name from the well-known-port table
    pub service: String,
    pub version: String,
    /// Product token taken from the banner, e.g. "OpenSSH 7.2p2"
    pub product: Option<String>,
    pub raw_banner: Option<String>,
    pub details: BTreeMap<String, String>,
}

impl ServiceRecord {
    /// Record for a port that produced no usable banner
    pub fn unknown(port: u16, service: impl Into<String>) -> Self {
        Self {
            port,
            service: service.into(),
            version: UNKNOWN_VERSION.to_string(),
            product: None,
            raw_banner: None,
            details: BTreeMap::new(),
        }
    }

    pub fn with_version(mut self, version: String) -> Self {
        self.version = version;
        self
    }

    pub fn with_product(mut self, product: Option<String>) -> Self {
        self.product = product;
        self
    }

    pub fn has_version(&self) -> bool {
        self.version != UNKNOWN_VERSION
    }

    /// Texts the rule engine may read a version from
    pub fn version_candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.version.as_str()).chain(self.product.as_deref())
    }
}

/// Banner-grabbing service detector
pub struct ServiceDetector<P: Prober> {
    prober: Arc<P>,
    parser: BannerParser,
    service_db: ServiceDatabase,
}

impl<P: Prober> ServiceDetector<P> {
    pub fn new(prober: Arc<P>) -> Self {
        Self {
            prober,
            parser: BannerParser::new(),
            service_db: ServiceDatabase::new(),
        }
    }

    pub fn with_parser(mut self, parser: BannerParser) -> Self {
        self.parser = parser;
        self
    }

    /// Fingerprint one open port
    pub async fn detect(&self, addr: IpAddr, open_port: &PortResult) -> ServiceRecord {
        let port = open_port.port;
        let service = open_port
            .service
            .clone()
            .unwrap_or_else(|| self.service_db.service_name(port).to_string());

        let outcome = self.prober.probe(addr, port, ProbeMode::CaptureBanner).await;
        if !outcome.reachable {
            log::debug!("{}:{} unreachable during banner capture", addr, port);
            return ServiceRecord::unknown(port, service);
        }

        let banner = String::from_utf8_lossy(&outcome.banner).trim().to_string();
        if banner.is_empty() {
            log::debug!("{}:{} sent no banner", addr, port);
            return ServiceRecord::unknown(port, service);
        }

        let parsed = self.parser.parse(&banner, port);
        log::debug!("{}:{} -> {} ({})", addr, port, service, parsed.version);

        ServiceRecord {
            port,
            service,
            product: parsed.product().map(str::to_string),
            version: parsed.version,
            raw_banner: Some(banner),
            details: parsed.details,
        }
    }

    /// Fingerprint open ports sequentially, preserving their order.
    pub async fn detect_all(&self, addr: IpAddr, open_ports: &[PortResult]) -> Vec<ServiceRecord> {
        let mut records = Vec::with_capacity(open_ports.len());
        for open_port in open_ports.iter().filter(|p| p.is_open()) {
            records.push(self.detect(addr, open_port).await);
        }
        records
    }
}
