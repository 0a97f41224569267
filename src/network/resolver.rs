//! Host-info collaborator: hostname resolution

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Addresses a target resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub hostname: String,
    pub addresses: Vec<String>,
    pub family: u8,
    /// False when resolution failed and the record was synthesised from the target text
    pub resolved: bool,
}

impl HostInfo {
    /// Fallback record used when resolution fails: the target itself is the address.
    pub fn degraded(target: &str) -> Self {
        let family = match target.parse::<IpAddr>() {
            Ok(IpAddr::V4(_)) => 4,
            _ => 6,
        };

        Self {
            hostname: target.to_string(),
            addresses: vec![target.to_string()],
            family,
            resolved: false,
        }
    }

    /// First address that parses as an IP, IPv4 preferred
    pub fn primary_ip(&self) -> Option<IpAddr> {
        let parsed: Vec<IpAddr> = self.addresses.iter().filter_map(|a| a.parse().ok()).collect();
        parsed
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| parsed.first())
            .copied()
    }
}

#[async_trait]
pub trait HostInfoSource: Send + Sync {
    /// Never fails: errors degrade to [`HostInfo::degraded`].
    async fn host_info(&self, target: &str) -> HostInfo;
}

/// System resolver backed by `tokio::net::lookup_host`
#[derive(Debug, Clone, Default)]
pub struct HostResolver;

impl HostResolver {
    pub fn new() -> Self {
        Self
    }

    pub async fn resolve(&self, target: &str) -> crate::Result<HostInfo> {
        if let Ok(ip) = target.parse::<IpAddr>() {
            return Ok(HostInfo {
                hostname: target.to_string(),
                addresses: vec![ip.to_string()],
                family: if ip.is_ipv4() { 4 } else { 6 },
                resolved: true,
            });
        }

        let addrs = tokio::net::lookup_host((target, 0))
            .await
            .map_err(|e| crate::ScanError::CollaboratorError(format!("Failed to resolve {}: {}", target, e)))?;

        let mut addresses: Vec<String> = Vec::new();
        let mut first_family = None;
        for addr in addrs {
            let ip = addr.ip();
            first_family.get_or_insert(if ip.is_ipv4() { 4 } else { 6 });
            let text = ip.to_string();
            if !addresses.contains(&text) {
                addresses.push(text);
            }
        }

        let family = first_family.ok_or_else(|| {
            crate::ScanError::CollaboratorError(format!("No IP addresses found for hostname: {}", target))
        })?;

        Ok(HostInfo {
            hostname: target.to_string(),
            addresses,
            family,
            resolved: true,
        })
    }
}

#[async_trait]
impl HostInfoSource for HostResolver {
    async fn host_info(&self, target: &str) -> HostInfo {
        match self.resolve(target).await {
            Ok(info) => {
                log::info!("Resolved {} to {}", target, info.addresses.join(", "));
                info
            }
            Err(e) => {
                log::warn!("{}; continuing with the target as given", e);
                HostInfo::degraded(target)
            }
        }
    }
}
