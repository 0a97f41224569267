//! Well-known port to service name mapping

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Name reported for ports missing from the table
pub const UNKNOWN_SERVICE: &str = "Unknown";

static TCP_SERVICES: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    let mut tcp_services = HashMap::new();

    tcp_services.insert(21, "FTP");
    tcp_services.insert(22, "SSH");
    tcp_services.insert(23, "Telnet");
    tcp_services.insert(25, "SMTP");
    tcp_services.insert(53, "DNS");
    tcp_services.insert(80, "HTTP");
    tcp_services.insert(110, "POP3");
    tcp_services.insert(135, "RPC");
    tcp_services.insert(139, "NetBIOS");
    tcp_services.insert(143, "IMAP");
    tcp_services.insert(443, "HTTPS");
    tcp_services.insert(993, "IMAPS");
    tcp_services.insert(995, "POP3S");
    tcp_services.insert(1433, "MSSQL");
    tcp_services.insert(1521, "Oracle");
    tcp_services.insert(3306, "MySQL");
    tcp_services.insert(3389, "RDP");
    tcp_services.insert(5432, "PostgreSQL");
    tcp_services.insert(5900, "VNC");
    tcp_services.insert(6379, "Redis");
    tcp_services.insert(8080, "HTTP-Alt");
    tcp_services.insert(8443, "HTTPS-Alt");
    tcp_services.insert(9200, "Elasticsearch");
    tcp_services.insert(27017, "MongoDB");

    tcp_services
});

/// Read-only view over the process-wide well-known-port table
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceDatabase;

impl ServiceDatabase {
    pub fn new() -> Self {
        Self
    }

    pub fn get_tcp_service(&self, port: u16) -> Option<&'static str> {
        TCP_SERVICES.get(&port).copied()
    }

    /// Table lookup with the `"Unknown"` fallback
    pub fn service_name(&self, port: u16) -> &'static str {
        self.get_tcp_service(port).unwrap_or(UNKNOWN_SERVICE)
    }

    pub fn len(&self) -> usize {
        TCP_SERVICES.len()
    }

    pub fn is_empty(&self) -> bool {
        TCP_SERVICES.is_empty()
    }
}
