//! Port specifications and built-in port sets

use std::collections::HashMap;
use std::collections::HashSet;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::ScanError;

/// Named built-in port sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortListType {
    Common,
    Quick,
    Web,
    Database,
}

/// Port list with metadata
#[derive(Debug, Clone)]
pub struct PortList {
    pub name: &'static str,
    pub description: &'static str,
    pub ports: Vec<u16>,
}

static PORT_LISTS: Lazy<HashMap<PortListType, PortList>> = Lazy::new(|| {
    let mut lists = HashMap::new();

    lists.insert(PortListType::Common, PortList {
        name: "common",
        description: "Commonly exposed services (default)",
        ports: get_common_ports(),
    });

    lists.insert(PortListType::Quick, PortList {
        name: "quick",
        description: "Reduced common set for a fast pass",
        ports: get_quick_ports(),
    });

    lists.insert(PortListType::Web, PortList {
        name: "web",
        description: "Web servers and related services",
        ports: get_web_ports(),
    });

    lists.insert(PortListType::Database, PortList {
        name: "database",
        description: "Common database ports",
        ports: get_database_ports(),
    });

    lists
});

/// Get port list by type
pub fn get_port_list(list_type: PortListType) -> &'static PortList {
    &PORT_LISTS[&list_type]
}

/// Parse a named port list ("common", "quick", "web", "database")
pub fn parse_port_list(input: &str) -> Option<PortListType> {
    match input.trim().to_lowercase().as_str() {
        "common" | "default" => Some(PortListType::Common),
        "quick" | "fast" => Some(PortListType::Quick),
        "web" | "http" => Some(PortListType::Web),
        "database" | "db" => Some(PortListType::Database),
        _ => None,
    }
}

pub fn get_common_ports() -> Vec<u16> {
    vec![
        21, 22, 23, 25, 53, 80, 110, 135, 139, 143, 443, 993, 995,
        1433, 1521, 3306, 3389, 5432, 5900, 6379, 8080, 8443, 9200, 27017,
    ]
}

pub fn get_quick_ports() -> Vec<u16> {
    vec![
        21, 22, 23, 25, 53, 80, 110, 135, 139, 143, 443, 993, 995,
        1433, 3306, 3389, 5432, 5900, 8080, 8443,
    ]
}

pub fn get_web_ports() -> Vec<u16> {
    vec![
        80, 443,                    // Standard HTTP/HTTPS
        8080, 8443, 8000, 8888,     // Alternative web ports
        3000, 5000, 9000, 9443,
    ]
}

pub fn get_database_ports() -> Vec<u16> {
    vec![
        3306,        // MySQL
        5432,        // PostgreSQL
        1433,        // SQL Server
        1521,        // Oracle
        27017,       // MongoDB
        6379,        // Redis
        9200,        // Elasticsearch
        5984,        // CouchDB
    ]
}

/// Ordered, duplicate-free sequence of ports to probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    ports: Vec<u16>,
}

impl PortSpec {
    /// Build from an explicit sequence, keeping the first occurrence of each port.
    pub fn from_ports(ports: Vec<u16>) -> crate::Result<Self> {
        if ports.contains(&0) {
            return Err(ScanError::PortRangeError("Port 0 is not valid".to_string()));
        }
        Ok(Self { ports: dedup_preserving_order(ports) })
    }

    pub fn from_list(list_type: PortListType) -> Self {
        Self { ports: dedup_preserving_order(get_port_list(list_type).ports.clone()) }
    }

    /// Parse `22,80,443`, `1-1024`, mixtures of both, or a built-in set name.
    pub fn parse(spec: &str) -> crate::Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(ScanError::PortRangeError("Empty port specification".to_string()));
        }

        if let Some(list_type) = parse_port_list(spec) {
            return Ok(Self::from_list(list_type));
        }

        let mut ports = Vec::new();
        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(ScanError::PortRangeError(format!("Empty entry in port list '{}'", spec)));
            }

            if let Some((start, end)) = part.split_once('-') {
                let start = parse_port(start)?;
                let end = parse_port(end)?;
                if start > end {
                    return Err(ScanError::PortRangeError(format!(
                        "Start port {} cannot be greater than end port {}",
                        start, end
                    )));
                }
                ports.extend(start..=end);
            } else {
                ports.push(parse_port(part)?);
            }
        }

        Self::from_ports(ports)
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub fn into_ports(self) -> Vec<u16> {
        self.ports
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

impl Default for PortSpec {
    fn default() -> Self {
        Self::from_list(PortListType::Common)
    }
}

fn parse_port(token: &str) -> crate::Result<u16> {
    let token = token.trim();
    let port: u16 = token
        .parse()
        .map_err(|e| ScanError::PortRangeError(format!("Invalid port '{}': {}", token, e)))?;
    if port == 0 {
        return Err(ScanError::PortRangeError("Port 0 is not valid".to_string()));
    }
    Ok(port)
}

/// Drop repeated ports without reordering the survivors.
pub fn dedup_preserving_order(ports: Vec<u16>) -> Vec<u16> {
    let mut seen = HashSet::with_capacity(ports.len());
    ports.into_iter().filter(|port| seen.insert(*port)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_explicit_list_keeps_order() {
        let spec = PortSpec::parse("80, 22,443").unwrap();
        assert_eq!(spec.ports(), &[80, 22, 443]);
    }

    #[test]
    fn test_parse_range_and_mixture() {
        let spec = PortSpec::parse("8000-8003,22").unwrap();
        assert_eq!(spec.ports(), &[8000, 8001, 8002, 8003, 22]);
    }

    #[test]
    fn test_parse_deduplicates() {
        let spec = PortSpec::parse("22,80,22,79-81").unwrap();
        assert_eq!(spec.ports(), &[22, 80, 79, 81]);
    }

    #[test]
    fn test_parse_named_sets() {
        assert_eq!(PortSpec::parse("common").unwrap().len(), 24);
        assert_eq!(PortSpec::parse("quick").unwrap().len(), 20);
        assert_eq!(PortSpec::parse("WEB").unwrap().ports()[0], 80);
        assert!(PortSpec::default().ports().contains(&27017));
    }

    #[test]
    fn test_parse_rejects_invalid() {
        for bad in ["", "0", "abc", "80,", "90-80", "1-70000", "65536", "-5", "22,,80"] {
            let err = PortSpec::parse(bad).unwrap_err();
            assert!(err.is_fatal(), "{} should be a fatal config error", bad);
        }
    }

    #[test]
    fn test_from_ports_rejects_zero() {
        assert!(PortSpec::from_ports(vec![22, 0]).is_err());
        assert!(PortSpec::from_ports(Vec::new()).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn dedup_keeps_first_occurrence_order(ports in proptest::collection::vec(1u16..200, 0..100)) {
            let deduped = dedup_preserving_order(ports.clone());

            let unique: HashSet<u16> = ports.iter().copied().collect();
            prop_assert_eq!(deduped.len(), unique.len());

            let mut expected = Vec::new();
            for port in &ports {
                if !expected.contains(port) {
                    expected.push(*port);
                }
            }
            prop_assert_eq!(deduped, expected);
        }
    }
}
