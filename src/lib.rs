//! hostscope - single-host reconnaissance
//!
//! Resolves a target, sweeps a port list with bounded concurrency, grabs and
//! fingerprints banners on open ports and matches the fingerprints against a
//! small table of known vulnerabilities.

pub mod config;
pub mod error;
pub mod intelligence;
pub mod network;
pub mod output;
pub mod ports;
pub mod scanner;

// Re-export commonly used types
pub use config::ScanConfig;
pub use error::ScanError;
pub use intelligence::{BannerParser, Finding, ServiceDetector, ServiceRecord, VulnerabilityRuleEngine};
pub use network::{PortResult, PortState, ProbeMode, ProbeOutcome, Prober, TcpProber};
pub use output::{OutputConfig, OutputFormat, OutputManager};
pub use ports::PortSpec;
pub use scanner::{ScanResult, ScanScheduler, ScanSession};

pub type Result<T> = std::result::Result<T, ScanError>;
