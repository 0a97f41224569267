//! Configuration module for the hostscope scanner

use crate::output::OutputFormat;
use crate::ports::PortSpec;
use crate::ScanError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for a scan session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Target host (IP address or hostname)
    pub target: String,

    /// Ports to scan, in the order they should be reported
    pub ports: Vec<u16>,

    /// Timeout for each connect attempt in milliseconds
    pub connect_timeout: u64,

    /// Banner capture window in milliseconds, independent of the connect timeout
    pub banner_timeout: u64,

    /// Maximum number of probes in flight at once (batch size)
    pub concurrency: usize,

    /// Optional report path
    pub output: Option<String>,

    /// Report format; inferred from the output extension when absent
    pub output_format: Option<OutputFormat>,

    /// Skip the liveness collaborator
    pub skip_ping: bool,

    /// Skip the WHOIS collaborator
    pub skip_whois: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            ports: PortSpec::default().into_ports(),
            connect_timeout: 1000,
            banner_timeout: 3000,
            concurrency: 100,
            output: None,
            output_format: None,
            skip_ping: false,
            skip_whois: false,
        }
    }
}

impl ScanConfig {
    /// Create a new scan configuration
    pub fn new(target: String) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    /// Set the ports to scan
    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = ports;
        self
    }

    /// Set the connect timeout (ms)
    pub fn with_connect_timeout(mut self, timeout: u64) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the banner capture timeout (ms)
    pub fn with_banner_timeout(mut self, timeout: u64) -> Self {
        self.banner_timeout = timeout;
        self
    }

    /// Set the concurrency limit
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_output(mut self, output: Option<String>) -> Self {
        self.output = output;
        self
    }

    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.connect_timeout)
    }

    pub fn banner_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.banner_timeout)
    }

    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ScanError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: ScanConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from `~/.hostscope.toml`, falling back to defaults
    pub fn load_default_config() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let config_path = home_dir.join(".hostscope.toml");

        if config_path.exists() {
            match Self::from_toml_file(&config_path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", config_path.display());
                    return config;
                }
                Err(e) => log::warn!("Ignoring {}: {}", config_path.display(), e),
            }
        }

        Self::default()
    }

    /// Validate the configuration. Sessions are only built from a config that passes.
    pub fn validate(&self) -> crate::Result<()> {
        if self.target.trim().is_empty() {
            return Err(ScanError::InvalidTarget("Target cannot be empty".to_string()));
        }

        if self.ports.is_empty() {
            return Err(ScanError::PortRangeError("No ports specified".to_string()));
        }

        if self.ports.contains(&0) {
            return Err(ScanError::PortRangeError("Port 0 is not valid".to_string()));
        }

        if self.connect_timeout == 0 {
            return Err(ScanError::ConfigError("Connect timeout must be greater than 0".to_string()));
        }

        if self.banner_timeout == 0 {
            return Err(ScanError::ConfigError("Banner timeout must be greater than 0".to_string()));
        }

        if self.concurrency == 0 {
            return Err(ScanError::ConfigError("Concurrency must be greater than 0".to_string()));
        }

        Ok(())
    }
}
