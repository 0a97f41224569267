//! Liveness collaborator: ICMP echo via the system `ping` utility
//!
//! Raw ICMP sockets need elevated privileges, so the probe delegates to the
//! setuid `ping` binary and parses its summary line. The result is purely
//! informational and never decides whether port scanning proceeds.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Round-trip time statistics in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RttStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Liveness result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LivenessInfo {
    pub alive: bool,
    pub rtt: Option<RttStats>,
}

#[async_trait]
pub trait LivenessSource: Send + Sync {
    /// Never fails: errors are reported as `alive = false` without statistics.
    async fn liveness(&self, target: &str) -> LivenessInfo;
}

// linux: "rtt min/avg/max/mdev = 0.031/0.042/0.055/0.009 ms"
// bsd/macOS: "round-trip min/avg/max/stddev = 0.031/0.042/0.055/0.009 ms"
static RTT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"min/avg/max(?:/\w+)?\s*=\s*([\d.]+)/([\d.]+)/([\d.]+)").expect("static regex")
});

/// Ping prober
#[derive(Debug, Clone)]
pub struct PingProbe {
    count: u32,
    timeout: Duration,
}

impl Default for PingProbe {
    fn default() -> Self {
        Self {
            count: 3,
            timeout: Duration::from_secs(5),
        }
    }
}

impl PingProbe {
    pub fn new(count: u32, timeout: Duration) -> Self {
        Self {
            count: count.max(1),
            timeout,
        }
    }

    pub async fn probe(&self, target: &str) -> crate::Result<LivenessInfo> {
        let child = Command::new("ping")
            .arg("-c")
            .arg(self.count.to_string())
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| crate::ScanError::CollaboratorError(format!("ping {} timed out", target)))??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(LivenessInfo {
            alive: output.status.success(),
            rtt: parse_rtt_summary(&stdout),
        })
    }
}

#[async_trait]
impl LivenessSource for PingProbe {
    async fn liveness(&self, target: &str) -> LivenessInfo {
        match self.probe(target).await {
            Ok(info) => {
                if info.alive {
                    log::info!("Host {} is alive", target);
                } else {
                    log::info!("Host {} is not responding to ping", target);
                }
                info
            }
            Err(e) => {
                log::warn!("Ping failed: {}", e);
                LivenessInfo::default()
            }
        }
    }
}

/// Extract min/avg/max from a `ping` summary
pub fn parse_rtt_summary(output: &str) -> Option<RttStats> {
    let caps = RTT_LINE.captures(output)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<f64>().ok());

    Some(RttStats {
        min: field(1)?,
        avg: field(2)?,
        max: field(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_linux_summary() {
        let out = "3 packets transmitted, 3 received, 0% packet loss, time 2003ms\n\
                   rtt min/avg/max/mdev = 0.031/0.042/0.055/0.009 ms\n";
        let rtt = parse_rtt_summary(out).unwrap();
        assert_eq!(rtt.min, 0.031);
        assert_eq!(rtt.avg, 0.042);
        assert_eq!(rtt.max, 0.055);
    }

    #[test]
    fn test_parse_bsd_summary() {
        let out = "round-trip min/avg/max/stddev = 10.1/12.5/15.0/1.2 ms";
        let rtt = parse_rtt_summary(out).unwrap();
        assert_eq!(rtt.min, 10.1);
        assert_eq!(rtt.max, 15.0);
    }

    #[test]
    fn test_parse_without_summary() {
        assert_eq!(parse_rtt_summary("100% packet loss"), None);
        assert_eq!(parse_rtt_summary(""), None);
    }
}
