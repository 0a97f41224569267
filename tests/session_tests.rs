//! End-to-end session tests with stub collaborators

use async_trait::async_trait;
use hostscope::config::ScanConfig;
use hostscope::intelligence::Severity;
use hostscope::network::icmp::{LivenessInfo, LivenessSource, RttStats};
use hostscope::network::resolver::{HostInfo, HostInfoSource};
use hostscope::network::whois::WhoisSource;
use hostscope::network::{ProbeMode, ProbeOutcome, Prober};
use hostscope::scanner::ScanSession;
use hostscope::ScanError;
use serde_json::json;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Canned responses per port; anything else is closed
struct ScriptedHost {
    banners: HashMap<u16, &'static [u8]>,
    probes: AtomicUsize,
}

impl ScriptedHost {
    fn new(banners: &[(u16, &'static [u8])]) -> Self {
        Self {
            banners: banners.iter().copied().collect(),
            probes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Prober for ScriptedHost {
    async fn probe(&self, _addr: IpAddr, port: u16, mode: ProbeMode) -> ProbeOutcome {
        self.probes.fetch_add(1, Ordering::SeqCst);
        match (self.banners.get(&port), mode) {
            (Some(_), ProbeMode::ConnectOnly) => ProbeOutcome::reachable(),
            (Some(banner), ProbeMode::CaptureBanner) => ProbeOutcome::with_banner(banner.to_vec()),
            (None, _) => ProbeOutcome::unreachable(),
        }
    }
}

struct StaticHost(&'static str);

#[async_trait]
impl HostInfoSource for StaticHost {
    async fn host_info(&self, target: &str) -> HostInfo {
        HostInfo {
            hostname: target.to_string(),
            addresses: vec![self.0.to_string()],
            family: 4,
            resolved: true,
        }
    }
}

struct UnresolvableHost;

#[async_trait]
impl HostInfoSource for UnresolvableHost {
    async fn host_info(&self, target: &str) -> HostInfo {
        HostInfo::degraded(target)
    }
}

struct AliveHost;

#[async_trait]
impl LivenessSource for AliveHost {
    async fn liveness(&self, _target: &str) -> LivenessInfo {
        LivenessInfo {
            alive: true,
            rtt: Some(RttStats {
                min: 0.1,
                max: 0.3,
                avg: 0.2,
            }),
        }
    }
}

struct FailingWhois;

#[async_trait]
impl WhoisSource for FailingWhois {
    async fn whois(&self, _target: &str) -> Option<serde_json::Value> {
        None
    }
}

struct FixedWhois;

#[async_trait]
impl WhoisSource for FixedWhois {
    async fn whois(&self, target: &str) -> Option<serde_json::Value> {
        Some(json!({ "domain": target, "registrar": "Example Registrar" }))
    }
}

fn config(target: &str, ports: Vec<u16>) -> ScanConfig {
    ScanConfig::new(target.to_string()).with_ports(ports)
}

#[tokio::test]
async fn test_full_pipeline_produces_findings() {
    let host = Arc::new(ScriptedHost::new(&[
        (21, b"220 (vsFTPd 3.0.3)\r\n"),
        (22, b"SSH-2.0-OpenSSH_7.2p2 Ubuntu-4ubuntu2.8\r\n"),
        (80, b"HTTP/1.1 400 Bad Request\r\nServer: Apache/2.2.15 (CentOS)\r\n\r\n"),
    ]));

    let result = ScanSession::with_prober(config("scanme.local", vec![80, 22, 443, 21]), host)
        .unwrap()
        .with_host_source(Box::new(StaticHost("10.0.0.5")))
        .with_liveness(Some(Box::new(AliveHost)))
        .with_whois(Some(Box::new(FixedWhois)))
        .run()
        .await;

    assert_eq!(result.open_port_numbers(), vec![80, 22, 21]);
    assert_eq!(result.services.len(), 3);

    let ssh = result.service_for(22).unwrap();
    assert_eq!(ssh.version, "SSH 2.0");
    assert_eq!(ssh.product.as_deref(), Some("OpenSSH 7.2p2"));

    let http = result.service_for(80).unwrap();
    assert_eq!(http.version, "Apache/2.2.15 (CentOS)");

    let ids: Vec<(u16, &str, Severity)> = result
        .vulnerabilities
        .iter()
        .map(|f| (f.port, f.identifier.as_str(), f.severity))
        .collect();
    assert_eq!(
        ids,
        vec![
            (80, "CVE-2017-15715", Severity::High),
            (22, "CVE-2018-15473", Severity::Medium),
            (21, "N/A", Severity::Info),
        ]
    );

    assert_eq!(result.network_info.ping.as_ref().map(|p| p.alive), Some(true));
    assert_eq!(
        result.network_info.whois.as_ref().and_then(|w| w.get("registrar")).and_then(|r| r.as_str()),
        Some("Example Registrar")
    );
    assert_eq!(result.stats.ports_scanned, 4);
    assert_eq!(result.stats.closed, 1);
}

#[tokio::test]
async fn test_collaborator_failures_do_not_abort() {
    let host = Arc::new(ScriptedHost::new(&[(22, b"SSH-2.0-OpenSSH_8.9p1\r\n")]));

    let result = ScanSession::with_prober(config("10.0.0.5", vec![22]), host)
        .unwrap()
        .with_host_source(Box::new(StaticHost("10.0.0.5")))
        .with_liveness(None)
        .with_whois(Some(Box::new(FailingWhois)))
        .run()
        .await;

    assert_eq!(result.open_port_numbers(), vec![22]);
    assert!(result.vulnerabilities.is_empty());
    assert!(result.network_info.ping.is_none());
    assert!(result.network_info.whois.is_none());
}

#[tokio::test]
async fn test_no_open_ports_is_a_valid_result() {
    let host = Arc::new(ScriptedHost::new(&[]));

    let result = ScanSession::with_prober(config("10.0.0.5", vec![1, 2, 3]), host.clone())
        .unwrap()
        .with_host_source(Box::new(StaticHost("10.0.0.5")))
        .with_liveness(None)
        .with_whois(None)
        .run()
        .await;

    assert!(result.open_ports.is_empty());
    assert!(result.services.is_empty());
    assert!(result.vulnerabilities.is_empty());
    // connect sweep only; no banner probes
    assert_eq!(host.probes.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_unresolvable_target_skips_probing() {
    let host = Arc::new(ScriptedHost::new(&[(80, b"")]));

    let result = ScanSession::with_prober(config("no-such-host.invalid", vec![80]), host.clone())
        .unwrap()
        .with_host_source(Box::new(UnresolvableHost))
        .with_liveness(None)
        .with_whois(None)
        .run()
        .await;

    assert!(!result.host_info.resolved);
    assert!(result.open_ports.is_empty());
    assert_eq!(host.probes.load(Ordering::SeqCst), 0);
}

#[test]
fn test_configuration_errors_before_network() {
    let host = Arc::new(ScriptedHost::new(&[]));

    let zero_port = ScanSession::with_prober(config("10.0.0.5", vec![0, 22]), host.clone()).err();
    assert!(matches!(zero_port, Some(ScanError::PortRangeError(_))));

    let no_timeout = ScanSession::with_prober(
        config("10.0.0.5", vec![22]).with_connect_timeout(0),
        host.clone(),
    )
    .err();
    assert!(matches!(no_timeout, Some(ScanError::ConfigError(_))));

    assert_eq!(host.probes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_real_loopback_banner() {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let _ = stream.write_all(b"SSH-2.0-OpenSSH_9.6\r\n").await;
            let mut buf = [0u8; 64];
            let _ = tokio::time::timeout(Duration::from_millis(500), stream.read(&mut buf)).await;
        }
    });

    let mut config = config("127.0.0.1", vec![port])
        .with_connect_timeout(500)
        .with_banner_timeout(1000);
    config.skip_ping = true;
    config.skip_whois = true;

    let result = tokio::time::timeout(Duration::from_secs(10), ScanSession::new(config).unwrap().run())
        .await
        .unwrap();

    assert_eq!(result.open_port_numbers(), vec![port]);
    let record = result.service_for(port).unwrap();
    assert_eq!(record.version, "SSH 2.0");
    assert_eq!(record.raw_banner.as_deref(), Some("SSH-2.0-OpenSSH_9.6"));
}
