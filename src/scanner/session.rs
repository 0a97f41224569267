//! Scan session: runs the pipeline for one target and hands back a finished result
//!
//! Stage order is fixed: host info, liveness, port sweep, service detection,
//! vulnerability matching, WHOIS. Each stage consumes the previous stage's
//! output. Collaborator stages never abort the session; configuration errors
//! are reported before any network activity.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::ScanConfig;
use crate::intelligence::{BannerParser, ServiceDetector, VulnerabilityRuleEngine};
use crate::network::icmp::{LivenessSource, PingProbe};
use crate::network::resolver::{HostInfoSource, HostResolver};
use crate::network::whois::{WhoisClient, WhoisSource};
use crate::network::{Prober, TcpProber};
use crate::scanner::engine::ScanScheduler;
use crate::scanner::{duration_ms, ScanResult, Target};

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    HostInfo,
    Liveness,
    PortScan,
    ServiceDetection,
    VulnerabilityScan,
    Whois,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::HostInfo => "Gathering host information",
            Stage::Liveness => "Checking host liveness",
            Stage::PortScan => "Scanning ports",
            Stage::ServiceDetection => "Detecting services",
            Stage::VulnerabilityScan => "Checking for vulnerabilities",
            Stage::Whois => "Fetching WHOIS information",
        };
        write!(f, "{}", name)
    }
}

/// Progress notification emitted while a session runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started(Stage),
    Finished { stage: Stage, summary: String },
}

type Observer = Box<dyn Fn(SessionEvent) + Send + Sync>;

/// One scan of one target
pub struct ScanSession<P: Prober = TcpProber> {
    config: ScanConfig,
    prober: Arc<P>,
    host_source: Box<dyn HostInfoSource>,
    liveness: Option<Box<dyn LivenessSource>>,
    whois: Option<Box<dyn WhoisSource>>,
    parser: BannerParser,
    rules: VulnerabilityRuleEngine,
    observer: Option<Observer>,
}

impl ScanSession<TcpProber> {
    /// Session with the TCP prober and the default collaborators.
    pub fn new(config: ScanConfig) -> crate::Result<Self> {
        let prober = TcpProber::new(
            config.connect_timeout_duration(),
            config.banner_timeout_duration(),
        );
        Self::with_prober(config, Arc::new(prober))
    }
}

impl<P: Prober> ScanSession<P> {
    /// Validates the configuration; nothing touches the network here.
    pub fn with_prober(config: ScanConfig, prober: Arc<P>) -> crate::Result<Self> {
        config.validate()?;

        let liveness: Option<Box<dyn LivenessSource>> = if config.skip_ping {
            None
        } else {
            Some(Box::new(PingProbe::default()))
        };
        let whois: Option<Box<dyn WhoisSource>> = if config.skip_whois {
            None
        } else {
            Some(Box::new(WhoisClient::default()))
        };

        Ok(Self {
            config,
            prober,
            host_source: Box::new(HostResolver::new()),
            liveness,
            whois,
            parser: BannerParser::new(),
            rules: VulnerabilityRuleEngine::new(),
            observer: None,
        })
    }

    pub fn with_host_source(mut self, source: Box<dyn HostInfoSource>) -> Self {
        self.host_source = source;
        self
    }

    /// `None` disables the liveness stage.
    pub fn with_liveness(mut self, source: Option<Box<dyn LivenessSource>>) -> Self {
        self.liveness = source;
        self
    }

    /// `None` disables the WHOIS stage.
    pub fn with_whois(mut self, source: Option<Box<dyn WhoisSource>>) -> Self {
        self.whois = source;
        self
    }

    pub fn with_parser(mut self, parser: BannerParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_rules(mut self, rules: VulnerabilityRuleEngine) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_observer(mut self, observer: impl Fn(SessionEvent) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    fn notify(&self, event: SessionEvent) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }

    fn finished(&self, stage: Stage, summary: String) {
        self.notify(SessionEvent::Finished { stage, summary });
    }

    /// Run every stage and return the finished result.
    pub async fn run(self) -> ScanResult {
        let start_time = Instant::now();
        let target_text = self.config.target.trim().to_string();
        log::info!("Starting scan of {}", target_text);

        self.notify(SessionEvent::Started(Stage::HostInfo));
        let host_info = self.host_source.host_info(&target_text).await;
        self.finished(Stage::HostInfo, format!("Addresses: {}", host_info.addresses.join(", ")));

        let target = Target::new(target_text.clone(), host_info.addresses.clone());
        let scan_addr = host_info.primary_ip();
        let mut result = ScanResult::new(target, host_info);

        if let Some(liveness) = &self.liveness {
            self.notify(SessionEvent::Started(Stage::Liveness));
            let info = liveness.liveness(&target_text).await;
            let summary = match (&info.rtt, info.alive) {
                (Some(rtt), _) => format!("Host is alive ({:.2} ms avg)", rtt.avg),
                (None, true) => "Host is alive".to_string(),
                (None, false) => "Host did not answer ping".to_string(),
            };
            result.network_info.ping = Some(info);
            self.finished(Stage::Liveness, summary);
        }

        self.notify(SessionEvent::Started(Stage::PortScan));
        match scan_addr {
            Some(addr) => self.sweep_ports(addr, &mut result).await,
            None => log::warn!("No usable address for {}; skipping port scan", target_text),
        }
        self.finished(
            Stage::PortScan,
            format!("Found {} open ports", result.open_ports.len()),
        );

        if let Some(addr) = scan_addr.filter(|_| !result.open_ports.is_empty()) {
            self.notify(SessionEvent::Started(Stage::ServiceDetection));
            let detector = ServiceDetector::new(self.prober.clone()).with_parser(self.parser);
            result.services = detector.detect_all(addr, &result.open_ports).await;
            let identified = result.services.iter().filter(|s| s.has_version()).count();
            self.finished(
                Stage::ServiceDetection,
                format!("Identified {} of {} services", identified, result.services.len()),
            );
        }

        self.notify(SessionEvent::Started(Stage::VulnerabilityScan));
        result.vulnerabilities = result
            .services
            .iter()
            .flat_map(|record| self.rules.evaluate(record))
            .collect();
        self.finished(
            Stage::VulnerabilityScan,
            format!("Found {} potential vulnerabilities", result.vulnerabilities.len()),
        );

        if let Some(whois) = &self.whois {
            self.notify(SessionEvent::Started(Stage::Whois));
            result.network_info.whois = whois.whois(&target_text).await;
            let summary = if result.network_info.whois.is_some() {
                "WHOIS information retrieved"
            } else {
                "WHOIS information unavailable"
            };
            self.finished(Stage::Whois, summary.to_string());
        }

        result.stats.duration_ms = duration_ms(start_time.elapsed());
        log::info!(
            "Scan of {} finished in {} ms: {} open, {} findings",
            target_text,
            result.stats.duration_ms,
            result.open_ports.len(),
            result.vulnerabilities.len()
        );
        result
    }

    async fn sweep_ports(&self, addr: IpAddr, result: &mut ScanResult) {
        let scheduler = ScanScheduler::new(self.prober.clone(), self.config.concurrency);
        let (sweep, stats) = scheduler.sweep(addr, &self.config.ports).await;
        result.open_ports = sweep.into_iter().filter(|r| r.is_open()).collect();
        result.stats = stats;
    }
}
