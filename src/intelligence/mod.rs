//! Service intelligence: banner fingerprinting, service detection and
//! known-vulnerability matching

pub mod banner;
pub mod service_detection;
pub mod vulnerability;

pub use banner::{BannerParser, BannerRule, ParsedBanner, UNKNOWN_VERSION};
pub use service_detection::{ServiceDetector, ServiceRecord};
pub use vulnerability::{
    Finding, FindingTemplate, Severity, VersionPredicate, VersionToken, VulnerabilityRule,
    VulnerabilityRuleEngine,
};
