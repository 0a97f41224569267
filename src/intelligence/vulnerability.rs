//! Static vulnerability rule table and its evaluator
//!
//! Unlike banner parsing, every rule is evaluated: one service can produce
//! several findings. Numeric version checks read the leading `major.minor` of
//! the first version token as a decimal number, so `7.10` reads as `7.1` and
//! patch levels are ignored. When no token exists the rule is skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::service_detection::ServiceRecord;

/// Identifier used for advisories without a CVE
pub const NO_IDENTIFIER: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "Info"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
        }
    }
}

/// One vulnerability or advisory attached to a detected service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub port: u16,
    pub service: String,
    pub identifier: String,
    pub severity: Severity,
    pub description: String,
    pub remediation: String,
}

/// Shape of the numeric token a version check looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionToken {
    /// `major.minor`
    MajorMinor,
    /// `major.minor.patch`; shorter versions skip the rule
    MajorMinorPatch,
}

impl VersionToken {
    fn pattern(self) -> &'static Regex {
        match self {
            VersionToken::MajorMinor => &MAJOR_MINOR,
            VersionToken::MajorMinorPatch => &MAJOR_MINOR_PATCH,
        }
    }
}

/// Which versions a rule applies to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VersionPredicate {
    /// Any version text, including "Unknown"
    Any,
    /// Version text mentions `product` and its leading version number is below `below`
    ProductBelow {
        product: &'static str,
        token: VersionToken,
        below: f64,
    },
}

impl VersionPredicate {
    pub fn matches(&self, version: &str) -> bool {
        match *self {
            VersionPredicate::Any => true,
            VersionPredicate::ProductBelow { product, token, below } => {
                if !version.contains(product) {
                    return false;
                }
                match leading_version(version, token) {
                    Some(found) => found < below,
                    None => false,
                }
            }
        }
    }
}

/// Fixed text of a finding; port and service come from the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindingTemplate {
    pub identifier: &'static str,
    pub severity: Severity,
    pub description: &'static str,
    pub remediation: &'static str,
}

/// `(service predicate, version predicate, finding template)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VulnerabilityRule {
    pub service: &'static str,
    pub version: VersionPredicate,
    pub finding: FindingTemplate,
}

impl VulnerabilityRule {
    /// Service names compare exactly against the well-known-port hint.
    pub fn applies_to(&self, record: &ServiceRecord) -> bool {
        record.service == self.service
            && record.version_candidates().any(|v| self.version.matches(v))
    }

    fn instantiate(&self, record: &ServiceRecord) -> Finding {
        Finding {
            port: record.port,
            service: record.service.clone(),
            identifier: self.finding.identifier.to_string(),
            severity: self.finding.severity,
            description: self.finding.description.to_string(),
            remediation: self.finding.remediation.to_string(),
        }
    }
}

/// Built-in rules
pub const DEFAULT_RULES: &[VulnerabilityRule] = &[
    VulnerabilityRule {
        service: "SSH",
        version: VersionPredicate::ProductBelow {
            product: "OpenSSH",
            token: VersionToken::MajorMinor,
            below: 7.4,
        },
        finding: FindingTemplate {
            identifier: "CVE-2018-15473",
            severity: Severity::Medium,
            description: "OpenSSH username enumeration vulnerability",
            remediation: "Update OpenSSH to version 7.4 or later",
        },
    },
    VulnerabilityRule {
        service: "HTTP",
        version: VersionPredicate::ProductBelow {
            product: "Apache",
            token: VersionToken::MajorMinorPatch,
            below: 2.4,
        },
        finding: FindingTemplate {
            identifier: "CVE-2017-15715",
            severity: Severity::High,
            description: "Apache HTTP Server vulnerability",
            remediation: "Update Apache to version 2.4.29 or later",
        },
    },
    VulnerabilityRule {
        service: "FTP",
        version: VersionPredicate::Any,
        finding: FindingTemplate {
            identifier: NO_IDENTIFIER,
            severity: Severity::Info,
            description: "FTP service detected - consider using SFTP",
            remediation: "Disable FTP and use SFTP or FTPS",
        },
    },
];

static MAJOR_MINOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+\.\d+)").expect("static regex"));
static MAJOR_MINOR_PATCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+\.\d+)\.\d+").expect("static regex"));

/// Leading `major.minor` of the first `token` in the text, read as a decimal
pub fn leading_version(version: &str, token: VersionToken) -> Option<f64> {
    let caps = token.pattern().captures(version)?;
    caps.get(1)?.as_str().parse().ok()
}

/// Evaluates every rule against a service record
#[derive(Debug, Clone)]
pub struct VulnerabilityRuleEngine {
    rules: Vec<VulnerabilityRule>,
}

impl Default for VulnerabilityRuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl VulnerabilityRuleEngine {
    pub fn new() -> Self {
        Self {
            rules: DEFAULT_RULES.to_vec(),
        }
    }

    pub fn with_rules(rules: Vec<VulnerabilityRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[VulnerabilityRule] {
        &self.rules
    }

    /// Findings in rule-table order; empty when nothing applies.
    pub fn evaluate(&self, record: &ServiceRecord) -> Vec<Finding> {
        self.rules
            .iter()
            .filter(|rule| rule.applies_to(record))
            .map(|rule| rule.instantiate(record))
            .collect()
    }
}
