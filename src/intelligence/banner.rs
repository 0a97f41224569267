//! Banner fingerprinting: an ordered table of `(marker, extraction)` rules
//!
//! Rules are tried in table order and the first rule whose marker occurs in the
//! banner decides the result, even if its extraction pattern then fails. New
//! services are supported by appending a rule; existing entries keep their
//! position so evaluation stays deterministic.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version reported when nothing could be extracted
pub const UNKNOWN_VERSION: &str = "Unknown";

/// One fingerprinting rule
pub struct BannerRule {
    /// Service family recorded in the details map
    pub family: &'static str,
    /// Substring whose presence selects this rule
    pub marker: &'static str,
    /// Version extraction pattern
    pub pattern: Regex,
    /// Builds the version string from the pattern's captures
    pub format: fn(&Captures<'_>) -> String,
    /// Optional secondary pattern naming the product (e.g. `OpenSSH_7.2`)
    pub product: Option<Regex>,
}

impl BannerRule {
    pub fn matches(&self, banner: &str) -> bool {
        banner.contains(self.marker)
    }

    fn extract_version(&self, banner: &str) -> Option<String> {
        self.pattern.captures(banner).map(|caps| (self.format)(&caps))
    }

    fn extract_product(&self, banner: &str) -> Option<String> {
        let caps = self.product.as_ref()?.captures(banner)?;
        Some(caps.get(1)?.as_str().replace('_', " "))
    }
}

fn first_capture(caps: &Captures<'_>) -> String {
    caps.get(1).map(|m| m.as_str().trim().to_string()).unwrap_or_default()
}

fn ssh_version(caps: &Captures<'_>) -> String {
    format!("SSH {}", first_capture(caps))
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid banner pattern {}: {}", pattern, e))
}

/// Built-in rules, in priority order
pub static DEFAULT_RULES: Lazy<Vec<BannerRule>> = Lazy::new(|| {
    vec![
        BannerRule {
            family: "SSH",
            marker: "SSH",
            pattern: regex(r"SSH-(\d+\.\d+)"),
            format: ssh_version,
            product: Some(regex(r"SSH-\d+\.\d+-(\S+)")),
        },
        BannerRule {
            family: "HTTP",
            marker: "HTTP",
            pattern: regex(r"(?i)Server: ([^\r\n]+)"),
            format: first_capture,
            product: None,
        },
        BannerRule {
            family: "FTP",
            marker: "FTP",
            pattern: regex(r"220 ([^\r\n]+)"),
            format: first_capture,
            product: None,
        },
    ]
});

/// Result of parsing one banner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedBanner {
    pub version: String,
    pub details: BTreeMap<String, String>,
}

impl ParsedBanner {
    pub fn unknown() -> Self {
        Self {
            version: UNKNOWN_VERSION.to_string(),
            details: BTreeMap::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.version == UNKNOWN_VERSION
    }

    pub fn family(&self) -> Option<&str> {
        self.details.get("family").map(String::as_str)
    }

    pub fn product(&self) -> Option<&str> {
        self.details.get("product").map(String::as_str)
    }
}

/// First-match banner parser over a rule table
#[derive(Clone, Copy)]
pub struct BannerParser {
    rules: &'static [BannerRule],
}

impl Default for BannerParser {
    fn default() -> Self {
        Self::new()
    }
}

impl BannerParser {
    pub fn new() -> Self {
        Self {
            rules: DEFAULT_RULES.as_slice(),
        }
    }

    pub fn with_rules(rules: &'static [BannerRule]) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[BannerRule] {
        self.rules
    }

    /// Classify a banner. Never fails; unrecognised input yields `"Unknown"`.
    pub fn parse(&self, banner: &str, port: u16) -> ParsedBanner {
        let Some(rule) = self.rules.iter().find(|rule| rule.matches(banner)) else {
            log::debug!("port {}: no banner rule matched", port);
            return ParsedBanner::unknown();
        };

        let mut parsed = ParsedBanner::unknown();
        parsed.details.insert("family".to_string(), rule.family.to_string());

        match rule.extract_version(banner) {
            Some(version) if !version.is_empty() => parsed.version = version,
            _ => log::debug!("port {}: {} marker without a version", port, rule.family),
        }

        if let Some(product) = rule.extract_product(banner) {
            parsed.details.insert("product".to_string(), product);
        }

        parsed
    }
}
