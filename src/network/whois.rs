//! WHOIS collaborator backed by a JSON HTTP API

use async_trait::async_trait;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://whoisjson.com/api/v1/whois";

#[async_trait]
pub trait WhoisSource: Send + Sync {
    /// `None` when the lookup fails; the record is opaque to the scanner.
    async fn whois(&self, target: &str) -> Option<serde_json::Value>;
}

/// HTTP WHOIS client
#[derive(Debug, Clone)]
pub struct WhoisClient {
    endpoint: String,
    timeout: Duration,
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl WhoisClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
        }
    }

    pub async fn lookup(&self, target: &str) -> crate::Result<serde_json::Value> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| crate::ScanError::CollaboratorError(e.to_string()))?;

        let response = client
            .get(&self.endpoint)
            .query(&[("domain", target)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| crate::ScanError::CollaboratorError(format!("WHOIS lookup failed: {}", e)))?;

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| crate::ScanError::CollaboratorError(format!("WHOIS response unreadable: {}", e)))
    }
}

#[async_trait]
impl WhoisSource for WhoisClient {
    async fn whois(&self, target: &str) -> Option<serde_json::Value> {
        match self.lookup(target).await {
            Ok(record) => {
                log::info!("WHOIS information retrieved for {}", target);
                Some(record)
            }
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        }
    }
}
