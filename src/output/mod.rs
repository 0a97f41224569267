//! Output formatting and management

use crate::intelligence::Severity;
use crate::scanner::ScanResult;
use crate::ScanError;
use colored::{Color, Colorize};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Output format options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl OutputFormat {
    /// Format implied by a report path: `.csv` is CSV, anything else JSON.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("csv") => OutputFormat::Csv,
            _ => OutputFormat::Json,
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub file: Option<String>,
    pub colored: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            file: None,
            colored: true,
        }
    }
}

impl OutputConfig {
    /// Report destination with its format: an explicit format wins over the extension.
    pub fn for_file(file: String, format: Option<OutputFormat>) -> Self {
        let format = format.unwrap_or_else(|| OutputFormat::from_path(&file));
        Self {
            format,
            file: Some(file),
            colored: false,
        }
    }
}

/// One CSV row per finding
#[derive(Debug, Serialize)]
struct CsvFindingRow<'a> {
    target: &'a str,
    port: u16,
    service: &'a str,
    version: &'a str,
    severity: Severity,
    identifier: &'a str,
    description: &'a str,
    remediation: &'a str,
}

/// Main output manager
pub struct OutputManager {
    config: OutputConfig,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// Write the report to the configured file, or stdout when there is none.
    pub fn write_results(&self, results: &ScanResult) -> crate::Result<()> {
        let output = self.render(results)?;

        match &self.config.file {
            Some(filename) => {
                fs::write(filename, output).map_err(|e| {
                    ScanError::OutputError(format!("Failed to write {}: {}", filename, e))
                })?;
                log::info!("Results saved to {}", filename);
            }
            None => print!("{}", output),
        }

        Ok(())
    }

    pub fn render(&self, results: &ScanResult) -> crate::Result<String> {
        match self.config.format {
            OutputFormat::Text => Ok(self.format_text(results)),
            OutputFormat::Json => self.format_json(results),
            OutputFormat::Csv => self.format_csv(results),
        }
    }

    /// Format results as a console report
    fn format_text(&self, results: &ScanResult) -> String {
        let mut output = String::new();

        output.push('\n');
        output.push_str(&self.paint("╔══════════════════════════════════════════════════════════════╗\n", Color::Cyan));
        output.push_str(&self.paint("║                         SCAN RESULTS                         ║\n", Color::Cyan));
        output.push_str(&self.paint("╚══════════════════════════════════════════════════════════════╝\n", Color::Cyan));
        output.push('\n');

        output.push_str(&format!("Target:    {}", results.target.host()));
        if !results.host_info.addresses.is_empty() {
            output.push_str(&format!(" ({})", results.host_info.addresses.join(", ")));
        }
        output.push('\n');
        output.push_str(&format!(
            "Scanned:   {}\n",
            results.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        if let Some(ping) = &results.network_info.ping {
            let line = match (&ping.rtt, ping.alive) {
                (Some(rtt), _) => format!(
                    "Liveness:  alive (rtt min/avg/max {:.2}/{:.2}/{:.2} ms)\n",
                    rtt.min, rtt.avg, rtt.max
                ),
                (None, true) => "Liveness:  alive\n".to_string(),
                (None, false) => "Liveness:  no ping reply\n".to_string(),
            };
            output.push_str(&line);
        }
        output.push('\n');

        if !results.open_ports.is_empty() {
            output.push_str(&self.paint("Open Ports:\n", Color::Blue));
            output.push_str(&self.paint(
                &format!("  {:<8}{:<16}{:<8}{}\n", "PORT", "SERVICE", "STATUS", "VERSION"),
                Color::Yellow,
            ));

            for port_result in &results.open_ports {
                let service = port_result.service.as_deref().unwrap_or("Unknown");
                let version = match results.service_for(port_result.port) {
                    Some(record) => match &record.product {
                        Some(product) if record.has_version() => {
                            format!("{} ({})", record.version, product)
                        }
                        _ => record.version.clone(),
                    },
                    None => String::new(),
                };

                output.push_str(&format!(
                    "  {:<8}{:<16}{}{}\n",
                    port_result.port,
                    service,
                    self.paint(&format!("{:<8}", "Open"), Color::Green),
                    version
                ));
            }
            output.push('\n');
        }

        if !results.vulnerabilities.is_empty() {
            output.push_str(&self.paint("Vulnerabilities:\n", Color::Red));
            output.push_str(&self.paint(
                &format!(
                    "  {:<8}{:<16}{:<10}{:<18}{}\n",
                    "PORT", "SERVICE", "SEVERITY", "IDENTIFIER", "DESCRIPTION"
                ),
                Color::Yellow,
            ));

            for finding in &results.vulnerabilities {
                let color = match finding.severity {
                    Severity::High => Color::Red,
                    Severity::Medium => Color::Yellow,
                    Severity::Info => Color::Blue,
                };
                output.push_str(&format!(
                    "  {:<8}{:<16}{}{:<18}{}\n",
                    finding.port,
                    finding.service,
                    self.paint(&format!("{:<10}", finding.severity), color),
                    finding.identifier,
                    finding.description
                ));
                output.push_str(&format!("  {:<8}-> {}\n", "", finding.remediation));
            }
            output.push('\n');
        }

        if let Some(whois) = &results.network_info.whois {
            let fields = whois.as_object().map(|o| o.len()).unwrap_or(0);
            output.push_str(&format!("WHOIS:     {} fields retrieved\n\n", fields));
        }

        output.push_str(&self.paint(
            &format!("Scan completed in {} ms\n", results.stats.duration_ms),
            Color::Green,
        ));
        output.push_str(&self.paint(
            &format!("Open ports: {}\n", results.open_ports.len()),
            Color::Yellow,
        ));
        output.push_str(&self.paint(
            &format!("Services detected: {}\n", results.services.len()),
            Color::Yellow,
        ));
        output.push_str(&self.paint(
            &format!("Vulnerabilities found: {}\n", results.vulnerabilities.len()),
            Color::Yellow,
        ));

        output
    }

    /// Format results as JSON
    fn format_json(&self, results: &ScanResult) -> crate::Result<String> {
        let mut json = serde_json::to_string_pretty(results)?;
        json.push('\n');
        Ok(json)
    }

    /// Format findings as CSV
    fn format_csv(&self, results: &ScanResult) -> crate::Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        for finding in &results.vulnerabilities {
            let version = results
                .service_for(finding.port)
                .map(|record| record.version.as_str())
                .unwrap_or_default();

            writer.serialize(CsvFindingRow {
                target: results.target.host(),
                port: finding.port,
                service: &finding.service,
                version,
                severity: finding.severity,
                identifier: &finding.identifier,
                description: &finding.description,
                remediation: &finding.remediation,
            })?;
        }

        // serde-driven headers are only written with the first record
        if results.vulnerabilities.is_empty() {
            writer.write_record([
                "target",
                "port",
                "service",
                "version",
                "severity",
                "identifier",
                "description",
                "remediation",
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| ScanError::OutputError(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ScanError::OutputError(e.to_string()))
    }

    /// Apply color formatting if enabled
    fn paint(&self, text: &str, color: Color) -> String {
        if self.config.colored {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }
}
