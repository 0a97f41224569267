use clap::{Arg, ArgAction, ArgMatches, Command};
use std::process;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use colored::*;
use hostscope::{
    config::ScanConfig,
    output::{OutputConfig, OutputFormat, OutputManager},
    ports::{PortListType, PortSpec},
    scanner::{ScanSession, SessionEvent},
    ScanError,
};
use indicatif::{ProgressBar, ProgressStyle};

// Ulimit adjustment for Unix systems
#[cfg(unix)]
fn adjust_ulimit_size(ulimit: Option<u64>) -> u64 {
    use rlimit::Resource;

    if let Some(limit) = ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            println!(
                "{} {}",
                "[~] Increasing open file limit to".bright_blue(),
                limit.to_string().bright_cyan().bold()
            );
        } else {
            eprintln!("{}", "[!] Failed to set open file limit".bright_red());
        }
    }

    match Resource::NOFILE.get() {
        Ok((soft, _)) => soft,
        Err(_) => {
            log::warn!("Could not read the open file limit");
            65535
        }
    }
}

#[cfg(not(unix))]
fn adjust_ulimit_size(_ulimit: Option<u64>) -> u64 {
    65535
}

fn print_banner() {
    println!("{}", " _               _                              ".bright_cyan().bold());
    println!("{}", "| |__   ___  ___| |_ ___  ___ ___  _ __   ___  ".bright_cyan().bold());
    println!("{}", "| '_ \\ / _ \\/ __| __/ __|/ __/ _ \\| '_ \\ / _ \\ ".bright_cyan().bold());
    println!("{}", "| | | | (_) \\__ \\ |_\\__ \\ (_| (_) | |_) |  __/ ".bright_cyan().bold());
    println!("{}", "|_| |_|\\___/|___/\\__|___/\\___\\___/| .__/ \\___| ".bright_cyan().bold());
    println!("{}", "                                  |_|          ".bright_cyan().bold());
    println!();
    println!(
        "{}",
        format!("host reconnaissance v{}", env!("CARGO_PKG_VERSION")).bright_blue()
    );
    println!();
}

fn build_cli() -> Command {
    Command::new("hostscope")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Single-host reconnaissance: port sweep, banner fingerprinting and vulnerability hints")
        .arg(
            Arg::new("target")
                .value_name("TARGET")
                .help("Target to scan (IP address or hostname)")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("ports")
                .short('p')
                .long("ports")
                .value_name("PORTS")
                .help("Ports to scan: list (22,80), range (1-1024) or set (common, quick, web, database)")
                .conflicts_with("quick"),
        )
        .arg(
            Arg::new("quick")
                .long("quick")
                .help("Scan the quick port set")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("MS")
                .help("Connect timeout in milliseconds [default: 1000]")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("banner-timeout")
                .long("banner-timeout")
                .value_name("MS")
                .help("Banner capture window in milliseconds [default: 3000]")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("threads")
                .short('T')
                .long("threads")
                .value_name("COUNT")
                .help("Maximum concurrent probes [default: 100]")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Save results to FILE (format from extension unless --format is given)"),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .value_name("FORMAT")
                .help("Report format")
                .value_parser(["text", "json", "csv"]),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file [default: ~/.hostscope.toml]"),
        )
        .arg(
            Arg::new("no-ping")
                .long("no-ping")
                .help("Skip the liveness check")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-whois")
                .long("no-whois")
                .help("Skip the WHOIS lookup")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-banner")
                .long("no-banner")
                .help("Hide the banner")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Verbose output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ulimit")
                .short('u')
                .long("ulimit")
                .value_name("LIMIT")
                .help("Raise the open file limit to this value")
                .value_parser(clap::value_parser!(u64)),
        )
}

/// Defaults, then the config file, then command-line flags.
fn build_config(matches: &ArgMatches) -> hostscope::Result<ScanConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ScanConfig::from_toml_file(path)?,
        None => ScanConfig::load_default_config(),
    };

    if let Some(target) = matches.get_one::<String>("target") {
        config.target = target.clone();
    }

    if matches.get_flag("quick") {
        config.ports = PortSpec::from_list(PortListType::Quick).into_ports();
    } else if let Some(spec) = matches.get_one::<String>("ports") {
        config.ports = PortSpec::parse(spec)?.into_ports();
    }

    if let Some(&timeout) = matches.get_one::<u64>("timeout") {
        config.connect_timeout = timeout;
    }
    if let Some(&timeout) = matches.get_one::<u64>("banner-timeout") {
        config.banner_timeout = timeout;
    }
    if let Some(&threads) = matches.get_one::<usize>("threads") {
        config.concurrency = threads;
    }
    if let Some(output) = matches.get_one::<String>("output") {
        config.output = Some(output.clone());
    }
    if let Some(format) = matches.get_one::<String>("format") {
        config.output_format = Some(format.parse().map_err(ScanError::ConfigError)?);
    }

    config.skip_ping |= matches.get_flag("no-ping");
    config.skip_whois |= matches.get_flag("no-whois");

    config.validate()?;
    Ok(config)
}

/// One spinner per pipeline stage
fn stage_spinner() -> impl Fn(SessionEvent) + Send + Sync + 'static {
    let current: Mutex<Option<ProgressBar>> = Mutex::new(None);

    move |event| {
        let Ok(mut current) = current.lock() else {
            return;
        };

        match event {
            SessionEvent::Started(stage) => {
                let spinner = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
                    spinner.set_style(style);
                }
                spinner.set_message(format!("{}...", stage));
                spinner.enable_steady_tick(Duration::from_millis(100));
                *current = Some(spinner);
            }
            SessionEvent::Finished { summary, .. } => {
                if let Some(spinner) = current.take() {
                    spinner.finish_with_message(format!("{} {}", "[✓]".bright_green(), summary));
                }
            }
        }
    }
}

async fn run(matches: ArgMatches) -> anyhow::Result<()> {
    let config = build_config(&matches).context("Invalid configuration")?;

    let fd_limit = adjust_ulimit_size(matches.get_one::<u64>("ulimit").copied());
    if (config.concurrency as u64) > fd_limit {
        log::warn!(
            "Concurrency {} exceeds the open file limit {}; consider --ulimit",
            config.concurrency,
            fd_limit
        );
    }

    println!(
        "{} {} ({} ports, {} concurrent)\n",
        "[~] Scanning".bright_blue(),
        config.target.bright_cyan().bold(),
        config.ports.len(),
        config.concurrency
    );

    let report_config = config
        .output
        .clone()
        .map(|file| OutputConfig::for_file(file, config.output_format));
    let console_format = match (&config.output, config.output_format) {
        (None, Some(format)) => format,
        _ => OutputFormat::Text,
    };

    let session = ScanSession::new(config)?.with_observer(stage_spinner());
    let results = session.run().await;

    OutputManager::new(OutputConfig {
        format: console_format,
        ..OutputConfig::default()
    })
    .write_results(&results)?;

    if let Some(report_config) = report_config {
        let path = report_config.file.clone().unwrap_or_default();
        OutputManager::new(report_config)
            .write_results(&results)
            .with_context(|| format!("Failed to save results to {}", path))?;
        println!("\n{} {}", "Results saved to:".bright_green(), path);
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    let default_level = if matches.get_flag("verbose") { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if !matches.get_flag("no-banner") {
        print_banner();
    }

    if let Err(e) = run(matches).await {
        eprintln!("{} {:#}", "[!]".bright_red(), e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Parse `args` against an empty config file so `~/.hostscope.toml` never leaks in
    fn parse_isolated(args: &[&str]) -> (ArgMatches, NamedTempFile) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let mut argv = vec!["hostscope".to_string()];
        argv.extend(args.iter().map(|a| a.to_string()));
        argv.push("--config".to_string());
        argv.push(path);
        (build_cli().get_matches_from(argv), file)
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let matches = build_cli().get_matches_from([
            "hostscope", "10.0.0.5", "--config", "/nonexistent/hostscope.toml",
        ]);
        assert!(build_config(&matches).is_err());
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let (matches, _file) =
            parse_isolated(&["10.0.0.5", "-p", "22,80-82", "-t", "250", "-T", "8", "--no-ping"]);
        let config = build_config(&matches).unwrap();
        assert_eq!(config.target, "10.0.0.5");
        assert_eq!(config.ports, vec![22, 80, 81, 82]);
        assert_eq!(config.connect_timeout, 250);
        assert_eq!(config.concurrency, 8);
        assert!(config.skip_ping);
        assert!(!config.skip_whois);
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "concurrency = 12\nconnect_timeout = 900\nskip_whois = true").unwrap();
        let path = file.path().to_str().unwrap();

        let matches =
            build_cli().get_matches_from(["hostscope", "10.0.0.5", "-t", "250", "--config", path]);
        let config = build_config(&matches).unwrap();
        assert_eq!(config.connect_timeout, 250);
        assert_eq!(config.concurrency, 12);
        assert!(config.skip_whois);
    }

    #[test]
    fn test_invalid_port_spec_is_config_error() {
        let (matches, _file) = parse_isolated(&["10.0.0.5", "-p", "0-10"]);
        let err = build_config(&matches).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_quick_set() {
        let (matches, _file) = parse_isolated(&["example.com", "--quick"]);
        let config = build_config(&matches).unwrap();
        assert_eq!(config.ports, PortSpec::from_list(PortListType::Quick).into_ports());
    }
}
