use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use netprobe::{
    NetProbeEngine,
    settings::{DnsFailurePolicy, Settings},
    telemetry,
};

#[derive(Debug, Parser)]
#[clap(about = "Resolve a hostname and GET a URL concurrently, reporting each outcome")]
struct Opt {
    /// Hostname to resolve (default: example.com)
    #[clap(long)]
    host: Option<String>,

    /// URL to GET (default: http://example2.com)
    #[clap(long)]
    url: Option<String>,

    /// Print every resolved address instead of the first
    #[clap(short, long)]
    all: bool,

    /// Exit non-zero when the DNS probe fails
    #[clap(long)]
    fatal_dns: bool,

    /// Consult hosts files found upward from the working directory
    #[clap(long)]
    hosts: bool,

    /// Environment suffix for hosts files (hosts.<env>)
    #[clap(long, requires = "hosts")]
    hosts_env: Option<String>,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

impl Opt {
    fn apply(self, settings: &mut Settings) {
        if let Some(host) = self.host {
            settings.probe.hostname = Some(host);
        }
        if let Some(url) = self.url {
            settings.probe.url = Some(url);
        }
        if self.all {
            settings.probe.all_addresses = Some(true);
        }
        if self.fatal_dns {
            settings.dns_failure = DnsFailurePolicy::Fatal;
        }
        if self.hosts {
            settings.hosts.enabled = Some(true);
        }
        if let Some(env) = self.hosts_env {
            settings.hosts.env = Some(env);
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let opt = Opt::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if opt.verbose { "info" } else { "warn" }
    ))
    .init();

    let mut settings = Settings::new().context("Failed to load settings")?;
    opt.apply(&mut settings);
    let policy = settings.dns_failure;

    telemetry::init_metrics(settings.otel_exporter_otlp_endpoint.as_deref())?;

    let engine = NetProbeEngine::new(settings);
    let report = engine.run().await;

    telemetry::shutdown_metrics();
    let report = report?;

    if report.is_fatal(policy) {
        error!("DNS probe failed and DNS failures are fatal");
        return Ok(ExitCode::FAILURE);
    }

    info!("Probes finished");
    Ok(ExitCode::SUCCESS)
}
