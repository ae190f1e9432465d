pub mod error;
pub mod report;
pub mod settings;
pub mod telemetry;
use anyhow::{Context, Result};
use log::info;

use crate::error::ProbeError;
use crate::settings::{DnsFailurePolicy, Settings};

pub mod probes;
use crate::probes::{
    builtin::network::{
        DnsProbe, HostsOverride, HttpProbe, HttpProbeResult, ResolutionResult, Resolver,
    },
    spawn_probe,
};

/// Joined outcomes of one run. Each side is independent of the other.
#[derive(Debug)]
pub struct ProbeReport {
    pub dns: Result<Vec<ResolutionResult>, ProbeError>,
    pub http: Result<HttpProbeResult, ProbeError>,
}

impl ProbeReport {
    /// Whether this outcome should end the process with a failure status.
    ///
    /// Only the DNS probe can be fatal, and only under [`DnsFailurePolicy::Fatal`].
    /// HTTP failures are always reported and recovered.
    pub fn is_fatal(&self, policy: DnsFailurePolicy) -> bool {
        policy == DnsFailurePolicy::Fatal && self.dns.is_err()
    }
}

pub struct NetProbeEngine {
    pub settings: Settings,
    resolver: Resolver,
}

impl NetProbeEngine {
    pub fn new(settings: Settings) -> Self {
        let resolver = if settings.hosts_enabled() {
            let hosts = HostsOverride::from_current_dir(settings.hosts_env());
            info!("Hosts-file override enabled from {}", hosts.root().display());
            Resolver::with_hosts(hosts)
        } else {
            Resolver::system()
        };
        Self::with_resolver(settings, resolver)
    }

    pub fn with_resolver(settings: Settings, resolver: Resolver) -> Self {
        Self { settings, resolver }
    }

    /// Launch the DNS and HTTP probes side by side and wait for both.
    ///
    /// Each probe prints its own outcome when it finishes; completion order
    /// is unspecified.
    pub async fn run(&self) -> Result<ProbeReport> {
        let dns = spawn_probe(
            DnsProbe::new(self.settings.hostname(), self.resolver.clone())
                .all_addresses(self.settings.all_addresses()),
        );
        let http = spawn_probe(HttpProbe::new(self.settings.url(), self.resolver.clone()));

        let (dns, http) = tokio::join!(dns, http);
        let report = ProbeReport {
            dns: dns.context("DNS probe task failed")?,
            http: http.context("HTTP probe task failed")?,
        };

        if let Err(e) = &report.dns {
            info!("DNS probe for {} failed: {}", self.settings.hostname(), e.message());
        }
        if let Err(e) = &report.http {
            info!("HTTP probe for {} failed: {}", self.settings.url(), e.message());
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeSource;
    use crate::probes::builtin::network::fixtures::{closed_port, serve_once};
    use crate::settings::ProbeTargets;
    use std::sync::Mutex;

    fn settings_for(hostname: &str, url: &str) -> Settings {
        Settings {
            probe: ProbeTargets {
                hostname: Some(hostname.to_string()),
                url: Some(url.to_string()),
                all_addresses: None,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_both_probes_succeed() {
        let addr = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").await;
        let engine = NetProbeEngine::new(settings_for("127.0.0.1", &format!("http://{addr}/")));

        let report = engine.run().await.unwrap();
        let dns = report.dns.as_ref().unwrap();
        assert_eq!(dns.len(), 1);
        assert_eq!(dns[0].address.to_string(), "127.0.0.1");
        assert_eq!(dns[0].family.as_u8(), 4);
        assert_eq!(report.http.as_ref().unwrap().status_code, 200);
        assert!(!report.is_fatal(DnsFailurePolicy::Fatal));
    }

    #[tokio::test]
    async fn test_dns_failure_does_not_affect_http() {
        let addr = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").await;
        let engine = NetProbeEngine::new(settings_for(
            "nothing-here.invalid",
            &format!("http://{addr}/"),
        ));

        let report = engine.run().await.unwrap();
        assert_eq!(report.dns.as_ref().unwrap_err().kind(), ProbeSource::Dns);
        assert_eq!(report.http.as_ref().unwrap().status_code, 200);

        assert!(report.is_fatal(DnsFailurePolicy::Fatal));
        assert!(!report.is_fatal(DnsFailurePolicy::Report));
    }

    #[tokio::test]
    async fn test_http_failure_is_never_fatal() {
        let addr = closed_port();
        let engine = NetProbeEngine::new(settings_for("127.0.0.1", &format!("http://{addr}/")));

        let report = engine.run().await.unwrap();
        assert!(report.dns.is_ok());
        assert_eq!(report.http.as_ref().unwrap_err().kind(), ProbeSource::Http);
        assert!(!report.is_fatal(DnsFailurePolicy::Fatal));
    }

    struct WarnCapture(Mutex<Vec<String>>);

    impl log::Log for WarnCapture {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            metadata.level() <= log::Level::Warn
        }

        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                if let Ok(mut lines) = self.0.lock() {
                    lines.push(record.args().to_string());
                }
            }
        }

        fn flush(&self) {}
    }

    static WARNINGS: WarnCapture = WarnCapture(Mutex::new(Vec::new()));

    #[tokio::test]
    async fn test_failures_only_reported_not_warned() {
        let _ = log::set_logger(&WARNINGS);
        log::set_max_level(log::LevelFilter::Warn);

        let addr = closed_port();
        let url = format!("http://{addr}/quiet");
        let engine = NetProbeEngine::new(settings_for("quiet-failure.invalid", &url));

        let report = engine.run().await.unwrap();
        assert!(report.dns.is_err());
        assert!(report.http.is_err());

        let warnings = WARNINGS.0.lock().unwrap();
        assert!(
            !warnings
                .iter()
                .any(|w| w.contains("quiet-failure.invalid") || w.contains(&url)),
            "unexpected warnings: {warnings:?}"
        );
    }

    #[tokio::test]
    async fn test_outcomes_independent_of_order() {
        let resolver = Resolver::system();

        let addr = serve_once(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n").await;
        let url = format!("http://{addr}/");
        let dns_first = crate::probes::builtin::network::resolve_host(&resolver, "127.0.0.1").await;
        let http_second = crate::probes::builtin::network::probe_http(&resolver, &url).await;

        let addr = serve_once(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n").await;
        let url = format!("http://{addr}/");
        let http_first = crate::probes::builtin::network::probe_http(&resolver, &url).await;
        let dns_second = crate::probes::builtin::network::resolve_host(&resolver, "127.0.0.1").await;

        assert_eq!(dns_first, dns_second);
        assert_eq!(http_first, http_second);
        assert_eq!(http_first.unwrap().status_code, 503);
    }
}
