use config::{Config, ConfigError, Environment};
use serde::Deserialize;

pub const DEFAULT_HOSTNAME: &str = "example.com";
pub const DEFAULT_URL: &str = "http://example2.com";

/// What a failed DNS probe means for the process exit status.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DnsFailurePolicy {
    /// Report the failure and carry on (exit 0).
    #[default]
    Report,
    /// Report the failure and exit non-zero.
    Fatal,
}

/// Probe targets
#[derive(Debug, Deserialize, Clone, Default)]
#[allow(unused)]
pub struct ProbeTargets {
    pub hostname: Option<String>,
    pub url: Option<String>,
    pub all_addresses: Option<bool>,
}

/// Hosts-file override configuration
#[derive(Debug, Deserialize, Clone, Default)]
#[allow(unused)]
pub struct HostsSettings {
    pub enabled: Option<bool>,
    pub env: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[allow(unused)]
pub struct Settings {
    pub otel_exporter_otlp_endpoint: Option<String>,
    #[serde(default)]
    pub probe: ProbeTargets,
    #[serde(default)]
    pub hosts: HostsSettings,
    /// Legacy `HOSTS_ENV` variable, used when `HOSTS__ENV` is unset.
    pub hosts_env: Option<String>,
    #[serde(default)]
    pub dns_failure: DnsFailurePolicy,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let s = Config::builder()
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Self = s.try_deserialize()?;
        log::debug!("Parsed settings: {:?}", settings);
        Ok(settings)
    }

    pub fn hostname(&self) -> &str {
        self.probe.hostname.as_deref().unwrap_or(DEFAULT_HOSTNAME)
    }

    pub fn url(&self) -> &str {
        self.probe.url.as_deref().unwrap_or(DEFAULT_URL)
    }

    pub fn all_addresses(&self) -> bool {
        self.probe.all_addresses.unwrap_or(false)
    }

    pub fn hosts_enabled(&self) -> bool {
        self.hosts.enabled.unwrap_or(false)
    }

    pub fn hosts_env(&self) -> Option<String> {
        self.hosts
            .env
            .clone()
            .or_else(|| self.hosts_env.clone())
            .filter(|env| !env.is_empty())
    }
}
