use std::net::IpAddr;
use std::sync::Arc;

use log::debug;

use super::hosts::HostsOverride;
use crate::error::ProbeError;

/// Name resolution shared by both network probes.
///
/// Consults an optional hosts-file override first and falls back to the
/// system resolver (`getaddrinfo`).
#[derive(Clone, Debug, Default)]
pub struct Resolver {
    hosts: Option<Arc<HostsOverride>>,
}

impl Resolver {
    /// Create a resolver backed only by the system resolver.
    pub fn system() -> Self {
        Self { hosts: None }
    }

    /// Create a resolver that answers from hosts files when they list the name.
    pub fn with_hosts(hosts: HostsOverride) -> Self {
        Self {
            hosts: Some(Arc::new(hosts)),
        }
    }

    pub fn hosts(&self) -> Option<&HostsOverride> {
        self.hosts.as_deref()
    }

    /// Resolve `hostname` to every distinct address, in resolver order.
    ///
    /// Never returns an empty list; an empty answer is a DNS error.
    pub async fn lookup(&self, hostname: &str) -> Result<Vec<IpAddr>, ProbeError> {
        if hostname.is_empty() {
            return Err(ProbeError::dns("hostname must not be empty"));
        }

        if let Some(hosts) = &self.hosts {
            let hosts = Arc::clone(hosts);
            let name = hostname.to_string();
            let found = tokio::task::spawn_blocking(move || hosts.find(&name))
                .await
                .map_err(|e| ProbeError::dns(format!("{hostname}: hosts lookup failed: {e}")))?;

            if let Some(ipaddr) = found {
                debug!("Resolved {hostname} from hosts file: {ipaddr}");
                return Ok(vec![ipaddr]);
            }
            debug!("No hosts file entry for {hostname}");
        }

        let addrs = tokio::net::lookup_host((hostname, 0))
            .await
            .map_err(|e| ProbeError::dns(format!("{hostname}: {e}")))?;

        let mut ips: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            let ip = addr.ip();
            if !ips.contains(&ip) {
                ips.push(ip);
            }
        }

        if ips.is_empty() {
            return Err(ProbeError::dns(format!("{hostname}: no addresses found")));
        }

        debug!("Resolved {hostname} via system resolver: {ips:?}");
        Ok(ips)
    }
}
