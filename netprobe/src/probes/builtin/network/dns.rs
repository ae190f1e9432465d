//! Hostname resolution probe.

use std::net::IpAddr;
use std::time::Instant;

use log::info;

use super::resolver::Resolver;
use crate::error::ProbeError;
use crate::probes::Probe;
use crate::telemetry;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Inet4,
    Inet6,
}

impl From<&IpAddr> for AddressFamily {
    fn from(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::Inet4,
            IpAddr::V6(_) => AddressFamily::Inet6,
        }
    }
}

impl AddressFamily {
    /// Numeric IP version: 4 or 6.
    pub fn as_u8(&self) -> u8 {
        match self {
            AddressFamily::Inet4 => 4,
            AddressFamily::Inet6 => 6,
        }
    }

    pub fn is_v4(&self) -> bool {
        matches!(*self, AddressFamily::Inet4)
    }

    pub fn is_v6(&self) -> bool {
        matches!(*self, AddressFamily::Inet6)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResolutionResult {
    pub address: IpAddr,
    pub family: AddressFamily,
}

impl From<IpAddr> for ResolutionResult {
    fn from(address: IpAddr) -> Self {
        Self {
            family: AddressFamily::from(&address),
            address,
        }
    }
}

/// Resolve `hostname` and return the first address the resolver yields.
pub async fn resolve_host(resolver: &Resolver, hostname: &str) -> Result<ResolutionResult, ProbeError> {
    resolver
        .lookup(hostname)
        .await?
        .into_iter()
        .next()
        .map(ResolutionResult::from)
        .ok_or_else(|| ProbeError::dns(format!("{hostname}: no addresses found")))
}

/// Resolve `hostname` and return every distinct address, in resolver order.
pub async fn resolve_host_all(
    resolver: &Resolver,
    hostname: &str,
) -> Result<Vec<ResolutionResult>, ProbeError> {
    let ips = resolver.lookup(hostname).await?;
    Ok(ips.into_iter().map(ResolutionResult::from).collect())
}

pub struct DnsProbe {
    hostname: String,
    resolver: Resolver,
    all_addresses: bool,
}

impl DnsProbe {
    pub fn new(hostname: impl Into<String>, resolver: Resolver) -> Self {
        Self {
            hostname: hostname.into(),
            resolver,
            all_addresses: false,
        }
    }

    /// Report every resolved address rather than only the first.
    pub fn all_addresses(mut self, all: bool) -> Self {
        self.all_addresses = all;
        self
    }
}

impl Probe for DnsProbe {
    type Output = Vec<ResolutionResult>;

    fn name(&self) -> &'static str {
        "dns"
    }

    async fn run(&self) -> Result<Vec<ResolutionResult>, ProbeError> {
        let start = Instant::now();
        let outcome = if self.all_addresses {
            resolve_host_all(&self.resolver, &self.hostname).await
        } else {
            resolve_host(&self.resolver, &self.hostname)
                .await
                .map(|r| vec![r])
        };
        let latency_ns = start.elapsed().as_nanos() as u64;

        match &outcome {
            Ok(results) => {
                for r in results {
                    info!(
                        "DNS_LOOKUP name={} address={} family={} latency={}µs",
                        self.hostname,
                        r.address,
                        r.family.as_u8(),
                        latency_ns / 1000
                    );
                }
            }
            Err(e) => info!(
                "DNS_LOOKUP name={} failed latency={}µs: {}",
                self.hostname,
                latency_ns / 1000,
                e.message()
            ),
        }

        telemetry::record_dns_lookup_event(
            &self.hostname,
            outcome
                .as_ref()
                .ok()
                .and_then(|r| r.first())
                .map(|r| r.family.as_u8()),
            latency_ns,
        );

        outcome
    }
}
