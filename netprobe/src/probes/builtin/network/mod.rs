//! Network probes.
//!
//! ## Probes
//! - **DnsProbe**: hostname → address and family
//! - **HttpProbe**: single GET → response status code
//!
//! Both resolve names through [`Resolver`], so a hosts-file override applies
//! to the lookup probe and to the URL's host alike.

pub mod dns;
pub mod hosts;
pub mod http;
pub mod resolver;

pub use dns::{AddressFamily, DnsProbe, ResolutionResult, resolve_host, resolve_host_all};
pub use hosts::HostsOverride;
pub use http::{HttpProbe, HttpProbeResult, probe_http};
pub use resolver::Resolver;
