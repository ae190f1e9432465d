use std::fmt;

use thiserror::Error;

/// Subsystem a probe failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeSource {
    Dns,
    Http,
}

impl ProbeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeSource::Dns => "DNS",
            ProbeSource::Http => "HTTP",
        }
    }
}

impl fmt::Display for ProbeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a single probe.
///
/// Carries the underlying resolver or transport message. A failure only ever
/// concerns the probe that produced it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("DNS error: {message}")]
    Dns { message: String },
    #[error("HTTP error: {message}")]
    Http { message: String },
}

impl ProbeError {
    pub fn dns(message: impl Into<String>) -> Self {
        ProbeError::Dns {
            message: message.into(),
        }
    }

    pub fn http(message: impl Into<String>) -> Self {
        ProbeError::Http {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ProbeSource {
        match self {
            ProbeError::Dns { .. } => ProbeSource::Dns,
            ProbeError::Http { .. } => ProbeSource::Http,
        }
    }

    /// Underlying message without the subsystem prefix.
    pub fn message(&self) -> &str {
        match self {
            ProbeError::Dns { message } | ProbeError::Http { message } => message,
        }
    }

    /// Re-tag a failure as coming from the HTTP probe.
    ///
    /// Name resolution for a URL's host is part of the HTTP request, so its
    /// failures are reported under the HTTP subsystem.
    pub fn into_http(self) -> Self {
        match self {
            ProbeError::Dns { message } => ProbeError::Http { message },
            other => other,
        }
    }
}
