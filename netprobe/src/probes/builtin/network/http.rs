//! Single-shot HTTP/1.1 GET probe.
//!
//! Sends `GET` with only `Host` and `Connection: close`, reads the response
//! head to obtain the status code, then drains and discards the body.

use std::io;
use std::net::SocketAddr;
use std::time::Instant;

use bytes::{Buf, BytesMut};
use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use url::{Host, Url};

use super::resolver::Resolver;
use crate::error::ProbeError;
use crate::probes::Probe;
use crate::telemetry;

const READ_CHUNK: usize = 4096;
const MAX_HEAD_BYTES: usize = 64 * 1024;
const MAX_HEADERS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpProbeResult {
    pub status_code: u16,
}

/// Where and what to request, derived from an absolute `http:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTarget {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub host_header: String,
}

impl HttpTarget {
    pub fn parse(raw: &str) -> Result<Self, ProbeError> {
        let url = Url::parse(raw)
            .map_err(|e| ProbeError::http(format!("invalid URL {raw:?}: {e}")))?;

        if url.scheme() != "http" {
            return Err(ProbeError::http(format!(
                "protocol \"{}:\" not supported, expected \"http:\"",
                url.scheme()
            )));
        }

        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => {
                return Err(ProbeError::http(format!(
                    "invalid URL {raw:?}: missing host"
                )));
            }
        };
        let port = url.port_or_known_default().unwrap_or(80);

        // host_str keeps the brackets around IPv6 literals
        let authority = url.host_str().unwrap_or(&host);
        let host_header = match url.port() {
            Some(port) => format!("{authority}:{port}"),
            None => authority.to_string(),
        };

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            host,
            port,
            path,
            host_header,
        })
    }

    pub fn request(&self) -> String {
        format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            self.path, self.host_header
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyLength {
    Known(u64),
    Chunked,
    UntilClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResponseHead {
    status_code: u16,
    body: BodyLength,
    head_len: usize,
}

/// Parse a response head from the start of `buf`.
///
/// Returns `Ok(None)` while the head is still incomplete.
fn parse_head(buf: &[u8]) -> Result<Option<ResponseHead>, ProbeError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut resp = httparse::Response::new(&mut headers);

    let head_len = match resp.parse(buf) {
        Ok(httparse::Status::Complete(n)) => n,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(e) => return Err(ProbeError::http(format!("parse error: {e}"))),
    };

    let status_code = resp
        .code
        .ok_or_else(|| ProbeError::http("parse error: missing status code"))?;

    let is_chunked = resp.headers.iter().any(|h| {
        h.name.eq_ignore_ascii_case("Transfer-Encoding")
            && String::from_utf8_lossy(h.value)
                .to_ascii_lowercase()
                .contains("chunked")
    });
    let content_length = resp
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("Content-Length"))
        .and_then(|h| std::str::from_utf8(h.value).ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let body = match status_code {
        100..=199 | 204 | 304 => BodyLength::Known(0),
        _ if is_chunked => BodyLength::Chunked,
        _ => content_length.map_or(BodyLength::UntilClose, BodyLength::Known),
    };

    Ok(Some(ResponseHead {
        status_code,
        body,
        head_len,
    }))
}

fn is_interim(status_code: u16) -> bool {
    (100..200).contains(&status_code) && status_code != 101
}

async fn connect(resolver: &Resolver, target: &HttpTarget) -> Result<TcpStream, ProbeError> {
    let ips = resolver
        .lookup(&target.host)
        .await
        .map_err(ProbeError::into_http)?;

    let mut last_err = None;
    for ip in ips {
        let addr = SocketAddr::new(ip, target.port);
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                debug!("Connected to {addr}");
                return Ok(stream);
            }
            Err(e) => {
                debug!("Connect to {addr} failed: {e}");
                last_err = Some(format!("connect {addr}: {e}"));
            }
        }
    }

    Err(ProbeError::http(last_err.unwrap_or_else(|| {
        format!("{}: no addresses to connect to", target.host)
    })))
}

/// Read until a final (non-1xx) response head is buffered; consumes it from `buf`.
async fn read_head(stream: &mut TcpStream, buf: &mut BytesMut) -> Result<ResponseHead, ProbeError> {
    loop {
        if let Some(head) = parse_head(&buf[..])? {
            buf.advance(head.head_len);
            if is_interim(head.status_code) {
                debug!("Skipping interim {} response", head.status_code);
                continue;
            }
            return Ok(head);
        }

        if buf.len() > MAX_HEAD_BYTES {
            return Err(ProbeError::http(format!(
                "response head exceeds {MAX_HEAD_BYTES} bytes"
            )));
        }

        buf.reserve(READ_CHUNK);
        let n = stream
            .read_buf(buf)
            .await
            .map_err(|e| ProbeError::http(format!("read failed: {e}")))?;
        if n == 0 {
            return Err(ProbeError::http("socket hang up"));
        }
    }
}

/// Read more bytes into `buf`. Returns `false` at EOF.
async fn fill(stream: &mut TcpStream, buf: &mut BytesMut) -> io::Result<bool> {
    buf.reserve(READ_CHUNK);
    Ok(stream.read_buf(buf).await? > 0)
}

/// Discard `n` body bytes, buffered ones first. Returns `false` at EOF.
async fn skip(stream: &mut TcpStream, buf: &mut BytesMut, mut n: u64) -> io::Result<bool> {
    loop {
        let take = n.min(buf.len() as u64) as usize;
        buf.advance(take);
        n -= take as u64;
        if n == 0 {
            return Ok(true);
        }
        if !fill(stream, buf).await? {
            return Ok(false);
        }
    }
}

fn framing_error(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

/// Consume chunked framing through the last-chunk and trailer section.
///
/// Stops at the end of the message even if the peer keeps the connection open.
async fn drain_chunked(stream: &mut TcpStream, buf: &mut BytesMut) -> io::Result<()> {
    loop {
        let size = match httparse::parse_chunk_size(&buf[..]) {
            Ok(httparse::Status::Complete((consumed, size))) => {
                buf.advance(consumed);
                size
            }
            Ok(httparse::Status::Partial) => {
                if buf.len() > MAX_HEAD_BYTES {
                    return Err(framing_error("chunk size line too long"));
                }
                if !fill(stream, buf).await? {
                    return Ok(());
                }
                continue;
            }
            Err(_) => return Err(framing_error("invalid chunk size")),
        };

        if size == 0 {
            break;
        }
        // chunk data and its trailing CRLF
        if !skip(stream, buf, size.saturating_add(2)).await? {
            return Ok(());
        }
    }

    loop {
        match buf.windows(2).position(|w| w == b"\r\n") {
            Some(0) => {
                buf.advance(2);
                return Ok(());
            }
            Some(pos) => buf.advance(pos + 2),
            None => {
                if buf.len() > MAX_HEAD_BYTES {
                    return Err(framing_error("trailer section too long"));
                }
                if !fill(stream, buf).await? {
                    return Ok(());
                }
            }
        }
    }
}

async fn drain_body(stream: &mut TcpStream, buf: &mut BytesMut, body: BodyLength) -> io::Result<()> {
    match body {
        BodyLength::Known(len) => {
            skip(stream, buf, len).await?;
        }
        BodyLength::Chunked => drain_chunked(stream, buf).await?,
        BodyLength::UntilClose => {
            buf.clear();
            tokio::io::copy(stream, &mut tokio::io::sink()).await?;
        }
    }
    Ok(())
}

/// Issue one GET to `url` and report the response status code.
///
/// Every failure, including resolution of the URL's host, is an HTTP error.
pub async fn probe_http(resolver: &Resolver, url: &str) -> Result<HttpProbeResult, ProbeError> {
    let target = HttpTarget::parse(url)?;
    let mut stream = connect(resolver, &target).await?;

    stream
        .write_all(target.request().as_bytes())
        .await
        .map_err(|e| ProbeError::http(format!("write failed: {e}")))?;

    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    let head = read_head(&mut stream, &mut buf).await?;

    if let Err(e) = drain_body(&mut stream, &mut buf, head.body).await {
        warn!("Failed to drain response body from {url}: {e}");
    }

    Ok(HttpProbeResult {
        status_code: head.status_code,
    })
}

pub struct HttpProbe {
    url: String,
    resolver: Resolver,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, resolver: Resolver) -> Self {
        Self {
            url: url.into(),
            resolver,
        }
    }
}

impl Probe for HttpProbe {
    type Output = HttpProbeResult;

    fn name(&self) -> &'static str {
        "http"
    }

    async fn run(&self) -> Result<HttpProbeResult, ProbeError> {
        let start = Instant::now();
        let outcome = probe_http(&self.resolver, &self.url).await;
        let latency_ns = start.elapsed().as_nanos() as u64;

        match &outcome {
            Ok(result) => info!(
                "HTTP_PROBE url={} status={} latency={}µs",
                self.url,
                result.status_code,
                latency_ns / 1000
            ),
            Err(e) => info!(
                "HTTP_PROBE url={} failed latency={}µs: {}",
                self.url,
                latency_ns / 1000,
                e.message()
            ),
        }

        telemetry::record_http_probe_event(
            &self.url,
            outcome.as_ref().ok().map(|r| r.status_code),
            latency_ns,
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeSource;
    use crate::probes::builtin::network::fixtures::{closed_port, serve_and_hold, serve_once};
    use std::time::Duration;

    #[test]
    fn test_target_defaults() {
        let target = HttpTarget::parse("http://example2.com").unwrap();
        assert_eq!(target.host, "example2.com");
        assert_eq!(target.port, 80);
        assert_eq!(target.path, "/");
        assert_eq!(target.host_header, "example2.com");
        assert_eq!(
            target.request(),
            "GET / HTTP/1.1\r\nHost: example2.com\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn test_target_port_path_query() {
        let target = HttpTarget::parse("http://127.0.0.1:8080/a/b?x=1&y=2").unwrap();
        assert_eq!(target.host, "127.0.0.1");
        assert_eq!(target.port, 8080);
        assert_eq!(target.path, "/a/b?x=1&y=2");
        assert_eq!(target.host_header, "127.0.0.1:8080");
    }

    #[test]
    fn test_target_ipv6_literal() {
        let target = HttpTarget::parse("http://[::1]:8081/status").unwrap();
        assert_eq!(target.host, "::1");
        assert_eq!(target.host_header, "[::1]:8081");
    }

    #[test]
    fn test_target_rejects_other_schemes() {
        let err = HttpTarget::parse("https://example.com/").unwrap_err();
        assert_eq!(err.kind(), ProbeSource::Http);
        assert!(err.message().contains("https:"));

        let err = HttpTarget::parse("not a url").unwrap_err();
        assert_eq!(err.kind(), ProbeSource::Http);
    }

    #[test]
    fn test_parse_head_content_length() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";
        let head = parse_head(raw).unwrap().unwrap();
        assert_eq!(head.status_code, 200);
        assert_eq!(head.body, BodyLength::Known(5));
        assert_eq!(head.head_len, raw.len() - 5);
    }

    #[test]
    fn test_parse_head_partial_and_chunked() {
        assert_eq!(parse_head(b"HTTP/1.1 200 OK\r\nContent-Le").unwrap(), None);

        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: Chunked\r\nContent-Length: 3\r\n\r\n";
        let head = parse_head(raw).unwrap().unwrap();
        assert_eq!(head.body, BodyLength::Chunked);

        let raw = b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n";
        assert_eq!(parse_head(raw).unwrap().unwrap().body, BodyLength::UntilClose);

        let raw = b"HTTP/1.1 204 No Content\r\n\r\n";
        assert_eq!(parse_head(raw).unwrap().unwrap().body, BodyLength::Known(0));
    }

    #[test]
    fn test_parse_head_garbage() {
        let err = parse_head(b"\x00\x01garbage\r\n\r\n").unwrap_err();
        assert_eq!(err.kind(), ProbeSource::Http);
    }

    #[tokio::test]
    async fn test_probe_reports_200() {
        let addr = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello").await;
        let result = probe_http(&Resolver::system(), &format!("http://{addr}/"))
            .await
            .unwrap();
        assert_eq!(result.status_code, 200);
    }

    #[tokio::test]
    async fn test_probe_reports_non_success_status() {
        let addr = serve_once(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n").await;
        let result = probe_http(&Resolver::system(), &format!("http://{addr}/missing"))
            .await
            .unwrap();
        assert_eq!(result.status_code, 404);
    }

    #[tokio::test]
    async fn test_probe_skips_interim_response() {
        let addr = serve_once(
            b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 201 Created\r\nContent-Length: 2\r\n\r\nok",
        )
        .await;
        let result = probe_http(&Resolver::system(), &format!("http://{addr}/"))
            .await
            .unwrap();
        assert_eq!(result.status_code, 201);
    }

    #[tokio::test]
    async fn test_probe_drains_body_until_close() {
        let addr = serve_once(b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\nno length given").await;
        let result = probe_http(&Resolver::system(), &format!("http://{addr}/"))
            .await
            .unwrap();
        assert_eq!(result.status_code, 200);
    }

    #[tokio::test]
    async fn test_chunked_body_ends_at_last_chunk_on_open_connection() {
        let addr = serve_and_hold(
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
5;ext=1\r\nhello\r\n6\r\n world\r\n0\r\nX-Checksum: abc\r\n\r\n",
        )
        .await;
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            probe_http(&Resolver::system(), &format!("http://{addr}/")),
        )
        .await
        .expect("chunked body should finish without waiting for close")
        .unwrap();
        assert_eq!(result.status_code, 200);
    }

    #[tokio::test]
    async fn test_content_length_body_on_open_connection() {
        let addr = serve_and_hold(b"HTTP/1.1 202 Accepted\r\nContent-Length: 4\r\n\r\ndone").await;
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            probe_http(&Resolver::system(), &format!("http://{addr}/")),
        )
        .await
        .expect("sized body should finish without waiting for close")
        .unwrap();
        assert_eq!(result.status_code, 202);
    }

    #[tokio::test]
    async fn test_closed_port_is_local_http_error() {
        let addr = closed_port();
        let err = probe_http(&Resolver::system(), &format!("http://{addr}/"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ProbeSource::Http);
        assert!(err.message().starts_with(&format!("connect {addr}")));
    }

    #[tokio::test]
    async fn test_peer_closing_early_is_hang_up() {
        let addr = serve_once(b"").await;
        let err = probe_http(&Resolver::system(), &format!("http://{addr}/"))
            .await
            .unwrap_err();
        assert_eq!(err, ProbeError::http("socket hang up"));
    }

    #[tokio::test]
    async fn test_unresolvable_url_host_is_http_error() {
        let err = probe_http(&Resolver::system(), "http://netprobe-test.invalid/")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ProbeSource::Http);
        assert!(!err.message().is_empty());
    }
}
