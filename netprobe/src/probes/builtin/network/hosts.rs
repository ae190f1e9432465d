//! Project-local hosts files.
//!
//! Looks for `hosts.<env>`, `.hosts.<env>`, `hosts` and `.hosts` in the
//! starting directory and every ancestor, answering a lookup from the first
//! file that lists the hostname.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use log::debug;

#[derive(Debug, Clone)]
pub struct HostsOverride {
    root: PathBuf,
    env: Option<String>,
}

impl HostsOverride {
    pub fn new(root: impl Into<PathBuf>, env: Option<String>) -> Self {
        Self {
            root: root.into(),
            env: env.filter(|e| !e.is_empty()),
        }
    }

    /// Start the search from the process working directory.
    pub fn from_current_dir(env: Option<String>) -> Self {
        let curr_dir = std::env::current_dir().unwrap_or_default();
        Self::new(curr_dir, env)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filenames to try in each directory, highest priority first.
    pub fn candidate_filenames(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(4);
        if let Some(env) = &self.env {
            names.push(format!("hosts.{env}"));
            names.push(format!(".hosts.{env}"));
        }
        names.push("hosts".to_string());
        names.push(".hosts".to_string());
        names
    }

    /// Blocking; reads files from disk.
    pub fn find(&self, hostname: &str) -> Option<IpAddr> {
        let filenames = self.candidate_filenames();

        for dir in self.root.ancestors() {
            for filename in &filenames {
                let filepath = dir.join(filename);
                let file = match File::open(&filepath) {
                    Ok(file) => file,
                    Err(e) => {
                        debug!("Not found: {} ({e})", filepath.display());
                        continue;
                    }
                };

                debug!("Found hosts file: {}", filepath.display());
                if let Some(ipaddr) = lookup_in(BufReader::new(file), hostname) {
                    debug!("{hostname} -> {ipaddr} via {}", filepath.display());
                    return Some(ipaddr);
                }
            }
        }

        None
    }
}

/// Scan hosts-format lines for `hostname`.
///
/// Each entry is `<ip> <name> [aliases...]`; `#` starts a comment. Lines with
/// an unparsable address are ignored. Name comparison is ASCII
/// case-insensitive. Bytes that are not valid UTF-8 are replaced rather
/// than ending the scan.
pub fn lookup_in<R: BufRead>(mut reader: R, hostname: &str) -> Option<IpAddr> {
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw) {
            Ok(0) => return None,
            Ok(_) => {}
            Err(e) => {
                debug!("Failed to read hosts file: {e}");
                return None;
            }
        }
        let line = String::from_utf8_lossy(&raw);

        let entry = match line.split_once('#') {
            Some((before, _)) => before,
            None => &*line,
        };

        let mut fields = entry.split_whitespace();
        let Some(ip) = fields.next() else {
            continue;
        };
        let Ok(ip_addr) = ip.parse::<IpAddr>() else {
            continue;
        };

        if fields.any(|name| name.eq_ignore_ascii_case(hostname)) {
            return Some(ip_addr);
        }
    }
}
