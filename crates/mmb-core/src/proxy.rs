use std::{fmt, path::Path, str::FromStr};

use crate::{errors::Error, Result};

const SUPPORTED_SCHEMES: &[&str] = &["http", "https", "socks5", "socks5h"];

/// Parsed proxy line.
///
/// Accepted forms:
/// - `scheme://[login:password@]host:port`
/// - `[login:password@]host:port` (scheme defaults to `http`)
/// - `host:port:login:password`
#[derive(Clone, PartialEq, Eq)]
pub struct ProxySpec {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub login: Option<String>,
    pub password: Option<String>,
}

impl ProxySpec {
    /// Proxy URL without credentials (credentials are applied separately).
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.login, &self.password) {
            (Some(l), Some(p)) => Some((l.as_str(), p.as_str())),
            (Some(l), None) => Some((l.as_str(), "")),
            _ => None,
        }
    }
}

impl fmt::Display for ProxySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.login {
            Some(login) => write!(
                f,
                "{}://{}:***@{}:{}",
                self.protocol, login, self.host, self.port
            ),
            None => f.write_str(&self.url()),
        }
    }
}

impl fmt::Debug for ProxySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProxySpec({self})")
    }
}

impl FromStr for ProxySpec {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        let raw = input.trim();
        let invalid = |reason: &str| Error::InvalidProxy {
            input: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("empty"));
        }

        let (protocol, rest) = match raw.split_once("://") {
            Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
            None => ("http".to_string(), raw),
        };
        if !SUPPORTED_SCHEMES.contains(&protocol.as_str()) {
            return Err(invalid("unsupported scheme"));
        }
        let rest = rest.trim_end_matches('/');

        let (login, password, host_port) = match rest.rsplit_once('@') {
            Some((creds, host_port)) => {
                let (login, password) = match creds.split_once(':') {
                    Some((l, p)) => (l.to_string(), Some(p.to_string())),
                    None => (creds.to_string(), None),
                };
                (Some(login), password, host_port.to_string())
            }
            None => {
                let parts: Vec<&str> = rest.split(':').collect();
                match parts.as_slice() {
                    [host, port] => (None, None, format!("{host}:{port}")),
                    [host, port, login, password] => (
                        Some(login.to_string()),
                        Some(password.to_string()),
                        format!("{host}:{port}"),
                    ),
                    _ => return Err(invalid("expected host:port")),
                }
            }
        };

        let (host, port) = host_port
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| invalid("port is not a number"))?;

        Ok(Self {
            protocol,
            host: host.to_string(),
            port,
            login: login.filter(|l| !l.is_empty()),
            password,
        })
    }
}

/// Read a proxy list: one per line, blank lines and `#` comments ignored.
pub fn load_proxies(path: &Path) -> Result<Vec<ProxySpec>> {
    let contents = std::fs::read_to_string(path)?;
    parse_proxy_list(&contents)
}

pub fn parse_proxy_list(contents: &str) -> Result<Vec<ProxySpec>> {
    contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(ProxySpec::from_str)
        .collect()
}
