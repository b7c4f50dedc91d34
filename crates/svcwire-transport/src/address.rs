use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, TransportError};

/// Directory address used when the caller supplies none.
pub const DEFAULT_DIRECTORY: &str = "tcp://127.0.0.1:5555";

/// Transport schemes understood by [`Address::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// TCP over IPv4 or IPv6.
    Tcp,
    /// Unix domain stream socket (unix targets only).
    Unix,
}

impl Scheme {
    /// Every known scheme, in preference order.
    pub const ALL: [Scheme; 2] = [Scheme::Tcp, Scheme::Unix];

    /// The scheme as it appears before `://`.
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Tcp => "tcp",
            Scheme::Unix => "unix",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Scheme::ALL
            .into_iter()
            .find(|scheme| scheme.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TransportError::UnsupportedScheme {
                scheme: s.to_string(),
                address: s.to_string(),
            })
    }
}

/// A parsed transport endpoint.
///
/// ```text
/// tcp://127.0.0.1:5555
/// tcp://[::1]:5555
/// unix:///run/svcwire/directory.sock
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// `tcp://host:port`
    Tcp { host: String, port: u16 },
    /// `unix:///absolute/path`
    Unix { path: PathBuf },
}

impl Address {
    /// Parse an endpoint string.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let (scheme, rest) = text
            .split_once("://")
            .ok_or_else(|| invalid(text, "expected scheme://host:port"))?;

        let scheme = match scheme.parse::<Scheme>() {
            Ok(scheme) => scheme,
            Err(_) => {
                return Err(TransportError::UnsupportedScheme {
                    scheme: scheme.to_string(),
                    address: text.to_string(),
                })
            }
        };

        match scheme {
            Scheme::Tcp => parse_host_port(text, rest),
            Scheme::Unix => {
                if !rest.starts_with('/') {
                    return Err(invalid(text, "unix socket path must be absolute"));
                }
                Ok(Address::Unix {
                    path: PathBuf::from(rest),
                })
            }
        }
    }

    /// Build a TCP address.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Address::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Build a Unix socket address.
    pub fn unix(path: impl AsRef<Path>) -> Self {
        Address::Unix {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn scheme(&self) -> Scheme {
        match self {
            Address::Tcp { .. } => Scheme::Tcp,
            Address::Unix { .. } => Scheme::Unix,
        }
    }
}

fn parse_host_port(text: &str, rest: &str) -> Result<Address> {
    let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
        let (host, after) = bracketed
            .split_once(']')
            .ok_or_else(|| invalid(text, "unterminated '[' in IPv6 host"))?;
        let port = after
            .strip_prefix(':')
            .ok_or_else(|| invalid(text, "missing port"))?;
        (host, port)
    } else {
        rest.rsplit_once(':')
            .ok_or_else(|| invalid(text, "missing port"))?
    };

    if host.is_empty() {
        return Err(invalid(text, "empty host"));
    }
    if !rest.starts_with('[') && host.contains(':') {
        return Err(invalid(text, "IPv6 hosts must be enclosed in brackets"));
    }

    let port = port
        .parse::<u16>()
        .map_err(|_| invalid(text, &format!("invalid port '{port}'")))?;

    Ok(Address::Tcp {
        host: host.to_string(),
        port,
    })
}

fn invalid(address: &str, reason: &str) -> TransportError {
    TransportError::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Tcp { host, port } if host.contains(':') => {
                write!(f, "tcp://[{host}]:{port}")
            }
            Address::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Address::Unix { path } => write!(f, "unix://{}", path.display()),
        }
    }
}

impl FromStr for Address {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Address::tcp(addr.ip().to_string(), addr.port())
    }
}
