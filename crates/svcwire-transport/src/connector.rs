use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::address::Address;
use crate::error::{Result, TransportError};
use crate::stream::Stream;

/// Connect to an endpoint (blocking, no connect timeout).
pub fn connect(address: &Address) -> Result<Stream> {
    connect_timeout(address, None)
}

/// Connect to an endpoint, bounding each TCP connect attempt by `timeout`.
///
/// A host name may resolve to several socket addresses; they are tried in
/// order and the last failure is reported.
pub fn connect_timeout(address: &Address, timeout: Option<Duration>) -> Result<Stream> {
    match address {
        Address::Tcp { host, port } => connect_tcp(address, host, *port, timeout),
        Address::Unix { path } => connect_unix(address, path),
    }
}

fn connect_tcp(
    address: &Address,
    host: &str,
    port: u16,
    timeout: Option<Duration>,
) -> Result<Stream> {
    let candidates: Vec<_> = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            address: address.to_string(),
            source,
        })?
        .collect();

    let mut last_err = std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "host resolved to no addresses",
    );

    for candidate in candidates {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
            None => TcpStream::connect(candidate),
        };
        match attempt {
            Ok(stream) => {
                debug!(%address, peer = %candidate, "connected tcp stream");
                let stream = Stream::from(stream);
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(err) => {
                debug!(%address, peer = %candidate, error = %err, "tcp connect attempt failed");
                last_err = err;
            }
        }
    }

    Err(TransportError::Connect {
        address: address.to_string(),
        source: last_err,
    })
}

#[cfg(unix)]
fn connect_unix(address: &Address, path: &std::path::Path) -> Result<Stream> {
    let stream = std::os::unix::net::UnixStream::connect(path).map_err(|source| {
        TransportError::Connect {
            address: address.to_string(),
            source,
        }
    })?;
    debug!(%address, "connected unix domain socket");
    Ok(Stream::from(stream))
}

#[cfg(not(unix))]
fn connect_unix(address: &Address, _path: &std::path::Path) -> Result<Stream> {
    Err(TransportError::Connect {
        address: address.to_string(),
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "unix domain sockets are not available on this platform",
        ),
    })
}
