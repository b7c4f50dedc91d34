use std::time::Duration;

use svcwire_frame::Message;
use svcwire_transport::{Address, Scheme};
use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionConfig};
use crate::directory::{decode_listing, list_request, lookup_request, ServiceInfo};
use crate::error::{CallError, Result, SessionError};
use crate::object::GenericObject;

const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Applied to the directory connection and every service connection.
    pub connection: ConnectionConfig,
    /// Bound on a directory lookup. Default: 5 s.
    pub lookup_timeout: Duration,
    /// Only use service endpoints with this scheme. Default: any.
    pub preferred_scheme: Option<Scheme>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            preferred_scheme: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// A client's link to a service directory.
///
/// Resolves service names into [`GenericObject`] proxies. Proxies own their
/// own connections and outlive [`Session::disconnect`].
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    directory: Option<Connection>,
    address: Option<Address>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            config,
            directory: None,
            address: None,
        }
    }

    /// Connect to the directory at `address` (e.g. `tcp://127.0.0.1:5555`).
    ///
    /// Returns false and logs the reason on failure. An existing directory
    /// connection is closed first.
    pub fn connect(&mut self, address: &str) -> bool {
        match self.try_connect(address) {
            Ok(()) => true,
            Err(err) => {
                warn!(%address, error = %err, "cannot connect to directory");
                false
            }
        }
    }

    /// [`Session::connect`], reporting why it failed.
    ///
    /// An unparsable address leaves the current directory connection alone.
    pub fn try_connect(&mut self, address: &str) -> Result<()> {
        let address = Address::parse(address)?;
        self.disconnect();
        let connection = Connection::open(&address, self.config.connection.clone())?;
        info!(%address, "connected to directory");
        self.directory = Some(connection);
        self.address = Some(address);
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        match &self.directory {
            Some(connection) if connection.is_open() => SessionState::Connected,
            _ => SessionState::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Address of the current (or most recent) directory.
    pub fn directory_address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Calls still awaiting a directory reply.
    pub fn pending_lookups(&self) -> usize {
        self.directory
            .as_ref()
            .map_or(0, Connection::pending_calls)
    }

    /// One directory round trip bounded by `lookup_timeout`.
    ///
    /// A lookup that times out is forgotten so a hung directory does not
    /// accumulate pending calls.
    fn ask_directory(&self, payload: &[u8]) -> Result<Message> {
        let directory = self
            .directory
            .as_ref()
            .filter(|connection| connection.is_open())
            .ok_or(SessionError::NotConnected)?;

        let future = directory.request(payload)?;
        if let Err(err) = future.wait(Some(self.config.lookup_timeout)) {
            directory.forget(&future);
            return Err(err.into());
        }

        match future.value() {
            Ok(reply) => Ok(reply),
            Err(CallError::RemoteFault(reason)) => Err(SessionError::Directory(reason)),
            Err(err) => Err(err.into()),
        }
    }

    /// Ask the directory about `name`.
    ///
    /// `Ok(None)` when the directory knows no endpoint for it.
    pub fn service_info(&self, name: &str) -> Result<Option<ServiceInfo>> {
        let mut reply = self.ask_directory(&lookup_request(name))?;
        let info = ServiceInfo::from_message(&mut reply)?;
        debug!(
            service = name,
            service_id = info.service_id,
            endpoints = info.endpoints.len(),
            "directory lookup"
        );
        Ok(info.is_available().then_some(info))
    }

    /// Every service the directory has registered, in directory order.
    pub fn services(&self) -> Result<Vec<ServiceInfo>> {
        let mut reply = self.ask_directory(&list_request())?;
        let services = decode_listing(&mut reply)?;
        debug!(count = services.len(), "directory listing");
        Ok(services)
    }

    /// Resolve `name` and connect to it, reporting why that failed.
    ///
    /// `Ok(None)` when the service is unknown; no service connection is
    /// attempted in that case.
    pub fn try_service(&self, name: &str) -> Result<Option<GenericObject>> {
        match self.service_info(name)? {
            Some(info) => self.open(info).map(Some),
            None => Ok(None),
        }
    }

    /// Resolve `name` into a connected proxy, or `None` if the service is
    /// unknown or unreachable.
    pub fn service(&self, name: &str) -> Option<GenericObject> {
        match self.try_service(name) {
            Ok(Some(object)) => Some(object),
            Ok(None) => {
                info!(service = name, "service not registered");
                None
            }
            Err(err) => {
                warn!(service = name, error = %err, "cannot resolve service");
                None
            }
        }
    }

    /// Connect to the first reachable endpoint, in directory order.
    fn open(&self, info: ServiceInfo) -> Result<GenericObject> {
        let candidates = info.addresses(self.config.preferred_scheme);
        let mut last_err = None;
        for address in candidates {
            match Connection::open(&address, self.config.connection.clone()) {
                Ok(connection) => {
                    info!(service = %info.name, endpoint = %address, "connected to service");
                    return Ok(GenericObject::new(info, address, connection));
                }
                Err(err) => {
                    debug!(service = %info.name, endpoint = %address, error = %err, "endpoint unreachable");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            SessionError::Directory(format!("no usable endpoint for service '{}'", info.name))
        }))
    }

    /// Close the directory connection. Proxies already obtained keep working.
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.directory.take() {
            connection.close();
            info!(address = ?self.address, "disconnected from directory");
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.directory_address().is_none());
        assert!(matches!(
            session.service_info("serviceTest"),
            Err(SessionError::NotConnected)
        ));
        assert!(session.service("serviceTest").is_none());
    }

    #[test]
    fn invalid_address_fails_connect() {
        let mut session = Session::new();
        assert!(!session.connect("not an address"));
        assert!(matches!(
            session.try_connect("gopher://host:70"),
            Err(SessionError::Connection(_))
        ));
        assert!(!session.is_connected());
    }

    #[test]
    fn refused_connection_fails_connect() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut session = Session::new();
        assert!(!session.connect(&format!("tcp://127.0.0.1:{port}")));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    fn silent_directory() -> (std::net::TcpListener, String) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = format!("tcp://{}", listener.local_addr().unwrap());
        (listener, address)
    }

    #[test]
    fn bad_address_keeps_existing_directory() {
        let (_listener, address) = silent_directory();
        let mut session = Session::new();
        assert!(session.connect(&address));

        assert!(!session.connect("tcp//typo"));
        assert!(session.is_connected());
        assert_eq!(
            session.directory_address().map(ToString::to_string),
            Some(address)
        );
    }

    #[test]
    fn timed_out_lookups_are_not_left_pending() {
        let (_listener, address) = silent_directory();
        let mut session = Session::with_config(SessionConfig {
            lookup_timeout: Duration::from_millis(30),
            ..SessionConfig::default()
        });
        assert!(session.connect(&address));

        for _ in 0..3 {
            assert!(matches!(
                session.service_info("serviceTest"),
                Err(SessionError::Call(CallError::Timeout(_)))
            ));
        }
        assert!(matches!(
            session.services(),
            Err(SessionError::Call(CallError::Timeout(_)))
        ));
        assert_eq!(session.pending_lookups(), 0);
        assert!(session.is_connected());
    }

    #[test]
    fn huge_call_timeout_does_not_panic() {
        let (_listener, address) = silent_directory();
        let mut session = Session::with_config(SessionConfig {
            connection: ConnectionConfig {
                call_timeout: Some(Duration::MAX),
                ..ConnectionConfig::default()
            },
            lookup_timeout: Duration::from_millis(30),
            ..SessionConfig::default()
        });
        assert!(session.connect(&address));
        assert!(session.service("serviceTest").is_none());
        assert_eq!(session.pending_lookups(), 0);
    }

    #[test]
    fn disconnect_without_connection_is_noop() {
        let mut session = Session::new();
        session.disconnect();
        session.disconnect();
        assert!(!session.is_connected());
    }

    #[test]
    fn default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.lookup_timeout, Duration::from_secs(5));
        assert!(config.preferred_scheme.is_none());
        assert!(config.connection.call_timeout.is_none());
    }
}
