use bytes::Bytes;
use svcwire_frame::{CodecError, Message};
use svcwire_transport::{Address, Scheme};
use tracing::debug;

/// What the directory knows about one registered service.
///
/// Wire layout of a lookup reply: `[s name][I service_id][s machine_id]`
/// followed by zero or more `[s endpoint]` fields. A reply with no
/// endpoints means the service is not registered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceInfo {
    pub name: String,
    pub service_id: u32,
    pub machine_id: String,
    /// Endpoint URLs in the directory's preference order.
    pub endpoints: Vec<String>,
}

impl ServiceInfo {
    pub fn new(name: impl Into<String>, service_id: u32) -> Self {
        Self {
            name: name.into(),
            service_id,
            ..Self::default()
        }
    }

    pub fn with_machine_id(mut self, machine_id: impl Into<String>) -> Self {
        self.machine_id = machine_id.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    /// Whether the directory reported any endpoint.
    pub fn is_available(&self) -> bool {
        !self.endpoints.is_empty()
    }

    pub fn to_message(&self) -> Message {
        let mut message = Message::new();
        message
            .write_string(self.name.as_str())
            .write_u32(self.service_id)
            .write_string(self.machine_id.as_str());
        for endpoint in &self.endpoints {
            message.write_string(endpoint.as_str());
        }
        message
    }

    /// Read a lookup reply from the message's cursor onwards.
    pub fn from_message(message: &mut Message) -> Result<Self, CodecError> {
        let name = message.read_string()?;
        let service_id = message.read_u32()?;
        let machine_id = message.read_string()?;
        let mut endpoints = Vec::with_capacity(message.remaining());
        while message.remaining() > 0 {
            endpoints.push(message.read_string()?);
        }
        Ok(Self {
            name,
            service_id,
            machine_id,
            endpoints,
        })
    }

    /// Endpoints that parse as addresses, in order, optionally restricted to
    /// one scheme. Unusable entries are skipped.
    pub fn addresses(&self, preferred: Option<Scheme>) -> Vec<Address> {
        self.endpoints
            .iter()
            .filter_map(|endpoint| match Address::parse(endpoint) {
                Ok(address) if preferred.is_none_or(|scheme| address.scheme() == scheme) => {
                    Some(address)
                }
                Ok(address) => {
                    debug!(service = %self.name, %address, "skipping endpoint with other scheme");
                    None
                }
                Err(err) => {
                    debug!(service = %self.name, endpoint = %endpoint, error = %err, "skipping unusable endpoint");
                    None
                }
            })
            .collect()
    }
}

/// Encode a directory lookup request: `[s name]`.
pub fn lookup_request(name: &str) -> Bytes {
    let mut message = Message::new();
    message.write_string(name);
    message.encode()
}

/// Decode a lookup request, returning the requested service name.
pub fn decode_lookup(payload: &[u8]) -> Result<String, CodecError> {
    Message::decode(payload)?.read_string()
}

/// Encode a listing request: a message with no fields.
pub fn list_request() -> Bytes {
    Message::new().encode()
}

/// A request as seen by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryRequest {
    Lookup(String),
    List,
}

/// Tell lookups from listings.
pub fn decode_request(payload: &[u8]) -> Result<DirectoryRequest, CodecError> {
    let mut message = Message::decode(payload)?;
    if message.is_empty() {
        return Ok(DirectoryRequest::List);
    }
    Ok(DirectoryRequest::Lookup(message.read_string()?))
}

/// Encode a listing reply: one raw field per service, each holding that
/// service's lookup-reply encoding.
pub fn listing_reply(services: &[ServiceInfo]) -> Message {
    let mut message = Message::new();
    for info in services {
        message.write_raw(info.to_message().encode());
    }
    message
}

/// Decode a listing reply from the message's cursor onwards.
pub fn decode_listing(message: &mut Message) -> Result<Vec<ServiceInfo>, CodecError> {
    let mut services = Vec::with_capacity(message.remaining());
    while message.remaining() > 0 {
        let record = message.read_raw()?;
        services.push(ServiceInfo::from_message(&mut Message::decode(&record)?)?);
    }
    Ok(services)
}
