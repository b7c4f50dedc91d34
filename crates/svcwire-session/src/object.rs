use bytes::{Bytes, BytesMut};
use svcwire_frame::{encode_fields, CodecError, Message, TypeTag, Value};
use svcwire_transport::Address;
use tracing::debug;

use crate::connection::Connection;
use crate::directory::ServiceInfo;
use crate::error::{Result, SessionError};
use crate::future::Future;
use crate::signature::Signature;

/// Proxy for one remote service.
///
/// Owns its connection to the service endpoint, independent of the session
/// that resolved it: disconnecting the session leaves the proxy usable.
#[derive(Debug)]
pub struct GenericObject {
    info: ServiceInfo,
    endpoint: Address,
    connection: Connection,
}

impl GenericObject {
    pub(crate) fn new(info: ServiceInfo, endpoint: Address, connection: Connection) -> Self {
        Self {
            info,
            endpoint,
            connection,
        }
    }

    /// Invoke `signature` (e.g. `reply::(s)`) with the fields of `message`.
    ///
    /// The signature is parsed and checked against the message before any
    /// bytes are sent; both failures are returned synchronously. Everything
    /// after the request is written is reported through the future.
    pub fn call(&self, signature: &str, message: &Message) -> Result<Future> {
        let signature = Signature::parse(signature)?;
        self.call_signature(&signature, message)
    }

    /// [`GenericObject::call`] with an already-parsed signature.
    pub fn call_signature(&self, signature: &Signature, message: &Message) -> Result<Future> {
        signature.check(message)?;
        debug!(service = %self.info.name, %signature, "calling");
        self.connection.request(&encode_call(signature, message))
    }

    /// Build the message from `values` and call.
    pub fn call_values(
        &self,
        signature: &str,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<Future> {
        self.call(signature, &Message::with_fields(values))
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn service_id(&self) -> u32 {
        self.info.service_id
    }

    pub fn info(&self) -> &ServiceInfo {
        &self.info
    }

    /// The endpoint this proxy is connected to.
    pub fn endpoint(&self) -> &Address {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    pub fn pending_calls(&self) -> usize {
        self.connection.pending_calls()
    }

    /// Close the connection to the service, failing pending calls.
    pub fn close(&self) {
        self.connection.close();
    }
}

/// Encode a call request: the signature as a string field, then the arguments.
pub fn encode_call(signature: &Signature, message: &Message) -> Bytes {
    let mut dst = BytesMut::with_capacity(message.encoded_len() + 16);
    encode_fields(&[Value::String(signature.to_string())], &mut dst);
    encode_fields(message.fields(), &mut dst);
    dst.freeze()
}

/// Split a call request into its signature and argument message.
///
/// The arguments are checked against the signature.
pub fn decode_call(payload: &[u8]) -> Result<(Signature, Message)> {
    let mut fields = Message::decode(payload)?.fields().to_vec().into_iter();
    let signature = match fields.next() {
        Some(Value::String(text)) => Signature::parse(&text)?,
        Some(other) => {
            return Err(SessionError::MalformedMessage(CodecError::TypeMismatch {
                index: 0,
                expected: TypeTag::String,
                found: other.tag(),
            }))
        }
        None => {
            return Err(SessionError::MalformedMessage(CodecError::EndOfMessage {
                len: 0,
            }))
        }
    };
    let args = Message::with_fields(fields);
    signature.check(&args)?;
    Ok((signature, args))
}
