use std::time::Duration;

use svcwire_frame::{CodecError, FrameError};
use svcwire_transport::TransportError;

/// Outcome of a failed call, as stored in (and returned by) a [`crate::Future`].
///
/// Cloneable so every observer of a future sees the same error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    /// The connection carrying the call went away before a reply arrived.
    #[error("connection closed")]
    ConnectionClosed,

    /// No reply arrived within the bound.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The peer answered with an error envelope.
    #[error("remote fault: {0}")]
    RemoteFault(String),

    /// The reply could not be decoded.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The future was read before it completed.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
}

/// A signature string that does not follow `name::(codes)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid signature '{text}': {reason}")]
pub struct InvalidSignature {
    pub text: String,
    pub reason: String,
}

/// Errors raised synchronously by sessions, connections and proxies.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Cannot parse the address or establish the transport.
    #[error("connection error: {0}")]
    Connection(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A message failed to decode or did not hold the expected fields.
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] CodecError),

    #[error(transparent)]
    InvalidSignature(#[from] InvalidSignature),

    /// The message fields do not match the signature's argument types.
    #[error("signature mismatch for {signature}: expected ({expected}), got ({found})")]
    SignatureMismatch {
        signature: String,
        expected: String,
        found: String,
    },

    /// The session has no directory connection.
    #[error("not connected to a directory")]
    NotConnected,

    /// The connection is already closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The directory answered a lookup with an error.
    #[error("directory error: {0}")]
    Directory(String),

    #[error(transparent)]
    Call(#[from] CallError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
