//! Endpoint addressing and byte-stream connections.
//!
//! This is the lowest layer of svcwire. It knows how to turn an endpoint
//! string such as `tcp://127.0.0.1:5555` into an [`Address`] and how to open
//! a [`Stream`] to it. Everything else builds on top of the [`Stream`] type
//! provided here.

pub mod address;
pub mod connector;
pub mod error;
pub mod stream;

pub use address::{Address, Scheme, DEFAULT_DIRECTORY};
pub use connector::{connect, connect_timeout};
pub use error::{Result, TransportError};
pub use stream::Stream;
