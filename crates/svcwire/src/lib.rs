//! Directory-resolved remote object calls.
//!
//! A client connects a [`session::Session`] to a directory, resolves a
//! service name into a [`session::GenericObject`], and calls methods by
//! signature (`reply::(s)`) with typed [`frame::Message`] arguments. Every
//! call returns a [`session::Future`].
//!
//! # Crate Structure
//!
//! - [`transport`]: endpoint addresses and TCP / Unix socket streams
//! - [`frame`]: typed message codec and correlation-id envelopes
//! - [`session`]: sessions, proxies, signatures and futures (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use svcwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use svcwire_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use svcwire_session::*;
}
