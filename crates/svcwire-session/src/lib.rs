//! Client-side session, call and future subsystem.
//!
//! A [`Session`] connects to a directory, resolves service names into
//! [`GenericObject`] proxies, and each proxy issues signature-addressed calls
//! whose outcome is delivered through a [`Future`].
//!
//! ```no_run
//! use svcwire_frame::Message;
//! use svcwire_session::Session;
//!
//! let mut session = Session::new();
//! if !session.connect("tcp://127.0.0.1:5555") {
//!     return;
//! }
//! let Some(object) = session.service("serviceTest") else {
//!     return;
//! };
//! let mut message = Message::new();
//! message.write_string("plaf");
//! let future = object.call("reply::(s)", &message).expect("well-formed call");
//! future.wait(None).expect("unbounded wait");
//! if let Ok(mut reply) = future.value() {
//!     println!("Reply: {}", reply.read_string().unwrap_or_default());
//! }
//! session.disconnect();
//! ```

pub mod connection;
pub mod directory;
pub mod error;
pub mod future;
pub mod object;
pub mod session;
pub mod signature;

pub use connection::{Connection, ConnectionConfig};
pub use directory::ServiceInfo;
pub use error::{CallError, InvalidSignature, Result, SessionError};
pub use future::{Future, FutureState, Promise};
pub use object::{decode_call, encode_call, GenericObject};
pub use session::{Session, SessionConfig, SessionState};
pub use signature::Signature;
