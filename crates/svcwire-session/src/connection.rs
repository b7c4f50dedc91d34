//! Request/reply connection with a dedicated reader thread.
//!
//! Every request gets a fresh correlation id and a pending [`Promise`]. The
//! reader thread routes replies back by id, so replies may arrive in any
//! order. Closing the connection (locally or by the peer) fails every call
//! still pending with [`CallError::ConnectionClosed`].

use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use svcwire_frame::{Envelope, FrameConfig, FrameError, FrameReader, FrameWriter, Kind, Message};
use svcwire_transport::{connect_timeout, Address, Stream, TransportError};
use tracing::{debug, trace, warn};

use crate::error::{CallError, Result, SessionError};
use crate::future::{Future, Promise};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Envelope limits and socket timeouts.
    pub frame: FrameConfig,
    /// Bound on establishing the transport. Default: 5 s.
    pub connect_timeout: Option<Duration>,
    /// Fail calls with `Timeout` when no reply arrives in time. Default: none.
    pub call_timeout: Option<Duration>,
    /// How often the reader thread checks for overdue calls when
    /// `call_timeout` is set. Default: 50 ms.
    pub poll_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            call_timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

struct PendingCall {
    promise: Promise,
    deadline: Option<Instant>,
}

struct Shared {
    label: String,
    writer: Mutex<FrameWriter<Stream>>,
    pending: Mutex<HashMap<u32, PendingCall>>,
    next_id: AtomicU32,
    closed: AtomicBool,
    unexpected: AtomicU64,
    call_timeout: Option<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    /// Register a pending call under a fresh id, unless already closed.
    ///
    /// `closed` is checked under the pending lock so a concurrent
    /// [`Shared::fail_all`] cannot miss the new entry.
    fn register(&self, promise: Promise) -> Option<u32> {
        // A timeout too large to represent as an instant never expires.
        let deadline = self
            .call_timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));
        let mut pending = lock(&self.pending);
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        let id = loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 && !pending.contains_key(&id) {
                break id;
            }
        };
        pending.insert(id, PendingCall { promise, deadline });
        Some(id)
    }

    fn take(&self, id: u32) -> Option<PendingCall> {
        lock(&self.pending).remove(&id)
    }

    fn dispatch(&self, envelope: Envelope) {
        if envelope.kind == Kind::Request {
            warn!(
                peer = %self.label,
                id = envelope.id,
                "ignoring request sent to a client connection"
            );
            return;
        }

        let Some(call) = self.take(envelope.id) else {
            self.unexpected.fetch_add(1, Ordering::Relaxed);
            warn!(
                peer = %self.label,
                id = envelope.id,
                kind = envelope.kind.name(),
                "unexpected reply: no pending call with this id"
            );
            return;
        };

        trace!(peer = %self.label, id = envelope.id, kind = envelope.kind.name(), "reply received");
        match envelope.kind {
            Kind::Error => {
                call.promise
                    .set_error(CallError::RemoteFault(fault_description(&envelope.payload)));
            }
            _ => match Message::decode(&envelope.payload) {
                Ok(message) => {
                    call.promise.set_value(message);
                }
                Err(err) => {
                    debug!(peer = %self.label, id = envelope.id, error = %err, "undecodable reply");
                    call.promise
                        .set_error(CallError::MalformedMessage(err.to_string()));
                }
            },
        }
    }

    fn expire_overdue(&self) {
        let Some(timeout) = self.call_timeout else {
            return;
        };
        let now = Instant::now();
        let expired: Vec<(u32, PendingCall)> = {
            let mut pending = lock(&self.pending);
            let ids: Vec<u32> = pending
                .iter()
                .filter(|(_, call)| call.deadline.is_some_and(|deadline| deadline <= now))
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| pending.remove(&id).map(|call| (id, call)))
                .collect()
        };
        for (id, call) in expired {
            debug!(peer = %self.label, id, ?timeout, "call timed out");
            call.promise.set_error(CallError::Timeout(timeout));
        }
    }

    /// Mark closed and fail every pending call. Promises complete outside
    /// the lock so callbacks may issue new requests.
    fn fail_all(&self, error: CallError) {
        self.closed.store(true, Ordering::Release);
        let drained: Vec<PendingCall> = lock(&self.pending).drain().map(|(_, call)| call).collect();
        if !drained.is_empty() {
            debug!(peer = %self.label, count = drained.len(), %error, "failing pending calls");
        }
        for call in drained {
            call.promise.set_error(error.clone());
        }
    }
}

/// Payload of an error envelope: a message whose first field describes the fault.
fn fault_description(payload: &[u8]) -> String {
    match Message::decode(payload) {
        Ok(mut message) => message
            .read_string()
            .unwrap_or_else(|_| "unspecified remote fault".to_string()),
        Err(_) => String::from_utf8_lossy(payload).into_owned(),
    }
}

fn is_poll_timeout(err: &FrameError) -> bool {
    matches!(err, FrameError::Io(io) if matches!(io.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut))
}

fn reader_loop(shared: Arc<Shared>, mut reader: FrameReader<Stream>) {
    let failure = loop {
        match reader.read_envelope() {
            Ok(envelope) => {
                shared.dispatch(envelope);
                shared.expire_overdue();
            }
            Err(err) if is_poll_timeout(&err) => shared.expire_overdue(),
            Err(FrameError::ConnectionClosed) => {
                debug!(peer = %shared.label, "peer closed connection");
                break CallError::ConnectionClosed;
            }
            Err(FrameError::Io(err)) => {
                if !shared.closed.load(Ordering::Acquire) {
                    warn!(peer = %shared.label, error = %err, "connection read failed");
                }
                break CallError::ConnectionClosed;
            }
            Err(err) => {
                warn!(peer = %shared.label, error = %err, "malformed envelope; dropping connection");
                let _ = reader.get_ref().shutdown();
                break CallError::MalformedMessage(err.to_string());
            }
        }
    };
    shared.fail_all(failure);
    trace!(peer = %shared.label, "reader thread exiting");
}

/// A client connection multiplexing concurrent requests.
pub struct Connection {
    shared: Arc<Shared>,
    control: Stream,
    reader: Mutex<Option<JoinHandle<()>>>,
    peer: Option<Address>,
}

impl Connection {
    /// Connect to `address` and start the reader thread.
    pub fn open(address: &Address, config: ConnectionConfig) -> Result<Self> {
        let stream = connect_timeout(address, config.connect_timeout)?;
        let mut connection = Self::start(stream, config, address.to_string())?;
        connection.peer = Some(address.clone());
        Ok(connection)
    }

    /// Run the protocol over an already-connected stream.
    pub fn from_stream(stream: Stream, config: ConnectionConfig) -> Result<Self> {
        let label = format!("{}-stream", stream.transport_name());
        Self::start(stream, config, label)
    }

    fn start(stream: Stream, config: ConnectionConfig, label: String) -> Result<Self> {
        let control = stream.try_clone()?;

        let mut read_config = config.frame.clone();
        if config.call_timeout.is_some() {
            read_config.read_timeout = Some(config.poll_interval);
        }
        let reader = FrameReader::with_config_stream(stream.try_clone()?, read_config)?;
        let writer = FrameWriter::with_config_stream(stream, config.frame.clone())?;

        let shared = Arc::new(Shared {
            label,
            writer: Mutex::new(writer),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            closed: AtomicBool::new(false),
            unexpected: AtomicU64::new(0),
            call_timeout: config.call_timeout,
        });

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("svcwire-reader-{}", shared.label))
            .spawn(move || reader_loop(thread_shared, reader))
            .map_err(TransportError::Io)?;

        debug!(peer = %shared.label, "connection established");
        Ok(Self {
            shared,
            control,
            reader: Mutex::new(Some(handle)),
            peer: None,
        })
    }

    /// Send `payload` as a request and return the future for its reply.
    ///
    /// Fails synchronously if the connection is already closed or the
    /// payload exceeds the frame limit. A write failure on a live
    /// connection fails the returned future instead and closes the
    /// connection.
    pub fn request(&self, payload: &[u8]) -> Result<Future> {
        let promise = Promise::new();
        let future = promise.future();
        let id = self
            .shared
            .register(promise)
            .ok_or(SessionError::ConnectionClosed)?;

        let sent = lock(&self.shared.writer).send(id, Kind::Request, payload);
        match sent {
            Ok(()) => {
                trace!(peer = %self.shared.label, id, len = payload.len(), "request sent");
                Ok(future)
            }
            Err(err @ FrameError::PayloadTooLarge { .. }) => {
                self.shared.take(id);
                Err(err.into())
            }
            Err(err) => {
                warn!(peer = %self.shared.label, id, error = %err, "request write failed; closing connection");
                if let Some(call) = self.shared.take(id) {
                    call.promise.set_error(CallError::ConnectionClosed);
                }
                self.shared.closed.store(true, Ordering::Release);
                let _ = self.control.shutdown();
                Ok(future)
            }
        }
    }

    /// Stop tracking the call behind `future`.
    ///
    /// The future stays pending and a reply arriving later counts as
    /// unexpected. Returns false if the call already completed or belongs to
    /// another connection.
    pub fn forget(&self, future: &Future) -> bool {
        let mut pending = lock(&self.shared.pending);
        let id = pending
            .iter()
            .find(|(_, call)| call.promise.completes(future))
            .map(|(id, _)| *id);
        match id {
            Some(id) => {
                pending.remove(&id);
                trace!(peer = %self.shared.label, id, "call forgotten");
                true
            }
            None => false,
        }
    }

    /// Close the connection and fail all pending calls. Idempotent.
    pub fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::AcqRel) {
            debug!(peer = %self.shared.label, "closing connection");
        }
        if let Err(err) = self.control.shutdown() {
            debug!(peer = %self.shared.label, error = %err, "shutdown failed");
        }

        let handle = lock(&self.reader).take();
        if let Some(handle) = handle {
            // A completion callback may close the connection from the reader
            // thread itself; that thread exits on its own.
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!(peer = %self.shared.label, "reader thread panicked");
            }
        }
        self.shared.fail_all(CallError::ConnectionClosed);
    }

    /// False once closed locally, by the peer, or after a write failure.
    pub fn is_open(&self) -> bool {
        !self.shared.closed.load(Ordering::Acquire)
    }

    /// Number of calls awaiting a reply.
    pub fn pending_calls(&self) -> usize {
        lock(&self.shared.pending).len()
    }

    /// Replies received whose id matched no pending call.
    pub fn unexpected_replies(&self) -> u64 {
        self.shared.unexpected.load(Ordering::Relaxed)
    }

    /// The address this connection was opened to, if opened by address.
    pub fn peer(&self) -> Option<&Address> {
        self.peer.as_ref()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.shared.label)
            .field("open", &self.is_open())
            .field("pending", &self.pending_calls())
            .finish()
    }
}
