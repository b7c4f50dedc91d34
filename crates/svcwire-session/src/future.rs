//! Single-assignment call results.
//!
//! A [`Promise`] is held by whoever completes the call (the connection's
//! reader thread); any number of [`Future`] handles observe it. The outcome
//! is set at most once and never changes afterwards.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use svcwire_frame::Message;

use crate::error::CallError;

type Outcome = std::result::Result<Message, CallError>;
type Callback = Box<dyn FnOnce(&Outcome) + Send>;

/// Observable state of a [`Future`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureState {
    Pending,
    Ready,
    Error,
}

struct Shared {
    outcome: OnceLock<Outcome>,
    callbacks: Mutex<Vec<Callback>>,
    completed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Vec<Callback>> {
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Completes a call exactly once.
pub struct Promise {
    shared: Arc<Shared>,
}

impl Promise {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                outcome: OnceLock::new(),
                callbacks: Mutex::new(Vec::new()),
                completed: Condvar::new(),
            }),
        }
    }

    /// A handle observing this promise.
    pub fn future(&self) -> Future {
        Future {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Resolve with a reply. Returns false if already completed.
    pub fn set_value(&self, message: Message) -> bool {
        self.complete(Ok(message))
    }

    /// Fail with an error. Returns false if already completed.
    pub fn set_error(&self, error: CallError) -> bool {
        self.complete(Err(error))
    }

    pub fn is_completed(&self) -> bool {
        self.shared.outcome.get().is_some()
    }

    /// Whether `future` observes this promise.
    pub(crate) fn completes(&self, future: &Future) -> bool {
        Arc::ptr_eq(&self.shared, &future.shared)
    }

    fn complete(&self, outcome: Outcome) -> bool {
        if self.shared.outcome.set(outcome).is_err() {
            return false;
        }
        let callbacks = {
            let mut guard = self.shared.lock();
            self.shared.completed.notify_all();
            std::mem::take(&mut *guard)
        };
        if let Some(outcome) = self.shared.outcome.get() {
            for callback in callbacks {
                callback(outcome);
            }
        }
        true
    }
}

impl Default for Promise {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// Handle to the eventual result of a call.
///
/// Clones observe the same outcome. Reading a completed future never
/// blocks; [`Future::wait`] is the only blocking operation.
#[derive(Clone)]
pub struct Future {
    shared: Arc<Shared>,
}

impl Future {
    /// An already-resolved future.
    pub fn ready(message: Message) -> Self {
        let promise = Promise::new();
        promise.set_value(message);
        promise.future()
    }

    /// An already-failed future.
    pub fn failed(error: CallError) -> Self {
        let promise = Promise::new();
        promise.set_error(error);
        promise.future()
    }

    /// Block until the future completes, or until `timeout` elapses.
    ///
    /// `None` waits without bound. A timeout leaves the future pending; it
    /// can still complete later. Completing with an error is not a wait
    /// failure: inspect [`Future::is_error`] afterwards.
    pub fn wait(&self, timeout: Option<Duration>) -> std::result::Result<(), CallError> {
        if self.is_ready() {
            return Ok(());
        }

        // Unrepresentable deadlines wait without bound.
        let deadline = timeout
            .and_then(|t| Instant::now().checked_add(t).map(|deadline| (t, deadline)));
        let mut guard = self.shared.lock();
        while self.shared.outcome.get().is_none() {
            guard = match deadline {
                None => self
                    .shared
                    .completed
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner),
                Some((timeout, deadline)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(CallError::Timeout(timeout));
                    }
                    self.shared
                        .completed
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
        Ok(())
    }

    /// True once the future has completed, with a value or an error.
    pub fn is_ready(&self) -> bool {
        self.shared.outcome.get().is_some()
    }

    /// True once the future has completed with an error.
    pub fn is_error(&self) -> bool {
        matches!(self.shared.outcome.get(), Some(Err(_)))
    }

    pub fn state(&self) -> FutureState {
        match self.shared.outcome.get() {
            None => FutureState::Pending,
            Some(Ok(_)) => FutureState::Ready,
            Some(Err(_)) => FutureState::Error,
        }
    }

    /// The reply, with its read cursor at the first field.
    ///
    /// Fails with the stored error, or with `InvalidState` while pending.
    pub fn value(&self) -> std::result::Result<Message, CallError> {
        match self.shared.outcome.get() {
            None => Err(CallError::InvalidState("future is still pending")),
            Some(Ok(message)) => {
                let mut message = message.clone();
                message.rewind();
                Ok(message)
            }
            Some(Err(err)) => Err(err.clone()),
        }
    }

    /// The stored error, if the future failed.
    pub fn error(&self) -> Option<CallError> {
        match self.shared.outcome.get() {
            Some(Err(err)) => Some(err.clone()),
            _ => None,
        }
    }

    /// Run `callback` once the future completes.
    ///
    /// Runs immediately on the calling thread if already complete, otherwise
    /// on the thread that completes the future. Each callback runs exactly
    /// once.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&Outcome) + Send + 'static,
    {
        let mut guard = self.shared.lock();
        match self.shared.outcome.get() {
            Some(outcome) => {
                drop(guard);
                callback(outcome);
            }
            None => guard.push(Box::new(callback)),
        }
    }
}

impl fmt::Debug for Future {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("state", &self.state())
            .finish()
    }
}
