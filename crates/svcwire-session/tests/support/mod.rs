//! In-process directory and service doubles speaking the wire protocol over TCP.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use svcwire_frame::{FrameError, FrameReader, FrameWriter, Kind, Message};
use svcwire_session::directory::{decode_request, listing_reply, DirectoryRequest};
use svcwire_session::{decode_call, ServiceInfo};
use svcwire_transport::Stream;

fn split(stream: TcpStream) -> (FrameReader<Stream>, FrameWriter<Stream>) {
    let stream = Stream::from(stream);
    let reader = FrameReader::new(stream.try_clone().unwrap());
    (reader, FrameWriter::new(stream))
}

fn fault(text: &str) -> Message {
    let mut message = Message::new();
    message.write_string(text);
    message
}

/// How a [`TestDirectory`] treats incoming requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryBehavior {
    /// Answer from the registry.
    Answer,
    /// Read requests, never answer.
    Silent,
    /// Close the connection after reading a request.
    HangUp,
}

/// A directory that answers lookups from an in-memory registry.
pub struct TestDirectory {
    port: u16,
    services: Arc<Mutex<HashMap<String, ServiceInfo>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    lookups: Arc<AtomicUsize>,
    behavior: Arc<Mutex<DirectoryBehavior>>,
}

#[derive(Clone)]
struct DirectoryState {
    services: Arc<Mutex<HashMap<String, ServiceInfo>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    lookups: Arc<AtomicUsize>,
    behavior: Arc<Mutex<DirectoryBehavior>>,
}

impl TestDirectory {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = DirectoryState {
            services: Arc::new(Mutex::new(HashMap::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
            lookups: Arc::new(AtomicUsize::new(0)),
            behavior: Arc::new(Mutex::new(DirectoryBehavior::Answer)),
        };

        let shared = state.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let state = shared.clone();
                thread::spawn(move || serve_directory(stream, state));
            }
        });

        Self {
            port,
            services: state.services,
            failing: state.failing,
            lookups: state.lookups,
            behavior: state.behavior,
        }
    }

    pub fn set_behavior(&self, behavior: DirectoryBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn address(&self) -> String {
        format!("tcp://127.0.0.1:{}", self.port)
    }

    pub fn register(&self, info: ServiceInfo) {
        self.services
            .lock()
            .unwrap()
            .insert(info.name.clone(), info);
    }

    /// Answer lookups for `name` with an error envelope.
    pub fn fail_lookups(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

fn serve_directory(stream: TcpStream, state: DirectoryState) {
    let (mut reader, mut writer) = split(stream);
    while let Ok(envelope) = reader.read_envelope() {
        state.lookups.fetch_add(1, Ordering::SeqCst);
        match *state.behavior.lock().unwrap() {
            DirectoryBehavior::Answer => {}
            DirectoryBehavior::Silent => continue,
            DirectoryBehavior::HangUp => {
                let _ = writer.get_ref().shutdown();
                break;
            }
        }

        let reply = match decode_request(&envelope.payload) {
            Ok(DirectoryRequest::List) => {
                let services = state.services.lock().unwrap();
                let mut all: Vec<ServiceInfo> = services.values().cloned().collect();
                all.sort_by_key(|info| info.service_id);
                listing_reply(&all)
            }
            Ok(DirectoryRequest::Lookup(name)) => {
                if state.failing.lock().unwrap().contains(&name) {
                    let _ = writer.send(
                        envelope.id,
                        Kind::Error,
                        &fault("directory unavailable").encode(),
                    );
                    continue;
                }
                state
                    .services
                    .lock()
                    .unwrap()
                    .get(&name)
                    .cloned()
                    .unwrap_or_else(|| ServiceInfo::new(name, 0))
                    .to_message()
            }
            Err(err) => {
                let _ = writer.send(envelope.id, Kind::Error, &fault(&err.to_string()).encode());
                continue;
            }
        };
        if writer.send(envelope.id, Kind::Reply, &reply.encode()).is_err() {
            break;
        }
    }
}

/// How a [`TestService`] treats incoming calls.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Reply to each call with its arguments. Method `fail` gets an error
    /// envelope instead.
    Echo,
    /// Collect this many calls, then answer them newest first.
    Reverse(usize),
    /// Read calls, never answer.
    Silent,
    /// Close the connection after reading this many calls.
    CloseAfter(usize),
}

/// A service endpoint with a fixed behavior.
pub struct TestService {
    port: u16,
    accepted: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
}

impl TestService {
    pub fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(AtomicUsize::new(0));

        let (a, r) = (Arc::clone(&accepted), Arc::clone(&requests));
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                a.fetch_add(1, Ordering::SeqCst);
                let r = Arc::clone(&r);
                thread::spawn(move || serve(stream, behavior, r));
            }
        });

        Self {
            port,
            accepted,
            requests,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("tcp://127.0.0.1:{}", self.port)
    }

    /// Directory entry pointing at this service.
    pub fn info(&self, name: &str, service_id: u32) -> ServiceInfo {
        ServiceInfo::new(name, service_id)
            .with_machine_id("test-machine")
            .with_endpoint(self.endpoint())
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

fn answer(writer: &mut FrameWriter<Stream>, id: u32, payload: &[u8]) -> Result<(), FrameError> {
    match decode_call(payload) {
        Ok((signature, _)) if signature.name() == "fail" => {
            writer.send(id, Kind::Error, &fault("fail requested").encode())
        }
        Ok((_, args)) => writer.send(id, Kind::Reply, &args.encode()),
        Err(err) => writer.send(id, Kind::Error, &fault(&err.to_string()).encode()),
    }
}

fn serve(stream: TcpStream, behavior: Behavior, requests: Arc<AtomicUsize>) {
    let (mut reader, mut writer) = split(stream);
    let mut held = Vec::new();
    while let Ok(envelope) = reader.read_envelope() {
        let seen = requests.fetch_add(1, Ordering::SeqCst) + 1;
        match behavior {
            Behavior::Echo => {
                if answer(&mut writer, envelope.id, &envelope.payload).is_err() {
                    break;
                }
            }
            Behavior::Reverse(batch) => {
                held.push(envelope);
                if held.len() == batch {
                    for envelope in held.drain(..).rev() {
                        let _ = answer(&mut writer, envelope.id, &envelope.payload);
                    }
                }
            }
            Behavior::Silent => {}
            Behavior::CloseAfter(limit) => {
                if seen >= limit {
                    let _ = writer.get_ref().shutdown();
                    break;
                }
            }
        }
    }
}
