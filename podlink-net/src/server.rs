//! Device side of the link: exposes one [`Transport`] over TCP.
//!
//! The bridge serves one host at a time. The first command from a newly
//! connected host moves the device's event stream over to it; the previous
//! host keeps its socket but stops receiving events.

use std::io::{self, BufReader, BufWriter};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info, warn};

use podlink_core::command::DeviceEvent;
use podlink_core::transport::Transport;

use crate::framing::{read_message, write_message};
use crate::protocol::{DeviceMessage, HostMessage};

const ACCEPT_POLL: Duration = Duration::from_millis(10);

type SharedWriter = Arc<Mutex<BufWriter<TcpStream>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

struct HostLink {
    id: u64,
    writer: SharedWriter,
    stream: TcpStream,
}

struct BridgeState {
    transport: Arc<dyn Transport>,
    /// The host currently receiving events.
    active: Mutex<Option<HostLink>>,
    /// Serializes commands from every connected host.
    command: Mutex<()>,
    stopped: AtomicBool,
    next_host: AtomicU64,
}

pub struct DeviceBridge {
    local_addr: SocketAddr,
    state: Arc<BridgeState>,
    acceptor: Option<JoinHandle<()>>,
}

impl DeviceBridge {
    /// Bind to `addr` and start serving `transport`.
    pub fn bind(addr: &str, transport: Arc<dyn Transport>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let state = Arc::new(BridgeState {
            transport,
            active: Mutex::new(None),
            command: Mutex::new(()),
            stopped: AtomicBool::new(false),
            next_host: AtomicU64::new(0),
        });

        let accept_state = Arc::clone(&state);
        let acceptor = thread::Builder::new()
            .name("podlink-bridge-accept".to_string())
            .spawn(move || accept_loop(listener, accept_state))?;

        info!("DeviceBridge for {} listening on {}", state.transport.device().id, local_addr);
        Ok(Self {
            local_addr,
            state,
            acceptor: Some(acceptor),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether a host is currently receiving events.
    pub fn has_host(&self) -> bool {
        lock(&self.state.active).is_some()
    }

    /// Tell the active host goodbye and stop accepting. Idempotent.
    pub fn shutdown(&mut self) {
        if self.state.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(host) = lock(&self.state.active).take() {
            self.state.transport.on_notification(None);
            let _ = write_message(&mut *lock(&host.writer), &DeviceMessage::Shutdown);
            let _ = host.stream.shutdown(Shutdown::Both);
        }
        if let Some(acceptor) = self.acceptor.take() {
            if acceptor.join().is_err() {
                error!("Bridge accept thread panicked");
            }
        }
        info!("DeviceBridge on {} shut down", self.local_addr);
    }
}

impl Drop for DeviceBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn accept_loop(listener: TcpListener, state: Arc<BridgeState>) {
    while !state.stopped.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                info!("Host connecting from {}", addr);
                let host_state = Arc::clone(&state);
                let spawned = thread::Builder::new()
                    .name("podlink-bridge-host".to_string())
                    .spawn(move || {
                        if let Err(e) = serve_host(stream, &host_state) {
                            warn!("Host {} dropped: {}", addr, e);
                        }
                    });
                if let Err(e) = spawned {
                    error!("Could not spawn host thread: {}", e);
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => {
                error!("Accept error: {}", e);
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

fn serve_host(stream: TcpStream, state: &BridgeState) -> io::Result<()> {
    // accepted sockets may inherit the listener's non-blocking mode
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    let writer: SharedWriter = Arc::new(Mutex::new(BufWriter::new(stream.try_clone()?)));
    let mut reader = BufReader::new(stream.try_clone()?);

    let client_name = match read_message::<_, HostMessage>(&mut reader)? {
        HostMessage::Hello { client_name } => client_name,
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected Hello, got {:?}", other),
            ));
        }
    };
    if state.stopped.load(Ordering::SeqCst) {
        let _ = write_message(&mut *lock(&writer), &DeviceMessage::Shutdown);
        return Ok(());
    }

    let id = state.next_host.fetch_add(1, Ordering::SeqCst);
    write_message(&mut *lock(&writer), &DeviceMessage::Welcome {
        device: state.transport.device(),
    })?;
    info!("Host {} ({}) connected", id, client_name);

    let host = HostLink {
        id,
        writer,
        stream,
    };
    let result = command_loop(&mut reader, &host, state);

    let mut active = lock(&state.active);
    if active.as_ref().is_some_and(|h| h.id == id) {
        *active = None;
        state.transport.on_notification(None);
    }
    drop(active);
    info!("Host {} ({}) disconnected", id, client_name);
    result
}

/// Make `host` the receiver of device events.
fn take_events(state: &BridgeState, host: &HostLink) -> io::Result<()> {
    let mut active = lock(&state.active);
    let events = Arc::clone(&host.writer);
    state.transport.on_notification(Some(Arc::new(move |event: DeviceEvent| {
        if let Err(e) = write_message(&mut *lock(&events), &DeviceMessage::Event { event }) {
            warn!("Could not forward event: {}", e);
        }
    })));
    *active = Some(HostLink {
        id: host.id,
        writer: Arc::clone(&host.writer),
        stream: host.stream.try_clone()?,
    });
    info!("Host {} now receives device events", host.id);
    Ok(())
}

/// Serve commands until the host leaves. A host that only says hello (a
/// discovery probe) never takes over the event stream.
fn command_loop(
    reader: &mut BufReader<TcpStream>,
    host: &HostLink,
    state: &BridgeState,
) -> io::Result<()> {
    let writer = &host.writer;
    let mut attached = false;
    loop {
        let msg = match read_message::<_, HostMessage>(reader) {
            Ok(msg) => msg,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        };
        match msg {
            HostMessage::Command { seq, command } => {
                if !attached {
                    take_events(state, host)?;
                    attached = true;
                }
                let outcome = {
                    let _serial = lock(&state.command);
                    state.transport.send(&command)
                };
                match outcome {
                    Ok(response) => {
                        write_message(&mut *lock(writer), &DeviceMessage::Response { seq, response })?;
                    }
                    Err(e) => {
                        warn!("Device link failed on {}: {}", command.name(), e);
                        let _ = write_message(&mut *lock(writer), &DeviceMessage::Shutdown);
                        return Ok(());
                    }
                }
            }
            HostMessage::Goodbye => return Ok(()),
            HostMessage::Hello { .. } => {
                warn!("Ignoring repeated Hello");
            }
        }
    }
}
