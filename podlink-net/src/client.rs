//! Host side of the link: a [`Transport`] over TCP and a provider that
//! finds bridged devices at configured addresses.

use std::collections::HashMap;
use std::io::{self, BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};

use podlink_core::command::{DeviceCommand, DeviceEvent, DeviceResponse};
use podlink_core::config::{Config, SessionConfig};
use podlink_core::error::{PodError, TransportError};
use podlink_core::transport::{DeviceInfo, DeviceProvider, EventHandler, Transport};

use crate::framing::{read_message, write_message};
use crate::protocol::{DeviceMessage, HostMessage};

type Reply = Sender<Result<DeviceResponse, TransportError>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// State shared with the reader thread.
struct Link {
    pending: Mutex<HashMap<u64, Reply>>,
    handler: Mutex<Option<EventHandler>>,
    closed: AtomicBool,
}

impl Link {
    fn fail_pending(&self) {
        for (_, reply) in lock(&self.pending).drain() {
            let _ = reply.send(Err(TransportError::Closed));
        }
    }
}

/// A device reached through a [`DeviceBridge`](crate::server::DeviceBridge).
pub struct NetTransport {
    device: DeviceInfo,
    writer: Mutex<BufWriter<TcpStream>>,
    stream: TcpStream,
    link: Arc<Link>,
    next_seq: AtomicU64,
    command_timeout: Duration,
}

impl NetTransport {
    /// Connect and complete the handshake. The handshake itself is bounded
    /// by `command_timeout`.
    pub fn connect(addr: &str, client_name: &str, command_timeout: Duration) -> io::Result<Self> {
        info!("Connecting to device bridge at {}", addr);
        let stream = connect_stream(addr, command_timeout)?;
        let read_stream = stream.try_clone()?;

        let mut writer = BufWriter::new(stream.try_clone()?);
        let mut reader = BufReader::new(read_stream);

        write_message(&mut writer, &HostMessage::Hello {
            client_name: client_name.to_string(),
        })?;

        reader.get_ref().set_read_timeout(Some(command_timeout))?;
        let device = match read_message::<_, DeviceMessage>(&mut reader)? {
            DeviceMessage::Welcome { device } => device,
            DeviceMessage::Shutdown => {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "bridge is shutting down"));
            }
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("expected Welcome, got {:?}", other),
                ));
            }
        };
        reader.get_ref().set_read_timeout(None)?;
        info!("Connected to {} ({}) at {}", device.id, device.name, addr);

        let link = Arc::new(Link {
            pending: Mutex::new(HashMap::new()),
            handler: Mutex::new(None),
            closed: AtomicBool::new(false),
        });
        let thread_link = Arc::clone(&link);
        thread::Builder::new()
            .name("podlink-net-reader".to_string())
            .spawn(move || reader_thread(reader, thread_link))?;

        Ok(Self {
            device,
            writer: Mutex::new(writer),
            stream,
            link,
            next_seq: AtomicU64::new(0),
            command_timeout,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.link.closed.load(Ordering::SeqCst)
    }
}

impl Transport for NetTransport {
    fn device(&self) -> DeviceInfo {
        self.device.clone()
    }

    fn send(&self, command: &DeviceCommand) -> Result<DeviceResponse, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let (reply, rx) = crossbeam_channel::bounded(1);
        lock(&self.link.pending).insert(seq, reply);
        // the reader may have failed everything between the check and the insert
        if self.is_closed() {
            lock(&self.link.pending).remove(&seq);
            return Err(TransportError::Closed);
        }

        let written = write_message(&mut *lock(&self.writer), &HostMessage::Command {
            seq,
            command: command.clone(),
        });
        if let Err(e) = written {
            lock(&self.link.pending).remove(&seq);
            return Err(e.into());
        }

        match rx.recv_timeout(self.command_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                lock(&self.link.pending).remove(&seq);
                warn!("No response to {} (seq {}) from {}", command.name(), seq, self.device.id);
                Err(TransportError::Timeout)
            }
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }

    fn on_notification(&self, handler: Option<EventHandler>) {
        *lock(&self.link.handler) = handler;
    }

    fn close(&self) {
        if self.link.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = write_message(&mut *lock(&self.writer), &HostMessage::Goodbye);
        let _ = self.stream.shutdown(Shutdown::Both);
        *lock(&self.link.handler) = None;
        self.link.fail_pending();
        info!("Disconnected from {}", self.device.id);
    }
}

impl Drop for NetTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Background thread that reads frames from the bridge. Events are handed
/// to the handler before any later response is released, so a caller never
/// sees a response ahead of the events that preceded it on the wire.
fn reader_thread(mut reader: BufReader<TcpStream>, link: Arc<Link>) {
    let reason = loop {
        match read_message::<_, DeviceMessage>(&mut reader) {
            Ok(DeviceMessage::Response { seq, response }) => {
                match lock(&link.pending).remove(&seq) {
                    Some(reply) => {
                        let _ = reply.send(Ok(response));
                    }
                    None => warn!("Dropping response for unknown seq {}", seq),
                }
            }
            Ok(DeviceMessage::Event { event }) => {
                let handler = lock(&link.handler).clone();
                if let Some(handler) = handler {
                    handler(event);
                }
            }
            Ok(DeviceMessage::Shutdown) => break "device bridge shut down".to_string(),
            Ok(DeviceMessage::Welcome { .. }) => {
                warn!("Unexpected Welcome after handshake");
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::UnexpectedEof {
                    error!("Bridge read error: {}", e);
                }
                break e.to_string();
            }
        }
    };

    // a local close already released everything
    if !link.closed.swap(true, Ordering::SeqCst) {
        link.fail_pending();
        let handler = lock(&link.handler).take();
        if let Some(handler) = handler {
            handler(DeviceEvent::ConnectionLost { reason });
        }
    }
    info!("Bridge reader thread exiting");
}

fn connect_stream(addr: &str, timeout: Duration) -> io::Result<TcpStream> {
    let mut last = io::Error::new(io::ErrorKind::AddrNotAvailable, format!("no address for {}", addr));
    for sock in addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&sock, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => last = e,
        }
    }
    Err(last)
}

/// Ask the bridge at `addr` who it is, then hang up.
fn probe(addr: &str, timeout: Duration) -> io::Result<DeviceInfo> {
    let stream = connect_stream(addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    let mut writer = BufWriter::new(stream.try_clone()?);
    let mut reader = BufReader::new(stream);

    write_message(&mut writer, &HostMessage::Hello {
        client_name: "podlink-probe".to_string(),
    })?;
    let device = match read_message::<_, DeviceMessage>(&mut reader)? {
        DeviceMessage::Welcome { device } => device,
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected Welcome, got {:?}", other),
            ));
        }
    };
    let _ = write_message(&mut writer, &HostMessage::Goodbye);
    Ok(device)
}

/// Finds bridged devices by probing a fixed list of `host:port` addresses.
pub struct NetProvider {
    addresses: Vec<String>,
    client_name: String,
    config: SessionConfig,
    /// Address each device id was last seen at.
    known: Arc<Mutex<HashMap<String, String>>>,
}

impl NetProvider {
    pub fn new(addresses: Vec<String>, client_name: &str, config: SessionConfig) -> Self {
        Self {
            addresses,
            client_name: client_name.to_string(),
            config,
            known: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Probe the addresses listed under `[discovery]`.
    pub fn from_config(config: &Config, client_name: &str) -> Self {
        Self::new(config.discovery_addresses(), client_name, config.session())
    }

    fn locate(&self, id: &str) -> Option<String> {
        if let Some(addr) = lock(&self.known).get(id) {
            return Some(addr.clone());
        }
        let timeout = self.config.discovery_timeout;
        self.addresses.iter().find_map(|addr| match probe(addr, timeout) {
            Ok(device) => {
                lock(&self.known).insert(device.id.clone(), addr.clone());
                (device.id == id).then(|| addr.clone())
            }
            Err(e) => {
                debug!("Probe of {} failed: {}", addr, e);
                None
            }
        })
    }
}

impl DeviceProvider for NetProvider {
    fn scan(&self) -> Receiver<DeviceInfo> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let addresses = self.addresses.clone();
        let known = Arc::clone(&self.known);
        let timeout = self.config.discovery_timeout;

        let spawned = thread::Builder::new()
            .name("podlink-net-scan".to_string())
            .spawn(move || {
                for addr in addresses {
                    match probe(&addr, timeout) {
                        Ok(device) => {
                            lock(&known).insert(device.id.clone(), addr.clone());
                            if tx.send(device).is_err() {
                                break;
                            }
                        }
                        Err(e) => debug!("Probe of {} failed: {}", addr, e),
                    }
                }
            });
        if let Err(e) = spawned {
            error!("Could not spawn scan thread: {}", e);
        }
        rx
    }

    fn connect(&self, id: &str) -> podlink_core::Result<Arc<dyn Transport>> {
        let addr = self
            .locate(id)
            .ok_or_else(|| PodError::DeviceNotFound(id.to_string()))?;
        let transport = NetTransport::connect(&addr, &self.client_name, self.config.command_timeout)
            .map_err(|e| PodError::ConnectionFailed(format!("{}: {}", addr, e)))?;
        if transport.device.id != id {
            // another device answered at the remembered address
            lock(&self.known).remove(id);
            return Err(PodError::ConnectionFailed(format!(
                "{} is now {}",
                addr, transport.device.id
            )));
        }
        Ok(Arc::new(transport))
    }
}
