#![allow(dead_code)]
//! Test harness utilities for podlink-net integration tests.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::{Duration, Instant};

use podlink_core::sim::SimulatedDevice;
use podlink_net::framing::{read_message, write_message};
use podlink_net::protocol::{DeviceMessage, HostMessage};
use podlink_net::server::DeviceBridge;
use podlink_types::{Catalog, DeviceLayout};

pub const DEVICE: &str = "pod-net";

/// A small simulated unit behind a bridge on an ephemeral port.
pub fn bridged() -> (DeviceBridge, Arc<SimulatedDevice>, String) {
    let layout = DeviceLayout {
        sets: 1,
        presets_per_set: 2,
        amps: 1,
        pedals: 2,
    };
    let device = SimulatedDevice::with_catalog(DEVICE, "POD HD", Catalog::pod_hd_with_layout(layout));
    let bridge = DeviceBridge::bind("127.0.0.1:0", device.clone()).unwrap();
    let addr = bridge.local_addr().to_string();
    (bridge, device, addr)
}

/// Poll `cond` until it holds or the timeout passes.
pub fn wait_until<F>(timeout: Duration, cond: F) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// A raw TCP client for protocol-level tests.
pub struct RawClient {
    pub reader: BufReader<TcpStream>,
    pub writer: BufWriter<TcpStream>,
}

impl RawClient {
    pub fn connect(addr: &str) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(Duration::from_secs(5)))?;
        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    pub fn send(&mut self, msg: &HostMessage) -> std::io::Result<()> {
        write_message(&mut self.writer, msg)
    }

    pub fn recv(&mut self) -> std::io::Result<DeviceMessage> {
        read_message(&mut self.reader)
    }

    pub fn send_hello(&mut self, name: &str) -> std::io::Result<()> {
        self.send(&HostMessage::Hello {
            client_name: name.to_string(),
        })
    }
}
