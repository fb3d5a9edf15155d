//! Network transport for podlink.
//!
//! A [`DeviceBridge`] exposes a device reachable on one machine over TCP;
//! [`NetTransport`] and [`NetProvider`] let a controller on another machine
//! bind to it as if it were local.

pub mod client;
pub mod framing;
pub mod protocol;
pub mod server;

pub use client::{NetProvider, NetTransport};
pub use protocol::{DeviceMessage, HostMessage};
pub use server::DeviceBridge;
