//! # podlink-core
//!
//! Device state synchronization for a modeled amp/pedal unit. Keeps one
//! in-memory [`Pod`](podlink_types::Pod) consistent with a physical device
//! across local edits, device reads and unsolicited device events.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use podlink_core::config::Config;
//! use podlink_core::controller::Controller;
//! use podlink_core::sim::{SimulatedDevice, SimulatedProvider};
//!
//! let device = SimulatedDevice::new("pod-1", "POD HD500");
//! let provider = Arc::new(SimulatedProvider::new(vec![device]));
//! let controller = Controller::new(provider, &Config::load());
//!
//! let events = controller.subscribe();
//! controller.start("pod-1")?;           // binds and runs the initial sync
//! controller.set_amp_parameter_value(0, 0, "7.5")?;
//! controller.flush()?;                  // optimistic writes resolved
//! let pod = controller.get_pod()?;
//! ```
//!
//! ## Module Overview
//!
//! - [`controller`]: `Controller`, the operation surface (Start/Stop, Set*, Query*)
//! - [`registry`]: device enumeration and the bind/unbind lifecycle
//! - [`session`]: one binding: model store, dispatcher, initial sync, edits, queries
//! - [`store`]: `ModelStore`, the single serialized apply path and snapshots
//! - [`dispatch`]: ordered stop-and-wait command stream with structural gating
//! - [`notify`]: bounded notification queue with a single replaceable subscriber
//! - [`transport`]: `Transport` / `DeviceProvider` traits
//! - [`sim`]: in-process simulated device with fault injection
//! - [`config`]: TOML configuration (embedded defaults + user override)

pub mod command;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod notify;
pub mod registry;
mod router;
pub mod session;
pub mod sim;
pub mod store;
pub mod transport;

pub use controller::Controller;
pub use error::{PodError, Result, TransportError};
pub use session::QueryReport;
