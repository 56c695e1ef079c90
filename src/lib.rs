//! Rust library for controlling Denon network receivers over the telnet
//! control protocol
//!
//! The receiver speaks a half-duplex, line-oriented text protocol on TCP
//! port 23 and tolerates very few concurrent control sessions. This library
//! keeps all traffic for one receiver on a single lazily opened connection:
//! set commands and periodic state polls are queued and drained by at most
//! one in-flight session at a time, and the connection is closed again after
//! a short idle window. It supports:
//!
//! - Power, volume (absolute and stepped), mute and source selection
//! - Periodic state polling: power, volume and max-volume discovery, mute,
//!   active source, now-playing text
//! - The receiver's own source table (configured names and deletions)
//! - Transport controls and now-playing metadata for media-mode sources
//! - Head-of-queue retry of commands that failed in flight
//!
//! # Quick Start
//!
//! ```no_run
//! use denon_telnet::{DenonDevice, DeviceConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let device = DenonDevice::new(DeviceConfig::new("192.168.1.50"));
//!
//!     // One inline refresh to check the receiver is reachable
//!     if !device.probe().await {
//!         eprintln!("receiver did not answer");
//!         return;
//!     }
//!
//!     // Fire-and-forget controls; failures retry on later ticks
//!     device.turn_on();
//!     device.select_source("TV");
//!     device.set_volume_level(0.4);
//!
//!     // Drive polling and the idle-close check from a 1s timer
//!     let mut interval = tokio::time::interval(Duration::from_secs(1));
//!     loop {
//!         interval.tick().await;
//!         device.request_refresh();
//!         device.tick();
//!         println!("{}: volume {:.2}", device.name(), device.volume_level());
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! The library is organized into several layers:
//!
//! - **Device**: the public handle, command queue and session serializer
//! - **Poll**: the fixed-order state refresh pass
//! - **Link**: connection lifecycle (lazy open, idle close) and the
//!   request/response executor
//! - **Transport**: CR-terminated line I/O over TCP
//! - **Protocol**: wire grammar, parsers and command formatting

mod device;
mod error;
mod link;
mod poll;
mod protocol;
mod queue;
mod state;
mod transport;
mod types;

// Public exports
pub use device::DenonDevice;
pub use error::{DenonError, Result};
pub use types::{Capabilities, DeviceConfig, PowerState};
