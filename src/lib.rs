//! # posehid - virtual HID mouse over the foohid broker
//!
//! Creates a software HID mouse through the foohid kernel extension and feeds
//! it relative-motion reports, optionally steered by head pose from
//! linuxtrack. Provides:
//! - Scoped broker sessions (create / send / destroy) over IOKit
//! - A pose source with a bounded readiness gate
//! - A translation loop with pluggable pose-to-report mapping
//! - C FFI for driving the device from C/C++/Swift
//!
//! ## Quick Start
//! ```no_run
//! use posehid::{Buttons, DeviceIdentity, InputReport, IoKitBroker};
//! use posehid::{ReportDescriptor, VirtualDevice};
//!
//! let name = DeviceIdentity::new("Virtual GamePad FooBar");
//! let dev = VirtualDevice::new(IoKitBroker::default(), name);
//! dev.create(&ReportDescriptor::mouse()).unwrap();
//! dev.send(&InputReport::new(Buttons::LEFT, 5, -5)).unwrap();
//! dev.destroy().unwrap();
//! ```

pub mod error;
pub mod types;
pub mod protocol;
pub mod broker;
pub mod iokit;
pub mod device;
pub mod tracking;
pub mod linuxtrack;
pub mod mapping;
pub mod driver;
pub mod config;
pub mod ffi;

pub use config::Config;
pub use device::VirtualDevice;
pub use driver::{Driver, DriverConfig, RunSummary};
pub use error::PosehidError;
pub use iokit::IoKitBroker;
pub use linuxtrack::Linuxtrack;
pub use tracking::{PoseSource, Tracker};
pub use types::*;

/// Result type alias for posehid operations.
pub type Result<T> = std::result::Result<T, PosehidError>;
