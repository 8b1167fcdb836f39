//! Create the virtual mouse, trace a small square, then destroy it.
//!
//! Usage: cargo run --example wiggle [device-name]
//! Needs the foohid extension loaded.

use posehid::{Buttons, DeviceIdentity, InputReport, IoKitBroker, ReportDescriptor, VirtualDevice};
use std::time::Duration;

const SIDE: usize = 40;
const STEP: i8 = 4;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let name = std::env::args()
        .nth(1)
        .unwrap_or_else(|| posehid::protocol::DEFAULT_DEVICE_NAME.to_string());
    let dev = VirtualDevice::new(IoKitBroker::default(), DeviceIdentity::new(name));

    // Leftover from an earlier run, if any.
    let _ = dev.destroy();

    if let Err(e) = dev.create(&ReportDescriptor::mouse()) {
        eprintln!("Failed to create device: {}", e);
        std::process::exit(1);
    }

    let edges = [(STEP, 0), (0, STEP), (-STEP, 0), (0, -STEP)];
    let mut failed = 0;
    for &(dx, dy) in &edges {
        for _ in 0..SIDE {
            if let Err(e) = dev.send(&InputReport::new(Buttons::empty(), dx, dy)) {
                failed += 1;
                log::debug!("{}", e);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
    println!("Sent {} reports ({} failed)", edges.len() * SIDE, failed);

    if let Err(e) = dev.destroy() {
        eprintln!("Failed to destroy device: {}", e);
        std::process::exit(1);
    }
}
