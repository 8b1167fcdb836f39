//! `posehid-mouse`: create the virtual mouse, stream reports, destroy it.
//!
//! All settings come from `POSEHID_*` environment variables; see
//! [`posehid::Config`]. Ctrl+C ends streaming early and still destroys the
//! device.

use posehid::driver::EXIT_FAILURE;
use posehid::{Config, Driver, IoKitBroker, Linuxtrack, VirtualDevice};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(EXIT_FAILURE);
        }
    };
    log::debug!("{:?}", config);

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        if let Err(e) = ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed)) {
            log::warn!("Failed to install Ctrl+C handler: {}", e);
        }
    }

    let device = VirtualDevice::new(IoKitBroker::new(config.service.clone()), config.identity());
    let mapper = config.mapper.build(config.heading_gain);
    log::info!("Mapping pose to reports with '{}'", mapper.name());

    let mut driver = Driver::new(device, mapper, config.driver_config()).with_stop_flag(stop);

    if config.tracking {
        match Linuxtrack::load(&config.tracker_library) {
            Ok(tracker) => driver = driver.with_tracker(Box::new(tracker)),
            Err(e) if config.require_tracking => {
                log::error!("{}", e);
                std::process::exit(EXIT_FAILURE);
            }
            Err(e) => log::warn!("{}; continuing without tracking", e),
        }
    }

    let summary = driver.run();
    // Release the tracker before exiting; process::exit skips destructors.
    drop(driver);
    std::process::exit(summary.exit_code);
}
