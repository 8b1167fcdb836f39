//! Wait for linuxtrack to come up and print pose samples.
//!
//! Usage: cargo run --example track [library] [profile]
//! Press Ctrl+C to stop.

use posehid::{Linuxtrack, PoseSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let library = args
        .next()
        .unwrap_or_else(|| posehid::linuxtrack::DEFAULT_LIBRARY.to_string());
    let profile = args.next();

    let tracker = match Linuxtrack::load(&library) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to load {}: {}", library, e);
            std::process::exit(1);
        }
    };

    let mut source = PoseSource::new(tracker);
    if let Err(e) = source.initialize(profile.as_deref()) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
    if !source.await_ready(200, Duration::from_millis(100)) {
        eprintln!("Tracker not ready: {:?}", source.readiness());
        std::process::exit(1);
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        if let Err(e) = ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed)) {
            log::warn!("Failed to install Ctrl+C handler: {}", e);
        }
    }

    println!("Tracking (Ctrl+C to stop)...");
    let start = Instant::now();
    let mut count: u64 = 0;
    while !stop.load(Ordering::Relaxed) {
        match source.get_sample() {
            Some(s) => {
                count += 1;
                if count % 30 == 1 {
                    println!(
                        "frame={:<8} hpr=[{:+7.2}, {:+7.2}, {:+7.2}]  xyz=[{:+7.2}, {:+7.2}, {:+7.2}]",
                        s.frame_counter,
                        s.heading,
                        s.pitch,
                        s.roll,
                        s.x,
                        s.y,
                        s.z
                    );
                }
            }
            None => std::thread::sleep(Duration::from_millis(2)),
        }
    }

    let secs = start.elapsed().as_secs_f64();
    println!("{} samples in {:.1}s ({:.1} Hz)", count, secs, count as f64 / secs.max(f64::EPSILON));
    drop(source.into_inner());
}
